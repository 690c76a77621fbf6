//! Core traits for Daily Auth.
//!
//! Plugins implement [`AuthPlugin`] to expose their HTTP surface through the
//! framework-agnostic [`Router`].

use crate::router::Router;

/// Trait for authentication plugins.
pub trait AuthPlugin: Send + Sync {
    /// Returns the unique identifier for this plugin.
    fn id(&self) -> &'static str;

    /// Returns a human-readable name for this plugin.
    fn name(&self) -> &'static str;

    /// Registers routes for this plugin.
    fn register_routes(&self, _router: &mut Router) {}
}
