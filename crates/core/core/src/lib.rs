//! # Daily Auth Core
//!
//! Foundational pieces shared by every Daily Auth crate: the error type, the
//! clock abstraction used for all time-based rules, the framework-agnostic
//! router, and the plugin trait.

pub mod clock;
pub mod error;
pub mod router;
pub mod traits;

// Re-export commonly used items at the crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, AuthResult};
pub use router::{Method, Request, RequestHandler, Response, Route, RouteMetadata, Router};
pub use traits::AuthPlugin;
