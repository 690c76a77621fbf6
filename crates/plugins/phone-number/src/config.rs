//! Configuration for the Phone Number plugin.

use crate::messaging::DeliveryPreference;

/// HTTP-facing options of the Phone Number plugin.
#[derive(Debug, Clone)]
pub struct PhoneNumberConfig {
    /// Echo demo codes in issuance responses. Never enable in production.
    pub expose_demo_codes: bool,
    /// Mount the unauthenticated clear-rate-limit route. Operators only.
    pub expose_clear_rate_limit: bool,
    /// Mount the messaging diagnostic route. Operators only.
    pub expose_test_messaging: bool,
    /// Channel preference used when a request does not name one.
    pub default_preference: DeliveryPreference,
    /// OpenAPI tag for the plugin's routes.
    pub tag: String,
}

impl Default for PhoneNumberConfig {
    fn default() -> Self {
        Self {
            expose_demo_codes: false,
            expose_clear_rate_limit: false,
            expose_test_messaging: false,
            default_preference: DeliveryPreference::Auto,
            tag: "phone-otp".to_string(),
        }
    }
}

impl PhoneNumberConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoes demo codes in responses.
    pub fn expose_demo_codes(mut self, expose: bool) -> Self {
        self.expose_demo_codes = expose;
        self
    }

    /// Mounts the clear-rate-limit route.
    pub fn expose_clear_rate_limit(mut self, expose: bool) -> Self {
        self.expose_clear_rate_limit = expose;
        self
    }

    /// Mounts the messaging diagnostic route.
    pub fn expose_test_messaging(mut self, expose: bool) -> Self {
        self.expose_test_messaging = expose;
        self
    }

    /// Sets the fallback channel preference.
    pub fn default_preference(mut self, preference: DeliveryPreference) -> Self {
        self.default_preference = preference;
        self
    }

    /// Sets the route tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}
