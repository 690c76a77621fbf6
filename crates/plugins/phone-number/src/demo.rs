//! Showcase identities that bypass rate limiting and real delivery.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::phone::{PhoneError, PhoneIdentity, PhoneNormalizer};

/// Role granted to a demo identity after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoRole {
    Superadmin,
    BusinessAdmin,
    Employee,
}

/// A fixed showcase login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoIdentity {
    /// Phone number, canonicalized when the policy is built.
    pub phone: String,
    /// The fixed code that logs this identity in.
    pub code: String,
    pub role: DemoRole,
    #[serde(default, alias = "restaurant_name")]
    pub restaurant_name: Option<String>,
    /// Whether the user still goes through role selection.
    #[serde(default, alias = "requires_role_selection")]
    pub requires_role_selection: bool,
}

impl DemoIdentity {
    pub fn new(phone: impl Into<String>, code: impl Into<String>, role: DemoRole) -> Self {
        Self {
            phone: phone.into(),
            code: code.into(),
            role,
            restaurant_name: None,
            requires_role_selection: false,
        }
    }

    pub fn restaurant(mut self, name: impl Into<String>) -> Self {
        self.restaurant_name = Some(name.into());
        self
    }

    pub fn with_role_selection(mut self, required: bool) -> Self {
        self.requires_role_selection = required;
        self
    }
}

/// The identities shipped for demos.
pub fn default_identities() -> Vec<DemoIdentity> {
    vec![
        DemoIdentity::new("+919876543210", "123456", DemoRole::BusinessAdmin)
            .restaurant("Demo Restaurant"),
        DemoIdentity::new("+919876543211", "654321", DemoRole::Employee),
        DemoIdentity::new("+14155552222", "111111", DemoRole::BusinessAdmin)
            .with_role_selection(true),
    ]
}

/// Why a configured demo identity was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemoConfigError {
    #[error(transparent)]
    Phone(#[from] PhoneError),

    #[error("demo code for {phone} must be one or more digits")]
    InvalidCode { phone: String },
}

/// Read-only lookup table of demo identities keyed by E.164 phone.
#[derive(Debug, Clone)]
pub struct DemoPolicy {
    identities: HashMap<String, DemoIdentity>,
    expiry_minutes: u32,
}

impl Default for DemoPolicy {
    fn default() -> Self {
        Self::from_identities(default_identities(), 30)
    }
}

impl DemoPolicy {
    /// A policy with no demo identities.
    pub fn disabled() -> Self {
        Self::from_identities(Vec::new(), 30)
    }

    /// Builds a policy from identities whose phones are already canonical.
    pub fn from_identities(identities: Vec<DemoIdentity>, expiry_minutes: u32) -> Self {
        Self {
            identities: identities
                .into_iter()
                .map(|identity| (identity.phone.clone(), identity))
                .collect(),
            expiry_minutes,
        }
    }

    /// Builds a policy, canonicalizing each configured phone with `normalizer`.
    ///
    /// Every code must be a non-empty run of ASCII digits, otherwise the
    /// identity could never pass the verification format guard.
    pub fn from_config(
        identities: Vec<DemoIdentity>,
        expiry_minutes: u32,
        normalizer: &PhoneNormalizer,
    ) -> Result<Self, DemoConfigError> {
        let identities = identities
            .into_iter()
            .map(|mut identity| {
                identity.phone = normalizer.normalize_default(&identity.phone)?.as_str().to_string();
                if identity.code.is_empty() || !identity.code.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(DemoConfigError::InvalidCode { phone: identity.phone });
                }
                Ok(identity)
            })
            .collect::<Result<Vec<_>, DemoConfigError>>()?;
        Ok(Self::from_identities(identities, expiry_minutes))
    }

    /// Returns the demo identity for `phone`, if any.
    pub fn lookup(&self, phone: &PhoneIdentity) -> Option<&DemoIdentity> {
        self.identities.get(phone.as_str())
    }

    /// Lifetime of demo records.
    pub fn ttl(&self) -> Duration {
        Duration::minutes(i64::from(self.expiry_minutes))
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_identities() {
        let policy = DemoPolicy::default();
        let normalizer = PhoneNormalizer::default();
        assert_eq!(policy.len(), 3);
        assert_eq!(policy.ttl(), Duration::minutes(30));

        let admin = policy
            .lookup(&normalizer.normalize_default("98765 43210").unwrap())
            .unwrap();
        assert_eq!(admin.role, DemoRole::BusinessAdmin);
        assert_eq!(admin.restaurant_name.as_deref(), Some("Demo Restaurant"));
        assert_eq!(admin.code, "123456");
        assert!(!admin.requires_role_selection);

        let staff = policy
            .lookup(&normalizer.normalize_default("9876543211").unwrap())
            .unwrap();
        assert_eq!(staff.role, DemoRole::Employee);
        assert_eq!(staff.code, "654321");

        let us = policy
            .lookup(&normalizer.normalize_default("+1 (415) 555-2222").unwrap())
            .unwrap();
        assert_eq!(us.code, "111111");
        assert!(us.requires_role_selection);

        assert!(policy
            .lookup(&normalizer.normalize_default("+919876543219").unwrap())
            .is_none());
    }

    #[test]
    fn test_from_config_canonicalizes() {
        let normalizer = PhoneNormalizer::default();
        let policy = DemoPolicy::from_config(
            vec![DemoIdentity::new("098765 43212", "654321", DemoRole::Superadmin)],
            60,
            &normalizer,
        )
        .unwrap();

        let identity = policy
            .lookup(&normalizer.normalize_default("+919876543212").unwrap())
            .unwrap();
        assert_eq!(identity.phone, "+919876543212");
        assert_eq!(identity.role, DemoRole::Superadmin);
        assert_eq!(policy.ttl(), Duration::minutes(60));
    }

    #[test]
    fn test_from_config_rejects_bad_phone() {
        let result = DemoPolicy::from_config(
            vec![DemoIdentity::new("12", "123456", DemoRole::Employee)],
            30,
            &PhoneNormalizer::default(),
        );
        assert_eq!(result.unwrap_err(), DemoConfigError::Phone(PhoneError::Malformed));
    }

    #[test]
    fn test_from_config_rejects_non_numeric_code() {
        let normalizer = PhoneNormalizer::default();
        for code in ["12ab", "", "12 34", "１２３４"] {
            let err = DemoPolicy::from_config(
                vec![DemoIdentity::new("9876543212", code, DemoRole::Employee)],
                30,
                &normalizer,
            )
            .unwrap_err();
            assert_eq!(
                err,
                DemoConfigError::InvalidCode {
                    phone: "+919876543212".to_string()
                },
                "code {code:?}"
            );
        }
    }

    #[test]
    fn test_deserialize_identity() {
        let identity: DemoIdentity = serde_json::from_value(serde_json::json!({
            "phone": "+919876543211",
            "code": "123456",
            "role": "employee",
            "requires_role_selection": true
        }))
        .unwrap();
        assert_eq!(identity.role, DemoRole::Employee);
        assert!(identity.requires_role_selection);
        assert!(identity.restaurant_name.is_none());
    }

    #[test]
    fn test_disabled_policy() {
        let policy = DemoPolicy::disabled();
        assert!(policy.is_empty());
        assert!(policy
            .lookup(&PhoneNormalizer::default().normalize_default("+919876543210").unwrap())
            .is_none());
    }
}
