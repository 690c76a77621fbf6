//! Phone number canonicalization.
//!
//! Turns user input into a canonical E.164 [`PhoneIdentity`] using a small
//! table of per-country dialing rules. Countries in the table but outside
//! the normalizer's allow-list are recognised so that structurally valid
//! foreign numbers are reported as unsupported rather than malformed.

use serde::Serialize;
use thiserror::Error;

use crate::messaging::Channel;

/// Dialing rules for one country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryRule {
    /// ISO 3166-1 alpha-2 code.
    pub iso: &'static str,
    /// Country calling code without the `+`.
    pub calling_code: &'static str,
    /// Prefix dialled before national numbers inside the country.
    pub trunk_prefix: Option<&'static str>,
    /// Accepted national number lengths.
    pub national_lengths: &'static [usize],
    /// Accepted first digits of the national number.
    pub leading_digits: &'static str,
}

impl CountryRule {
    fn accepts(&self, national: &str) -> bool {
        if !self.national_lengths.contains(&national.len()) {
            return false;
        }
        let Some(first) = national.chars().next() else {
            return false;
        };
        if !self.leading_digits.contains(first) {
            return false;
        }
        // NANP exchange codes never start with 0 or 1.
        if self.iso == "US" {
            return national[3..4].chars().all(|c| ('2'..='9').contains(&c));
        }
        true
    }
}

/// Every country the normalizer can parse.
pub const COUNTRY_RULES: &[CountryRule] = &[
    CountryRule {
        iso: "IN",
        calling_code: "91",
        trunk_prefix: Some("0"),
        national_lengths: &[10],
        leading_digits: "123456789",
    },
    CountryRule {
        iso: "US",
        calling_code: "1",
        trunk_prefix: Some("1"),
        national_lengths: &[10],
        leading_digits: "23456789",
    },
    CountryRule {
        iso: "GB",
        calling_code: "44",
        trunk_prefix: Some("0"),
        national_lengths: &[10],
        leading_digits: "1237",
    },
    CountryRule {
        iso: "AU",
        calling_code: "61",
        trunk_prefix: Some("0"),
        national_lengths: &[9],
        leading_digits: "23478",
    },
    CountryRule {
        iso: "DE",
        calling_code: "49",
        trunk_prefix: Some("0"),
        national_lengths: &[10, 11],
        leading_digits: "123456789",
    },
    CountryRule {
        iso: "FR",
        calling_code: "33",
        trunk_prefix: Some("0"),
        national_lengths: &[9],
        leading_digits: "123456789",
    },
    CountryRule {
        iso: "AE",
        calling_code: "971",
        trunk_prefix: Some("0"),
        national_lengths: &[8, 9],
        leading_digits: "234679",
    },
    CountryRule {
        iso: "SG",
        calling_code: "65",
        trunk_prefix: None,
        national_lengths: &[8],
        leading_digits: "3689",
    },
    CountryRule {
        iso: "NZ",
        calling_code: "64",
        trunk_prefix: Some("0"),
        national_lengths: &[8, 9, 10],
        leading_digits: "234679",
    },
];

/// Countries accepted unless configured otherwise.
pub const DEFAULT_SUPPORTED_COUNTRIES: &[&str] = &["IN", "US", "GB", "AU"];

/// Looks up the rules for an ISO country code.
pub fn country_rule(iso: &str) -> Option<&'static CountryRule> {
    COUNTRY_RULES
        .iter()
        .find(|rule| rule.iso.eq_ignore_ascii_case(iso))
}

/// Why a phone number was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("Phone number is required")]
    EmptyInput,

    #[error("Invalid phone number format")]
    Malformed,

    #[error("Phone numbers from {country} are not supported yet")]
    UnsupportedCountry { country: String },
}

impl PhoneError {
    /// Returns an error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PhoneError::EmptyInput => "EMPTY_INPUT",
            PhoneError::Malformed => "MALFORMED",
            PhoneError::UnsupportedCountry { .. } => "UNSUPPORTED_COUNTRY",
        }
    }
}

/// A validated phone number in E.164 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PhoneIdentity {
    e164: String,
    country: &'static str,
    national_number: String,
}

impl PhoneIdentity {
    fn new(rule: &CountryRule, national_number: String) -> Self {
        Self {
            e164: format!("+{}{}", rule.calling_code, national_number),
            country: rule.iso,
            national_number,
        }
    }

    /// The E.164 string, e.g. `+919876543210`.
    pub fn as_str(&self) -> &str {
        &self.e164
    }

    /// ISO country code.
    pub fn country(&self) -> &'static str {
        self.country
    }

    pub fn national_number(&self) -> &str {
        &self.national_number
    }

    /// International format with digit groups, e.g. `+91 98765 43210`.
    pub fn display(&self) -> String {
        let calling_code = &self.e164[1..self.e164.len() - self.national_number.len()];
        let mut out = format!("+{calling_code}");
        let mut rest = self.national_number.as_str();
        for &size in self.groups() {
            if rest.is_empty() {
                break;
            }
            let (group, tail) = rest.split_at(size.min(rest.len()));
            out.push(' ');
            out.push_str(group);
            rest = tail;
        }
        if !rest.is_empty() {
            out.push(' ');
            out.push_str(rest);
        }
        out
    }

    fn groups(&self) -> &'static [usize] {
        let first = self.national_number.as_bytes().first().copied();
        match (self.country, first) {
            ("IN", _) => &[5, 5],
            ("US", _) => &[3, 3, 4],
            ("GB", Some(b'2')) => &[2, 4, 4],
            ("GB", _) => &[4, 6],
            ("AU", Some(b'4')) => &[3, 3, 3],
            ("AU", _) => &[1, 4, 4],
            _ => &[3, 3, 4],
        }
    }

    /// Whether the number can receive mobile messages.
    ///
    /// Indian mobiles start with 7, 8 or 9; every other country is treated as mobile.
    pub fn is_mobile(&self) -> bool {
        match self.country {
            "IN" => matches!(self.national_number.as_bytes().first(), Some(b'7' | b'8' | b'9')),
            _ => true,
        }
    }

    /// The channel to use when the caller has no preference.
    pub fn preferred_channel(&self) -> Option<Channel> {
        self.is_mobile().then_some(Channel::WhatsApp)
    }

    /// Messaging-provider address for WhatsApp delivery.
    pub fn whatsapp_address(&self) -> String {
        format!("whatsapp:{}", self.e164)
    }

    /// Last four digits only, for logs.
    pub fn masked(&self) -> String {
        let tail = &self.e164[self.e164.len().saturating_sub(4)..];
        format!("***{tail}")
    }
}

impl std::fmt::Display for PhoneIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.e164)
    }
}

impl AsRef<str> for PhoneIdentity {
    fn as_ref(&self) -> &str {
        &self.e164
    }
}

/// Parses raw phone input into canonical identities.
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    default_country: String,
    supported: Vec<String>,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new("IN")
    }
}

impl PhoneNormalizer {
    /// Creates a normalizer with the given default country and the default allow-list.
    pub fn new(default_country: impl Into<String>) -> Self {
        Self {
            default_country: default_country.into().to_ascii_uppercase(),
            supported: DEFAULT_SUPPORTED_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    /// Replaces the allow-list of supported countries.
    pub fn supported_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported = countries
            .into_iter()
            .map(|c| c.into().to_ascii_uppercase())
            .collect();
        self
    }

    pub fn default_country(&self) -> &str {
        &self.default_country
    }

    /// Returns true if numbers from `iso` are accepted.
    pub fn is_supported(&self, iso: &str) -> bool {
        self.supported.iter().any(|c| c.eq_ignore_ascii_case(iso))
    }

    /// Normalizes using the default country as the hint.
    pub fn normalize_default(&self, raw: &str) -> Result<PhoneIdentity, PhoneError> {
        self.normalize(raw, &self.default_country)
    }

    /// Normalizes `raw`, reading national-format input with `country_hint`'s rules.
    pub fn normalize(&self, raw: &str, country_hint: &str) -> Result<PhoneIdentity, PhoneError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        if cleaned.is_empty() {
            return Err(PhoneError::EmptyInput);
        }

        let (international, digits) = match cleaned.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => match cleaned.strip_prefix("00") {
                Some(rest) => (true, rest),
                None => (false, cleaned.as_str()),
            },
        };
        if digits.is_empty() || digits.contains('+') {
            return Err(PhoneError::Malformed);
        }

        let identity = if international {
            parse_international(digits)?
        } else {
            let rule = country_rule(country_hint).ok_or(PhoneError::Malformed)?;
            parse_national(rule, digits)?
        };

        if !self.is_supported(identity.country) {
            return Err(PhoneError::UnsupportedCountry {
                country: identity.country.to_string(),
            });
        }
        Ok(identity)
    }
}

fn parse_international(digits: &str) -> Result<PhoneIdentity, PhoneError> {
    let rule = COUNTRY_RULES
        .iter()
        .filter(|rule| digits.starts_with(rule.calling_code))
        .max_by_key(|rule| rule.calling_code.len())
        .ok_or(PhoneError::Malformed)?;
    let national = &digits[rule.calling_code.len()..];
    validate(rule, strip_trunk(rule, national))
}

fn parse_national(rule: &CountryRule, digits: &str) -> Result<PhoneIdentity, PhoneError> {
    // A bare calling code in front of a full national number, e.g. `919876543210`.
    if let Some(national) = digits.strip_prefix(rule.calling_code) {
        if rule.accepts(national) {
            return validate(rule, national);
        }
    }
    validate(rule, strip_trunk(rule, digits))
}

fn strip_trunk<'a>(rule: &CountryRule, national: &'a str) -> &'a str {
    match rule.trunk_prefix.and_then(|trunk| national.strip_prefix(trunk)) {
        Some(stripped) if rule.accepts(stripped) => stripped,
        _ => national,
    }
}

fn validate(rule: &CountryRule, national: &str) -> Result<PhoneIdentity, PhoneError> {
    if rule.accepts(national) {
        Ok(PhoneIdentity::new(rule, national.to_string()))
    } else {
        Err(PhoneError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> PhoneNormalizer {
        PhoneNormalizer::default()
    }

    #[test]
    fn test_indian_formats() {
        let n = normalizer();
        for raw in [
            "+91 98765 43210",
            "9876543210",
            "09876543210",
            "919876543210",
            "0091-98765-43210",
            "(+91) 98765-43210",
        ] {
            let identity = n.normalize_default(raw).unwrap();
            assert_eq!(identity.as_str(), "+919876543210", "input {raw}");
            assert_eq!(identity.country(), "IN");
            assert_eq!(identity.national_number(), "9876543210");
        }
    }

    #[test]
    fn test_other_supported_countries() {
        let n = normalizer();
        assert_eq!(n.normalize("(415) 555-2222", "US").unwrap().as_str(), "+14155552222");
        assert_eq!(n.normalize("1 415 555 2222", "US").unwrap().as_str(), "+14155552222");
        assert_eq!(n.normalize_default("+1 415 555 2222").unwrap().country(), "US");
        assert_eq!(n.normalize("07700 900123", "GB").unwrap().as_str(), "+447700900123");
        assert_eq!(n.normalize_default("+44 20 7946 0958").unwrap().as_str(), "+442079460958");
        assert_eq!(n.normalize("0412 345 678", "AU").unwrap().as_str(), "+61412345678");
    }

    #[test]
    fn test_empty_input() {
        let n = normalizer();
        assert_eq!(n.normalize_default(""), Err(PhoneError::EmptyInput));
        assert_eq!(n.normalize_default("  -() "), Err(PhoneError::EmptyInput));
        assert_eq!(n.normalize_default("abc"), Err(PhoneError::EmptyInput));
    }

    #[test]
    fn test_malformed() {
        let n = normalizer();
        for raw in ["+", "12345", "98765+43210", "+91 98765", "+999 123456789", "0000000000"] {
            assert_eq!(n.normalize_default(raw), Err(PhoneError::Malformed), "input {raw}");
        }
        assert_eq!(n.normalize("4155552222", "ZZ"), Err(PhoneError::Malformed));
        assert_eq!(n.normalize("(415) 155-2222", "US"), Err(PhoneError::Malformed));
    }

    #[test]
    fn test_unsupported_country() {
        let n = normalizer();
        let err = n.normalize_default("+49 30 12345678").unwrap_err();
        assert_eq!(err, PhoneError::UnsupportedCountry { country: "DE".to_string() });
        assert_eq!(err.code(), "UNSUPPORTED_COUNTRY");
        assert_eq!(err.to_string(), "Phone numbers from DE are not supported yet");

        assert!(matches!(
            n.normalize_default("+65 9123 4567"),
            Err(PhoneError::UnsupportedCountry { .. })
        ));
    }

    #[test]
    fn test_allow_list_is_configurable() {
        let n = PhoneNormalizer::new("in").supported_countries(["IN", "DE"]);
        assert_eq!(n.normalize_default("+49 30 12345678").unwrap().country(), "DE");
        assert!(matches!(
            n.normalize_default("+1 415 555 2222"),
            Err(PhoneError::UnsupportedCountry { .. })
        ));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let n = normalizer();
        let first = n.normalize_default("98765 43210").unwrap();
        for _ in 0..10 {
            assert_eq!(n.normalize_default("98765 43210").unwrap(), first);
        }
    }

    #[test]
    fn test_display() {
        let n = normalizer();
        assert_eq!(n.normalize_default("+919876543210").unwrap().display(), "+91 98765 43210");
        assert_eq!(n.normalize_default("+14155552222").unwrap().display(), "+1 415 555 2222");
        assert_eq!(n.normalize_default("+447700900123").unwrap().display(), "+44 7700 900123");
        assert_eq!(n.normalize_default("+442079460958").unwrap().display(), "+44 20 7946 0958");
        assert_eq!(n.normalize_default("+61412345678").unwrap().display(), "+61 412 345 678");
    }

    #[test]
    fn test_mobile_and_channel() {
        let n = normalizer();
        let mobile = n.normalize_default("9876543210").unwrap();
        assert!(mobile.is_mobile());
        assert_eq!(mobile.preferred_channel(), Some(Channel::WhatsApp));
        assert_eq!(mobile.whatsapp_address(), "whatsapp:+919876543210");

        let landline = n.normalize_default("011 2345 6789").unwrap();
        assert_eq!(landline.as_str(), "+911123456789");
        assert!(!landline.is_mobile());
        assert_eq!(landline.preferred_channel(), None);

        assert!(n.normalize_default("+14155552222").unwrap().is_mobile());
    }

    #[test]
    fn test_masked() {
        let identity = normalizer().normalize_default("+919876543210").unwrap();
        assert_eq!(identity.masked(), "***3210");
    }
}
