//! Two-part `domain.object_id` identifiers.
//!
//! The same shape addresses entities (`light.kitchen`) and services
//! (`light.turn_on`). Identifiers are canonicalised to lower case when they
//! are built, so every comparison, hash and map lookup is case-insensitive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const SEPARATOR: char = '.';

/// A validated, lower-cased `domain.object_id` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    value: String,
    split: usize,
}

impl Identifier {
    /// Parse `domain.object_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifierFormat`] unless the input
    /// contains exactly one `.` with a non-empty part on each side.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.to_lowercase();
        let mut parts = value.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(domain), Some(object_id), None)
                if !domain.is_empty() && !object_id.is_empty() =>
            {
                let split = domain.len();
                Ok(Self { value, split })
            }
            _ => Err(ValidationError::InvalidIdentifierFormat(raw.to_string())),
        }
    }

    /// Build an identifier from its two halves.
    ///
    /// # Errors
    ///
    /// Same rules as [`parse`](Self::parse); a `.` inside either half is
    /// rejected.
    pub fn new(domain: &str, object_id: &str) -> Result<Self, ValidationError> {
        Self::parse(&format!("{domain}{SEPARATOR}{object_id}"))
    }

    /// Whether `raw` would parse.
    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.value[..self.split]
    }

    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.value[self.split + 1..]
    }

    /// The canonical `domain.object_id` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.value
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_split_domain_and_object_id() {
        let id = Identifier::parse("light.kitchen").unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "kitchen");
        assert_eq!(id.as_str(), "light.kitchen");
    }

    #[test]
    fn should_lowercase_when_parsing_mixed_case() {
        let id = Identifier::parse("Light.Kitchen").unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "kitchen");
        assert_eq!(id, Identifier::parse("light.kitchen").unwrap());
    }

    #[test]
    fn should_reject_identifier_without_separator() {
        assert_eq!(
            Identifier::parse("bad"),
            Err(ValidationError::InvalidIdentifierFormat("bad".to_string()))
        );
    }

    #[test]
    fn should_reject_identifier_with_empty_part() {
        assert!(Identifier::parse(".kitchen").is_err());
        assert!(Identifier::parse("light.").is_err());
        assert!(Identifier::parse(".").is_err());
        assert!(Identifier::parse("").is_err());
    }

    #[test]
    fn should_reject_identifier_with_two_separators() {
        assert!(Identifier::parse("light.kitchen.main").is_err());
        assert!(Identifier::new("light", "kitchen.main").is_err());
    }

    #[test]
    fn should_build_from_halves() {
        let id = Identifier::new("Switch", "Porch").unwrap();
        assert_eq!(id.to_string(), "switch.porch");
    }

    #[test]
    fn should_report_validity() {
        assert!(Identifier::is_valid("sensor.outside"));
        assert!(!Identifier::is_valid("sensor"));
    }

    #[test]
    fn should_roundtrip_through_serde_json_as_plain_string() {
        let id = Identifier::parse("sensor.outside").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sensor.outside\"");
        let parsed: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_fail_deserializing_malformed_identifier() {
        let result = serde_json::from_str::<Identifier>("\"nodot\"");
        assert!(result.is_err());
    }
}
