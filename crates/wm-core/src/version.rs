//! Migration version identifiers.
//!
//! A version is the numeric prefix of a migration file name, kept verbatim
//! (`"003"`) for display and for the tracking table, and parsed (`3`) for
//! ordering. Two versions with the same numeric value are never both valid in
//! one migration set; discovery rejects them.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Ordered identifier of a migration unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationVersion {
    number: u64,
    raw: String,
}

impl MigrationVersion {
    /// Parse a version from its textual form.
    ///
    /// Returns `None` unless `raw` is a non-empty run of ASCII digits that
    /// fits in a `u64`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number = raw.parse::<u64>().ok()?;
        Some(Self {
            number,
            raw: raw.to_string(),
        })
    }

    /// Numeric value used for ordering.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Textual form as written in the file name and the tracking table.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Zero-padded textual form of `number`, matching `width` digits.
    pub fn formatted(number: u64, width: usize) -> Self {
        Self {
            number,
            raw: format!("{:0width$}", number, width = width),
        }
    }
}

impl Ord for MigrationVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number
            .cmp(&other.number)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for MigrationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for MigrationVersion {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl PartialEq<str> for MigrationVersion {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialEq<&str> for MigrationVersion {
    fn eq(&self, other: &&str) -> bool {
        self.raw == *other
    }
}

impl Serialize for MigrationVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_digits() {
        let v = MigrationVersion::parse("003").unwrap();
        assert_eq!(v.number(), 3);
        assert_eq!(v.as_str(), "003");
        assert_eq!(v.to_string(), "003");
    }

    #[test]
    fn parse_rejects_non_digits() {
        assert!(MigrationVersion::parse("").is_none());
        assert!(MigrationVersion::parse("v1").is_none());
        assert!(MigrationVersion::parse("1a").is_none());
        assert!(MigrationVersion::parse("-1").is_none());
        assert!(MigrationVersion::parse("99999999999999999999999").is_none());
    }

    #[test]
    fn ordering_is_numeric_not_textual() {
        let nine = MigrationVersion::parse("9").unwrap();
        let ten = MigrationVersion::parse("10").unwrap();
        assert!(nine < ten);
        assert!("9" > "10");
    }

    #[test]
    fn formatted_pads_to_width() {
        assert_eq!(MigrationVersion::formatted(7, 3).as_str(), "007");
        assert_eq!(MigrationVersion::formatted(1234, 3).as_str(), "1234");
    }

    #[test]
    fn serializes_as_plain_string() {
        let v = MigrationVersion::parse("042").unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"042\"");
    }
}
