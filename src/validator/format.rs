use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// `YYYY-MM-DDThh:mm:ss[.fff|.ffffff](Z|±hh:mm)`, T and Z case-insensitive.
static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d{3}|\.\d{6})?([Zz]|[+-]\d{2}:\d{2})$")
        .expect("date-time pattern is valid")
});

static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

// Versions 1-4 only.
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-4][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("uuid pattern is valid")
});

/// `format` keyword of a string schema.
///
/// Only `date-time`, `date` and `uuid` are checked; every other format name is
/// kept for diagnostics and accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringFormat {
    DateTime,
    Date,
    Uuid,
    Other(String),
}

impl StringFormat {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "date-time" => StringFormat::DateTime,
            "date" => StringFormat::Date,
            "uuid" => StringFormat::Uuid,
            other => StringFormat::Other(other.to_string()),
        }
    }

    /// Whether `value` satisfies the format.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringFormat::DateTime => DATE_TIME.is_match(value),
            StringFormat::Date => DATE.is_match(value),
            StringFormat::Uuid => UUID.is_match(value),
            StringFormat::Other(_) => true,
        }
    }
}

impl fmt::Display for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringFormat::DateTime => f.write_str("date-time"),
            StringFormat::Date => f.write_str("date"),
            StringFormat::Uuid => f.write_str("uuid"),
            StringFormat::Other(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_time() {
        let f = StringFormat::DateTime;
        assert!(f.matches("2024-02-29T12:30:00Z"));
        assert!(f.matches("2024-02-29t12:30:00z"));
        assert!(f.matches("2024-02-29T12:30:00.123+02:00"));
        assert!(f.matches("2024-02-29T12:30:00.123456-05:30"));
        assert!(!f.matches("2024-02-29T12:30:00.12Z"));
        assert!(!f.matches("2024-02-29 12:30:00Z"));
        assert!(!f.matches("2024-02-29T12:30:00"));
    }

    #[test]
    fn test_date() {
        assert!(StringFormat::Date.matches("1999-12-31"));
        assert!(!StringFormat::Date.matches("1999-12-31T00:00:00Z"));
        assert!(!StringFormat::Date.matches("99-12-31"));
    }

    #[test]
    fn test_uuid_versions() {
        let f = StringFormat::Uuid;
        assert!(f.matches("3b241101-e2bb-4255-8caf-4136c566a962"));
        assert!(f.matches("3B241101-E2BB-1255-8CAF-4136C566A962"));
        // version 5 is outside the accepted range
        assert!(!f.matches("3b241101-e2bb-5255-8caf-4136c566a962"));
        assert!(!f.matches("3b241101e2bb42558caf4136c566a962"));
    }

    #[test]
    fn test_unknown_formats_pass() {
        let f = StringFormat::parse("email");
        assert_eq!(f, StringFormat::Other("email".to_string()));
        assert!(f.matches("definitely not an email"));
    }
}
