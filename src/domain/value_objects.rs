//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// The single country whose visitors form the home market.
pub const HOME_COUNTRY: &str = "TR";

/// Sentinel used when no country could be determined.
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

/// Coarse visitor classification.
///
/// Drives both the content language and the partitioning of every
/// cached artifact. A response cached for one segment is never
/// served to the other because the segment is part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Segment {
    /// Home-market visitors
    Local,
    /// Everybody else, including visitors whose country is unknown
    Global,
}

impl Segment {
    /// Parse a segment from its wire form.
    ///
    /// Only the exact values `LOCAL` and `GLOBAL` are accepted; this is
    /// what the override cookie carries, and anything else is ignored.
    ///
    /// # Examples
    /// ```
    /// use segment_cache::Segment;
    ///
    /// assert_eq!(Segment::parse("LOCAL"), Some(Segment::Local));
    /// assert_eq!(Segment::parse("local"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOCAL" => Some(Self::Local),
            "GLOBAL" => Some(Self::Global),
            _ => None,
        }
    }

    /// Map a detected country to its segment.
    pub fn from_country(country: &CountryCode) -> Self {
        if country.is_home() {
            Self::Local
        } else {
            Self::Global
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Global => "GLOBAL",
        }
    }

    /// Landing path for visitors of this segment.
    pub fn landing_path(&self) -> &'static str {
        match self {
            Self::Local => "/tr/",
            Self::Global => "/en/",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content language, derived 1:1 from the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Tr,
}

impl Locale {
    pub fn for_segment(segment: Segment) -> Self {
        match segment {
            Segment::Local => Self::Tr,
            Segment::Global => Self::En,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Tr => "tr",
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ISO 3166-1 alpha-2 country code, or the `UNKNOWN` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    /// Normalize a raw code.
    ///
    /// Codes are trimmed and uppercased. Anything that is not two ASCII
    /// alphanumerics collapses to `UNKNOWN`.
    pub fn new(raw: &str) -> Self {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Self(code)
        } else {
            Self::unknown()
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_COUNTRY.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_COUNTRY
    }

    /// Whether this is the home-market country.
    pub fn is_home(&self) -> bool {
        self.0 == HOME_COUNTRY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CountryCode {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
