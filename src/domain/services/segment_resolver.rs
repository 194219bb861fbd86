//! Segment Resolver
//!
//! Pure mapping from detected country and sticky preference to the
//! visitor's segment and locale.

use crate::domain::value_objects::{CountryCode, Locale, Segment};

/// Result of segment assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentAssignment {
    pub segment: Segment,
    pub locale: Locale,
    pub override_applied: bool,
}

/// Segment resolver.
///
/// The home-market country maps to LOCAL, every other code (including
/// `UNKNOWN`) to GLOBAL. A valid override value always wins; an invalid
/// one is ignored.
pub struct SegmentResolver;

impl SegmentResolver {
    pub fn resolve(country: &CountryCode, override_view: Option<&str>) -> SegmentAssignment {
        let detected = Segment::from_country(country);

        let (segment, override_applied) = match override_view.and_then(Segment::parse) {
            Some(forced) => (forced, true),
            None => (detected, false),
        };

        SegmentAssignment {
            segment,
            locale: Locale::for_segment(segment),
            override_applied,
        }
    }
}
