//! Cache Key Builder
//!
//! Deterministic derivation of cache keys from a logical operation name,
//! the visitor's segment and locale, and caller-supplied parameters.
//!
//! Keys contain no randomness, counters or timestamps, so identical inputs
//! produce identical keys across restarts and instances.

use crate::domain::entities::{CacheKey, RequestGeoContext};
use crate::domain::value_objects::{Locale, Segment};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Separator between key components.
pub const KEY_DELIMITER: &str = ":";

/// Hex characters kept from a parameter digest.
pub const PARAM_DIGEST_LEN: usize = 12;

/// Cache key builder.
///
/// Layout: `<logical>:<SEGMENT>:<locale>[:<name>:<value>...]` with extra
/// parameters sorted by name.
///
/// Every component is escaped: `%`, glob metacharacters and (inside
/// parameters) `:` are percent-encoded, and a component spelled exactly
/// like a segment is disguised. The segment slot is therefore the only
/// place `:LOCAL:` or `:GLOBAL:` can appear in a key. Logical names keep
/// their `:` namespace separators.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build a key from explicit components.
    pub fn build<'a, I>(logical_name: &str, segment: Segment, locale: Locale, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let sorted: BTreeMap<&str, &str> = params.into_iter().collect();

        let mut parts = vec![
            escape_logical(logical_name),
            segment.as_str().to_string(),
            locale.as_str().to_string(),
        ];
        for (name, value) in sorted {
            parts.push(format!("{}{}{}", escape(name), KEY_DELIMITER, escape(value)));
        }

        CacheKey::new(parts.join(KEY_DELIMITER))
    }

    /// Build a key for the current request.
    pub fn for_context<'a, I>(logical_name: &str, ctx: &RequestGeoContext, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::build(logical_name, ctx.segment, ctx.locale, params)
    }

    /// Reduce an unbounded parameter set to a fixed-width digest.
    ///
    /// Order-independent: pairs are sorted before hashing. Repeated names
    /// are all kept.
    pub fn digest<'a, I>(pairs: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
        pairs.sort_unstable();

        let mut hasher = Sha256::new();
        for (name, value) in pairs {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }

        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(PARAM_DIGEST_LEN);
        hex
    }

    /// Glob matching every key of one segment.
    pub fn segment_pattern(segment: Segment) -> String {
        format!("*{d}{}{d}*", segment.as_str(), d = KEY_DELIMITER)
    }

    /// Glob matching every key under a logical name.
    pub fn logical_pattern(logical_name: &str) -> String {
        format!("{}{}*", escape_logical(logical_name), KEY_DELIMITER)
    }
}

fn escape_logical(name: &str) -> String {
    name.split(KEY_DELIMITER)
        .map(escape)
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '*' => out.push_str("%2A"),
            '?' => out.push_str("%3F"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            '\\' => out.push_str("%5C"),
            _ => out.push(c),
        }
    }

    // Only the segment slot may read as a segment.
    if Segment::parse(&out).is_some() {
        return format!("%{:02X}{}", out.as_bytes()[0], &out[1..]);
    }
    out
}
