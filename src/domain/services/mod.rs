mod cache_key;
mod client_address;
mod segment_resolver;

pub use cache_key::{CacheKeyBuilder, KEY_DELIMITER, PARAM_DIGEST_LEN};
pub use client_address::{AddressSource, ClientAddressResolver, ResolvedAddress};
pub use segment_resolver::{SegmentAssignment, SegmentResolver};
