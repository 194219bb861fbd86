//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod log_throttle;
pub mod shutdown;
pub mod timeout_store;

pub use log_throttle::{LogThrottle, LogThrottleConfig};
pub use shutdown::shutdown_signal;
pub use timeout_store::{StoreTimeouts, TimeoutCacheStore};
