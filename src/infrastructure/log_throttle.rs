//! Log Throttle
//!
//! Fixed-window limiter for repetitive warnings, keyed by error class. A
//! substrate outage would otherwise log once per request.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Log throttle configuration.
#[derive(Debug, Clone)]
pub struct LogThrottleConfig {
    /// Length of one window
    pub window: Duration,
    /// Lines allowed per class per window
    pub burst: u64,
}

impl Default for LogThrottleConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            burst: 5,
        }
    }
}

/// Per-class window state.
struct ClassState {
    window_start_ms: AtomicU64,
    emitted: AtomicU64,
    suppressed: AtomicU64,
}

impl ClassState {
    fn new(now_ms: u64) -> Self {
        Self {
            window_start_ms: AtomicU64::new(now_ms),
            emitted: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }
}

fn now_ms() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// Per-class log throttle.
pub struct LogThrottle {
    config: LogThrottleConfig,
    classes: DashMap<&'static str, ClassState>,
}

impl LogThrottle {
    pub fn new(config: LogThrottleConfig) -> Self {
        Self {
            config,
            classes: DashMap::new(),
        }
    }

    /// Ask to emit one line of `class`.
    ///
    /// Returns `Some(n)` when the line may be logged, where `n` is the
    /// number of lines suppressed since the last permitted one. Returns
    /// `None` when the line must be dropped.
    pub fn permit(&self, class: &'static str) -> Option<u64> {
        let now = now_ms();
        let window_ms = self.config.window.as_millis() as u64;

        let state = self
            .classes
            .entry(class)
            .or_insert_with(|| ClassState::new(now));

        let start = state.window_start_ms.load(Ordering::Relaxed);
        if now.saturating_sub(start) >= window_ms
            && state
                .window_start_ms
                .compare_exchange(start, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            state.emitted.store(0, Ordering::Relaxed);
        }

        if state.emitted.fetch_add(1, Ordering::Relaxed) < self.config.burst {
            Some(state.suppressed.swap(0, Ordering::Relaxed))
        } else {
            state.suppressed.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Lines currently held back for `class`.
    pub fn suppressed(&self, class: &'static str) -> u64 {
        self.classes
            .get(class)
            .map(|s| s.suppressed.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(LogThrottleConfig::default())
    }
}
