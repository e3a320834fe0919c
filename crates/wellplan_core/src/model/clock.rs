//! Process-wide creation clock.
//!
//! Wall-clock milliseconds can collide when entities are created in a burst,
//! which would leave "first by creation order" to the uuid tie-break. This
//! clock never hands out the same value twice within one process.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Returns the current wall-clock time as epoch milliseconds.
pub fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Returns a strictly increasing epoch-millisecond timestamp.
pub fn next_timestamp_ms() -> i64 {
    let wall = wall_clock_ms();
    let mut last = LAST_TIMESTAMP_MS.load(Ordering::Relaxed);
    loop {
        let candidate = wall.max(last + 1);
        match LAST_TIMESTAMP_MS.compare_exchange_weak(
            last,
            candidate,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}
