use std::sync::atomic::{AtomicU64, Ordering};

pub fn set_panic_hook() {
    // When the `console_error_panic_hook` feature is enabled, we can call the
    // `set_panic_hook` function at least once during initialization, and then
    // we will get better error messages if our code ever panics.
    //
    // For more details see
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

static FRESH_ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Mint a session-unique id. The millisecond salt keeps ids from a previous
/// session (still referenced by a persisted journal) from colliding with ones
/// minted after a reload.
pub(crate) fn fresh_id(prefix: &str) -> String {
    let sequence = FRESH_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{prefix}-{millis}-{sequence}")
}

/// Placeholder unique id for a line the server hasn't confirmed yet.
pub(crate) fn fresh_placeholder_id() -> String {
    fresh_id("local")
}

/// Correlation id for a queued task.
pub(crate) fn fresh_correlation_id() -> String {
    fresh_id("task")
}
