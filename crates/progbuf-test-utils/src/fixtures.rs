//! Data and logging fixtures.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing_subscriber::EnvFilter;

/// Default wait used by polling helpers.
pub const WAIT: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .with_line_number(false)
        .with_file(false)
        .try_init();
}

/// Deterministic payload where byte `i` of the stream is `(seed + i) % 251`.
///
/// `offset` is the stream position of the first byte, so chunks cut from
/// the same stream line up when reassembled.
#[must_use]
pub fn pattern(offset: u64, len: usize, seed: u8) -> Bytes {
    (0..len as u64)
        .map(|i| ((u64::from(seed) + offset + i) % 251) as u8)
        .collect::<Vec<_>>()
        .into()
}

/// Poll `check` until it returns true or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
