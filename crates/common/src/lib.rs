//! Shared error plumbing and small filesystem/time helpers used by every uasp crate.

pub mod error;
pub mod fs;

pub use error::{Error, Result};

/// Milliseconds since the Unix epoch, saturating to zero on a skewed clock.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
