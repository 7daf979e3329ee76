//! ULID-based identifiers.
//!
//! The process gets one run ID at first access; every catalog generation
//! gets a fresh ID. ULIDs are 26 characters, URL-safe and sort by creation
//! time at millisecond granularity.

use once_cell::sync::Lazy;
use ulid::Ulid;

static RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Returns the process-level run ID (same value for the process lifetime).
#[inline]
pub fn get() -> &'static str {
    &RUN_ID
}

/// Generates a fresh ULID.
#[inline]
pub fn generate() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_same_value() {
        let first = get();
        let second = get();
        assert_eq!(first, second);
        assert_eq!(first.len(), 26);
    }

    #[test]
    fn generate_returns_unique_values() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), 26);
    }
}
