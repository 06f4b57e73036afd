use once_cell::sync::Lazy;
use std::time::Instant;

/// Process-wide monotonic epoch, fixed on first use.
static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds since the process monotonic epoch.
///
/// Readings are non-decreasing and unaffected by wall-clock adjustments;
/// consecutive calls may return equal values. Event headers are stamped
/// with this at publish time. Zero is reserved as the "unstamped" sentinel,
/// which a real reading cannot produce after the epoch is initialized.
pub fn now_ns() -> u64 {
    MONOTONIC_EPOCH.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_are_monotonic() {
        let a = now_ns();
        let b = now_ns();
        let c = now_ns();
        assert!(a <= b && b <= c);
    }
}
