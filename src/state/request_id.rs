use std::sync::atomic::{AtomicU64, Ordering};

/// Cheap unique ids: a random per-process seed mixed with a counter.
pub(crate) struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        let seed_hi = u128::from(fastrand::u64(..));
        let seed_lo = u128::from(fastrand::u64(..));
        Self {
            seed: (seed_hi << 64) | seed_lo,
            counter: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub(crate) fn next_uuid(&self) -> uuid::Uuid {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        uuid::Uuid::from_u128(self.seed ^ u128::from(seq))
    }

    /// `chatcmpl-` followed by 32 hex digits.
    #[must_use]
    pub(crate) fn next_completion_id(&self) -> String {
        let mut buf = [0u8; uuid::fmt::Simple::LENGTH];
        let hex = self.next_uuid().simple().encode_lower(&mut buf);
        let mut out = String::with_capacity(9 + hex.len());
        out.push_str("chatcmpl-");
        out.push_str(hex);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_ids_are_unique_and_prefixed() {
        let ids = RequestIdGenerator::new();
        let first = ids.next_completion_id();
        let second = ids.next_completion_id();
        assert!(first.starts_with("chatcmpl-"));
        assert_eq!(first.len(), 9 + 32);
        assert_ne!(first, second);
    }
}
