//! minting of stable, per-session [`ClientRequestId`]s.

use std::sync::atomic::{AtomicU64, Ordering};

use dp_wire::ClientRequestId;

/// monotonic id generator, unique within one open-stream session. binning a
/// frame into several outbound messages mints one id per message; callers
/// see the full list via the read-only accessor the facade returns.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn next_id(&self) -> ClientRequestId {
        ClientRequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let gen = RequestIdGenerator::new();
        let ids: Vec<_> = (0..100).map(|_| gen.next_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }
}
