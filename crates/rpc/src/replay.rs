use parking_lot::Mutex;
use std::collections::HashMap;

/// How often expired digests are swept, in call-timestamp milliseconds.
const SWEEP_INTERVAL_MS: u64 = 10_000;

/// Digests of signed write calls accepted within the clock-skew window.
///
/// A call older than the window is already rejected as stale, so a digest
/// only has to be remembered until its timestamp leaves the window.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    inner: Mutex<SeenCalls>,
}

#[derive(Debug, Default)]
struct SeenCalls {
    digests: HashMap<[u8; 32], u64>,
    last_sweep_ms: u64,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `digest` as applied. Returns `false` if it was already seen.
    pub fn check_and_mark(
        &self,
        digest: [u8; 32],
        timestamp_ms: u64,
        now_ms: u64,
        window_ms: u64,
    ) -> bool {
        let mut seen = self.inner.lock();
        if now_ms.saturating_sub(seen.last_sweep_ms) >= SWEEP_INTERVAL_MS {
            seen.digests.retain(|_, ts| now_ms.saturating_sub(*ts) <= window_ms);
            seen.last_sweep_ms = now_ms;
        }

        if seen.digests.contains_key(&digest) {
            return false;
        }
        seen.digests.insert(digest, timestamp_ms);
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().digests.len()
    }
}
