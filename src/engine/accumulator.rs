use tracing::debug;

/// Buffered time is written out in chunks of this size.
pub const DEFAULT_FLUSH_THRESHOLD_MS: u64 = 10_000;

/// Collects tracked deltas and releases them in fixed-size chunks.
///
/// Also keeps the total released since the last forced flush, which is what
/// gets mirrored to the remote store at each boundary.
#[derive(Debug, Clone)]
pub struct FlushAccumulator {
    threshold_ms: u64,
    buffered_ms: u64,
    run_total_ms: u64,
}

impl FlushAccumulator {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms: threshold_ms.max(1),
            buffered_ms: 0,
            run_total_ms: 0,
        }
    }

    /// Adds `delta_ms` and returns every full chunk that is now due.
    pub fn push(&mut self, delta_ms: u64) -> Vec<u64> {
        self.buffered_ms = self.buffered_ms.saturating_add(delta_ms);
        let mut chunks = Vec::new();
        while self.buffered_ms >= self.threshold_ms {
            self.buffered_ms -= self.threshold_ms;
            self.run_total_ms = self.run_total_ms.saturating_add(self.threshold_ms);
            chunks.push(self.threshold_ms);
        }
        chunks
    }

    /// Drains whatever is buffered, however small. `None` when empty.
    pub fn force_flush(&mut self) -> Option<u64> {
        if self.buffered_ms == 0 {
            return None;
        }
        let amount = std::mem::take(&mut self.buffered_ms);
        self.run_total_ms = self.run_total_ms.saturating_add(amount);
        Some(amount)
    }

    /// Total released since the previous call, resetting it to zero.
    pub fn take_run_total(&mut self) -> u64 {
        std::mem::take(&mut self.run_total_ms)
    }

    /// Drops buffered time without releasing it. Returns what was lost.
    pub fn discard(&mut self) -> u64 {
        let lost = std::mem::take(&mut self.buffered_ms);
        self.run_total_ms = 0;
        if lost > 0 {
            debug!("[FLUSH] Discarded {}ms of buffered time", lost);
        }
        lost
    }

    pub fn buffered_ms(&self) -> u64 {
        self.buffered_ms
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    pub fn run_total_ms(&self) -> u64 {
        self.run_total_ms
    }
}

impl Default for FlushAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_THRESHOLD_MS)
    }
}
