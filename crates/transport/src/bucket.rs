//! The reactor's token bucket (spec.md §4.5.1): a coarse bandwidth cap
//! refilled once per tick, spent down as connections read and write.
//!
//! `None` in either config field means "unlimited": the bucket never
//! throttles and every `process` call gets an unbounded per-connection
//! cap. This mirrors `server.max_bandwidth` defaulting to unlimited in
//! spec.md §6.

/// Average bytes/tick and burst ceiling, or unlimited.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucket {
    bytes_per_tick: Option<u64>,
    max_bucket: Option<u64>,
    bucket: i64,
}

impl TokenBucket {
    pub fn unlimited() -> Self {
        TokenBucket { bytes_per_tick: None, max_bucket: None, bucket: 0 }
    }

    /// `max_bucket` defaults to `5 * bytes_per_tick` when not given, matching
    /// `server.max_bandwidth_spike`'s spec.md §6 default.
    pub fn new(bytes_per_tick: u64, max_bucket: Option<u64>) -> Self {
        TokenBucket {
            bytes_per_tick: Some(bytes_per_tick),
            max_bucket: Some(max_bucket.unwrap_or(bytes_per_tick.saturating_mul(5))),
            bucket: 0,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.bytes_per_tick.is_some()
    }

    /// Refill once per `TICK_INTERVAL` (1 second, per spec.md §4.5.1).
    pub fn tick(&mut self) {
        if let Some(bpt) = self.bytes_per_tick {
            let max = self.max_bucket.unwrap_or(bpt);
            self.bucket = (self.bucket + bpt as i64).min(max as i64);
        }
    }

    /// True when `process` should skip I/O entirely and sleep instead.
    pub fn is_exhausted(&self) -> bool {
        self.is_limited() && self.bucket <= 0
    }

    /// Advisory per-connection byte ceiling for this tick's `process`
    /// call: `floor(bucket / n_active)`. `None` when unlimited.
    pub fn per_connection_cap(&self, n_active: usize) -> Option<u64> {
        if !self.is_limited() {
            return None;
        }
        let n = n_active.max(1) as i64;
        Some((self.bucket.max(0) / n) as u64)
    }

    /// Debit bytes actually consumed by a `process` call.
    pub fn consume(&mut self, bytes: u64) {
        if self.is_limited() {
            self.bucket -= bytes as i64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_exhausts_and_has_no_cap() {
        let mut b = TokenBucket::unlimited();
        b.tick();
        assert!(!b.is_exhausted());
        assert_eq!(b.per_connection_cap(3), None);
    }

    #[test]
    fn bucket_refills_up_to_max() {
        let mut b = TokenBucket::new(1000, None);
        b.tick();
        assert_eq!(b.per_connection_cap(1), Some(1000));
        b.tick();
        assert_eq!(b.per_connection_cap(1), Some(2000));
        // default max is 5x bytes_per_tick
        for _ in 0..10 {
            b.tick();
        }
        assert_eq!(b.per_connection_cap(1), Some(5000));
    }

    #[test]
    fn consume_drains_bucket_and_can_exhaust_it() {
        let mut b = TokenBucket::new(100, Some(100));
        b.tick();
        assert!(!b.is_exhausted());
        b.consume(100);
        assert!(b.is_exhausted());
    }

    #[test]
    fn per_connection_cap_splits_evenly() {
        let mut b = TokenBucket::new(1000, Some(1000));
        b.tick();
        assert_eq!(b.per_connection_cap(4), Some(250));
    }

    #[test]
    fn explicit_spike_overrides_default() {
        let mut b = TokenBucket::new(100, Some(9000));
        for _ in 0..1000 {
            b.tick();
        }
        assert_eq!(b.per_connection_cap(1), Some(9000));
    }
}
