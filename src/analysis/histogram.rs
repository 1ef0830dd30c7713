/// Number of histogram buckets.
pub const NUM_BUCKETS: usize = 10;

/// Histogram bucket boundaries in nanoseconds.
/// 10 buckets: <1us, 1us-10us, 10us-100us, 100us-1ms, 1ms-10ms,
/// 10ms-100ms, 100ms-1s, 1s-10s, 10s-100s, 100s+.
const BOUNDARIES: [u64; 9] = [
    1_000,           // 1 microsecond
    10_000,          // 10 microseconds
    100_000,         // 100 microseconds
    1_000_000,       // 1 millisecond
    10_000_000,      // 10 milliseconds
    100_000_000,     // 100 milliseconds
    1_000_000_000,   // 1 second
    10_000_000_000,  // 10 seconds
    100_000_000_000, // 100 seconds
];

/// Display label for each bucket.
pub const BUCKET_LABELS: [&str; NUM_BUCKETS] = [
    "<1us", "<10us", "<100us", "<1ms", "<10ms", "<100ms", "<1s", "<10s", "<100s", ">=100s",
];

/// Exponential histogram with 10 buckets for durations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    buckets: [u32; NUM_BUCKETS],
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a duration in nanoseconds.
    pub fn record(&mut self, value_ns: u64) {
        let idx = bucket_index(value_ns);
        self.buckets[idx] = self.buckets[idx].saturating_add(1);
    }

    /// Bucket counts: [<1us, 1us-10us, 10us-100us, ..., 100s+].
    pub fn buckets(&self) -> [u32; NUM_BUCKETS] {
        self.buckets
    }
}

/// Returns the bucket index for a given value in nanoseconds.
fn bucket_index(value_ns: u64) -> usize {
    BOUNDARIES
        .iter()
        .position(|&boundary| value_ns < boundary)
        .unwrap_or(NUM_BUCKETS - 1)
}

/// Upper bound of each bucket in nanoseconds. The last bucket is
/// unbounded and reported as 0.
pub fn bucket_boundaries() -> [u64; NUM_BUCKETS] {
    let mut out = [0u64; NUM_BUCKETS];
    out[..BOUNDARIES.len()].copy_from_slice(&BOUNDARIES);
    out
}
