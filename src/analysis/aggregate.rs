use serde::Serialize;

use super::histogram::{Histogram, NUM_BUCKETS};
use crate::tracer::event::{ScheduleState, SCHEDULE_STATE_CARDINALITY};

/// Count, total, min and max of recorded durations plus a histogram.
/// Used for per-state scheduling CPU time.
#[derive(Debug, Clone, Default)]
pub struct DurationAggregate {
    total: u64,
    count: u32,
    min: u64,
    max: u64,
    histogram: Histogram,
}

impl DurationAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a duration in nanoseconds.
    pub fn record(&mut self, value_ns: u64) {
        if self.count == 0 || value_ns < self.min {
            self.min = value_ns;
        }
        if value_ns > self.max {
            self.max = value_ns;
        }
        self.total = self.total.saturating_add(value_ns);
        self.count = self.count.saturating_add(1);
        self.histogram.record(value_ns);
    }

    pub fn snapshot(&self) -> DurationSnapshot {
        DurationSnapshot {
            total: self.total,
            count: self.count,
            min: self.min,
            max: self.max,
            histogram: self.histogram.buckets(),
        }
    }
}

/// Point-in-time view of a [`DurationAggregate`]. All values in
/// nanoseconds; min and max are zero when nothing was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationSnapshot {
    pub total: u64,
    pub count: u32,
    pub min: u64,
    pub max: u64,
    pub histogram: [u32; NUM_BUCKETS],
}

impl DurationSnapshot {
    pub fn average(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total / u64::from(self.count)
        }
    }

    pub fn average_us(&self) -> u64 {
        self.average() / 1_000
    }

    pub fn total_us(&self) -> u64 {
        self.total / 1_000
    }
}

/// Count and sum for counter-type values such as bytes per send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterAggregate {
    pub count: u64,
    pub sum: u64,
}

impl CounterAggregate {
    pub fn add(&mut self, value: u64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
    }

    pub fn mean(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum / self.count
        }
    }
}

/// Per-[`ScheduleState`] CPU time a worker spent on its connections.
#[derive(Debug, Clone, Default)]
pub struct SchedulingStats {
    states: [DurationAggregate; SCHEDULE_STATE_CARDINALITY],
}

impl SchedulingStats {
    pub fn add_cpu_time(&mut self, state: ScheduleState, delta_ns: u64) {
        self.states[state as usize].record(delta_ns);
    }

    pub fn get(&self, state: ScheduleState) -> DurationSnapshot {
        self.states[state as usize].snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_aggregate_single_value() {
        let mut agg = DurationAggregate::new();
        agg.record(5_000);

        let snap = agg.snapshot();
        assert_eq!(snap.total, 5_000);
        assert_eq!(snap.count, 1);
        assert_eq!(snap.min, 5_000);
        assert_eq!(snap.max, 5_000);
        assert_eq!(snap.histogram[1], 1);
    }

    #[test]
    fn test_duration_aggregate_multiple_values() {
        let mut agg = DurationAggregate::new();
        agg.record(10_000);
        agg.record(1_000);
        agg.record(5_000);

        let snap = agg.snapshot();
        assert_eq!(snap.total, 16_000);
        assert_eq!(snap.count, 3);
        assert_eq!(snap.min, 1_000);
        assert_eq!(snap.max, 10_000);
        assert_eq!(snap.average(), 5_333);
    }

    #[test]
    fn test_duration_aggregate_empty_snapshot() {
        let snap = DurationAggregate::new().snapshot();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.min, 0);
        assert_eq!(snap.max, 0);
        assert_eq!(snap.average(), 0);
    }

    #[test]
    fn test_counter_aggregate_mean() {
        let mut agg = CounterAggregate::default();
        assert_eq!(agg.mean(), 0);
        agg.add(100);
        agg.add(300);
        assert_eq!(agg.count, 2);
        assert_eq!(agg.sum, 400);
        assert_eq!(agg.mean(), 200);
    }

    #[test]
    fn test_scheduling_stats_by_state() {
        let mut stats = SchedulingStats::default();
        stats.add_cpu_time(ScheduleState::Processing, 40);
        stats.add_cpu_time(ScheduleState::Queued, 30_000_000);
        stats.add_cpu_time(ScheduleState::Queued, 20_000_000);

        assert_eq!(stats.get(ScheduleState::Processing).count, 1);
        assert_eq!(stats.get(ScheduleState::Processing).total, 40);
        assert_eq!(stats.get(ScheduleState::Queued).average_us(), 25_000);
        assert_eq!(stats.get(ScheduleState::Idle).count, 0);
    }
}
