use super::event::{ObjectType, OBJECT_TYPE_CARDINALITY};

/// Per-ObjectType ingestion counters plus a count of events dropped by the
/// parse mode.
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    counts: [u64; OBJECT_TYPE_CARDINALITY],
    filtered: u64,
}

impl EventStats {
    /// Create a new zeroed EventStats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for the given object type by one.
    pub fn record(&mut self, t: ObjectType) {
        self.record_n(t, 1);
    }

    /// Increment the counter for the given object type by n.
    pub fn record_n(&mut self, t: ObjectType, n: u64) {
        if let Some(counter) = self.counts.get_mut(t as usize) {
            *counter += n;
        }
    }

    /// Count an event that was dropped before ingestion.
    pub fn record_filtered(&mut self) {
        self.filtered += 1;
    }

    pub fn get(&self, t: ObjectType) -> u64 {
        self.counts[t as usize]
    }

    pub fn filtered(&self) -> u64 {
        self.filtered
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Non-zero entries in ObjectType order.
    pub fn snapshot(&self) -> Vec<(ObjectType, u64)> {
        ObjectType::all()
            .iter()
            .map(|t| (*t, self.counts[*t as usize]))
            .filter(|(_, v)| *v > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let mut stats = EventStats::new();
        stats.record(ObjectType::Connection);
        stats.record(ObjectType::Connection);
        stats.record(ObjectType::Stream);

        let snap = stats.snapshot();
        assert_eq!(
            snap,
            vec![(ObjectType::Connection, 2), (ObjectType::Stream, 1)]
        );
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_record_n_and_filtered() {
        let mut stats = EventStats::new();
        stats.record_n(ObjectType::Packet, 42);
        stats.record_filtered();
        assert_eq!(stats.get(ObjectType::Packet), 42);
        assert_eq!(stats.get(ObjectType::Worker), 0);
        assert_eq!(stats.filtered(), 1);
    }
}
