use std::sync::Arc;

use serde::Serialize;

use super::connection::Connection;
use super::flags::CapabilityFlags;
use super::key::ObjectKey;
use super::session::ObjectKind;
use super::set::{Handle, TraceObject};
use super::state::TraceState;
use crate::analysis::aggregate::SchedulingStats;
use crate::analysis::histogram::NUM_BUCKETS;
use crate::analysis::intervals::{activity_intervals, ActivityInterval};
use crate::tracer::event::{Event, EventId, EventKind, ScheduleState};

/// A transport worker thread and the connections it services.
#[derive(Debug, Clone)]
pub struct Worker {
    pub key: ObjectKey,
    pub id: u64,
    /// Unknown until an activity or processing event reveals it.
    pub thread_id: Option<u32>,
    pub ideal_processor: Option<u16>,
    pub initial_timestamp: Option<u64>,
    pub final_timestamp: Option<u64>,
    pub last_active_timestamp: Option<u64>,
    pub total_active_time: u64,
    pub total_connections: u32,
    pub current_connections: u32,
    pub scheduling: SchedulingStats,
    pub(crate) last_connection: Option<Handle<Connection>>,
    events: Vec<Arc<Event>>,
}

impl TraceObject for Worker {
    const KIND: ObjectKind = ObjectKind::Worker;
    const CREATE_EVENT: Option<EventId> = Some(EventId::WorkerCreated);
    const DESTROY_EVENT: Option<EventId> = Some(EventId::WorkerDestroyed);

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            thread_id: None,
            ideal_processor: None,
            initial_timestamp: None,
            final_timestamp: None,
            last_active_timestamp: None,
            total_active_time: 0,
            total_connections: 0,
            current_connections: 0,
            scheduling: SchedulingStats::default(),
            last_connection: None,
            events: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl Worker {
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    /// Connection this worker processed most recently, cleared when the
    /// worker goes idle.
    pub fn last_connection(&self) -> Option<Handle<Connection>> {
        self.last_connection
    }

    pub(crate) fn on_connection_added(&mut self) {
        self.total_connections += 1;
        self.current_connections += 1;
    }

    pub(crate) fn on_connection_removed(&mut self) {
        self.current_connections = self.current_connections.saturating_sub(1);
    }

    /// Narrow hook for connection events that tell the worker what it is
    /// currently servicing.
    pub(crate) fn on_connection_event(&mut self, conn: Handle<Connection>, evt: &Event) {
        match evt.kind {
            EventKind::ConnScheduleState {
                state: ScheduleState::Processing,
            } => {
                self.thread_id.get_or_insert(evt.thread_id);
                self.final_timestamp = Some(evt.timestamp);
                self.last_connection = Some(conn);
            }
            EventKind::ConnScheduleState { .. } => self.last_connection = None,
            EventKind::ConnOutFlowStats(_) => self.last_connection = Some(conn),
            _ => {}
        }
    }

    pub fn elapsed(&self) -> u64 {
        match (self.initial_timestamp, self.final_timestamp) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }

    /// Mean time connections spent queued before being processed.
    pub fn average_queue_delay_us(&self) -> u64 {
        self.scheduling.get(ScheduleState::Queued).average_us()
    }

    /// How long connections sat queued, bucketed by duration.
    pub fn queue_delay_histogram(&self) -> [u32; NUM_BUCKETS] {
        self.scheduling.get(ScheduleState::Queued).histogram
    }

    pub fn total_processing_time_us(&self) -> u64 {
        self.scheduling.get(ScheduleState::Processing).total_us()
    }

    /// Share of the worker's lifetime spent processing connections.
    pub fn active_percent(&self) -> u64 {
        let elapsed_us = self.elapsed() / 1_000;
        if elapsed_us == 0 {
            return 0;
        }
        100 * self.total_processing_time_us() / elapsed_us
    }

    pub fn activity_intervals(&self) -> Vec<ActivityInterval> {
        activity_intervals(&self.events)
    }
}

pub(crate) fn apply(state: &mut TraceState, handle: Handle<Worker>, evt: &Arc<Event>) {
    let ts = evt.timestamp;
    let worker = &mut state.workers[handle];
    worker.initial_timestamp.get_or_insert(ts);

    match evt.kind {
        EventKind::WorkerCreated {
            ideal_processor, ..
        } => worker.ideal_processor = Some(ideal_processor),
        EventKind::WorkerActivityStateUpdated { is_active, .. } => {
            state.flags.insert(CapabilityFlags::WORKER_ACTIVITY);
            worker.thread_id.get_or_insert(evt.thread_id);
            if is_active {
                worker.last_active_timestamp = Some(ts);
                worker.last_connection = None;
            } else if let Some(since) = worker.last_active_timestamp.take() {
                worker.total_active_time += ts.saturating_sub(since);
            }
        }
        _ => {}
    }

    worker.final_timestamp = Some(ts);
    worker.events.push(Arc::clone(evt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::state::TraceState;

    const MS: u64 = 1_000_000;

    fn worker_event(kind: EventKind, ts: u64) -> Event {
        Event::new(kind, ts).with_pointer(0x100).with_thread(1, 9)
    }

    fn activity(is_active: bool, ts: u64) -> Event {
        worker_event(EventKind::WorkerActivityStateUpdated { is_active, arg: 0 }, ts)
    }

    #[test]
    fn test_activity_accumulates_active_time() {
        let mut state = TraceState::default();
        state.add_event(worker_event(
            EventKind::WorkerCreated {
                ideal_processor: 3,
                owner: 0,
            },
            0,
        ));
        state.add_event(activity(true, 10));
        state.add_event(activity(false, 40));
        state.add_event(activity(false, 45));
        state.add_event(activity(true, 50));
        state.add_event(activity(false, 70));

        let workers = state.workers();
        assert_eq!(workers.len(), 1);
        let w = workers[0];
        assert_eq!(w.ideal_processor, Some(3));
        assert_eq!(w.thread_id, Some(9));
        assert_eq!(w.total_active_time, 50);
        assert_eq!(w.activity_intervals().len(), 2);
        assert!(state
            .capability_flags()
            .contains(CapabilityFlags::WORKER_ACTIVITY));
    }

    #[test]
    fn test_derived_metrics() {
        let mut w = Worker::new(ObjectKey::resolve(0x1, 8, 1), 1);
        w.initial_timestamp = Some(0);
        w.final_timestamp = Some(100 * MS);
        w.scheduling.add_cpu_time(ScheduleState::Processing, 40 * MS);
        w.scheduling.add_cpu_time(ScheduleState::Queued, 10 * MS);
        w.scheduling.add_cpu_time(ScheduleState::Queued, 30 * MS);

        assert_eq!(w.total_processing_time_us(), 40_000);
        assert_eq!(w.average_queue_delay_us(), 20_000);
        assert_eq!(w.active_percent(), 40);
        let queued = w.queue_delay_histogram();
        assert_eq!(queued[5], 2);
        assert_eq!(queued[4], 0);
        assert_eq!(queued.iter().sum::<u32>(), 2);
    }

    #[test]
    fn test_zero_elapsed_is_zero_percent() {
        let w = Worker::new(ObjectKey::resolve(0x1, 8, 1), 1);
        assert_eq!(w.active_percent(), 0);
    }

    #[test]
    fn test_connection_counts_saturate() {
        let mut w = Worker::new(ObjectKey::resolve(0x1, 8, 1), 1);
        w.on_connection_added();
        w.on_connection_removed();
        w.on_connection_removed();
        assert_eq!(w.total_connections, 1);
        assert_eq!(w.current_connections, 0);
    }
}
