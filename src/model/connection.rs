use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::flags::CapabilityFlags;
use super::key::ObjectKey;
use super::session::ObjectKind;
use super::set::{Handle, TraceObject};
use super::state::TraceState;
use super::stream::Stream;
use super::worker::Worker;
use crate::analysis::intervals::{
    execution_intervals, flow_blocked_intervals, schedule_intervals, ExecutionInterval,
    FlowBlockedInterval, ScheduleInterval,
};
use crate::analysis::sampler::{raw_tput_samples, RawTputSample};
use crate::analysis::throughput::{throughput, ThroughputSample};
use crate::tracer::event::{Event, EventId, EventKind, ScheduleState};

/// Lifecycle of a connection as far as the trace shows it. Not every trace
/// observes every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    Unknown,
    Allocated,
    Started,
    HandshakeComplete,
    Shutdown,
    Closed,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Allocated => "allocated",
            Self::Started => "started",
            Self::HandshakeComplete => "handshake_complete",
            Self::Shutdown => "shutdown",
            Self::Closed => "closed",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Unknown,
            Self::Allocated,
            Self::Started,
            Self::HandshakeComplete,
            Self::Shutdown,
            Self::Closed,
        ]
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub key: ObjectKey,
    pub id: u64,
    pub correlation_id: Option<u64>,
    pub state: ConnectionState,
    pub is_server: Option<bool>,
    pub is_handshake_complete: Option<bool>,
    pub is_app_shutdown: Option<bool>,
    pub is_shutdown_remote: Option<bool>,
    pub initial_timestamp: Option<u64>,
    pub final_timestamp: Option<u64>,
    pub shutdown_timestamp: Option<u64>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub(crate) worker: Option<Handle<Worker>>,
    pub(crate) streams: Vec<Handle<Stream>>,
    pub(crate) schedule_state: Option<ScheduleState>,
    pub(crate) last_schedule_timestamp: Option<u64>,
    events: Vec<Arc<Event>>,
}

impl TraceObject for Connection {
    const KIND: ObjectKind = ObjectKind::Connection;
    const CREATE_EVENT: Option<EventId> = Some(EventId::ConnCreated);
    const DESTROY_EVENT: Option<EventId> = Some(EventId::ConnDestroyed);

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            correlation_id: None,
            state: ConnectionState::Unknown,
            is_server: None,
            is_handshake_complete: None,
            is_app_shutdown: None,
            is_shutdown_remote: None,
            initial_timestamp: None,
            final_timestamp: None,
            shutdown_timestamp: None,
            bytes_sent: 0,
            bytes_received: 0,
            worker: None,
            streams: Vec::new(),
            schedule_state: None,
            last_schedule_timestamp: None,
            events: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl Connection {
    /// Every event attributed to this connection, including datapath sends
    /// forwarded from the worker thread that serviced it.
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    pub fn worker(&self) -> Option<Handle<Worker>> {
        self.worker
    }

    pub fn streams(&self) -> &[Handle<Stream>] {
        &self.streams
    }

    pub fn schedule_state(&self) -> Option<ScheduleState> {
        self.schedule_state
    }

    pub fn last_schedule_timestamp(&self) -> Option<u64> {
        self.last_schedule_timestamp
    }

    pub(crate) fn on_stream_added(&mut self, stream: Handle<Stream>) {
        self.streams.push(stream);
    }

    pub fn schedule_intervals(&self) -> Vec<ScheduleInterval> {
        schedule_intervals(&self.events)
    }

    pub fn flow_blocked_intervals(&self) -> Vec<FlowBlockedInterval> {
        flow_blocked_intervals(&self.events, self.final_timestamp.unwrap_or(0))
    }

    pub fn execution_intervals(&self) -> Vec<ExecutionInterval> {
        execution_intervals(&self.events)
    }

    pub fn raw_tput_samples(&self) -> Vec<RawTputSample> {
        raw_tput_samples(&self.events)
    }

    pub fn throughput(&self, resolution: Duration) -> Vec<ThroughputSample> {
        throughput(&self.events, resolution)
    }
}

/// Attaches the worker running on the event's thread, if the connection
/// has none yet.
fn try_set_worker(state: &mut TraceState, handle: Handle<Connection>, evt: &Event) {
    if state.connections[handle].worker.is_some() {
        return;
    }
    if let Some(worker) = state.worker_for_thread(evt.process_id, evt.thread_id) {
        state.connections[handle].worker = Some(worker);
        state.workers[worker].on_connection_added();
    }
}

pub(crate) fn apply(state: &mut TraceState, handle: Handle<Connection>, evt: &Arc<Event>) {
    let ts = evt.timestamp;
    state.connections[handle].initial_timestamp.get_or_insert(ts);

    match &evt.kind {
        EventKind::ConnCreated {
            is_server,
            correlation_id,
        }
        | EventKind::ConnRundown {
            is_server,
            correlation_id,
        } => {
            let conn = &mut state.connections[handle];
            conn.correlation_id = Some(*correlation_id);
            conn.state = ConnectionState::Allocated;
            conn.is_server = Some(*is_server);
            conn.is_handshake_complete = Some(false);
        }
        EventKind::ConnHandshakeComplete => {
            let conn = &mut state.connections[handle];
            conn.state = ConnectionState::HandshakeComplete;
            conn.is_handshake_complete = Some(true);
        }
        EventKind::ConnScheduleState { state: next } => {
            state.flags.insert(CapabilityFlags::CONNECTION_SCHEDULE);
            if *next == ScheduleState::Processing {
                try_set_worker(state, handle, evt);
            }
            let conn = &mut state.connections[handle];
            // Time since the previous change belongs to the state being left.
            if let (Some(since), Some(prev), Some(worker)) =
                (conn.last_schedule_timestamp, conn.schedule_state, conn.worker)
            {
                state.workers[worker]
                    .scheduling
                    .add_cpu_time(prev, ts.saturating_sub(since));
            }
            conn.last_schedule_timestamp = Some(ts);
            conn.schedule_state = Some(*next);
        }
        EventKind::ConnExecOper { .. }
        | EventKind::ConnExecApiOper { .. }
        | EventKind::ConnExecTimerOper { .. } => {
            state.flags.insert(CapabilityFlags::CONNECTION_EXEC);
            try_set_worker(state, handle, evt);
        }
        EventKind::ConnAssignWorker { worker } => {
            if let Some(old) = state.connections[handle].worker {
                state.workers[old].on_connection_removed();
            }
            let key = ObjectKey::related(evt, *worker);
            let new = state.workers.find_or_create(key, &mut state.session);
            state.workers[new].on_connection_added();
            state.connections[handle].worker = Some(new);
        }
        EventKind::ConnTransportShutdown { is_remote, .. } => {
            let conn = &mut state.connections[handle];
            conn.state = ConnectionState::Shutdown;
            conn.is_app_shutdown = Some(false);
            conn.is_shutdown_remote = Some(*is_remote);
            conn.shutdown_timestamp = Some(ts);
        }
        EventKind::ConnAppShutdown { is_remote, .. } => {
            let conn = &mut state.connections[handle];
            conn.state = ConnectionState::Shutdown;
            conn.is_app_shutdown = Some(true);
            conn.is_shutdown_remote = Some(*is_remote);
            conn.shutdown_timestamp = Some(ts);
        }
        EventKind::ConnHandleClosed => {
            state.connections[handle].state = ConnectionState::Closed;
        }
        EventKind::ConnOutFlowStats(stats) => {
            state.flags.insert(CapabilityFlags::CONNECTION_TPUT);
            state.connections[handle].bytes_sent = stats.bytes_sent;
            try_set_worker(state, handle, evt);
        }
        EventKind::ConnOutFlowBlocked { reasons } => {
            if !reasons.is_empty() {
                state.flags.insert(CapabilityFlags::CONNECTION_FLOW_BLOCKED);
            }
        }
        EventKind::ConnInFlowStats { bytes_recv } => {
            state.flags.insert(CapabilityFlags::CONNECTION_TPUT);
            state.connections[handle].bytes_received = *bytes_recv;
            try_set_worker(state, handle, evt);
        }
        EventKind::ConnStats(stats) => {
            state.flags.insert(CapabilityFlags::CONNECTION_TPUT);
            let conn = &mut state.connections[handle];
            conn.bytes_sent = stats.send_total_bytes;
            conn.bytes_received = stats.recv_total_bytes;
        }
        _ => {}
    }

    let conn = &mut state.connections[handle];
    conn.final_timestamp = Some(ts);
    if let Some(worker) = conn.worker {
        state.workers[worker].on_connection_event(handle, evt);
    }
    conn.events.push(Arc::clone(evt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::event::{FlowBlockedFlags, OutFlowStats};

    const CONN: u64 = 0x2000;
    const WORKER: u64 = 0x1000;

    fn conn_event(kind: EventKind, ts: u64) -> Event {
        Event::new(kind, ts).with_pointer(CONN).with_thread(5, 77)
    }

    fn created(ts: u64) -> Event {
        conn_event(
            EventKind::ConnCreated {
                is_server: true,
                correlation_id: 42,
            },
            ts,
        )
    }

    fn schedule(state: ScheduleState, ts: u64) -> Event {
        conn_event(EventKind::ConnScheduleState { state }, ts)
    }

    fn worker_on_thread(state: &mut TraceState) {
        state.add_event(
            Event::new(EventKind::WorkerActivityStateUpdated { is_active: true, arg: 0 }, 0)
                .with_pointer(WORKER)
                .with_thread(5, 77),
        );
    }

    #[test]
    fn test_schedule_credits_state_being_left() {
        let mut state = TraceState::default();
        worker_on_thread(&mut state);
        state.add_event(created(0));
        state.add_event(schedule(ScheduleState::Processing, 10));
        state.add_event(schedule(ScheduleState::Idle, 50));

        let conn = state.connections()[0];
        assert_eq!(conn.state, ConnectionState::Allocated);
        assert_eq!(conn.is_server, Some(true));
        assert_eq!(conn.correlation_id, Some(42));
        assert_eq!(
            conn.schedule_intervals(),
            vec![ScheduleInterval {
                timestamp: 10,
                duration: 40,
                thread_id: 77,
                state: ScheduleState::Processing,
            }]
        );

        let worker = state.workers()[0];
        let processing = worker.scheduling.get(ScheduleState::Processing);
        assert_eq!(processing.count, 1);
        assert_eq!(processing.total, 40);
        assert_eq!(worker.scheduling.get(ScheduleState::Idle).count, 0);
        assert_eq!(worker.total_connections, 1);
        assert!(worker.last_connection().is_none());
    }

    #[test]
    fn test_first_schedule_event_is_not_credited() {
        let mut state = TraceState::default();
        worker_on_thread(&mut state);
        state.add_event(schedule(ScheduleState::Processing, 10));
        let worker = state.workers()[0];
        assert_eq!(worker.scheduling.get(ScheduleState::Processing).count, 0);
        assert!(worker.last_connection().is_some());
    }

    #[test]
    fn test_assign_worker_moves_connection() {
        let mut state = TraceState::default();
        worker_on_thread(&mut state);
        state.add_event(created(0));
        state.add_event(schedule(ScheduleState::Processing, 5));
        state.add_event(conn_event(EventKind::ConnAssignWorker { worker: 0x3000 }, 8));

        let workers = state.workers();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].current_connections, 0);
        assert_eq!(workers[1].key.pointer, 0x3000);
        assert_eq!(workers[1].current_connections, 1);

        let conn = state.connections()[0];
        assert_eq!(
            conn.worker().and_then(|h| state.worker(h)).map(|w| w.key.pointer),
            Some(0x3000)
        );
    }

    #[test]
    fn test_shutdown_and_close() {
        let mut state = TraceState::default();
        state.add_event(created(0));
        state.add_event(conn_event(EventKind::ConnHandshakeComplete, 3));
        state.add_event(conn_event(
            EventKind::ConnAppShutdown {
                error_code: 0,
                is_remote: true,
            },
            9,
        ));
        let conn = state.connections()[0];
        assert_eq!(conn.state, ConnectionState::Shutdown);
        assert_eq!(conn.is_handshake_complete, Some(true));
        assert_eq!(conn.is_app_shutdown, Some(true));
        assert_eq!(conn.is_shutdown_remote, Some(true));
        assert_eq!(conn.shutdown_timestamp, Some(9));

        state.add_event(conn_event(EventKind::ConnHandleClosed, 12));
        assert_eq!(state.connections()[0].state, ConnectionState::Closed);
    }

    #[test]
    fn test_flow_stats_and_flags() {
        let mut state = TraceState::default();
        state.add_event(created(0));
        state.add_event(conn_event(
            EventKind::ConnOutFlowStats(OutFlowStats {
                bytes_sent: 1_400,
                ..OutFlowStats::default()
            }),
            4,
        ));
        state.add_event(conn_event(EventKind::ConnInFlowStats { bytes_recv: 900 }, 6));
        state.add_event(conn_event(
            EventKind::ConnOutFlowBlocked {
                reasons: FlowBlockedFlags::NONE,
            },
            7,
        ));

        let flags = state.capability_flags();
        assert!(flags.contains(CapabilityFlags::CONNECTION_TPUT));
        assert!(!flags.contains(CapabilityFlags::CONNECTION_FLOW_BLOCKED));

        state.add_event(conn_event(
            EventKind::ConnOutFlowBlocked {
                reasons: FlowBlockedFlags::SCHEDULING,
            },
            8,
        ));
        assert!(state
            .capability_flags()
            .contains(CapabilityFlags::CONNECTION_FLOW_BLOCKED));

        let conn = state.connections()[0];
        assert_eq!(conn.bytes_sent, 1_400);
        assert_eq!(conn.bytes_received, 900);
        assert_eq!(conn.events().len(), 5);
    }

    #[test]
    fn test_flow_blocked_interval_closes_at_unblock() {
        let mut state = TraceState::default();
        state.add_event(conn_event(
            EventKind::ConnOutFlowBlocked {
                reasons: FlowBlockedFlags::SCHEDULING,
            },
            0,
        ));
        state.add_event(conn_event(
            EventKind::ConnOutFlowBlocked {
                reasons: FlowBlockedFlags::NONE,
            },
            30,
        ));
        state.add_event(conn_event(EventKind::ConnHandleClosed, 100));
        state.finalize();

        let conn = state.connections()[0];
        assert_eq!(conn.final_timestamp, Some(100));
        assert_eq!(
            conn.flow_blocked_intervals(),
            vec![FlowBlockedInterval {
                timestamp: 0,
                duration: 30,
                flags: FlowBlockedFlags::SCHEDULING,
            }]
        );
    }
}
