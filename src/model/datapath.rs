use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::key::ObjectKey;
use super::session::ObjectKind;
use super::set::{Handle, TraceObject};
use super::state::TraceState;
use crate::analysis::aggregate::CounterAggregate;
use crate::analysis::throughput::{batching_windows, BatchingWindow};
use crate::tracer::event::{Event, EventId, EventKind};

/// A UDP socket binding owned by the datapath layer.
#[derive(Debug, Clone)]
pub struct Datapath {
    pub key: ObjectKey,
    pub id: u64,
    pub initial_timestamp: Option<u64>,
    pub final_timestamp: Option<u64>,
    pub local: Option<SocketAddr>,
    pub remote: Option<SocketAddr>,
    /// Bytes per send call.
    pub send: CounterAggregate,
    /// Bytes per receive indication.
    pub recv: CounterAggregate,
    /// Buffers handed down across all send calls.
    pub send_buffers: u64,
    events: Vec<Arc<Event>>,
}

impl TraceObject for Datapath {
    const KIND: ObjectKind = ObjectKind::Datapath;
    const CREATE_EVENT: Option<EventId> = Some(EventId::DatapathCreated);
    const DESTROY_EVENT: Option<EventId> = Some(EventId::DatapathDestroyed);

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            initial_timestamp: None,
            final_timestamp: None,
            local: None,
            remote: None,
            send: CounterAggregate::default(),
            recv: CounterAggregate::default(),
            send_buffers: 0,
            events: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl Datapath {
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    pub fn bytes_sent(&self) -> u64 {
        self.send.sum
    }

    pub fn bytes_received(&self) -> u64 {
        self.recv.sum
    }

    pub fn batching_windows(&self, resolution: Duration) -> Vec<BatchingWindow> {
        batching_windows(&self.events, resolution)
    }
}

pub(crate) fn apply(state: &mut TraceState, handle: Handle<Datapath>, evt: &Arc<Event>) {
    let dp = &mut state.datapaths[handle];
    dp.initial_timestamp.get_or_insert(evt.timestamp);

    match evt.kind {
        EventKind::DatapathCreated { local, remote } => {
            dp.local = local;
            dp.remote = remote;
        }
        EventKind::DatapathSend {
            total_size,
            buffer_count,
            local,
            remote,
            ..
        } => {
            dp.send.add(u64::from(total_size));
            dp.send_buffers += u64::from(buffer_count);
            if dp.local.is_none() {
                dp.local = local;
            }
            if dp.remote.is_none() {
                dp.remote = remote;
            }
        }
        EventKind::DatapathRecv { total_size, .. } => dp.recv.add(u64::from(total_size)),
        _ => {}
    }

    dp.final_timestamp = Some(evt.timestamp);
    dp.events.push(Arc::clone(evt));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dp_event(kind: EventKind, ts: u64) -> Event {
        Event::new(kind, ts).with_pointer(0x900).with_thread(3, 30)
    }

    fn send(size: u32, ts: u64) -> Event {
        dp_event(
            EventKind::DatapathSend {
                total_size: size,
                buffer_count: 2,
                segment_size: 1200,
                remote: None,
                local: None,
            },
            ts,
        )
    }

    #[test]
    fn test_counters_and_addresses() {
        let local: SocketAddr = "127.0.0.1:4433".parse().unwrap();
        let mut state = TraceState::default();
        state.add_event(dp_event(
            EventKind::DatapathCreated {
                local: Some(local),
                remote: None,
            },
            0,
        ));
        state.add_event(send(1000, 5));
        state.add_event(send(3000, 6));
        state.add_event(dp_event(
            EventKind::DatapathRecv {
                total_size: 500,
                segment_size: 0,
                local: None,
                remote: None,
            },
            8,
        ));

        let dps = state.datapaths();
        assert_eq!(dps.len(), 1);
        let dp = dps[0];
        assert_eq!(dp.local, Some(local));
        assert_eq!(dp.send.count, 2);
        assert_eq!(dp.send.mean(), 2000);
        assert_eq!(dp.send_buffers, 4);
        assert_eq!(dp.bytes_received(), 500);
        assert_eq!(dp.final_timestamp, Some(8));
        assert_eq!(dp.events().len(), 4);
    }

    #[test]
    fn test_destroy_retires() {
        let mut state = TraceState::default();
        state.add_event(send(10, 1));
        state.add_event(dp_event(EventKind::DatapathDestroyed, 2));
        assert_eq!(state.datapaths.active_len(), 0);
        assert_eq!(state.datapaths.retired_len(), 1);
    }
}
