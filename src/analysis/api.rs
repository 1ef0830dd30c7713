//! API call reconstruction from enter/exit pairs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::tracer::event::{ApiType, Event, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiCall {
    pub api: ApiType,
    /// Processor the call entered on; the exit may land elsewhere.
    pub processor: u16,
    pub process_id: u32,
    pub thread_id: u32,
    pub timestamp: u64,
    pub duration: u64,
    pub handle: u64,
    /// Zero for exits that carry no status.
    pub status: u32,
}

fn thread_slot(process_id: u32, thread_id: u32) -> u64 {
    (u64::from(process_id) << 32) | u64::from(thread_id)
}

/// Pairs each exit with the oldest unmatched enter on the same thread.
///
/// Nested or overlapping calls on one thread pair in arrival order and may
/// mis-pair; exits with no pending enter are dropped.
pub fn api_calls(events: &[Arc<Event>]) -> Vec<ApiCall> {
    let mut pending: HashMap<u64, VecDeque<(&Event, ApiType, u64)>> = HashMap::new();
    let mut out = Vec::new();

    for evt in events {
        let status = match evt.kind {
            EventKind::ApiEnter { api, handle } => {
                pending
                    .entry(thread_slot(evt.process_id, evt.thread_id))
                    .or_default()
                    .push_back((evt.as_ref(), api, handle));
                continue;
            }
            EventKind::ApiExit => 0,
            EventKind::ApiExitStatus { status } => status,
            _ => continue,
        };

        let slot = thread_slot(evt.process_id, evt.thread_id);
        let Some((start, api, handle)) = pending.get_mut(&slot).and_then(VecDeque::pop_front)
        else {
            continue;
        };
        out.push(ApiCall {
            api,
            processor: start.processor,
            process_id: start.process_id,
            thread_id: start.thread_id,
            timestamp: start.timestamp,
            duration: evt.timestamp.saturating_sub(start.timestamp),
            handle,
            status,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enter(api: ApiType, tid: u32, ts: u64) -> Arc<Event> {
        Arc::new(
            Event::new(EventKind::ApiEnter { api, handle: 0xfeed }, ts)
                .with_thread(4, tid)
                .with_processor(1),
        )
    }

    fn exit(status: Option<u32>, tid: u32, ts: u64) -> Arc<Event> {
        let kind = match status {
            Some(status) => EventKind::ApiExitStatus { status },
            None => EventKind::ApiExit,
        };
        Arc::new(Event::new(kind, ts).with_thread(4, tid).with_processor(6))
    }

    #[test]
    fn test_pairs_per_thread() {
        let events = vec![
            enter(ApiType::StreamSend, 1, 100),
            enter(ApiType::ConnectionOpen, 2, 110),
            exit(None, 2, 130),
            exit(Some(7), 1, 160),
        ];
        let calls = api_calls(&events);
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].api, ApiType::ConnectionOpen);
        assert_eq!(calls[0].duration, 20);
        assert_eq!(calls[0].status, 0);

        assert_eq!(calls[1].api, ApiType::StreamSend);
        assert_eq!(calls[1].duration, 60);
        assert_eq!(calls[1].status, 7);
        assert_eq!(calls[1].processor, 1);
        assert_eq!(calls[1].handle, 0xfeed);
    }

    #[test]
    fn test_unmatched_exit_is_dropped() {
        let events = vec![exit(None, 1, 5), enter(ApiType::SetParam, 1, 10)];
        assert!(api_calls(&events).is_empty());
    }

    #[test]
    fn test_nested_calls_pair_first_in_first_out() {
        let events = vec![
            enter(ApiType::StreamOpen, 1, 0),
            enter(ApiType::StreamStart, 1, 10),
            exit(None, 1, 20),
            exit(None, 1, 50),
        ];
        let calls = api_calls(&events);
        assert_eq!(calls[0].api, ApiType::StreamOpen);
        assert_eq!(calls[0].duration, 20);
        assert_eq!(calls[1].api, ApiType::StreamStart);
        assert_eq!(calls[1].duration, 40);
    }
}
