//! Interval pairing over an object's event history.
//!
//! Each function keeps one "last relevant event" and closes an interval
//! when the next event of the same family arrives. Values carried by an
//! interval always come from the event that opened it.

use std::sync::Arc;

use serde::Serialize;

use crate::tracer::event::{Event, EventKind, ExecutionType, FlowBlockedFlags, ScheduleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleInterval {
    pub timestamp: u64,
    pub duration: u64,
    pub thread_id: u32,
    pub state: ScheduleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowBlockedInterval {
    pub timestamp: u64,
    pub duration: u64,
    pub flags: FlowBlockedFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionInterval {
    pub timestamp: u64,
    pub thread_id: u32,
    pub processor: u16,
    pub duration: u64,
    pub exec: ExecutionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityInterval {
    pub timestamp: u64,
    pub duration: u64,
    pub processor: u16,
}

/// Consecutive schedule-state changes of a connection.
pub fn schedule_intervals(events: &[Arc<Event>]) -> Vec<ScheduleInterval> {
    let mut out = Vec::new();
    let mut last: Option<(&Event, ScheduleState)> = None;

    for evt in events {
        let EventKind::ConnScheduleState { state } = evt.kind else {
            continue;
        };
        if let Some((prev, prev_state)) = last {
            out.push(ScheduleInterval {
                timestamp: prev.timestamp,
                duration: evt.timestamp.saturating_sub(prev.timestamp),
                thread_id: prev.thread_id,
                state: prev_state,
            });
        }
        last = Some((evt.as_ref(), state));
    }
    out
}

fn close_blocked(
    out: &mut Vec<FlowBlockedInterval>,
    (start, flags): (u64, FlowBlockedFlags),
    end: u64,
) {
    if !flags.is_empty() {
        out.push(FlowBlockedInterval {
            timestamp: start,
            duration: end.saturating_sub(start),
            flags,
        });
    }
}

fn blocked_reasons(kind: &EventKind) -> Option<FlowBlockedFlags> {
    match kind {
        EventKind::ConnOutFlowBlocked { reasons } | EventKind::StreamOutFlowBlocked { reasons } => {
            Some(*reasons)
        }
        _ => None,
    }
}

/// Periods during which the object reported at least one blocked reason.
/// The trailing period is closed at `final_timestamp`. Periods with no
/// reasons (the object was unblocked) are not emitted.
pub fn flow_blocked_intervals(
    events: &[Arc<Event>],
    final_timestamp: u64,
) -> Vec<FlowBlockedInterval> {
    let mut out = Vec::new();
    let mut last: Option<(u64, FlowBlockedFlags)> = None;

    for evt in events {
        let Some(reasons) = blocked_reasons(&evt.kind) else {
            continue;
        };
        if let Some(prev) = last {
            close_blocked(&mut out, prev, evt.timestamp);
        }
        last = Some((evt.timestamp, reasons));
    }
    if let Some(prev) = last {
        close_blocked(&mut out, prev, final_timestamp);
    }
    out
}

fn exec_type(kind: &EventKind) -> Option<ExecutionType> {
    match kind {
        EventKind::ConnExecOper { exec }
        | EventKind::ConnExecApiOper { exec }
        | EventKind::ConnExecTimerOper { exec } => Some(*exec),
        _ => None,
    }
}

/// Work items a connection executed. An execution runs from its exec event
/// to the next exec or schedule-state event; a schedule-state change ends
/// the run without starting a new one.
pub fn execution_intervals(events: &[Arc<Event>]) -> Vec<ExecutionInterval> {
    let mut out = Vec::new();
    let mut last: Option<(&Event, ExecutionType)> = None;

    for evt in events {
        let exec = exec_type(&evt.kind);
        let is_schedule = matches!(evt.kind, EventKind::ConnScheduleState { .. });
        if !is_schedule && exec.is_none() {
            continue;
        }

        if let Some((prev, prev_exec)) = last {
            out.push(ExecutionInterval {
                timestamp: prev.timestamp,
                thread_id: prev.thread_id,
                processor: prev.processor,
                duration: evt.timestamp.saturating_sub(prev.timestamp),
                exec: prev_exec,
            });
        }
        last = exec.map(|exec| (evt.as_ref(), exec));
    }
    out
}

/// Active periods of a worker, from an active update to the next inactive
/// one. Repeated active updates keep the first start.
pub fn activity_intervals(events: &[Arc<Event>]) -> Vec<ActivityInterval> {
    let mut out = Vec::new();
    let mut last: Option<&Event> = None;

    for evt in events {
        let EventKind::WorkerActivityStateUpdated { is_active, .. } = evt.kind else {
            continue;
        };
        match (is_active, last) {
            (false, Some(start)) => {
                out.push(ActivityInterval {
                    timestamp: start.timestamp,
                    duration: evt.timestamp.saturating_sub(start.timestamp),
                    processor: start.processor,
                });
                last = None;
            }
            (true, None) => last = Some(evt.as_ref()),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(kind: EventKind, ts: u64) -> Arc<Event> {
        Arc::new(Event::new(kind, ts).with_thread(1, 7).with_processor(2))
    }

    fn schedule(state: ScheduleState, ts: u64) -> Arc<Event> {
        at(EventKind::ConnScheduleState { state }, ts)
    }

    fn blocked(reasons: FlowBlockedFlags, ts: u64) -> Arc<Event> {
        at(EventKind::ConnOutFlowBlocked { reasons }, ts)
    }

    #[test]
    fn test_schedule_intervals_pair_consecutive() {
        let events = vec![
            at(
                EventKind::ConnCreated {
                    is_server: true,
                    correlation_id: 1,
                },
                0,
            ),
            schedule(ScheduleState::Processing, 10),
            schedule(ScheduleState::Idle, 50),
        ];
        assert_eq!(
            schedule_intervals(&events),
            vec![ScheduleInterval {
                timestamp: 10,
                duration: 40,
                thread_id: 7,
                state: ScheduleState::Processing,
            }]
        );
    }

    #[test]
    fn test_flow_blocked_then_unblocked() {
        let events = vec![
            blocked(FlowBlockedFlags::SCHEDULING, 0),
            blocked(FlowBlockedFlags::NONE, 30),
        ];
        assert_eq!(
            flow_blocked_intervals(&events, 100),
            vec![FlowBlockedInterval {
                timestamp: 0,
                duration: 30,
                flags: FlowBlockedFlags::SCHEDULING,
            }]
        );
    }

    #[test]
    fn test_flow_blocked_trailing_closes_at_final() {
        let events = vec![
            blocked(FlowBlockedFlags::PACING, 10),
            blocked(FlowBlockedFlags::CONGESTION_CONTROL, 25),
        ];
        let got = flow_blocked_intervals(&events, 70);
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].timestamp, 25);
        assert_eq!(got[1].duration, 45);
        assert_eq!(got[1].flags, FlowBlockedFlags::CONGESTION_CONTROL);
    }

    #[test]
    fn test_flow_blocked_accepts_stream_events() {
        let events = vec![at(
            EventKind::StreamOutFlowBlocked {
                reasons: FlowBlockedFlags::STREAM_FLOW_CONTROL,
            },
            5,
        )];
        assert_eq!(flow_blocked_intervals(&events, 9)[0].duration, 4);
    }

    #[test]
    fn test_execution_intervals_end_at_schedule_change() {
        let events = vec![
            schedule(ScheduleState::Processing, 0),
            at(
                EventKind::ConnExecOper {
                    exec: ExecutionType::OperFlushSend,
                },
                5,
            ),
            at(
                EventKind::ConnExecTimerOper {
                    exec: ExecutionType::TimerPacing,
                },
                9,
            ),
            schedule(ScheduleState::Idle, 20),
            schedule(ScheduleState::Processing, 30),
            at(EventKind::ConnHandshakeComplete, 35),
        ];
        let got = execution_intervals(&events);
        let summary: Vec<(u64, u64, ExecutionType)> =
            got.iter().map(|e| (e.timestamp, e.duration, e.exec)).collect();
        assert_eq!(
            summary,
            vec![
                (5, 4, ExecutionType::OperFlushSend),
                (9, 11, ExecutionType::TimerPacing),
            ]
        );
        assert_eq!(got[0].processor, 2);
    }

    #[test]
    fn test_activity_intervals() {
        let active = |is_active: bool, ts: u64| {
            at(EventKind::WorkerActivityStateUpdated { is_active, arg: 0 }, ts)
        };
        let events = vec![
            active(false, 0),
            active(true, 10),
            active(true, 15),
            active(false, 40),
            active(true, 50),
        ];
        assert_eq!(
            activity_intervals(&events),
            vec![ActivityInterval {
                timestamp: 10,
                duration: 30,
                processor: 2,
            }]
        );
    }
}
