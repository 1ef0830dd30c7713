//! Per-stream phase accounting.
//!
//! A stream is always in exactly one [`StreamState`]. Every transition adds
//! the time spent in the state being left to `times` and appends a
//! `(state, end_time)` entry to `state_changes`, so the sum of `times`
//! always equals `last_change_time - initial_state_time`.

use std::fmt;

use serde::Serialize;
use tracing::debug;

/// Phases a stream moves through on its send and receive paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum StreamState {
    Alloc = 0,
    QueueSend,
    ProcessSend,
    Frame,
    Write,
    WriteOther,
    Encrypt,
    Send,
    IdleSent,
    QueueRecv,
    ProcessRecv,
    Decrypt,
    Read,
    ReadOther,
    AppRecv,
    ProcessAppRecv,
    IdleRecv,
    IdleBoth,
    CleanUp,
}

/// Number of StreamState variants, used for array sizing.
pub const STREAM_STATE_CARDINALITY: usize = 19;

impl StreamState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alloc => "alloc",
            Self::QueueSend => "queue_send",
            Self::ProcessSend => "process_send",
            Self::Frame => "frame",
            Self::Write => "write",
            Self::WriteOther => "write_other",
            Self::Encrypt => "encrypt",
            Self::Send => "send",
            Self::IdleSent => "idle_sent",
            Self::QueueRecv => "queue_recv",
            Self::ProcessRecv => "process_recv",
            Self::Decrypt => "decrypt",
            Self::Read => "read",
            Self::ReadOther => "read_other",
            Self::AppRecv => "app_recv",
            Self::ProcessAppRecv => "process_app_recv",
            Self::IdleRecv => "idle_recv",
            Self::IdleBoth => "idle_both",
            Self::CleanUp => "clean_up",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Alloc,
            Self::QueueSend,
            Self::ProcessSend,
            Self::Frame,
            Self::Write,
            Self::WriteOther,
            Self::Encrypt,
            Self::Send,
            Self::IdleSent,
            Self::QueueRecv,
            Self::ProcessRecv,
            Self::Decrypt,
            Self::Read,
            Self::ReadOther,
            Self::AppRecv,
            Self::ProcessAppRecv,
            Self::IdleRecv,
            Self::IdleBoth,
            Self::CleanUp,
        ]
    }

    /// Phases that do not count toward request latency when they trail
    /// the timeline.
    const fn is_trailing(self) -> bool {
        matches!(
            self,
            Self::CleanUp | Self::IdleBoth | Self::IdleRecv | Self::IdleSent | Self::ProcessAppRecv
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of [`StreamTiming::state_change_deltas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateDelta {
    pub state: StreamState,
    pub start: u64,
    pub duration: u64,
}

#[derive(Debug, Clone)]
pub struct StreamTiming {
    pub state: StreamState,
    /// Cumulative nanoseconds spent in each state.
    pub times: [u64; STREAM_STATE_CARDINALITY],
    /// `(state, time the state ended)` in transition order.
    pub state_changes: Vec<(StreamState, u64)>,
    pub initial_state_time: u64,
    pub last_change_time: u64,
    pub is_server: bool,
    pub is_allocated: bool,
    pub is_finalized: bool,
    pub send_shutdown: bool,
    pub recv_shutdown: bool,
    pub encountered_error: bool,
    pub in_app_recv: bool,
    pub app_recv_completion: Option<u64>,
    pub first_packet_send: Option<u64>,
    pub first_packet_recv: Option<u64>,
}

impl StreamTiming {
    pub fn new() -> Self {
        Self {
            state: StreamState::Alloc,
            times: [0; STREAM_STATE_CARDINALITY],
            state_changes: Vec::new(),
            initial_state_time: 0,
            last_change_time: 0,
            is_server: false,
            is_allocated: false,
            is_finalized: false,
            send_shutdown: false,
            recv_shutdown: false,
            encountered_error: false,
            in_app_recv: false,
            app_recv_completion: None,
            first_packet_send: None,
            first_packet_recv: None,
        }
    }

    /// Anchors the timeline at the stream's first event.
    pub fn begin(&mut self, time: u64) {
        self.initial_state_time = time;
        self.last_change_time = time;
    }

    fn flag_error(&mut self, target: StreamState, time: u64) {
        debug!(
            from = self.state.as_str(),
            to = target.as_str(),
            time,
            last = self.last_change_time,
            "stream timing went backwards",
        );
        self.encountered_error = true;
    }

    /// Closes the current state at `time` without choosing the next one.
    fn close_current(&mut self, time: u64) {
        let delta = time - self.last_change_time;
        self.times[self.state as usize] += delta;
        self.state_changes.push((self.state, time));
        self.last_change_time = time;
    }

    /// Moves to `new_state` at `time`.
    pub fn update_to_state(&mut self, new_state: StreamState, time: u64) {
        self.transition(new_state, time, false);
    }

    /// Like [`StreamTiming::update_to_state`] but a `time` earlier than the
    /// last change is skipped instead of flagged. Used when the time comes
    /// from another object (a packet or a connection schedule change) that
    /// may predate this stream's latest transition.
    pub fn update_to_state_lenient(&mut self, new_state: StreamState, time: u64) {
        self.transition(new_state, time, true);
    }

    fn transition(&mut self, new_state: StreamState, time: u64, lenient: bool) {
        if self.encountered_error || self.state == new_state {
            return;
        }

        if time < self.last_change_time {
            if self.state == StreamState::Alloc
                && new_state == StreamState::QueueRecv
                && self.state_changes.is_empty()
            {
                // Data arrived before the stream existed; restart the
                // timeline from the packet.
                self.state = new_state;
                self.initial_state_time = time;
                self.last_change_time = time;
            } else if !lenient {
                self.flag_error(new_state, time);
            }
            return;
        }

        if new_state == StreamState::Frame
            && matches!(self.state, StreamState::IdleSent | StreamState::IdleBoth)
        {
            self.state = StreamState::ProcessSend;
        }
        if matches!(new_state, StreamState::Decrypt | StreamState::AppRecv)
            && matches!(self.state, StreamState::IdleRecv | StreamState::IdleBoth)
        {
            self.state = StreamState::ProcessRecv;
        }

        self.close_current(time);
        self.state = new_state;
        if new_state == StreamState::Alloc {
            self.is_allocated = true;
        }
    }

    /// Closes the current state and enters the idle phase implied by which
    /// directions have seen traffic and been shut down.
    pub fn update_to_idle(&mut self, time: u64) {
        if self.encountered_error {
            return;
        }
        if time < self.last_change_time {
            self.flag_error(StreamState::IdleBoth, time);
            return;
        }

        self.close_current(time);
        self.state = match (self.first_packet_recv, self.first_packet_send) {
            (Some(_), Some(_)) if self.send_shutdown && self.recv_shutdown => StreamState::CleanUp,
            (Some(_), Some(_)) => StreamState::IdleBoth,
            (Some(_), None) => StreamState::IdleRecv,
            (None, Some(_)) => StreamState::IdleSent,
            (None, None) => StreamState::Alloc,
        };
    }

    /// Closes the final interval at `time`. With `trim_trailing`, trailing
    /// idle, cleanup and app-receive-processing entries are removed and
    /// their time taken back out of `times`.
    pub fn finalize(&mut self, time: u64, trim_trailing: bool) {
        if self.encountered_error {
            return;
        }
        if time < self.last_change_time {
            self.flag_error(self.state, time);
            return;
        }

        self.close_current(time);
        self.is_finalized = true;

        if !trim_trailing {
            return;
        }
        while self.state_changes.len() > 1 {
            let (state, _) = self.state_changes[self.state_changes.len() - 1];
            if !state.is_trailing() {
                break;
            }
            let (_, prev_time) = self.state_changes[self.state_changes.len() - 2];
            let delta = self.last_change_time.saturating_sub(prev_time);
            let slot = &mut self.times[state as usize];
            *slot = slot.saturating_sub(delta);
            self.state_changes.pop();
            self.last_change_time = prev_time;
        }
    }

    /// Each recorded state with the time it started and how long it lasted.
    pub fn state_change_deltas(&self) -> Vec<StateDelta> {
        let mut previous = self.initial_state_time;
        self.state_changes
            .iter()
            .map(|&(state, end)| {
                let delta = StateDelta {
                    state,
                    start: previous,
                    duration: end.saturating_sub(previous),
                };
                previous = end;
                delta
            })
            .collect()
    }

    pub fn time_in(&self, state: StreamState) -> u64 {
        self.times[state as usize]
    }

    pub fn total_time(&self) -> u64 {
        self.times.iter().sum()
    }

    /// Time between first receive and first send on this side.
    pub fn server_response_time(&self) -> u64 {
        match (self.first_packet_send, self.first_packet_recv) {
            (Some(send), Some(recv)) => send.saturating_sub(recv),
            _ => 0,
        }
    }

    /// Network cost estimate: this side's send-to-receive gap minus the
    /// peer's receive-to-send gap, floored at zero.
    pub fn client_network_time(&self, peer: &StreamTiming) -> u64 {
        let local = match (self.first_packet_recv, self.first_packet_send) {
            (Some(recv), Some(send)) => recv.saturating_sub(send),
            _ => 0,
        };
        local.saturating_sub(peer.server_response_time())
    }
}

impl Default for StreamTiming {
    fn default() -> Self {
        Self::new()
    }
}
