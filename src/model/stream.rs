use std::sync::Arc;

use tracing::debug;

use super::connection::Connection;
use super::flags::CapabilityFlags;
use super::key::ObjectKey;
use super::packet::{ReceivePacket, SendPacket};
use super::session::ObjectKind;
use super::set::{Handle, TraceObject};
use super::state::TraceState;
use super::timing::{StreamState, StreamTiming};
use crate::analysis::intervals::{flow_blocked_intervals, FlowBlockedInterval};
use crate::tracer::event::{Event, EventId, EventKind, ScheduleState};

#[derive(Debug, Clone)]
pub struct Stream {
    pub key: ObjectKey,
    pub id: u64,
    /// Transport stream id, known once a created or rundown event arrives.
    pub stream_id: Option<u64>,
    pub initial_timestamp: Option<u64>,
    pub final_timestamp: Option<u64>,
    pub timing: StreamTiming,
    pub(crate) connection: Option<Handle<Connection>>,
    pub(crate) send_packet: Option<Handle<SendPacket>>,
    pub(crate) recv_packet: Option<Handle<ReceivePacket>>,
    pub(crate) peer: Option<Handle<Stream>>,
    events: Vec<Arc<Event>>,
}

impl TraceObject for Stream {
    const KIND: ObjectKind = ObjectKind::Stream;
    const CREATE_EVENT: Option<EventId> = Some(EventId::StreamAlloc);
    const DESTROY_EVENT: Option<EventId> = Some(EventId::StreamDestroyed);

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            stream_id: None,
            initial_timestamp: None,
            final_timestamp: None,
            timing: StreamTiming::new(),
            connection: None,
            send_packet: None,
            recv_packet: None,
            peer: None,
            events: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl Stream {
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    pub fn connection(&self) -> Option<Handle<Connection>> {
        self.connection
    }

    /// The matching stream on the other side of the connection, if linked.
    pub fn peer(&self) -> Option<Handle<Stream>> {
        self.peer
    }

    pub fn flow_blocked_intervals(&self) -> Vec<FlowBlockedInterval> {
        flow_blocked_intervals(&self.events, self.final_timestamp.unwrap_or(0))
    }
}

fn attach_connection(state: &mut TraceState, handle: Handle<Stream>, evt: &Event, pointer: u64) {
    if state.streams[handle].connection.is_some() {
        return;
    }
    let key = ObjectKey::related(evt, pointer);
    let conn = state.connections.find_or_create(key, &mut state.session);
    state.connections[conn].on_stream_added(handle);
    state.streams[handle].connection = Some(conn);
}

/// Time the owning connection last changed schedule state.
fn connection_schedule_time(state: &TraceState, handle: Handle<Stream>) -> Option<u64> {
    state.streams[handle]
        .connection
        .and_then(|c| state.connections[c].last_schedule_timestamp)
}

fn write_frames(state: &mut TraceState, handle: Handle<Stream>, evt: &Event, pointer: u64) {
    let ts = evt.timestamp;
    let key = ObjectKey::related(evt, pointer);
    let previous = state.streams[handle].send_packet;
    let current = state.send_packets.active_handle(&key);
    state.streams[handle].send_packet = current;

    let Some(packet) = current else {
        debug!(stream = state.streams[handle].id, packet = %key, "write frames into unknown packet");
        state.streams[handle].timing.encountered_error = true;
        return;
    };

    if previous != Some(packet) {
        if let Some(scheduled) = connection_schedule_time(state, handle) {
            state.streams[handle]
                .timing
                .update_to_state_lenient(StreamState::ProcessSend, scheduled);
        }
        if let Some(created) = state.send_packets[packet].create_timestamp {
            state.streams[handle]
                .timing
                .update_to_state(StreamState::Frame, created);
        }
        match state.send_packets[packet].first_write {
            None => state.send_packets[packet].first_write = Some(ts),
            Some(first) => {
                // The packet is shared; everyone already in it waits on us.
                for i in 0..state.send_packets[packet].streams.len() {
                    let other = state.send_packets[packet].streams[i];
                    state.streams[other]
                        .timing
                        .update_to_state(StreamState::WriteOther, ts);
                }
                state.streams[handle]
                    .timing
                    .update_to_state(StreamState::WriteOther, first);
            }
        }
        state.send_packets[packet].streams.push(handle);
    }

    state.streams[handle]
        .timing
        .update_to_state(StreamState::Write, ts);
}

fn receive_frame(state: &mut TraceState, handle: Handle<Stream>, evt: &Event, pointer: u64) {
    let ts = evt.timestamp;
    let key = ObjectKey::related(evt, pointer);
    let previous = state.streams[handle].recv_packet;
    let current = state.recv_packets.active_handle(&key);
    state.streams[handle].recv_packet = current;

    let Some(packet) = current else {
        debug!(stream = state.streams[handle].id, packet = %key, "receive frame from unknown packet");
        state.streams[handle].timing.encountered_error = true;
        return;
    };
    let received = state.recv_packets[packet].receive_timestamp;
    let scheduled = connection_schedule_time(state, handle);

    if state.streams[handle].timing.first_packet_recv.is_none() {
        state.streams[handle].timing.first_packet_recv = received;
    }

    if previous != Some(packet) {
        let timing = &mut state.streams[handle].timing;
        if let Some(received) = received {
            timing.update_to_state_lenient(StreamState::QueueRecv, received);
        }
        if let Some(scheduled) = scheduled {
            timing.update_to_state_lenient(StreamState::ProcessRecv, scheduled);
        }
        let pkt = &mut state.recv_packets[packet];
        if let Some(decrypt) = pkt.decrypt_timestamp {
            timing.update_to_state(StreamState::Decrypt, decrypt);
            match pkt.decrypt_complete {
                None => pkt.decrypt_complete = Some(ts),
                Some(done) => timing.update_to_state(StreamState::ReadOther, done),
            }
        }
    }

    let stream = &mut state.streams[handle];
    if let (Some(initial), Some(received)) = (stream.initial_timestamp, received) {
        // Stream was allocated after the packet arrived.
        if initial > received && !stream.timing.is_allocated {
            stream.timing.update_to_state(StreamState::Alloc, initial);
        }
    }
    if let Some(last_seen) = stream.final_timestamp {
        if last_seen > stream.timing.last_change_time {
            stream
                .timing
                .update_to_state(StreamState::ProcessRecv, last_seen);
        }
    }
    stream.timing.update_to_state(StreamState::Read, ts);
}

pub(crate) fn apply(state: &mut TraceState, handle: Handle<Stream>, evt: &Arc<Event>) {
    let ts = evt.timestamp;
    {
        let stream = &mut state.streams[handle];
        if stream.initial_timestamp.is_none() {
            stream.initial_timestamp = Some(ts);
            stream.timing.begin(ts);
        }
    }

    match &evt.kind {
        EventKind::StreamCreated {
            connection,
            stream_id,
            is_local_owned,
        }
        | EventKind::StreamRundown {
            connection,
            stream_id,
            is_local_owned,
        } => {
            let stream = &mut state.streams[handle];
            stream.stream_id = Some(*stream_id);
            stream.timing.is_server = !*is_local_owned;
            attach_connection(state, handle, evt, *connection);
        }
        EventKind::StreamAlloc { connection } => attach_connection(state, handle, evt, *connection),
        EventKind::StreamDestroyed => {
            let trim = state.trim_trailing;
            state.streams[handle].timing.finalize(ts, trim);
        }
        EventKind::StreamOutFlowBlocked { .. } => {
            state.flags.insert(CapabilityFlags::STREAM_FLOW_BLOCKED);
        }
        EventKind::StreamSendState { state: send } => {
            let timing = &mut state.streams[handle].timing;
            if send.is_shutdown() {
                timing.send_shutdown = true;
                if timing.recv_shutdown && timing.state == StreamState::IdleBoth {
                    timing.update_to_idle(ts);
                }
            }
        }
        EventKind::StreamRecvState { state: recv } => {
            let timing = &mut state.streams[handle].timing;
            if recv.is_shutdown() {
                timing.recv_shutdown = true;
                if timing.send_shutdown && timing.state == StreamState::IdleBoth {
                    timing.update_to_idle(ts);
                }
            }
        }
        EventKind::StreamWriteFrames { packet } => write_frames(state, handle, evt, *packet),
        EventKind::StreamReceiveFrame { packet } => receive_frame(state, handle, evt, *packet),
        EventKind::StreamAppSend => {
            let processing = state.streams[handle]
                .connection
                .and_then(|c| state.connections[c].schedule_state)
                == Some(ScheduleState::Processing);
            let next = if processing {
                StreamState::ProcessSend
            } else {
                StreamState::QueueSend
            };
            state.streams[handle].timing.update_to_state(next, ts);
        }
        EventKind::StreamReceiveFrameComplete => {
            let timing = &mut state.streams[handle].timing;
            if timing.in_app_recv {
                timing.update_to_state(StreamState::AppRecv, ts);
            } else {
                timing.update_to_idle(ts);
            }
        }
        EventKind::StreamAppReceive => {
            let timing = &mut state.streams[handle].timing;
            timing.in_app_recv = true;
            timing.update_to_state(StreamState::AppRecv, ts);
            timing.app_recv_completion = None;
        }
        EventKind::StreamAppReceiveComplete => {
            let timing = &mut state.streams[handle].timing;
            timing.in_app_recv = false;
            if timing.state == StreamState::AppRecv {
                if let Some(completed) = timing.app_recv_completion {
                    timing.update_to_state(StreamState::ProcessAppRecv, completed);
                }
                timing.update_to_idle(ts);
            }
            timing.app_recv_completion = None;
        }
        EventKind::StreamAppReceiveCompleteCall => {
            state.streams[handle].timing.app_recv_completion = Some(ts);
        }
        _ => {}
    }

    let stream = &mut state.streams[handle];
    stream.final_timestamp = Some(ts);
    stream.events.push(Arc::clone(evt));
}
