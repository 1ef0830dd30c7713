//! Send packets, receive packets and send batches.
//!
//! Packets carry no history of their own; they only exist to stamp the
//! timing of the streams whose frames they carry.

use std::sync::Arc;

use tracing::debug;

use super::key::ObjectKey;
use super::session::ObjectKind;
use super::set::{Handle, TraceObject};
use super::state::TraceState;
use super::stream::Stream;
use super::timing::StreamState;
use crate::tracer::event::{Event, EventId, EventKind};

#[derive(Debug, Clone)]
pub struct SendPacket {
    pub key: ObjectKey,
    pub id: u64,
    pub create_timestamp: Option<u64>,
    /// First time any stream wrote frames into this packet.
    pub first_write: Option<u64>,
    pub encrypt_timestamp: Option<u64>,
    pub finalize_timestamp: Option<u64>,
    pub sent_timestamp: Option<u64>,
    pub(crate) batch: Option<Handle<PacketBatch>>,
    pub(crate) streams: Vec<Handle<Stream>>,
}

impl TraceObject for SendPacket {
    const KIND: ObjectKind = ObjectKind::SendPacket;
    const CREATE_EVENT: Option<EventId> = Some(EventId::PacketCreated);
    const DESTROY_EVENT: Option<EventId> = None;

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            create_timestamp: None,
            first_write: None,
            encrypt_timestamp: None,
            finalize_timestamp: None,
            sent_timestamp: None,
            batch: None,
            streams: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl SendPacket {
    pub fn streams(&self) -> &[Handle<Stream>] {
        &self.streams
    }

    pub fn batch(&self) -> Option<Handle<PacketBatch>> {
        self.batch
    }
}

#[derive(Debug, Clone)]
pub struct ReceivePacket {
    pub key: ObjectKey,
    pub id: u64,
    pub receive_timestamp: Option<u64>,
    pub decrypt_timestamp: Option<u64>,
    /// Set by the first stream that reads from the decrypted packet.
    pub decrypt_complete: Option<u64>,
}

impl TraceObject for ReceivePacket {
    const KIND: ObjectKind = ObjectKind::ReceivePacket;
    const CREATE_EVENT: Option<EventId> = Some(EventId::PacketReceive);
    const DESTROY_EVENT: Option<EventId> = None;

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            receive_timestamp: None,
            decrypt_timestamp: None,
            decrypt_complete: None,
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

/// Packets handed to the datapath in one send call.
#[derive(Debug, Clone)]
pub struct PacketBatch {
    pub key: ObjectKey,
    pub id: u64,
    pub sent_timestamp: Option<u64>,
    pub(crate) packets: Vec<Handle<SendPacket>>,
}

impl TraceObject for PacketBatch {
    const KIND: ObjectKind = ObjectKind::PacketBatch;
    const CREATE_EVENT: Option<EventId> = None;
    const DESTROY_EVENT: Option<EventId> = None;

    fn new(key: ObjectKey, id: u64) -> Self {
        Self {
            key,
            id,
            sent_timestamp: None,
            packets: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl PacketBatch {
    pub fn packets(&self) -> &[Handle<SendPacket>] {
        &self.packets
    }
}

/// Moves every stream carried by `packet` to `next` at `ts`.
fn advance_streams(state: &mut TraceState, packet: Handle<SendPacket>, next: StreamState, ts: u64) {
    for i in 0..state.send_packets[packet].streams.len() {
        let stream = state.send_packets[packet].streams[i];
        state.streams[stream].timing.update_to_state(next, ts);
    }
}

pub(crate) fn apply(state: &mut TraceState, evt: &Arc<Event>) {
    let ts = evt.timestamp;
    match evt.kind {
        EventKind::PacketCreated { batch } => {
            let packet = state.send_packets.find_or_create_active(evt, &mut state.session);
            let batch_key = ObjectKey::related(evt, batch);
            let reuse = state
                .batches
                .find_active(&batch_key)
                .is_some_and(|b| b.sent_timestamp.is_some());
            let batch = if reuse {
                state.batches.create_fresh(batch_key, &mut state.session)
            } else {
                state.batches.find_or_create(batch_key, &mut state.session)
            };
            state.batches[batch].packets.push(packet);
            let packet = &mut state.send_packets[packet];
            packet.create_timestamp = Some(ts);
            packet.batch = Some(batch);
        }
        EventKind::PacketEncrypt => {
            let packet = state.send_packets.find_or_create_active(evt, &mut state.session);
            state.send_packets[packet].encrypt_timestamp = Some(ts);
            advance_streams(state, packet, StreamState::Encrypt, ts);
        }
        EventKind::PacketFinalize => {
            let packet = state.send_packets.find_or_create_active(evt, &mut state.session);
            state.send_packets[packet].finalize_timestamp = Some(ts);
            advance_streams(state, packet, StreamState::Send, ts);
            for i in 0..state.send_packets[packet].streams.len() {
                let stream = state.send_packets[packet].streams[i];
                state.streams[stream]
                    .timing
                    .first_packet_send
                    .get_or_insert(ts);
            }
        }
        EventKind::PacketBatchSent => {
            let key = ObjectKey::of_event(evt);
            let Some(batch) = state.batches.active_handle(&key) else {
                debug!(batch = %key, "batch sent without packets");
                return;
            };
            state.batches[batch].sent_timestamp = Some(ts);
            for i in 0..state.batches[batch].packets.len() {
                let packet = state.batches[batch].packets[i];
                state.send_packets[packet].sent_timestamp = Some(ts);
                for j in 0..state.send_packets[packet].streams.len() {
                    let stream = state.send_packets[packet].streams[j];
                    state.streams[stream].timing.update_to_idle(ts);
                }
            }
        }
        EventKind::PacketReceive => {
            let packet = state.recv_packets.find_or_create_active(evt, &mut state.session);
            state.recv_packets[packet].receive_timestamp = Some(ts);
        }
        EventKind::PacketDecrypt => {
            let packet = state.recv_packets.find_or_create_active(evt, &mut state.session);
            state.recv_packets[packet].decrypt_timestamp = Some(ts);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(kind: EventKind, ptr: u64, ts: u64) -> Event {
        Event::new(kind, ts).with_pointer(ptr).with_thread(2, 20)
    }

    #[test]
    fn test_packets_join_batch() {
        let mut state = TraceState::default();
        state.add_event(packet(EventKind::PacketCreated { batch: 0xb }, 0x1, 1));
        state.add_event(packet(EventKind::PacketCreated { batch: 0xb }, 0x2, 2));
        state.add_event(packet(EventKind::PacketBatchSent, 0xb, 5));

        assert_eq!(state.batches.len(), 1);
        let batch = state
            .batches
            .active_handle(&ObjectKey::resolve(0xb, 8, 2))
            .map(|h| &state.batches[h]);
        assert_eq!(batch.map(|b| b.packets().len()), Some(2));
        assert_eq!(batch.and_then(|b| b.sent_timestamp), Some(5));
        assert!(state
            .send_packets
            .find_active(&ObjectKey::resolve(0x2, 8, 2))
            .is_some_and(|p| p.sent_timestamp == Some(5) && p.create_timestamp == Some(2)));
    }

    #[test]
    fn test_sent_batch_address_is_reused() {
        let mut state = TraceState::default();
        state.add_event(packet(EventKind::PacketCreated { batch: 0xb }, 0x1, 1));
        state.add_event(packet(EventKind::PacketBatchSent, 0xb, 2));
        state.add_event(packet(EventKind::PacketCreated { batch: 0xb }, 0x3, 3));

        assert_eq!(state.batches.len(), 2);
        assert_eq!(state.batches.retired_len(), 1);
    }

    #[test]
    fn test_receive_and_decrypt() {
        let mut state = TraceState::default();
        state.add_event(packet(EventKind::PacketReceive, 0x9, 4));
        state.add_event(packet(EventKind::PacketDecrypt, 0x9, 6));
        let p = state.recv_packets.find_active(&ObjectKey::resolve(0x9, 8, 2));
        assert_eq!(p.and_then(|p| p.receive_timestamp), Some(4));
        assert_eq!(p.and_then(|p| p.decrypt_timestamp), Some(6));
    }

    #[test]
    fn test_unknown_batch_is_ignored() {
        let mut state = TraceState::default();
        state.add_event(packet(EventKind::PacketBatchSent, 0xc, 5));
        assert!(state.batches.is_empty());
    }
}
