//! The top-level aggregate every event flows through.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::connection::{self, Connection};
use super::datapath::{self, Datapath};
use super::flags::CapabilityFlags;
use super::packet::{self, PacketBatch, ReceivePacket, SendPacket};
use super::session::Session;
use super::set::{Handle, LiveSet};
use super::stream::{self, Stream};
use super::worker::{self, Worker};
use crate::analysis::api::{api_calls, ApiCall};
use crate::config::ParseMode;
use crate::tracer::event::{Event, EventId, EventKind, ObjectType};
use crate::tracer::stats::EventStats;

/// Reconstructed model of a trace. Feed events in timestamp order with
/// [`TraceState::add_event`], then call [`TraceState::finalize`] once.
pub struct TraceState {
    pub(crate) session: Session,
    pub(crate) trim_trailing: bool,
    pub(crate) flags: CapabilityFlags,
    pub(crate) workers: LiveSet<Worker>,
    pub(crate) connections: LiveSet<Connection>,
    pub(crate) streams: LiveSet<Stream>,
    pub(crate) datapaths: LiveSet<Datapath>,
    pub(crate) send_packets: LiveSet<SendPacket>,
    pub(crate) recv_packets: LiveSet<ReceivePacket>,
    pub(crate) batches: LiveSet<PacketBatch>,
    /// Connection each thread last touched, for datapath sends that no
    /// worker can attribute.
    last_connection_by_thread: HashMap<(u32, u32), Handle<Connection>>,
    events: Vec<Arc<Event>>,
    stats: EventStats,
    finalized: bool,
}

impl TraceState {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            session: Session::new(mode),
            trim_trailing: true,
            flags: CapabilityFlags::NONE,
            workers: LiveSet::new(),
            connections: LiveSet::new(),
            streams: LiveSet::new(),
            datapaths: LiveSet::new(),
            send_packets: LiveSet::new(),
            recv_packets: LiveSet::new(),
            batches: LiveSet::new(),
            last_connection_by_thread: HashMap::new(),
            events: Vec::new(),
            stats: EventStats::new(),
            finalized: false,
        }
    }

    /// Whether trailing idle and cleanup phases are cut from stream timing
    /// when streams are finalized.
    pub fn with_trim_trailing(mut self, trim: bool) -> Self {
        self.trim_trailing = trim;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Folds one event into the model. Events after [`TraceState::finalize`]
    /// are ignored.
    pub fn add_event(&mut self, event: Event) {
        if self.finalized {
            return;
        }
        if self.session.mode() == ParseMode::Filtered && event.kind.is_diagnostic() {
            self.stats.record_filtered();
            return;
        }

        self.stats.record(event.object_type);
        let evt = Arc::new(event);

        match evt.object_type {
            ObjectType::Global => {
                if matches!(
                    evt.id(),
                    Some(EventId::ApiEnter | EventId::ApiExit | EventId::ApiExitStatus)
                ) {
                    self.flags.insert(CapabilityFlags::API);
                }
            }
            ObjectType::Worker => {
                self.flags.insert(CapabilityFlags::WORKER);
                let handle = self.workers.find_or_create_active(&evt, &mut self.session);
                worker::apply(self, handle, &evt);
            }
            ObjectType::Connection => {
                self.flags.insert(CapabilityFlags::CONNECTION);
                let handle = self
                    .connections
                    .find_or_create_active(&evt, &mut self.session);
                connection::apply(self, handle, &evt);
                self.last_connection_by_thread
                    .insert((evt.process_id, evt.thread_id), handle);
            }
            ObjectType::Stream => {
                self.flags.insert(CapabilityFlags::STREAM);
                let handle = self.streams.find_or_create_active(&evt, &mut self.session);
                stream::apply(self, handle, &evt);
            }
            ObjectType::Datapath => {
                self.flags.insert(CapabilityFlags::DATAPATH);
                let handle = self.datapaths.find_or_create_active(&evt, &mut self.session);
                datapath::apply(self, handle, &evt);
                if matches!(evt.kind, EventKind::DatapathSend { .. }) {
                    if let Some(conn) = self.send_attribution(&evt) {
                        connection::apply(self, conn, &evt);
                    }
                }
            }
            ObjectType::Packet => {
                self.flags.insert(CapabilityFlags::PACKET);
                packet::apply(self, &evt);
            }
            _ => {}
        }

        self.events.push(evt);
    }

    /// Connection a datapath send on this thread belongs to: the one the
    /// thread's worker is servicing, else the one the thread last touched.
    /// Connections that are no longer active never receive sends.
    fn send_attribution(&self, evt: &Event) -> Option<Handle<Connection>> {
        let conn = self
            .worker_for_thread(evt.process_id, evt.thread_id)
            .and_then(|w| self.workers[w].last_connection)
            .or_else(|| {
                self.last_connection_by_thread
                    .get(&(evt.process_id, evt.thread_id))
                    .copied()
            })?;
        let key = self.connections[conn].key;
        (self.connections.active_handle(&key) == Some(conn)).then_some(conn)
    }

    /// Closes out stream timing and retires every live object. Only the
    /// first call has any effect.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let final_ts = self.final_timestamp();
        for handle in self.streams.active_handles() {
            let timing = &mut self.streams[handle].timing;
            if !timing.is_finalized {
                timing.finalize(final_ts, self.trim_trailing);
            }
        }

        self.workers.finalize();
        self.connections.finalize();
        self.streams.finalize();
        self.datapaths.finalize();
        self.send_packets.finalize();
        self.recv_packets.finalize();
        self.batches.finalize();
        self.finalized = true;

        info!(
            events = self.events.len(),
            workers = self.workers.len(),
            connections = self.connections.len(),
            streams = self.streams.len(),
            datapaths = self.datapaths.len(),
            flags = %self.flags,
            "trace ingestion finished"
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Timestamp of the last ingested event, or 0 for an empty trace.
    pub fn final_timestamp(&self) -> u64 {
        self.events.last().map_or(0, |e| e.timestamp)
    }

    /// Worker running on `(process_id, thread_id)`. Active workers win over
    /// retired ones.
    pub fn worker_for_thread(&self, process_id: u32, thread_id: u32) -> Option<Handle<Worker>> {
        let matches =
            |w: &Worker| w.key.process_id == process_id && w.thread_id == Some(thread_id);
        self.workers
            .find_active_where(matches)
            .or_else(|| self.workers.find_retired_where(matches))
    }

    /// Pairs two streams, one per endpoint, carrying the same request.
    pub fn link_stream_peers(&mut self, a: Handle<Stream>, b: Handle<Stream>) {
        if a == b {
            return;
        }
        self.streams[a].peer = Some(b);
        self.streams[b].peer = Some(a);
    }

    /// Network time seen from the client side of a linked stream pair.
    pub fn client_network_time(&self, handle: Handle<Stream>) -> Option<u64> {
        let stream = self.streams.get(handle)?;
        let peer = self.streams.get(stream.peer?)?;
        Some(stream.timing.client_network_time(&peer.timing))
    }

    pub fn capability_flags(&self) -> CapabilityFlags {
        self.flags
    }

    pub fn stats(&self) -> &EventStats {
        &self.stats
    }

    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    pub fn api_calls(&self) -> Vec<ApiCall> {
        api_calls(&self.events)
    }

    pub fn workers(&self) -> Vec<&Worker> {
        self.workers.objects()
    }

    pub fn connections(&self) -> Vec<&Connection> {
        self.connections.objects()
    }

    pub fn streams(&self) -> Vec<&Stream> {
        self.streams.objects()
    }

    pub fn datapaths(&self) -> Vec<&Datapath> {
        self.datapaths.objects()
    }

    pub fn worker(&self, handle: Handle<Worker>) -> Option<&Worker> {
        self.workers.get(handle)
    }

    pub fn connection(&self, handle: Handle<Connection>) -> Option<&Connection> {
        self.connections.get(handle)
    }

    pub fn stream(&self, handle: Handle<Stream>) -> Option<&Stream> {
        self.streams.get(handle)
    }

    pub fn datapath(&self, handle: Handle<Datapath>) -> Option<&Datapath> {
        self.datapaths.get(handle)
    }

    pub fn find_connection(&self, id: u64) -> Option<&Connection> {
        self.connections.find_by_sequence_id(id)
    }

    pub fn find_worker(&self, id: u64) -> Option<&Worker> {
        self.workers.find_by_sequence_id(id)
    }
}

impl Default for TraceState {
    fn default() -> Self {
        Self::new(ParseMode::Full)
    }
}
