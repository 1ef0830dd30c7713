//! Event parsing for binary capture records.
//!
//! Decodes one record (header plus payload) into a typed [`Event`]. All
//! multi-byte fields are little-endian. Payload fields are read in the order
//! they appear on the matching [`EventKind`] variant; bytes past the last
//! field are ignored.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;

use super::event::{
    ApiType, ConnStats, Event, EventId, EventKind, ExecutionType, FlowBlockedFlags, LogLevel,
    ObjectType, OutFlowStats, RecvState, ScheduleState, SendState,
};
use crate::config::ParseMode;

/// Record header size in bytes.
pub const HEADER_SIZE: usize = 32;

/// Errors that can occur during record parsing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("record too short: {size} bytes")]
    Truncated { size: usize },

    #[error("unknown event id: {raw}")]
    UnknownEventId { raw: u16 },

    #[error("unknown object type: {raw}")]
    UnknownObjectType { raw: u8 },

    #[error("reading {event_name}: unexpected end of data")]
    PayloadTruncated { event_name: &'static str },

    #[error("reading {event_name}: invalid {field} value {raw}")]
    InvalidEnum {
        event_name: &'static str,
        field: &'static str,
        raw: u32,
    },

    #[error("reading {event_name}: string is not valid UTF-8")]
    InvalidUtf8 { event_name: &'static str },

    #[error("reading {event_name}: invalid address family {family}")]
    InvalidAddress { event_name: &'static str, family: u8 },
}

/// Parse one record into an [`Event`].
///
/// Returns `Ok(None)` for diagnostic events when `mode` is
/// [`ParseMode::Filtered`]; their payloads are never read.
pub fn parse_event(data: &[u8], mode: ParseMode) -> Result<Option<Event>, ParseError> {
    if data.len() < HEADER_SIZE {
        return Err(ParseError::Truncated { size: data.len() });
    }

    let mut header = Payload::new(data, "header");
    let timestamp = header.u64()?;
    let process_id = header.u32()?;
    let thread_id = header.u32()?;
    let raw_id = header.u16()?;
    let processor = header.u16()?;
    let pointer_size = header.u8()?;
    let object_type_raw = header.u8()?;
    header.skip(2)?;
    let object_pointer = header.u64()?;

    if raw_id == 0 {
        return Err(ParseError::UnknownEventId { raw: raw_id });
    }
    let object_type = ObjectType::from_u8(object_type_raw).ok_or(ParseError::UnknownObjectType {
        raw: object_type_raw,
    })?;

    let id = EventId::from_u16(raw_id);
    if mode == ParseMode::Filtered && id.is_some_and(EventId::is_diagnostic) {
        return Ok(None);
    }

    let kind = match id {
        Some(id) => parse_kind(id, &mut Payload::new(&data[HEADER_SIZE..], id.as_str()))?,
        None => EventKind::Other { raw: raw_id },
    };

    Ok(Some(Event {
        timestamp,
        processor,
        process_id,
        thread_id,
        pointer_size,
        object_type,
        object_pointer,
        kind,
    }))
}

// ---------------------------------------------------------------------------
// Bounds-checked payload cursor
// ---------------------------------------------------------------------------

struct Payload<'a> {
    data: &'a [u8],
    pos: usize,
    name: &'static str,
}

impl<'a> Payload<'a> {
    fn new(data: &'a [u8], name: &'static str) -> Self {
        Self { data, pos: 0, name }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(ParseError::PayloadTruncated {
                event_name: self.name,
            });
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    #[inline(always)]
    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.bytes(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.fixed::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ParseError> {
        self.fixed().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        self.fixed().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, ParseError> {
        self.fixed().map(u64::from_le_bytes)
    }

    fn bool(&mut self) -> Result<bool, ParseError> {
        Ok(self.u8()? != 0)
    }

    fn enum_u8<T>(
        &mut self,
        field: &'static str,
        convert: impl Fn(u8) -> Option<T>,
    ) -> Result<T, ParseError> {
        let raw = self.u8()?;
        convert(raw).ok_or(ParseError::InvalidEnum {
            event_name: self.name,
            field,
            raw: u32::from(raw),
        })
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let len = usize::from(self.u16()?);
        let raw = self.bytes(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ParseError::InvalidUtf8 {
                event_name: self.name,
            })
    }

    /// `u8 family (0 none, 4, 6)`, address bytes, `u16 port`.
    fn addr(&mut self) -> Result<Option<SocketAddr>, ParseError> {
        let ip = match self.u8()? {
            0 => return Ok(None),
            4 => IpAddr::V4(Ipv4Addr::from(self.fixed::<4>()?)),
            6 => IpAddr::V6(Ipv6Addr::from(self.fixed::<16>()?)),
            family => {
                return Err(ParseError::InvalidAddress {
                    event_name: self.name,
                    family,
                })
            }
        };
        let port = self.u16()?;
        Ok(Some(SocketAddr::new(ip, port)))
    }
}

fn log_level(id: EventId) -> LogLevel {
    LogLevel::from_id(id).unwrap_or(LogLevel::Verbose)
}

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

fn parse_kind(id: EventId, p: &mut Payload<'_>) -> Result<EventKind, ParseError> {
    use EventId as Id;

    let kind = match id {
        Id::LibraryInitialized => EventKind::LibraryInitialized {
            partition_count: p.u32()?,
        },
        Id::LibraryUninitialized => EventKind::LibraryUninitialized,
        Id::LibraryRundown => EventKind::LibraryRundown {
            partition_count: p.u32()?,
        },
        Id::LibraryError => EventKind::LibraryError {
            message: p.string()?,
        },
        Id::LibraryErrorStatus => EventKind::LibraryErrorStatus {
            status: p.u32()?,
            message: p.string()?,
        },
        Id::LibraryAssert => EventKind::LibraryAssert {
            line: p.u32()?,
            file: p.string()?,
            expression: p.string()?,
        },
        Id::ApiEnter => {
            let raw = p.u32()?;
            let api = ApiType::from_u32(raw).ok_or(ParseError::InvalidEnum {
                event_name: p.name,
                field: "api type",
                raw,
            })?;
            EventKind::ApiEnter {
                api,
                handle: p.u64()?,
            }
        }
        Id::ApiExit => EventKind::ApiExit,
        Id::ApiExitStatus => EventKind::ApiExitStatus { status: p.u32()? },

        Id::WorkerCreated => EventKind::WorkerCreated {
            ideal_processor: p.u16()?,
            owner: p.u64()?,
        },
        Id::WorkerStart => EventKind::WorkerStart,
        Id::WorkerStop => EventKind::WorkerStop,
        Id::WorkerActivityStateUpdated => EventKind::WorkerActivityStateUpdated {
            is_active: p.bool()?,
            arg: p.u32()?,
        },
        Id::WorkerQueueDelayUpdated => EventKind::WorkerQueueDelayUpdated {
            queue_delay: p.u32()?,
        },
        Id::WorkerDestroyed => EventKind::WorkerDestroyed,
        Id::WorkerCleanup => EventKind::WorkerCleanup,
        Id::WorkerError => EventKind::WorkerError {
            message: p.string()?,
        },
        Id::WorkerErrorStatus => EventKind::WorkerErrorStatus {
            status: p.u32()?,
            message: p.string()?,
        },

        Id::ConnCreated => EventKind::ConnCreated {
            is_server: p.bool()?,
            correlation_id: p.u64()?,
        },
        Id::ConnRundown => EventKind::ConnRundown {
            is_server: p.bool()?,
            correlation_id: p.u64()?,
        },
        Id::ConnDestroyed => EventKind::ConnDestroyed,
        Id::ConnHandshakeComplete => EventKind::ConnHandshakeComplete,
        Id::ConnScheduleState => EventKind::ConnScheduleState {
            state: p.enum_u8("schedule state", ScheduleState::from_u8)?,
        },
        Id::ConnExecOper => EventKind::ConnExecOper {
            exec: ExecutionType::from_oper(p.u32()?),
        },
        Id::ConnExecApiOper => EventKind::ConnExecApiOper {
            exec: ExecutionType::from_api(p.u32()?),
        },
        Id::ConnExecTimerOper => EventKind::ConnExecTimerOper {
            exec: ExecutionType::from_timer(p.u32()?),
        },
        Id::ConnAssignWorker => EventKind::ConnAssignWorker { worker: p.u64()? },
        Id::ConnTransportShutdown => EventKind::ConnTransportShutdown {
            error_code: p.u64()?,
            is_remote: p.bool()?,
            is_quic_status: p.bool()?,
        },
        Id::ConnAppShutdown => EventKind::ConnAppShutdown {
            error_code: p.u64()?,
            is_remote: p.bool()?,
        },
        Id::ConnHandleClosed => EventKind::ConnHandleClosed,
        Id::ConnOutFlowStats => EventKind::ConnOutFlowStats(OutFlowStats {
            bytes_sent: p.u64()?,
            bytes_in_flight: p.u32()?,
            bytes_in_flight_max: p.u32()?,
            congestion_window: p.u32()?,
            slow_start_threshold: p.u32()?,
            connection_flow_control: p.u64()?,
            ideal_bytes: p.u64()?,
            posted_bytes: p.u64()?,
            smoothed_rtt: p.u32()?,
        }),
        Id::ConnOutFlowBlocked => EventKind::ConnOutFlowBlocked {
            reasons: FlowBlockedFlags(p.u8()?),
        },
        Id::ConnInFlowStats => EventKind::ConnInFlowStats {
            bytes_recv: p.u64()?,
        },
        Id::ConnCongestion => EventKind::ConnCongestion,
        Id::ConnStats => EventKind::ConnStats(ConnStats {
            smoothed_rtt: p.u32()?,
            congestion_count: p.u32()?,
            persistent_congestion_count: p.u32()?,
            send_total_bytes: p.u64()?,
            recv_total_bytes: p.u64()?,
        }),
        Id::ConnOutFlowStreamStats => EventKind::ConnOutFlowStreamStats {
            stream_flow_control: p.u64()?,
            stream_send_window: p.u64()?,
        },
        Id::ConnError => EventKind::ConnError {
            message: p.string()?,
        },
        Id::ConnErrorStatus => EventKind::ConnErrorStatus {
            status: p.u32()?,
            message: p.string()?,
        },
        Id::ConnLogError | Id::ConnLogWarning | Id::ConnLogInfo | Id::ConnLogVerbose => {
            EventKind::ConnLog {
                level: log_level(id),
                message: p.string()?,
            }
        }

        Id::StreamCreated => EventKind::StreamCreated {
            connection: p.u64()?,
            stream_id: p.u64()?,
            is_local_owned: p.bool()?,
        },
        Id::StreamRundown => EventKind::StreamRundown {
            connection: p.u64()?,
            stream_id: p.u64()?,
            is_local_owned: p.bool()?,
        },
        Id::StreamDestroyed => EventKind::StreamDestroyed,
        Id::StreamOutFlowBlocked => EventKind::StreamOutFlowBlocked {
            reasons: FlowBlockedFlags(p.u8()?),
        },
        Id::StreamSendState => EventKind::StreamSendState {
            state: p.enum_u8("send state", SendState::from_u8)?,
        },
        Id::StreamRecvState => EventKind::StreamRecvState {
            state: p.enum_u8("recv state", RecvState::from_u8)?,
        },
        Id::StreamError => EventKind::StreamError {
            message: p.string()?,
        },
        Id::StreamErrorStatus => EventKind::StreamErrorStatus {
            status: p.u32()?,
            message: p.string()?,
        },
        Id::StreamLogError | Id::StreamLogWarning | Id::StreamLogInfo | Id::StreamLogVerbose => {
            EventKind::StreamLog {
                level: log_level(id),
                message: p.string()?,
            }
        }
        Id::StreamAlloc => EventKind::StreamAlloc {
            connection: p.u64()?,
        },
        Id::StreamWriteFrames => EventKind::StreamWriteFrames { packet: p.u64()? },
        Id::StreamReceiveFrame => EventKind::StreamReceiveFrame { packet: p.u64()? },
        Id::StreamAppReceive => EventKind::StreamAppReceive,
        Id::StreamAppReceiveComplete => EventKind::StreamAppReceiveComplete,
        Id::StreamAppSend => EventKind::StreamAppSend,
        Id::StreamReceiveFrameComplete => EventKind::StreamReceiveFrameComplete,
        Id::StreamAppReceiveCompleteCall => EventKind::StreamAppReceiveCompleteCall,

        Id::DatapathCreated => EventKind::DatapathCreated {
            local: p.addr()?,
            remote: p.addr()?,
        },
        Id::DatapathDestroyed => EventKind::DatapathDestroyed,
        Id::DatapathSend => EventKind::DatapathSend {
            total_size: p.u32()?,
            buffer_count: p.u8()?,
            segment_size: p.u16()?,
            remote: p.addr()?,
            local: p.addr()?,
        },
        Id::DatapathRecv => EventKind::DatapathRecv {
            total_size: p.u32()?,
            segment_size: p.u16()?,
            local: p.addr()?,
            remote: p.addr()?,
        },
        Id::DatapathError => EventKind::DatapathError {
            message: p.string()?,
        },
        Id::DatapathErrorStatus => EventKind::DatapathErrorStatus {
            status: p.u32()?,
            message: p.string()?,
        },

        Id::LogError | Id::LogWarning | Id::LogInfo | Id::LogVerbose => EventKind::Log {
            level: log_level(id),
            message: p.string()?,
        },

        Id::PacketCreated => EventKind::PacketCreated { batch: p.u64()? },
        Id::PacketEncrypt => EventKind::PacketEncrypt,
        Id::PacketFinalize => EventKind::PacketFinalize,
        Id::PacketBatchSent => EventKind::PacketBatchSent,
        Id::PacketReceive => EventKind::PacketReceive,
        Id::PacketDecrypt => EventKind::PacketDecrypt,
    };

    Ok(kind)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    /// Build a 32-byte record header.
    fn header(ts: u64, id: u16, object_type: ObjectType, pointer: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&ts.to_le_bytes());
        buf.extend_from_slice(&42u32.to_le_bytes());
        buf.extend_from_slice(&43u32.to_le_bytes());
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.push(8);
        buf.push(object_type as u8);
        buf.extend_from_slice(&[0u8; 2]); // reserved
        buf.extend_from_slice(&pointer.to_le_bytes());
        buf
    }

    fn push_string(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }

    fn parse(data: &[u8]) -> Event {
        parse_event(data, ParseMode::Full).unwrap().unwrap()
    }

    // -- Error cases --

    #[test]
    fn test_truncated_data() {
        let result = parse_event(&[0u8; 10], ParseMode::Full);
        assert_eq!(result.unwrap_err(), ParseError::Truncated { size: 10 });
    }

    #[test]
    fn test_empty_data() {
        let result = parse_event(&[], ParseMode::Full);
        assert_eq!(result.unwrap_err(), ParseError::Truncated { size: 0 });
    }

    #[test]
    fn test_zero_event_id() {
        let data = header(1, 0, ObjectType::Global, 0);
        assert_eq!(
            parse_event(&data, ParseMode::Full).unwrap_err(),
            ParseError::UnknownEventId { raw: 0 }
        );
    }

    #[test]
    fn test_unknown_object_type() {
        let mut data = header(1, EventId::ApiExit as u16, ObjectType::Global, 0);
        data[21] = 77;
        assert_eq!(
            parse_event(&data, ParseMode::Full).unwrap_err(),
            ParseError::UnknownObjectType { raw: 77 }
        );
    }

    #[test]
    fn test_header_only_truncates_payload() {
        let data = header(1, EventId::ConnAssignWorker as u16, ObjectType::Connection, 0x10);
        assert_eq!(
            parse_event(&data, ParseMode::Full).unwrap_err(),
            ParseError::PayloadTruncated {
                event_name: "conn_assign_worker"
            }
        );
    }

    #[test]
    fn test_invalid_schedule_state() {
        let mut data = header(1, EventId::ConnScheduleState as u16, ObjectType::Connection, 0x10);
        data.push(9);
        assert!(matches!(
            parse_event(&data, ParseMode::Full).unwrap_err(),
            ParseError::InvalidEnum {
                field: "schedule state",
                raw: 9,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut data = header(1, EventId::LogInfo as u16, ObjectType::Global, 0);
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            parse_event(&data, ParseMode::Full).unwrap_err(),
            ParseError::InvalidUtf8 { .. }
        ));
    }

    #[test]
    fn test_invalid_address_family() {
        let mut data = header(1, EventId::DatapathCreated as u16, ObjectType::Datapath, 0x10);
        data.push(5);
        assert!(matches!(
            parse_event(&data, ParseMode::Full).unwrap_err(),
            ParseError::InvalidAddress { family: 5, .. }
        ));
    }

    // -- Successful decodes --

    #[test]
    fn test_header_fields() {
        let data = header(1234, EventId::ConnHandshakeComplete as u16, ObjectType::Connection, 0xabc);
        let evt = parse(&data);
        assert_eq!(evt.timestamp, 1234);
        assert_eq!(evt.process_id, 42);
        assert_eq!(evt.thread_id, 43);
        assert_eq!(evt.processor, 3);
        assert_eq!(evt.pointer_size, 8);
        assert_eq!(evt.object_type, ObjectType::Connection);
        assert_eq!(evt.object_pointer, 0xabc);
        assert_eq!(evt.kind, EventKind::ConnHandshakeComplete);
    }

    #[test]
    fn test_unknown_id_is_other() {
        let data = header(1, 4000, ObjectType::Global, 0);
        assert_eq!(parse(&data).kind, EventKind::Other { raw: 4000 });
    }

    #[test]
    fn test_conn_created() {
        let mut data = header(1, EventId::ConnCreated as u16, ObjectType::Connection, 0x10);
        data.push(1);
        data.extend_from_slice(&77u64.to_le_bytes());
        assert_eq!(
            parse(&data).kind,
            EventKind::ConnCreated {
                is_server: true,
                correlation_id: 77
            }
        );
    }

    #[test]
    fn test_out_flow_stats() {
        let mut data = header(1, EventId::ConnOutFlowStats as u16, ObjectType::Connection, 0x10);
        data.extend_from_slice(&1000u64.to_le_bytes());
        data.extend_from_slice(&200u32.to_le_bytes());
        data.extend_from_slice(&300u32.to_le_bytes());
        data.extend_from_slice(&12000u32.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&5000u64.to_le_bytes());
        data.extend_from_slice(&64u64.to_le_bytes());
        data.extend_from_slice(&32u64.to_le_bytes());
        data.extend_from_slice(&900u32.to_le_bytes());

        let EventKind::ConnOutFlowStats(stats) = parse(&data).kind else {
            panic!("expected out flow stats");
        };
        assert_eq!(stats.bytes_sent, 1000);
        assert_eq!(stats.congestion_window, 12000);
        assert_eq!(stats.connection_flow_control, 5000);
        assert_eq!(stats.posted_bytes, 32);
        assert_eq!(stats.smoothed_rtt, 900);
    }

    #[test]
    fn test_api_enter() {
        let mut data = header(1, EventId::ApiEnter as u16, ObjectType::Global, 0);
        data.extend_from_slice(&(ApiType::StreamSend as u32).to_le_bytes());
        data.extend_from_slice(&0xfeedu64.to_le_bytes());
        assert_eq!(
            parse(&data).kind,
            EventKind::ApiEnter {
                api: ApiType::StreamSend,
                handle: 0xfeed
            }
        );
    }

    #[test]
    fn test_conn_log_level_from_id() {
        let mut data = header(1, EventId::ConnLogWarning as u16, ObjectType::Connection, 0x10);
        push_string(&mut data, "slow path");
        assert_eq!(
            parse(&data).kind,
            EventKind::ConnLog {
                level: LogLevel::Warning,
                message: "slow path".to_string()
            }
        );
    }

    #[test]
    fn test_datapath_send_addresses() {
        let mut data = header(1, EventId::DatapathSend as u16, ObjectType::Datapath, 0x10);
        data.extend_from_slice(&2400u32.to_le_bytes());
        data.push(2);
        data.extend_from_slice(&1200u16.to_le_bytes());
        data.push(4);
        data.extend_from_slice(&[10, 0, 0, 1]);
        data.extend_from_slice(&443u16.to_le_bytes());
        data.push(6);
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        data.extend_from_slice(&5000u16.to_le_bytes());

        assert_eq!(
            parse(&data).kind,
            EventKind::DatapathSend {
                total_size: 2400,
                buffer_count: 2,
                segment_size: 1200,
                remote: Some("10.0.0.1:443".parse().unwrap()),
                local: Some("[::1]:5000".parse().unwrap()),
            }
        );
    }

    #[test]
    fn test_missing_address() {
        let mut data = header(1, EventId::DatapathCreated as u16, ObjectType::Datapath, 0x10);
        data.push(0);
        data.push(0);
        assert_eq!(
            parse(&data).kind,
            EventKind::DatapathCreated {
                local: None,
                remote: None
            }
        );
    }

    #[test]
    fn test_library_assert_strings() {
        let mut data = header(1, EventId::LibraryAssert as u16, ObjectType::Global, 0);
        data.extend_from_slice(&120u32.to_le_bytes());
        push_string(&mut data, "stream.c");
        push_string(&mut data, "Stream != NULL");
        assert_eq!(
            parse(&data).kind,
            EventKind::LibraryAssert {
                line: 120,
                file: "stream.c".to_string(),
                expression: "Stream != NULL".to_string(),
            }
        );
    }

    #[test]
    fn test_filtered_mode_skips_diagnostics() {
        // Payload is deliberately missing; filtered mode never reads it.
        let data = header(1, EventId::ConnLogInfo as u16, ObjectType::Connection, 0x10);
        assert_eq!(parse_event(&data, ParseMode::Filtered).unwrap(), None);
        assert!(parse_event(&data, ParseMode::Full).is_err());
    }

    #[test]
    fn test_exec_oper_out_of_range_is_unknown() {
        for id in [
            EventId::ConnExecOper,
            EventId::ConnExecApiOper,
            EventId::ConnExecTimerOper,
        ] {
            for raw in [u32::MAX, u32::MAX - 5] {
                let mut data = header(1, id as u16, ObjectType::Connection, 0x10);
                data.extend_from_slice(&raw.to_le_bytes());
                let exec = match parse(&data).kind {
                    EventKind::ConnExecOper { exec }
                    | EventKind::ConnExecApiOper { exec }
                    | EventKind::ConnExecTimerOper { exec } => exec,
                    other => panic!("unexpected kind {other:?}"),
                };
                assert_eq!(exec, ExecutionType::Unknown);
            }
        }
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = header(1, EventId::PacketCreated as u16, ObjectType::Packet, 0x10);
        data.extend_from_slice(&0xb0u64.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3]);
        assert_eq!(parse(&data).kind, EventKind::PacketCreated { batch: 0xb0 });
    }
}
