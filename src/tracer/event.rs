use std::fmt;
use std::net::SocketAddr;

/// EventId identifies the kind of QUIC trace event.
/// Values match the numbering of the transport's trace provider manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum EventId {
    LibraryInitialized = 1,
    LibraryUninitialized = 2,
    LibraryRundown = 7,
    LibraryError = 8,
    LibraryErrorStatus = 9,
    LibraryAssert = 10,
    ApiEnter = 11,
    ApiExit = 12,
    ApiExitStatus = 13,

    WorkerCreated = 2048,
    WorkerStart = 2049,
    WorkerStop = 2050,
    WorkerActivityStateUpdated = 2051,
    WorkerQueueDelayUpdated = 2052,
    WorkerDestroyed = 2053,
    WorkerCleanup = 2054,
    WorkerError = 2055,
    WorkerErrorStatus = 2056,

    ConnCreated = 5120,
    ConnDestroyed = 5121,
    ConnHandshakeComplete = 5122,
    ConnScheduleState = 5123,
    ConnExecOper = 5124,
    ConnExecApiOper = 5125,
    ConnExecTimerOper = 5126,
    ConnAssignWorker = 5131,
    ConnTransportShutdown = 5135,
    ConnAppShutdown = 5136,
    ConnHandleClosed = 5138,
    ConnOutFlowStats = 5140,
    ConnOutFlowBlocked = 5141,
    ConnInFlowStats = 5142,
    ConnCongestion = 5144,
    ConnRundown = 5147,
    ConnError = 5156,
    ConnErrorStatus = 5157,
    ConnStats = 5160,
    ConnLogError = 5168,
    ConnLogWarning = 5169,
    ConnLogInfo = 5170,
    ConnLogVerbose = 5171,
    ConnOutFlowStreamStats = 5173,

    StreamCreated = 6144,
    StreamDestroyed = 6145,
    StreamOutFlowBlocked = 6146,
    StreamRundown = 6147,
    StreamSendState = 6148,
    StreamRecvState = 6149,
    StreamError = 6150,
    StreamErrorStatus = 6151,
    StreamLogError = 6152,
    StreamLogWarning = 6153,
    StreamLogInfo = 6154,
    StreamLogVerbose = 6155,
    StreamAlloc = 6156,
    StreamWriteFrames = 6157,
    StreamReceiveFrame = 6158,
    StreamAppReceive = 6159,
    StreamAppReceiveComplete = 6160,
    StreamAppSend = 6161,
    StreamReceiveFrameComplete = 6162,
    StreamAppReceiveCompleteCall = 6163,

    DatapathSend = 9217,
    DatapathRecv = 9218,
    DatapathError = 9219,
    DatapathErrorStatus = 9220,
    DatapathCreated = 9221,
    DatapathDestroyed = 9222,

    LogError = 10240,
    LogWarning = 10241,
    LogInfo = 10242,
    LogVerbose = 10243,

    PacketCreated = 11264,
    PacketEncrypt = 11265,
    PacketFinalize = 11266,
    PacketBatchSent = 11267,
    PacketReceive = 11268,
    PacketDecrypt = 11269,
}

impl EventId {
    /// Returns the canonical log label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LibraryInitialized => "library_initialized",
            Self::LibraryUninitialized => "library_uninitialized",
            Self::LibraryRundown => "library_rundown",
            Self::LibraryError => "library_error",
            Self::LibraryErrorStatus => "library_error_status",
            Self::LibraryAssert => "library_assert",
            Self::ApiEnter => "api_enter",
            Self::ApiExit => "api_exit",
            Self::ApiExitStatus => "api_exit_status",
            Self::WorkerCreated => "worker_created",
            Self::WorkerStart => "worker_start",
            Self::WorkerStop => "worker_stop",
            Self::WorkerActivityStateUpdated => "worker_activity_state_updated",
            Self::WorkerQueueDelayUpdated => "worker_queue_delay_updated",
            Self::WorkerDestroyed => "worker_destroyed",
            Self::WorkerCleanup => "worker_cleanup",
            Self::WorkerError => "worker_error",
            Self::WorkerErrorStatus => "worker_error_status",
            Self::ConnCreated => "conn_created",
            Self::ConnDestroyed => "conn_destroyed",
            Self::ConnHandshakeComplete => "conn_handshake_complete",
            Self::ConnScheduleState => "conn_schedule_state",
            Self::ConnExecOper => "conn_exec_oper",
            Self::ConnExecApiOper => "conn_exec_api_oper",
            Self::ConnExecTimerOper => "conn_exec_timer_oper",
            Self::ConnAssignWorker => "conn_assign_worker",
            Self::ConnTransportShutdown => "conn_transport_shutdown",
            Self::ConnAppShutdown => "conn_app_shutdown",
            Self::ConnHandleClosed => "conn_handle_closed",
            Self::ConnOutFlowStats => "conn_out_flow_stats",
            Self::ConnOutFlowBlocked => "conn_out_flow_blocked",
            Self::ConnInFlowStats => "conn_in_flow_stats",
            Self::ConnCongestion => "conn_congestion",
            Self::ConnRundown => "conn_rundown",
            Self::ConnError => "conn_error",
            Self::ConnErrorStatus => "conn_error_status",
            Self::ConnStats => "conn_stats",
            Self::ConnLogError => "conn_log_error",
            Self::ConnLogWarning => "conn_log_warning",
            Self::ConnLogInfo => "conn_log_info",
            Self::ConnLogVerbose => "conn_log_verbose",
            Self::ConnOutFlowStreamStats => "conn_out_flow_stream_stats",
            Self::StreamCreated => "stream_created",
            Self::StreamDestroyed => "stream_destroyed",
            Self::StreamOutFlowBlocked => "stream_out_flow_blocked",
            Self::StreamRundown => "stream_rundown",
            Self::StreamSendState => "stream_send_state",
            Self::StreamRecvState => "stream_recv_state",
            Self::StreamError => "stream_error",
            Self::StreamErrorStatus => "stream_error_status",
            Self::StreamLogError => "stream_log_error",
            Self::StreamLogWarning => "stream_log_warning",
            Self::StreamLogInfo => "stream_log_info",
            Self::StreamLogVerbose => "stream_log_verbose",
            Self::StreamAlloc => "stream_alloc",
            Self::StreamWriteFrames => "stream_write_frames",
            Self::StreamReceiveFrame => "stream_receive_frame",
            Self::StreamAppReceive => "stream_app_receive",
            Self::StreamAppReceiveComplete => "stream_app_receive_complete",
            Self::StreamAppSend => "stream_app_send",
            Self::StreamReceiveFrameComplete => "stream_receive_frame_complete",
            Self::StreamAppReceiveCompleteCall => "stream_app_receive_complete_call",
            Self::DatapathSend => "datapath_send",
            Self::DatapathRecv => "datapath_recv",
            Self::DatapathError => "datapath_error",
            Self::DatapathErrorStatus => "datapath_error_status",
            Self::DatapathCreated => "datapath_created",
            Self::DatapathDestroyed => "datapath_destroyed",
            Self::LogError => "log_error",
            Self::LogWarning => "log_warning",
            Self::LogInfo => "log_info",
            Self::LogVerbose => "log_verbose",
            Self::PacketCreated => "packet_created",
            Self::PacketEncrypt => "packet_encrypt",
            Self::PacketFinalize => "packet_finalize",
            Self::PacketBatchSent => "packet_batch_sent",
            Self::PacketReceive => "packet_receive",
            Self::PacketDecrypt => "packet_decrypt",
        }
    }

    /// Convert from a raw u16 value.
    pub fn from_u16(v: u16) -> Option<Self> {
        Self::all().iter().copied().find(|id| *id as u16 == v)
    }

    /// Returns true for ids that only carry diagnostic text (errors,
    /// asserts, log messages). These are dropped in filtered parse mode.
    pub const fn is_diagnostic(self) -> bool {
        matches!(
            self,
            Self::LibraryError
                | Self::LibraryErrorStatus
                | Self::LibraryAssert
                | Self::WorkerError
                | Self::WorkerErrorStatus
                | Self::ConnError
                | Self::ConnErrorStatus
                | Self::ConnLogError
                | Self::ConnLogWarning
                | Self::ConnLogInfo
                | Self::ConnLogVerbose
                | Self::StreamError
                | Self::StreamErrorStatus
                | Self::StreamLogError
                | Self::StreamLogWarning
                | Self::StreamLogInfo
                | Self::StreamLogVerbose
                | Self::DatapathError
                | Self::DatapathErrorStatus
                | Self::LogError
                | Self::LogWarning
                | Self::LogInfo
                | Self::LogVerbose
        )
    }

    /// Return all event ids in numeric order.
    pub fn all() -> &'static [Self] {
        &[
            Self::LibraryInitialized,
            Self::LibraryUninitialized,
            Self::LibraryRundown,
            Self::LibraryError,
            Self::LibraryErrorStatus,
            Self::LibraryAssert,
            Self::ApiEnter,
            Self::ApiExit,
            Self::ApiExitStatus,
            Self::WorkerCreated,
            Self::WorkerStart,
            Self::WorkerStop,
            Self::WorkerActivityStateUpdated,
            Self::WorkerQueueDelayUpdated,
            Self::WorkerDestroyed,
            Self::WorkerCleanup,
            Self::WorkerError,
            Self::WorkerErrorStatus,
            Self::ConnCreated,
            Self::ConnDestroyed,
            Self::ConnHandshakeComplete,
            Self::ConnScheduleState,
            Self::ConnExecOper,
            Self::ConnExecApiOper,
            Self::ConnExecTimerOper,
            Self::ConnAssignWorker,
            Self::ConnTransportShutdown,
            Self::ConnAppShutdown,
            Self::ConnHandleClosed,
            Self::ConnOutFlowStats,
            Self::ConnOutFlowBlocked,
            Self::ConnInFlowStats,
            Self::ConnCongestion,
            Self::ConnRundown,
            Self::ConnError,
            Self::ConnErrorStatus,
            Self::ConnStats,
            Self::ConnLogError,
            Self::ConnLogWarning,
            Self::ConnLogInfo,
            Self::ConnLogVerbose,
            Self::ConnOutFlowStreamStats,
            Self::StreamCreated,
            Self::StreamDestroyed,
            Self::StreamOutFlowBlocked,
            Self::StreamRundown,
            Self::StreamSendState,
            Self::StreamRecvState,
            Self::StreamError,
            Self::StreamErrorStatus,
            Self::StreamLogError,
            Self::StreamLogWarning,
            Self::StreamLogInfo,
            Self::StreamLogVerbose,
            Self::StreamAlloc,
            Self::StreamWriteFrames,
            Self::StreamReceiveFrame,
            Self::StreamAppReceive,
            Self::StreamAppReceiveComplete,
            Self::StreamAppSend,
            Self::StreamReceiveFrameComplete,
            Self::StreamAppReceiveCompleteCall,
            Self::DatapathSend,
            Self::DatapathRecv,
            Self::DatapathError,
            Self::DatapathErrorStatus,
            Self::DatapathCreated,
            Self::DatapathDestroyed,
            Self::LogError,
            Self::LogWarning,
            Self::LogInfo,
            Self::LogVerbose,
            Self::PacketCreated,
            Self::PacketEncrypt,
            Self::PacketFinalize,
            Self::PacketBatchSent,
            Self::PacketReceive,
            Self::PacketDecrypt,
        ]
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ObjectType identifies which transport object an event is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    Global = 0,
    Registration = 1,
    Configuration = 2,
    Worker = 3,
    Listener = 4,
    Binding = 5,
    Connection = 6,
    Stream = 7,
    Datapath = 8,
    Packet = 9,
}

/// Number of ObjectType variants, used for array sizing.
pub const OBJECT_TYPE_CARDINALITY: usize = 10;

impl ObjectType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Registration => "registration",
            Self::Configuration => "configuration",
            Self::Worker => "worker",
            Self::Listener => "listener",
            Self::Binding => "binding",
            Self::Connection => "connection",
            Self::Stream => "stream",
            Self::Datapath => "datapath",
            Self::Packet => "packet",
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::all().get(v as usize).copied()
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Global,
            Self::Registration,
            Self::Configuration,
            Self::Worker,
            Self::Listener,
            Self::Binding,
            Self::Connection,
            Self::Stream,
            Self::Datapath,
            Self::Packet,
        ]
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling status of a connection on its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum ScheduleState {
    Idle = 0,
    Queued = 1,
    Processing = 2,
}

/// Number of ScheduleState variants.
pub const SCHEDULE_STATE_CARDINALITY: usize = 3;

impl ScheduleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Processing => "processing",
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Idle),
            1 => Some(Self::Queued),
            2 => Some(Self::Processing),
            _ => None,
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Idle, Self::Queued, Self::Processing]
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work item a connection executed. Operation, API and timer families are
/// laid out contiguously so a raw family value is an offset from the
/// family's first variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum ExecutionType {
    Unknown = 0,

    OperApi = 1,
    OperFlushRecv,
    OperUnreachable,
    OperFlushStreamRecv,
    OperFlushSend,
    OperTlsComplete,
    OperTimerExpired,
    OperTraceRundown,
    OperVersionNegotiation,
    OperStatelessReset,
    OperRetry,

    ApiConnClose = 12,
    ApiConnShutdown,
    ApiConnStart,
    ApiConnSetConfiguration,
    ApiConnSendResumptionTicket,
    ApiStreamClose,
    ApiStreamShutdown,
    ApiStreamStart,
    ApiStreamSend,
    ApiStreamReceiveComplete,
    ApiStreamReceiveSetEnabled,
    ApiSetParam,
    ApiGetParam,
    ApiDatagramSend,

    TimerPacing = 26,
    TimerAckDelay,
    TimerLossDetection,
    TimerKeepAlive,
    TimerIdle,
    TimerShutdown,
}

impl ExecutionType {
    const ALL: [Self; 32] = [
        Self::Unknown,
        Self::OperApi,
        Self::OperFlushRecv,
        Self::OperUnreachable,
        Self::OperFlushStreamRecv,
        Self::OperFlushSend,
        Self::OperTlsComplete,
        Self::OperTimerExpired,
        Self::OperTraceRundown,
        Self::OperVersionNegotiation,
        Self::OperStatelessReset,
        Self::OperRetry,
        Self::ApiConnClose,
        Self::ApiConnShutdown,
        Self::ApiConnStart,
        Self::ApiConnSetConfiguration,
        Self::ApiConnSendResumptionTicket,
        Self::ApiStreamClose,
        Self::ApiStreamShutdown,
        Self::ApiStreamStart,
        Self::ApiStreamSend,
        Self::ApiStreamReceiveComplete,
        Self::ApiStreamReceiveSetEnabled,
        Self::ApiSetParam,
        Self::ApiGetParam,
        Self::ApiDatagramSend,
        Self::TimerPacing,
        Self::TimerAckDelay,
        Self::TimerLossDetection,
        Self::TimerKeepAlive,
        Self::TimerIdle,
        Self::TimerShutdown,
    ];

    fn offset(first: Self, last: Self, raw: u32) -> Self {
        let Some(idx) = (first as u32)
            .checked_add(raw)
            .filter(|idx| *idx <= last as u32)
        else {
            return Self::Unknown;
        };
        Self::ALL[idx as usize]
    }

    /// Maps a raw operation type from a `ConnExecOper` payload.
    pub fn from_oper(raw: u32) -> Self {
        Self::offset(Self::OperApi, Self::OperRetry, raw)
    }

    /// Maps a raw API type from a `ConnExecApiOper` payload.
    pub fn from_api(raw: u32) -> Self {
        Self::offset(Self::ApiConnClose, Self::ApiDatagramSend, raw)
    }

    /// Maps a raw timer type from a `ConnExecTimerOper` payload.
    pub fn from_timer(raw: u32) -> Self {
        Self::offset(Self::TimerPacing, Self::TimerShutdown, raw)
    }
}

/// Public API entry point recorded by `ApiEnter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum ApiType {
    SetParam = 0,
    GetParam,
    RegistrationOpen,
    RegistrationClose,
    RegistrationShutdown,
    ConfigurationOpen,
    ConfigurationClose,
    ConfigurationLoadCredential,
    ListenerOpen,
    ListenerClose,
    ListenerStart,
    ListenerStop,
    ConnectionOpen,
    ConnectionClose,
    ConnectionShutdown,
    ConnectionStart,
    ConnectionSetConfiguration,
    ConnectionSendResumptionTicket,
    StreamOpen,
    StreamClose,
    StreamStart,
    StreamShutdown,
    StreamSend,
    StreamReceiveComplete,
    StreamReceiveSetEnabled,
    StreamDatagramSend,
}

impl ApiType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::all().get(v as usize).copied()
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::SetParam,
            Self::GetParam,
            Self::RegistrationOpen,
            Self::RegistrationClose,
            Self::RegistrationShutdown,
            Self::ConfigurationOpen,
            Self::ConfigurationClose,
            Self::ConfigurationLoadCredential,
            Self::ListenerOpen,
            Self::ListenerClose,
            Self::ListenerStart,
            Self::ListenerStop,
            Self::ConnectionOpen,
            Self::ConnectionClose,
            Self::ConnectionShutdown,
            Self::ConnectionStart,
            Self::ConnectionSetConfiguration,
            Self::ConnectionSendResumptionTicket,
            Self::StreamOpen,
            Self::StreamClose,
            Self::StreamStart,
            Self::StreamShutdown,
            Self::StreamSend,
            Self::StreamReceiveComplete,
            Self::StreamReceiveSetEnabled,
            Self::StreamDatagramSend,
        ]
    }
}

/// Reasons a connection or stream cannot currently send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct FlowBlockedFlags(pub u8);

impl FlowBlockedFlags {
    pub const NONE: Self = Self(0);
    pub const SCHEDULING: Self = Self(0x01);
    pub const PACING: Self = Self(0x02);
    pub const AMPLIFICATION_PROTECTION: Self = Self(0x04);
    pub const CONGESTION_CONTROL: Self = Self(0x08);
    pub const CONN_FLOW_CONTROL: Self = Self(0x10);
    pub const STREAM_ID_FLOW_CONTROL: Self = Self(0x20);
    pub const STREAM_FLOW_CONTROL: Self = Self(0x40);
    pub const APP: Self = Self(0x80);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::SCHEDULING, "scheduling"),
        (Self::PACING, "pacing"),
        (Self::AMPLIFICATION_PROTECTION, "amplification_protection"),
        (Self::CONGESTION_CONTROL, "congestion_control"),
        (Self::CONN_FLOW_CONTROL, "conn_flow_control"),
        (Self::STREAM_ID_FLOW_CONTROL, "stream_id_flow_control"),
        (Self::STREAM_FLOW_CONTROL, "stream_flow_control"),
        (Self::APP, "app"),
    ];

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FlowBlockedFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for FlowBlockedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Send-direction state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SendState {
    Disabled = 0,
    Started,
    Reset,
    ResetAcked,
    Fin,
    FinAcked,
    ReliableReset,
    ReliableResetAcked,
}

impl SendState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Disabled),
            1 => Some(Self::Started),
            2 => Some(Self::Reset),
            3 => Some(Self::ResetAcked),
            4 => Some(Self::Fin),
            5 => Some(Self::FinAcked),
            6 => Some(Self::ReliableReset),
            7 => Some(Self::ReliableResetAcked),
            _ => None,
        }
    }

    /// True once nothing more will be sent in this direction.
    pub const fn is_shutdown(self) -> bool {
        matches!(
            self,
            Self::Disabled | Self::FinAcked | Self::ResetAcked | Self::ReliableResetAcked
        )
    }
}

/// Receive-direction state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecvState {
    Disabled = 0,
    Started,
    Paused,
    Stopped,
    Reset,
    Fin,
    ReliableReset,
}

impl RecvState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Disabled),
            1 => Some(Self::Started),
            2 => Some(Self::Paused),
            3 => Some(Self::Stopped),
            4 => Some(Self::Reset),
            5 => Some(Self::Fin),
            6 => Some(Self::ReliableReset),
            _ => None,
        }
    }

    /// True once nothing more will be received in this direction.
    pub const fn is_shutdown(self) -> bool {
        matches!(
            self,
            Self::Disabled | Self::Fin | Self::Reset | Self::ReliableReset
        )
    }
}

/// Severity of a log message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Verbose = 3,
}

impl LogLevel {
    /// Derives the level from the offset of a log id within its family.
    fn from_offset(offset: u16) -> Self {
        match offset {
            0 => Self::Error,
            1 => Self::Warning,
            2 => Self::Info,
            _ => Self::Verbose,
        }
    }

    pub fn from_id(id: EventId) -> Option<Self> {
        let raw = id as u16;
        match id {
            EventId::ConnLogError
            | EventId::ConnLogWarning
            | EventId::ConnLogInfo
            | EventId::ConnLogVerbose => {
                Some(Self::from_offset(raw - EventId::ConnLogError as u16))
            }
            EventId::StreamLogError
            | EventId::StreamLogWarning
            | EventId::StreamLogInfo
            | EventId::StreamLogVerbose => {
                Some(Self::from_offset(raw - EventId::StreamLogError as u16))
            }
            EventId::LogError | EventId::LogWarning | EventId::LogInfo | EventId::LogVerbose => {
                Some(Self::from_offset(raw - EventId::LogError as u16))
            }
            _ => None,
        }
    }
}

/// `ConnOutFlowStats` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutFlowStats {
    pub bytes_sent: u64,
    pub bytes_in_flight: u32,
    pub bytes_in_flight_max: u32,
    pub congestion_window: u32,
    pub slow_start_threshold: u32,
    pub connection_flow_control: u64,
    pub ideal_bytes: u64,
    pub posted_bytes: u64,
    pub smoothed_rtt: u32,
}

/// `ConnStats` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnStats {
    pub smoothed_rtt: u32,
    pub congestion_count: u32,
    pub persistent_congestion_count: u32,
    pub send_total_bytes: u64,
    pub recv_total_bytes: u64,
}

/// Event kind with its payload inline.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    LibraryInitialized { partition_count: u32 },
    LibraryUninitialized,
    LibraryRundown { partition_count: u32 },
    LibraryError { message: String },
    LibraryErrorStatus { status: u32, message: String },
    LibraryAssert { line: u32, file: String, expression: String },
    ApiEnter { api: ApiType, handle: u64 },
    ApiExit,
    ApiExitStatus { status: u32 },

    WorkerCreated { ideal_processor: u16, owner: u64 },
    WorkerStart,
    WorkerStop,
    WorkerActivityStateUpdated { is_active: bool, arg: u32 },
    WorkerQueueDelayUpdated { queue_delay: u32 },
    WorkerDestroyed,
    WorkerCleanup,
    WorkerError { message: String },
    WorkerErrorStatus { status: u32, message: String },

    ConnCreated { is_server: bool, correlation_id: u64 },
    ConnRundown { is_server: bool, correlation_id: u64 },
    ConnDestroyed,
    ConnHandshakeComplete,
    ConnScheduleState { state: ScheduleState },
    ConnExecOper { exec: ExecutionType },
    ConnExecApiOper { exec: ExecutionType },
    ConnExecTimerOper { exec: ExecutionType },
    ConnAssignWorker { worker: u64 },
    ConnTransportShutdown { error_code: u64, is_remote: bool, is_quic_status: bool },
    ConnAppShutdown { error_code: u64, is_remote: bool },
    ConnHandleClosed,
    ConnOutFlowStats(OutFlowStats),
    ConnOutFlowBlocked { reasons: FlowBlockedFlags },
    ConnInFlowStats { bytes_recv: u64 },
    ConnCongestion,
    ConnStats(ConnStats),
    ConnOutFlowStreamStats { stream_flow_control: u64, stream_send_window: u64 },
    ConnError { message: String },
    ConnErrorStatus { status: u32, message: String },
    ConnLog { level: LogLevel, message: String },

    StreamCreated { connection: u64, stream_id: u64, is_local_owned: bool },
    StreamRundown { connection: u64, stream_id: u64, is_local_owned: bool },
    StreamDestroyed,
    StreamOutFlowBlocked { reasons: FlowBlockedFlags },
    StreamSendState { state: SendState },
    StreamRecvState { state: RecvState },
    StreamError { message: String },
    StreamErrorStatus { status: u32, message: String },
    StreamLog { level: LogLevel, message: String },
    StreamAlloc { connection: u64 },
    StreamWriteFrames { packet: u64 },
    StreamReceiveFrame { packet: u64 },
    StreamAppReceive,
    StreamAppReceiveComplete,
    StreamAppSend,
    StreamReceiveFrameComplete,
    StreamAppReceiveCompleteCall,

    DatapathCreated { local: Option<SocketAddr>, remote: Option<SocketAddr> },
    DatapathDestroyed,
    DatapathSend {
        total_size: u32,
        buffer_count: u8,
        segment_size: u16,
        remote: Option<SocketAddr>,
        local: Option<SocketAddr>,
    },
    DatapathRecv {
        total_size: u32,
        segment_size: u16,
        local: Option<SocketAddr>,
        remote: Option<SocketAddr>,
    },
    DatapathError { message: String },
    DatapathErrorStatus { status: u32, message: String },

    Log { level: LogLevel, message: String },

    PacketCreated { batch: u64 },
    PacketEncrypt,
    PacketFinalize,
    PacketBatchSent,
    PacketReceive,
    PacketDecrypt,

    /// An id the engine has no payload model for.
    Other { raw: u16 },
}

impl EventKind {
    /// Returns the event id, or None for [`EventKind::Other`].
    pub fn id(&self) -> Option<EventId> {
        let id = match self {
            Self::LibraryInitialized { .. } => EventId::LibraryInitialized,
            Self::LibraryUninitialized => EventId::LibraryUninitialized,
            Self::LibraryRundown { .. } => EventId::LibraryRundown,
            Self::LibraryError { .. } => EventId::LibraryError,
            Self::LibraryErrorStatus { .. } => EventId::LibraryErrorStatus,
            Self::LibraryAssert { .. } => EventId::LibraryAssert,
            Self::ApiEnter { .. } => EventId::ApiEnter,
            Self::ApiExit => EventId::ApiExit,
            Self::ApiExitStatus { .. } => EventId::ApiExitStatus,
            Self::WorkerCreated { .. } => EventId::WorkerCreated,
            Self::WorkerStart => EventId::WorkerStart,
            Self::WorkerStop => EventId::WorkerStop,
            Self::WorkerActivityStateUpdated { .. } => EventId::WorkerActivityStateUpdated,
            Self::WorkerQueueDelayUpdated { .. } => EventId::WorkerQueueDelayUpdated,
            Self::WorkerDestroyed => EventId::WorkerDestroyed,
            Self::WorkerCleanup => EventId::WorkerCleanup,
            Self::WorkerError { .. } => EventId::WorkerError,
            Self::WorkerErrorStatus { .. } => EventId::WorkerErrorStatus,
            Self::ConnCreated { .. } => EventId::ConnCreated,
            Self::ConnRundown { .. } => EventId::ConnRundown,
            Self::ConnDestroyed => EventId::ConnDestroyed,
            Self::ConnHandshakeComplete => EventId::ConnHandshakeComplete,
            Self::ConnScheduleState { .. } => EventId::ConnScheduleState,
            Self::ConnExecOper { .. } => EventId::ConnExecOper,
            Self::ConnExecApiOper { .. } => EventId::ConnExecApiOper,
            Self::ConnExecTimerOper { .. } => EventId::ConnExecTimerOper,
            Self::ConnAssignWorker { .. } => EventId::ConnAssignWorker,
            Self::ConnTransportShutdown { .. } => EventId::ConnTransportShutdown,
            Self::ConnAppShutdown { .. } => EventId::ConnAppShutdown,
            Self::ConnHandleClosed => EventId::ConnHandleClosed,
            Self::ConnOutFlowStats(_) => EventId::ConnOutFlowStats,
            Self::ConnOutFlowBlocked { .. } => EventId::ConnOutFlowBlocked,
            Self::ConnInFlowStats { .. } => EventId::ConnInFlowStats,
            Self::ConnCongestion => EventId::ConnCongestion,
            Self::ConnStats(_) => EventId::ConnStats,
            Self::ConnOutFlowStreamStats { .. } => EventId::ConnOutFlowStreamStats,
            Self::ConnError { .. } => EventId::ConnError,
            Self::ConnErrorStatus { .. } => EventId::ConnErrorStatus,
            Self::ConnLog { level, .. } => match level {
                LogLevel::Error => EventId::ConnLogError,
                LogLevel::Warning => EventId::ConnLogWarning,
                LogLevel::Info => EventId::ConnLogInfo,
                LogLevel::Verbose => EventId::ConnLogVerbose,
            },
            Self::StreamCreated { .. } => EventId::StreamCreated,
            Self::StreamRundown { .. } => EventId::StreamRundown,
            Self::StreamDestroyed => EventId::StreamDestroyed,
            Self::StreamOutFlowBlocked { .. } => EventId::StreamOutFlowBlocked,
            Self::StreamSendState { .. } => EventId::StreamSendState,
            Self::StreamRecvState { .. } => EventId::StreamRecvState,
            Self::StreamError { .. } => EventId::StreamError,
            Self::StreamErrorStatus { .. } => EventId::StreamErrorStatus,
            Self::StreamLog { level, .. } => match level {
                LogLevel::Error => EventId::StreamLogError,
                LogLevel::Warning => EventId::StreamLogWarning,
                LogLevel::Info => EventId::StreamLogInfo,
                LogLevel::Verbose => EventId::StreamLogVerbose,
            },
            Self::StreamAlloc { .. } => EventId::StreamAlloc,
            Self::StreamWriteFrames { .. } => EventId::StreamWriteFrames,
            Self::StreamReceiveFrame { .. } => EventId::StreamReceiveFrame,
            Self::StreamAppReceive => EventId::StreamAppReceive,
            Self::StreamAppReceiveComplete => EventId::StreamAppReceiveComplete,
            Self::StreamAppSend => EventId::StreamAppSend,
            Self::StreamReceiveFrameComplete => EventId::StreamReceiveFrameComplete,
            Self::StreamAppReceiveCompleteCall => EventId::StreamAppReceiveCompleteCall,
            Self::DatapathCreated { .. } => EventId::DatapathCreated,
            Self::DatapathDestroyed => EventId::DatapathDestroyed,
            Self::DatapathSend { .. } => EventId::DatapathSend,
            Self::DatapathRecv { .. } => EventId::DatapathRecv,
            Self::DatapathError { .. } => EventId::DatapathError,
            Self::DatapathErrorStatus { .. } => EventId::DatapathErrorStatus,
            Self::Log { level, .. } => match level {
                LogLevel::Error => EventId::LogError,
                LogLevel::Warning => EventId::LogWarning,
                LogLevel::Info => EventId::LogInfo,
                LogLevel::Verbose => EventId::LogVerbose,
            },
            Self::PacketCreated { .. } => EventId::PacketCreated,
            Self::PacketEncrypt => EventId::PacketEncrypt,
            Self::PacketFinalize => EventId::PacketFinalize,
            Self::PacketBatchSent => EventId::PacketBatchSent,
            Self::PacketReceive => EventId::PacketReceive,
            Self::PacketDecrypt => EventId::PacketDecrypt,
            Self::Other { .. } => return None,
        };
        Some(id)
    }

    /// Raw numeric id, including ids without a payload model.
    pub fn raw_id(&self) -> u16 {
        match self {
            Self::Other { raw } => *raw,
            other => other.id().map_or(0, |id| id as u16),
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.id().is_some_and(EventId::is_diagnostic)
    }

    /// The object type an event of this kind is scoped to.
    pub fn object_type(&self) -> ObjectType {
        let Some(id) = self.id() else {
            return ObjectType::Global;
        };
        match id as u16 {
            2048..=3071 => ObjectType::Worker,
            5120..=6143 => ObjectType::Connection,
            6144..=7167 => ObjectType::Stream,
            9216..=10239 => ObjectType::Datapath,
            11264..=12287 => ObjectType::Packet,
            _ => ObjectType::Global,
        }
    }
}

/// One decoded trace event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Monotonic timestamp in nanoseconds.
    pub timestamp: u64,
    pub processor: u16,
    pub process_id: u32,
    pub thread_id: u32,
    /// 4 or 8; decides where the kernel-address sign bit sits.
    pub pointer_size: u8,
    pub object_type: ObjectType,
    /// Zero for global-scoped events.
    pub object_pointer: u64,
    pub kind: EventKind,
}

impl Event {
    /// Creates an event with the object type implied by `kind` and a
    /// 64-bit pointer size. Remaining header fields start at zero.
    pub fn new(kind: EventKind, timestamp: u64) -> Self {
        Self {
            timestamp,
            processor: 0,
            process_id: 0,
            thread_id: 0,
            pointer_size: 8,
            object_type: kind.object_type(),
            object_pointer: 0,
            kind,
        }
    }

    pub fn with_pointer(mut self, pointer: u64) -> Self {
        self.object_pointer = pointer;
        self
    }

    pub fn with_thread(mut self, process_id: u32, thread_id: u32) -> Self {
        self.process_id = process_id;
        self.thread_id = thread_id;
        self
    }

    pub fn with_processor(mut self, processor: u16) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_pointer_size(mut self, pointer_size: u8) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    pub fn id(&self) -> Option<EventId> {
        self.kind.id()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.id().map_or("unknown", EventId::as_str);
        write!(
            f,
            "[{:>16}][{}.{}][cpu {}] {} 0x{:x} {} {:?}",
            self.timestamp,
            self.process_id,
            self.thread_id,
            self.processor,
            self.object_type,
            self.object_pointer,
            name,
            self.kind,
        )
    }
}
