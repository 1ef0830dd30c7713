use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Which derived analytics have at least one supporting event.
///
/// Presentation code checks these before rendering a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct CapabilityFlags(u32);

impl CapabilityFlags {
    pub const NONE: Self = Self(0);
    pub const API: Self = Self(1 << 0);
    pub const WORKER: Self = Self(1 << 1);
    pub const WORKER_ACTIVITY: Self = Self(1 << 2);
    pub const CONNECTION: Self = Self(1 << 3);
    pub const CONNECTION_SCHEDULE: Self = Self(1 << 4);
    pub const CONNECTION_EXEC: Self = Self(1 << 5);
    pub const CONNECTION_FLOW_BLOCKED: Self = Self(1 << 6);
    pub const CONNECTION_TPUT: Self = Self(1 << 7);
    pub const STREAM: Self = Self(1 << 8);
    pub const STREAM_FLOW_BLOCKED: Self = Self(1 << 9);
    pub const DATAPATH: Self = Self(1 << 10);
    pub const PACKET: Self = Self(1 << 11);

    const NAMES: [(Self, &'static str); 12] = [
        (Self::API, "api"),
        (Self::WORKER, "worker"),
        (Self::WORKER_ACTIVITY, "worker_activity"),
        (Self::CONNECTION, "connection"),
        (Self::CONNECTION_SCHEDULE, "connection_schedule"),
        (Self::CONNECTION_EXEC, "connection_exec"),
        (Self::CONNECTION_FLOW_BLOCKED, "connection_flow_blocked"),
        (Self::CONNECTION_TPUT, "connection_tput"),
        (Self::STREAM, "stream"),
        (Self::STREAM_FLOW_BLOCKED, "stream_flow_blocked"),
        (Self::DATAPATH, "datapath"),
        (Self::PACKET, "packet"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Names of all raised flags, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for CapabilityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CapabilityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CapabilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.names().join(","))
    }
}
