use crate::config::ParseMode;

/// Object kinds that draw sequence ids from a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    Worker = 0,
    Connection = 1,
    Stream = 2,
    Datapath = 3,
    SendPacket = 4,
    ReceivePacket = 5,
    PacketBatch = 6,
}

/// Number of ObjectKind variants, used for array sizing.
pub const OBJECT_KIND_CARDINALITY: usize = 7;

impl ObjectKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Connection => "connection",
            Self::Stream => "stream",
            Self::Datapath => "datapath",
            Self::SendPacket => "send_packet",
            Self::ReceivePacket => "receive_packet",
            Self::PacketBatch => "packet_batch",
        }
    }
}

/// Per-ingestion settings and id counters. Each [`crate::model::state::TraceState`]
/// owns one, so independent sessions never share numbering.
#[derive(Debug, Clone)]
pub struct Session {
    mode: ParseMode,
    next_ids: [u64; OBJECT_KIND_CARDINALITY],
}

impl Session {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            next_ids: [1; OBJECT_KIND_CARDINALITY],
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Hands out the next sequence id for `kind`, starting at 1.
    pub fn next_id(&mut self, kind: ObjectKind) -> u64 {
        let slot = &mut self.next_ids[kind as usize];
        let id = *slot;
        *slot += 1;
        id
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ParseMode::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_per_kind_and_monotonic() {
        let mut session = Session::default();
        assert_eq!(session.next_id(ObjectKind::Connection), 1);
        assert_eq!(session.next_id(ObjectKind::Connection), 2);
        assert_eq!(session.next_id(ObjectKind::Worker), 1);
        assert_eq!(session.next_id(ObjectKind::Connection), 3);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut a = Session::new(ParseMode::Full);
        let mut b = Session::new(ParseMode::Filtered);
        a.next_id(ObjectKind::Stream);
        a.next_id(ObjectKind::Stream);
        assert_eq!(b.next_id(ObjectKind::Stream), 1);
        assert_eq!(b.mode(), ParseMode::Filtered);
    }
}
