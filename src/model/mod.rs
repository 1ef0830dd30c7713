//! Single-pass reconstruction of transport objects from trace events.
//!
//! [`TraceState`] owns one [`set::LiveSet`] per object kind and routes each
//! event to the reducer for its object type. Objects refer to each other
//! through [`set::Handle`]s resolved back through the aggregate.

pub mod connection;
pub mod datapath;
pub mod flags;
pub mod key;
pub mod packet;
pub mod session;
pub mod set;
pub mod state;
pub mod stream;
pub mod timing;
pub mod worker;

pub use connection::{Connection, ConnectionState};
pub use datapath::Datapath;
pub use flags::CapabilityFlags;
pub use key::ObjectKey;
pub use packet::{PacketBatch, ReceivePacket, SendPacket};
pub use session::Session;
pub use set::{Handle, LiveSet, TraceObject};
pub use state::TraceState;
pub use stream::Stream;
pub use timing::{StreamState, StreamTiming};
pub use worker::Worker;
