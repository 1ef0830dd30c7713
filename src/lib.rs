//! Reconstructs QUIC transport behavior from trace event captures.
//!
//! Captures are decoded by [`tracer`], folded into a [`model::TraceState`]
//! in one pass, and queried through the per-object views and the
//! [`analysis`] functions once ingestion finishes.

pub mod analysis;
pub mod config;
pub mod model;
pub mod report;
pub mod tracer;
