//! Derived analytics computed from recorded event histories after ingestion.
//!
//! Everything here is a pure function of its inputs and may run from several
//! threads at once over a finished [`crate::model::TraceState`].

pub mod aggregate;
pub mod api;
pub mod histogram;
pub mod intervals;
pub mod sampler;
pub mod throughput;

pub use aggregate::{CounterAggregate, DurationAggregate, DurationSnapshot, SchedulingStats};
pub use api::{api_calls, ApiCall};
pub use intervals::{
    activity_intervals, execution_intervals, flow_blocked_intervals, schedule_intervals,
    ActivityInterval, ExecutionInterval, FlowBlockedInterval, ScheduleInterval,
};
pub use sampler::{raw_tput_samples, RawSampler, RawTputSample, SampleMode, TputDataType};
pub use throughput::{batching_windows, throughput, BatchingWindow, ThroughputSample};
