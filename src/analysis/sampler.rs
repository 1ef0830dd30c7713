//! Raw per-metric sample series.
//!
//! Each tracked metric owns a [`RawSampler`]. Updates open a sample at the
//! update time; the next accepted update (or [`RawSampler::finalize`])
//! closes it with its duration.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::tracer::event::{Event, EventKind};

/// Metric a raw sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TputDataType {
    Tx = 0,
    PktCreate,
    TxAck,
    TxDelay,
    Rx,
    Rtt,
    InFlight,
    CWnd,
    Bufferred,
    ConnFC,
    StreamFC,
}

impl TputDataType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tx => "tx",
            Self::PktCreate => "pkt_create",
            Self::TxAck => "tx_ack",
            Self::TxDelay => "tx_delay",
            Self::Rx => "rx",
            Self::Rtt => "rtt",
            Self::InFlight => "in_flight",
            Self::CWnd => "cwnd",
            Self::Bufferred => "bufferred",
            Self::ConnFC => "conn_fc",
            Self::StreamFC => "stream_fc",
        }
    }
}

impl fmt::Display for TputDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an update is turned into a sample value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// The raw new value.
    Value,
    /// `new - last`, with `last` starting at zero.
    Diff,
    /// `new - last`, but zero for the first observation.
    DiffTime,
    /// Running maximum minus the new value; increases only raise the max.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawTputSample {
    pub data_type: TputDataType,
    pub timestamp: u64,
    pub duration: u64,
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct RawSampler {
    data_type: TputDataType,
    mode: SampleMode,
    include_duplicates: bool,
    last_value: u64,
    last_value_set: bool,
    open_timestamp: u64,
    open_value: u64,
    samples: Vec<RawTputSample>,
}

impl RawSampler {
    pub fn new(data_type: TputDataType, mode: SampleMode, include_duplicates: bool) -> Self {
        Self {
            data_type,
            mode,
            include_duplicates,
            last_value: 0,
            last_value_set: false,
            open_timestamp: 0,
            open_value: 0,
            samples: Vec::new(),
        }
    }

    pub fn update(&mut self, new_value: u64, timestamp: u64) {
        if self.last_value_set && new_value == self.last_value && !self.include_duplicates {
            return;
        }
        if self.mode == SampleMode::Drop && new_value > self.last_value {
            self.last_value = new_value;
            return;
        }

        if self.last_value_set {
            self.close(timestamp);
        }

        self.open_timestamp = timestamp;
        self.open_value = match self.mode {
            SampleMode::Value => new_value,
            SampleMode::Diff => new_value.wrapping_sub(self.last_value),
            SampleMode::DiffTime if self.last_value_set => new_value.wrapping_sub(self.last_value),
            SampleMode::DiffTime => 0,
            SampleMode::Drop => self.last_value - new_value,
        };
        self.last_value = new_value;
        self.last_value_set = true;
    }

    fn close(&mut self, timestamp: u64) {
        self.samples.push(RawTputSample {
            data_type: self.data_type,
            timestamp: self.open_timestamp,
            duration: timestamp.saturating_sub(self.open_timestamp),
            value: self.open_value,
        });
    }

    /// Closes the open sample, if any, at `final_timestamp`.
    pub fn finalize(&mut self, final_timestamp: u64) {
        if self.last_value_set {
            self.close(final_timestamp);
        }
    }

    pub fn samples(&self) -> &[RawTputSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<RawTputSample> {
        self.samples
    }
}

/// Builds every raw series for one connection's event history. Series are
/// concatenated in [`TputDataType`] order and closed at the last event.
pub fn raw_tput_samples(events: &[Arc<Event>]) -> Vec<RawTputSample> {
    use SampleMode::*;
    use TputDataType::*;

    let mut tx = RawSampler::new(Tx, Value, true);
    let mut pkt_create = RawSampler::new(PktCreate, Diff, true);
    let mut tx_ack = RawSampler::new(TxAck, Drop, true);
    let mut tx_delay = RawSampler::new(TxDelay, DiffTime, true);
    let mut rx = RawSampler::new(Rx, Diff, true);
    let mut rtt = RawSampler::new(Rtt, Value, false);
    let mut in_flight = RawSampler::new(InFlight, Value, false);
    let mut cwnd = RawSampler::new(CWnd, Value, false);
    let mut posted = RawSampler::new(Bufferred, Value, false);
    let mut conn_fc = RawSampler::new(ConnFC, Value, false);
    let mut stream_fc = RawSampler::new(StreamFC, Value, false);

    for evt in events {
        let ts = evt.timestamp;
        match &evt.kind {
            EventKind::DatapathSend { total_size, .. } => {
                tx.update(u64::from(*total_size), ts);
                tx_delay.update(ts / 1000, ts);
            }
            EventKind::ConnOutFlowStats(stats) => {
                pkt_create.update(stats.bytes_sent, ts);
                tx_ack.update(u64::from(stats.bytes_in_flight), ts);
                rtt.update(u64::from(stats.smoothed_rtt), ts);
                in_flight.update(u64::from(stats.bytes_in_flight), ts);
                cwnd.update(u64::from(stats.congestion_window), ts);
                posted.update(stats.posted_bytes, ts);
                conn_fc.update(stats.connection_flow_control, ts);
            }
            EventKind::ConnInFlowStats { bytes_recv } => rx.update(*bytes_recv, ts),
            EventKind::ConnOutFlowStreamStats {
                stream_flow_control,
                ..
            } => stream_fc.update(*stream_flow_control, ts),
            _ => {}
        }
    }

    let final_ts = events.last().map_or(0, |evt| evt.timestamp);
    let mut out = Vec::new();
    for mut sampler in [
        tx, pkt_create, tx_ack, tx_delay, rx, rtt, in_flight, cwnd, posted, conn_fc, stream_fc,
    ] {
        sampler.finalize(final_ts);
        out.extend(sampler.into_samples());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::event::OutFlowStats;

    fn feed(sampler: &mut RawSampler, points: &[(u64, u64)]) {
        for (value, ts) in points {
            sampler.update(*value, *ts);
        }
    }

    #[test]
    fn test_value_mode_durations_cover_elapsed() {
        let points = [(5, 100), (9, 130), (9, 170), (2, 240), (11, 260)];
        let mut s = RawSampler::new(TputDataType::Rtt, SampleMode::Value, false);
        feed(&mut s, &points);
        s.finalize(300);

        let total: u64 = s.samples().iter().map(|x| x.duration).sum();
        assert_eq!(total, 300 - 100);
        // Duplicate 9 at 170 was suppressed.
        let values: Vec<u64> = s.samples().iter().map(|x| x.value).collect();
        assert_eq!(values, vec![5, 9, 2, 11]);
        assert_eq!(s.samples()[1].duration, 240 - 130);
    }

    #[test]
    fn test_value_mode_with_duplicates_keeps_them() {
        let mut s = RawSampler::new(TputDataType::Tx, SampleMode::Value, true);
        feed(&mut s, &[(4, 0), (4, 10), (4, 20)]);
        s.finalize(25);
        assert_eq!(s.samples().len(), 3);
        assert_eq!(s.samples()[2].duration, 5);
    }

    #[test]
    fn test_diff_time_first_sample_is_zero() {
        let mut s = RawSampler::new(TputDataType::TxDelay, SampleMode::DiffTime, true);
        feed(&mut s, &[(1_000, 10), (1_004, 20), (1_010, 30)]);
        s.finalize(40);
        let values: Vec<u64> = s.samples().iter().map(|x| x.value).collect();
        assert_eq!(values, vec![0, 4, 6]);
    }

    #[test]
    fn test_diff_first_sample_is_raw_value() {
        let mut s = RawSampler::new(TputDataType::PktCreate, SampleMode::Diff, true);
        feed(&mut s, &[(1_000, 10), (1_500, 20)]);
        s.finalize(30);
        let values: Vec<u64> = s.samples().iter().map(|x| x.value).collect();
        assert_eq!(values, vec![1_000, 500]);
    }

    #[test]
    fn test_drop_mode_emits_only_on_decrease() {
        let mut s = RawSampler::new(TputDataType::TxAck, SampleMode::Drop, true);
        feed(&mut s, &[(100, 0), (300, 10), (250, 20), (400, 30), (100, 40)]);
        s.finalize(50);
        let got: Vec<(u64, u64, u64)> = s
            .samples()
            .iter()
            .map(|x| (x.timestamp, x.duration, x.value))
            .collect();
        assert_eq!(got, vec![(20, 20, 50), (40, 10, 300)]);
    }

    #[test]
    fn test_finalize_without_updates_is_empty() {
        let mut s = RawSampler::new(TputDataType::Rx, SampleMode::Diff, true);
        s.finalize(99);
        assert!(s.samples().is_empty());
    }

    #[test]
    fn test_raw_tput_samples_series() {
        let stats = |sent: u64, in_flight: u32| {
            EventKind::ConnOutFlowStats(OutFlowStats {
                bytes_sent: sent,
                bytes_in_flight: in_flight,
                congestion_window: 12_000,
                smoothed_rtt: 40,
                ..OutFlowStats::default()
            })
        };
        let events: Vec<Arc<Event>> = vec![
            Arc::new(Event::new(stats(1_000, 1_000), 100)),
            Arc::new(Event::new(
                EventKind::DatapathSend {
                    total_size: 1_200,
                    buffer_count: 1,
                    segment_size: 0,
                    remote: None,
                    local: None,
                },
                150,
            )),
            Arc::new(Event::new(stats(3_000, 600), 200)),
            Arc::new(Event::new(EventKind::ConnInFlowStats { bytes_recv: 800 }, 260)),
        ];
        let samples = raw_tput_samples(&events);

        let of = |t: TputDataType| -> Vec<(u64, u64, u64)> {
            samples
                .iter()
                .filter(|s| s.data_type == t)
                .map(|s| (s.timestamp, s.duration, s.value))
                .collect()
        };
        assert_eq!(of(TputDataType::Tx), vec![(150, 110, 1_200)]);
        assert_eq!(
            of(TputDataType::PktCreate),
            vec![(100, 100, 1_000), (200, 60, 2_000)]
        );
        assert_eq!(of(TputDataType::TxAck), vec![(200, 60, 400)]);
        assert_eq!(of(TputDataType::TxDelay), vec![(150, 110, 0)]);
        assert_eq!(of(TputDataType::Rx), vec![(260, 0, 800)]);
        // cwnd never changed; one sample spans the whole history.
        assert_eq!(of(TputDataType::CWnd), vec![(100, 160, 12_000)]);
        assert_eq!(samples[0].data_type, TputDataType::Tx);
    }
}
