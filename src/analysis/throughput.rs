//! Fixed-resolution windows over connection and datapath histories.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::tracer::event::{Event, EventKind};

/// One closed connection throughput window. Gauges hold the last value seen
/// in the window; rates are bits per second over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ThroughputSample {
    pub timestamp: u64,
    pub duration: u64,
    pub rtt_us: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub bytes_in_flight: u32,
    pub congestion_window: u32,
    pub bytes_buffered_for_send: u64,
    pub flow_control_available: u64,
    pub stream_flow_control_available: u64,
    pub tx_rate_bps: u64,
    pub rx_rate_bps: u64,
    pub congestion_events: u32,
}

fn bit_rate(bytes: u64, duration_ns: u64) -> u64 {
    if duration_ns == 0 {
        return 0;
    }
    let bits = u128::from(bytes) * 8 * 1_000_000_000;
    u64::try_from(bits / u128::from(duration_ns)).unwrap_or(u64::MAX)
}

fn window_ns(resolution: Duration) -> u64 {
    u64::try_from(resolution.as_nanos()).unwrap_or(u64::MAX)
}

/// Buckets flow statistics into windows of `resolution`. A window closes on
/// the first flow event at or past its end; the last partial window is
/// flushed at the last flow event.
pub fn throughput(events: &[Arc<Event>], resolution: Duration) -> Vec<ThroughputSample> {
    let resolution = window_ns(resolution);
    let mut out = Vec::new();
    let Some(first) = events.first() else {
        return out;
    };

    let mut sample = ThroughputSample {
        timestamp: first.timestamp,
        ..ThroughputSample::default()
    };
    let mut tx_baseline: Option<u64> = None;
    let mut rx_baseline: Option<u64> = None;
    let mut dirty = false;
    let mut last_ts = first.timestamp;

    for evt in events {
        match &evt.kind {
            EventKind::ConnOutFlowStats(stats) => {
                sample.rtt_us = stats.smoothed_rtt;
                sample.bytes_sent = stats.bytes_sent;
                sample.bytes_in_flight = stats.bytes_in_flight;
                sample.congestion_window = stats.congestion_window;
                sample.bytes_buffered_for_send = stats.posted_bytes;
                sample.flow_control_available = stats.connection_flow_control;
                tx_baseline.get_or_insert(stats.bytes_sent);
            }
            EventKind::ConnInFlowStats { bytes_recv } => {
                sample.bytes_received = *bytes_recv;
                rx_baseline.get_or_insert(*bytes_recv);
            }
            EventKind::ConnCongestion => sample.congestion_events += 1,
            // Totals only seed a window anchored at the trace origin.
            EventKind::ConnStats(stats) if sample.timestamp == 0 => {
                sample.rtt_us = stats.smoothed_rtt;
                sample.bytes_sent = stats.send_total_bytes;
                sample.bytes_received = stats.recv_total_bytes;
                sample.congestion_events = stats.congestion_count;
            }
            EventKind::ConnOutFlowStreamStats {
                stream_flow_control,
                ..
            } => sample.stream_flow_control_available = *stream_flow_control,
            _ => continue,
        }
        dirty = true;
        last_ts = evt.timestamp;

        if sample.timestamp.saturating_add(resolution) <= evt.timestamp {
            close_window(
                &mut out,
                &mut sample,
                &mut tx_baseline,
                &mut rx_baseline,
                evt.timestamp,
            );
            dirty = false;
        }
    }

    if dirty {
        close_window(
            &mut out,
            &mut sample,
            &mut tx_baseline,
            &mut rx_baseline,
            last_ts,
        );
    }
    out
}

fn close_window(
    out: &mut Vec<ThroughputSample>,
    sample: &mut ThroughputSample,
    tx_baseline: &mut Option<u64>,
    rx_baseline: &mut Option<u64>,
    end: u64,
) {
    sample.duration = end.saturating_sub(sample.timestamp);
    let tx = sample
        .bytes_sent
        .saturating_sub(tx_baseline.unwrap_or(sample.bytes_sent));
    let rx = sample
        .bytes_received
        .saturating_sub(rx_baseline.unwrap_or(sample.bytes_received));
    sample.tx_rate_bps = bit_rate(tx, sample.duration);
    sample.rx_rate_bps = bit_rate(rx, sample.duration);
    out.push(*sample);

    sample.timestamp = end;
    *tx_baseline = Some(sample.bytes_sent);
    *rx_baseline = Some(sample.bytes_received);
    sample.congestion_events = 0;
}

/// Datapath call batching within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchingWindow {
    pub timestamp: u64,
    pub duration: u64,
    pub send_calls: u64,
    pub send_bytes: u64,
    pub recv_calls: u64,
    pub recv_bytes: u64,
}

impl BatchingWindow {
    /// Average bytes handed to one send call.
    pub fn send_batch_bytes(&self) -> f64 {
        if self.send_calls == 0 {
            return 0.0;
        }
        self.send_bytes as f64 / self.send_calls as f64
    }

    /// Average bytes returned by one receive call.
    pub fn recv_batch_bytes(&self) -> f64 {
        if self.recv_calls == 0 {
            return 0.0;
        }
        self.recv_bytes as f64 / self.recv_calls as f64
    }
}

/// Windows of datapath send/receive calls. An event at or past the end of
/// the current window closes it and opens the next one.
pub fn batching_windows(events: &[Arc<Event>], resolution: Duration) -> Vec<BatchingWindow> {
    let resolution = window_ns(resolution);
    let mut out = Vec::new();
    let mut window: Option<BatchingWindow> = None;

    for evt in events {
        let (send, size) = match evt.kind {
            EventKind::DatapathSend { total_size, .. } => (true, u64::from(total_size)),
            EventKind::DatapathRecv { total_size, .. } => (false, u64::from(total_size)),
            _ => continue,
        };

        if let Some(w) = window.as_mut() {
            if w.timestamp.saturating_add(resolution) <= evt.timestamp {
                w.duration = evt.timestamp.saturating_sub(w.timestamp);
                out.push(*w);
                window = None;
            }
        }
        let current = window.get_or_insert(BatchingWindow {
            timestamp: evt.timestamp,
            ..BatchingWindow::default()
        });

        current.duration = evt.timestamp.saturating_sub(current.timestamp);
        if send {
            current.send_calls += 1;
            current.send_bytes += size;
        } else {
            current.recv_calls += 1;
            current.recv_bytes += size;
        }
    }

    if let Some(w) = window {
        out.push(w);
    }
    out
}
