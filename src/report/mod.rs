//! Summary of possible problems in a finished trace.

use std::fmt;

use serde::Serialize;

use crate::analysis::histogram::{bucket_boundaries, BUCKET_LABELS, NUM_BUCKETS};
use crate::config::{AnalysisConfig, Config, ReportConfig};
use crate::model::{ConnectionState, StreamState, TraceState, Worker};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub events: EventSummary,
    /// Names of the analytics with data.
    pub capabilities: Vec<&'static str>,
    pub workers: WorkerSummary,
    pub connections: ConnectionSummary,
    pub streams: StreamSummary,
    pub datapaths: DatapathSummary,
    pub api_calls: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub total: u64,
    pub filtered: u64,
    pub by_object_type: Vec<ObjectCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectCount {
    pub object_type: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub workers: Vec<WorkerRow>,
    /// Ids of workers whose average queue delay crossed the threshold.
    pub unhealthy: Vec<u64>,
    pub mostly_idle: usize,
    pub really_active: usize,
    /// Queued time across all workers, non-empty buckets only.
    pub queue_delay: Vec<BucketCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketCount {
    pub label: &'static str,
    /// Exclusive upper bound; 0 for the unbounded last bucket.
    pub upper_bound_ns: u64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerRow {
    pub id: u64,
    pub thread_id: Option<u32>,
    pub ideal_processor: Option<u16>,
    pub total_connections: u32,
    pub active_percent: u64,
    pub average_queue_delay_us: u64,
    pub processing_time_us: u64,
}

impl WorkerRow {
    fn from_worker(w: &Worker) -> Self {
        Self {
            id: w.id,
            thread_id: w.thread_id,
            ideal_processor: w.ideal_processor,
            total_connections: w.total_connections,
            active_percent: w.active_percent(),
            average_queue_delay_us: w.average_queue_delay_us(),
            processing_time_us: w.total_processing_time_us(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub count: usize,
    pub servers: usize,
    pub clients: usize,
    pub by_state: Vec<StateCount>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Highest windowed send rate of any connection.
    pub peak_tx_rate_bps: u64,
    pub peak_rx_rate_bps: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateCount {
    pub state: ConnectionState,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub count: usize,
    pub timing_errors: usize,
    pub mean_total_time_ns: u64,
    /// Time summed over all streams, for states any stream spent time in.
    pub state_totals: Vec<StateTotal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateTotal {
    pub state: StreamState,
    pub total_ns: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatapathSummary {
    pub count: usize,
    pub send_calls: u64,
    pub recv_calls: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Largest average bytes per send call in any batching window.
    pub peak_send_batch_bytes: f64,
    pub peak_recv_batch_bytes: f64,
}

impl Report {
    pub fn build(state: &TraceState, cfg: &Config) -> Self {
        let stats = state.stats();
        let events = EventSummary {
            total: stats.total(),
            filtered: stats.filtered(),
            by_object_type: stats
                .snapshot()
                .into_iter()
                .map(|(t, count)| ObjectCount {
                    object_type: t.as_str(),
                    count,
                })
                .collect(),
        };

        Self {
            events,
            capabilities: state.capability_flags().names(),
            workers: summarize_workers(state, &cfg.report),
            connections: summarize_connections(state, &cfg.analysis),
            streams: summarize_streams(state),
            datapaths: summarize_datapaths(state, &cfg.analysis),
            api_calls: state.api_calls().len(),
        }
    }
}

fn summarize_workers(state: &TraceState, cfg: &ReportConfig) -> WorkerSummary {
    let unhealthy_us = u64::try_from(cfg.unhealthy_queue_delay.as_micros()).unwrap_or(u64::MAX);
    let rows: Vec<WorkerRow> = state.workers().into_iter().map(WorkerRow::from_worker).collect();

    let mut buckets = [0u32; NUM_BUCKETS];
    for w in state.workers() {
        for (total, n) in buckets.iter_mut().zip(w.queue_delay_histogram()) {
            *total = total.saturating_add(n);
        }
    }
    let queue_delay = bucket_boundaries()
        .into_iter()
        .zip(BUCKET_LABELS)
        .zip(buckets)
        .filter(|(_, count)| *count > 0)
        .map(|((upper_bound_ns, label), count)| BucketCount {
            label,
            upper_bound_ns,
            count,
        })
        .collect();

    let mut summary = WorkerSummary {
        unhealthy: Vec::new(),
        mostly_idle: 0,
        really_active: 0,
        queue_delay,
        workers: Vec::new(),
    };
    for row in &rows {
        if row.average_queue_delay_us >= unhealthy_us {
            summary.unhealthy.push(row.id);
        }
        if row.active_percent <= cfg.idle_active_percent {
            summary.mostly_idle += 1;
        } else if row.active_percent >= cfg.busy_active_percent {
            summary.really_active += 1;
        }
    }
    summary.workers = rows;
    summary
}

fn summarize_connections(state: &TraceState, cfg: &AnalysisConfig) -> ConnectionSummary {
    let conns = state.connections();
    let mut peak_tx_rate_bps = 0u64;
    let mut peak_rx_rate_bps = 0u64;
    for conn in &conns {
        for sample in conn.throughput(cfg.throughput_resolution) {
            peak_tx_rate_bps = peak_tx_rate_bps.max(sample.tx_rate_bps);
            peak_rx_rate_bps = peak_rx_rate_bps.max(sample.rx_rate_bps);
        }
    }

    let by_state = ConnectionState::all()
        .iter()
        .map(|s| StateCount {
            state: *s,
            count: conns.iter().filter(|c| c.state == *s).count(),
        })
        .filter(|s| s.count > 0)
        .collect();

    ConnectionSummary {
        count: conns.len(),
        servers: conns.iter().filter(|c| c.is_server == Some(true)).count(),
        clients: conns.iter().filter(|c| c.is_server == Some(false)).count(),
        by_state,
        bytes_sent: conns.iter().map(|c| c.bytes_sent).sum(),
        bytes_received: conns.iter().map(|c| c.bytes_received).sum(),
        peak_tx_rate_bps,
        peak_rx_rate_bps,
    }
}

fn summarize_datapaths(state: &TraceState, cfg: &AnalysisConfig) -> DatapathSummary {
    let datapaths = state.datapaths();
    let mut summary = DatapathSummary {
        count: datapaths.len(),
        send_calls: 0,
        recv_calls: 0,
        bytes_sent: 0,
        bytes_received: 0,
        peak_send_batch_bytes: 0.0,
        peak_recv_batch_bytes: 0.0,
    };
    for dp in datapaths {
        summary.send_calls += dp.send.count;
        summary.recv_calls += dp.recv.count;
        summary.bytes_sent += dp.bytes_sent();
        summary.bytes_received += dp.bytes_received();
        for window in dp.batching_windows(cfg.datapath_resolution) {
            summary.peak_send_batch_bytes =
                summary.peak_send_batch_bytes.max(window.send_batch_bytes());
            summary.peak_recv_batch_bytes =
                summary.peak_recv_batch_bytes.max(window.recv_batch_bytes());
        }
    }
    summary
}

fn summarize_streams(state: &TraceState) -> StreamSummary {
    let streams = state.streams();
    let total: u64 = streams.iter().map(|s| s.timing.total_time()).sum();
    let mean_total_time_ns = match streams.len() as u64 {
        0 => 0,
        n => total / n,
    };

    let state_totals = StreamState::all()
        .iter()
        .map(|s| StateTotal {
            state: *s,
            total_ns: streams.iter().map(|st| st.timing.time_in(*s)).sum(),
        })
        .filter(|t| t.total_ns > 0)
        .collect();

    StreamSummary {
        count: streams.len(),
        timing_errors: streams.iter().filter(|s| s.timing.encountered_error).count(),
        mean_total_time_ns,
        state_totals,
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let workers = &self.workers;
        writeln!(f, "\nWORKERS ({})\n", workers.workers.len())?;
        if workers.unhealthy.is_empty() {
            writeln!(f, "  All workers healthy.")?;
        } else {
            let ids: Vec<String> = workers.unhealthy.iter().map(|id| format!("#{id}")).collect();
            writeln!(
                f,
                "  {} workers unhealthy: [{}]",
                workers.unhealthy.len(),
                ids.join(", ")
            )?;
        }
        writeln!(f, "  {} workers mostly idle.", workers.mostly_idle)?;
        writeln!(f, "  {} workers really active.", workers.really_active)?;
        if !workers.queue_delay.is_empty() {
            writeln!(f, "  Queue delay:")?;
            for b in &workers.queue_delay {
                writeln!(f, "    {:<8}{:>8}", b.label, b.count)?;
            }
        }

        let conns = &self.connections;
        writeln!(f, "\nCONNECTIONS ({})\n", conns.count)?;
        writeln!(f, "  {} server, {} client.", conns.servers, conns.clients)?;
        for s in &conns.by_state {
            writeln!(f, "  {} {}.", s.count, s.state)?;
        }
        writeln!(
            f,
            "  {} bytes sent, {} bytes received.",
            conns.bytes_sent, conns.bytes_received
        )?;
        if conns.peak_tx_rate_bps > 0 || conns.peak_rx_rate_bps > 0 {
            writeln!(
                f,
                "  peak {} bps sent, {} bps received.",
                conns.peak_tx_rate_bps, conns.peak_rx_rate_bps
            )?;
        }

        let streams = &self.streams;
        writeln!(f, "\nSTREAMS ({})\n", streams.count)?;
        if streams.count > 0 {
            writeln!(f, "  {} with timing errors.", streams.timing_errors)?;
            writeln!(
                f,
                "  {} us mean lifetime.",
                streams.mean_total_time_ns / 1_000
            )?;
            for t in &streams.state_totals {
                writeln!(f, "    {:<18}{:>12} us", t.state.as_str(), t.total_ns / 1_000)?;
            }
        }

        let dps = &self.datapaths;
        writeln!(f, "\nDATAPATHS ({})\n", dps.count)?;
        if dps.count > 0 {
            writeln!(
                f,
                "  {} sends ({} bytes), {} receives ({} bytes).",
                dps.send_calls, dps.bytes_sent, dps.recv_calls, dps.bytes_received
            )?;
            writeln!(
                f,
                "  peak batch {:.0} bytes per send, {:.0} bytes per receive.",
                dps.peak_send_batch_bytes, dps.peak_recv_batch_bytes
            )?;
        }

        writeln!(f, "\nAPI CALLS ({})", self.api_calls)
    }
}
