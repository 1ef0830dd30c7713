use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quictrace::config::ParseMode;
use quictrace::model::TraceState;
use quictrace::tracer::decode_capture;
use quictrace::tracer::event::{EventId, ObjectType, ScheduleState};
use quictrace::tracer::parse::{parse_event, HEADER_SIZE};

fn header(ts: u64, tid: u32, id: EventId, object_type: ObjectType, pointer: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(&ts.to_le_bytes());
    buf.extend_from_slice(&1337u32.to_le_bytes());
    buf.extend_from_slice(&tid.to_le_bytes());
    buf.extend_from_slice(&(id as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.push(8);
    buf.push(object_type as u8);
    buf.extend_from_slice(&[0u8; 2]);
    buf.extend_from_slice(&pointer.to_le_bytes());
    buf
}

fn schedule_record(ts: u64, conn: u64, state: ScheduleState) -> Vec<u8> {
    let mut data = header(ts, 10, EventId::ConnScheduleState, ObjectType::Connection, conn);
    data.push(state as u8);
    data
}

fn send_record(ts: u64) -> Vec<u8> {
    let mut data = header(ts, 10, EventId::DatapathSend, ObjectType::Datapath, 0x9000);
    data.extend_from_slice(&2_400u32.to_le_bytes());
    data.push(2);
    data.extend_from_slice(&1_200u16.to_le_bytes());
    data.push(4);
    data.extend_from_slice(&[10, 0, 0, 1]);
    data.extend_from_slice(&443u16.to_le_bytes());
    data.push(0);
    data
}

fn log_record(ts: u64, conn: u64) -> Vec<u8> {
    let mut data = header(ts, 10, EventId::ConnLogVerbose, ObjectType::Connection, conn);
    let msg = b"sending 2 packets on path 0";
    data.extend_from_slice(&(msg.len() as u16).to_le_bytes());
    data.extend_from_slice(msg);
    data
}

/// A capture of 64 connections cycling through schedule states, with a
/// send and a verbose log line per cycle.
fn build_capture() -> Vec<u8> {
    let mut out = Vec::new();
    let mut push = |record: Vec<u8>| {
        out.extend_from_slice(&(record.len() as u32).to_le_bytes());
        out.extend_from_slice(&record);
    };

    let mut ts = 0u64;
    for round in 0..64u64 {
        for i in 0..64u64 {
            let conn = 0x10_000 + i * 0x100;
            let state = match round % 3 {
                0 => ScheduleState::Queued,
                1 => ScheduleState::Processing,
                _ => ScheduleState::Idle,
            };
            push(schedule_record(ts, conn, state));
            push(send_record(ts + 100));
            push(log_record(ts + 200, conn));
            ts += 1_000;
        }
    }
    out
}

fn bench_parse_event(c: &mut Criterion) {
    let schedule = schedule_record(1, 0x2000, ScheduleState::Processing);
    let send = send_record(1);
    let log = log_record(1, 0x2000);

    c.bench_function("parse_event/conn_schedule_state", |b| {
        b.iter(|| parse_event(black_box(&schedule), ParseMode::Full).expect("parse schedule"))
    });

    c.bench_function("parse_event/datapath_send", |b| {
        b.iter(|| parse_event(black_box(&send), ParseMode::Full).expect("parse send"))
    });

    c.bench_function("parse_event/conn_log_filtered", |b| {
        b.iter(|| parse_event(black_box(&log), ParseMode::Filtered).expect("parse log"))
    });
}

fn bench_ingest(c: &mut Criterion) {
    let capture = build_capture();

    for mode in [ParseMode::Full, ParseMode::Filtered] {
        let name = format!("ingest/capture_12k_{mode:?}").to_lowercase();
        c.bench_function(&name, |b| {
            b.iter(|| {
                let mut state = TraceState::new(mode);
                decode_capture(black_box(&capture), mode, |evt| state.add_event(evt));
                state.finalize();
                black_box(state.events().len())
            })
        });
    }
}

fn bench_suite(c: &mut Criterion) {
    bench_parse_event(c);
    bench_ingest(c);
}

criterion_group!(benches, bench_suite);
criterion_main!(benches);
