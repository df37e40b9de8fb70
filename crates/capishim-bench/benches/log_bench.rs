//! Cost of the call-log path: argument rendering and record emission.

use std::ffi::c_char;

use capishim_core::log::{describe_addr, describe_c_str, events};
use capishim_core::{ArgRepr, LogEntry, LogLevel, LogSink};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn bench_arg_repr(c: &mut Criterion) {
    let mut group = c.benchmark_group("arg_repr");

    group.bench_function("int", |b| {
        let v: i64 = 1 << 40;
        b.iter(|| unsafe { criterion::black_box(&v).repr() });
    });
    group.bench_function("pointer", |b| {
        b.iter(|| describe_addr(criterion::black_box(0x7f00_dead_beef)));
    });

    let short = c"mod.Error";
    let long = c"a format string that runs well past the sixty-four byte logging limit %s %d";
    for (label, text) in [("short", short), ("truncated", long)] {
        let ptr: *const c_char = text.as_ptr();
        group.bench_with_input(BenchmarkId::new("c_str", label), &ptr, |b, &p| {
            b.iter(|| unsafe { describe_c_str(criterion::black_box(p)) });
        });
    }
    group.finish();
}

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");

    group.bench_function("call_record", |b| {
        let mut sink = LogSink::discard();
        b.iter(|| {
            let entry = LogEntry::new(LogLevel::Trace, events::CALL)
                .with_symbol("PyObject_Call")
                .with_args(vec!["0x1000".to_string(), "0x2000".to_string(), "NULL".to_string()]);
            sink.emit(criterion::black_box(entry))
        });
    });
    group.bench_function("stats_record", |b| {
        let mut sink = LogSink::discard();
        b.iter(|| {
            let entry = LogEntry::new(LogLevel::Info, events::STATS)
                .with_symbol("PyList_New")
                .with_counters(1_000_000, 42_000_000);
            sink.emit(criterion::black_box(entry))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_arg_repr, bench_emit);
criterion_main!(benches);
