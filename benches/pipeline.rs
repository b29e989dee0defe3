//! Benchmarks for the trellis pipeline: compile, cache codec and execution.
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use trellis::ast::Program;
use trellis::ast::build::*;
use trellis::{Config, Context, Output};
use trellis_cache::codec;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// `functions` routines, each with a loop, a closure and a try block.
fn synthetic_program(functions: usize) -> Program {
    let mut body = Vec::with_capacity(functions * 2);
    for i in 0..functions {
        let fname = format!("work{i}");
        body.push(function(
            &fname,
            &["n"],
            vec![
                var("acc", int(0)),
                function(
                    "bump",
                    &["d"],
                    vec![expr(assign("acc", add(name("acc"), name("d"))))],
                ),
                for_range(
                    "k",
                    true,
                    int(1),
                    name("n"),
                    vec![expr(call("bump", vec![name("k")]))],
                ),
                try_catch(
                    vec![if_(lt(name("acc"), int(0)), vec![throw(string("neg"))], None)],
                    Some("e"),
                    vec![ret(int(-1))],
                ),
                ret(name("acc")),
            ],
        ));
        body.push(expr(call(&fname, vec![int(10)])));
    }
    Program::new(body)
}

fn context() -> Context {
    Context::with_default_modules(Config::default().without_cache()).expect("default modules")
}

fn compile_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let ctx = context();
    let mut group = c.benchmark_group("pipeline/compile");
    for size in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let program = synthetic_program(size);
            b.iter(|| {
                let mut program = program.clone();
                let unit = ctx.compile(black_box(&mut program)).expect("compile");
                end_profiling_frame();
                black_box(unit.code.len())
            });
        });
    }
    group.finish();
}

fn codec_benchmarks(c: &mut Criterion) {
    let ctx = context();
    let unit = ctx.compile(&mut synthetic_program(200)).expect("compile");
    let bytes = codec::encode(&unit).expect("encode");

    let mut group = c.benchmark_group("pipeline/cache_codec");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| black_box(codec::encode(black_box(&unit)).expect("encode")))
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(codec::decode(black_box(&bytes)).expect("decode")))
    });
    group.finish();
}

fn execute_benchmarks(c: &mut Criterion) {
    let ctx = context();
    let unit = Arc::new(ctx.compile(&mut synthetic_program(50)).expect("compile"));
    c.bench_function("pipeline/execute_50_routines", |b| {
        b.iter(|| {
            let runtime = ctx.runtime(unit.clone(), Output::buffer());
            let result = runtime.run_main().expect("run");
            end_profiling_frame();
            black_box(result)
        });
    });
}

criterion_group!(benches, compile_benchmarks, codec_benchmarks, execute_benchmarks);
criterion_main!(benches);
