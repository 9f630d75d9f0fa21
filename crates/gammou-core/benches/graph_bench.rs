//! Criterion benchmarks for circuit compilation and execution.
//!
//! Two axes:
//!
//! - **Compile**: validation, Kahn sort and slot allocation
//! - **Execute**: per-sample `evaluate()` throughput over a block, for one
//!   instance and for a full polyphonic set of instances
//!
//! Run with: `cargo bench -p gammou-core -- circuit/`
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gammou_core::nodes::{Envelope, Gain, Multiply, SinOscillator, Sum};
use gammou_core::{CircuitFrame, GraphExecutionContext};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Circuit constructors
// ---------------------------------------------------------------------------

fn linear(n: usize, instances: usize) -> (CircuitFrame, GraphExecutionContext) {
    let (mut frame, ctx) = CircuitFrame::new(1, 1, instances);
    let mut prev = frame.input_node();
    for _ in 0..n {
        let g = frame.add_node(Arc::new(Gain::new(0.9)));
        frame.circuit_mut().connect(prev, 0, g, 0).unwrap();
        prev = g;
    }
    let output = frame.output_node();
    frame.circuit_mut().connect(prev, 0, output, 0).unwrap();
    (frame, ctx)
}

/// Oscillator times envelope with a delayed feedback tap, the shape of a
/// typical voice patch.
fn voice(instances: usize) -> (CircuitFrame, GraphExecutionContext) {
    let (mut frame, ctx) = CircuitFrame::new(2, 1, instances);
    let osc = frame.add_node(Arc::new(SinOscillator::new(SAMPLE_RATE)));
    let env = frame.add_node(Arc::new(Envelope::new(SAMPLE_RATE, 0.005, 0.2)));
    let amp = frame.add_node(Arc::new(Multiply));
    let fb = frame.add_node(Arc::new(Gain::new(0.3)));
    let mix = frame.add_node(Arc::new(Sum::new(2)));
    let (i, o) = (frame.input_node(), frame.output_node());
    let c = frame.circuit_mut();
    c.connect(i, 0, env, 0).unwrap();
    c.connect(i, 1, osc, 0).unwrap();
    c.connect_delayed(mix, 0, fb, 0).unwrap();
    c.connect(fb, 0, osc, 1).unwrap();
    c.connect(osc, 0, amp, 0).unwrap();
    c.connect(env, 0, amp, 1).unwrap();
    c.connect(amp, 0, mix, 0).unwrap();
    c.connect(mix, 0, o, 0).unwrap();
    (frame, ctx)
}

// ---------------------------------------------------------------------------
// Compile benchmarks
// ---------------------------------------------------------------------------

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit/compile");

    for n in [5, 20, 100] {
        let (frame, _ctx) = linear(n, 1);
        group.bench_with_input(BenchmarkId::new("linear", n), &frame, |b, frame| {
            b.iter(|| black_box(frame.compile().unwrap()));
        });
    }

    let (frame, _ctx) = voice(16);
    group.bench_function("voice_16_instances", |b| {
        b.iter(|| black_box(frame.compile().unwrap()));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Execute benchmarks
// ---------------------------------------------------------------------------

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit/execute");
    let input = vec![0.5f32; BLOCK_SIZE];
    let mut output = vec![0.0f32; BLOCK_SIZE];

    for n in [5, 20] {
        let (frame, mut ctx) = linear(n, 1);
        frame.compile().unwrap();
        ctx.sync();
        group.bench_function(BenchmarkId::new("linear_block256", n), |b| {
            b.iter(|| {
                ctx.process_block(0, black_box(&input), &mut output, BLOCK_SIZE);
                black_box(&output);
            });
        });
    }

    let (frame, mut ctx) = voice(16);
    frame.compile().unwrap();
    ctx.sync();
    let voice_in: Vec<f32> = (0..BLOCK_SIZE).flat_map(|_| [1.0, 440.0]).collect();
    group.bench_function("voice_x16_block256", |b| {
        b.iter(|| {
            for instance in 0..16 {
                ctx.process_block(instance, black_box(&voice_in), &mut output, BLOCK_SIZE);
            }
            black_box(&output);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
