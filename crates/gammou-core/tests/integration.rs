//! Integration tests for gammou-core graph execution.
//!
//! Exercises the frame/context pair end to end: identity round trips,
//! idempotent recompilation, delayed feedback, error isolation, and hot swaps
//! racing against the audio loop on another thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use gammou_core::nodes::{Constant, Envelope, Gain, Identity, Multiply, SinOscillator, Sum};
use gammou_core::{Circuit, CircuitFrame, EdgeKind, GraphError, NodeId};

const SAMPLE_RATE: f32 = 48000.0;

fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|i| (i as f32 * 0.37).sin()).collect()
}

fn gain_patch(frame: &CircuitFrame, factor: f32) -> Circuit {
    let mut circuit = frame.circuit().clone();
    circuit.clear_except(&[frame.input_node(), frame.output_node()]);
    let g = circuit.add_node(Arc::new(Gain::new(factor)));
    circuit.connect(frame.input_node(), 0, g, 0).unwrap();
    circuit.connect(g, 0, frame.output_node(), 0).unwrap();
    circuit
}

// ============================================================================
// 1. Round trip through an identity patch
// ============================================================================

#[test]
fn identity_reproduces_input_exactly() {
    let (mut frame, mut ctx) = CircuitFrame::new(2, 2, 1);
    let id = frame.add_node(Arc::new(Identity::new(2)));
    let (i, o) = (frame.input_node(), frame.output_node());
    for ch in 0..2 {
        frame.circuit_mut().connect(i, ch, id, ch).unwrap();
        frame.circuit_mut().connect(id, ch, o, ch).unwrap();
    }
    frame.compile().unwrap();
    assert!(ctx.sync());

    let left = ramp(512);
    let right: Vec<f32> = left.iter().map(|x| -x * 0.5).collect();
    let mut out = [0.0; 2];
    for (&l, &r) in left.iter().zip(&right) {
        ctx.evaluate(0, &[l, r], &mut out);
        assert_eq!(out, [l, r]);
    }
}

#[test]
fn boundary_to_boundary_wire_is_identity() {
    let (mut frame, mut ctx) = CircuitFrame::new(1, 1, 1);
    let (i, o) = (frame.input_node(), frame.output_node());
    frame.circuit_mut().connect(i, 0, o, 0).unwrap();
    frame.compile().unwrap();
    ctx.sync();

    let input = ramp(256);
    let mut output = vec![0.0; 256];
    ctx.process_block(0, &input, &mut output, 256);
    assert_eq!(input, output);
}

// ============================================================================
// 2. Idempotent set_graph
// ============================================================================

#[test]
fn compiling_the_same_circuit_twice_is_observably_identical() {
    let build = |frame: &mut CircuitFrame| {
        let osc = frame.add_node(Arc::new(SinOscillator::new(SAMPLE_RATE)));
        let freq = frame.add_node(Arc::new(Constant::new(440.0)));
        let mul = frame.add_node(Arc::new(Multiply));
        let (i, o) = (frame.input_node(), frame.output_node());
        let c = frame.circuit_mut();
        c.connect(freq, 0, osc, 0).unwrap();
        c.connect(osc, 0, mul, 0).unwrap();
        c.connect(i, 0, mul, 1).unwrap();
        c.connect(mul, 0, o, 0).unwrap();
    };

    let (mut a, mut ctx_a) = CircuitFrame::new(1, 1, 1);
    build(&mut a);
    a.compile().unwrap();
    ctx_a.sync();

    let (mut b, mut ctx_b) = CircuitFrame::new(1, 1, 1);
    build(&mut b);
    b.compile().unwrap();
    b.compile().unwrap();
    ctx_b.sync();

    let input = ramp(1024);
    let mut out_a = vec![0.0; 1024];
    let mut out_b = vec![0.0; 1024];
    ctx_a.process_block(0, &input, &mut out_a, 1024);
    ctx_b.process_block(0, &input, &mut out_b, 1024);
    assert_eq!(out_a, out_b);
}

#[test]
fn recompiling_mid_stream_keeps_oscillator_phase() {
    let (mut frame, mut ctx) = CircuitFrame::new(1, 1, 1);
    let osc = frame.add_node(Arc::new(SinOscillator::new(SAMPLE_RATE)));
    let (i, o) = (frame.input_node(), frame.output_node());
    frame.circuit_mut().connect(i, 0, osc, 0).unwrap();
    frame.circuit_mut().connect(osc, 0, o, 0).unwrap();
    frame.compile().unwrap();
    ctx.sync();

    let (_, mut ref_ctx) = CircuitFrame::new(1, 1, 1);
    ref_ctx.set_graph(frame.circuit()).unwrap();

    let mut out = [0.0];
    let mut expected = [0.0];
    for n in 0..2000 {
        if n == 1000 {
            frame.compile().unwrap();
            assert!(ctx.sync());
        }
        ctx.evaluate(0, &[220.0], &mut out);
        ref_ctx.evaluate(0, &[220.0], &mut expected);
        assert_eq!(out, expected, "diverged at sample {n}");
    }
}

// ============================================================================
// 3. Feedback through delayed edges
// ============================================================================

#[test]
fn one_pole_lowpass_via_delayed_feedback() {
    // y[n] = 0.5 x[n] + 0.5 y[n-1]
    let (mut frame, mut ctx) = CircuitFrame::new(1, 1, 1);
    let dry = frame.add_node(Arc::new(Gain::new(0.5)));
    let fb = frame.add_node(Arc::new(Gain::new(0.5)));
    let sum = frame.add_node(Arc::new(Sum::new(2)));
    let (i, o) = (frame.input_node(), frame.output_node());
    let c = frame.circuit_mut();
    c.connect(i, 0, dry, 0).unwrap();
    c.connect(dry, 0, sum, 0).unwrap();
    c.connect_delayed(sum, 0, fb, 0).unwrap();
    c.connect(fb, 0, sum, 1).unwrap();
    c.connect(sum, 0, o, 0).unwrap();
    let program = frame.compile().unwrap();
    assert_eq!(program.delay_count(), 1);
    ctx.sync();

    let mut y_prev = 0.0f32;
    let mut out = [0.0];
    for _ in 0..64 {
        ctx.evaluate(0, &[1.0], &mut out);
        let expected = 0.5 + 0.5 * y_prev;
        assert!((out[0] - expected).abs() < 1e-6);
        y_prev = expected;
    }
    assert!((out[0] - 1.0).abs() < 1e-6);
}

#[test]
fn same_loop_without_delay_is_rejected_and_previous_program_stays() {
    let (mut frame, mut ctx) = CircuitFrame::new(1, 1, 1);
    let good = gain_patch(&frame, 3.0);
    frame.set_graph(good).unwrap();
    ctx.sync();

    let fb = frame.add_node(Arc::new(Gain::new(0.5)));
    let sum = frame.add_node(Arc::new(Sum::new(2)));
    let (i, o) = (frame.input_node(), frame.output_node());
    let c = frame.circuit_mut();
    c.connect(i, 0, sum, 0).unwrap();
    c.connect(sum, 0, fb, 0).unwrap();
    c.connect(fb, 0, sum, 1).unwrap();
    c.connect(sum, 0, o, 0).unwrap();

    assert!(matches!(frame.compile(), Err(GraphError::CycleDetected(_))));
    assert!(!ctx.sync());

    let mut out = [0.0];
    ctx.evaluate(0, &[2.0], &mut out);
    assert_eq!(out, [6.0]);
    assert_eq!(frame.current_program().generation(), 1);
}

#[test]
fn delayed_edge_kind_is_visible_to_editors() {
    let (mut frame, _ctx) = CircuitFrame::new(1, 1, 1);
    let s = frame.add_node(Arc::new(Sum::new(2)));
    frame.circuit_mut().connect_delayed(s, 0, s, 1).unwrap();
    assert_eq!(frame.circuit().edges()[0].kind, EdgeKind::Delayed);
}

// ============================================================================
// 4. Polyphonic instances are independent
// ============================================================================

#[test]
fn instances_keep_private_state() {
    let (mut frame, mut ctx) = CircuitFrame::new(1, 1, 3);
    let env = frame.add_node(Arc::new(Envelope::new(SAMPLE_RATE, 0.0, 0.0)));
    let (i, o) = (frame.input_node(), frame.output_node());
    frame.circuit_mut().connect(i, 0, env, 0).unwrap();
    frame.circuit_mut().connect(env, 0, o, 0).unwrap();
    frame.compile().unwrap();
    ctx.sync();

    let mut out = [0.0];
    for (instance, level) in [(0, 0.1), (1, 0.2), (2, 0.3)] {
        ctx.evaluate(instance, &[level], &mut out);
    }
    for (instance, level) in [(0, 0.1f32), (1, 0.2), (2, 0.3)] {
        assert_eq!(ctx.node_state(instance, env), Some(&[level][..]));
    }

    ctx.reset_instance(1);
    assert_eq!(ctx.node_state(1, env), Some(&[0.0][..]));
    assert_eq!(ctx.node_state(2, env), Some(&[0.3][..]));
}

#[test]
fn introspection_reports_topology_and_layout() {
    let (mut frame, _ctx) = CircuitFrame::new(1, 1, 1);
    let a = frame.add_node(Arc::new(Gain::new(1.0)));
    let osc = frame.add_node(Arc::new(SinOscillator::new(SAMPLE_RATE)));
    let (i, o) = (frame.input_node(), frame.output_node());
    let c = frame.circuit_mut();
    c.connect(i, 0, a, 0).unwrap();
    c.connect(a, 0, osc, 0).unwrap();
    c.connect(osc, 0, o, 0).unwrap();

    let program = frame.compile().unwrap();
    assert_eq!(program.evaluation_order(), &[a, osc]);
    assert_eq!(program.state_len(), 1);
    assert_eq!(program.state_range(osc), Some(0..1));
    assert_eq!(program.state_range(a), Some(0..0));
    assert!(program.node(NodeId::new(99)).is_none());
    assert_eq!(program.node(osc).map(|n| n.name()), Some("sine oscillator"));
}

// ============================================================================
// 5. Hot-swap atomicity under concurrency
// ============================================================================

#[test]
fn concurrent_swaps_never_mix_programs() {
    let (frame, mut ctx) = CircuitFrame::new(1, 2, 1);
    let (i, o) = (frame.input_node(), frame.output_node());

    // Two patches that write a distinct constant pair to both outputs. A mixed
    // sample would show one program's left with the other's right.
    let patch = |factor: f32| {
        let mut c = frame.circuit().clone();
        let a = c.add_node(Arc::new(Gain::new(factor)));
        let b = c.add_node(Arc::new(Gain::new(factor)));
        c.connect(i, 0, a, 0).unwrap();
        c.connect(i, 0, b, 0).unwrap();
        c.connect(a, 0, o, 0).unwrap();
        c.connect(b, 0, o, 1).unwrap();
        c
    };
    let one = patch(1.0);
    let two = patch(2.0);
    frame.compiler().set_graph(&one).unwrap();
    ctx.sync();

    let compiler = frame.compiler().clone();
    let done = Arc::new(AtomicBool::new(false));
    let editor = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for n in 0..500 {
                let circuit = if n % 2 == 0 { &two } else { &one };
                compiler.set_graph(circuit).unwrap();
                compiler.collect_garbage();
                thread::yield_now();
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut out = [0.0; 2];
    while !done.load(Ordering::Acquire) {
        ctx.sync();
        ctx.evaluate(0, &[1.0], &mut out);
        assert!(out == [1.0, 1.0] || out == [2.0, 2.0], "mixed output {out:?}");
    }
    editor.join().unwrap();
    ctx.sync();
    ctx.evaluate(0, &[1.0], &mut out);
    assert_eq!(out, [1.0, 1.0]);
}
