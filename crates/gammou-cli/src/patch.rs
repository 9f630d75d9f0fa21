//! Demo patch used by `gammou render`.

use std::sync::Arc;

use anyhow::{Context, Result};
use gammou_core::NodeRegistry;
use gammou_core::nodes::Gain;
use gammou_synth::{ATTACK_VELOCITY, GATE, PITCH, POLYPHONIC_TO_MASTER_CHANNELS, SynthesizerEditor};

/// Wires the demo patch into both circuits and compiles them.
///
/// Per voice: a sine at the note pitch times a gate envelope times the attack
/// velocity, sent to both master channels. Master: each output channel takes
/// a polyphonic channel through a gain of `level`.
pub fn build_demo(editor: &mut SynthesizerEditor, level: f32) -> Result<()> {
    let registry = NodeRegistry::new();
    let sr = editor.sample_rate();
    let create = |id: &str| {
        registry
            .create(id, sr)
            .with_context(|| format!("node '{id}' is not registered"))
    };
    let (osc_node, env_node) = (create("sine")?, create("envelope")?);
    let (amp_node, vel_node) = (create("multiply")?, create("multiply")?);

    let (midi, to_master) = (editor.midi_input_node(), editor.to_master_node());
    let poly = editor.polyphonic_circuit_mut();
    let osc = poly.add_node(osc_node);
    let env = poly.add_node(env_node);
    let amp = poly.add_node(amp_node);
    let vel = poly.add_node(vel_node);
    poly.connect(midi, PITCH, osc, 0)?;
    poly.connect(midi, GATE, env, 0)?;
    poly.connect(osc, 0, amp, 0)?;
    poly.connect(env, 0, amp, 1)?;
    poly.connect(amp, 0, vel, 0)?;
    poly.connect(midi, ATTACK_VELOCITY, vel, 1)?;
    for ch in 0..POLYPHONIC_TO_MASTER_CHANNELS {
        poly.connect(vel, 0, to_master, ch)?;
    }
    editor
        .compile_polyphonic_circuit()
        .context("compiling polyphonic circuit")?;

    let outputs = editor.master_frame().output_count();
    let (from_poly, output) = (editor.from_polyphonic_node(), editor.output_node());
    let master = editor.master_circuit_mut();
    for ch in 0..outputs {
        let gain = master.add_node(Arc::new(Gain::new(level)));
        master.connect(from_poly, ch % POLYPHONIC_TO_MASTER_CHANNELS, gain, 0)?;
        master.connect(gain, 0, output, ch)?;
    }
    editor
        .compile_master_circuit()
        .context("compiling master circuit")?;

    tracing::debug!(outputs, level, "demo patch compiled");
    Ok(())
}
