//! Criterion benchmarks for gammou-synth
//!
//! Run with: cargo bench -p gammou-synth
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gammou_config::SynthConfig;
use gammou_core::nodes::{Envelope, Gain, Multiply, SinOscillator};
use gammou_synth::{GATE, PITCH, Synthesizer, VoiceManager};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 256;

fn patched_synth(voice_count: usize) -> Synthesizer {
    let config = SynthConfig {
        voice_count,
        ..SynthConfig::default()
    };
    let (synth, mut editor) = Synthesizer::new(&config);

    let (midi, to_master) = (editor.midi_input_node(), editor.to_master_node());
    let poly = editor.polyphonic_circuit_mut();
    let osc = poly.add_node(Arc::new(SinOscillator::new(SAMPLE_RATE)));
    let env = poly.add_node(Arc::new(Envelope::new(SAMPLE_RATE, 0.005, 0.3)));
    let amp = poly.add_node(Arc::new(Multiply));
    poly.connect(midi, PITCH, osc, 0).unwrap();
    poly.connect(midi, GATE, env, 0).unwrap();
    poly.connect(osc, 0, amp, 0).unwrap();
    poly.connect(env, 0, amp, 1).unwrap();
    poly.connect(amp, 0, to_master, 0).unwrap();
    poly.connect(amp, 0, to_master, 1).unwrap();
    editor.compile_polyphonic_circuit().unwrap();

    let (from_poly, output) = (editor.from_polyphonic_node(), editor.output_node());
    let master = editor.master_circuit_mut();
    for ch in 0..2 {
        let g = master.add_node(Arc::new(Gain::new(0.2)));
        master.connect(from_poly, ch, g, 0).unwrap();
        master.connect(g, 0, output, ch).unwrap();
    }
    editor.compile_master_circuit().unwrap();
    synth
}

// ============================================================================
// Voice manager
// ============================================================================

fn bench_voice_manager(c: &mut Criterion) {
    let mut group = c.benchmark_group("VoiceManager");

    group.bench_function("note_on_off_16", |b| {
        let mut vm = VoiceManager::new(16);
        b.iter(|| {
            for note in 0..16u8 {
                black_box(vm.note_on(note));
            }
            for note in 0..16u8 {
                black_box(vm.note_off(note));
            }
            vm.foreach_active_voice(|_| false);
        });
    });

    group.finish();
}

// ============================================================================
// Synthesizer block rendering
// ============================================================================

fn bench_synthesizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("Synthesizer");
    let mut output = vec![0.0f32; BLOCK_SIZE * 2];

    for voices in [1usize, 4, 16] {
        let mut synth = patched_synth(16);
        for n in 0..voices {
            synth.note_on(48 + n as u8, 1.0);
        }
        group.bench_with_input(
            BenchmarkId::new("block256", voices),
            &voices,
            |b, _| {
                b.iter(|| {
                    synth.process_block(&[], &mut output, BLOCK_SIZE);
                    black_box(&output);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_voice_manager, bench_synthesizer);
criterion_main!(benches);
