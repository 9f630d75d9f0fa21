//! Gammou Synth - polyphonic orchestration over compiled circuits
//!
//! This crate drives two [`gammou_core`] circuits as a polyphonic
//! synthesizer: a per-voice circuit instantiated once per voice, and a master
//! circuit fed with the sum of all voices.
//!
//! # Core Components
//!
//! ## Voices
//!
//! - [`VoiceManager`] - Fixed voice pool with O(1) allocation and retirement
//! - [`VoiceState`] - Free, on, or decaying
//!
//! ## Parameters
//!
//! - [`Parameter`] - Shared atomic value with an exponential shape
//! - [`ParameterNode`] - Circuit node reading a parameter
//! - [`ControlMap`] - MIDI control bindings and MIDI learn
//!
//! ## Synthesizer
//!
//! - [`Synthesizer`] - Audio side: events in, samples out
//! - [`SynthesizerEditor`] - Editing side: circuits, compilation, parameters
//! - [`SynthEvent`] - Note and control events
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gammou_config::SynthConfig;
//! use gammou_core::nodes::{Envelope, Multiply, SinOscillator};
//! use gammou_synth::{GATE, PITCH, Synthesizer};
//!
//! let config = SynthConfig::default();
//! let (mut synth, mut editor) = Synthesizer::new(&config);
//! let sr = editor.sample_rate();
//!
//! // per voice: sine at the note pitch, shaped by the gate envelope
//! let (midi, to_master) = (editor.midi_input_node(), editor.to_master_node());
//! let poly = editor.polyphonic_circuit_mut();
//! let osc = poly.add_node(Arc::new(SinOscillator::new(sr)));
//! let env = poly.add_node(Arc::new(Envelope::new(sr, 0.01, 0.1)));
//! let amp = poly.add_node(Arc::new(Multiply));
//! poly.connect(midi, PITCH, osc, 0).unwrap();
//! poly.connect(midi, GATE, env, 0).unwrap();
//! poly.connect(osc, 0, amp, 0).unwrap();
//! poly.connect(env, 0, amp, 1).unwrap();
//! poly.connect(amp, 0, to_master, 0).unwrap();
//! poly.connect(amp, 0, to_master, 1).unwrap();
//! editor.compile_polyphonic_circuit().unwrap();
//!
//! // master: pass the voice sum through
//! let (from_poly, output) = (editor.from_polyphonic_node(), editor.output_node());
//! let master = editor.master_circuit_mut();
//! master.connect(from_poly, 0, output, 0).unwrap();
//! master.connect(from_poly, 1, output, 1).unwrap();
//! editor.compile_master_circuit().unwrap();
//!
//! synth.note_on(69, 1.0);
//! let mut frame = [0.0; 2];
//! let mut peak = 0.0f32;
//! for _ in 0..4800 {
//!     synth.process(&[], &mut frame);
//!     peak = peak.max(frame[0].abs());
//! }
//! assert!(peak > 0.5);
//! ```

pub mod control_map;
pub mod event;
pub mod parameter;
pub mod synthesizer;
pub mod voice_manager;

pub use control_map::{BINDINGS_PER_CONTROL, CONTROL_COUNT, ControlMap};
pub use event::SynthEvent;
pub use parameter::{Parameter, ParameterNode};
pub use synthesizer::{
    ATTACK_VELOCITY, GATE, MIDI_INPUT_COUNT, PITCH, POLYPHONIC_TO_MASTER_CHANNELS,
    RELEASE_VELOCITY, Synthesizer, SynthesizerEditor, midi_to_freq,
};
pub use voice_manager::{VoiceId, VoiceManager, VoiceState};
