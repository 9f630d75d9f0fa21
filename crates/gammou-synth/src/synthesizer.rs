//! Polyphonic synthesizer orchestration.
//!
//! A synthesizer runs two circuits:
//!
//! - the **polyphonic** circuit, evaluated once per active voice with that
//!   voice's private state. Its input boundary carries the voice's MIDI
//!   inputs ([`GATE`], [`PITCH`], [`ATTACK_VELOCITY`], [`RELEASE_VELOCITY`]);
//!   its output boundary has [`POLYPHONIC_TO_MASTER_CHANNELS`] channels that
//!   are summed over all voices.
//! - the **master** circuit, evaluated once per sample. Its input boundary
//!   carries the summed polyphonic channels followed by the external input
//!   channels; its output boundary is the synthesizer output.
//!
//! [`Synthesizer::new`] returns the audio-side [`Synthesizer`] and the
//! editing-side [`SynthesizerEditor`]. Compiling a circuit on the editor
//! never blocks the audio side; the new program is adopted at the start of
//! the next [`Synthesizer::process`] call.

use std::sync::Arc;

use gammou_config::{OverflowPolicy, SynthConfig};
use gammou_core::{Circuit, CircuitFrame, GraphError, GraphExecutionContext, NodeId, Program};

use crate::control_map::ControlMap;
use crate::event::SynthEvent;
use crate::parameter::Parameter;
use crate::voice_manager::{VoiceId, VoiceManager, VoiceState};

/// Polyphonic input: 1 while the key is held, 0 after release.
pub const GATE: usize = 0;
/// Polyphonic input: note frequency in Hz (A4 = 440).
pub const PITCH: usize = 1;
/// Polyphonic input: note-on velocity.
pub const ATTACK_VELOCITY: usize = 2;
/// Polyphonic input: note-off velocity, 0 while the key is held.
pub const RELEASE_VELOCITY: usize = 3;
/// Number of polyphonic circuit inputs.
pub const MIDI_INPUT_COUNT: usize = 4;

/// Channels from the polyphonic circuit into the master circuit.
pub const POLYPHONIC_TO_MASTER_CHANNELS: usize = 2;

/// Convert MIDI note number to frequency in Hz.
///
/// Uses standard tuning: A4 (MIDI note 69) = 440 Hz.
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

/// Audio side of a synthesizer.
///
/// Owned by the audio thread. Every method is real-time safe: no locks are
/// waited on and nothing is allocated or freed.
pub struct Synthesizer {
    master: GraphExecutionContext,
    polyphonic: GraphExecutionContext,
    voices: VoiceManager,
    /// `MIDI_INPUT_COUNT` values per voice.
    midi_inputs: Vec<f32>,
    /// Consecutive silent samples per voice.
    silence: Vec<u32>,
    /// Master inputs: polyphonic sum, then external input.
    master_inputs: Vec<f32>,
    controls: Arc<ControlMap>,
    input_count: usize,
    output_count: usize,
    disappearance_threshold: f32,
    disappearance_samples: u32,
    overflow_policy: OverflowPolicy,
}

impl Synthesizer {
    /// Creates a synthesizer and its editor from `config`.
    ///
    /// Both circuits start empty, so the synthesizer is silent until the
    /// editor compiles something.
    pub fn new(config: &SynthConfig) -> (Self, SynthesizerEditor) {
        let voice_count = config.voice_count;
        let (master_frame, master) = CircuitFrame::new(
            POLYPHONIC_TO_MASTER_CHANNELS + config.input_count,
            config.output_count,
            1,
        );
        let (polyphonic_frame, polyphonic) =
            CircuitFrame::new(MIDI_INPUT_COUNT, POLYPHONIC_TO_MASTER_CHANNELS, voice_count);
        let controls = Arc::new(ControlMap::new());

        tracing::debug!(
            voice_count,
            input_count = config.input_count,
            output_count = config.output_count,
            policy = ?config.overflow_policy,
            "synthesizer created"
        );

        let synth = Self {
            master,
            polyphonic,
            voices: VoiceManager::new(voice_count),
            midi_inputs: vec![0.0; voice_count * MIDI_INPUT_COUNT],
            silence: vec![0; voice_count],
            master_inputs: vec![0.0; POLYPHONIC_TO_MASTER_CHANNELS + config.input_count],
            controls: Arc::clone(&controls),
            input_count: config.input_count,
            output_count: config.output_count,
            disappearance_threshold: config.voice_disappearance_threshold,
            disappearance_samples: config.voice_disappearance_samples,
            overflow_policy: config.overflow_policy,
        };
        let editor = SynthesizerEditor {
            master: master_frame,
            polyphonic: polyphonic_frame,
            controls,
            parameters: Vec::new(),
            sample_rate: config.sample_rate_hz(),
        };
        (synth, editor)
    }

    /// Adopts programs compiled by the editor since the last call.
    ///
    /// Called by [`process`](Self::process) and
    /// [`process_block`](Self::process_block); hosts that drive the
    /// synthesizer only through those need not call it.
    pub fn sync(&mut self) {
        self.master.sync();
        self.polyphonic.sync();
    }

    /// Renders one frame.
    ///
    /// `input` holds up to `input_count` external samples (missing channels
    /// read as silence); `output` receives up to `output_count` samples.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        self.sync();
        self.render_frame(input, output);
    }

    /// Renders `frames` frames over interleaved buffers.
    ///
    /// A short `input` reads as silence; a short `output` ends the block early.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        self.sync();
        let (ic, oc) = (self.input_count, self.output_count);
        for frame in 0..frames {
            let inp = input.get(frame * ic..(frame + 1) * ic).unwrap_or(&[]);
            let Some(out) = output.get_mut(frame * oc..(frame + 1) * oc) else {
                break;
            };
            self.render_frame(inp, out);
        }
    }

    fn render_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let threshold = self.disappearance_threshold;
        let limit = self.disappearance_samples;
        let Self {
            polyphonic,
            voices,
            midi_inputs,
            silence,
            master_inputs,
            ..
        } = self;

        let mut sum = [0.0f32; POLYPHONIC_TO_MASTER_CHANNELS];
        let mut voice_out = [0.0f32; POLYPHONIC_TO_MASTER_CHANNELS];
        voices.foreach_active_voice(|voice| {
            let offset = voice * MIDI_INPUT_COUNT;
            polyphonic.evaluate(
                voice,
                &midi_inputs[offset..offset + MIDI_INPUT_COUNT],
                &mut voice_out,
            );
            for (acc, &x) in sum.iter_mut().zip(&voice_out) {
                *acc += x;
            }

            // peak across channels; a signed sum cancels anti-phase output
            let level = voice_out.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
            if level < threshold {
                silence[voice] = silence[voice].saturating_add(1);
            } else {
                silence[voice] = 0;
            }
            silence[voice] <= limit
        });

        let (poly, external) = master_inputs.split_at_mut(POLYPHONIC_TO_MASTER_CHANNELS);
        poly.copy_from_slice(&sum);
        let n = external.len().min(input.len());
        external[..n].copy_from_slice(&input[..n]);
        external[n..].fill(0.0);

        self.master.evaluate(0, &self.master_inputs, output);
    }

    /// Starts a note.
    ///
    /// Returns the voice playing it, or `None` if the pool is exhausted and
    /// the overflow policy could not free a voice; the event is then dropped.
    pub fn note_on(&mut self, note: u8, velocity: f32) -> Option<VoiceId> {
        let voice = match self.voices.note_on(note) {
            Some(voice) => voice,
            None => self.steal_voice(note)?,
        };

        self.polyphonic.reset_instance(voice);
        self.silence[voice] = 0;
        let inputs = self.voice_inputs_mut(voice);
        inputs[GATE] = 1.0;
        inputs[PITCH] = midi_to_freq(note);
        inputs[ATTACK_VELOCITY] = velocity;
        inputs[RELEASE_VELOCITY] = 0.0;

        tracing::trace!(note, voice, "note on");
        Some(voice)
    }

    fn steal_voice(&mut self, note: u8) -> Option<VoiceId> {
        let stolen = match self.overflow_policy {
            OverflowPolicy::Drop => None,
            OverflowPolicy::StealDecaying => self
                .voices
                .retire_decaying()
                .and_then(|_| self.voices.note_on(note)),
        };
        if stolen.is_none() {
            tracing::trace!(note, "no voice available, note dropped");
        }
        stolen
    }

    /// Releases a note. Returns the voice that was released, or `None` if no
    /// voice was holding the note.
    pub fn note_off(&mut self, note: u8, velocity: f32) -> Option<VoiceId> {
        let voice = self.voices.note_off(note)?;
        let inputs = self.voice_inputs_mut(voice);
        inputs[GATE] = 0.0;
        inputs[RELEASE_VELOCITY] = velocity;
        tracing::trace!(note, voice, "note off");
        Some(voice)
    }

    /// Routes a control change to the parameters bound to `control`,
    /// completing a pending MIDI learn first. Returns the number of
    /// parameters updated.
    pub fn control_change(&mut self, control: u8, value: f32) -> usize {
        self.controls.apply(control, value)
    }

    /// Dispatches one event.
    pub fn handle_event(&mut self, event: SynthEvent) {
        match event {
            SynthEvent::NoteOn { note, velocity } => {
                self.note_on(note, velocity);
            }
            SynthEvent::NoteOff { note, velocity } => {
                self.note_off(note, velocity);
            }
            SynthEvent::ControlChange { control, value } => {
                self.control_change(control, value);
            }
        }
    }

    /// Frees every voice.
    pub fn all_notes_off(&mut self) {
        self.voices.reset();
    }

    /// On and decaying voices, on voices first.
    pub fn active_voices(&self) -> &[VoiceId] {
        self.voices.active_voices()
    }

    /// Lifecycle state of one voice.
    pub fn voice_state(&self, voice: VoiceId) -> VoiceState {
        self.voices.state(voice)
    }

    /// The voice manager.
    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    /// Current MIDI inputs of one voice, indexed by [`GATE`], [`PITCH`],
    /// [`ATTACK_VELOCITY`] and [`RELEASE_VELOCITY`].
    pub fn voice_inputs(&self, voice: VoiceId) -> Option<&[f32]> {
        let offset = voice.checked_mul(MIDI_INPUT_COUNT)?;
        self.midi_inputs.get(offset..offset + MIDI_INPUT_COUNT)
    }

    fn voice_inputs_mut(&mut self, voice: VoiceId) -> &mut [f32] {
        let offset = voice * MIDI_INPUT_COUNT;
        &mut self.midi_inputs[offset..offset + MIDI_INPUT_COUNT]
    }

    /// Context running the master circuit.
    pub fn master_context(&self) -> &GraphExecutionContext {
        &self.master
    }

    /// Context running the polyphonic circuit, one instance per voice.
    pub fn polyphonic_context(&self) -> &GraphExecutionContext {
        &self.polyphonic
    }

    /// Number of external input channels.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Number of output channels.
    pub fn output_count(&self) -> usize {
        self.output_count
    }
}

/// Editing side of a synthesizer.
///
/// Owns both editable circuits and publishes compiled programs to the
/// [`Synthesizer`]. Compilation happens on the calling thread.
pub struct SynthesizerEditor {
    master: CircuitFrame,
    polyphonic: CircuitFrame,
    controls: Arc<ControlMap>,
    parameters: Vec<Parameter>,
    sample_rate: f32,
}

impl SynthesizerEditor {
    /// Sample rate the synthesizer runs at, for node factories.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Master circuit frame.
    pub fn master_frame(&self) -> &CircuitFrame {
        &self.master
    }

    /// Polyphonic circuit frame.
    pub fn polyphonic_frame(&self) -> &CircuitFrame {
        &self.polyphonic
    }

    /// The master circuit.
    pub fn master_circuit(&self) -> &Circuit {
        self.master.circuit()
    }

    /// The master circuit, for editing.
    pub fn master_circuit_mut(&mut self) -> &mut Circuit {
        self.master.circuit_mut()
    }

    /// The polyphonic circuit.
    pub fn polyphonic_circuit(&self) -> &Circuit {
        self.polyphonic.circuit()
    }

    /// The polyphonic circuit, for editing.
    pub fn polyphonic_circuit_mut(&mut self) -> &mut Circuit {
        self.polyphonic.circuit_mut()
    }

    /// Master input boundary: outputs `0..2` carry the summed polyphonic
    /// channels, the following outputs the external input.
    pub fn from_polyphonic_node(&self) -> NodeId {
        self.master.input_node()
    }

    /// Master output boundary.
    pub fn output_node(&self) -> NodeId {
        self.master.output_node()
    }

    /// Polyphonic input boundary, one output per MIDI input.
    pub fn midi_input_node(&self) -> NodeId {
        self.polyphonic.input_node()
    }

    /// Polyphonic output boundary, summed into the master circuit.
    pub fn to_master_node(&self) -> NodeId {
        self.polyphonic.output_node()
    }

    /// Compiles the master circuit and queues it for the audio thread.
    ///
    /// On error the running program stays in place.
    pub fn compile_master_circuit(&mut self) -> Result<Arc<Program>, GraphError> {
        self.master.collect_garbage();
        self.master.compile()
    }

    /// Compiles the polyphonic circuit and queues it for the audio thread.
    ///
    /// On error the running program stays in place.
    pub fn compile_polyphonic_circuit(&mut self) -> Result<Arc<Program>, GraphError> {
        self.polyphonic.collect_garbage();
        self.polyphonic.compile()
    }

    /// Drops programs the audio thread no longer runs, and control bindings
    /// it no longer reads.
    pub fn collect_garbage(&self) {
        self.master.collect_garbage();
        self.polyphonic.collect_garbage();
        self.controls.collect_garbage();
    }

    /// Creates a parameter owned by this synthesizer.
    ///
    /// Wrap it in a [`ParameterNode`](crate::ParameterNode) to use it in
    /// either circuit.
    pub fn allocate_parameter(&mut self, normalized: f32) -> Parameter {
        let parameter = Parameter::new(normalized);
        self.parameters.push(parameter.clone());
        parameter
    }

    /// Parameters created through [`allocate_parameter`](Self::allocate_parameter).
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Binds `parameter` to the next control change the synthesizer receives.
    pub fn midi_learn(&self, parameter: &Parameter) {
        self.controls.learn(parameter);
    }

    /// Binds `parameter` to `control`. Returns `false` if the control cannot
    /// take another binding.
    pub fn midi_assign_control(&self, control: u8, parameter: &Parameter) -> bool {
        self.controls.assign(control, parameter)
    }

    /// Removes the control binding of `parameter`.
    pub fn midi_unassign_control(&self, parameter: &Parameter) -> bool {
        self.controls.unassign(parameter)
    }

    /// Control driving `parameter`, if any.
    pub fn midi_assigned_control(&self, parameter: &Parameter) -> Option<u8> {
        self.controls.control_for(parameter)
    }

    /// The shared control table.
    pub fn control_map(&self) -> &ControlMap {
        &self.controls
    }

    /// Empties both circuits and publishes them, silencing the synthesizer.
    ///
    /// Parameters and their control bindings are released.
    pub fn reset_circuits(&mut self) -> Result<(), GraphError> {
        self.master.reset();
        self.polyphonic.reset();
        self.compile_master_circuit()?;
        self.compile_polyphonic_circuit()?;
        self.controls.clear();
        self.parameters.clear();
        tracing::debug!("circuits reset");
        Ok(())
    }
}
