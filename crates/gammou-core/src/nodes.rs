//! Built-in nodes.
//!
//! Small, stateless or lightly stateful building blocks used by the demo
//! patches, the tests and the benchmarks. Real patches usually mix these with
//! externally supplied nodes; the executor does not distinguish the two.

use core::f32::consts::TAU;

use crate::node::CompiledNode;

/// Copies `n` inputs to `n` outputs.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    channels: usize,
}

impl Identity {
    /// Creates an identity node with `channels` ports in each direction.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl CompiledNode for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn input_count(&self) -> usize {
        self.channels
    }

    fn output_count(&self) -> usize {
        self.channels
    }

    fn evaluate(&self, _state: &mut [f32], inputs: &[f32], outputs: &mut [f32]) {
        outputs.copy_from_slice(inputs);
    }
}

/// Outputs a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    value: f32,
}

impl Constant {
    /// Creates a constant source.
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl CompiledNode for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn input_count(&self) -> usize {
        0
    }

    fn output_count(&self) -> usize {
        1
    }

    fn evaluate(&self, _state: &mut [f32], _inputs: &[f32], outputs: &mut [f32]) {
        outputs[0] = self.value;
    }
}

/// Multiplies its input by a fixed factor.
#[derive(Debug, Clone, Copy)]
pub struct Gain {
    factor: f32,
}

impl Gain {
    /// Creates a gain stage.
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    /// The fixed factor.
    pub fn factor(&self) -> f32 {
        self.factor
    }
}

impl CompiledNode for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn input_count(&self) -> usize {
        1
    }

    fn output_count(&self) -> usize {
        1
    }

    fn evaluate(&self, _state: &mut [f32], inputs: &[f32], outputs: &mut [f32]) {
        outputs[0] = inputs[0] * self.factor;
    }
}

/// Sums `n` inputs into one output.
#[derive(Debug, Clone, Copy)]
pub struct Sum {
    inputs: usize,
}

impl Sum {
    /// Creates a summing node with `inputs` ports.
    pub fn new(inputs: usize) -> Self {
        Self { inputs }
    }
}

impl CompiledNode for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn input_count(&self) -> usize {
        self.inputs
    }

    fn output_count(&self) -> usize {
        1
    }

    fn evaluate(&self, _state: &mut [f32], inputs: &[f32], outputs: &mut [f32]) {
        outputs[0] = inputs.iter().sum();
    }
}

/// Product of two inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiply;

impl CompiledNode for Multiply {
    fn name(&self) -> &str {
        "multiply"
    }

    fn input_count(&self) -> usize {
        2
    }

    fn output_count(&self) -> usize {
        1
    }

    fn evaluate(&self, _state: &mut [f32], inputs: &[f32], outputs: &mut [f32]) {
        outputs[0] = inputs[0] * inputs[1];
    }
}

/// Sine oscillator.
///
/// Inputs: frequency in Hz, phase offset in cycles. State: running phase in
/// `[0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct SinOscillator {
    inv_sample_rate: f32,
}

impl SinOscillator {
    /// Frequency input.
    pub const FREQUENCY: usize = 0;
    /// Phase offset input.
    pub const PHASE: usize = 1;

    /// Creates an oscillator running at `sample_rate`.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            inv_sample_rate: 1.0 / sample_rate,
        }
    }
}

impl CompiledNode for SinOscillator {
    fn name(&self) -> &str {
        "sine oscillator"
    }

    fn input_count(&self) -> usize {
        2
    }

    fn output_count(&self) -> usize {
        1
    }

    fn state_size(&self) -> usize {
        1
    }

    fn evaluate(&self, state: &mut [f32], inputs: &[f32], outputs: &mut [f32]) {
        let phase = state[0];
        outputs[0] = libm::sinf(TAU * (phase + inputs[Self::PHASE]));
        let next = phase + inputs[Self::FREQUENCY] * self.inv_sample_rate;
        state[0] = next - libm::floorf(next);
    }
}

/// One-pole attack/release envelope follower of a gate signal.
///
/// The output moves towards the gate value with the attack coefficient while
/// rising and the release coefficient while falling. State: current level.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    attack: f32,
    release: f32,
}

impl Envelope {
    /// Creates an envelope with attack and release time constants in seconds.
    pub fn new(sample_rate: f32, attack_secs: f32, release_secs: f32) -> Self {
        Self {
            attack: one_pole(sample_rate, attack_secs),
            release: one_pole(sample_rate, release_secs),
        }
    }
}

/// Smoothing coefficient reaching ~63% of a step after `secs`.
fn one_pole(sample_rate: f32, secs: f32) -> f32 {
    let samples = secs * sample_rate;
    if samples <= 1.0 {
        1.0
    } else {
        1.0 - libm::expf(-1.0 / samples)
    }
}

impl CompiledNode for Envelope {
    fn name(&self) -> &str {
        "envelope"
    }

    fn input_count(&self) -> usize {
        1
    }

    fn output_count(&self) -> usize {
        1
    }

    fn state_size(&self) -> usize {
        1
    }

    fn evaluate(&self, state: &mut [f32], inputs: &[f32], outputs: &mut [f32]) {
        let level = state[0];
        let target = inputs[0];
        let coeff = if target > level {
            self.attack
        } else {
            self.release
        };
        let next = level + (target - level) * coeff;
        state[0] = next;
        outputs[0] = next;
    }
}
