//! Shared, atomically updated patch parameters.
//!
//! A [`Parameter`] is a handle to a normalized value in `[0, 1]` stored as
//! `f32` bits in an `AtomicU32`. The editor (or a MIDI control change) writes
//! it, and a [`ParameterNode`] inside a circuit reads it every sample. The
//! normalized value is mapped through an exponential shape:
//!
//! ```text
//! value = scale * n                              if base == 1
//! value = scale * (base^n - 1) / (base - 1)      otherwise
//! ```
//!
//! so `value(0) == 0` and `value(1) == scale` for every base, and a base
//! above 1 spends more of the travel on small values (useful for frequencies
//! and times).

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use gammou_core::CompiledNode;

#[derive(Debug)]
struct ParameterCell {
    normalized: AtomicU32,
    shape_base: AtomicU32,
    shape_scale: AtomicU32,
}

/// Shared handle to one parameter. Clones refer to the same value.
#[derive(Debug, Clone)]
pub struct Parameter {
    cell: Arc<ParameterCell>,
}

impl Parameter {
    /// Creates a linear parameter (`base = 1`, `scale = 1`).
    pub fn new(normalized: f32) -> Self {
        Self::with_shape(normalized, 1.0, 1.0)
    }

    /// Creates a parameter with an explicit shape.
    pub fn with_shape(normalized: f32, shape_base: f32, shape_scale: f32) -> Self {
        Self {
            cell: Arc::new(ParameterCell {
                normalized: AtomicU32::new(clamp_normalized(normalized).to_bits()),
                shape_base: AtomicU32::new(sanitize_base(shape_base).to_bits()),
                shape_scale: AtomicU32::new(shape_scale.to_bits()),
            }),
        }
    }

    /// Current normalized value in `[0, 1]`.
    #[inline]
    pub fn normalized(&self) -> f32 {
        f32::from_bits(self.cell.normalized.load(Ordering::Relaxed))
    }

    /// Sets the normalized value, clamped to `[0, 1]`. NaN maps to 0.
    #[inline]
    pub fn set_normalized(&self, normalized: f32) {
        self.cell
            .normalized
            .store(clamp_normalized(normalized).to_bits(), Ordering::Relaxed);
    }

    /// Exponential base of the shape.
    pub fn shape_base(&self) -> f32 {
        f32::from_bits(self.cell.shape_base.load(Ordering::Relaxed))
    }

    /// Value reached at normalized 1.
    pub fn shape_scale(&self) -> f32 {
        f32::from_bits(self.cell.shape_scale.load(Ordering::Relaxed))
    }

    /// Changes the shape. Non-positive or non-finite bases fall back to 1.
    pub fn set_shape(&self, shape_base: f32, shape_scale: f32) {
        self.cell
            .shape_base
            .store(sanitize_base(shape_base).to_bits(), Ordering::Relaxed);
        self.cell
            .shape_scale
            .store(shape_scale.to_bits(), Ordering::Relaxed);
    }

    /// Shaped value.
    #[inline]
    pub fn value(&self) -> f32 {
        shape(self.normalized(), self.shape_base(), self.shape_scale())
    }

    /// Whether two handles refer to the same parameter.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

fn clamp_normalized(n: f32) -> f32 {
    if n.is_nan() { 0.0 } else { n.clamp(0.0, 1.0) }
}

fn sanitize_base(base: f32) -> f32 {
    if base.is_finite() && base > 0.0 {
        base
    } else {
        1.0
    }
}

fn shape(n: f32, base: f32, scale: f32) -> f32 {
    if (base - 1.0).abs() < 1e-6 {
        scale * n
    } else {
        scale * (libm::powf(base, n) - 1.0) / (base - 1.0)
    }
}

/// Circuit node emitting a parameter's shaped value. No inputs, one output.
#[derive(Debug, Clone)]
pub struct ParameterNode {
    parameter: Parameter,
}

impl ParameterNode {
    /// Creates a node reading `parameter`.
    pub fn new(parameter: Parameter) -> Self {
        Self { parameter }
    }

    /// The parameter this node reads.
    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }
}

impl CompiledNode for ParameterNode {
    fn name(&self) -> &str {
        "parameter"
    }

    fn input_count(&self) -> usize {
        0
    }

    fn output_count(&self) -> usize {
        1
    }

    fn evaluate(&self, _state: &mut [f32], _inputs: &[f32], outputs: &mut [f32]) {
        outputs[0] = self.parameter.value();
    }
}
