//! Node identity and the compiled-node capability.
//!
//! A [`CompiledNode`] is an opaque unit of per-sample computation with a fixed
//! input/output arity. Nodes are shared immutably behind `Arc`; every mutable
//! cell a node needs lives in a per-instance state arena owned by the
//! [`GraphExecutionContext`](crate::GraphExecutionContext). One node value can
//! therefore be evaluated by many voices at once, each with its own slice of
//! state.
//!
//! The two boundary nodes, [`BufferFetcher`] and [`BufferFiller`], are never
//! evaluated directly. The compiler recognizes them and emits dedicated steps
//! that read the caller's input slice and write the caller's output slice.

use core::fmt;

/// Stable identifier of a node inside a [`Circuit`](crate::Circuit).
///
/// Identifiers are assigned sequentially and never reused by a circuit. They
/// stay valid across recompilations, which is what lets per-node state
/// survive a hot swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Creates an identifier from its raw value.
    ///
    /// Used by external editors that describe a whole graph at once
    /// (see [`Circuit::from_parts`](crate::Circuit::from_parts)).
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A unit of per-sample computation with fixed arity.
///
/// Implementations must be real-time safe in [`evaluate`](Self::evaluate):
/// no allocation, no locking, no panics for in-range slices.
///
/// # State
///
/// A node declares how many `f32` cells of private state it needs through
/// [`state_size`](Self::state_size). The executor hands each evaluation the
/// slice belonging to the current instance (voice), and calls
/// [`reset_state`](Self::reset_state) whenever that instance is reinitialized.
pub trait CompiledNode: Send + Sync {
    /// Human-readable node name, used in logs and introspection.
    fn name(&self) -> &str;

    /// Number of input ports.
    fn input_count(&self) -> usize;

    /// Number of output ports.
    fn output_count(&self) -> usize;

    /// Number of `f32` state cells needed per instance.
    fn state_size(&self) -> usize {
        0
    }

    /// Re-initializes one instance's state.
    fn reset_state(&self, state: &mut [f32]) {
        state.fill(0.0);
    }

    /// Computes one sample.
    ///
    /// `inputs` has exactly [`input_count`](Self::input_count) values (zero for
    /// unconnected ports), `outputs` exactly [`output_count`](Self::output_count)
    /// cells and `state` exactly [`state_size`](Self::state_size) cells.
    fn evaluate(&self, state: &mut [f32], inputs: &[f32], outputs: &mut [f32]);
}

impl fmt::Debug for dyn CompiledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledNode").field("name", &self.name()).finish()
    }
}

/// Input boundary of a frame.
///
/// Exposes the caller-supplied input samples as the outputs of a node so the
/// rest of the graph can connect to them like any other source.
#[derive(Debug, Clone, Copy)]
pub struct BufferFetcher {
    channels: usize,
}

impl BufferFetcher {
    /// Creates a fetcher exposing `channels` input streams.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl CompiledNode for BufferFetcher {
    fn name(&self) -> &str {
        "buffer fetcher"
    }

    fn input_count(&self) -> usize {
        0
    }

    fn output_count(&self) -> usize {
        self.channels
    }

    // Fed by a dedicated fetch step.
    fn evaluate(&self, _state: &mut [f32], _inputs: &[f32], _outputs: &mut [f32]) {}
}

/// Output boundary of a frame.
///
/// Its inputs are copied straight into the caller-supplied output slice.
#[derive(Debug, Clone, Copy)]
pub struct BufferFiller {
    channels: usize,
}

impl BufferFiller {
    /// Creates a filler collecting `channels` output streams.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl CompiledNode for BufferFiller {
    fn name(&self) -> &str {
        "buffer filler"
    }

    fn input_count(&self) -> usize {
        self.channels
    }

    fn output_count(&self) -> usize {
        0
    }

    // Drained by a dedicated fill step.
    fn evaluate(&self, _state: &mut [f32], _inputs: &[f32], _outputs: &mut [f32]) {}
}
