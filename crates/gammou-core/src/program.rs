//! Compiled evaluation program.
//!
//! A [`Program`] is the immutable product of compiling a
//! [`Circuit`](crate::Circuit). It holds a flat list of [`Step`]s executed in
//! order for every sample, plus the layout of the value slots and of the
//! per-node state arena. Programs are shared with the audio thread via `Arc`
//! and never mutated after creation.
//!
//! # Value slots
//!
//! Slot 0 is a constant zero read by unconnected inputs. Each scheduled node
//! owns a contiguous run of slots for its outputs. Each delayed edge owns a
//! tap slot that is latched at the end of the sample and read during the
//! next one.

use std::ops::Range;
use std::sync::Arc;

use crate::node::{CompiledNode, NodeId};
use crate::state::ExecutionState;

/// Slot that always reads as zero.
pub(crate) const ZERO_SLOT: usize = 0;

/// A single instruction of a compiled program.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Copy the caller's input samples into the fetcher's output slots.
    Fetch {
        /// Output slots of the input boundary node.
        outputs: Range<usize>,
    },
    /// Gather inputs, evaluate one node, write its outputs.
    Evaluate {
        /// Index into [`Program::nodes`].
        node: usize,
        /// Range into [`Program::input_sources`].
        inputs: Range<usize>,
        /// Output slots of the node.
        outputs: Range<usize>,
        /// The node's cells in the state arena.
        state: Range<usize>,
    },
    /// Copy the slots driving the output boundary into the caller's output.
    Fill {
        /// Range into [`Program::input_sources`].
        inputs: Range<usize>,
    },
    /// Carry a value into a delay tap for the next sample.
    Latch {
        /// Slot produced this sample.
        source: usize,
        /// Tap slot read next sample.
        tap: usize,
    },
}

/// Where one node's cells live in the state arena.
#[derive(Debug, Clone)]
pub(crate) struct StateEntry {
    pub id: NodeId,
    /// Index into [`Program::nodes`].
    pub node: usize,
    pub cells: Range<usize>,
}

/// Immutable, ready-to-run form of a circuit.
pub struct Program {
    pub(crate) steps: Vec<Step>,
    /// Evaluated nodes, in evaluation order.
    pub(crate) nodes: Vec<Arc<dyn CompiledNode>>,
    /// Ids of `nodes`, same order.
    pub(crate) node_ids: Vec<NodeId>,
    /// Value slot feeding each input, indexed through `Step` ranges.
    pub(crate) input_sources: Vec<usize>,
    /// State arena layout, sorted by node id for lookup.
    pub(crate) state_layout: Vec<StateEntry>,
    pub(crate) value_count: usize,
    pub(crate) state_len: usize,
    pub(crate) max_node_inputs: usize,
    pub(crate) input_count: usize,
    pub(crate) output_count: usize,
    pub(crate) delay_count: usize,
    pub(crate) generation: u64,
}

impl Program {
    /// Program that ignores its input and outputs silence.
    ///
    /// Installed in every context before the first successful compilation.
    pub fn silent(input_count: usize, output_count: usize) -> Self {
        Self {
            steps: vec![Step::Fill {
                inputs: 0..output_count,
            }],
            nodes: Vec::new(),
            node_ids: Vec::new(),
            input_sources: vec![ZERO_SLOT; output_count],
            state_layout: Vec::new(),
            value_count: 1,
            state_len: 0,
            max_node_inputs: 0,
            input_count,
            output_count,
            delay_count: 0,
            generation: 0,
        }
    }

    /// Compilation counter of the context that produced this program.
    ///
    /// Zero for the initial silent program.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of steps executed per sample.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Number of value slots per instance.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Number of state cells per instance.
    pub fn state_len(&self) -> usize {
        self.state_len
    }

    /// Number of delayed edges in the program.
    pub fn delay_count(&self) -> usize {
        self.delay_count
    }

    /// Largest input arity among evaluated nodes.
    pub fn max_node_inputs(&self) -> usize {
        self.max_node_inputs
    }

    /// Channels read from the caller per sample.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Channels written to the caller per sample.
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// Evaluated nodes in the order they run. Boundary nodes are excluded.
    pub fn evaluation_order(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Returns the compiled node with the given id, if it is evaluated.
    pub fn node(&self, id: NodeId) -> Option<&Arc<dyn CompiledNode>> {
        let pos = self.node_ids.iter().position(|&n| n == id)?;
        Some(&self.nodes[pos])
    }

    /// Returns the cells a node occupies in each instance's state arena.
    pub fn state_range(&self, id: NodeId) -> Option<Range<usize>> {
        self.state_entry(id).map(|e| e.cells.clone())
    }

    pub(crate) fn state_entry(&self, id: NodeId) -> Option<&StateEntry> {
        self.state_layout
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &self.state_layout[i])
    }

    /// Runs every step for one sample.
    ///
    /// `inputs` shorter than [`input_count`](Self::input_count) reads as zero
    /// for the missing channels; extra `outputs` cells are left untouched.
    pub(crate) fn run(&self, state: &mut ExecutionState, inputs: &[f32], outputs: &mut [f32]) {
        let values = &mut state.values;
        for step in &self.steps {
            match step {
                Step::Fetch { outputs: slots } => {
                    let dst = &mut values[slots.clone()];
                    let n = dst.len().min(inputs.len());
                    dst[..n].copy_from_slice(&inputs[..n]);
                    dst[n..].fill(0.0);
                }
                Step::Evaluate {
                    node,
                    inputs: sources,
                    outputs: slots,
                    state: cells,
                } => {
                    let sources = &self.input_sources[sources.clone()];
                    let gathered = &mut state.scratch[..sources.len()];
                    for (dst, &src) in gathered.iter_mut().zip(sources) {
                        *dst = values[src];
                    }
                    self.nodes[*node].evaluate(
                        &mut state.cells[cells.clone()],
                        gathered,
                        &mut values[slots.clone()],
                    );
                }
                Step::Fill { inputs: sources } => {
                    for (dst, &src) in outputs
                        .iter_mut()
                        .zip(&self.input_sources[sources.clone()])
                    {
                        *dst = values[src];
                    }
                }
                Step::Latch { source, tap } => values[*tap] = values[*source],
            }
        }
    }

    /// Re-initializes every node's state cells in one instance.
    pub(crate) fn reset_cells(&self, cells: &mut [f32]) {
        for step in &self.steps {
            if let Step::Evaluate { node, state, .. } = step {
                self.nodes[*node].reset_state(&mut cells[state.clone()]);
            }
        }
    }
}

impl core::fmt::Debug for Program {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Program")
            .field("generation", &self.generation)
            .field("steps", &self.steps.len())
            .field("order", &self.node_ids)
            .field("value_count", &self.value_count)
            .field("state_len", &self.state_len)
            .finish()
    }
}
