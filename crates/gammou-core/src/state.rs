//! Per-instance execution state.
//!
//! Every instance of a program (one per voice for a polyphonic frame) owns an
//! [`ExecutionState`]: the value slots, the node state arena and a scratch
//! buffer for gathering inputs. States are allocated off the audio thread
//! when a program is compiled, so installing a new program only moves them.

use std::sync::Arc;

use crate::node::NodeId;
use crate::program::Program;

/// Value slots and node state for one instance of a [`Program`].
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub(crate) values: Vec<f32>,
    pub(crate) cells: Vec<f32>,
    pub(crate) scratch: Vec<f32>,
    generation: u64,
}

impl ExecutionState {
    /// Allocates and initializes a state sized for `program`.
    pub fn for_program(program: &Program) -> Self {
        let mut state = Self {
            values: vec![0.0; program.value_count()],
            cells: vec![0.0; program.state_len()],
            scratch: vec![0.0; program.max_node_inputs()],
            generation: program.generation(),
        };
        program.reset_cells(&mut state.cells);
        state
    }

    /// Generation of the program this state was built for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns every node to its initial state and clears delay taps.
    pub fn reset(&mut self, program: &Program) {
        debug_assert_eq!(self.generation, program.generation());
        self.values.fill(0.0);
        program.reset_cells(&mut self.cells);
    }

    /// Copies the state of nodes that survive from `old_program` into this
    /// state, which must belong to `new_program`.
    ///
    /// A node survives when the same id maps to the same node value with the
    /// same state size in both programs. Delay taps are not carried over.
    /// Never allocates.
    pub fn migrate_from(
        &mut self,
        old: &ExecutionState,
        old_program: &Program,
        new_program: &Program,
    ) {
        for entry in &new_program.state_layout {
            if entry.cells.is_empty() {
                continue;
            }
            let Some(prev) = old_program.state_entry(entry.id) else {
                continue;
            };
            let same_node = std::ptr::addr_eq(
                Arc::as_ptr(&old_program.nodes[prev.node]),
                Arc::as_ptr(&new_program.nodes[entry.node]),
            );
            if same_node && prev.cells.len() == entry.cells.len() {
                self.cells[entry.cells.clone()].copy_from_slice(&old.cells[prev.cells.clone()]);
            }
        }
    }

    /// Returns the state cells of one node.
    pub fn node_state(&self, program: &Program, id: NodeId) -> Option<&[f32]> {
        program.state_range(id).map(|r| &self.cells[r])
    }

    /// Returns the state cells of one node for writing, e.g. to restore a
    /// saved session.
    pub fn node_state_mut(&mut self, program: &Program, id: NodeId) -> Option<&mut [f32]> {
        program.state_range(id).map(|r| &mut self.cells[r])
    }
}
