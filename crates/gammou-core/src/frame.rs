//! Circuit frame: an editable circuit bound to fixed boundary nodes.
//!
//! A [`CircuitFrame`] owns the editing side of a graph: the [`Circuit`] the
//! editor mutates, the two boundary nodes that are always part of it, and
//! the [`GraphCompiler`] that publishes compiled programs. Creating a frame
//! also yields the [`GraphExecutionContext`] to hand to the audio thread.
//!
//! ```rust
//! use std::sync::Arc;
//! use gammou_core::{CircuitFrame, nodes::Gain};
//!
//! let (mut frame, mut context) = CircuitFrame::new(1, 1, 1);
//! let gain = frame.circuit_mut().add_node(Arc::new(Gain::new(0.5)));
//! let (input, output) = (frame.input_node(), frame.output_node());
//! frame.circuit_mut().connect(input, 0, gain, 0).unwrap();
//! frame.circuit_mut().connect(gain, 0, output, 0).unwrap();
//! frame.compile().unwrap();
//!
//! context.sync();
//! let mut out = [0.0];
//! context.evaluate(0, &[1.0], &mut out);
//! assert_eq!(out, [0.5]);
//! ```

use std::sync::Arc;

use crate::circuit::Circuit;
use crate::compile::Boundaries;
use crate::context::{GraphCompiler, GraphExecutionContext};
use crate::error::GraphError;
use crate::node::{BufferFetcher, BufferFiller, CompiledNode, NodeId};
use crate::program::Program;

/// Editing side of a graph with fixed input and output boundaries.
pub struct CircuitFrame {
    circuit: Circuit,
    input: NodeId,
    output: NodeId,
    input_count: usize,
    output_count: usize,
    compiler: GraphCompiler,
}

impl CircuitFrame {
    /// Creates a frame with `input_count` input channels, `output_count`
    /// output channels and `instances` independent evaluation states.
    pub fn new(
        input_count: usize,
        output_count: usize,
        instances: usize,
    ) -> (Self, GraphExecutionContext) {
        let mut circuit = Circuit::new();
        let input = circuit.add_node(Arc::new(BufferFetcher::new(input_count)));
        let output = circuit.add_node(Arc::new(BufferFiller::new(output_count)));
        let (compiler, context) = GraphExecutionContext::new(
            Boundaries {
                input,
                output,
                input_count,
                output_count,
            },
            instances,
        );
        let frame = Self {
            circuit,
            input,
            output,
            input_count,
            output_count,
            compiler,
        };
        (frame, context)
    }

    /// Input boundary node; its outputs are the frame's input channels.
    pub fn input_node(&self) -> NodeId {
        self.input
    }

    /// Output boundary node; its inputs are the frame's output channels.
    pub fn output_node(&self) -> NodeId {
        self.output
    }

    /// Number of input channels.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Number of output channels.
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// The editable circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// The editable circuit, for mutation.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Adds a node to the frame's circuit.
    pub fn add_node(&mut self, node: Arc<dyn CompiledNode>) -> NodeId {
        self.circuit.add_node(node)
    }

    /// Removes a non-boundary node and its edges.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Arc<dyn CompiledNode>, GraphError> {
        if id == self.input || id == self.output {
            return Err(GraphError::BoundaryRemoval(id));
        }
        self.circuit.remove_node(id)
    }

    /// Compiles the frame's circuit and queues it for the audio thread.
    pub fn compile(&self) -> Result<Arc<Program>, GraphError> {
        self.compiler.set_graph(&self.circuit)
    }

    /// Replaces the frame's circuit with `circuit` and compiles it.
    ///
    /// The circuit must contain this frame's boundary nodes. On error the
    /// frame's circuit is left unchanged.
    pub fn set_graph(&mut self, circuit: Circuit) -> Result<Arc<Program>, GraphError> {
        let program = self.compiler.set_graph(&circuit)?;
        self.circuit = circuit;
        Ok(program)
    }

    /// Removes every node except the boundaries. Does not recompile.
    pub fn reset(&mut self) {
        self.circuit.clear_except(&[self.input, self.output]);
    }

    /// Latest successfully compiled program.
    pub fn current_program(&self) -> Arc<Program> {
        self.compiler.current_program()
    }

    /// Compile-side handle, e.g. for another editing thread.
    pub fn compiler(&self) -> &GraphCompiler {
        &self.compiler
    }

    /// Drops a program the audio thread has retired.
    pub fn collect_garbage(&self) -> bool {
        self.compiler.collect_garbage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Gain, Identity};

    #[test]
    fn frame_starts_with_boundaries_only() {
        let (frame, ctx) = CircuitFrame::new(2, 3, 4);
        assert_eq!(frame.circuit().node_count(), 2);
        assert_eq!(frame.circuit().edge_count(), 0);
        assert_eq!(frame.input_count(), 2);
        assert_eq!(frame.output_count(), 3);
        assert_eq!(ctx.instance_count(), 4);
        assert_eq!(frame.current_program().generation(), 0);
    }

    #[test]
    fn boundaries_cannot_be_removed() {
        let (mut frame, _ctx) = CircuitFrame::new(1, 1, 1);
        let input = frame.input_node();
        assert_eq!(
            frame.remove_node(input).unwrap_err(),
            GraphError::BoundaryRemoval(input)
        );
        let g = frame.add_node(Arc::new(Gain::new(1.0)));
        assert!(frame.remove_node(g).is_ok());
    }

    #[test]
    fn reset_keeps_boundaries() {
        let (mut frame, mut ctx) = CircuitFrame::new(2, 2, 1);
        let id = frame.add_node(Arc::new(Identity::new(2)));
        let (i, o) = (frame.input_node(), frame.output_node());
        for ch in 0..2 {
            frame.circuit_mut().connect(i, ch, id, ch).unwrap();
            frame.circuit_mut().connect(id, ch, o, ch).unwrap();
        }
        frame.compile().unwrap();
        ctx.sync();
        let mut out = [0.0; 2];
        ctx.evaluate(0, &[0.1, 0.2], &mut out);
        assert_eq!(out, [0.1, 0.2]);

        frame.reset();
        assert_eq!(frame.circuit().node_count(), 2);
        frame.compile().unwrap();
        ctx.sync();
        ctx.evaluate(0, &[0.1, 0.2], &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn set_graph_rejects_without_touching_circuit() {
        let (mut frame, _ctx) = CircuitFrame::new(1, 1, 1);
        let before = frame.circuit().node_count();
        assert!(frame.set_graph(Circuit::new()).is_err());
        assert_eq!(frame.circuit().node_count(), before);
    }
}
