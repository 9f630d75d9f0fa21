//! Gammou Core - compiled dataflow graphs for real-time audio
//!
//! This crate turns an editable node/edge circuit into a flat per-sample
//! program and runs it on the audio thread, with programs replaced while
//! audio keeps flowing.
//!
//! # Core Abstractions
//!
//! ## Nodes
//!
//! - [`CompiledNode`] - Opaque per-sample unit with fixed arity and arena state
//! - [`NodeId`] - Stable node identity, preserved across recompilation
//! - [`BufferFetcher`] / [`BufferFiller`] - Input and output boundary nodes
//! - [`nodes`] - Built-in nodes (gain, sum, oscillator, envelope, ...)
//! - [`NodeRegistry`] - Factory of node types by id
//!
//! ## Graphs
//!
//! - [`Circuit`] - Mutable node/edge description, owned by the editor
//! - [`EdgeKind::Delayed`] - One-sample delayed edge, the only way to close a loop
//! - [`Program`] - Immutable compiled form, shared with the audio thread via `Arc`
//!
//! ## Execution
//!
//! - [`CircuitFrame`] - Circuit with fixed boundaries plus its compiler
//! - [`GraphExecutionContext`] - Audio-side executor with per-instance state
//! - [`GraphCompiler`] - Editing-side handle that compiles and queues programs
//!
//! # Threading
//!
//! Compilation and state allocation happen on the editing thread. The audio
//! thread adopts a new program in [`GraphExecutionContext::sync`] with a
//! `try_lock`, so it never blocks and never observes a half-built program.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gammou_core::{CircuitFrame, nodes::Sum};
//!
//! // y[n] = x[n] + y[n-1]
//! let (mut frame, mut context) = CircuitFrame::new(1, 1, 1);
//! let sum = frame.add_node(Arc::new(Sum::new(2)));
//! let (input, output) = (frame.input_node(), frame.output_node());
//! let circuit = frame.circuit_mut();
//! circuit.connect(input, 0, sum, 0).unwrap();
//! circuit.connect_delayed(sum, 0, sum, 1).unwrap();
//! circuit.connect(sum, 0, output, 0).unwrap();
//! frame.compile().unwrap();
//!
//! context.sync();
//! let mut out = [0.0];
//! for expected in [1.0, 2.0, 3.0] {
//!     context.evaluate(0, &[1.0], &mut out);
//!     assert_eq!(out[0], expected);
//! }
//! ```

pub mod circuit;
pub mod compile;
pub mod context;
pub mod error;
pub mod frame;
pub mod node;
pub mod nodes;
pub mod program;
pub mod registry;
pub mod state;

pub use circuit::{Circuit, Edge, EdgeKind};
pub use compile::{Boundaries, compile};
pub use context::{GraphCompiler, GraphExecutionContext};
pub use error::{GraphError, Port};
pub use frame::CircuitFrame;
pub use node::{BufferFetcher, BufferFiller, CompiledNode, NodeId};
pub use program::Program;
pub use registry::{NodeCategory, NodeDescriptor, NodeFactory, NodeRegistry};
pub use state::ExecutionState;
