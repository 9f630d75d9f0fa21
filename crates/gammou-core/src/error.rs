//! Structural errors reported while editing or compiling a circuit.

use core::fmt;

use thiserror::Error;

use crate::node::NodeId;

/// A port on a node, used to report arity errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Input port with the given index.
    Input(usize),
    /// Output port with the given index.
    Output(usize),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Input(i) => write!(f, "input {i}"),
            Port::Output(o) => write!(f, "output {o}"),
        }
    }
}

/// Errors produced by circuit edits and by compilation.
///
/// A failed compilation never replaces the program currently running on the
/// audio thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The node does not exist in the circuit.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// A boundary node of the frame is absent from the circuit.
    #[error("boundary node {0} is missing from the circuit")]
    MissingBoundary(NodeId),

    /// A boundary node does not expose the channel count the frame expects.
    #[error("boundary node {node} has {found} channels, expected {expected}")]
    BoundaryArity {
        /// Offending boundary node.
        node: NodeId,
        /// Channel count required by the frame.
        expected: usize,
        /// Channel count found on the node.
        found: usize,
    },

    /// A node identifier is too large for a circuit description.
    #[error("{node} exceeds the limit of {limit} nodes")]
    NodeIdOutOfRange {
        /// Offending identifier.
        node: NodeId,
        /// Number of node slots a circuit may hold.
        limit: usize,
    },

    /// An edge references a node that is not in the circuit.
    #[error("edge {from} -> {to} references a node that does not exist")]
    DanglingEdge {
        /// Source node of the edge.
        from: NodeId,
        /// Destination node of the edge.
        to: NodeId,
    },

    /// An edge references a port beyond the node's arity.
    #[error("{node} has no {port} ({count} available)")]
    ArityMismatch {
        /// Node whose arity was exceeded.
        node: NodeId,
        /// Port that does not exist.
        port: Port,
        /// Number of ports of that direction on the node.
        count: usize,
    },

    /// Two edges drive the same input.
    #[error("input {input} of {node} is driven by more than one edge")]
    InputAlreadyDriven {
        /// Destination node.
        node: NodeId,
        /// Input index driven twice.
        input: usize,
    },

    /// A cycle exists that no delayed edge breaks.
    #[error("cycle without a delayed edge through {0}")]
    CycleDetected(NodeId),

    /// Boundary nodes belong to the frame and cannot be removed through it.
    #[error("boundary node {0} cannot be removed")]
    BoundaryRemoval(NodeId),
}
