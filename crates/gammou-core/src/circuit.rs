//! Editable circuit: the mutable node/edge description an editor works on.
//!
//! A [`Circuit`] is never touched by the audio thread. It is turned into an
//! immutable [`Program`](crate::Program) by compilation, which is where
//! topological evaluability is checked. Edits made through
//! [`connect`](Circuit::connect) are validated eagerly for existence and
//! arity; circuits assembled wholesale with [`Circuit::from_parts`] are only
//! validated at compile time.

use std::sync::Arc;

use crate::error::{GraphError, Port};
use crate::node::{CompiledNode, NodeId};

/// How a connection carries its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Value is read in the same sample it is produced.
    Direct,
    /// Value is read one sample after it is produced; may close a cycle.
    Delayed,
}

/// A directed connection from a node output to a node input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source node.
    pub from: NodeId,
    /// Output index on the source node.
    pub output: usize,
    /// Destination node.
    pub to: NodeId,
    /// Input index on the destination node.
    pub input: usize,
    /// Direct or one-sample delayed.
    pub kind: EdgeKind,
}

/// Mutable node/edge graph.
///
/// # Usage
///
/// 1. Add nodes with [`add_node()`](Self::add_node)
/// 2. Wire them with [`connect()`](Self::connect) or
///    [`connect_delayed()`](Self::connect_delayed)
/// 3. Hand the circuit to a [`CircuitFrame`](crate::CircuitFrame) or a
///    [`GraphCompiler`](crate::GraphCompiler) for compilation
#[derive(Clone, Default)]
pub struct Circuit {
    nodes: Vec<Option<Arc<dyn CompiledNode>>>,
    edges: Vec<Edge>,
}

impl Circuit {
    /// Creates an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest node slot count [`from_parts`](Self::from_parts) accepts.
    pub const MAX_NODES: usize = 1 << 16;

    /// Builds a circuit from a complete description.
    ///
    /// Node identifiers are taken as given; a later entry with the same id
    /// replaces an earlier one. Edges are stored unchecked and validated when
    /// the circuit is compiled.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeIdOutOfRange`] if an identifier is not below
    /// [`MAX_NODES`](Self::MAX_NODES).
    pub fn from_parts(
        nodes: impl IntoIterator<Item = (NodeId, Arc<dyn CompiledNode>)>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Result<Self, GraphError> {
        let mut circuit = Self::new();
        for (id, node) in nodes {
            let slot = id.slot();
            if slot >= Self::MAX_NODES {
                return Err(GraphError::NodeIdOutOfRange {
                    node: id,
                    limit: Self::MAX_NODES,
                });
            }
            if circuit.nodes.len() <= slot {
                circuit.nodes.resize_with(slot + 1, || None);
            }
            circuit.nodes[slot] = Some(node);
        }
        circuit.edges.extend(edges);
        Ok(circuit)
    }

    /// Adds a node and returns its identifier.
    pub fn add_node(&mut self, node: Arc<dyn CompiledNode>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    /// Removes a node together with every edge attached to it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Arc<dyn CompiledNode>, GraphError> {
        let node = self
            .nodes
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(GraphError::NodeNotFound(id))?;
        self.edges.retain(|e| e.from != id && e.to != id);
        Ok(node)
    }

    /// Connects `from.output` to `to.input`.
    ///
    /// An edge already driving `to.input` is replaced, so inputs always have
    /// a single writer.
    pub fn connect(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), GraphError> {
        self.insert_edge(Edge {
            from,
            output,
            to,
            input,
            kind: EdgeKind::Direct,
        })
    }

    /// Connects `from.output` to `to.input` with a one-sample delay.
    ///
    /// Delayed edges are the only way to close a feedback loop.
    pub fn connect_delayed(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), GraphError> {
        self.insert_edge(Edge {
            from,
            output,
            to,
            input,
            kind: EdgeKind::Delayed,
        })
    }

    fn insert_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        let source = self.node(edge.from).ok_or(GraphError::NodeNotFound(edge.from))?;
        if edge.output >= source.output_count() {
            return Err(GraphError::ArityMismatch {
                node: edge.from,
                port: Port::Output(edge.output),
                count: source.output_count(),
            });
        }
        let dest = self.node(edge.to).ok_or(GraphError::NodeNotFound(edge.to))?;
        if edge.input >= dest.input_count() {
            return Err(GraphError::ArityMismatch {
                node: edge.to,
                port: Port::Input(edge.input),
                count: dest.input_count(),
            });
        }

        self.edges
            .retain(|e| !(e.to == edge.to && e.input == edge.input));
        self.edges.push(edge);
        Ok(())
    }

    /// Removes the edge driving `to.input`, returning it if present.
    pub fn disconnect(&mut self, to: NodeId, input: usize) -> Option<Edge> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.to == to && e.input == input)?;
        Some(self.edges.remove(pos))
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> Option<&Arc<dyn CompiledNode>> {
        self.nodes.get(id.slot()).and_then(Option::as_ref)
    }

    /// Returns `true` if the node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Iterates over live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Arc<dyn CompiledNode>)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// One past the largest node id ever allocated.
    pub(crate) fn id_bound(&self) -> usize {
        self.nodes.len()
    }

    /// Removes every node except `keep`, and every edge not between kept nodes.
    pub fn clear_except(&mut self, keep: &[NodeId]) {
        for (i, slot) in self.nodes.iter_mut().enumerate() {
            if !keep.contains(&NodeId(i as u32)) {
                *slot = None;
            }
        }
        self.edges
            .retain(|e| keep.contains(&e.from) && keep.contains(&e.to));
    }
}

impl core::fmt::Debug for Circuit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Circuit")
            .field(
                "nodes",
                &self.nodes().map(|(id, n)| (id, n.name())).collect::<Vec<_>>(),
            )
            .field("edges", &self.edges)
            .finish()
    }
}
