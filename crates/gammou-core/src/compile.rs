//! Circuit compilation.
//!
//! Turns a [`Circuit`] into a [`Program`]:
//!
//! 1. Validate boundaries and edges (existence, arity, single-writer inputs).
//! 2. Keep only nodes the output boundary depends on, through direct or
//!    delayed edges.
//! 3. Topologically sort the kept nodes over direct edges (Kahn's algorithm).
//!    Delayed edges are excluded from the sort, which is what makes them legal
//!    in a cycle.
//! 4. Allocate value slots and state cells, then emit the step list.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::circuit::{Circuit, Edge, EdgeKind};
use crate::error::{GraphError, Port};
use crate::node::{CompiledNode, NodeId};
use crate::program::{Program, StateEntry, Step, ZERO_SLOT};

const UNSCHEDULED: usize = usize::MAX;

/// Boundary nodes and channel counts a program must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundaries {
    /// Input boundary (buffer fetcher).
    pub input: NodeId,
    /// Output boundary (buffer filler).
    pub output: NodeId,
    /// Channels the input boundary must expose.
    pub input_count: usize,
    /// Channels the output boundary must accept.
    pub output_count: usize,
}

/// Compiles `circuit` into a program bound to `boundaries`.
///
/// The returned program has generation 0; the caller stamps it.
pub fn compile(circuit: &Circuit, boundaries: &Boundaries) -> Result<Program, GraphError> {
    check_boundaries(circuit, boundaries)?;
    let drivers = validate_edges(circuit)?;

    let reachable = reachable_from_output(circuit, boundaries.output);
    let order = sort(circuit, &reachable)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "circuit_sort: {} of {} nodes scheduled",
        order.len(),
        circuit.node_count()
    );

    Ok(emit(circuit, boundaries, &drivers, &order, &reachable))
}

fn check_boundaries(circuit: &Circuit, b: &Boundaries) -> Result<(), GraphError> {
    let input = circuit
        .node(b.input)
        .ok_or(GraphError::MissingBoundary(b.input))?;
    if input.output_count() != b.input_count {
        return Err(GraphError::BoundaryArity {
            node: b.input,
            expected: b.input_count,
            found: input.output_count(),
        });
    }
    let output = circuit
        .node(b.output)
        .ok_or(GraphError::MissingBoundary(b.output))?;
    if output.input_count() != b.output_count {
        return Err(GraphError::BoundaryArity {
            node: b.output,
            expected: b.output_count,
            found: output.input_count(),
        });
    }
    Ok(())
}

/// Driver table: for each node slot, the edge feeding each of its inputs.
type Drivers = Vec<Vec<Option<Edge>>>;

fn validate_edges(circuit: &Circuit) -> Result<Drivers, GraphError> {
    let mut drivers: Drivers = (0..circuit.id_bound())
        .map(|i| {
            circuit
                .node(NodeId(i as u32))
                .map_or_else(Vec::new, |n| vec![None; n.input_count()])
        })
        .collect();

    for edge in circuit.edges() {
        let (Some(from), Some(to)) = (circuit.node(edge.from), circuit.node(edge.to)) else {
            return Err(GraphError::DanglingEdge {
                from: edge.from,
                to: edge.to,
            });
        };
        if edge.output >= from.output_count() {
            return Err(GraphError::ArityMismatch {
                node: edge.from,
                port: Port::Output(edge.output),
                count: from.output_count(),
            });
        }
        if edge.input >= to.input_count() {
            return Err(GraphError::ArityMismatch {
                node: edge.to,
                port: Port::Input(edge.input),
                count: to.input_count(),
            });
        }
        let slot = &mut drivers[edge.to.slot()][edge.input];
        if slot.is_some() {
            return Err(GraphError::InputAlreadyDriven {
                node: edge.to,
                input: edge.input,
            });
        }
        *slot = Some(*edge);
    }
    Ok(drivers)
}

/// Marks every node the output boundary depends on.
fn reachable_from_output(circuit: &Circuit, output: NodeId) -> Vec<bool> {
    let mut reachable = vec![false; circuit.id_bound()];
    let mut stack = vec![output];
    reachable[output.slot()] = true;
    while let Some(id) = stack.pop() {
        for edge in circuit.edges().iter().filter(|e| e.to == id) {
            if !reachable[edge.from.slot()] {
                reachable[edge.from.slot()] = true;
                stack.push(edge.from);
            }
        }
    }
    reachable
}

/// Kahn's sort of the reachable nodes over direct edges.
fn sort(circuit: &Circuit, reachable: &[bool]) -> Result<Vec<NodeId>, GraphError> {
    let n = reachable.len();
    let mut in_degree = vec![0u32; n];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in circuit.edges() {
        if edge.kind == EdgeKind::Direct && reachable[edge.to.slot()] {
            in_degree[edge.to.slot()] += 1;
            successors[edge.from.slot()].push(edge.to.slot());
        }
    }

    let active = reachable.iter().filter(|&&r| r).count();
    let mut queue: VecDeque<usize> = (0..n)
        .filter(|&i| reachable[i] && in_degree[i] == 0)
        .collect();
    let mut sorted = Vec::with_capacity(active);

    while let Some(idx) = queue.pop_front() {
        sorted.push(NodeId(idx as u32));
        for &next in &successors[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if sorted.len() != active {
        return Err(GraphError::CycleDetected(node_on_cycle(
            circuit,
            reachable,
            &in_degree,
        )));
    }
    Ok(sorted)
}

/// Walks backwards through unsorted nodes until one repeats.
///
/// Every node left with a non-zero in-degree has a direct predecessor that
/// was also left, so the walk must close a loop.
fn node_on_cycle(circuit: &Circuit, reachable: &[bool], in_degree: &[u32]) -> NodeId {
    let stuck = |i: usize| reachable[i] && in_degree[i] > 0;
    let mut seen = vec![false; in_degree.len()];
    let Some(mut current) = (0..in_degree.len()).find(|&i| stuck(i)) else {
        return NodeId(0);
    };
    while !seen[current] {
        seen[current] = true;
        match circuit
            .edges()
            .iter()
            .find(|e| e.kind == EdgeKind::Direct && e.to.slot() == current && stuck(e.from.slot()))
        {
            Some(edge) => current = edge.from.slot(),
            None => break,
        }
    }
    NodeId(current as u32)
}

fn emit(
    circuit: &Circuit,
    b: &Boundaries,
    drivers: &Drivers,
    order: &[NodeId],
    reachable: &[bool],
) -> Program {
    // Output slots: zero slot first, then each scheduled node in order.
    let mut output_base = vec![UNSCHEDULED; circuit.id_bound()];
    let mut value_count = ZERO_SLOT + 1;
    for &id in order {
        if let Some(node) = circuit.node(id) {
            output_base[id.slot()] = value_count;
            value_count += node.output_count();
        }
    }

    // One tap per delayed edge feeding a scheduled node.
    let mut latches = Vec::new();
    let mut taps = std::collections::HashMap::new();
    for edge in circuit.edges() {
        if edge.kind == EdgeKind::Delayed && reachable[edge.to.slot()] {
            let tap = value_count;
            value_count += 1;
            taps.insert((edge.to, edge.input), tap);
            latches.push(Step::Latch {
                source: output_base[edge.from.slot()] + edge.output,
                tap,
            });
        }
    }

    let source_of = |id: NodeId, input: usize| -> usize {
        match drivers[id.slot()][input] {
            Some(edge) if edge.kind == EdgeKind::Direct => {
                output_base[edge.from.slot()] + edge.output
            }
            Some(edge) => taps
                .get(&(edge.to, edge.input))
                .copied()
                .unwrap_or(ZERO_SLOT),
            None => ZERO_SLOT,
        }
    };

    let mut steps = Vec::with_capacity(order.len() + latches.len() + 1);
    let mut nodes: Vec<Arc<dyn CompiledNode>> = Vec::new();
    let mut node_ids = Vec::new();
    let mut input_sources = Vec::new();
    let mut state_layout = Vec::new();
    let mut state_len = 0;
    let mut max_node_inputs = 0;

    for &id in order {
        let Some(node) = circuit.node(id) else {
            continue;
        };
        let base = output_base[id.slot()];
        if id == b.input {
            steps.push(Step::Fetch {
                outputs: base..base + node.output_count(),
            });
            continue;
        }
        if id == b.output {
            continue;
        }

        let first_input = input_sources.len();
        input_sources.extend((0..node.input_count()).map(|i| source_of(id, i)));
        let cells = state_len..state_len + node.state_size();
        state_len += node.state_size();
        max_node_inputs = max_node_inputs.max(node.input_count());

        state_layout.push(StateEntry {
            id,
            node: nodes.len(),
            cells: cells.clone(),
        });
        steps.push(Step::Evaluate {
            node: nodes.len(),
            inputs: first_input..input_sources.len(),
            outputs: base..base + node.output_count(),
            state: cells,
        });
        nodes.push(Arc::clone(node));
        node_ids.push(id);
    }

    let first_output = input_sources.len();
    input_sources.extend((0..b.output_count).map(|i| source_of(b.output, i)));
    steps.push(Step::Fill {
        inputs: first_output..input_sources.len(),
    });
    let delay_count = latches.len();
    steps.extend(latches);

    state_layout.sort_by_key(|e| e.id);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "circuit_slots: {} steps, {} values, {} state cells, {} delays",
        steps.len(),
        value_count,
        state_len,
        delay_count
    );

    Program {
        steps,
        nodes,
        node_ids,
        input_sources,
        state_layout,
        value_count,
        state_len,
        max_node_inputs,
        input_count: b.input_count,
        output_count: b.output_count,
        delay_count,
        generation: 0,
    }
}
