//! Graph execution context and its compile-side handle.
//!
//! The context is split in two objects, one per thread:
//!
//! - [`GraphCompiler`] lives on the editing thread. It compiles circuits,
//!   allocates fresh per-instance state for the new program and publishes the
//!   result as a *pending installation*.
//! - [`GraphExecutionContext`] lives on the audio thread. It runs the active
//!   program and, on [`sync()`](GraphExecutionContext::sync), adopts a pending
//!   installation with a `try_lock`. It never blocks.
//!
//! The two share a [`parking_lot::Mutex`] whose critical sections only move
//! `Option`s around, plus an [`ArcSwap`] holding the latest compiled program
//! for wait-free introspection.
//!
//! # No allocation on the audio thread
//!
//! Everything the audio thread installs was allocated by the compiler. The
//! installation it replaces is handed back through the `retired` slot and
//! dropped on the editing thread by the next compile or by
//! [`GraphCompiler::collect_garbage`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::circuit::Circuit;
use crate::compile::{Boundaries, compile};
use crate::error::GraphError;
use crate::node::NodeId;
use crate::program::Program;
use crate::state::ExecutionState;

/// A program together with one state per instance.
struct Installation {
    program: Arc<Program>,
    states: Vec<ExecutionState>,
}

impl Installation {
    fn new(program: Arc<Program>, instances: usize) -> Self {
        let states = (0..instances)
            .map(|_| ExecutionState::for_program(&program))
            .collect();
        Self { program, states }
    }

    /// Carries surviving node state over from the installation being replaced.
    fn migrate_from(&mut self, old: &Installation) {
        for (new_state, old_state) in self.states.iter_mut().zip(&old.states) {
            new_state.migrate_from(old_state, &old.program, &self.program);
        }
    }
}

#[derive(Default)]
struct Handoff {
    /// Compiled, not yet adopted by the audio thread.
    pending: Option<Installation>,
    /// Replaced by the audio thread, waiting to be dropped off the audio thread.
    retired: Option<Installation>,
}

struct Shared {
    handoff: Mutex<Handoff>,
    published: ArcSwap<Program>,
    generation: AtomicU64,
    boundaries: Boundaries,
    instances: usize,
}

impl Shared {
    fn build(&self, circuit: &Circuit) -> Result<Installation, GraphError> {
        let mut program = compile(circuit, &self.boundaries)?;
        program.generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Installation::new(Arc::new(program), self.instances))
    }
}

/// Editing-side handle of a [`GraphExecutionContext`].
///
/// Cheap to clone; all clones publish to the same context.
#[derive(Clone)]
pub struct GraphCompiler {
    shared: Arc<Shared>,
}

impl GraphCompiler {
    /// Compiles `circuit` and queues it for installation on the audio thread.
    ///
    /// On error nothing is queued and the running program is unaffected. A
    /// previously queued program that the audio thread has not adopted yet is
    /// superseded.
    pub fn set_graph(&self, circuit: &Circuit) -> Result<Arc<Program>, GraphError> {
        let installation = match self.shared.build(circuit) {
            Ok(installation) => installation,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("circuit compilation failed: {e}");
                return Err(e);
            }
        };
        let program = Arc::clone(&installation.program);
        self.shared.published.store(Arc::clone(&program));

        let (superseded, retired) = {
            let mut handoff = self.shared.handoff.lock();
            (handoff.pending.replace(installation), handoff.retired.take())
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            generation = program.generation(),
            nodes = program.evaluation_order().len(),
            superseded = superseded.is_some(),
            "program queued"
        );

        drop(superseded);
        drop(retired);
        Ok(program)
    }

    /// Latest successfully compiled program, installed or not.
    pub fn current_program(&self) -> Arc<Program> {
        self.shared.published.load_full()
    }

    /// Drops an installation the audio thread has retired, if any.
    pub fn collect_garbage(&self) -> bool {
        let retired = self.shared.handoff.lock().retired.take();
        retired.is_some()
    }

    /// Returns `true` while a compiled program waits for the audio thread.
    pub fn has_pending(&self) -> bool {
        self.shared.handoff.lock().pending.is_some()
    }

    /// Boundary nodes this context compiles against.
    pub fn boundaries(&self) -> Boundaries {
        self.shared.boundaries
    }
}

/// Audio-side executor of compiled programs.
///
/// Holds one [`ExecutionState`] per instance; a polyphonic frame has one
/// instance per voice, a master frame just one.
pub struct GraphExecutionContext {
    shared: Arc<Shared>,
    active: Installation,
    /// Replaced installation that could not be handed back yet.
    parked: Option<Installation>,
}

impl GraphExecutionContext {
    /// Creates a context and its compiler, running the silent program.
    pub fn new(boundaries: Boundaries, instances: usize) -> (GraphCompiler, Self) {
        let silent = Arc::new(Program::silent(
            boundaries.input_count,
            boundaries.output_count,
        ));
        let shared = Arc::new(Shared {
            handoff: Mutex::new(Handoff::default()),
            published: ArcSwap::new(Arc::clone(&silent)),
            generation: AtomicU64::new(0),
            boundaries,
            instances,
        });
        let compiler = GraphCompiler {
            shared: Arc::clone(&shared),
        };
        let context = Self {
            shared,
            active: Installation::new(silent, instances),
            parked: None,
        };
        (compiler, context)
    }

    /// Returns a new compile-side handle to this context.
    pub fn compiler(&self) -> GraphCompiler {
        GraphCompiler {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Adopts a pending program, if one is queued and the lock is free.
    ///
    /// Real-time safe: never blocks, never allocates or frees. Node state of
    /// nodes present in both programs is carried over for every instance.
    /// Returns `true` if a new program was installed.
    pub fn sync(&mut self) -> bool {
        if !self.hand_back_parked() {
            return false;
        }

        let Some(mut incoming) = self
            .shared
            .handoff
            .try_lock()
            .and_then(|mut handoff| handoff.pending.take())
        else {
            return false;
        };

        incoming.migrate_from(&self.active);
        let outgoing = core::mem::replace(&mut self.active, incoming);
        self.parked = Some(outgoing);
        self.hand_back_parked();

        #[cfg(feature = "tracing")]
        tracing::trace!(generation = self.active.program.generation(), "program installed");
        true
    }

    /// Moves a parked installation into the retired slot. Returns `true` once
    /// nothing is parked.
    fn hand_back_parked(&mut self) -> bool {
        if self.parked.is_none() {
            return true;
        }
        let Some(mut handoff) = self.shared.handoff.try_lock() else {
            return false;
        };
        if handoff.retired.is_some() {
            return false;
        }
        handoff.retired = self.parked.take();
        true
    }

    /// Compiles and installs `circuit` immediately.
    ///
    /// For single-threaded hosts and tests; allocates on the calling thread.
    /// Any queued program is discarded.
    pub fn set_graph(&mut self, circuit: &Circuit) -> Result<Arc<Program>, GraphError> {
        let mut installation = self.shared.build(circuit)?;
        let program = Arc::clone(&installation.program);
        self.shared.published.store(Arc::clone(&program));
        installation.migrate_from(&self.active);
        self.active = installation;
        self.shared.handoff.lock().pending = None;
        Ok(program)
    }

    /// Evaluates one sample for one instance.
    ///
    /// Out-of-range instances produce silence.
    #[inline]
    pub fn evaluate(&mut self, instance: usize, inputs: &[f32], outputs: &mut [f32]) {
        let Installation { program, states } = &mut self.active;
        match states.get_mut(instance) {
            Some(state) => program.run(state, inputs, outputs),
            None => outputs.fill(0.0),
        }
    }

    /// Evaluates `frames` samples over interleaved buffers.
    ///
    /// `input` holds `frames * input_count` samples and `output`
    /// `frames * output_count`; the program reads and writes them directly.
    /// A short `input` reads as silence, a short `output` ends the block early.
    pub fn process_block(
        &mut self,
        instance: usize,
        input: &[f32],
        output: &mut [f32],
        frames: usize,
    ) {
        let Installation { program, states } = &mut self.active;
        let Some(state) = states.get_mut(instance) else {
            output.fill(0.0);
            return;
        };
        let ic = program.input_count();
        let oc = program.output_count();
        for frame in 0..frames {
            let inp = input.get(frame * ic..(frame + 1) * ic).unwrap_or(&[]);
            let Some(out) = output.get_mut(frame * oc..(frame + 1) * oc) else {
                break;
            };
            program.run(state, inp, out);
        }
    }

    /// Re-initializes one instance: node state back to its initial values,
    /// delay taps cleared.
    pub fn reset_instance(&mut self, instance: usize) {
        let program = &self.active.program;
        if let Some(state) = self.active.states.get_mut(instance) {
            state.reset(program);
        }
    }

    /// Program currently running on this context.
    pub fn program(&self) -> &Arc<Program> {
        &self.active.program
    }

    /// Number of instances (voices) this context evaluates.
    pub fn instance_count(&self) -> usize {
        self.active.states.len()
    }

    /// State cells of one node in one instance, for persistence.
    pub fn node_state(&self, instance: usize, id: NodeId) -> Option<&[f32]> {
        self.active
            .states
            .get(instance)?
            .node_state(&self.active.program, id)
    }

    /// Overwrites the state cells of one node in one instance.
    ///
    /// Returns `false` if the node is not evaluated or `data` has the wrong
    /// length.
    pub fn restore_node_state(&mut self, instance: usize, id: NodeId, data: &[f32]) -> bool {
        let program = &self.active.program;
        let Some(cells) = self
            .active
            .states
            .get_mut(instance)
            .and_then(|s| s.node_state_mut(program, id))
        else {
            return false;
        };
        if cells.len() != data.len() {
            return false;
        }
        cells.copy_from_slice(data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BufferFetcher, BufferFiller};
    use crate::nodes::{Envelope, Gain};

    fn setup(instances: usize) -> (Circuit, GraphCompiler, GraphExecutionContext) {
        let mut c = Circuit::new();
        let input = c.add_node(Arc::new(BufferFetcher::new(1)));
        let output = c.add_node(Arc::new(BufferFiller::new(1)));
        let (compiler, ctx) = GraphExecutionContext::new(
            Boundaries {
                input,
                output,
                input_count: 1,
                output_count: 1,
            },
            instances,
        );
        (c, compiler, ctx)
    }

    fn gain_circuit(c: &Circuit, factor: f32) -> Circuit {
        let mut c = c.clone();
        let b = (NodeId::new(0), NodeId::new(1));
        let g = c.add_node(Arc::new(Gain::new(factor)));
        c.connect(b.0, 0, g, 0).unwrap();
        c.connect(g, 0, b.1, 0).unwrap();
        c
    }

    fn sample(ctx: &mut GraphExecutionContext, instance: usize, x: f32) -> f32 {
        let mut out = [0.0];
        ctx.evaluate(instance, &[x], &mut out);
        out[0]
    }

    #[test]
    fn silent_until_first_install() {
        let (c, compiler, mut ctx) = setup(1);
        assert_eq!(sample(&mut ctx, 0, 1.0), 0.0);

        compiler.set_graph(&gain_circuit(&c, 2.0)).unwrap();
        assert!(compiler.has_pending());
        // still silent until the audio side syncs
        assert_eq!(sample(&mut ctx, 0, 1.0), 0.0);
        assert!(ctx.sync());
        assert_eq!(sample(&mut ctx, 0, 1.0), 2.0);
        assert!(!ctx.sync());
    }

    #[test]
    fn retired_installation_is_collected_on_editor_side() {
        let (c, compiler, mut ctx) = setup(1);
        compiler.set_graph(&gain_circuit(&c, 2.0)).unwrap();
        ctx.sync();
        assert!(compiler.collect_garbage());
        assert!(!compiler.collect_garbage());

        compiler.set_graph(&gain_circuit(&c, 3.0)).unwrap();
        ctx.sync();
        // next compile drops the retired one too
        compiler.set_graph(&gain_circuit(&c, 4.0)).unwrap();
        assert!(!compiler.collect_garbage());
        ctx.sync();
        assert_eq!(sample(&mut ctx, 0, 1.0), 4.0);
    }

    #[test]
    fn failed_compile_keeps_running_program() {
        let (c, compiler, mut ctx) = setup(1);
        compiler.set_graph(&gain_circuit(&c, 2.0)).unwrap();
        ctx.sync();

        let mut broken = c.clone();
        broken.remove_node(NodeId::new(1)).unwrap();
        assert!(compiler.set_graph(&broken).is_err());
        assert!(!ctx.sync());
        assert_eq!(sample(&mut ctx, 0, 1.0), 2.0);
        assert_eq!(compiler.current_program().generation(), 1);
    }

    #[test]
    fn state_survives_recompile_for_same_node() {
        let (c, _compiler, mut ctx) = setup(2);
        let env: Arc<dyn crate::CompiledNode> = Arc::new(Envelope::new(1000.0, 0.0, 0.0));
        let mut first = c.clone();
        let e = first.add_node(Arc::clone(&env));
        first.connect(NodeId::new(0), 0, e, 0).unwrap();
        first.connect(e, 0, NodeId::new(1), 0).unwrap();
        ctx.set_graph(&first).unwrap();
        sample(&mut ctx, 1, 0.75);
        assert_eq!(ctx.node_state(1, e), Some(&[0.75][..]));

        // rewire the output through a gain; the envelope keeps its level
        let mut second = first.clone();
        let g = second.add_node(Arc::new(Gain::new(1.0)));
        second.connect(e, 0, g, 0).unwrap();
        second.connect(g, 0, NodeId::new(1), 0).unwrap();
        ctx.set_graph(&second).unwrap();
        assert_eq!(ctx.node_state(1, e), Some(&[0.75][..]));
        assert_eq!(ctx.node_state(0, e), Some(&[0.0][..]));

        ctx.reset_instance(1);
        assert_eq!(ctx.node_state(1, e), Some(&[0.0][..]));

        assert!(ctx.restore_node_state(0, e, &[0.5]));
        assert!(!ctx.restore_node_state(0, e, &[0.5, 0.5]));
        assert!(!ctx.restore_node_state(5, e, &[0.5]));
        assert_eq!(ctx.node_state(0, e), Some(&[0.5][..]));
    }

    #[test]
    fn process_block_interleaved() {
        let (c, _compiler, mut ctx) = setup(1);
        ctx.set_graph(&gain_circuit(&c, -1.0)).unwrap();
        let input = [1.0, 2.0, 3.0, 4.0];
        let mut output = [0.0; 4];
        ctx.process_block(0, &input, &mut output, 4);
        assert_eq!(output, [-1.0, -2.0, -3.0, -4.0]);

        let mut short = [9.0; 2];
        ctx.process_block(0, &input, &mut short, 4);
        assert_eq!(short, [-1.0, -2.0]);
    }

    #[test]
    fn out_of_range_instance_is_silent() {
        let (c, _compiler, mut ctx) = setup(1);
        ctx.set_graph(&gain_circuit(&c, 2.0)).unwrap();
        assert_eq!(sample(&mut ctx, 3, 1.0), 0.0);
        assert_eq!(ctx.instance_count(), 1);
    }
}
