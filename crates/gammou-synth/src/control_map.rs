//! MIDI control change to parameter bindings, with MIDI learn.
//!
//! The table is shared between the editor and the audio thread. Every entry
//! is an `ArcSwapOption`, so the audio thread reads bindings wait-free and
//! never takes a lock. Bindings are created on the editor side, except when
//! a learn request completes: the audio thread then moves the pending
//! parameter into a free entry with a compare-and-swap. No path on the audio
//! thread allocates or releases the last reference to a binding: every
//! binding the editor creates is also parked in an editor-side list, and
//! [`ControlMap::collect_garbage`] frees only those no reader still holds.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::parameter::Parameter;

/// Number of MIDI continuous controllers.
pub const CONTROL_COUNT: usize = 128;

/// Parameters one control can drive at once.
pub const BINDINGS_PER_CONTROL: usize = 4;

type Binding = ArcSwapOption<Parameter>;

/// Control id to parameter table.
pub struct ControlMap {
    bindings: Box<[[Binding; BINDINGS_PER_CONTROL]]>,
    pending: Binding,
    /// Editor-side owners of every binding ever handed to the table.
    retained: Mutex<Vec<Arc<Parameter>>>,
}

impl ControlMap {
    /// Creates an empty table.
    pub fn new() -> Self {
        let bindings = (0..CONTROL_COUNT)
            .map(|_| std::array::from_fn(|_| ArcSwapOption::empty()))
            .collect();
        Self {
            bindings,
            pending: ArcSwapOption::empty(),
            retained: Mutex::new(Vec::new()),
        }
    }

    /// Binds `parameter` to `control`, removing any previous binding of the
    /// parameter. Returns `false` if the control id is out of range or all of
    /// its bindings are taken.
    pub fn assign(&self, control: u8, parameter: &Parameter) -> bool {
        let Some(entries) = self.bindings.get(usize::from(control)) else {
            return false;
        };
        self.unassign(parameter);
        let param = self.retain(parameter);
        if bind_first_free(entries, &param) {
            tracing::debug!(control, "parameter assigned to control");
            true
        } else {
            tracing::debug!(control, "control has no free binding");
            false
        }
    }

    /// Removes every binding of `parameter`, including a pending learn.
    /// Returns `true` if anything was removed.
    pub fn unassign(&self, parameter: &Parameter) -> bool {
        let mut removed = false;
        for entry in self.bindings.iter().flatten() {
            if holds(entry, parameter) {
                entry.store(None);
                removed = true;
            }
        }
        if holds(&self.pending, parameter) {
            self.pending.store(None);
            removed = true;
        }
        removed
    }

    /// Binds `parameter` to whichever control changes next.
    ///
    /// Any existing binding of the parameter is removed first. A later call
    /// replaces an unfinished request.
    pub fn learn(&self, parameter: &Parameter) {
        self.unassign(parameter);
        self.pending.store(Some(self.retain(parameter)));
        tracing::debug!("waiting for a control change to learn");
    }

    /// Cancels an unfinished learn request.
    pub fn cancel_learn(&self) {
        self.pending.store(None);
    }

    /// Whether a learn request is waiting for a control change.
    pub fn is_learning(&self) -> bool {
        self.pending.load().is_some()
    }

    /// Control currently driving `parameter`, if any.
    pub fn control_for(&self, parameter: &Parameter) -> Option<u8> {
        self.bindings.iter().enumerate().find_map(|(control, entries)| {
            entries
                .iter()
                .any(|e| holds(e, parameter))
                .then_some(control as u8)
        })
    }

    /// Number of parameters bound to `control`.
    pub fn binding_count(&self, control: u8) -> usize {
        self.bindings
            .get(usize::from(control))
            .map_or(0, |entries| entries.iter().filter(|e| e.load().is_some()).count())
    }

    /// Handles a control change on the audio thread.
    ///
    /// Completes a pending learn request on this control, then sets every
    /// bound parameter's normalized value to `value`. Returns the number of
    /// parameters updated.
    pub fn apply(&self, control: u8, value: f32) -> usize {
        let Some(entries) = self.bindings.get(usize::from(control)) else {
            return 0;
        };
        self.complete_learn(control, entries);

        let mut updated = 0;
        for entry in entries {
            let bound = entry.load();
            if let Some(parameter) = bound.as_deref() {
                parameter.set_normalized(value);
                updated += 1;
            }
        }
        updated
    }

    /// Removes every binding and any pending learn request.
    pub fn clear(&self) {
        for entry in self.bindings.iter().flatten() {
            entry.store(None);
        }
        self.pending.store(None);
        self.collect_garbage();
    }

    /// Frees removed bindings that no reader holds any more. Editor side only.
    ///
    /// A binding read by the audio thread while it was being removed stays
    /// parked until a later call. Returns the number freed.
    pub fn collect_garbage(&self) -> usize {
        let mut retained = self.retained.lock();
        let before = retained.len();
        retained.retain(|param| Arc::strong_count(param) > 1);
        before - retained.len()
    }

    fn retain(&self, parameter: &Parameter) -> Arc<Parameter> {
        self.collect_garbage();
        let param = Arc::new(parameter.clone());
        self.retained.lock().push(Arc::clone(&param));
        param
    }

    fn complete_learn(&self, control: u8, entries: &[Binding; BINDINGS_PER_CONTROL]) {
        let pending = self.pending.load_full();
        let Some(param) = &pending else {
            return;
        };
        if bind_first_free(entries, param) {
            // only clear the request we just served
            let _served = self.pending.compare_and_swap(&pending, None::<Arc<Parameter>>);
            tracing::trace!(control, "learned control");
        }
    }
}

impl Default for ControlMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ControlMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = self
            .bindings
            .iter()
            .flatten()
            .filter(|e| e.load().is_some())
            .count();
        f.debug_struct("ControlMap")
            .field("bound", &bound)
            .field("learning", &self.is_learning())
            .finish()
    }
}

fn holds(entry: &Binding, parameter: &Parameter) -> bool {
    entry.load().as_deref().is_some_and(|p| p.ptr_eq(parameter))
}

/// Stores `param` in the first empty entry. The caller keeps its own
/// reference, so a lost race never drops the last one here.
fn bind_first_free(entries: &[Binding; BINDINGS_PER_CONTROL], param: &Arc<Parameter>) -> bool {
    entries.iter().any(|entry| {
        let previous = entry.compare_and_swap(&None::<Arc<Parameter>>, Some(Arc::clone(param)));
        previous.is_none()
    })
}
