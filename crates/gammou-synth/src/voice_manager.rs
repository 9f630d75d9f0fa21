//! Voice lifecycle manager.
//!
//! Tracks a fixed pool of voice slots and maps notes onto them. Slots are kept
//! in one array partitioned into three contiguous zones:
//!
//! ```text
//! [ on ... | decaying ... | free ... ]
//!   0      on_end         active_end  voice_count
//! ```
//!
//! Every transition is a swap plus a boundary move, so `note_on`, `note_off`
//! and retirement are O(1) apart from the note lookup, and iteration touches
//! only active voices. Nothing allocates after construction.

/// Index of a voice slot, `0..voice_count`.
pub type VoiceId = usize;

/// Lifecycle state of one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Not allocated.
    Free,
    /// Holding a note; gate open.
    On,
    /// Note released, still sounding.
    Decaying,
}

/// Fixed-size voice pool.
///
/// # Example
///
/// ```rust
/// use gammou_synth::{VoiceManager, VoiceState};
///
/// let mut voices = VoiceManager::new(2);
/// let a = voices.note_on(60).unwrap();
/// let b = voices.note_on(64).unwrap();
/// assert_ne!(a, b);
/// assert_eq!(voices.note_on(67), None);
///
/// assert_eq!(voices.note_off(60), Some(a));
/// assert_eq!(voices.state(a), VoiceState::Decaying);
///
/// // retire the released voice once it has gone silent
/// voices.foreach_active_voice(|v| v != a);
/// assert_eq!(voices.state(a), VoiceState::Free);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceManager {
    /// Voice ids in zone order.
    slots: Vec<VoiceId>,
    /// Position of each voice in `slots`.
    position: Vec<usize>,
    notes: Vec<u8>,
    /// Trigger order of each voice's current note.
    stamps: Vec<u64>,
    on_end: usize,
    active_end: usize,
    clock: u64,
}

impl VoiceManager {
    /// Creates a pool of `voice_count` free voices.
    pub fn new(voice_count: usize) -> Self {
        Self {
            slots: (0..voice_count).collect(),
            position: (0..voice_count).collect(),
            notes: vec![0; voice_count],
            stamps: vec![0; voice_count],
            on_end: 0,
            active_end: 0,
            clock: 0,
        }
    }

    /// Assigns a free voice to `note` and marks it on.
    ///
    /// Returns `None` when every voice is on or decaying. Free voices are
    /// taken from the front of the free zone, so allocation is deterministic
    /// for a given event history.
    pub fn note_on(&mut self, note: u8) -> Option<VoiceId> {
        if self.active_end == self.slots.len() {
            return None;
        }
        let voice = self.slots[self.active_end];
        self.swap(self.active_end, self.on_end);
        self.on_end += 1;
        self.active_end += 1;

        self.clock += 1;
        self.notes[voice] = note;
        self.stamps[voice] = self.clock;
        Some(voice)
    }

    /// Releases the voice holding `note`, moving it to the decaying zone.
    ///
    /// If the note was triggered several times without a release, the most
    /// recently triggered voice is released first. Returns `None` if no voice
    /// is on for that note.
    pub fn note_off(&mut self, note: u8) -> Option<VoiceId> {
        let pos = (0..self.on_end)
            .filter(|&p| self.notes[self.slots[p]] == note)
            .max_by_key(|&p| self.stamps[self.slots[p]])?;
        let voice = self.slots[pos];
        self.release_at(pos);
        Some(voice)
    }

    /// Calls `f` for every on or decaying voice; voices for which it returns
    /// `false` are freed immediately.
    ///
    /// The active set may only change through the return value of `f`.
    pub fn foreach_active_voice(&mut self, mut f: impl FnMut(VoiceId) -> bool) {
        let mut pos = 0;
        while pos < self.active_end {
            if f(self.slots[pos]) {
                pos += 1;
            } else {
                // an unvisited voice is swapped into `pos`
                self.retire_at(pos);
            }
        }
    }

    /// Frees the decaying voice whose note was triggered earliest.
    ///
    /// Used by an overflow policy that steals released voices. Returns the
    /// freed voice, or `None` if nothing is decaying.
    pub fn retire_decaying(&mut self) -> Option<VoiceId> {
        let pos = (self.on_end..self.active_end).min_by_key(|&p| self.stamps[self.slots[p]])?;
        let voice = self.slots[pos];
        self.retire_at(pos);
        Some(voice)
    }

    /// Frees every voice.
    pub fn reset(&mut self) {
        self.on_end = 0;
        self.active_end = 0;
    }

    /// State of one voice. Out-of-range ids read as free.
    pub fn state(&self, voice: VoiceId) -> VoiceState {
        match self.position.get(voice) {
            Some(&p) if p < self.on_end => VoiceState::On,
            Some(&p) if p < self.active_end => VoiceState::Decaying,
            _ => VoiceState::Free,
        }
    }

    /// Note held by a voice, if it is on or decaying.
    pub fn note(&self, voice: VoiceId) -> Option<u8> {
        (self.state(voice) != VoiceState::Free).then(|| self.notes[voice])
    }

    /// Number of on or decaying voices.
    pub fn active_count(&self) -> usize {
        self.active_end
    }

    /// Number of on voices.
    pub fn on_count(&self) -> usize {
        self.on_end
    }

    /// Size of the pool.
    pub fn voice_count(&self) -> usize {
        self.slots.len()
    }

    /// Active voices in zone order: on voices first, then decaying.
    pub fn active_voices(&self) -> &[VoiceId] {
        &self.slots[..self.active_end]
    }

    /// Moves the on voice at `pos` to the front of the decaying zone.
    fn release_at(&mut self, pos: usize) {
        debug_assert!(pos < self.on_end);
        self.on_end -= 1;
        self.swap(pos, self.on_end);
    }

    /// Frees the active voice at `pos`, releasing it first if it is on.
    fn retire_at(&mut self, mut pos: usize) {
        debug_assert!(pos < self.active_end);
        if pos < self.on_end {
            self.release_at(pos);
            pos = self.on_end;
        }
        self.active_end -= 1;
        self.swap(pos, self.active_end);
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
        self.position[self.slots[a]] = a;
        self.position[self.slots[b]] = b;
    }
}
