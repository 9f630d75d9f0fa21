//! Discrete events delivered to the synthesizer.

/// A note or control event. Velocities and control values are normalized to
/// `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynthEvent {
    /// Key pressed.
    NoteOn {
        /// MIDI note number.
        note: u8,
        /// Attack velocity.
        velocity: f32,
    },
    /// Key released.
    NoteOff {
        /// MIDI note number.
        note: u8,
        /// Release velocity.
        velocity: f32,
    },
    /// Continuous controller moved.
    ControlChange {
        /// Controller number.
        control: u8,
        /// New value.
        value: f32,
    },
}

impl SynthEvent {
    /// Decodes a raw channel voice message, ignoring the channel.
    ///
    /// A note-on with velocity 0 is a note-off. Messages other than note on,
    /// note off and control change yield `None`.
    ///
    /// ```rust
    /// use gammou_synth::SynthEvent;
    ///
    /// assert_eq!(
    ///     SynthEvent::from_midi(&[0x91, 60, 127]),
    ///     Some(SynthEvent::NoteOn { note: 60, velocity: 1.0 })
    /// );
    /// assert!(matches!(
    ///     SynthEvent::from_midi(&[0x90, 60, 0]),
    ///     Some(SynthEvent::NoteOff { note: 60, .. })
    /// ));
    /// ```
    pub fn from_midi(bytes: &[u8]) -> Option<Self> {
        let [status, data1, data2, ..] = *bytes else {
            return None;
        };
        let (data1, value) = (data1 & 0x7F, f32::from(data2 & 0x7F) / 127.0);
        match status & 0xF0 {
            0x90 if value > 0.0 => Some(Self::NoteOn {
                note: data1,
                velocity: value,
            }),
            0x90 | 0x80 => Some(Self::NoteOff {
                note: data1,
                velocity: value,
            }),
            0xB0 => Some(Self::ControlChange {
                control: data1,
                value,
            }),
            _ => None,
        }
    }
}
