//! Abstract sequence events
//!
//! Every format's opcode handlers decode into this one event vocabulary; the
//! conversion driver translates it into standard MIDI-like output. Events are
//! produced append-only per track per pass and never mutated afterwards.

use num_derive::FromPrimitive;

/// Continuous-controller kinds shared across formats.
///
/// Discriminants follow the General MIDI controller numbers so that formats
/// which store raw CC bytes can map them with `FromPrimitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ControllerKind {
    /// Modulation wheel (CC 1)
    Modulation = 1,
    /// Channel volume (CC 7)
    Volume = 7,
    /// Pan position (CC 10)
    Pan = 10,
    /// Expression (CC 11)
    Expression = 11,
    /// Sustain pedal (CC 64)
    Sustain = 64,
}

/// One decoded track event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Key pressed with velocity. A paired [`Event::NoteOff`] is expected
    /// later in the stream.
    NoteOn {
        /// MIDI key number (0-127)
        key: u8,
        /// Velocity (0-127)
        vel: u8,
    },
    /// Key released.
    NoteOff {
        /// MIDI key number (0-127)
        key: u8,
    },
    /// Note with an explicit duration, used by driver formats that never emit
    /// a separate release opcode. The driver splits it into an on/off pair.
    NoteWithDuration {
        /// MIDI key number (0-127)
        key: u8,
        /// Velocity (0-127)
        vel: u8,
        /// Length of the note in ticks, always at least 1
        dur: u32,
    },
    /// Instrument/program select.
    ProgramChange {
        /// Program number (0-127)
        program: u8,
    },
    /// Continuous controller change.
    Controller {
        /// Which controller moved
        kind: ControllerKind,
        /// New 7-bit value
        value: u8,
    },
    /// Pitch-bend, centered at 0, range ±8192 (14-bit).
    PitchBend {
        /// Signed bend amount
        value: i16,
    },
    /// Tempo change.
    Tempo {
        /// Microseconds per quarter note
        usec_per_quarter: u32,
    },
    /// Time-signature change.
    TimeSignature {
        /// Beats per bar
        numer: u8,
        /// Beat unit (already expanded from power-of-two encodings)
        denom: u8,
    },
    /// Annotation for an infinite loop discovered under `BuildModel`: the
    /// stream jumps back to `target` forever.
    LoopMarker {
        /// Absolute offset of the loop body start
        target: usize,
    },
    /// Opcode the format recognizes but has no musical meaning for; kept so
    /// the UI model shows every byte accounted for.
    Unknown {
        /// The raw opcode byte
        opcode: u8,
    },
    /// Track end, either read from the stream or synthesized on truncation
    /// and forced loop termination.
    EndOfTrack,
}

/// An [`Event`] stamped with its absolute tick position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    /// Absolute position in ticks from the start of the track
    pub tick: u64,
    /// The decoded event
    pub event: Event,
}

impl TimedEvent {
    /// Stamp an event at `tick`.
    pub fn new(tick: u64, event: Event) -> Self {
        TimedEvent { tick, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_controller_kind_from_cc_number() {
        assert_eq!(ControllerKind::from_u8(7), Some(ControllerKind::Volume));
        assert_eq!(ControllerKind::from_u8(10), Some(ControllerKind::Pan));
        assert_eq!(ControllerKind::from_u8(64), Some(ControllerKind::Sustain));
        assert_eq!(ControllerKind::from_u8(3), None);
    }
}
