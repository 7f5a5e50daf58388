//! Per-track state
//!
//! [`TrackState`] is the scratch state one interpreter pass threads through
//! every opcode handler: read cursor, elapsed time, the running defaults that
//! note opcodes fall back on, and the loop stack. It is rebuilt from scratch
//! at the start of each pass, which is what makes re-interpretation under a
//! different [`crate::ReadMode`] sound.
//!
//! [`Track`] is the durable per-channel summary a document keeps: where the
//! channel starts and what the passes found out about it.

use bitflags::bitflags;

use crate::model::TimedEvent;

bitflags! {
    /// Boolean running state carried between note opcodes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackFlags: u8 {
        /// Sustain pedal held
        const SUSTAIN = 1 << 0;
        /// Next note slurs into the previous one (no retrigger)
        const SLUR = 1 << 1;
    }
}

/// One bounded-loop activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    /// Offset of the first byte of the loop body (just past the loop-begin
    /// opcode and its operands)
    pub return_offset: usize,
    /// Replays still owed; the body runs `count + 1` times in total. `None`
    /// marks an infinite loop, which the interpreter bounds per read mode.
    pub remaining: Option<u16>,
}

/// Scratch state for one interpreter pass over one track.
#[derive(Debug, Clone)]
pub struct TrackState {
    /// Current read offset into the byte source
    pub cursor: usize,
    /// Elapsed time in ticks
    pub ticks: u64,
    /// Key of the previous note, reused by formats whose note opcodes omit it
    pub prev_note: u8,
    /// Previous note duration in ticks, the fallback when a duration byte is
    /// omitted
    pub prev_dur: u32,
    /// Previous velocity, the fallback when a velocity byte is omitted
    pub prev_vel: u8,
    /// Current octave for formats that address notes relative to an octave
    /// register
    pub octave: u8,
    /// MIDI-style running status: the last status byte seen, applied when a
    /// data byte arrives where an opcode was expected
    pub running_status: Option<u8>,
    /// Sustain/slur flags
    pub flags: TrackFlags,
    /// Last explicit wait/delta value, used by percentage-duration formats
    pub last_delta: u32,
    /// Active bounded loops, innermost last
    pub loop_stack: Vec<LoopFrame>,
    /// Target of the first backward jump seen; set once and reused so
    /// repeated arrivals count against one loop bound
    pub infinite_loop_at: Option<usize>,
}

impl TrackState {
    /// Fresh state positioned at `start`.
    pub fn new(start: usize) -> Self {
        TrackState {
            cursor: start,
            ticks: 0,
            prev_note: 0,
            prev_dur: 0,
            prev_vel: 100,
            octave: 4,
            running_status: None,
            flags: TrackFlags::default(),
            last_delta: 0,
            loop_stack: Vec::new(),
            infinite_loop_at: None,
        }
    }

    /// Advance elapsed time.
    pub fn add_time(&mut self, ticks: u32) {
        self.ticks += ticks as u64;
    }
}

/// Durable per-channel summary owned by a document.
#[derive(Debug, Clone)]
pub struct Track {
    /// Absolute offset where the channel's opcode stream begins
    pub start_offset: usize,
    /// Events collected by the last `BuildModel` pass
    pub events: Vec<TimedEvent>,
    /// Total tick length measured by the last `MeasureDuration` pass
    pub duration_ticks: u64,
    /// Whether the stream ended on malformed data rather than an explicit
    /// end-of-track opcode
    pub truncated: bool,
    /// Infinite-loop body offset, if one was annotated
    pub loop_point: Option<usize>,
    /// Offset one past the last byte any pass consumed
    pub end_offset: usize,
}

impl Track {
    /// New track summary with nothing measured yet.
    pub fn new(start_offset: usize) -> Self {
        Track {
            start_offset,
            events: Vec::new(),
            duration_ticks: 0,
            truncated: false,
            loop_point: None,
            end_offset: start_offset,
        }
    }
}
