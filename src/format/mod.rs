//! Format capability and decode cursor
//!
//! Dozens of sound drivers share one interpretation model but differ in their
//! opcode tables. Each format implements [`SequenceFormat`]: a header parser
//! plus a single-step opcode handler. The interpreter owns everything the
//! formats have in common — time accounting, the loop stack, jump policy,
//! truncation — so a format only translates bytes into [`Event`]s and
//! [`StepControl`] requests.
//!
//! Two formats ship in-tree as worked examples of the contract:
//! - [`psx_seq::PsxSeqFormat`] — Sony PlayStation SEQ (`"pQES"`), an SMF-like
//!   stream with leading delta times and running status.
//! - [`generic::GenericSeqFormat`] — a compact driver-style format
//!   (opcode-first, percentage durations, explicit loop opcodes) modeling the
//!   shape most arcade drivers take.

pub mod generic;
pub mod psx_seq;

use crate::bytes::ByteSource;
use crate::model::{Event, TrackState};
use crate::{ChipseqError, Result};

/// Header-level facts a format extracts before any track is interpreted.
#[derive(Debug, Clone)]
pub struct SeqHeader {
    /// Pulses per quarter note
    pub ppqn: u16,
    /// Initial tempo in microseconds per quarter note
    pub usec_per_quarter: u32,
    /// Initial time signature
    pub time_signature: (u8, u8),
    /// Total document length in bytes when the header declares one
    pub declared_length: Option<usize>,
    /// Absolute start offset of every track's opcode stream
    pub track_offsets: Vec<usize>,
    /// Events the header itself carries (tempo, time signature), emitted at
    /// tick 0
    pub events: Vec<Event>,
}

/// What a single opcode dispatch asks the interpreter to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepControl {
    /// Keep stepping from the current cursor
    Continue,
    /// Open a loop; the body replays `count` additional times, or forever
    /// when `count` is `None`
    LoopBegin {
        /// Additional replays of the body; `None` marks an infinite loop
        count: Option<u16>,
    },
    /// Close the innermost bounded loop
    LoopEnd,
    /// Move the cursor to an absolute offset; backward targets are treated as
    /// infinite loops
    Jump {
        /// Absolute target offset
        target: usize,
    },
    /// Explicit end of the track
    EndOfTrack,
}

/// Result of decoding one opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Ticks to elapse before the events take effect
    pub ticks: u32,
    /// Events produced at the post-delta time
    pub events: Vec<Event>,
    /// Control-flow request
    pub control: StepControl,
}

impl Step {
    /// A step that only advances time.
    pub fn wait(ticks: u32) -> Self {
        Step {
            ticks,
            events: Vec::new(),
            control: StepControl::Continue,
        }
    }

    /// A step emitting one event after `ticks`.
    pub fn event(ticks: u32, event: Event) -> Self {
        Step {
            ticks,
            events: vec![event],
            control: StepControl::Continue,
        }
    }

    /// A control-flow step with no time or events.
    pub fn control(control: StepControl) -> Self {
        Step {
            ticks: 0,
            events: Vec::new(),
            control,
        }
    }
}

/// One format's parsing capability.
pub trait SequenceFormat: Send + Sync {
    /// Human-readable format name.
    fn name(&self) -> &'static str;

    /// Fixed magic bytes for the literal-signature scanner, when the format
    /// has a header at all.
    fn magic(&self) -> Option<&'static [u8]> {
        None
    }

    /// Parse the header at `base` and describe the document.
    fn parse_header(&self, source: &ByteSource, base: usize) -> Result<SeqHeader>;

    /// Decode exactly one opcode (plus its operands and any leading delta
    /// time) at the cursor.
    ///
    /// On success the cursor has advanced past every byte consumed. An
    /// unrecognized opcode is reported as
    /// [`ChipseqError::UnrecognizedOpcode`]; the interpreter converts that
    /// into a synthesized end-of-track.
    fn step(&self, cur: &mut TrackCursor<'_>) -> Result<Step>;
}

/// Advancing, bounds-checked reader over one track's slice of a document.
///
/// All reads are bounded by the document's end, not the byte source's, so a
/// track can never escape the region its header claimed.
pub struct TrackCursor<'a> {
    source: &'a ByteSource,
    doc_base: usize,
    doc_end: usize,
    /// Mutable per-track running state, owned by the interpreter pass
    pub state: &'a mut TrackState,
}

impl<'a> TrackCursor<'a> {
    /// New cursor over `[doc_base, doc_end)`.
    pub fn new(
        source: &'a ByteSource,
        doc_base: usize,
        doc_end: usize,
        state: &'a mut TrackState,
    ) -> Self {
        TrackCursor {
            source,
            doc_base,
            doc_end,
            state,
        }
    }

    /// Current read offset.
    pub fn offset(&self) -> usize {
        self.state.cursor
    }

    /// First offset of the document, the base for absolute jump operands.
    pub fn doc_base(&self) -> usize {
        self.doc_base
    }

    /// Exclusive end of the readable region.
    pub fn doc_end(&self) -> usize {
        self.doc_end
    }

    fn check(&self, width: usize) -> Result<()> {
        let offset = self.state.cursor;
        if offset
            .checked_add(width)
            .is_none_or(|end| end > self.doc_end)
        {
            return Err(ChipseqError::OutOfRange {
                offset,
                width,
                size: self.doc_end,
            });
        }
        Ok(())
    }

    /// Read one byte without advancing.
    pub fn peek_u8(&self) -> Result<u8> {
        self.check(1)?;
        self.source.read_u8(self.state.cursor)
    }

    /// Read one byte and advance.
    pub fn take_u8(&mut self) -> Result<u8> {
        let b = self.peek_u8()?;
        self.state.cursor += 1;
        Ok(b)
    }

    /// Read a big-endian u16 and advance.
    pub fn take_u16_be(&mut self) -> Result<u16> {
        self.check(2)?;
        let v = self.source.read_u16_be(self.state.cursor)?;
        self.state.cursor += 2;
        Ok(v)
    }

    /// Read a little-endian u16 and advance.
    pub fn take_u16_le(&mut self) -> Result<u16> {
        self.check(2)?;
        let v = self.source.read_u16_le(self.state.cursor)?;
        self.state.cursor += 2;
        Ok(v)
    }

    /// Read a MIDI variable-length quantity (1-4 bytes) and advance.
    pub fn take_vlq(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let b = self.take_u8()?;
            value = (value << 7) | (b & 0x7F) as u32;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ChipseqError::MalformedHeader(format!(
            "variable-length quantity longer than 4 bytes at {:#x}",
            self.state.cursor
        )))
    }
}
