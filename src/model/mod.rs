//! Parsed object graph
//!
//! A [`Document`] is one parsed sequence file: a view into a [`ByteSource`]
//! plus the header-level defaults and the per-channel [`Track`] summaries. A
//! document owns its tracks exclusively; abandoning a document mid-parse
//! discards the partial graph with no other side effects.

mod event;
mod sample;
mod track;

pub use event::{ControllerKind, Event, TimedEvent};
pub use sample::{Adsr, EnvelopeTimes, Instrument, Region, Sample, SampleCodec};
pub use track::{LoopFrame, Track, TrackFlags, TrackState};

use std::sync::Arc;

use crate::bytes::ByteSource;
use crate::format::SequenceFormat;
use crate::{ChipseqError, Result};

/// One parsed sequence file.
pub struct Document {
    /// Backing byte region (possibly shared with other documents)
    pub source: ByteSource,
    /// Absolute offset of the header inside `source`
    pub base: usize,
    /// Byte length; `None` until the first full pass finalizes it or the
    /// header declares it
    pub length: Option<usize>,
    /// Pulses per quarter note
    pub ppqn: u16,
    /// Initial tempo in microseconds per quarter note
    pub usec_per_quarter: u32,
    /// Initial time signature
    pub time_signature: (u8, u8),
    /// Events the header itself produced (time signature, tempo), stamped at
    /// tick 0
    pub header_events: Vec<TimedEvent>,
    /// Per-channel summaries, in header order
    pub tracks: Vec<Track>,
    /// The format that parses this document
    pub format: Arc<dyn SequenceFormat>,
}

impl Document {
    /// Parse the header at `base` and build the track list.
    ///
    /// Fails with [`ChipseqError::MalformedHeader`] when the header is
    /// unreadable or self-inconsistent; the caller treats that as fatal to
    /// this candidate only.
    pub fn parse(
        source: ByteSource,
        base: usize,
        format: Arc<dyn SequenceFormat>,
    ) -> Result<Document> {
        let header = format.parse_header(&source, base)?;

        if let Some(len) = header.declared_length {
            if len == 0 || base + len > source.len() {
                return Err(ChipseqError::MalformedHeader(format!(
                    "declared length {len:#x} exceeds remaining source at {base:#x}"
                )));
            }
        }
        if header.track_offsets.is_empty() {
            return Err(ChipseqError::MalformedHeader(format!(
                "{} header at {base:#x} declares no tracks",
                format.name()
            )));
        }
        for &off in &header.track_offsets {
            if off < base || off >= source.len() {
                return Err(ChipseqError::MalformedHeader(format!(
                    "track offset {off:#x} outside [{base:#x}, {:#x})",
                    source.len()
                )));
            }
        }

        let tracks = header.track_offsets.iter().map(|&o| Track::new(o)).collect();
        Ok(Document {
            source,
            base,
            length: header.declared_length,
            ppqn: header.ppqn,
            usec_per_quarter: header.usec_per_quarter,
            time_signature: header.time_signature,
            header_events: header
                .events
                .into_iter()
                .map(|e| TimedEvent::new(0, e))
                .collect(),
            tracks,
            format,
        })
    }

    /// Exclusive end offset the interpreter must not read past.
    pub fn end(&self) -> usize {
        match self.length {
            Some(len) => (self.base + len).min(self.source.len()),
            None => self.source.len(),
        }
    }

    /// Finalize the document length from the furthest offset any track
    /// consumed, unless the header already declared one.
    pub fn finalize_length(&mut self) {
        if self.length.is_some() {
            return;
        }
        let max_end = self.tracks.iter().map(|t| t.end_offset).max();
        if let Some(end) = max_end {
            if end > self.base {
                self.length = Some(end - self.base);
            }
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("format", &self.format.name())
            .field("base", &self.base)
            .field("length", &self.length)
            .field("ppqn", &self.ppqn)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}
