//! Driver-style reference format
//!
//! A compact format exercising the opcode-first shape most arcade and
//! console driver sequences take: no leading delta times, percentage note
//! durations, explicit loop opcodes and absolute jumps. It doubles as the
//! reference implementation of the [`SequenceFormat`] contract and as the
//! synthetic-fixture format for the interpreter and scanner tests.
//!
//! Header (little-endian):
//! - `"GSEQ"` magic (4 bytes)
//! - PPQN (u16)
//! - total document length in bytes (u32)
//! - track count (u8)
//! - one u32 track offset per track, relative to the header
//!
//! Opcodes:
//! - `0x00..=0x7F` — rest: advance time by the opcode value in ticks
//! - `0x80..=0x8F` — note-off; key operand
//! - `0x90..=0x9F` — note-on; key and velocity operands; subsequent data
//!   bytes reuse the status (running status)
//! - `0xA0` — note with duration; key, velocity, raw operands where the
//!   duration is `last_rest * raw / 100`, clamped to at least one tick
//! - `0xB0` — controller; kind and value operands
//! - `0xC0` — program change
//! - `0xD0` — tempo, BPM as u16 big-endian
//! - `0xD1` — time signature; numerator and denominator-power operands
//! - `0xE0` — loop begin; count operand (0 = infinite)
//! - `0xE1` — loop end
//! - `0xE2` — absolute jump, u16 big-endian offset relative to the header;
//!   backward targets are infinite loops
//! - `0xFF` — end of track
//!
//! Any other opcode is malformed data and truncates the track.

use num_traits::FromPrimitive;

use super::{SeqHeader, SequenceFormat, Step, StepControl, TrackCursor};
use crate::bytes::ByteSource;
use crate::model::{ControllerKind, Event};
use crate::{ChipseqError, Result};

/// Driver-style reference format.
pub struct GenericSeqFormat;

impl GenericSeqFormat {
    /// Fixed header bytes before the track offset table.
    pub const FIXED_HEADER_SIZE: usize = 11;
    /// Hard ceiling on the declared track count before the header is
    /// rejected outright (the scanner applies its own, tighter bound).
    const MAX_TRACKS: usize = 64;

    fn note_on(&self, cur: &mut TrackCursor<'_>) -> Result<Step> {
        let key = cur.take_u8()?;
        let vel = cur.take_u8()?;
        cur.state.prev_note = key;
        cur.state.prev_vel = vel;
        Ok(Step::event(0, Event::NoteOn { key, vel }))
    }
}

impl SequenceFormat for GenericSeqFormat {
    fn name(&self) -> &'static str {
        "Generic driver sequence"
    }

    fn magic(&self) -> Option<&'static [u8]> {
        Some(b"GSEQ")
    }

    fn parse_header(&self, source: &ByteSource, base: usize) -> Result<SeqHeader> {
        let magic = source.read_bytes(base, 4)?;
        if magic != b"GSEQ" {
            return Err(ChipseqError::MalformedHeader(format!(
                "bad GSEQ magic at {base:#x}"
            )));
        }
        let ppqn = source.read_u16_le(base + 4)?;
        if ppqn == 0 {
            return Err(ChipseqError::MalformedHeader("GSEQ PPQN is zero".into()));
        }
        let length = source.read_u32_le(base + 6)? as usize;
        if length < Self::FIXED_HEADER_SIZE || base + length > source.len() {
            return Err(ChipseqError::MalformedHeader(format!(
                "GSEQ declared length {length:#x} exceeds remaining source"
            )));
        }
        let track_count = source.read_u8(base + 10)? as usize;
        if track_count == 0 || track_count > Self::MAX_TRACKS {
            return Err(ChipseqError::MalformedHeader(format!(
                "GSEQ track count {track_count} outside 1..={}",
                Self::MAX_TRACKS
            )));
        }

        let table = base + Self::FIXED_HEADER_SIZE;
        let mut track_offsets = Vec::with_capacity(track_count);
        for i in 0..track_count {
            let rel = source.read_u32_le(table + i * 4)? as usize;
            let abs = base + rel;
            if rel < Self::FIXED_HEADER_SIZE + track_count * 4 || abs >= base + length {
                return Err(ChipseqError::MalformedHeader(format!(
                    "GSEQ track {i} offset {rel:#x} outside the document body"
                )));
            }
            track_offsets.push(abs);
        }

        Ok(SeqHeader {
            ppqn,
            usec_per_quarter: 500_000,
            time_signature: (4, 4),
            declared_length: Some(length),
            track_offsets,
            events: Vec::new(),
        })
    }

    fn step(&self, cur: &mut TrackCursor<'_>) -> Result<Step> {
        let begin = cur.offset();
        let opcode = cur.take_u8()?;

        // Running status: a data byte where an opcode is expected replays
        // the previous note-on status with this byte as the key.
        if opcode < 0x80 {
            if let Some(status) = cur.state.running_status {
                if (0x90..=0x9F).contains(&status) {
                    let vel = cur.take_u8()?;
                    cur.state.prev_note = opcode;
                    cur.state.prev_vel = vel;
                    return Ok(Step::event(0, Event::NoteOn { key: opcode, vel }));
                }
            }
            // rest
            cur.state.last_delta = opcode as u32;
            return Ok(Step::wait(opcode as u32));
        }

        match opcode {
            0x80..=0x8F => {
                let key = cur.take_u8()?;
                cur.state.running_status = None;
                Ok(Step::event(0, Event::NoteOff { key }))
            }
            0x90..=0x9F => {
                cur.state.running_status = Some(opcode);
                self.note_on(cur)
            }
            0xA0 => {
                let key = cur.take_u8()?;
                let vel = cur.take_u8()?;
                let raw = cur.take_u8()? as u32;
                let dur = (cur.state.last_delta * raw / 100).max(1);
                cur.state.prev_note = key;
                cur.state.prev_vel = vel;
                cur.state.prev_dur = dur;
                cur.state.running_status = None;
                Ok(Step::event(0, Event::NoteWithDuration { key, vel, dur }))
            }
            0xB0 => {
                let kind = cur.take_u8()?;
                let value = cur.take_u8()?;
                match ControllerKind::from_u8(kind) {
                    Some(kind) => Ok(Step::event(0, Event::Controller { kind, value })),
                    None => Ok(Step::event(0, Event::Unknown { opcode: kind })),
                }
            }
            0xC0 => {
                let program = cur.take_u8()?;
                Ok(Step::event(0, Event::ProgramChange { program }))
            }
            0xD0 => {
                let bpm = cur.take_u16_be()?;
                if bpm == 0 {
                    return Err(ChipseqError::UnrecognizedOpcode {
                        opcode,
                        offset: begin,
                    });
                }
                Ok(Step::event(
                    0,
                    Event::Tempo {
                        usec_per_quarter: 60_000_000 / bpm as u32,
                    },
                ))
            }
            0xD1 => {
                let numer = cur.take_u8()?;
                let denom_pow = cur.take_u8()?;
                Ok(Step::event(
                    0,
                    Event::TimeSignature {
                        numer,
                        denom: 1u8 << denom_pow.min(6),
                    },
                ))
            }
            0xE0 => {
                let count = cur.take_u8()?;
                Ok(Step::control(StepControl::LoopBegin {
                    count: if count == 0 { None } else { Some(count as u16) },
                }))
            }
            0xE1 => Ok(Step::control(StepControl::LoopEnd)),
            0xE2 => {
                let rel = cur.take_u16_be()? as usize;
                Ok(Step::control(StepControl::Jump {
                    target: cur.doc_base() + rel,
                }))
            }
            0xFF => Ok(Step {
                ticks: 0,
                events: vec![Event::EndOfTrack],
                control: StepControl::EndOfTrack,
            }),
            other => Err(ChipseqError::UnrecognizedOpcode {
                opcode: other,
                offset: begin,
            }),
        }
    }
}

/// Assemble a GSEQ image from track bodies; shared by the in-crate tests and
/// the integration suite.
#[cfg(any(test, feature = "scanner"))]
pub fn build_gseq(ppqn: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let table_len = tracks.len() * 4;
    let body_start = GenericSeqFormat::FIXED_HEADER_SIZE + table_len;
    let total = body_start + tracks.iter().map(|t| t.len()).sum::<usize>();

    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(b"GSEQ");
    data.extend_from_slice(&ppqn.to_le_bytes());
    data.extend_from_slice(&(total as u32).to_le_bytes());
    data.push(tracks.len() as u8);
    let mut offset = body_start;
    for t in tracks {
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += t.len();
    }
    for t in tracks {
        data.extend_from_slice(t);
    }
    data
}
