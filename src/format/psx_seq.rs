//! Sony PlayStation SEQ format
//!
//! SEQ is the sequence container produced by Sony's official sound tools.
//! It is close to a single-track Standard MIDI File with a custom header:
//!
//! - Header: 15 bytes, big-endian
//!   - `"pQES"` magic (4 bytes)
//!   - version (u32)
//!   - PPQN (u16)
//!   - initial tempo in microseconds per quarter note (u24)
//!   - time-signature numerator (u8)
//!   - time-signature denominator as a power of two (u8)
//! - Body: variable-length delta time before every event, MIDI status bytes
//!   with running status, `0xFF` meta events without length bytes.
//!
//! Loop points follow the common driver convention of CC 99 (begin, value =
//! repeat count, 0 = infinite) and CC 98 (end).

use num_traits::FromPrimitive;

use super::{SeqHeader, SequenceFormat, Step, StepControl, TrackCursor};
use crate::bytes::ByteSource;
use crate::model::{ControllerKind, Event};
use crate::{ChipseqError, Result};

/// Loop-begin controller number.
const CC_LOOP_BEGIN: u8 = 99;
/// Loop-end controller number.
const CC_LOOP_END: u8 = 98;

/// Sony PlayStation SEQ parser.
pub struct PsxSeqFormat;

impl PsxSeqFormat {
    /// Header size in bytes.
    pub const HEADER_SIZE: usize = 15;
    /// Highest PPQN value accepted as sane.
    const MAX_REASONABLE_PPQN: u16 = 960;

    fn meta(&self, cur: &mut TrackCursor<'_>, delta: u32) -> Result<Step> {
        let begin = cur.offset() - 1;
        let kind = cur.take_u8()?;
        match kind {
            0x2F => Ok(Step {
                ticks: delta,
                events: vec![Event::EndOfTrack],
                control: StepControl::EndOfTrack,
            }),
            0x51 => {
                let hi = cur.take_u8()? as u32;
                let mid = cur.take_u8()? as u32;
                let lo = cur.take_u8()? as u32;
                let usec = (hi << 16) | (mid << 8) | lo;
                Ok(Step::event(delta, Event::Tempo { usec_per_quarter: usec }))
            }
            0x58 => {
                let numer = cur.take_u8()?;
                let denom_pow = cur.take_u8()?;
                Ok(Step::event(
                    delta,
                    Event::TimeSignature {
                        numer,
                        denom: 1u8 << denom_pow.min(6),
                    },
                ))
            }
            other => {
                // SEQ metas carry no length byte, so an unknown kind leaves
                // the operand size unknowable. Truncate here.
                Err(ChipseqError::UnrecognizedOpcode {
                    opcode: other,
                    offset: begin,
                })
            }
        }
    }
}

impl SequenceFormat for PsxSeqFormat {
    fn name(&self) -> &'static str {
        "Sony PlayStation SEQ"
    }

    fn magic(&self) -> Option<&'static [u8]> {
        Some(b"pQES")
    }

    fn parse_header(&self, source: &ByteSource, base: usize) -> Result<SeqHeader> {
        let magic = source.read_bytes(base, 4)?;
        if magic != b"pQES" {
            return Err(ChipseqError::MalformedHeader(format!(
                "bad SEQ magic at {base:#x}"
            )));
        }
        let version = source.read_u32_be(base + 4)?;
        if version > 2 {
            return Err(ChipseqError::MalformedHeader(format!(
                "implausible SEQ version {version}"
            )));
        }
        let ppqn = source.read_u16_be(base + 8)?;
        if ppqn == 0 || ppqn > Self::MAX_REASONABLE_PPQN {
            return Err(ChipseqError::MalformedHeader(format!(
                "SEQ PPQN {ppqn} outside 1..={}",
                Self::MAX_REASONABLE_PPQN
            )));
        }
        let usec_per_quarter = source.read_u24_be(base + 10)?;
        if usec_per_quarter == 0 {
            return Err(ChipseqError::MalformedHeader(
                "SEQ initial tempo is zero".into(),
            ));
        }
        let numer = source.read_u8(base + 13)?;
        let denom_pow = source.read_u8(base + 14)?;
        if numer == 0 || denom_pow > 6 {
            return Err(ChipseqError::MalformedHeader(format!(
                "SEQ time signature {numer}/2^{denom_pow} is implausible"
            )));
        }
        let denom = 1u8 << denom_pow;

        Ok(SeqHeader {
            ppqn,
            usec_per_quarter,
            time_signature: (numer, denom),
            declared_length: None,
            track_offsets: vec![base + Self::HEADER_SIZE],
            events: vec![
                Event::TimeSignature { numer, denom },
                Event::Tempo { usec_per_quarter },
            ],
        })
    }

    fn step(&self, cur: &mut TrackCursor<'_>) -> Result<Step> {
        let delta = cur.take_vlq()?;
        let begin = cur.offset();
        let first = cur.peek_u8()?;

        let status = if first < 0x80 {
            cur.state.running_status.ok_or(ChipseqError::UnrecognizedOpcode {
                opcode: first,
                offset: begin,
            })?
        } else {
            cur.take_u8()?;
            if first != 0xFF {
                cur.state.running_status = Some(first);
            } else {
                // metas cancel running status, as in SMF
                cur.state.running_status = None;
            }
            first
        };

        match status & 0xF0 {
            0x80 => {
                let key = cur.take_u8()?;
                let _vel = cur.take_u8()?;
                Ok(Step::event(delta, Event::NoteOff { key }))
            }
            0x90 => {
                let key = cur.take_u8()?;
                let vel = cur.take_u8()?;
                cur.state.prev_note = key;
                if vel == 0 {
                    // note-on with velocity zero is the SEQ idiom for release
                    Ok(Step::event(delta, Event::NoteOff { key }))
                } else {
                    cur.state.prev_vel = vel;
                    Ok(Step::event(delta, Event::NoteOn { key, vel }))
                }
            }
            0xA0 => {
                let _key = cur.take_u8()?;
                let _pressure = cur.take_u8()?;
                Ok(Step::event(delta, Event::Unknown { opcode: status }))
            }
            0xB0 => {
                let cc = cur.take_u8()?;
                let value = cur.take_u8()?;
                match cc {
                    CC_LOOP_BEGIN => Ok(Step {
                        ticks: delta,
                        events: Vec::new(),
                        control: StepControl::LoopBegin {
                            count: if value == 0 { None } else { Some(value as u16) },
                        },
                    }),
                    CC_LOOP_END => Ok(Step {
                        ticks: delta,
                        events: Vec::new(),
                        control: StepControl::LoopEnd,
                    }),
                    _ => match ControllerKind::from_u8(cc) {
                        Some(kind) => Ok(Step::event(delta, Event::Controller { kind, value })),
                        None => Ok(Step::event(delta, Event::Unknown { opcode: cc })),
                    },
                }
            }
            0xC0 => {
                let program = cur.take_u8()?;
                Ok(Step::event(delta, Event::ProgramChange { program }))
            }
            0xD0 => {
                let _pressure = cur.take_u8()?;
                Ok(Step::event(delta, Event::Unknown { opcode: status }))
            }
            0xE0 => {
                let lsb = cur.take_u8()? as i16;
                let msb = cur.take_u8()? as i16;
                let value = ((msb << 7) | lsb) - 8192;
                Ok(Step::event(delta, Event::PitchBend { value }))
            }
            0xF0 if status == 0xFF => self.meta(cur, delta),
            _ => Err(ChipseqError::UnrecognizedOpcode {
                opcode: status,
                offset: begin,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackState;

    /// Valid 15-byte header: PPQN 0x30, tempo 500000 µs/qn, 4/4.
    fn header_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"pQES");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&0x30u16.to_be_bytes());
        data.extend_from_slice(&[0x07, 0xA1, 0x20]); // 500000
        data.push(4); // numerator
        data.push(2); // denominator 2^2 = 4
        data
    }

    #[test]
    fn test_header_parses_and_emits_time_signature() {
        let src = ByteSource::new(header_bytes());
        let header = PsxSeqFormat.parse_header(&src, 0).unwrap();
        assert_eq!(header.ppqn, 0x30);
        assert_eq!(header.usec_per_quarter, 500_000);
        assert_eq!(header.time_signature, (4, 4));
        assert_eq!(header.track_offsets, vec![15]);
        assert!(header
            .events
            .contains(&Event::TimeSignature { numer: 4, denom: 4 }));
    }

    #[test]
    fn test_header_rejects_bad_magic_and_zero_ppqn() {
        let mut bad_magic = header_bytes();
        bad_magic[0] = b'q';
        assert!(PsxSeqFormat
            .parse_header(&ByteSource::new(bad_magic), 0)
            .is_err());

        let mut zero_ppqn = header_bytes();
        zero_ppqn[8] = 0;
        zero_ppqn[9] = 0;
        assert!(PsxSeqFormat
            .parse_header(&ByteSource::new(zero_ppqn), 0)
            .is_err());
    }

    #[test]
    fn test_note_on_with_delta() {
        let src = ByteSource::new(vec![0x10, 0x90, 0x3C, 0x64]);
        let mut state = TrackState::new(0);
        let mut cur = TrackCursor::new(&src, 0, 4, &mut state);
        let step = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(step.ticks, 0x10);
        assert_eq!(step.events, vec![Event::NoteOn { key: 0x3C, vel: 0x64 }]);
        assert_eq!(state.running_status, Some(0x90));
    }

    #[test]
    fn test_running_status_reuses_note_on() {
        // 0x90 3C 64, then delta 0 + data bytes only
        let src = ByteSource::new(vec![0x00, 0x90, 0x3C, 0x64, 0x00, 0x3E, 0x50]);
        let mut state = TrackState::new(0);

        let mut cur = TrackCursor::new(&src, 0, 7, &mut state);
        PsxSeqFormat.step(&mut cur).unwrap();
        let mut cur = TrackCursor::new(&src, 0, 7, &mut state);
        let step = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(step.events, vec![Event::NoteOn { key: 0x3E, vel: 0x50 }]);
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let src = ByteSource::new(vec![0x00, 0x90, 0x3C, 0x00]);
        let mut state = TrackState::new(0);
        let mut cur = TrackCursor::new(&src, 0, 4, &mut state);
        let step = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(step.events, vec![Event::NoteOff { key: 0x3C }]);
    }

    #[test]
    fn test_meta_end_of_track() {
        let src = ByteSource::new(vec![0x00, 0xFF, 0x2F]);
        let mut state = TrackState::new(0);
        let mut cur = TrackCursor::new(&src, 0, 3, &mut state);
        let step = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(step.control, StepControl::EndOfTrack);
        assert_eq!(step.events, vec![Event::EndOfTrack]);
        // metas cancel running status
        assert_eq!(state.running_status, None);
    }

    #[test]
    fn test_loop_controllers_translate_to_control() {
        let src = ByteSource::new(vec![0x00, 0xB0, 99, 2, 0x00, 98, 0]);
        let mut state = TrackState::new(0);

        let mut cur = TrackCursor::new(&src, 0, 7, &mut state);
        let begin = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(begin.control, StepControl::LoopBegin { count: Some(2) });

        let mut cur = TrackCursor::new(&src, 0, 7, &mut state);
        let end = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(end.control, StepControl::LoopEnd);
    }

    #[test]
    fn test_unknown_meta_truncates() {
        let src = ByteSource::new(vec![0x00, 0xFF, 0x7F, 0x03]);
        let mut state = TrackState::new(0);
        let mut cur = TrackCursor::new(&src, 0, 4, &mut state);
        assert!(matches!(
            PsxSeqFormat.step(&mut cur),
            Err(ChipseqError::UnrecognizedOpcode { .. })
        ));
    }

    #[test]
    fn test_pitch_bend_centering() {
        let src = ByteSource::new(vec![0x00, 0xE0, 0x00, 0x40]);
        let mut state = TrackState::new(0);
        let mut cur = TrackCursor::new(&src, 0, 4, &mut state);
        let step = PsxSeqFormat.step(&mut cur).unwrap();
        assert_eq!(step.events, vec![Event::PitchBend { value: 0 }]);
    }
}
