//! Three-pass conversion driver
//!
//! Runs the interpreter over every track of a document in a fixed order:
//!
//! 1. [`ReadMode::BuildModel`] — populate the per-track event model for
//!    inspection and finalize the document length.
//! 2. [`ReadMode::MeasureDuration`] — measure each track's bounded total
//!    tick length.
//! 3. [`ReadMode::EmitOutput`] — translate the abstract events into standard
//!    MIDI-like output with explicit note-off pairing.
//!
//! The decode logic exists once, in the interpreter; the passes differ only
//! in emission and loop policy, so the model, the durations and the exported
//! events cannot drift apart.

use crate::config::InterpConfig;
use crate::interp::{interpret, ReadMode};
use crate::model::{Document, Event, TimedEvent};
use crate::Result;

/// One event of the standard MIDI-like output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardEvent {
    /// Absolute tick position
    pub tick: u64,
    /// Event payload
    pub kind: StandardEventKind,
}

/// Payload of a [`StandardEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandardEventKind {
    /// Key down
    NoteOn {
        /// MIDI key
        key: u8,
        /// Velocity
        vel: u8,
    },
    /// Key up
    NoteOff {
        /// MIDI key
        key: u8,
    },
    /// Controller move, by raw controller number
    Controller {
        /// MIDI controller number
        controller: u8,
        /// 7-bit value
        value: u8,
    },
    /// Program select
    ProgramChange {
        /// Program number
        program: u8,
    },
    /// Pitch bend as an unsigned 14-bit value centered at 8192
    PitchBend {
        /// 0..=16383
        value: u16,
    },
    /// Tempo change
    Tempo {
        /// Microseconds per quarter note
        usec_per_quarter: u32,
    },
    /// Time signature; denominator as a power of two, SMF style
    TimeSignature {
        /// Beats per bar
        numer: u8,
        /// log2 of the beat unit
        denom_pow: u8,
    },
    /// Track end
    EndOfTrack,
}

/// Output of a full three-pass conversion.
#[derive(Debug)]
pub struct Conversion {
    /// Per-track bounded duration in ticks, in track order
    pub durations: Vec<u64>,
    /// `(track index, translated events)` per track
    pub standard: Vec<(usize, Vec<StandardEvent>)>,
}

/// Run all three passes over `doc`.
///
/// The document's tracks are updated in place with the BuildModel event
/// lists, measured durations and truncation flags; the returned
/// [`Conversion`] carries the export-side view.
pub fn convert_document(doc: &mut Document, cfg: &InterpConfig) -> Result<Conversion> {
    let format = doc.format.clone();

    // pass 1: UI model, annotations, length finalization
    let end = doc.end();
    for track in &mut doc.tracks {
        let result = interpret(
            format.as_ref(),
            &doc.source,
            doc.base,
            end,
            track.start_offset,
            ReadMode::BuildModel,
            cfg,
        );
        track.events = result.events;
        track.truncated = result.truncated;
        track.loop_point = result.loop_point;
        track.end_offset = result.end_offset;
    }
    doc.finalize_length();

    // pass 2: bounded duration
    let mut durations = Vec::with_capacity(doc.tracks.len());
    let end = doc.end();
    for track in &mut doc.tracks {
        let result = interpret(
            format.as_ref(),
            &doc.source,
            doc.base,
            end,
            track.start_offset,
            ReadMode::MeasureDuration,
            cfg,
        );
        track.duration_ticks = result.duration_ticks;
        durations.push(result.duration_ticks);
    }

    // pass 3: standard event emission
    let mut standard = Vec::with_capacity(doc.tracks.len());
    for (index, track) in doc.tracks.iter().enumerate() {
        let result = interpret(
            format.as_ref(),
            &doc.source,
            doc.base,
            doc.end(),
            track.start_offset,
            ReadMode::EmitOutput,
            cfg,
        );
        let mut prefix: Vec<TimedEvent> = Vec::new();
        if index == 0 {
            // header-level tempo/time signature lead the first track
            prefix.extend(doc.header_events.iter().cloned());
        }
        prefix.extend(result.events);
        standard.push((index, translate(&prefix)));
    }

    Ok(Conversion { durations, standard })
}

/// Boundary operation: three passes, returning only the standard streams.
pub fn convert_to_standard_events(
    doc: &mut Document,
) -> Result<Vec<(usize, Vec<StandardEvent>)>> {
    let cfg = InterpConfig::default();
    Ok(convert_document(doc, &cfg)?.standard)
}

/// Translate one track's abstract events into the standard stream.
///
/// `NoteWithDuration` becomes a note-on plus a deferred note-off; deferred
/// offs are merged back in tick order. Annotation-only events (loop markers,
/// unknown opcodes) carry no output meaning and are dropped.
fn translate(events: &[TimedEvent]) -> Vec<StandardEvent> {
    let mut out: Vec<StandardEvent> = Vec::with_capacity(events.len());
    // deferred note-offs, kept sorted by tick
    let mut pending: Vec<(u64, u8)> = Vec::new();
    let mut last_tick = 0u64;

    let mut flush_until = |tick: u64, pending: &mut Vec<(u64, u8)>, out: &mut Vec<StandardEvent>| {
        while let Some(&(off_tick, key)) = pending.first() {
            if off_tick > tick {
                break;
            }
            pending.remove(0);
            out.push(StandardEvent {
                tick: off_tick,
                kind: StandardEventKind::NoteOff { key },
            });
        }
    };

    for te in events {
        flush_until(te.tick, &mut pending, &mut out);
        last_tick = last_tick.max(te.tick);
        let kind = match &te.event {
            Event::NoteOn { key, vel } => StandardEventKind::NoteOn {
                key: *key,
                vel: *vel,
            },
            Event::NoteOff { key } => StandardEventKind::NoteOff { key: *key },
            Event::NoteWithDuration { key, vel, dur } => {
                let off_tick = te.tick + *dur as u64;
                let at = pending.partition_point(|&(t, _)| t <= off_tick);
                pending.insert(at, (off_tick, *key));
                StandardEventKind::NoteOn {
                    key: *key,
                    vel: *vel,
                }
            }
            Event::ProgramChange { program } => StandardEventKind::ProgramChange {
                program: *program,
            },
            Event::Controller { kind, value } => StandardEventKind::Controller {
                controller: *kind as u8,
                value: *value,
            },
            Event::PitchBend { value } => StandardEventKind::PitchBend {
                value: (*value + 8192).clamp(0, 16383) as u16,
            },
            Event::Tempo { usec_per_quarter } => StandardEventKind::Tempo {
                usec_per_quarter: *usec_per_quarter,
            },
            Event::TimeSignature { numer, denom } => StandardEventKind::TimeSignature {
                numer: *numer,
                denom_pow: denom.trailing_zeros() as u8,
            },
            Event::LoopMarker { .. } | Event::Unknown { .. } => continue,
            Event::EndOfTrack => continue, // appended once below
        };
        out.push(StandardEvent {
            tick: te.tick,
            kind,
        });
    }

    // release anything still held, then close the track
    let mut end_tick = last_tick;
    while let Some((off_tick, key)) = pending.first().copied() {
        pending.remove(0);
        end_tick = end_tick.max(off_tick);
        out.push(StandardEvent {
            tick: off_tick,
            kind: StandardEventKind::NoteOff { key },
        });
    }
    out.push(StandardEvent {
        tick: end_tick,
        kind: StandardEventKind::EndOfTrack,
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ByteSource;
    use crate::format::generic::{build_gseq, GenericSeqFormat};
    use crate::format::psx_seq::PsxSeqFormat;
    use std::sync::Arc;

    fn gseq_document(tracks: &[&[u8]]) -> Document {
        let image = build_gseq(48, tracks);
        Document::parse(ByteSource::new(image), 0, Arc::new(GenericSeqFormat)).unwrap()
    }

    #[test]
    fn test_three_passes_agree() {
        let mut doc = gseq_document(&[&[0x30, 0x90, 60, 100, 0x10, 0x80, 60, 0xFF]]);
        let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();

        assert_eq!(conv.durations, vec![0x40]);
        assert_eq!(doc.tracks[0].duration_ticks, 0x40);
        // the model pass saw the same notes the export pass emitted
        let model_notes = doc.tracks[0]
            .events
            .iter()
            .filter(|e| matches!(e.event, Event::NoteOn { .. }))
            .count();
        let std_notes = conv.standard[0]
            .1
            .iter()
            .filter(|e| matches!(e.kind, StandardEventKind::NoteOn { .. }))
            .count();
        assert_eq!(model_notes, std_notes);
    }

    #[test]
    fn test_note_with_duration_pairs_on_off() {
        let mut doc = gseq_document(&[&[0x30, 0xA0, 60, 100, 50, 0xFF]]);
        let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();
        let events = &conv.standard[0].1;

        let on = events
            .iter()
            .find(|e| matches!(e.kind, StandardEventKind::NoteOn { key: 60, .. }))
            .unwrap();
        let off = events
            .iter()
            .find(|e| matches!(e.kind, StandardEventKind::NoteOff { key: 60 }))
            .unwrap();
        assert_eq!(on.tick, 0x30);
        assert_eq!(off.tick, 0x30 + 24); // 48 * 50 / 100
        assert_eq!(
            events.last().unwrap().kind,
            StandardEventKind::EndOfTrack
        );
    }

    #[test]
    fn test_truncated_sibling_does_not_stop_others() {
        let mut doc = gseq_document(&[
            &[0x90, 60, 100, 0xEE], // malformed mid-track
            &[0x10, 0x90, 62, 100, 0x10, 0x80, 62, 0xFF],
        ]);
        let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();

        assert!(doc.tracks[0].truncated);
        assert_eq!(
            doc.tracks[0].events.last().unwrap().event,
            Event::EndOfTrack
        );
        assert!(!doc.tracks[1].truncated);
        assert_eq!(conv.durations[1], 0x20);
    }

    #[test]
    fn test_header_events_lead_first_track() {
        let mut seq = Vec::new();
        seq.extend_from_slice(b"pQES");
        seq.extend_from_slice(&1u32.to_be_bytes());
        seq.extend_from_slice(&0x30u16.to_be_bytes());
        seq.extend_from_slice(&[0x07, 0xA1, 0x20]);
        seq.push(4);
        seq.push(2);
        // delta 0, note on, delta 0x10, note off (vel 0), delta 0, end
        seq.extend_from_slice(&[0x00, 0x90, 60, 100, 0x10, 60, 0, 0x00, 0xFF, 0x2F]);

        let mut doc =
            Document::parse(ByteSource::new(seq), 0, Arc::new(PsxSeqFormat)).unwrap();
        let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();
        let events = &conv.standard[0].1;

        assert_eq!(
            events[0].kind,
            StandardEventKind::TimeSignature { numer: 4, denom_pow: 2 }
        );
        assert_eq!(
            events[1].kind,
            StandardEventKind::Tempo { usec_per_quarter: 500_000 }
        );
        assert!(events
            .iter()
            .any(|e| e.kind == StandardEventKind::NoteOff { key: 60 } && e.tick == 0x10));
    }

    #[test]
    fn test_pitch_bend_recentering() {
        let out = translate(&[
            TimedEvent::new(0, Event::PitchBend { value: 0 }),
            TimedEvent::new(0, Event::EndOfTrack),
        ]);
        assert_eq!(out[0].kind, StandardEventKind::PitchBend { value: 8192 });
    }
}
