//! End-to-end pipeline tests: heuristic discovery, document parsing and the
//! three-pass conversion, driven entirely through the public API.

use std::sync::Arc;

use chipseq::adpcm::psx::{PsxBlockFlags, BLOCK_SIZE, SAMPLES_PER_BLOCK};
use chipseq::format::generic::{build_gseq, GenericSeqFormat};
use chipseq::format::psx_seq::PsxSeqFormat;
use chipseq::model::{Sample, SampleCodec};
use chipseq::{
    convert_document, decode_sample, scan_psx_samples, scan_sequences, ByteSource, Document,
    Event, InterpConfig, ScanConfig, SequenceFormat, StandardEventKind,
};

fn generic_format() -> Arc<dyn SequenceFormat> {
    Arc::new(GenericSeqFormat)
}

/// A pQES image with the given event body appended after the 15-byte header.
fn pqes_image(ppqn: u16, body: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"pQES");
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&ppqn.to_be_bytes());
    data.extend_from_slice(&[0x07, 0xA1, 0x20]); // 120 BPM
    data.push(4);
    data.push(2);
    data.extend_from_slice(body);
    data
}

/// A plausible SPU sample bank: zero start marker plus `n` drifting blocks,
/// the last one flagged as the end.
fn sample_bank(n: usize) -> Vec<u8> {
    let mut data = vec![0u8; BLOCK_SIZE];
    for i in 0..n {
        let header = (1 << 4) | (i % 4) as u8;
        let flags = if i == n - 1 {
            PsxBlockFlags::END.bits()
        } else {
            0
        };
        data.push(header);
        data.push(flags);
        data.extend_from_slice(&[0x21; 14]);
    }
    data
}

#[test]
fn scan_parse_convert_roundtrip() -> anyhow::Result<()> {
    // a sequence buried in unrelated data, located by signature scan and
    // converted without ever touching the padding
    let image = build_gseq(
        48,
        &[&[0x30, 0x90, 60, 100, 0x10, 0x80, 60, 0xFF]],
    );
    let mut dump = vec![0xC3u8; 123];
    dump.extend_from_slice(&image);
    dump.extend(vec![0xC3; 57]);
    let source = ByteSource::new(dump);

    let format = generic_format();
    let found = scan_sequences(
        &source,
        &format,
        &ScanConfig::default(),
        &InterpConfig::default(),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].offset, 123);
    assert_eq!(found[0].length, image.len());

    let mut doc = Document::parse(source, found[0].offset, format)?;
    let conv = convert_document(&mut doc, &InterpConfig::default())?;

    assert_eq!(conv.durations, vec![0x40]);
    let events = &conv.standard[0].1;
    assert!(events.iter().any(|e| {
        e.tick == 0x30 && e.kind == StandardEventKind::NoteOn { key: 60, vel: 100 }
    }));
    assert!(events
        .iter()
        .any(|e| e.tick == 0x40 && e.kind == StandardEventKind::NoteOff { key: 60 }));
    assert_eq!(events.last().unwrap().kind, StandardEventKind::EndOfTrack);
    Ok(())
}

#[test]
fn psx_dialect_bounded_loop_and_header_events() -> anyhow::Result<()> {
    // controller 99/98 bracket a loop body of 0x10 ticks played three times
    // (initial pass plus the stored count)
    let body = [
        0x00, 0xB0, 99, 2, // loop begin, count 2
        0x10, 0xB0, 98, 0, // loop end after a 0x10-tick rest
        0x00, 0xFF, 0x2F, // end of track
    ];
    let image = pqes_image(0x30, &body);
    let mut doc = Document::parse(ByteSource::new(image), 0, Arc::new(PsxSeqFormat))?;
    let conv = convert_document(&mut doc, &InterpConfig::default())?;

    assert_eq!(conv.durations, vec![0x30]);
    // header tempo and time signature lead the stream
    let events = &conv.standard[0].1;
    assert_eq!(
        events[0].kind,
        StandardEventKind::TimeSignature { numer: 4, denom_pow: 2 }
    );
    assert_eq!(
        events[1].kind,
        StandardEventKind::Tempo { usec_per_quarter: 500_000 }
    );
    Ok(())
}

#[test]
fn infinite_loop_capped_at_twice_the_body() {
    // rest 0x20 then an absolute jump back to the track start; the model
    // pass annotates the loop, the measuring pass doubles the body
    let body = [0x20, 0xE2, 0x00, 15, 0xFF];
    let image = build_gseq(48, &[&body]);
    let source = ByteSource::new(image);

    let mut doc = Document::parse(source, 0, generic_format()).unwrap();
    let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();

    assert_eq!(conv.durations, vec![0x40]);
    assert_eq!(doc.tracks[0].loop_point, Some(15));
    assert!(doc.tracks[0]
        .events
        .iter()
        .any(|e| matches!(e.event, Event::LoopMarker { .. })));
}

#[test]
fn corrupt_track_truncates_but_converts() {
    let image = build_gseq(
        48,
        &[
            &[0x90, 60, 100, 0xEE], // dies on an undefined opcode
            &[0x10, 0x90, 62, 100, 0x10, 0x80, 62, 0xFF],
        ],
    );
    let mut doc = Document::parse(ByteSource::new(image), 0, generic_format()).unwrap();
    let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();

    assert!(doc.tracks[0].truncated);
    assert!(!doc.tracks[1].truncated);
    assert_eq!(conv.durations[1], 0x20);
    // both tracks still close properly
    for (_, events) in &conv.standard {
        assert_eq!(events.last().unwrap().kind, StandardEventKind::EndOfTrack);
    }
}

#[test]
fn sample_bank_discovered_and_decoded() {
    let bank = sample_bank(11);
    let mut dump = vec![0xF8u8; 96]; // implausible preamble
    dump.extend_from_slice(&bank);
    let source = ByteSource::new(dump);

    let found = scan_psx_samples(&source, &ScanConfig::default());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].offset, 96);
    assert_eq!(found[0].length, bank.len());

    let sample = Sample::new(
        found[0].offset,
        found[0].length,
        SampleCodec::PsxAdpcm,
        22_050,
    );
    let pcm = decode_sample(&sample, &source).unwrap();
    assert_eq!(pcm.samples.len(), 12 * SAMPLES_PER_BLOCK);
    assert_eq!(pcm.sample_rate, 22_050);
}

#[test]
fn pipeline_is_deterministic() {
    let image = build_gseq(
        96,
        &[
            &[0x10, 0x90, 60, 100, 0x20, 0x80, 60, 0xE0, 2, 0x08, 0xE1, 0xFF],
            &[0x40, 0xA0, 64, 90, 50, 0xFF],
        ],
    );
    let source = ByteSource::new(image);

    let run = || {
        let mut doc = Document::parse(source.clone(), 0, generic_format()).unwrap();
        let conv = convert_document(&mut doc, &InterpConfig::default()).unwrap();
        (conv.durations, conv.standard)
    };
    assert_eq!(run(), run());
}
