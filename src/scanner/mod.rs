//! Heuristic discovery of embedded chunks
//!
//! Raw dumps rarely carry a reliable index of where sequences or sample
//! banks live, so candidates are located by sliding heuristics:
//!
//! - literal signature matching for formats with magic bytes, confirmed by a
//!   full header parse and self-consistency checks ([`scan_sequences`]);
//! - statistical fingerprints for headerless sample data
//!   ([`fingerprint::scan_psx_samples`]).
//!
//! Scanning is greedy left-to-right: an accepted candidate's resolved length
//! is skipped rather than re-tested byte by byte, and scanning the same
//! source twice yields an identical, order-preserved candidate list.

pub mod fingerprint;

pub use fingerprint::{scan_psx_samples, SampleCandidate};

use std::sync::Arc;

use crate::bytes::ByteSource;
use crate::config::{InterpConfig, ScanConfig};
use crate::format::SequenceFormat;
use crate::interp::{interpret, ReadMode};
use crate::model::Document;

/// One accepted sequence candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqCandidate {
    /// Absolute offset of the header
    pub offset: usize,
    /// Resolved byte length of the document
    pub length: usize,
    /// Name of the matching format
    pub format_name: &'static str,
}

/// Scan `source` for documents of `format`.
///
/// Every candidate position must survive a full header parse plus the
/// self-consistency checks before it is accepted; a rejected position only
/// advances the scan by one byte.
pub fn scan_sequences(
    source: &ByteSource,
    format: &Arc<dyn SequenceFormat>,
    scan: &ScanConfig,
    interp: &InterpConfig,
) -> Vec<SeqCandidate> {
    let Some(magic) = format.magic() else {
        log::debug!("format {} has no signature; nothing to scan for", format.name());
        return Vec::new();
    };

    let mut candidates = Vec::new();
    let mut pos = 0usize;
    while pos + magic.len() <= source.len() {
        if !source.matches_at(pos, magic) {
            pos += 1;
            continue;
        }
        match try_candidate(source, format, scan, interp, pos) {
            Some(length) => {
                candidates.push(SeqCandidate {
                    offset: pos,
                    length,
                    format_name: format.name(),
                });
                pos += length.max(1);
            }
            None => pos += 1,
        }
    }
    candidates
}

/// Parse a header at `offset` and resolve the candidate's length, or reject.
fn try_candidate(
    source: &ByteSource,
    format: &Arc<dyn SequenceFormat>,
    scan: &ScanConfig,
    interp_cfg: &InterpConfig,
    offset: usize,
) -> Option<usize> {
    let doc = match Document::parse(source.clone(), offset, format.clone()) {
        Ok(doc) => doc,
        Err(err) => {
            log::debug!("candidate at {offset:#x} rejected: {err}");
            return None;
        }
    };
    if doc.tracks.len() > scan.max_tracks {
        log::debug!(
            "candidate at {offset:#x} rejected: {} tracks exceed the configured bound",
            doc.tracks.len()
        );
        return None;
    }
    if let Some(length) = doc.length {
        return Some(length);
    }

    // headerless length: one model pass per track resolves how far the
    // streams actually reach
    let mut end = offset;
    for track in &doc.tracks {
        let result = interpret(
            doc.format.as_ref(),
            &doc.source,
            doc.base,
            doc.end(),
            track.start_offset,
            ReadMode::BuildModel,
            interp_cfg,
        );
        end = end.max(result.end_offset);
    }
    if end <= offset {
        return None;
    }
    Some(end - offset)
}
