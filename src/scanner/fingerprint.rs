//! Statistical fingerprint scanning for headerless sample data
//!
//! Raw SPU sample banks have no magic bytes at all. What they do have is a
//! strong statistical shape: 16-byte blocks whose header byte's range and
//! filter nibbles drift slowly between neighbors, flag bytes confined to the
//! three defined bits, and the conventional all-zero start marker block.
//!
//! A position is accepted when it is a start marker, or when
//! `num_chunks_readahead` consecutive blocks keep their range/filter deltas
//! inside the configured bounds. The bounds were tuned empirically and vary
//! per title, which is why they live in [`ScanConfig`] rather than here.

use crate::adpcm::psx::{is_end_padding, is_start_marker, PsxBlockFlags, BLOCK_SIZE, FILTERS};
use crate::bytes::ByteSource;
use crate::config::ScanConfig;

/// One accepted sample-data candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCandidate {
    /// Absolute offset of the first block
    pub offset: usize,
    /// Length in bytes, a multiple of the block size
    pub length: usize,
}

/// Whether one block looks like plausible SPU data at all.
fn block_plausible(block: &[u8]) -> bool {
    let filter = (block[0] >> 4) as usize;
    let flags = block[1];
    filter < FILTERS.len() && flags <= PsxBlockFlags::all().bits()
}

/// Nibble deltas between two adjacent block headers, `(range, filter)`.
fn header_deltas(a: &[u8], b: &[u8]) -> (i32, i32) {
    let range = (b[0] & 0x0F) as i32 - (a[0] & 0x0F) as i32;
    let filter = (b[0] >> 4) as i32 - (a[0] >> 4) as i32;
    (range, filter)
}

/// Whether the readahead window starting at `pos` passes the delta bounds.
fn window_passes(source: &ByteSource, pos: usize, cfg: &ScanConfig) -> bool {
    let needed = cfg.num_chunks_readahead * BLOCK_SIZE;
    let Ok(window) = source.read_bytes(pos, needed) else {
        return false;
    };
    let mut blocks = window.chunks_exact(BLOCK_SIZE);
    let Some(mut prev) = blocks.next() else {
        return false;
    };
    if !block_plausible(prev) {
        return false;
    }
    for block in blocks {
        if !block_plausible(block) {
            return false;
        }
        let (range_diff, filter_diff) = header_deltas(prev, block);
        if range_diff < cfg.min_range_diff
            || range_diff > cfg.max_range_diff
            || filter_diff < cfg.min_filter_diff
            || filter_diff > cfg.max_filter_diff
        {
            return false;
        }
        prev = block;
    }
    true
}

/// Walk plausible blocks from `pos`, returning the candidate length in bytes.
fn extend_run(source: &ByteSource, pos: usize) -> usize {
    let mut cursor = pos;
    while let Ok(block) = source.read_bytes(cursor, BLOCK_SIZE) {
        if is_end_padding(block) {
            // padding is trimmed, not part of the sample
            break;
        }
        if !block_plausible(block) {
            break;
        }
        cursor += BLOCK_SIZE;
        if PsxBlockFlags::from_bits_truncate(block[1]).contains(PsxBlockFlags::END) {
            break;
        }
    }
    cursor - pos
}

/// Scan `source` for runs of SPU ADPCM blocks.
///
/// Matches are consumed greedily: after an accepted run the scan continues
/// past its end. Runs shorter than `min_sample_blocks` are rejected as noise.
/// Scanning is deterministic.
pub fn scan_psx_samples(source: &ByteSource, cfg: &ScanConfig) -> Vec<SampleCandidate> {
    let mut candidates = Vec::new();
    let mut pos = 0usize;

    while pos + BLOCK_SIZE <= source.len() {
        let block = match source.read_bytes(pos, BLOCK_SIZE) {
            Ok(b) => b,
            Err(_) => break,
        };

        let accepted = (is_start_marker(block) && block_plausible(block))
            || window_passes(source, pos, cfg);
        if !accepted {
            pos += BLOCK_SIZE;
            continue;
        }

        let length = extend_run(source, pos);
        if length / BLOCK_SIZE >= cfg.min_sample_blocks {
            candidates.push(SampleCandidate { offset: pos, length });
            pos += length;
        } else {
            pos += BLOCK_SIZE;
        }
    }
    candidates
}
