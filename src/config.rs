//! Configuration tunables
//!
//! Scanner fingerprint tolerances and interpreter loop bounds were tuned
//! empirically against real game rips, and different titles want different
//! values. They are therefore carried as configuration, not as constants baked
//! into the handlers. Both structs serialize to/from JSON so a caller can keep
//! per-title override files.

use serde::{Deserialize, Serialize};

use crate::{ChipseqError, Result};

/// Tunables for the heuristic scanners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on a header's declared track count before the candidate is
    /// rejected as noise.
    pub max_tracks: usize,
    /// Minimum accepted change of the PSX range nibble between adjacent
    /// blocks of a sample candidate.
    pub min_range_diff: i32,
    /// Maximum accepted change of the PSX range nibble between adjacent
    /// blocks of a sample candidate.
    pub max_range_diff: i32,
    /// Minimum accepted change of the PSX filter nibble between adjacent
    /// blocks.
    pub min_filter_diff: i32,
    /// Maximum accepted change of the PSX filter nibble between adjacent
    /// blocks.
    pub max_filter_diff: i32,
    /// How many consecutive 16-byte blocks must pass the nibble-delta test
    /// before an unmarked region is accepted as sample data.
    pub num_chunks_readahead: usize,
    /// Minimum accepted sample length in blocks; shorter runs are noise.
    pub min_sample_blocks: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            max_tracks: 32,
            min_range_diff: -6,
            max_range_diff: 6,
            min_filter_diff: -5,
            max_filter_diff: 5,
            num_chunks_readahead: 10,
            min_sample_blocks: 4,
        }
    }
}

/// Tunables for the track interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpConfig {
    /// How many times an infinite loop body is unrolled under
    /// `MeasureDuration` / `EmitOutput` before a synthetic end-of-track is
    /// forced.
    pub max_loop_expansions: u32,
    /// Sanity window for jump targets: a jump traveling further than this
    /// many bytes from the opcode is treated as malformed rather than
    /// followed. Tuned per title in practice.
    pub jump_tolerance: usize,
    /// Hard cap on interpreter steps per pass, a backstop against pathological
    /// streams that advance neither cursor nor time.
    pub max_steps: usize,
}

impl Default for InterpConfig {
    fn default() -> Self {
        InterpConfig {
            max_loop_expansions: 2,
            jump_tolerance: 0x1000,
            max_steps: 1_000_000,
        }
    }
}

impl ScanConfig {
    /// Load overrides from a JSON document; missing fields keep defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ChipseqError::Config(e.to_string()))
    }
}

impl InterpConfig {
    /// Load overrides from a JSON document; missing fields keep defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ChipseqError::Config(e.to_string()))
    }
}
