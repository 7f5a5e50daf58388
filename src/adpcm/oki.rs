//! OKI/Dialogic-style 4-bit ADPCM
//!
//! The classic 12-bit ADPCM scheme used by OKI MSM-family chips in arcade
//! hardware. Each nibble indexes a per-step difference table; the step size
//! follows a geometric progression (`16 * 1.1^step`, 49 steps) and the step
//! index moves by a fixed shift per nibble magnitude.
//!
//! The difference table is computed once on first use and immutable after.

use std::sync::LazyLock;

/// Number of step-size entries.
pub const STEP_COUNT: usize = 49;

/// Signal clamp range: 12-bit signed.
pub const SIGNAL_MIN: i32 = -2048;
/// Upper signal clamp.
pub const SIGNAL_MAX: i32 = 2047;

/// Per-nibble sign and bit weights: `[sign, weight(4), weight(2), weight(1)]`.
const NIBBLE_WEIGHTS: [[i32; 4]; 16] = [
    [1, 0, 0, 0],
    [1, 0, 0, 1],
    [1, 0, 1, 0],
    [1, 0, 1, 1],
    [1, 1, 0, 0],
    [1, 1, 0, 1],
    [1, 1, 1, 0],
    [1, 1, 1, 1],
    [-1, 0, 0, 0],
    [-1, 0, 0, 1],
    [-1, 0, 1, 0],
    [-1, 0, 1, 1],
    [-1, 1, 0, 0],
    [-1, 1, 0, 1],
    [-1, 1, 1, 0],
    [-1, 1, 1, 1],
];

/// Step-index adjustment per nibble magnitude.
pub const INDEX_SHIFT: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

/// `diff_lookup[step][nibble]` — signal delta for one nibble at one step.
pub static DIFF_LOOKUP: LazyLock<[[i32; 16]; STEP_COUNT]> = LazyLock::new(|| {
    let mut table = [[0i32; 16]; STEP_COUNT];
    for (step, row) in table.iter_mut().enumerate() {
        let step_size = (16.0 * 1.1f64.powi(step as i32)).floor() as i32;
        for (nibble, delta) in row.iter_mut().enumerate() {
            let [sign, w4, w2, w1] = NIBBLE_WEIGHTS[nibble];
            *delta = sign * (step_size * w4 + (step_size / 2) * w2 + (step_size / 4) * w1);
        }
    }
    table
});

/// Streaming OKI decoder state.
#[derive(Debug, Clone, Default)]
pub struct OkiDecoder {
    signal: i32,
    step: i32,
}

impl OkiDecoder {
    /// Fresh decoder at signal 0, step 0.
    pub fn new() -> Self {
        OkiDecoder::default()
    }

    /// Decode one nibble, returning the new 12-bit signal value.
    pub fn clock(&mut self, nibble: u8) -> i16 {
        let nibble = (nibble & 0xF) as usize;
        self.signal = (self.signal + DIFF_LOOKUP[self.step as usize][nibble])
            .clamp(SIGNAL_MIN, SIGNAL_MAX);
        self.step = (self.step + INDEX_SHIFT[nibble & 0x7]).clamp(0, STEP_COUNT as i32 - 1);
        self.signal as i16
    }
}

/// Decode a packed nibble stream, high nibble of each byte first.
pub fn decode(data: &[u8]) -> Vec<i16> {
    let mut decoder = OkiDecoder::new();
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        out.push(decoder.clock(byte >> 4));
        out.push(decoder.clock(byte & 0xF));
    }
    out
}
