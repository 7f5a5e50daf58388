//! Sony PlayStation SPU ADPCM
//!
//! SPU sample data is organized in 16-byte blocks:
//!
//! - byte 0: decode range (low nibble) and filter index (high nibble)
//! - byte 1: flag bits — end of sample, loop at end, loop start marker
//! - bytes 2..16: 14 packed bytes of 28 nibbles, low nibble first
//!
//! Each nibble expands to a 16-bit-domain delta via
//! `(nibble << 28) >> (range + 16)` and runs through a 2-tap IIR predictor
//! selected by the filter index; filter 0 has zero coefficients and so
//! reseeds the history from the raw samples. History carries across blocks.
//!
//! Two conventional marker blocks matter to scanning and trimming: a block of
//! 16 zero bytes marks a sample start, and the `0x00 0x07 0x77…` saturation
//! block is end-of-sample padding left by Sony's tools.

use bitflags::bitflags;

/// Bytes per SPU block.
pub const BLOCK_SIZE: usize = 16;
/// Decoded samples per block.
pub const SAMPLES_PER_BLOCK: usize = 28;

bitflags! {
    /// Block flag bits (byte 1 of each block).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PsxBlockFlags: u8 {
        /// Last block of the sample
        const END = 1 << 0;
        /// Jump to the loop point after the end block
        const LOOP = 1 << 1;
        /// This block is the loop start
        const LOOP_START = 1 << 2;
    }
}

/// The five fixed prediction coefficient pairs, in 1/64 units.
pub const FILTERS: [(i32, i32); 5] = [(0, 0), (60, 0), (115, -52), (98, -55), (122, -60)];

/// Result of decoding one sample's block run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsxDecoded {
    /// Decoded PCM
    pub samples: Vec<i16>,
    /// Sample index of the loop start, when a block was marked
    pub loop_start: Option<usize>,
    /// Whether the end block requested looping
    pub looped: bool,
}

/// Streaming block decoder; prediction history carries across blocks.
#[derive(Debug, Clone, Default)]
pub struct PsxDecoder {
    hist1: i32,
    hist2: i32,
}

impl PsxDecoder {
    /// Fresh decoder with zero history.
    pub fn new() -> Self {
        PsxDecoder::default()
    }

    /// Decode one 16-byte block into `out`, returning its flags.
    pub fn decode_block(&mut self, block: &[u8], out: &mut Vec<i16>) -> PsxBlockFlags {
        debug_assert_eq!(block.len(), BLOCK_SIZE);
        let range = (block[0] & 0x0F) as i32;
        let mut filter = (block[0] >> 4) as usize;
        if filter >= FILTERS.len() {
            // out-of-range predictors appear in garbage regions; the
            // strongest filter is what real hardware falls back to
            log::debug!("filter index {filter} clamped to {}", FILTERS.len() - 1);
            filter = FILTERS.len() - 1;
        }
        let flags = PsxBlockFlags::from_bits_truncate(block[1]);
        let (f0, f1) = FILTERS[filter];

        for &byte in &block[2..BLOCK_SIZE] {
            for nibble in [byte & 0x0F, byte >> 4] {
                let raw = ((nibble as i32) << 28) >> (range + 16);
                let predicted = if filter == 0 {
                    raw
                } else {
                    raw + (self.hist1 * f0 + self.hist2 * f1) / 64
                };
                let sample = predicted.clamp(i16::MIN as i32, i16::MAX as i32);
                self.hist2 = self.hist1;
                self.hist1 = sample;
                out.push(sample as i16);
            }
        }
        flags
    }
}

/// Whether `block` is the conventional all-zero sample-start marker.
pub fn is_start_marker(block: &[u8]) -> bool {
    block.len() >= 4 && block[..4].iter().all(|&b| b == 0)
}

/// Whether `block` is the `0x00 0x07 0x77…` end-padding artifact.
pub fn is_end_padding(block: &[u8]) -> bool {
    block.len() == BLOCK_SIZE
        && block[0] == 0x00
        && block[1] == 0x07
        && block[2..].iter().all(|&b| b == 0x77)
}

/// Decode consecutive blocks until the end flag, end padding, or the data
/// runs out. A trailing partial block is ignored.
pub fn decode(data: &[u8]) -> PsxDecoded {
    let mut decoder = PsxDecoder::new();
    let mut result = PsxDecoded::default();

    if data.len() % BLOCK_SIZE != 0 {
        log::warn!(
            "PSX sample length {} is not block aligned; ignoring the tail",
            data.len()
        );
    }

    for block in data.chunks_exact(BLOCK_SIZE) {
        if is_end_padding(block) {
            break;
        }
        let at = result.samples.len();
        let flags = decoder.decode_block(block, &mut result.samples);
        if flags.contains(PsxBlockFlags::LOOP_START) {
            result.loop_start.get_or_insert(at);
        }
        if flags.contains(PsxBlockFlags::END) {
            result.looped = flags.contains(PsxBlockFlags::LOOP);
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(range_filter: u8, flags: u8, payload: u8) -> Vec<u8> {
        let mut b = vec![range_filter, flags];
        b.extend(std::iter::repeat(payload).take(14));
        b
    }

    #[test]
    fn test_zero_block_decodes_to_silence() {
        let decoded = decode(&block(0, 0, 0));
        assert_eq!(decoded.samples, vec![0i16; SAMPLES_PER_BLOCK]);
    }

    #[test]
    fn test_nibble_expansion_shift() {
        // range 0: nibble 1 → (1 << 28) >> 16 = 0x1000; low nibble first
        let decoded = decode(&block(0, 0, 0x01));
        assert_eq!(decoded.samples[0], 0x1000);
        assert_eq!(decoded.samples[1], 0);
        // negative nibble sign-extends
        let decoded = decode(&block(0, 0, 0x0F));
        assert_eq!(decoded.samples[0], -0x1000);
    }

    #[test]
    fn test_range_attenuates() {
        // range 4 divides the delta by 16
        let decoded = decode(&block(0x04, 0, 0x01));
        assert_eq!(decoded.samples[0], 0x100);
    }

    #[test]
    fn test_filter_one_carries_history() {
        // block 1 (filter 0) reseeds history to 0x1000; block 2 (filter 1)
        // predicts 60/64 of the previous sample from zero deltas
        let mut data = block(0, 0, 0x11);
        data.extend(block(0x10, 0, 0x00));
        let decoded = decode(&data);
        assert_eq!(decoded.samples[SAMPLES_PER_BLOCK - 1], 0x1000);
        assert_eq!(
            decoded.samples[SAMPLES_PER_BLOCK],
            (0x1000i32 * 60 / 64) as i16
        );
        assert_eq!(
            decoded.samples[SAMPLES_PER_BLOCK + 1],
            ((0x1000i32 * 60 / 64) * 60 / 64) as i16
        );
    }

    #[test]
    fn test_end_flag_stops_decoding() {
        let mut data = block(0, PsxBlockFlags::END.bits(), 0x01);
        data.extend(block(0, 0, 0x02));
        let decoded = decode(&data);
        assert_eq!(decoded.samples.len(), SAMPLES_PER_BLOCK);
        assert!(!decoded.looped);
    }

    #[test]
    fn test_loop_flags_recorded() {
        let mut data = block(0, PsxBlockFlags::LOOP_START.bits(), 0);
        data.extend(block(
            0,
            (PsxBlockFlags::END | PsxBlockFlags::LOOP).bits(),
            0,
        ));
        let decoded = decode(&data);
        assert_eq!(decoded.loop_start, Some(0));
        assert!(decoded.looped);
    }

    #[test]
    fn test_end_padding_trimmed() {
        let mut data = block(0, 0, 0x01);
        data.extend(block(0x00, 0x07, 0x77));
        let decoded = decode(&data);
        assert_eq!(decoded.samples.len(), SAMPLES_PER_BLOCK);
    }

    #[test]
    fn test_partial_trailing_block_ignored() {
        let mut data = block(0, 0, 0x01);
        data.extend_from_slice(&[0x00, 0x00, 0x11]);
        let decoded = decode(&data);
        assert_eq!(decoded.samples.len(), SAMPLES_PER_BLOCK);
    }

    #[test]
    fn test_marker_predicates() {
        assert!(is_start_marker(&[0, 0, 0, 0, 9, 9]));
        assert!(!is_start_marker(&[0, 0, 1, 0]));
        assert!(is_end_padding(&block(0x00, 0x07, 0x77)));
        assert!(!is_end_padding(&block(0x00, 0x07, 0x76)));
    }
}
