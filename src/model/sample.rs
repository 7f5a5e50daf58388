//! Samples, instruments and regions
//!
//! Compressed sample data is referenced by byte range plus codec tag; the
//! decoders in [`crate::adpcm`] turn a [`Sample`] into PCM. Instruments group
//! key/velocity regions, each of which carries the hardware envelope codes and
//! (after conversion) time-domain ADSR values.

/// Compression scheme of a sample's byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCodec {
    /// Sony PlayStation SPU ADPCM, 16-byte blocks of 28 samples
    PsxAdpcm,
    /// OKI/Dialogic-style 4-bit ADPCM, 12-bit signal range
    OkiAdpcm,
    /// Uncompressed signed 16-bit little-endian PCM
    RawPcm16,
}

/// One compressed (or raw) sample inside a byte source.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Absolute offset of the first byte
    pub offset: usize,
    /// Length of the encoded data in bytes
    pub length: usize,
    /// Compression scheme
    pub codec: SampleCodec,
    /// Native playback rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 for every codec currently supported)
    pub channels: u16,
    /// Loop start in decoded sample frames
    pub loop_offset: u32,
    /// Loop length in decoded sample frames
    pub loop_length: u32,
    /// Whether the sample loops
    pub looped: bool,
}

impl Sample {
    /// A non-looping sample covering `[offset, offset + length)`.
    pub fn new(offset: usize, length: usize, codec: SampleCodec, sample_rate: u32) -> Self {
        Sample {
            offset,
            length,
            codec,
            sample_rate,
            channels: 1,
            loop_offset: 0,
            loop_length: 0,
            looped: false,
        }
    }
}

/// Hardware ADSR rate codes as stored by the sound driver.
///
/// Units are format-native rate codes, not times; [`crate::envelope`] converts
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Adsr {
    /// Attack rate code
    pub attack_rate: u8,
    /// Decay rate code
    pub decay_rate: u8,
    /// Sustain level code (0..=0xFFFF)
    pub sustain_level: u16,
    /// Sustain rate code
    pub sustain_rate: u8,
    /// Release rate code
    pub release_rate: u8,
}

/// Time-domain envelope derived from [`Adsr`] codes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeTimes {
    /// Attack time in seconds
    pub attack_secs: f64,
    /// Decay time in seconds
    pub decay_secs: f64,
    /// Sustain level, 0.0..=1.0
    pub sustain_level: f64,
    /// Release time in seconds
    pub release_secs: f64,
}

/// Association of a key/velocity range with a sample and envelope.
#[derive(Debug, Clone)]
pub struct Region {
    /// Lowest key this region responds to
    pub key_low: u8,
    /// Highest key this region responds to
    pub key_high: u8,
    /// Lowest velocity this region responds to
    pub vel_low: u8,
    /// Highest velocity this region responds to
    pub vel_high: u8,
    /// Index into the owning collection's sample table
    pub sample_index: usize,
    /// Pan position, 0 left .. 64 center .. 127 right
    pub pan: u8,
    /// Fine tune in cents
    pub fine_tune: i16,
    /// Raw hardware envelope codes
    pub adsr: Adsr,
    /// Converted time-domain envelope
    pub envelope: EnvelopeTimes,
}

impl Region {
    /// Full-range region playing `sample_index`.
    pub fn new(sample_index: usize) -> Self {
        Region {
            key_low: 0,
            key_high: 127,
            vel_low: 0,
            vel_high: 127,
            sample_index,
            pan: 64,
            fine_tune: 0,
            adsr: Adsr::default(),
            envelope: EnvelopeTimes::default(),
        }
    }
}

/// A program: one or more regions keyed by note and velocity range.
#[derive(Debug, Clone)]
pub struct Instrument {
    /// Program number the sequence selects this instrument by
    pub program: u8,
    /// Regions, in table order
    pub regions: Vec<Region>,
}

impl Instrument {
    /// Empty instrument for `program`.
    pub fn new(program: u8) -> Self {
        Instrument {
            program,
            regions: Vec::new(),
        }
    }

    /// The region responding to `key` at `vel`, if any.
    pub fn region_for(&self, key: u8, vel: u8) -> Option<&Region> {
        self.regions.iter().find(|r| {
            key >= r.key_low && key <= r.key_high && vel >= r.vel_low && vel <= r.vel_high
        })
    }
}
