//! Hardware envelope conversion
//!
//! Sound chips store envelopes as rate codes indexing non-linear rate
//! tables, while downstream instrument formats want time-based ADSR. This
//! module converts between the two:
//!
//! - a lazily built rate table maps each 7-bit code to the seconds a linear
//!   envelope needs to traverse full scale (SPU step/shift semantics at the
//!   44.1 kHz envelope clock);
//! - sustain level is the 16-bit level code scaled to `0.0..=1.0`, forced to
//!   full when the decay rate is degenerate (a decay that never completes);
//! - formats without a native sustain-rate concept get the substitution
//!   heuristic: a very high sustain level over a short decay folds the
//!   sustain rate into the decay time and zeroes the level;
//! - decay and release times go through the linear-amplitude to
//!   logarithmic-decay conversion before they are stored on a region.

use std::sync::LazyLock;

use crate::model::{Adsr, EnvelopeTimes, Region};

/// Envelope clock in Hz.
const ENVELOPE_CLOCK: f64 = 44_100.0;
/// Full-scale envelope range the rate table traverses.
const ENVELOPE_RANGE: u32 = 0x8000;
/// Linear volume range assumed by the decay-time conversion.
const VOLUME_RANGE: u32 = 0x800;

/// Sustain levels above this are folded into decay when the decay is short.
const SUSTAIN_FOLD_LEVEL: f64 = 0.966;
/// Decay times below this count as "short" for the fold heuristic.
const SUSTAIN_FOLD_DECAY_SECS: f64 = 0.5;

/// Seconds of full-scale linear traversal per rate code.
static RATE_TABLE: LazyLock<[f64; 128]> = LazyLock::new(|| {
    let mut table = [0.0f64; 128];
    for (code, out) in table.iter_mut().enumerate() {
        let shift = (code >> 2) as i32;
        let step = (7 - (code & 3)) as u32;
        let cycles_per_step = 1u64 << shift.saturating_sub(11).max(0);
        let step_value = step << (11 - shift).max(0).min(11);
        let steps = ENVELOPE_RANGE.div_ceil(step_value) as u64;
        *out = (steps * cycles_per_step) as f64 / ENVELOPE_CLOCK;
    }
    table
});

/// Seconds a linear envelope at `rate` needs to traverse full scale.
pub fn rate_secs(rate: u8) -> f64 {
    RATE_TABLE[(rate & 0x7F) as usize]
}

/// Convert a time-to-silence of a linear-amplitude decay into the time a
/// dB-linear decay (to -100 dB) needs to sound equivalent.
///
/// The two ramps are matched where the linear ramp reaches the bottom of the
/// `volume_range`-step amplitude scale.
pub fn lin_amp_decay_time(secs: f64, volume_range: u32) -> f64 {
    if secs <= 0.0 || volume_range < 2 {
        return secs.max(0.0);
    }
    let range = volume_range as f64;
    let linear_floor_db = 20.0 * range.log10();
    secs * (1.0 - 1.0 / range) * 100.0 / linear_floor_db
}

/// Convert hardware rate codes into a time-domain envelope.
pub fn convert_adsr(adsr: &Adsr) -> EnvelopeTimes {
    let attack_secs = rate_secs(adsr.attack_rate);
    let mut decay_secs = rate_secs(adsr.decay_rate);
    let release_secs = rate_secs(adsr.release_rate);

    let mut sustain_level = if adsr.decay_rate <= 1 {
        // decay never completes; the note rests at full level
        1.0
    } else {
        adsr.sustain_level as f64 / 0xFFFF as f64
    };

    if sustain_level > SUSTAIN_FOLD_LEVEL && decay_secs < SUSTAIN_FOLD_DECAY_SECS {
        // no native sustain-rate downstream: let the sustain rate play the
        // decay's role and fall all the way to silence
        decay_secs = rate_secs(adsr.sustain_rate);
        sustain_level = 0.0;
    }

    EnvelopeTimes {
        attack_secs,
        decay_secs: lin_amp_decay_time(decay_secs, VOLUME_RANGE),
        sustain_level,
        release_secs: lin_amp_decay_time(release_secs, VOLUME_RANGE),
    }
}

/// Parameters for building one region from a format's native instrument data.
#[derive(Debug, Clone)]
pub struct RegionParams {
    /// Lowest responding key
    pub key_low: u8,
    /// Highest responding key
    pub key_high: u8,
    /// Lowest responding velocity
    pub vel_low: u8,
    /// Highest responding velocity
    pub vel_high: u8,
    /// Index into the sample table
    pub sample_index: usize,
    /// Pan, 0..=127 with 64 center
    pub pan: u8,
    /// Fine tune in cents
    pub fine_tune: i16,
    /// Hardware envelope codes
    pub adsr: Adsr,
}

/// Boundary operation: build a [`Region`] with its converted envelope.
pub fn build_region(params: RegionParams) -> Region {
    Region {
        key_low: params.key_low,
        key_high: params.key_high,
        vel_low: params.vel_low,
        vel_high: params.vel_high,
        sample_index: params.sample_index,
        pan: params.pan,
        fine_tune: params.fine_tune,
        envelope: convert_adsr(&params.adsr),
        adsr: params.adsr,
    }
}
