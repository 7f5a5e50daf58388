//! Compressed sample decoding
//!
//! Turns a [`Sample`] reference (byte range + codec tag) into 16-bit PCM.
//! The two ADPCM families found in the supported drivers are implemented:
//! Sony PlayStation SPU blocks ([`psx`]) and OKI/Dialogic 4-bit streams
//! ([`oki`]).
//!
//! Decoding is tolerant by contract: a sample whose byte range runs off the
//! end of the source is decoded up to the last complete block and the partial
//! PCM is returned, because heuristically discovered sample tables routinely
//! overstate lengths.

pub mod oki;
pub mod psx;

use crate::bytes::ByteSource;
use crate::model::{Sample, SampleCodec};
use crate::{ChipseqError, Result};

/// Decoded 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcm16Buffer {
    /// Interleaved samples
    pub samples: Vec<i16>,
    /// Playback rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
}

impl Pcm16Buffer {
    /// Duration in seconds at the buffer's own rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Decode `sample`'s byte range out of `source`.
///
/// Fails only when the range starts outside the source entirely; a range that
/// merely overruns the end yields the decodable prefix.
pub fn decode_sample(sample: &Sample, source: &ByteSource) -> Result<Pcm16Buffer> {
    if !source.contains(sample.offset) {
        return Err(ChipseqError::SampleDecodeBounds(sample.offset));
    }
    let avail = source.len() - sample.offset;
    let length = sample.length.min(avail);
    if length < sample.length {
        log::warn!(
            "sample at {:#x} claims {} bytes but only {} remain; decoding the prefix",
            sample.offset,
            sample.length,
            length
        );
    }
    let data = source.read_bytes(sample.offset, length)?;

    let samples = match sample.codec {
        SampleCodec::PsxAdpcm => psx::decode(data).samples,
        SampleCodec::OkiAdpcm => oki::decode(data),
        SampleCodec::RawPcm16 => data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    };

    Ok(Pcm16Buffer {
        samples,
        sample_rate: sample.sample_rate,
        channels: sample.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_pcm_passthrough() {
        let source = ByteSource::new(vec![0x34, 0x12, 0x00, 0x80]);
        let sample = Sample::new(0, 4, SampleCodec::RawPcm16, 22_050);
        let pcm = decode_sample(&sample, &source).unwrap();
        assert_eq!(pcm.samples, vec![0x1234, i16::MIN]);
        assert_eq!(pcm.sample_rate, 22_050);
    }

    #[test]
    fn test_overrunning_range_returns_prefix() {
        let source = ByteSource::new(vec![0x01, 0x00, 0x02, 0x00, 0x03]);
        let sample = Sample::new(0, 64, SampleCodec::RawPcm16, 8_000);
        let pcm = decode_sample(&sample, &source).unwrap();
        // last odd byte cannot form a sample
        assert_eq!(pcm.samples, vec![1, 2]);
    }

    #[test]
    fn test_offset_outside_source_is_an_error() {
        let source = ByteSource::new(vec![0; 8]);
        let sample = Sample::new(8, 4, SampleCodec::RawPcm16, 8_000);
        assert!(matches!(
            decode_sample(&sample, &source),
            Err(ChipseqError::SampleDecodeBounds(8))
        ));
    }

    #[test]
    fn test_duration() {
        let pcm = Pcm16Buffer {
            samples: vec![0; 44_100],
            sample_rate: 44_100,
            channels: 1,
        };
        assert!((pcm.duration_secs() - 1.0).abs() < 1e-9);
    }
}
