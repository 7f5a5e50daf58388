//! WAV file export functionality

use std::path::Path;

use crate::adpcm::Pcm16Buffer;
use crate::Result;

/// Write a decoded PCM buffer to a 16-bit WAV file.
///
/// # Examples
///
/// ```no_run
/// use chipseq::adpcm::Pcm16Buffer;
/// use chipseq::export::export_to_wav;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let buffer = Pcm16Buffer {
///     samples: vec![0, 4096, 0, -4096],
///     sample_rate: 22_050,
///     channels: 1,
/// };
/// export_to_wav(&buffer, "sample.wav")?;
/// # Ok(())
/// # }
/// ```
pub fn export_to_wav<P: AsRef<Path>>(buffer: &Pcm16Buffer, output_path: P) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels.max(1),
        sample_rate: buffer.sample_rate.max(1),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(output_path.as_ref(), spec)
        .map_err(|e| format!("Failed to create WAV file: {}", e))?;

    for &sample in &buffer.samples {
        writer
            .write_sample(sample)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV file: {}", e))?;

    log::info!(
        "wrote {} samples ({:.2}s) to {}",
        buffer.samples.len(),
        buffer.duration_secs(),
        output_path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_hound() {
        let buffer = Pcm16Buffer {
            samples: vec![0, 1000, -1000, i16::MAX, i16::MIN],
            sample_rate: 22_050,
            channels: 1,
        };
        let path = std::env::temp_dir().join("chipseq_export_test.wav");
        export_to_wav(&buffer, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, buffer.samples);
        let _ = std::fs::remove_file(&path);
    }
}
