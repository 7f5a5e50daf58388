//! Audio export (feature `export-wav`)
//!
//! Writes decoded PCM to disk for auditioning extracted samples. Only WAV is
//! supported; the format carries loop and tuning metadata poorly, so exports
//! are plain one-shot renditions of the decoded data.

mod wav;

pub use wav::export_to_wav;
