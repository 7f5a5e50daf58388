//! Console Audio Sequence Toolkit
//!
//! Parsing, interpretation, and conversion of music sequence data and ADPCM
//! sample banks ripped from game console memory dumps. Console drivers store
//! music as compact bytecode streams; this crate interprets those streams
//! into a timed event model and translates the model into standard,
//! tool-friendly events, without ever mutating the source bytes.
//!
//! # Features
//! - Multi-pass, read-only interpretation of sequence bytecode with bounded
//!   loop expansion and graceful truncation on corrupt data
//! - Pluggable format frontends behind the [`format::SequenceFormat`] trait
//!   (a PSX driver dialect and a generic chunked dialect ship in-tree)
//! - Three-pass conversion of whole documents into standard events
//!   ([`driver::convert_document`])
//! - Heuristic scanners that locate sequences and sample banks inside raw
//!   dumps with no index to go by
//! - SPU and OKI ADPCM decoders and hardware envelope conversion
//!
//! # Crate feature flags
//! - `scanner` (default): Heuristic dump scanning (`scanner`)
//! - `adpcm` (default): Sample decoding (`adpcm`)
//! - `export-wav` (opt-in): WAV export of decoded samples (enables optional
//!   `hound` dep; implies `adpcm`)
//!
//! # Quick start
//! ```no_run
//! use std::sync::Arc;
//! use chipseq::bytes::ByteSource;
//! use chipseq::config::InterpConfig;
//! use chipseq::driver::convert_document;
//! use chipseq::format::psx_seq::PsxSeqFormat;
//! use chipseq::format::SequenceFormat;
//! use chipseq::model::Document;
//!
//! # fn main() -> chipseq::Result<()> {
//! let data = std::fs::read("dump.bin")?;
//! let source = ByteSource::new(data);
//! let format: Arc<dyn SequenceFormat> = Arc::new(PsxSeqFormat);
//! let mut doc = Document::parse(source, 0, format)?;
//! let conversion = convert_document(&mut doc, &InterpConfig::default())?;
//! for (index, events) in &conversion.standard {
//!     println!("track {index}: {} events", events.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Domain modules (feature-gated for modular use)
pub mod bytes; // Bounds-checked byte access (core)
pub mod config; // Scanner / interpreter tunables
pub mod driver; // Three-pass conversion driver
pub mod envelope; // Hardware envelope conversion
pub mod format; // Sequence format frontends
pub mod interp; // Track bytecode interpreter
pub mod model; // Parsed-document object model

#[cfg(feature = "adpcm")]
pub mod adpcm; // Sample decoding
#[cfg(feature = "export-wav")]
pub mod export; // WAV export
#[cfg(feature = "scanner")]
pub mod scanner; // Heuristic dump scanning

/// Error types for sequence and sample operations
#[derive(thiserror::Error, Debug)]
pub enum ChipseqError {
    /// A read reached past the end of the source
    #[error("read of {width} byte(s) at offset {offset:#x} exceeds source size {size:#x}")]
    OutOfRange {
        /// Offset the read started at
        offset: usize,
        /// Width of the attempted read
        width: usize,
        /// Total source size
        size: usize,
    },

    /// A header failed structural validation
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The interpreter hit a status byte no dispatch arm covers
    #[error("unrecognized opcode {opcode:#04x} at offset {offset:#x}")]
    UnrecognizedOpcode {
        /// The offending status byte
        opcode: u8,
        /// Offset it was read from
        offset: usize,
    },

    /// A sample's byte range starts outside the source
    #[error("sample data offset {0:#x} is outside the source")]
    SampleDecodeBounds(usize),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error from the filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ChipseqError {
    /// Converts a String into `ChipseqError::Other`.
    ///
    /// Convenience for generic string errors; prefer the specific variant
    /// constructors where the failure class is known.
    fn from(msg: String) -> Self {
        ChipseqError::Other(msg)
    }
}

impl From<&str> for ChipseqError {
    /// Converts a string slice into `ChipseqError::Other`.
    fn from(msg: &str) -> Self {
        ChipseqError::Other(msg.to_string())
    }
}

/// Result type for sequence and sample operations
pub type Result<T> = std::result::Result<T, ChipseqError>;

// Public API exports
pub use bytes::ByteSource;
pub use config::{InterpConfig, ScanConfig};
pub use driver::{convert_document, Conversion, StandardEvent, StandardEventKind};
pub use format::SequenceFormat;
pub use interp::{interpret, ReadMode, TimelineResult};
pub use model::{Document, Event, TimedEvent, Track};

#[cfg(feature = "adpcm")]
pub use adpcm::{decode_sample, Pcm16Buffer};
#[cfg(feature = "export-wav")]
pub use export::export_to_wav;
#[cfg(feature = "scanner")]
pub use scanner::{scan_psx_samples, scan_sequences, SampleCandidate, SeqCandidate};
