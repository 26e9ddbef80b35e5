//! File formats for chipstep.
//!
//! 16-bit PCM WAV output for rendered audio, and JSON for project
//! snapshots.

mod project_json;
mod wav_format;

pub use project_json::{load_project_json, project_to_json};
pub use wav_format::{buffer_to_wav, parse_wav_header, sample_to_pcm16, write_wav, WavHeader, WAV_HEADER_LEN};

use thiserror::Error;

/// Error type for format encoding and parsing.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unsupported encoding
    #[error("unsupported format: {0}")]
    Unsupported(String),
    #[error("binary layout error: {0}")]
    Binary(#[from] binrw::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
