//! Controller error type.

use cs_audio::AudioError;
use cs_formats::FormatError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A live-control call was made before `initialize`.
    #[error("{0} called before the engine was initialized")]
    NotInitialized(&'static str),
    #[error("audio device: {0}")]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}
