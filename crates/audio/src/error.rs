//! Error types for dispatch and asset loading.

use thiserror::Error;

/// Conditions raised while dispatching or playing a sound.
///
/// `NotFound` and `Exhausted` are best-effort skips: the public `play` entry
/// points log them and drop the request instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// Unknown sound name, or a sound with no clip variants.
    #[error("sound `{0}` not found")]
    NotFound(String),
    /// Every voice in the pool is busy.
    #[error("voice pool exhausted ({capacity} voices busy)")]
    Exhausted {
        /// Number of voices in the pool at the time of the request.
        capacity: usize,
    },
    /// The handle was issued for an earlier use of the voice.
    #[error("stale handle for voice {voice}")]
    StaleHandle {
        /// Index of the voice the handle points at.
        voice: usize,
    },
    /// The backend has no audio data for the clip.
    #[error("clip `{0}` is not loaded in the backend")]
    ClipNotLoaded(String),
    /// Backend specific failure.
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Errors emitted while loading sound manifests.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Wrap IO errors when reading manifests.
    #[error("failed to read sound manifest: {0}")]
    Io(#[from] std::io::Error),
    /// Wrap serde parsing issues.
    #[error("failed to parse sound manifest: {0}")]
    Parse(#[from] serde_json::Error),
    /// The manifest parsed but describes an unusable sound.
    #[error("invalid sound definition: {0}")]
    Invalid(String),
}
