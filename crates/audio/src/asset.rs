//! Sound asset definitions.
//!
//! A [`SoundAsset`] is immutable once built: a unique name, an optional output
//! bus, and an ordered list of [`ClipVariant`]s. Construction runs the
//! normalization pass, so every variant seen at runtime has a usable volume and
//! pitch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lowest pitch a voice accepts.
pub const MIN_PITCH: f32 = -3.0;
/// Highest pitch a voice accepts.
pub const MAX_PITCH: f32 = 3.0;

/// Named mixer destination a voice is routed through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputBus(String);

impl OutputBus {
    /// Create a bus reference from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Bus name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to an audio buffer owned by the backend.
///
/// Cloning is cheap; the id is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipRef {
    id: Arc<str>,
    duration: Duration,
}

impl ClipRef {
    /// Create a clip handle.
    pub fn new(id: impl Into<Arc<str>>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            duration,
        }
    }

    /// Backend lookup key for the clip's audio data.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Playback length at pitch 1.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ClipRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One alternative clip registered under a sound name.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipVariant {
    /// Audio buffer to play.
    pub clip: ClipRef,
    /// Base volume (0.0 to 1.0).
    pub volume: f32,
    /// Base pitch (-3.0 to 3.0).
    pub pitch: f32,
}

impl ClipVariant {
    /// Create a normalized variant.
    pub fn new(clip: ClipRef, volume: f32, pitch: f32) -> Self {
        Self {
            clip,
            volume,
            pitch,
        }
        .normalized()
    }

    /// Variant at volume 1 and pitch 1.
    pub fn unit(clip: ClipRef) -> Self {
        Self::new(clip, 1.0, 1.0)
    }

    /// Coerce unconfigured (zero) values to 1 and clamp into range.
    pub fn normalized(mut self) -> Self {
        if self.volume == 0.0 || self.volume.is_nan() {
            self.volume = 1.0;
        }
        if self.pitch == 0.0 || self.pitch.is_nan() {
            self.pitch = 1.0;
        }
        self.volume = self.volume.clamp(0.0, 1.0);
        self.pitch = self.pitch.clamp(MIN_PITCH, MAX_PITCH);
        self
    }
}

/// A named sound with one or more clip variants.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundAsset {
    name: String,
    bus: Option<OutputBus>,
    variants: Vec<ClipVariant>,
}

impl SoundAsset {
    /// Build an asset, normalizing every variant.
    pub fn new(name: impl Into<String>, bus: Option<OutputBus>, variants: Vec<ClipVariant>) -> Self {
        Self {
            name: name.into(),
            bus,
            variants: variants.into_iter().map(ClipVariant::normalized).collect(),
        }
    }

    /// Unique sound name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output bus voices playing this sound are routed through.
    pub fn bus(&self) -> Option<&OutputBus> {
        self.bus.as_ref()
    }

    /// Clip variants in authoring order.
    pub fn variants(&self) -> &[ClipVariant] {
        &self.variants
    }

    /// Variant at `index`, if any.
    pub fn variant(&self, index: usize) -> Option<&ClipVariant> {
        self.variants.get(index)
    }

    /// Whether the sound has nothing to play.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
