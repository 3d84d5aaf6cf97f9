//! Audio settings and per-bus volume controls.

use crate::OutputBus;
use serde::{Deserialize, Serialize};

/// Bus name routed through the music volume.
pub const MUSIC_BUS: &str = "music";
/// Bus name routed through the ambient volume.
pub const AMBIENT_BUS: &str = "ambient";

/// Audio volume settings.
///
/// Backends apply these on top of the per-voice volume computed at dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master volume (0.0 to 1.0)
    pub master: f32,
    /// Music volume (0.0 to 1.0)
    pub music: f32,
    /// Sound effects volume (0.0 to 1.0)
    pub sfx: f32,
    /// Ambient sounds volume (0.0 to 1.0)
    pub ambient: f32,
    /// Whether audio is muted
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master: 1.0,
            music: 0.5,
            sfx: 1.0,
            ambient: 0.7,
            muted: false,
        }
    }
}

impl AudioSettings {
    /// Create new audio settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gain for a channel routed through `bus`.
    ///
    /// `music` and `ambient` use their own sliders; every other bus, and no
    /// bus at all, counts as sound effects.
    pub fn bus_gain(&self, bus: Option<&OutputBus>) -> f32 {
        match bus.map(OutputBus::name) {
            Some(MUSIC_BUS) => self.effective_music_volume(),
            Some(AMBIENT_BUS) => self.effective_ambient_volume(),
            _ => self.effective_sfx_volume(),
        }
    }

    /// Get the effective music volume (master * music).
    pub fn effective_music_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master * self.music
        }
    }

    /// Get the effective SFX volume (master * sfx).
    pub fn effective_sfx_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master * self.sfx
        }
    }

    /// Get the effective ambient volume (master * ambient).
    pub fn effective_ambient_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master * self.ambient
        }
    }

    /// Toggle mute state.
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Set master volume (clamped to 0.0-1.0).
    pub fn set_master(&mut self, volume: f32) {
        self.master = volume.clamp(0.0, 1.0);
    }

    /// Set music volume (clamped to 0.0-1.0).
    pub fn set_music(&mut self, volume: f32) {
        self.music = volume.clamp(0.0, 1.0);
    }

    /// Set SFX volume (clamped to 0.0-1.0).
    pub fn set_sfx(&mut self, volume: f32) {
        self.sfx = volume.clamp(0.0, 1.0);
    }

    /// Set ambient volume (clamped to 0.0-1.0).
    pub fn set_ambient(&mut self, volume: f32) {
        self.ambient = volume.clamp(0.0, 1.0);
    }
}
