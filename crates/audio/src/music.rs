//! Background music rotation.
//!
//! Plays the variants of one [`SoundAsset`] in order on a single channel that
//! never loops by itself. [`MusicRotator::update`] is polled every tick and
//! starts the next track once the channel reports it has stopped playing.

use crate::backend::{Channel, PlaybackBackend, PlaybackRequest};
use crate::SoundAsset;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the rotator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotatorState {
    /// Not started, or permanently idle because the asset has no tracks.
    Idle,
    /// Playing the track at this variant index.
    Playing(usize),
}

/// Round-robin background music on one persistent channel.
pub struct MusicRotator<B> {
    asset: Arc<SoundAsset>,
    backend: B,
    state: RotatorState,
    disabled: bool,
    /// Consecutive tracks that failed to start.
    failures: usize,
}

impl<B: PlaybackBackend> MusicRotator<B> {
    /// Create an idle rotator for `asset`.
    pub fn new(asset: Arc<SoundAsset>, backend: B) -> Self {
        Self {
            asset,
            backend,
            state: RotatorState::Idle,
            disabled: false,
            failures: 0,
        }
    }

    /// Start the first track.
    ///
    /// An asset without variants logs a warning and leaves the rotator idle
    /// for good. Activating a running rotator does nothing. If every track
    /// fails to start in a row the rotator falls back to idle and can be
    /// activated again.
    pub fn activate(&mut self) {
        if self.disabled || self.state != RotatorState::Idle {
            return;
        }
        if self.asset.is_empty() {
            warn!(sound = self.asset.name(), "No background music clips assigned");
            self.disabled = true;
            return;
        }
        self.play_track(0);
    }

    /// Per-tick entry point: advance the channel clock and move to the next
    /// track when the current one has finished.
    pub fn update(&mut self, elapsed: Duration) {
        self.backend.advance(elapsed);
        let RotatorState::Playing(index) = self.state else {
            return;
        };
        if !self.backend.is_playing(Channel::Music) {
            let next = (index + 1) % self.asset.variants().len();
            self.play_track(next);
        }
    }

    fn play_track(&mut self, index: usize) {
        let Some(track) = self.asset.variant(index) else {
            return;
        };
        let request = PlaybackRequest {
            clip: track.clip.clone(),
            volume: track.volume,
            pitch: track.pitch,
            bus: self.asset.bus().cloned(),
        };
        self.state = RotatorState::Playing(index);
        match self.backend.start_playback(Channel::Music, &request) {
            Ok(()) => {
                self.failures = 0;
                debug!(
                    sound = self.asset.name(),
                    track = index,
                    clip = %track.clip,
                    "Music track started"
                );
            }
            Err(err) => {
                warn!(
                    sound = self.asset.name(),
                    track = index,
                    "Failed to start music track: {err}"
                );
                self.failures += 1;
                if self.failures >= self.asset.variants().len() {
                    warn!(sound = self.asset.name(), "No music track could be started");
                    self.failures = 0;
                    self.state = RotatorState::Idle;
                }
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> RotatorState {
        self.state
    }

    /// Index of the track on the channel, if any.
    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            RotatorState::Playing(index) => Some(index),
            RotatorState::Idle => None,
        }
    }

    /// The asset being rotated.
    pub fn asset(&self) -> &Arc<SoundAsset> {
        &self.asset
    }

    /// The backend driving the music channel.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
