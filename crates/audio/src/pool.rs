//! Bounded pool of reusable playback voices.
//!
//! A voice is borrowed with [`VoicePool::acquire`], started with
//! [`VoicePool::configure`] and handed back by a release timer scheduled through
//! [`VoicePool::release_after`]. Timers are scanned in [`VoicePool::update`]
//! once per tick; nothing sleeps.
//!
//! Each acquire bumps the voice's generation. A timer only releases the voice
//! if the generation it captured is still current, so a timer left over from
//! an earlier, shorter clip cannot cut off a voice that was reused since.

use crate::backend::{Channel, PlaybackBackend, PlaybackRequest};
use crate::{AudioError, ClipRef, OutputBus};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Default number of voices in a pool.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// What to do when every voice is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExhaustionPolicy {
    /// Report `Exhausted` and let the caller drop the request.
    #[default]
    Drop,
    /// Add a voice, up to `max_voices` in total, then behave like `Drop`.
    Grow {
        /// Hard upper bound on pool size.
        max_voices: usize,
    },
}

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Voices created up front.
    pub capacity: usize,
    /// Behavior when all voices are busy.
    pub exhaustion: ExhaustionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            exhaustion: ExhaustionPolicy::Drop,
        }
    }
}

impl PoolConfig {
    /// Fixed-size pool that drops requests when full.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            capacity,
            exhaustion: ExhaustionPolicy::Drop,
        }
    }
}

/// Kind of voice requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VoiceCategory {
    /// One-shot sound effect.
    #[default]
    Generic,
}

/// Proof of a voice borrowed from the pool.
///
/// Only valid for the use it was issued for; once the voice is released and
/// acquired again the old handle is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    index: usize,
    generation: u64,
}

impl VoiceHandle {
    /// Pool index of the voice.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation captured at acquire time.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Backend channel the voice plays on.
    pub fn channel(&self) -> Channel {
        Channel::Voice(self.index)
    }
}

/// Playback parameters applied by [`VoicePool::configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSetup {
    /// Clip to play.
    pub clip: ClipRef,
    /// Final volume (0.0 to 1.0).
    pub volume: f32,
    /// Final pitch (-3.0 to 3.0).
    pub pitch: f32,
    /// World position for positional voices.
    pub position: Option<Vec3>,
    /// 0 for 2D, 1 for positional.
    pub spatial_blend: f32,
    /// Mixer bus.
    pub bus: Option<OutputBus>,
}

/// A reusable playback channel.
#[derive(Debug, Clone)]
pub struct Voice {
    index: usize,
    active: bool,
    generation: u64,
    category: VoiceCategory,
    clip: Option<ClipRef>,
    volume: f32,
    pitch: f32,
    position: Option<Vec3>,
    spatial_blend: f32,
    bus: Option<OutputBus>,
    remaining_lifetime: Duration,
}

impl Voice {
    fn new(index: usize) -> Self {
        Self {
            index,
            active: false,
            generation: 0,
            category: VoiceCategory::Generic,
            clip: None,
            volume: 1.0,
            pitch: 1.0,
            position: None,
            spatial_blend: 0.0,
            bus: None,
            remaining_lifetime: Duration::ZERO,
        }
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.remaining_lifetime = Duration::ZERO;
    }

    /// Pool index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the voice is borrowed.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of times the voice has been acquired.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Category of the current use.
    pub fn category(&self) -> VoiceCategory {
        self.category
    }

    /// Clip last configured on the voice.
    pub fn clip(&self) -> Option<&ClipRef> {
        self.clip.as_ref()
    }

    /// Configured volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Configured pitch.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// World position, for positional voices.
    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    /// 0 for 2D, 1 for positional.
    pub fn spatial_blend(&self) -> f32 {
        self.spatial_blend
    }

    /// Mixer bus.
    pub fn bus(&self) -> Option<&OutputBus> {
        self.bus.as_ref()
    }

    /// Time left before the pending release fires.
    pub fn remaining_lifetime(&self) -> Duration {
        self.remaining_lifetime
    }
}

#[derive(Debug, Clone, Copy)]
struct ReleaseTimer {
    handle: VoiceHandle,
    remaining: Duration,
}

/// Bounded collection of voices.
///
/// Not synchronized; the owner serializes access (the dispatcher keeps it
/// behind a mutex).
#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    timers: Vec<ReleaseTimer>,
    exhaustion: ExhaustionPolicy,
}

impl VoicePool {
    /// Create a pool with `config.capacity` idle voices.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            voices: (0..config.capacity).map(Voice::new).collect(),
            timers: Vec::new(),
            exhaustion: config.exhaustion,
        }
    }

    /// Borrow the first idle voice.
    pub fn acquire(&mut self, category: VoiceCategory) -> Result<VoiceHandle, AudioError> {
        let index = match self.voices.iter().position(|v| !v.active) {
            Some(index) => index,
            None => self.grow()?,
        };

        let voice = &mut self.voices[index];
        voice.active = true;
        voice.generation += 1;
        voice.category = category;
        voice.remaining_lifetime = Duration::ZERO;
        Ok(VoiceHandle {
            index,
            generation: voice.generation,
        })
    }

    fn grow(&mut self) -> Result<usize, AudioError> {
        let capacity = self.voices.len();
        match self.exhaustion {
            ExhaustionPolicy::Grow { max_voices } if capacity < max_voices => {
                self.voices.push(Voice::new(capacity));
                debug!(capacity = capacity + 1, "Voice pool grown");
                Ok(capacity)
            }
            _ => Err(AudioError::Exhausted { capacity }),
        }
    }

    /// Apply `setup` to a borrowed voice and start it on `backend`.
    ///
    /// If the backend refuses the clip the voice goes straight back to the
    /// pool.
    pub fn configure<B: PlaybackBackend + ?Sized>(
        &mut self,
        handle: VoiceHandle,
        setup: VoiceSetup,
        backend: &mut B,
    ) -> Result<(), AudioError> {
        let voice = self.voice_for(handle)?;
        voice.clip = Some(setup.clip.clone());
        voice.volume = setup.volume;
        voice.pitch = setup.pitch;
        voice.position = setup.position;
        voice.spatial_blend = setup.spatial_blend;
        voice.bus = setup.bus.clone();

        let channel = handle.channel();
        backend.set_spatial_params(channel, setup.position, setup.spatial_blend);
        let request = PlaybackRequest {
            clip: setup.clip,
            volume: setup.volume,
            pitch: setup.pitch,
            bus: setup.bus,
        };
        if let Err(err) = backend.start_playback(channel, &request) {
            self.voices[handle.index].deactivate();
            return Err(err);
        }
        Ok(())
    }

    /// Schedule `handle` to return to the pool after `duration`.
    ///
    /// The timer fires on the first [`VoicePool::update`] at or past the
    /// deadline and is ignored if the voice has been re-acquired by then.
    pub fn release_after(&mut self, handle: VoiceHandle, duration: Duration) {
        if let Ok(voice) = self.voice_for(handle) {
            voice.remaining_lifetime = duration;
        }
        self.timers.push(ReleaseTimer {
            handle,
            remaining: duration,
        });
    }

    /// Advance release timers by `elapsed` and free voices whose timer fired.
    ///
    /// Returns the number of voices released.
    pub fn update<B: PlaybackBackend + ?Sized>(&mut self, elapsed: Duration, backend: &mut B) -> usize {
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            voice.remaining_lifetime = voice.remaining_lifetime.saturating_sub(elapsed);
        }

        let voices = &mut self.voices;
        let mut released = 0;
        self.timers.retain_mut(|timer| {
            timer.remaining = timer.remaining.saturating_sub(elapsed);
            if !timer.remaining.is_zero() {
                return true;
            }
            match voices.get_mut(timer.handle.index) {
                Some(voice) if voice.active && voice.generation == timer.handle.generation => {
                    voice.deactivate();
                    backend.stop_playback(timer.handle.channel());
                    released += 1;
                    debug!(voice = timer.handle.index, "Voice released");
                }
                _ => {
                    trace!(
                        voice = timer.handle.index,
                        generation = timer.handle.generation,
                        "Stale release timer skipped"
                    );
                }
            }
            false
        });
        released
    }

    /// Stop and free every voice, dropping pending timers.
    pub fn stop_all<B: PlaybackBackend + ?Sized>(&mut self, backend: &mut B) {
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            voice.deactivate();
            backend.stop_playback(Channel::Voice(voice.index));
        }
        self.timers.clear();
    }

    /// Voice at `index`.
    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    /// Currently borrowed voices.
    pub fn active_voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(|v| v.active)
    }

    /// Number of borrowed voices.
    pub fn active_count(&self) -> usize {
        self.active_voices().count()
    }

    /// Current number of voices.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Release timers not yet fired.
    pub fn pending_releases(&self) -> usize {
        self.timers.len()
    }

    fn voice_for(&mut self, handle: VoiceHandle) -> Result<&mut Voice, AudioError> {
        match self.voices.get_mut(handle.index) {
            Some(voice) if voice.active && voice.generation == handle.generation => Ok(voice),
            _ => Err(AudioError::StaleHandle {
                voice: handle.index,
            }),
        }
    }
}
