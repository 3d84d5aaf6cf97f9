//! Playback backend seam.
//!
//! The engine never touches an output device directly. Voices and the music
//! channel are addressed through [`PlaybackBackend`]; [`SimulatedBackend`]
//! models playback in memory and `RodioBackend` (feature `rodio_backend`) plays
//! through rodio.

use crate::{AudioError, AudioSettings, ClipRef, OutputBus};
use glam::Vec3;
use std::collections::HashMap;
use std::time::Duration;

/// A playback channel addressed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Pooled one-shot voice, by pool index.
    Voice(usize),
    /// The persistent background-music channel.
    Music,
}

/// Everything a backend needs to start a clip on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    /// Clip to play.
    pub clip: ClipRef,
    /// Voice volume (0.0 to 1.0), before bus gain.
    pub volume: f32,
    /// Playback pitch (-3.0 to 3.0).
    pub pitch: f32,
    /// Mixer bus the channel is routed through.
    pub bus: Option<OutputBus>,
}

/// Capabilities the engine requires from an audio output.
pub trait PlaybackBackend {
    /// Start `request` on `channel`, replacing whatever the channel was playing.
    fn start_playback(&mut self, channel: Channel, request: &PlaybackRequest)
        -> Result<(), AudioError>;

    /// Silence `channel`. Stopping an idle channel is a no-op.
    fn stop_playback(&mut self, channel: Channel);

    /// Whether `channel` is still producing audio.
    fn is_playing(&self, channel: Channel) -> bool;

    /// Position the channel. `blend` is 0 for 2D and 1 for fully positional.
    fn set_spatial_params(&mut self, channel: Channel, position: Option<Vec3>, blend: f32);

    /// Advance the backend clock. Real devices keep their own time.
    fn advance(&mut self, _elapsed: Duration) {}
}

impl<B: PlaybackBackend + ?Sized> PlaybackBackend for Box<B> {
    fn start_playback(
        &mut self,
        channel: Channel,
        request: &PlaybackRequest,
    ) -> Result<(), AudioError> {
        (**self).start_playback(channel, request)
    }

    fn stop_playback(&mut self, channel: Channel) {
        (**self).stop_playback(channel)
    }

    fn is_playing(&self, channel: Channel) -> bool {
        (**self).is_playing(channel)
    }

    fn set_spatial_params(&mut self, channel: Channel, position: Option<Vec3>, blend: f32) {
        (**self).set_spatial_params(channel, position, blend)
    }

    fn advance(&mut self, elapsed: Duration) {
        (**self).advance(elapsed)
    }
}

/// Gain applied to a positional channel heard from `listener`.
///
/// Linear falloff to silence at `max_distance`, mixed with full gain by
/// `1 - blend`.
pub fn spatial_gain(listener: Vec3, position: Option<Vec3>, blend: f32, max_distance: f32) -> f32 {
    let Some(position) = position else {
        return 1.0;
    };
    let blend = blend.clamp(0.0, 1.0);
    let distance = listener.distance(position);
    let falloff = if max_distance <= 0.0 || distance >= max_distance {
        0.0
    } else {
        1.0 - distance / max_distance
    };
    (1.0 - blend) + blend * falloff
}

/// A call observed by [`SimulatedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// A clip was started.
    Started {
        /// Target channel.
        channel: Channel,
        /// The request as received.
        request: PlaybackRequest,
        /// Output gain after bus settings.
        gain: f32,
    },
    /// A channel was stopped.
    Stopped {
        /// Target channel.
        channel: Channel,
    },
    /// Spatial parameters were applied.
    Spatial {
        /// Target channel.
        channel: Channel,
        /// World position, if positional.
        position: Option<Vec3>,
        /// 0 = 2D, 1 = 3D.
        blend: f32,
    },
}

/// Deterministic in-memory backend.
///
/// Records every call and treats a channel as playing until `advance` has
/// consumed the clip's duration. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    settings: AudioSettings,
    events: Vec<BackendEvent>,
    playing: HashMap<Channel, Duration>,
}

impl SimulatedBackend {
    /// Create a backend with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend applying `settings` to reported gains.
    pub fn with_settings(settings: AudioSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// All recorded calls, oldest first.
    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    /// Drain the recorded calls.
    pub fn take_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.events)
    }

    /// Requests started so far, oldest first.
    pub fn started(&self) -> Vec<(Channel, &PlaybackRequest)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Started {
                    channel, request, ..
                } => Some((*channel, request)),
                _ => None,
            })
            .collect()
    }

    /// End playback on `channel` immediately, as if the clip ran out.
    pub fn finish(&mut self, channel: Channel) {
        self.playing.remove(&channel);
    }

    /// Number of channels currently producing audio.
    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }
}

impl PlaybackBackend for SimulatedBackend {
    fn start_playback(
        &mut self,
        channel: Channel,
        request: &PlaybackRequest,
    ) -> Result<(), AudioError> {
        let gain = request.volume * self.settings.bus_gain(request.bus.as_ref());
        self.playing.insert(channel, request.clip.duration());
        self.events.push(BackendEvent::Started {
            channel,
            request: request.clone(),
            gain,
        });
        Ok(())
    }

    fn stop_playback(&mut self, channel: Channel) {
        self.playing.remove(&channel);
        self.events.push(BackendEvent::Stopped { channel });
    }

    fn is_playing(&self, channel: Channel) -> bool {
        self.playing.contains_key(&channel)
    }

    fn set_spatial_params(&mut self, channel: Channel, position: Option<Vec3>, blend: f32) {
        self.events.push(BackendEvent::Spatial {
            channel,
            position,
            blend,
        });
    }

    fn advance(&mut self, elapsed: Duration) {
        self.playing.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(elapsed);
            !remaining.is_zero()
        });
    }
}

#[cfg(feature = "rodio_backend")]
mod rodio_output {
    use super::*;
    use anyhow::{Context, Result};
    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
    use std::io::Cursor;
    use std::sync::Arc;
    use tracing::debug;

    /// Default audible range for positional channels.
    const DEFAULT_MAX_DISTANCE: f32 = 16.0;

    /// Backend playing through the default rodio output device.
    pub struct RodioBackend {
        /// Output stream (must be kept alive)
        _stream: OutputStream,
        stream_handle: OutputStreamHandle,
        settings: AudioSettings,
        clips: HashMap<Arc<str>, Arc<Vec<u8>>>,
        sinks: HashMap<Channel, Sink>,
        spatial: HashMap<Channel, (Option<Vec3>, f32)>,
        listener: Vec3,
        max_distance: f32,
    }

    impl RodioBackend {
        /// Open the default output device.
        pub fn new(settings: AudioSettings) -> Result<Self> {
            let (stream, stream_handle) =
                OutputStream::try_default().context("Failed to create audio output stream")?;
            debug!("Audio backend: rodio");

            Ok(Self {
                _stream: stream,
                stream_handle,
                settings,
                clips: HashMap::new(),
                sinks: HashMap::new(),
                spatial: HashMap::new(),
                listener: Vec3::ZERO,
                max_distance: DEFAULT_MAX_DISTANCE,
            })
        }

        /// Load encoded audio for `clip` into memory.
        pub fn load_clip(&mut self, clip: &ClipRef, data: Vec<u8>) {
            self.clips.insert(Arc::from(clip.id()), Arc::new(data));
            debug!("Loaded clip: {}", clip);
        }

        /// Replace the volume settings applied per bus.
        pub fn set_settings(&mut self, settings: AudioSettings) {
            self.settings = settings;
        }

        /// Move the listener used for positional falloff.
        pub fn set_listener_position(&mut self, position: Vec3) {
            self.listener = position;
        }

        /// Distance at which positional channels fall silent.
        pub fn set_max_distance(&mut self, distance: f32) {
            self.max_distance = distance;
        }
    }

    impl PlaybackBackend for RodioBackend {
        fn start_playback(
            &mut self,
            channel: Channel,
            request: &PlaybackRequest,
        ) -> Result<(), AudioError> {
            let data = self
                .clips
                .get(request.clip.id())
                .ok_or_else(|| AudioError::ClipNotLoaded(request.clip.id().to_string()))?;
            // Decoder needs owned 'static data
            let source = rodio::Decoder::new(Cursor::new(data.as_ref().clone()))
                .map_err(|e| AudioError::Backend(e.to_string()))?;
            // rodio cannot play backwards; negative pitch plays forward at the same rate
            let speed = request.pitch.abs().max(0.01);

            let sink = Sink::try_new(&self.stream_handle)
                .map_err(|e| AudioError::Backend(e.to_string()))?;
            let (position, blend) = self.spatial.get(&channel).copied().unwrap_or((None, 0.0));
            let gain = request.volume
                * self.settings.bus_gain(request.bus.as_ref())
                * spatial_gain(self.listener, position, blend, self.max_distance);
            sink.set_volume(gain);
            sink.append(source.speed(speed));

            if let Some(previous) = self.sinks.insert(channel, sink) {
                previous.stop();
            }
            Ok(())
        }

        fn stop_playback(&mut self, channel: Channel) {
            if let Some(sink) = self.sinks.remove(&channel) {
                sink.stop();
            }
        }

        fn is_playing(&self, channel: Channel) -> bool {
            self.sinks
                .get(&channel)
                .map(|s| !s.empty() && !s.is_paused())
                .unwrap_or(false)
        }

        fn set_spatial_params(&mut self, channel: Channel, position: Option<Vec3>, blend: f32) {
            self.spatial.insert(channel, (position, blend));
        }

        fn advance(&mut self, _elapsed: Duration) {
            self.sinks.retain(|_, sink| !sink.empty());
        }
    }
}

#[cfg(feature = "rodio_backend")]
pub use rodio_output::RodioBackend;
