//! Game audio for sfxkit.
//!
//! Maps symbolic sound names to clip variants, plays them on a bounded pool of
//! reusable voices (2D or positional), and rotates background music through a
//! single persistent channel.
//!
//! # Architecture
//!
//! - [`SoundRegistry`] - Name-indexed, read-only store of [`SoundAsset`]s
//! - [`VoicePool`] - Bounded set of reusable voices with timed release
//! - [`SoundDispatcher`] - Resolve, randomize, acquire, configure, schedule release
//! - [`MusicRotator`] - Round-robin background tracks, advanced per tick
//! - [`PlaybackBackend`] - Seam to the audio output ([`SimulatedBackend`], `RodioBackend`)
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SoundRegistry::load(manifest.assets));
//! let dispatcher = SoundDispatcher::new(registry, PoolConfig::default(), SimulatedBackend::new());
//! dispatcher.play("jump", PlayParams::default());
//! dispatcher.update(Duration::from_millis(50));
//! ```

mod asset;
mod backend;
mod dispatcher;
mod error;
mod hooks;
mod manifest;
mod music;
mod pool;
mod random;
mod registry;
mod settings;

pub use asset::{ClipRef, ClipVariant, OutputBus, SoundAsset, MAX_PITCH, MIN_PITCH};
pub use backend::{spatial_gain, BackendEvent, Channel, PlaybackBackend, PlaybackRequest, SimulatedBackend};
#[cfg(feature = "rodio_backend")]
pub use backend::RodioBackend;
pub use dispatcher::{mix_pitch, mix_volume, PlayParams, SoundDispatcher};
pub use error::{AssetError, AudioError};
pub use hooks::{HookPhase, StateSoundHook};
pub use manifest::{manifest_from_file, manifest_from_str, sounds_from_dir, SoundManifest};
pub use music::{MusicRotator, RotatorState};
pub use pool::{ExhaustionPolicy, PoolConfig, Voice, VoiceCategory, VoiceHandle, VoicePool, VoiceSetup};
pub use random::{RandomSource, RngSource};
pub use registry::SoundRegistry;
pub use settings::AudioSettings;
