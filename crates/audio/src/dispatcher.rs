//! Sound dispatcher: the public entry point for one-shot playback.

use crate::pool::{PoolConfig, VoiceCategory, VoiceHandle, VoicePool, VoiceSetup};
use crate::{
    AudioError, PlaybackBackend, RandomSource, RngSource, SoundRegistry, MAX_PITCH, MIN_PITCH,
};
use glam::Vec3;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Caller-side volume and pitch for a play request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayParams {
    /// Base volume before variance (0.0 to 1.0).
    pub volume: f32,
    /// Base pitch before variance.
    pub pitch: f32,
    /// Maximum random offset applied to `volume`.
    pub volume_variance: f32,
    /// Maximum random offset applied to `pitch`.
    pub pitch_variance: f32,
}

impl Default for PlayParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            volume_variance: 0.0,
            pitch_variance: 0.0,
        }
    }
}

impl PlayParams {
    /// Defaults with an explicit base volume.
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume,
            ..Self::default()
        }
    }

    /// Set the base pitch.
    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set both variance spreads.
    pub fn variance(mut self, volume_variance: f32, pitch_variance: f32) -> Self {
        self.volume_variance = volume_variance;
        self.pitch_variance = pitch_variance;
        self
    }
}

/// Final voice volume.
///
/// The jittered base is clamped to [0, 1] before the variant volume is
/// applied, then the product is clamped again. The order changes the result
/// whenever `base + jitter` leaves [0, 1]. NaN inputs fall back to 1.
pub fn mix_volume(base: f32, jitter: f32, variant_volume: f32) -> f32 {
    let jittered = or_unit(base + jitter).clamp(0.0, 1.0);
    or_unit(jittered * or_unit(variant_volume)).clamp(0.0, 1.0)
}

/// Final voice pitch, clamped to [-3, 3] before and after the variant pitch.
/// NaN inputs fall back to 1.
pub fn mix_pitch(base: f32, jitter: f32, variant_pitch: f32) -> f32 {
    let jittered = or_unit(base + jitter).clamp(MIN_PITCH, MAX_PITCH);
    or_unit(jittered * or_unit(variant_pitch)).clamp(MIN_PITCH, MAX_PITCH)
}

// `f32::clamp` passes NaN through
fn or_unit(value: f32) -> f32 {
    if value.is_nan() {
        1.0
    } else {
        value
    }
}

struct DispatchState<B, R> {
    pool: VoicePool,
    backend: B,
    rng: R,
}

/// Resolves sound names and plays them on pooled voices.
///
/// All methods take `&self`; pool, backend and random source sit behind one
/// mutex so concurrent or reentrant callers never share a voice. The registry
/// is read without locking.
pub struct SoundDispatcher<B, R = RngSource<StdRng>> {
    registry: Arc<SoundRegistry>,
    state: Mutex<DispatchState<B, R>>,
}

impl<B: PlaybackBackend> SoundDispatcher<B> {
    /// Create a dispatcher with an entropy-seeded random source.
    pub fn new(registry: Arc<SoundRegistry>, pool: PoolConfig, backend: B) -> Self {
        Self::with_rng(registry, pool, backend, RngSource::from_entropy())
    }
}

impl<B: PlaybackBackend, R: RandomSource> SoundDispatcher<B, R> {
    /// Create a dispatcher with an explicit random source.
    pub fn with_rng(registry: Arc<SoundRegistry>, pool: PoolConfig, backend: B, rng: R) -> Self {
        Self {
            registry,
            state: Mutex::new(DispatchState {
                pool: VoicePool::new(pool),
                backend,
                rng,
            }),
        }
    }

    /// Play `name` without spatialization.
    ///
    /// Unknown names and a full pool are logged and dropped; the returned
    /// handle is `None` in that case.
    pub fn play(&self, name: &str, params: PlayParams) -> Option<VoiceHandle> {
        report(name, self.try_play(name, params))
    }

    /// Play `name` at a world position.
    pub fn play_at_position(
        &self,
        name: &str,
        position: Vec3,
        params: PlayParams,
    ) -> Option<VoiceHandle> {
        report(name, self.try_play_at_position(name, position, params))
    }

    /// [`SoundDispatcher::play`], surfacing why a request was dropped.
    pub fn try_play(&self, name: &str, params: PlayParams) -> Result<VoiceHandle, AudioError> {
        self.dispatch(name, None, params)
    }

    /// [`SoundDispatcher::play_at_position`], surfacing why a request was dropped.
    pub fn try_play_at_position(
        &self,
        name: &str,
        position: Vec3,
        params: PlayParams,
    ) -> Result<VoiceHandle, AudioError> {
        self.dispatch(name, Some(position), params)
    }

    fn dispatch(
        &self,
        name: &str,
        position: Option<Vec3>,
        params: PlayParams,
    ) -> Result<VoiceHandle, AudioError> {
        let asset = self.registry.resolve(name)?;
        if asset.is_empty() {
            return Err(AudioError::NotFound(name.to_string()));
        }

        let mut guard = self.lock();
        let state = &mut *guard;

        let index = state.rng.pick_index(asset.variants().len());
        let variant = &asset.variants()[index];
        let volume_jitter = state.rng.jitter(params.volume_variance);
        let pitch_jitter = state.rng.jitter(params.pitch_variance);
        let volume = mix_volume(params.volume, volume_jitter, variant.volume);
        let pitch = mix_pitch(params.pitch, pitch_jitter, variant.pitch);

        let handle = state.pool.acquire(VoiceCategory::Generic)?;
        let setup = VoiceSetup {
            clip: variant.clip.clone(),
            volume,
            pitch,
            position,
            spatial_blend: if position.is_some() { 1.0 } else { 0.0 },
            bus: asset.bus().cloned(),
        };
        state.pool.configure(handle, setup, &mut state.backend)?;
        state.pool.release_after(handle, variant.clip.duration());

        debug!(
            sound = name,
            voice = handle.index(),
            clip = %variant.clip,
            volume,
            pitch,
            "Playing sound"
        );
        Ok(handle)
    }

    /// Per-tick entry point: advance the backend clock and fire due releases.
    pub fn update(&self, elapsed: Duration) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.backend.advance(elapsed);
        state.pool.update(elapsed, &mut state.backend);
    }

    /// Stop every voice. Used at teardown.
    pub fn stop_all(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.pool.stop_all(&mut state.backend);
    }

    /// Number of voices currently borrowed.
    pub fn active_voices(&self) -> usize {
        self.lock().pool.active_count()
    }

    /// Current pool size.
    pub fn capacity(&self) -> usize {
        self.lock().pool.capacity()
    }

    /// The registry sounds are resolved from.
    pub fn registry(&self) -> &Arc<SoundRegistry> {
        &self.registry
    }

    /// Run `f` with exclusive access to the pool.
    pub fn with_pool<T>(&self, f: impl FnOnce(&VoicePool) -> T) -> Option<T> {
        Some(f(&self.lock().pool))
    }

    /// Run `f` with exclusive access to the backend.
    pub fn with_backend<T>(&self, f: impl FnOnce(&mut B) -> T) -> Option<T> {
        Some(f(&mut self.lock().backend))
    }

    /// Pool state stays consistent across a panicking caller, so a poisoned
    /// lock is recovered rather than disabling playback.
    fn lock(&self) -> MutexGuard<'_, DispatchState<B, R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn report(name: &str, result: Result<VoiceHandle, AudioError>) -> Option<VoiceHandle> {
    match result {
        Ok(handle) => Some(handle),
        Err(err @ AudioError::NotFound(_)) => {
            warn!(sound = name, "{err}");
            None
        }
        Err(err @ AudioError::Exhausted { .. }) => {
            warn!(sound = name, "Dropping play request: {err}");
            None
        }
        Err(err) => {
            warn!(sound = name, "Failed to play sound: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, ClipRef, ClipVariant, OutputBus, SimulatedBackend, SoundAsset};

    /// Random source returning fixed values.
    struct Fixed {
        index: usize,
        /// Fraction of the spread, in [-1, 1].
        jitter: f32,
    }

    impl RandomSource for Fixed {
        fn pick_index(&mut self, len: usize) -> usize {
            self.index.min(len - 1)
        }

        fn jitter(&mut self, spread: f32) -> f32 {
            spread.abs() * self.jitter
        }
    }

    fn clip(id: &str) -> ClipRef {
        ClipRef::new(id, Duration::from_millis(200))
    }

    fn dispatcher(
        assets: Vec<SoundAsset>,
        capacity: usize,
        rng: Fixed,
    ) -> SoundDispatcher<SimulatedBackend, Fixed> {
        SoundDispatcher::with_rng(
            Arc::new(SoundRegistry::load(assets)),
            PoolConfig::fixed(capacity),
            SimulatedBackend::new(),
            rng,
        )
    }

    fn neutral() -> Fixed {
        Fixed {
            index: 0,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_volume_clamps_before_variant_multiply() {
        // 0.9 + 0.5 clamps to 1.0 first, then * 0.5
        assert!((mix_volume(0.9, 0.5, 0.5) - 0.5).abs() < 1e-6);
        // Multiply-then-clamp would have given 0.7
        assert!(((0.9f32 + 0.5) * 0.5 - 0.7).abs() < 1e-6);
        assert_eq!(mix_volume(0.1, -0.5, 1.0), 0.0);
        assert_eq!(mix_volume(1.0, 0.0, 0.5), 0.5);
    }

    #[test]
    fn test_pitch_clamped_to_range() {
        assert_eq!(mix_pitch(2.5, 1.0, 3.0), 3.0);
        assert_eq!(mix_pitch(-2.5, -1.0, 3.0), -3.0);
        assert!((mix_pitch(1.0, 0.0, 0.5) - 0.5).abs() < 1e-6);
        // Base clamps to 3 first, then * -1
        assert_eq!(mix_pitch(4.0, 0.0, -1.0), -3.0);
    }

    #[test]
    fn test_play_configures_single_2d_voice() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::new(clip("A"), 1.0, 1.0)]);
        let dispatcher = dispatcher(vec![jump], 4, neutral());

        let handle = dispatcher.play("jump", PlayParams::default()).unwrap();
        assert_eq!(dispatcher.active_voices(), 1);

        dispatcher.with_pool(|pool| {
            let voice = pool.voice(handle.index()).unwrap();
            assert_eq!(voice.clip().map(ClipRef::id), Some("A"));
            assert_eq!(voice.volume(), 1.0);
            assert_eq!(voice.pitch(), 1.0);
            assert_eq!(voice.spatial_blend(), 0.0);
            assert_eq!(voice.position(), None);
        });
        let started = dispatcher.with_backend(|b| b.started().len()).unwrap();
        assert_eq!(started, 1);
    }

    #[test]
    fn test_missing_sound_acquires_nothing() {
        let dispatcher = dispatcher(Vec::new(), 4, neutral());
        assert!(dispatcher.play("missing", PlayParams::default()).is_none());
        assert_eq!(
            dispatcher.try_play("missing", PlayParams::default()),
            Err(AudioError::NotFound("missing".into()))
        );
        assert_eq!(dispatcher.active_voices(), 0);
        assert!(dispatcher.with_backend(|b| b.events().is_empty()).unwrap());
    }

    #[test]
    fn test_empty_variant_list_is_not_found() {
        let empty = SoundAsset::new("silence", None, Vec::new());
        let dispatcher = dispatcher(vec![empty], 4, neutral());
        assert_eq!(
            dispatcher.try_play("silence", PlayParams::default()),
            Err(AudioError::NotFound("silence".into()))
        );
        assert_eq!(dispatcher.active_voices(), 0);
    }

    #[test]
    fn test_variant_volume_scales_final_volume() {
        let soft = SoundAsset::new("soft", None, vec![ClipVariant::new(clip("A"), 0.5, 1.0)]);
        let dispatcher = dispatcher(vec![soft], 1, neutral());
        let handle = dispatcher.play("soft", PlayParams::default()).unwrap();
        let volume = dispatcher
            .with_pool(|pool| pool.voice(handle.index()).unwrap().volume())
            .unwrap();
        assert!((volume - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_exhausted_pool_drops_second_request() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::unit(clip("A"))]);
        let dispatcher = dispatcher(vec![jump], 1, neutral());

        let first = dispatcher.play("jump", PlayParams::default()).unwrap();
        assert_eq!(
            dispatcher.try_play("jump", PlayParams::default()),
            Err(AudioError::Exhausted { capacity: 1 })
        );
        assert!(dispatcher.play("jump", PlayParams::default()).is_none());

        let playing = dispatcher
            .with_backend(|b| b.is_playing(first.channel()))
            .unwrap();
        assert!(playing);
        assert_eq!(dispatcher.with_backend(|b| b.started().len()).unwrap(), 1);
    }

    #[test]
    fn test_play_at_position_is_fully_spatial() {
        let bus = OutputBus::new("sfx");
        let boom = SoundAsset::new("boom", Some(bus.clone()), vec![ClipVariant::unit(clip("B"))]);
        let dispatcher = dispatcher(vec![boom], 2, neutral());
        let position = Vec3::new(4.0, 0.0, -2.0);

        let handle = dispatcher
            .play_at_position("boom", position, PlayParams::default())
            .unwrap();
        dispatcher.with_pool(|pool| {
            let voice = pool.voice(handle.index()).unwrap();
            assert_eq!(voice.spatial_blend(), 1.0);
            assert_eq!(voice.position(), Some(position));
            assert_eq!(voice.bus(), Some(&bus));
        });
    }

    #[test]
    fn test_variant_selection_uses_random_source() {
        let steps = SoundAsset::new(
            "step",
            None,
            vec![
                ClipVariant::unit(clip("s0")),
                ClipVariant::unit(clip("s1")),
                ClipVariant::unit(clip("s2")),
            ],
        );
        let dispatcher = dispatcher(
            vec![steps],
            1,
            Fixed {
                index: 2,
                jitter: 0.0,
            },
        );
        dispatcher.play("step", PlayParams::default()).unwrap();
        let clip_id = dispatcher
            .with_backend(|b| b.started()[0].1.clip.id().to_string())
            .unwrap();
        assert_eq!(clip_id, "s2");
    }

    #[test]
    fn test_extreme_jitter_stays_in_range() {
        let loud = SoundAsset::new("loud", None, vec![ClipVariant::new(clip("A"), 1.0, 3.0)]);
        for jitter in [-1.0, 1.0] {
            let dispatcher = dispatcher(vec![loud.clone()], 1, Fixed { index: 0, jitter });
            let handle = dispatcher
                .play("loud", PlayParams::default().variance(5.0, 5.0))
                .unwrap();
            dispatcher.with_pool(|pool| {
                let voice = pool.voice(handle.index()).unwrap();
                assert!((0.0..=1.0).contains(&voice.volume()));
                assert!((MIN_PITCH..=MAX_PITCH).contains(&voice.pitch()));
            });
        }
    }

    #[test]
    fn test_voice_returns_after_clip_duration() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::unit(clip("A"))]);
        let dispatcher = dispatcher(vec![jump], 1, neutral());
        dispatcher.play("jump", PlayParams::default()).unwrap();

        dispatcher.update(Duration::from_millis(150));
        assert_eq!(dispatcher.active_voices(), 1);
        dispatcher.update(Duration::from_millis(50));
        assert_eq!(dispatcher.active_voices(), 0);
        assert!(!dispatcher
            .with_backend(|b| b.is_playing(Channel::Voice(0)))
            .unwrap());
        assert!(dispatcher.play("jump", PlayParams::default()).is_some());
    }

    #[test]
    fn test_stop_all_frees_pool() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::unit(clip("A"))]);
        let dispatcher = dispatcher(vec![jump], 3, neutral());
        for _ in 0..3 {
            dispatcher.play("jump", PlayParams::default()).unwrap();
        }
        assert_eq!(dispatcher.active_voices(), 3);
        dispatcher.stop_all();
        assert_eq!(dispatcher.active_voices(), 0);
        assert_eq!(dispatcher.capacity(), 3);
    }

    #[test]
    fn test_non_finite_params_stay_in_range() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::unit(clip("A"))]);
        let dispatcher = dispatcher(vec![jump], 4, neutral());
        let cases = [
            PlayParams::default().pitch(f32::NAN),
            PlayParams::with_volume(f32::NAN),
            PlayParams::with_volume(f32::NEG_INFINITY).pitch(f32::INFINITY),
            PlayParams::with_volume(f32::INFINITY).pitch(f32::NEG_INFINITY),
        ];
        for params in cases {
            let handle = dispatcher.play("jump", params).unwrap();
            dispatcher.with_pool(|pool| {
                let voice = pool.voice(handle.index()).unwrap();
                assert!((0.0..=1.0).contains(&voice.volume()), "{params:?}");
                assert!((MIN_PITCH..=MAX_PITCH).contains(&voice.pitch()), "{params:?}");
            });
        }
        assert_eq!(mix_pitch(f32::NAN, 0.0, 2.0), 2.0);
        assert_eq!(mix_volume(f32::NAN, 0.0, 0.5), 0.5);
        assert_eq!(mix_volume(0.0, 0.0, f32::INFINITY), 1.0);
    }

    #[test]
    fn test_max_variance_keeps_dispatcher_usable() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::unit(clip("A"))]);
        let dispatcher = SoundDispatcher::with_rng(
            Arc::new(SoundRegistry::load([jump])),
            PoolConfig::fixed(2),
            SimulatedBackend::new(),
            RngSource::seeded(9),
        );
        let wild = dispatcher
            .play("jump", PlayParams::default().variance(f32::MAX, f32::MAX))
            .unwrap();
        dispatcher.with_pool(|pool| {
            let voice = pool.voice(wild.index()).unwrap();
            assert!((0.0..=1.0).contains(&voice.volume()));
            assert!((MIN_PITCH..=MAX_PITCH).contains(&voice.pitch()));
        });
        assert!(dispatcher.play("jump", PlayParams::default()).is_some());
    }

    #[test]
    fn test_poisoned_state_is_recovered() {
        let jump = SoundAsset::new("jump", None, vec![ClipVariant::unit(clip("A"))]);
        let dispatcher = dispatcher(vec![jump], 1, neutral());
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatcher.with_backend(|_| panic!("backend callback failed"));
        }));
        assert!(panicked.is_err());

        let handle = dispatcher.play("jump", PlayParams::default()).unwrap();
        assert_eq!(dispatcher.active_voices(), 1);
        dispatcher.update(Duration::from_millis(200));
        assert_eq!(dispatcher.active_voices(), 0);
        assert!(!dispatcher
            .with_backend(|b| b.is_playing(handle.channel()))
            .unwrap());
    }
}
