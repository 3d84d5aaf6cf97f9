use crate::command_script::{CommandScriptPlayer, SoundCommand};
use crate::config::AudioConfig;
use anyhow::{Context, Result};
use sfxkit_audio::{
    manifest_from_file, sounds_from_dir, AudioSettings, HookPhase, MusicRotator, PlaybackBackend,
    RngSource, SoundDispatcher, SoundManifest, SoundRegistry,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct HeadlessConfig {
    pub audio: AudioConfig,
    pub command_script: Option<PathBuf>,
    pub max_ticks: Option<u64>,
    pub realtime: bool,
}

/// What a headless run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub played: usize,
    pub dropped: usize,
}

pub fn run(cfg: HeadlessConfig) -> Result<RunSummary> {
    let manifest = load_manifest(&cfg.audio.manifest)?;
    let clip_paths = manifest.clip_paths;
    let registry = Arc::new(SoundRegistry::load(manifest.assets));
    info!(sounds = registry.len(), "Sound registry loaded");

    let script = cfg
        .command_script
        .as_deref()
        .map(CommandScriptPlayer::from_path)
        .transpose()?;

    let settings = cfg.audio.settings();
    let mut session = Session::new(&cfg.audio, registry, || {
        open_backend(&settings, &clip_paths)
    })?;
    let summary = session.run(script, cfg.max_ticks, cfg.realtime);
    info!(
        ticks = summary.ticks,
        played = summary.played,
        dropped = summary.dropped,
        "Headless run finished"
    );
    Ok(summary)
}

/// Load a manifest file, or a directory holding one JSON file per sound.
pub fn load_manifest(path: &Path) -> Result<SoundManifest> {
    let manifest = if path.is_dir() {
        sounds_from_dir(path)
    } else {
        manifest_from_file(path)
    };
    manifest.with_context(|| format!("failed to load sound manifest {}", path.display()))
}

#[cfg(not(feature = "rodio_backend"))]
fn open_backend(
    settings: &AudioSettings,
    _clip_paths: &BTreeMap<String, PathBuf>,
) -> Result<Box<dyn PlaybackBackend>> {
    Ok(Box::new(sfxkit_audio::SimulatedBackend::with_settings(
        settings.clone(),
    )))
}

#[cfg(feature = "rodio_backend")]
fn open_backend(
    settings: &AudioSettings,
    clip_paths: &BTreeMap<String, PathBuf>,
) -> Result<Box<dyn PlaybackBackend>> {
    use sfxkit_audio::{ClipRef, RodioBackend, SimulatedBackend};

    let mut backend = match RodioBackend::new(settings.clone()) {
        Ok(backend) => backend,
        Err(err) => {
            warn!("Audio output unavailable, playing silently: {err:#}");
            return Ok(Box::new(SimulatedBackend::with_settings(settings.clone())));
        }
    };
    for (id, path) in clip_paths {
        match std::fs::read(path) {
            Ok(data) => backend.load_clip(&ClipRef::new(id.as_str(), Duration::ZERO), data),
            Err(err) => warn!(clip = %id, path = %path.display(), "Failed to read clip: {err}"),
        }
    }
    Ok(Box::new(backend))
}

/// Dispatcher, music rotator and hooks driven by one tick clock.
pub struct Session<B> {
    dispatcher: SoundDispatcher<B>,
    music: Option<MusicRotator<B>>,
    audio: AudioConfig,
    tick: Duration,
    summary: RunSummary,
}

impl<B: PlaybackBackend> Session<B> {
    /// Build a session. `open_backend` is called once for the voice pool and
    /// once more if a music sound is configured.
    pub fn new(
        audio: &AudioConfig,
        registry: Arc<SoundRegistry>,
        mut open_backend: impl FnMut() -> Result<B>,
    ) -> Result<Self> {
        let rng = match audio.seed {
            Some(seed) => RngSource::seeded(seed),
            None => RngSource::from_entropy(),
        };
        let dispatcher =
            SoundDispatcher::with_rng(Arc::clone(&registry), audio.pool, open_backend()?, rng);

        let music = match audio.music.as_deref() {
            Some(name) => match registry.resolve(name) {
                Ok(asset) => Some(MusicRotator::new(asset, open_backend()?)),
                Err(err) => {
                    warn!("Background music disabled: {err}");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            dispatcher,
            music,
            audio: audio.clone(),
            tick: Duration::from_millis(audio.tick_millis.max(1)),
            summary: RunSummary::default(),
        })
    }

    pub fn execute(&mut self, command: SoundCommand) {
        debug!(?command, "Executing sound command");
        match command {
            SoundCommand::Play { sound, params } => {
                let handle = self.dispatcher.play(&sound, params);
                self.record(handle.is_some());
            }
            SoundCommand::PlayAt {
                sound,
                position,
                params,
            } => {
                let handle = self.dispatcher.play_at_position(&sound, position, params);
                self.record(handle.is_some());
            }
            SoundCommand::Enter(state) => self.fire_hooks(&state, HookPhase::Enter),
            SoundCommand::Exit(state) => self.fire_hooks(&state, HookPhase::Exit),
            SoundCommand::Music => match self.music.as_mut() {
                Some(music) => music.activate(),
                None => warn!("No background music configured"),
            },
        }
    }

    fn fire_hooks(&mut self, state: &str, phase: HookPhase) {
        let fired: Vec<bool> = self
            .audio
            .hooks_for(state)
            .filter(|hook| hook.phase == phase)
            .map(|hook| match phase {
                HookPhase::Enter => hook.on_state_enter(&self.dispatcher).is_some(),
                HookPhase::Exit => hook.on_state_exit(&self.dispatcher).is_some(),
            })
            .collect();
        for played in fired {
            self.record(played);
        }
    }

    fn record(&mut self, played: bool) {
        if played {
            self.summary.played += 1;
        } else {
            self.summary.dropped += 1;
        }
    }

    /// Advance every clock by one tick.
    pub fn step(&mut self) {
        self.dispatcher.update(self.tick);
        if let Some(music) = self.music.as_mut() {
            music.update(self.tick);
        }
    }

    /// Run until the script is exhausted and every voice has been released,
    /// or until `max_ticks`. Stops all voices before returning.
    pub fn run(
        &mut self,
        mut script: Option<CommandScriptPlayer>,
        max_ticks: Option<u64>,
        realtime: bool,
    ) -> RunSummary {
        let mut tick = 0u64;
        loop {
            if let Some(script) = script.as_mut() {
                for command in script.drain_ready_commands(tick) {
                    self.execute(command);
                }
            }
            self.step();
            tick += 1;

            let script_done = script
                .as_ref()
                .map_or(true, CommandScriptPlayer::is_finished);
            if script_done && self.dispatcher.active_voices() == 0 {
                break;
            }
            if max_ticks.is_some_and(|max| tick >= max) {
                debug!(tick, "Max ticks reached");
                break;
            }
            if realtime {
                std::thread::sleep(self.tick);
            }
        }

        self.dispatcher.stop_all();
        self.summary.ticks = tick;
        self.summary
    }

    pub fn dispatcher(&self) -> &SoundDispatcher<B> {
        &self.dispatcher
    }

    pub fn music(&self) -> Option<&MusicRotator<B>> {
        self.music.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfxkit_audio::{
        BackendEvent, ClipRef, ClipVariant, PoolConfig, RotatorState, SimulatedBackend,
        SoundAsset, StateSoundHook,
    };

    fn registry() -> Arc<SoundRegistry> {
        let clip = |id: &str, ms: u64| ClipVariant::unit(ClipRef::new(id, Duration::from_millis(ms)));
        Arc::new(SoundRegistry::load([
            SoundAsset::new("jump", None, vec![clip("jump", 100)]),
            SoundAsset::new("swing", None, vec![clip("swing", 50)]),
            SoundAsset::new("theme", None, vec![clip("theme_a", 200), clip("theme_b", 200)]),
        ]))
    }

    fn config() -> AudioConfig {
        AudioConfig {
            seed: Some(7),
            music: Some("theme".into()),
            pool: PoolConfig::fixed(1),
            hooks: vec![
                StateSoundHook::new("attack", "swing", HookPhase::Enter),
                StateSoundHook::new("attack", "jump", HookPhase::Exit),
            ],
            ..AudioConfig::default()
        }
    }

    fn session() -> Session<SimulatedBackend> {
        Session::new(&config(), registry(), || Ok(SimulatedBackend::new())).unwrap()
    }

    #[test]
    fn run_ends_once_script_and_voices_are_done() {
        let script = CommandScriptPlayer::from_json(
            r#"{"steps": [{"tick": 0, "command": "play jump"}]}"#,
        )
        .unwrap();
        let summary = session().run(Some(script), None, false);
        // 100ms clip at 50ms ticks
        assert_eq!(
            summary,
            RunSummary {
                ticks: 2,
                played: 1,
                dropped: 0
            }
        );
    }

    #[test]
    fn full_pool_and_unknown_sounds_are_counted_as_dropped() {
        let script = CommandScriptPlayer::from_json(
            r#"{"steps": [
                {"tick": 0, "command": "play jump"},
                {"tick": 0, "command": "play jump"},
                {"tick": 1, "command": "play missing"}
            ]}"#,
        )
        .unwrap();
        let summary = session().run(Some(script), None, false);
        assert_eq!(summary.played, 1);
        assert_eq!(summary.dropped, 2);
    }

    #[test]
    fn hooks_fire_on_their_own_phase() {
        let mut session = session();
        session.execute(SoundCommand::Enter("attack".into()));
        let clips: Vec<String> = session
            .dispatcher()
            .with_backend(|backend| {
                backend
                    .started()
                    .into_iter()
                    .map(|(_, request)| request.clip.id().to_string())
                    .collect()
            })
            .unwrap();
        assert_eq!(clips, vec!["swing"]);

        session.execute(SoundCommand::Enter("idle".into()));
        assert_eq!(session.dispatcher().active_voices(), 1);
    }

    #[test]
    fn exit_hooks_fire_only_for_their_state() {
        let audio = AudioConfig {
            pool: PoolConfig::fixed(4),
            ..config()
        };
        let mut session = Session::new(&audio, registry(), || Ok(SimulatedBackend::new())).unwrap();
        session.execute(SoundCommand::Exit("attack".into()));
        session.execute(SoundCommand::Exit("idle".into()));

        let clips: Vec<String> = session
            .dispatcher()
            .with_backend(|backend| {
                backend
                    .started()
                    .into_iter()
                    .map(|(_, request)| request.clip.id().to_string())
                    .collect()
            })
            .unwrap();
        assert_eq!(clips, vec!["jump"]);
        assert_eq!(session.summary.played, 1);
        assert_eq!(session.summary.dropped, 0);
    }

    #[test]
    fn music_command_starts_rotation() {
        let mut session = session();
        assert_eq!(session.music().map(MusicRotator::state), Some(RotatorState::Idle));
        session.execute(SoundCommand::Music);
        for _ in 0..4 {
            session.step();
        }
        assert_eq!(
            session.music().map(MusicRotator::state),
            Some(RotatorState::Playing(1))
        );
    }

    #[test]
    fn max_ticks_bounds_the_run_and_stops_voices() {
        let registry = Arc::new(SoundRegistry::load([SoundAsset::new(
            "drone",
            None,
            vec![ClipVariant::unit(ClipRef::new("drone", Duration::from_secs(60)))],
        )]));
        let audio = AudioConfig {
            seed: Some(1),
            ..AudioConfig::default()
        };
        let mut session = Session::new(&audio, registry, || Ok(SimulatedBackend::new())).unwrap();
        let script = CommandScriptPlayer::from_json(
            r#"{"steps": [{"tick": 0, "command": "play drone"}]}"#,
        )
        .unwrap();

        let summary = session.run(Some(script), Some(5), false);
        assert_eq!(summary.ticks, 5);
        assert_eq!(session.dispatcher().active_voices(), 0);
        let stopped = session
            .dispatcher()
            .with_backend(|backend| {
                backend
                    .events()
                    .iter()
                    .any(|event| matches!(event, BackendEvent::Stopped { .. }))
            })
            .unwrap();
        assert!(stopped);
    }

    #[test]
    fn unknown_music_sound_disables_rotation() {
        let audio = AudioConfig {
            music: Some("nope".into()),
            seed: Some(1),
            ..AudioConfig::default()
        };
        let session = Session::new(&audio, registry(), || Ok(SimulatedBackend::new())).unwrap();
        assert!(session.music().is_none());
    }
}
