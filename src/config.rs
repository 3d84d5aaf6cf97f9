use anyhow::Result;
use serde::{Deserialize, Serialize};
use sfxkit_audio::{AudioSettings, PoolConfig, StateSoundHook};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/sfxkit.toml";
const DEFAULT_MANIFEST_PATH: &str = "config/sounds.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sound manifest: a JSON file, or a directory of one JSON file per sound.
    pub manifest: PathBuf,
    /// Sound whose variants are rotated as background music.
    pub music: Option<String>,
    /// Seed for variant selection and variance; random when unset.
    pub seed: Option<u64>,
    /// Length of one update tick in milliseconds.
    pub tick_millis: u64,
    /// Master volume (0.0 to 1.0).
    pub master_volume: f32,
    /// Music volume (0.0 to 1.0).
    pub music_volume: f32,
    /// Sound effects volume (0.0 to 1.0).
    pub sfx_volume: f32,
    /// Ambient sounds volume (0.0 to 1.0).
    pub ambient_volume: f32,
    /// Whether audio is muted.
    pub audio_muted: bool,
    pub pool: PoolConfig,
    pub hooks: Vec<StateSoundHook>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let settings = AudioSettings::default();
        Self {
            manifest: PathBuf::from(DEFAULT_MANIFEST_PATH),
            music: None,
            seed: None,
            // 20 ticks per second
            tick_millis: 50,
            master_volume: settings.master,
            music_volume: settings.music,
            sfx_volume: settings.sfx,
            ambient_volume: settings.ambient,
            audio_muted: settings.muted,
            pool: PoolConfig::default(),
            hooks: Vec::new(),
        }
    }
}

impl AudioConfig {
    /// Load audio configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AudioConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    AudioConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!("Audio config not found at {}. Using defaults", path.display());
                }
                AudioConfig::default()
            }
        }
    }

    /// Save audio configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Volume settings handed to the playback backends.
    pub fn settings(&self) -> AudioSettings {
        let mut settings = AudioSettings::new();
        settings.set_master(self.master_volume);
        settings.set_music(self.music_volume);
        settings.set_sfx(self.sfx_volume);
        settings.set_ambient(self.ambient_volume);
        settings.muted = self.audio_muted;
        settings
    }

    /// Hooks attached to `state`.
    pub fn hooks_for<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a StateSoundHook> {
        self.hooks.iter().filter(move |hook| hook.state == state)
    }
}
