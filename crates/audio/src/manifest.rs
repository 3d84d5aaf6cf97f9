//! Sound manifest loading.
//!
//! Manifests are JSON. Loading is also the normalization pass: clip names fall
//! back to the clip file stem, zero volume/pitch becomes 1, and sounds loaded
//! from a directory take their name from the file they live in.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AssetError, ClipRef, ClipVariant, OutputBus, SoundAsset};

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    sounds: Vec<SoundDefinition>,
}

#[derive(Debug, Deserialize)]
struct SoundDefinition {
    /// Sound name; ignored for per-file sounds, which use the file stem.
    #[serde(default)]
    name: String,
    #[serde(default)]
    bus: Option<String>,
    #[serde(default)]
    clips: Vec<ClipDefinition>,
}

#[derive(Debug, Deserialize)]
struct ClipDefinition {
    /// Clip name (defaults to the stem of `path`).
    #[serde(default)]
    clip: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    duration_secs: f64,
    /// 0 means unset and loads as 1.
    #[serde(default)]
    volume: f32,
    /// 0 means unset and loads as 1.
    #[serde(default)]
    pitch: f32,
}

/// Sounds plus the audio files their clips come from.
#[derive(Debug, Default)]
pub struct SoundManifest {
    /// Normalized assets in manifest order.
    pub assets: Vec<SoundAsset>,
    /// Clip id to audio file, for backends that load data from disk.
    pub clip_paths: BTreeMap<String, PathBuf>,
}

impl SoundManifest {
    fn push(&mut self, def: SoundDefinition, base_dir: Option<&Path>) -> Result<(), AssetError> {
        let name = def.name.trim().to_string();
        if name.is_empty() {
            return Err(AssetError::Invalid("sound name cannot be empty".into()));
        }

        let mut variants = Vec::with_capacity(def.clips.len());
        for clip in def.clips {
            let id = clip_id(&clip).ok_or_else(|| {
                AssetError::Invalid(format!("clip in sound `{name}` has neither name nor path"))
            })?;
            let duration = Duration::try_from_secs_f64(clip.duration_secs).map_err(|_| {
                AssetError::Invalid(format!(
                    "clip `{id}` in sound `{name}` has invalid duration {}",
                    clip.duration_secs
                ))
            })?;
            if let Some(path) = clip.path {
                let path = match base_dir {
                    Some(dir) if path.is_relative() => dir.join(path),
                    _ => path,
                };
                self.clip_paths.entry(id.clone()).or_insert(path);
            }
            variants.push(ClipVariant::new(
                ClipRef::new(id, duration),
                clip.volume,
                clip.pitch,
            ));
        }

        let bus = def.bus.filter(|b| !b.is_empty()).map(OutputBus::new);
        self.assets.push(SoundAsset::new(name, bus, variants));
        Ok(())
    }
}

fn clip_id(clip: &ClipDefinition) -> Option<String> {
    clip.clip
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .or_else(|| file_stem(clip.path.as_deref()?))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Parse a manifest from an in-memory JSON string. Clip paths are kept as
/// written.
pub fn manifest_from_str(input: &str) -> Result<SoundManifest, AssetError> {
    parse_manifest(input, None)
}

/// Load a manifest file. Relative clip paths resolve against its directory.
pub fn manifest_from_file(path: &Path) -> Result<SoundManifest, AssetError> {
    let data = fs::read_to_string(path)?;
    parse_manifest(&data, path.parent())
}

fn parse_manifest(input: &str, base_dir: Option<&Path>) -> Result<SoundManifest, AssetError> {
    let file: ManifestFile = serde_json::from_str(input)?;
    let mut manifest = SoundManifest::default();
    for def in file.sounds {
        manifest.push(def, base_dir)?;
    }
    Ok(manifest)
}

/// Load every `*.json` file in `dir` as one sound named after the file.
///
/// Files are read in name order so first-wins resolution is stable.
pub fn sounds_from_dir(dir: &Path) -> Result<SoundManifest, AssetError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut manifest = SoundManifest::default();
    for path in files {
        let data = fs::read_to_string(&path)?;
        let mut def: SoundDefinition = serde_json::from_str(&data)?;
        def.name = file_stem(&path).unwrap_or_default();
        manifest.push(def, Some(dir))?;
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    const MANIFEST: &str = r#"
    {
      "sounds": [
        {
          "name": "jump",
          "bus": "sfx",
          "clips": [
            { "clip": "jump_a", "path": "sfx/jump_a.wav", "duration_secs": 0.4 },
            { "path": "sfx/jump_b.wav", "duration_secs": 0.5, "volume": 0.5, "pitch": 1.2 }
          ]
        },
        { "name": "silence" }
      ]
    }
    "#;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sfxkit-{label}-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn parses_and_normalizes_clips() {
        let manifest = manifest_from_str(MANIFEST).expect("valid manifest");
        assert_eq!(manifest.assets.len(), 2);

        let jump = &manifest.assets[0];
        assert_eq!(jump.name(), "jump");
        assert_eq!(jump.bus().map(OutputBus::name), Some("sfx"));
        let variants = jump.variants();
        assert_eq!(variants[0].clip.id(), "jump_a");
        assert_eq!(variants[0].volume, 1.0);
        assert_eq!(variants[0].pitch, 1.0);
        assert_eq!(variants[0].clip.duration(), Duration::from_millis(400));
        assert_eq!(variants[1].clip.id(), "jump_b");
        assert_eq!(variants[1].volume, 0.5);
        assert!((variants[1].pitch - 1.2).abs() < 1e-6);

        assert!(manifest.assets[1].is_empty());
        assert_eq!(
            manifest.clip_paths.get("jump_b"),
            Some(&PathBuf::from("sfx/jump_b.wav"))
        );
    }

    #[test]
    fn rejects_empty_names() {
        let err = manifest_from_str(r#"{"sounds": [{"name": "  "}]}"#).unwrap_err();
        assert!(matches!(err, AssetError::Invalid(_)), "unexpected error: {err}");
    }

    #[test]
    fn rejects_unnamed_clips() {
        let json = r#"{"sounds": [{"name": "x", "clips": [{"duration_secs": 1.0}]}]}"#;
        assert!(matches!(
            manifest_from_str(json),
            Err(AssetError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_negative_duration() {
        let json = r#"{"sounds": [{"name": "x", "clips": [{"clip": "a", "duration_secs": -1.0}]}]}"#;
        assert!(matches!(
            manifest_from_str(json),
            Err(AssetError::Invalid(_))
        ));
    }

    #[test]
    fn reports_parse_errors() {
        assert!(matches!(
            manifest_from_str("{ not json"),
            Err(AssetError::Parse(_))
        ));
    }

    #[test]
    fn file_paths_resolve_against_manifest_dir() {
        let dir = temp_dir("manifest");
        let path = dir.join("sounds.json");
        fs::write(&path, MANIFEST).unwrap();

        let manifest = manifest_from_file(&path).expect("manifest loads");
        assert_eq!(
            manifest.clip_paths.get("jump_a"),
            Some(&dir.join("sfx/jump_a.wav"))
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn directory_sounds_named_after_files() {
        let dir = temp_dir("sounddir");
        fs::write(
            dir.join("footstep.json"),
            r#"{"name": "wrong", "clips": [{"path": "step1.ogg", "duration_secs": 0.2}]}"#,
        )
        .unwrap();
        fs::write(dir.join("door.json"), r#"{"clips": []}"#).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let manifest = sounds_from_dir(&dir).expect("directory loads");
        let names: Vec<&str> = manifest.assets.iter().map(SoundAsset::name).collect();
        assert_eq!(names, vec!["door", "footstep"]);
        assert_eq!(manifest.assets[1].variants()[0].clip.id(), "step1");
        fs::remove_dir_all(&dir).ok();
    }
}
