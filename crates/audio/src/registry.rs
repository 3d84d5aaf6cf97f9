use std::collections::HashMap;
use std::sync::Arc;

use crate::{AudioError, SoundAsset};

/// Registry storing sound assets keyed by name.
///
/// Read-only after [`SoundRegistry::load`]; share it behind an `Arc` and read
/// it from any thread without locking.
#[derive(Debug, Default)]
pub struct SoundRegistry {
    sounds: HashMap<String, Arc<SoundAsset>>,
}

impl SoundRegistry {
    /// Build a registry from the supplied assets.
    ///
    /// When two assets share a name the first one wins and later ones are
    /// dropped without a report.
    pub fn load<I>(assets: I) -> Self
    where
        I: IntoIterator<Item = SoundAsset>,
    {
        let mut sounds = HashMap::new();
        for asset in assets {
            if !sounds.contains_key(asset.name()) {
                sounds.insert(asset.name().to_string(), Arc::new(asset));
            }
        }
        Self { sounds }
    }

    /// Look up a sound by exact name.
    pub fn resolve(&self, name: &str) -> Result<Arc<SoundAsset>, AudioError> {
        self.sounds
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::NotFound(name.to_string()))
    }

    /// Whether a sound is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    /// Number of registered sounds.
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Whether the registry holds no sounds.
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sounds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
