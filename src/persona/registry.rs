//! Bundled presets: default tutor personas shipped with the binary.

use serde::Deserialize;

use super::types::PersonaConfig;
use crate::error::{Error, Result};

/// Preset key and TOML source for every bundled persona, in listing order.
const BUNDLED: &[(&str, &str)] = &[
    (
        "physics-professor",
        include_str!("../../config/presets/physics-professor.toml"),
    ),
    (
        "chemistry-lab-assistant",
        include_str!("../../config/presets/chemistry-lab-assistant.toml"),
    ),
    (
        "friendly-math-teacher",
        include_str!("../../config/presets/friendly-math-teacher.toml"),
    ),
    (
        "biology-doctor",
        include_str!("../../config/presets/biology-doctor.toml"),
    ),
    (
        "engineering-mentor",
        include_str!("../../config/presets/engineering-mentor.toml"),
    ),
];

#[derive(Debug, Deserialize)]
struct BundledFile {
    description: String,
    persona: PersonaConfig,
}

/// A read-only preset shipped with the binary.
#[derive(Debug, Clone)]
pub struct BundledPreset {
    pub key: &'static str,
    pub description: String,
    pub persona: PersonaConfig,
}

/// Registry of bundled presets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PresetRegistry;

impl PresetRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Raw TOML for a bundled preset.
    pub fn get_bundled_source(&self, key: &str) -> Option<&'static str> {
        BUNDLED.iter().find(|(k, _)| *k == key).map(|(_, src)| *src)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_bundled_source(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(k, _)| *k)
    }

    /// Parse and validate one bundled preset.
    pub fn get(&self, key: &str) -> Result<Option<BundledPreset>> {
        let Some(&(key, source)) = BUNDLED.iter().find(|(k, _)| *k == key) else {
            return Ok(None);
        };
        let file: BundledFile = toml::from_str(source).map_err(|e| {
            Error::Internal(format!("bundled preset '{}' is invalid: {}", key, e))
        })?;
        Ok(Some(BundledPreset {
            key,
            description: file.description,
            persona: file.persona,
        }))
    }

    /// All bundled presets in listing order.
    pub fn list_available(&self) -> Result<Vec<BundledPreset>> {
        let mut presets = Vec::with_capacity(BUNDLED.len());
        for key in self.keys() {
            if let Some(preset) = self.get(key)? {
                presets.push(preset);
            }
        }
        Ok(presets)
    }
}
