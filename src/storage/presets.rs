//! Preset store: bundled presets plus user presets saved as JSON.
//!
//! Bundled presets are read-only and win on lookup. User presets are kept
//! in one JSON object keyed by preset name and rewritten on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{read_json, write_json};
use crate::error::{Error, Result};
use crate::persona::{EducationLevel, PersonaConfig, PresetRegistry, Subject};

/// Version written into export envelopes and required on import.
pub const EXPORT_VERSION: &str = "1.0";

/// Suggestions returned by [`PresetStore::suggest`].
pub const MAX_SUGGESTIONS: usize = 5;

const SUBJECT_WEIGHT: u32 = 2;
const LEVEL_WEIGHT: u32 = 2;

/// One user preset as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPreset {
    #[serde(default)]
    pub description: String,
    pub config: PersonaConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing entry for one preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetSummary {
    pub name: String,
    pub description: String,
    pub subject: Subject,
    pub level: EducationLevel,
    pub builtin: bool,
}

/// Portable single-preset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetExport {
    pub preset_name: String,
    pub preset_config: PersonaConfig,
    pub export_version: String,
}

/// A preset matching a subject/level query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub score: u32,
    pub description: String,
    pub builtin: bool,
}

pub struct PresetStore {
    path: PathBuf,
    registry: PresetRegistry,
    user: BTreeMap<String, StoredPreset>,
}

impl PresetStore {
    /// Open the store backed by `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let user: BTreeMap<String, StoredPreset> = read_json(&path)?;
        debug!(path = %path.display(), user_presets = user.len(), "Preset store opened");
        Ok(Self {
            path,
            registry: PresetRegistry::new(),
            user,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// All presets, bundled and user, sorted by name.
    pub fn list(&self) -> Result<Vec<PresetSummary>> {
        let mut by_name: BTreeMap<String, PresetSummary> = BTreeMap::new();

        for (name, stored) in &self.user {
            by_name.insert(
                name.clone(),
                PresetSummary {
                    name: name.clone(),
                    description: stored.description.clone(),
                    subject: stored.config.subject(),
                    level: stored.config.level(),
                    builtin: false,
                },
            );
        }
        for preset in self.registry.list_available()? {
            by_name.insert(
                preset.key.to_string(),
                PresetSummary {
                    name: preset.key.to_string(),
                    description: preset.description,
                    subject: preset.persona.subject(),
                    level: preset.persona.level(),
                    builtin: true,
                },
            );
        }

        Ok(by_name.into_values().collect())
    }

    /// Look up a preset, bundled first.
    pub fn load(&self, name: &str) -> Result<PersonaConfig> {
        if let Some(preset) = self.registry.get(name)? {
            return Ok(preset.persona);
        }
        self.user
            .get(name)
            .map(|stored| stored.config.clone())
            .ok_or_else(|| Error::PresetNotFound {
                name: name.to_string(),
            })
    }

    /// Description of a preset, bundled first.
    pub fn description(&self, name: &str) -> Result<String> {
        if let Some(preset) = self.registry.get(name)? {
            return Ok(preset.description);
        }
        self.user
            .get(name)
            .map(|stored| stored.description.clone())
            .ok_or_else(|| Error::PresetNotFound {
                name: name.to_string(),
            })
    }

    /// Create or replace a user preset.
    pub fn save(&mut self, name: &str, description: &str, config: PersonaConfig) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("preset_name", "preset name must not be empty"));
        }
        if self.is_builtin(name) {
            return Err(Error::PresetReadOnly {
                name: name.to_string(),
            });
        }

        let now = Utc::now();
        let created_at = self.user.get(name).map_or(now, |existing| existing.created_at);
        let mut user = self.user.clone();
        user.insert(
            name.to_string(),
            StoredPreset {
                description: description.to_string(),
                config,
                created_at,
                updated_at: now,
            },
        );
        self.commit(user)?;

        info!(preset = name, "Preset saved");
        Ok(())
    }

    /// Remove a user preset.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if self.is_builtin(name) {
            return Err(Error::PresetReadOnly {
                name: name.to_string(),
            });
        }
        let mut user = self.user.clone();
        if user.remove(name).is_none() {
            return Err(Error::PresetNotFound {
                name: name.to_string(),
            });
        }
        self.commit(user)?;

        info!(preset = name, "Preset deleted");
        Ok(())
    }

    /// Export one preset (bundled or user) as a JSON envelope.
    pub fn export(&self, name: &str) -> Result<String> {
        let envelope = PresetExport {
            preset_name: name.to_string(),
            preset_config: self.load(name)?,
            export_version: EXPORT_VERSION.to_string(),
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Import an exported envelope as a user preset; returns its name.
    ///
    /// The persona is fully validated while decoding.
    pub fn import(&mut self, json: &str) -> Result<String> {
        let envelope: PresetExport = serde_json::from_str(json).map_err(|e| {
            Error::validation("preset_config", format!("invalid preset export: {}", e))
        })?;
        if envelope.export_version != EXPORT_VERSION {
            return Err(Error::validation(
                "export_version",
                format!(
                    "unsupported export version '{}', expected '{}'",
                    envelope.export_version, EXPORT_VERSION
                ),
            ));
        }

        let description = self
            .user
            .get(envelope.preset_name.trim())
            .map(|stored| stored.description.clone())
            .unwrap_or_else(|| "Imported preset".to_string());
        self.save(&envelope.preset_name, &description, envelope.preset_config)?;
        Ok(envelope.preset_name.trim().to_string())
    }

    /// Import an envelope from a file.
    pub fn import_file(&mut self, path: &Path) -> Result<String> {
        let json = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.import(&json)
    }

    /// Presets ranked for a subject and level.
    ///
    /// A subject match and a level match each add 2 points. Presets with no
    /// match are left out; ties are broken by name.
    pub fn suggest(
        &self,
        subject: Option<Subject>,
        level: Option<EducationLevel>,
    ) -> Result<Vec<Suggestion>> {
        let score = |persona: &PersonaConfig| {
            let mut score = 0;
            if subject == Some(persona.subject()) {
                score += SUBJECT_WEIGHT;
            }
            if level == Some(persona.level()) {
                score += LEVEL_WEIGHT;
            }
            score
        };

        let mut suggestions: Vec<Suggestion> = Vec::new();
        for preset in self.registry.list_available()? {
            suggestions.push(Suggestion {
                name: preset.key.to_string(),
                score: score(&preset.persona),
                description: preset.description,
                builtin: true,
            });
        }
        for (name, stored) in &self.user {
            suggestions.push(Suggestion {
                name: name.clone(),
                score: score(&stored.config),
                description: stored.description.clone(),
                builtin: false,
            });
        }

        suggestions.retain(|s| s.score > 0);
        suggestions.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        suggestions.truncate(MAX_SUGGESTIONS);
        Ok(suggestions)
    }

    /// Write `user` to disk, then adopt it. A failed write leaves the
    /// store unchanged.
    fn commit(&mut self, user: BTreeMap<String, StoredPreset>) -> Result<()> {
        write_json(&self.path, &user)?;
        self.user = user;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Trait;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> PresetStore {
        PresetStore::open(dir.path().join("presets.json")).unwrap()
    }

    fn persona(name: &str, subject: Subject, level: EducationLevel) -> PersonaConfig {
        PersonaConfig::builder(name)
            .subject(subject)
            .level(level)
            .trait_value(Trait::HumorLevel, 80)
            .build()
            .unwrap()
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut presets = store(&dir);
        let original = persona("Ms. Lee", Subject::Biology, EducationLevel::MiddleSchool);

        presets.save("my-bio", "cells", original.clone()).unwrap();
        assert_eq!(presets.load("my-bio").unwrap(), original);

        let reopened = store(&dir);
        assert_eq!(reopened.load("my-bio").unwrap(), original);
        assert_eq!(reopened.description("my-bio").unwrap(), "cells");
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("presets.json");
        let mut presets = store(&dir);
        let kept = persona("Kept", Subject::Physics, EducationLevel::University);
        presets.save("kept", "", kept.clone()).unwrap();

        // A directory where the file should be makes every rename fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("blocker"), "x").unwrap();

        let extra = persona("Extra", Subject::Chemistry, EducationLevel::HighSchool);
        assert!(matches!(
            presets.save("extra", "", extra),
            Err(Error::IoWrite { .. })
        ));
        assert!(matches!(presets.load("extra"), Err(Error::PresetNotFound { .. })));

        assert!(matches!(presets.delete("kept"), Err(Error::IoWrite { .. })));
        assert_eq!(presets.load("kept").unwrap(), kept);
    }

    #[test]
    fn test_bundled_presets_are_read_only() {
        let dir = TempDir::new().unwrap();
        let mut presets = store(&dir);
        let p = persona("x", Subject::Physics, EducationLevel::University);

        assert!(matches!(
            presets.save("physics-professor", "", p),
            Err(Error::PresetReadOnly { .. })
        ));
        assert!(matches!(
            presets.delete("physics-professor"),
            Err(Error::PresetReadOnly { .. })
        ));
        assert!(presets.load("physics-professor").is_ok());
    }

    #[test]
    fn test_list_merges_and_sorts() {
        let dir = TempDir::new().unwrap();
        let mut presets = store(&dir);
        presets
            .save("aaa-custom", "", persona("A", Subject::Other, EducationLevel::Graduate))
            .unwrap();

        let list = presets.list().unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list[0].name, "aaa-custom");
        assert!(!list[0].builtin);
        let names: Vec<_> = list.iter().map(|p| p.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_delete_missing() {
        let dir = TempDir::new().unwrap();
        let mut presets = store(&dir);
        assert!(matches!(
            presets.delete("nope"),
            Err(Error::PresetNotFound { .. })
        ));
        assert!(matches!(presets.load("nope"), Err(Error::PresetNotFound { .. })));
    }

    #[test]
    fn test_export_import() {
        let dir = TempDir::new().unwrap();
        let presets = store(&dir);
        let json = presets.export("friendly-math-teacher").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["export_version"], "1.0");
        assert_eq!(value["preset_name"], "friendly-math-teacher");

        let other = TempDir::new().unwrap();
        let mut target = store(&other);
        let renamed = json.replace(
            "\"preset_name\": \"friendly-math-teacher\"",
            "\"preset_name\": \"my-math\"",
        );
        assert_eq!(target.import(&renamed).unwrap(), "my-math");
        assert_eq!(
            target.load("my-math").unwrap(),
            presets.load("friendly-math-teacher").unwrap()
        );
    }

    #[test]
    fn test_import_rejects_bad_documents() {
        let dir = TempDir::new().unwrap();
        let mut presets = store(&dir);
        let json = presets.export("biology-doctor").unwrap();

        let wrong_version = json.replace("\"1.0\"", "\"2.0\"");
        assert!(matches!(
            presets.import(&wrong_version),
            Err(Error::Validation { ref field, .. }) if field == "export_version"
        ));

        let bad_trait = json.replace("\"humor_level\": 40", "\"humor_level\": 400");
        assert!(presets.import(&bad_trait).is_err());

        assert!(matches!(
            presets.import(&json),
            Err(Error::PresetReadOnly { .. })
        ));
    }

    #[test]
    fn test_suggestions_ranked() {
        let dir = TempDir::new().unwrap();
        let mut presets = store(&dir);
        presets
            .save("a-physics", "", persona("P", Subject::Physics, EducationLevel::HighSchool))
            .unwrap();

        let suggestions = presets
            .suggest(Some(Subject::Physics), Some(EducationLevel::University))
            .unwrap();
        assert_eq!(suggestions[0].name, "physics-professor");
        assert_eq!(suggestions[0].score, 4);
        assert_eq!(suggestions[1].name, "a-physics");
        assert_eq!(suggestions[1].score, 2);
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
        assert!(suggestions.iter().all(|s| s.score > 0));

        assert!(presets.suggest(None, None).unwrap().is_empty());
    }
}
