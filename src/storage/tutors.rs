//! Saved tutors: a persona plus its reference material.
//!
//! Tutors are kept newest first in one JSON file. Only the most recent
//! `max_saved` are retained; older ones are dropped with their material.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{read_json, write_json};
use crate::error::{Error, Result};
use crate::materials::ReferenceMaterial;
use crate::persona::PersonaConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorRecord {
    pub id: Uuid,
    pub persona: PersonaConfig,
    #[serde(default)]
    pub materials: Vec<ReferenceMaterial>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TutorFile {
    tutors: Vec<TutorRecord>,
}

pub struct TutorStore {
    path: PathBuf,
    max_saved: usize,
    tutors: Vec<TutorRecord>,
}

impl TutorStore {
    pub fn open(path: impl Into<PathBuf>, max_saved: usize) -> Result<Self> {
        let path = path.into();
        let file: TutorFile = read_json(&path)?;
        let mut tutors = file.tutors;
        tutors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(path = %path.display(), tutors = tutors.len(), "Tutor store opened");
        Ok(Self {
            path,
            max_saved: max_saved.max(1),
            tutors,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.tutors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tutors.is_empty()
    }

    /// Save a new tutor and return it. Evicts the oldest beyond the limit.
    pub fn create(
        &mut self,
        persona: PersonaConfig,
        materials: Vec<ReferenceMaterial>,
    ) -> Result<TutorRecord> {
        let record = TutorRecord {
            id: Uuid::new_v4(),
            persona,
            materials,
            created_at: Utc::now(),
        };
        let mut tutors = Vec::with_capacity(self.tutors.len() + 1);
        tutors.push(record.clone());
        tutors.extend(self.tutors.iter().cloned());

        let evicted = if tutors.len() > self.max_saved {
            tutors.split_off(self.max_saved)
        } else {
            Vec::new()
        };
        self.commit(tutors)?;
        for old in &evicted {
            info!(tutor = %old.id, name = old.persona.name(), "Oldest tutor evicted");
        }

        info!(
            tutor = %record.id,
            name = record.persona.name(),
            materials = record.materials.len(),
            "Tutor saved"
        );
        Ok(record)
    }

    /// Up to `limit` tutors, newest first.
    pub fn list_recent(&self, limit: usize) -> &[TutorRecord] {
        &self.tutors[..limit.min(self.tutors.len())]
    }

    /// Find a tutor by full id or unambiguous id prefix.
    pub fn get(&self, id: &str) -> Result<&TutorRecord> {
        let index = self.find(id)?;
        Ok(&self.tutors[index])
    }

    /// Delete a tutor and its reference material.
    pub fn delete(&mut self, id: &str) -> Result<TutorRecord> {
        let index = self.find(id)?;
        let mut tutors = self.tutors.clone();
        let removed = tutors.remove(index);
        self.commit(tutors)?;
        info!(tutor = %removed.id, "Tutor deleted");
        Ok(removed)
    }

    fn find(&self, id: &str) -> Result<usize> {
        let needle = id.trim().to_ascii_lowercase();
        let not_found = || Error::TutorNotFound { id: id.to_string() };
        if needle.is_empty() {
            return Err(not_found());
        }

        let mut matches = self
            .tutors
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id.to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Ok(index),
            (Some(_), Some(_)) => Err(Error::validation(
                "id",
                format!("'{}' matches more than one tutor", id),
            )),
            _ => Err(not_found()),
        }
    }

    /// Write `tutors` to disk, then adopt them. A failed write leaves the
    /// store unchanged.
    fn commit(&mut self, tutors: Vec<TutorRecord>) -> Result<()> {
        let file = TutorFile { tutors };
        write_json(&self.path, &file)?;
        self.tutors = file.tutors;
        Ok(())
    }
}
