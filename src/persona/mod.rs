//! Tutor personas: subject, level, personality traits and voice.
//!
//! Personas are validated on construction and immutable afterwards. The
//! registry serves the read-only presets bundled with the binary; user
//! presets live in [`crate::storage::presets`].

pub mod registry;
pub mod types;

pub use registry::{BundledPreset, PresetRegistry};
pub use types::{
    EducationLevel, PersonaBuilder, PersonaConfig, PersonaDraft, PersonaProfile, Subject, Trait,
    TraitScores, VoiceSettings, TRAIT_COUNT,
};
