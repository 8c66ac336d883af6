//! Core types for tutor personas.
//!
//! A persona is the validated combination of subject, education level,
//! twelve personality traits and a voice profile. Values are checked once at
//! construction; a `PersonaConfig` that exists is always valid.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Subject
// ─────────────────────────────────────────────────────────────────

/// Subject area taught by a tutor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Physics,
    Chemistry,
    Biology,
    Mathematics,
    EarthScience,
    Engineering,
    ComputerScience,
    Medicine,
    Pharmacy,
    Nursing,
    Other,
}

impl Subject {
    /// Stable key used in presets and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::Mathematics => "mathematics",
            Subject::EarthScience => "earth_science",
            Subject::Engineering => "engineering",
            Subject::ComputerScience => "computer_science",
            Subject::Medicine => "medicine",
            Subject::Pharmacy => "pharmacy",
            Subject::Nursing => "nursing",
            Subject::Other => "other",
        }
    }

    /// Human-readable name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::Mathematics => "mathematics",
            Subject::EarthScience => "earth science",
            Subject::Engineering => "engineering",
            Subject::ComputerScience => "computer science",
            Subject::Medicine => "medicine",
            Subject::Pharmacy => "pharmacy",
            Subject::Nursing => "nursing",
            Subject::Other => "general science",
        }
    }

    pub fn all() -> &'static [Subject] {
        &[
            Subject::Physics,
            Subject::Chemistry,
            Subject::Biology,
            Subject::Mathematics,
            Subject::EarthScience,
            Subject::Engineering,
            Subject::ComputerScience,
            Subject::Medicine,
            Subject::Pharmacy,
            Subject::Nursing,
            Subject::Other,
        ]
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        Subject::all()
            .iter()
            .copied()
            .find(|subject| subject.as_str() == key)
            .ok_or_else(|| {
                let valid: Vec<_> = Subject::all().iter().map(|s| s.as_str()).collect();
                format!("Unknown subject '{}'. Valid: {}", s, valid.join(", "))
            })
    }
}

// ─────────────────────────────────────────────────────────────────
// Education Level
// ─────────────────────────────────────────────────────────────────

/// Education level of the intended student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Elementary,
    MiddleSchool,
    HighSchool,
    University,
    Graduate,
}

impl EducationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::Elementary => "elementary",
            EducationLevel::MiddleSchool => "middle_school",
            EducationLevel::HighSchool => "high_school",
            EducationLevel::University => "university",
            EducationLevel::Graduate => "graduate",
        }
    }

    /// Human-readable name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            EducationLevel::Elementary => "elementary school",
            EducationLevel::MiddleSchool => "middle school",
            EducationLevel::HighSchool => "high school",
            EducationLevel::University => "university",
            EducationLevel::Graduate => "graduate school",
        }
    }

    pub fn all() -> &'static [EducationLevel] {
        &[
            EducationLevel::Elementary,
            EducationLevel::MiddleSchool,
            EducationLevel::HighSchool,
            EducationLevel::University,
            EducationLevel::Graduate,
        ]
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EducationLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        EducationLevel::all()
            .iter()
            .copied()
            .find(|level| level.as_str() == key)
            .ok_or_else(|| {
                let valid: Vec<_> = EducationLevel::all().iter().map(|l| l.as_str()).collect();
                format!("Unknown education level '{}'. Valid: {}", s, valid.join(", "))
            })
    }
}

// ─────────────────────────────────────────────────────────────────
// Personality Traits
// ─────────────────────────────────────────────────────────────────

/// The twelve personality traits, declared in canonical order.
///
/// Canonical order drives everything that must be deterministic: prompt
/// fragments, profile lines and serialized listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trait {
    Friendliness,
    HumorLevel,
    Encouragement,
    InteractionFrequency,
    ExplanationDetail,
    TheoryVsPractice,
    SafetyEmphasis,
    Adaptability,
    NaturalSpeech,
    QuestionSensitivity,
    ResponseSpeed,
    VocabularyLevel,
}

pub const TRAIT_COUNT: usize = 12;

impl Trait {
    /// All traits in canonical order.
    pub fn all() -> &'static [Trait; TRAIT_COUNT] {
        &[
            Trait::Friendliness,
            Trait::HumorLevel,
            Trait::Encouragement,
            Trait::InteractionFrequency,
            Trait::ExplanationDetail,
            Trait::TheoryVsPractice,
            Trait::SafetyEmphasis,
            Trait::Adaptability,
            Trait::NaturalSpeech,
            Trait::QuestionSensitivity,
            Trait::ResponseSpeed,
            Trait::VocabularyLevel,
        ]
    }

    /// Stable key used in presets.
    pub fn name(&self) -> &'static str {
        match self {
            Trait::Friendliness => "friendliness",
            Trait::HumorLevel => "humor_level",
            Trait::Encouragement => "encouragement",
            Trait::InteractionFrequency => "interaction_frequency",
            Trait::ExplanationDetail => "explanation_detail",
            Trait::TheoryVsPractice => "theory_vs_practice",
            Trait::SafetyEmphasis => "safety_emphasis",
            Trait::Adaptability => "adaptability",
            Trait::NaturalSpeech => "natural_speech",
            Trait::QuestionSensitivity => "question_sensitivity",
            Trait::ResponseSpeed => "response_speed",
            Trait::VocabularyLevel => "vocabulary_level",
        }
    }

    /// Label shown in the personality profile.
    pub fn label(&self) -> &'static str {
        match self {
            Trait::Friendliness => "Friendliness",
            Trait::HumorLevel => "Humor",
            Trait::Encouragement => "Encouragement",
            Trait::InteractionFrequency => "Interaction frequency",
            Trait::ExplanationDetail => "Explanation detail",
            Trait::TheoryVsPractice => "Practice orientation",
            Trait::SafetyEmphasis => "Safety emphasis",
            Trait::Adaptability => "Adaptability",
            Trait::NaturalSpeech => "Natural speech",
            Trait::QuestionSensitivity => "Question sensitivity",
            Trait::ResponseSpeed => "Response speed",
            Trait::VocabularyLevel => "Vocabulary level",
        }
    }

    /// Slider value used when a persona is created from scratch.
    pub fn default_value(&self) -> u8 {
        match self {
            Trait::Friendliness => 70,
            Trait::HumorLevel => 30,
            Trait::Encouragement => 80,
            Trait::InteractionFrequency => 60,
            Trait::ExplanationDetail => 70,
            Trait::TheoryVsPractice => 50,
            Trait::SafetyEmphasis => 90,
            Trait::Adaptability => 75,
            Trait::NaturalSpeech => 80,
            Trait::QuestionSensitivity => 70,
            Trait::ResponseSpeed => 60,
            Trait::VocabularyLevel => 50,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_name(name: &str) -> Option<Trait> {
        Trait::all().iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Validated scores for all twelve traits, each in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitScores([u8; TRAIT_COUNT]);

impl TraitScores {
    pub fn get(&self, t: Trait) -> u8 {
        self.0[t.index()]
    }

    /// Scores in canonical trait order.
    pub fn iter(&self) -> impl Iterator<Item = (Trait, u8)> + '_ {
        Trait::all().iter().map(move |t| (*t, self.0[t.index()]))
    }

    fn to_map(self) -> BTreeMap<String, i64> {
        self.iter()
            .map(|(t, v)| (t.name().to_string(), i64::from(v)))
            .collect()
    }
}

impl Default for TraitScores {
    fn default() -> Self {
        let mut scores = [0u8; TRAIT_COUNT];
        for t in Trait::all() {
            scores[t.index()] = t.default_value();
        }
        TraitScores(scores)
    }
}

fn check_trait_value(t: Trait, value: i64) -> Result<u8> {
    if !(0..=100).contains(&value) {
        return Err(Error::validation(
            format!("traits.{}", t.name()),
            format!("{} is outside 0..=100", value),
        ));
    }
    Ok(value as u8)
}

// ─────────────────────────────────────────────────────────────────
// Voice
// ─────────────────────────────────────────────────────────────────

pub const VOICE_MIN: f32 = 0.5;
pub const VOICE_MAX: f32 = 2.0;

/// Speech profile handed to the text-to-speech collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Speaking rate multiplier
    pub rate: f32,
    /// Pitch multiplier
    pub pitch: f32,
    /// Speak replies without being asked
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
}

fn default_autoplay() -> bool {
    true
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            autoplay: true,
        }
    }
}

impl VoiceSettings {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("voice.rate", self.rate), ("voice.pitch", self.pitch)] {
            if !value.is_finite() || !(VOICE_MIN..=VOICE_MAX).contains(&value) {
                return Err(Error::validation(
                    field,
                    format!("{} is outside {}..={}", value, VOICE_MIN, VOICE_MAX),
                ));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Config
// ─────────────────────────────────────────────────────────────────

/// A validated tutor persona.
///
/// Serialized as `{name, subject, level, traits: {<trait>: n, ...}, voice}`.
/// Deserialization runs the same validation as the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PersonaDraft", into = "PersonaDraft")]
pub struct PersonaConfig {
    name: String,
    subject: Subject,
    level: EducationLevel,
    traits: TraitScores,
    voice: VoiceSettings,
}

/// Unvalidated wire form of a persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaDraft {
    pub name: String,
    pub subject: String,
    pub level: String,
    pub traits: BTreeMap<String, i64>,
    #[serde(default)]
    pub voice: VoiceSettings,
}

impl TryFrom<PersonaDraft> for PersonaConfig {
    type Error = Error;

    fn try_from(draft: PersonaDraft) -> Result<Self> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("name", "name must not be empty"));
        }

        let subject = draft
            .subject
            .parse::<Subject>()
            .map_err(|e| Error::validation("subject", e))?;
        let level = draft
            .level
            .parse::<EducationLevel>()
            .map_err(|e| Error::validation("level", e))?;

        if let Some(unknown) = draft.traits.keys().find(|k| Trait::from_name(k).is_none()) {
            return Err(Error::validation(
                format!("traits.{}", unknown),
                "unknown trait",
            ));
        }

        let mut scores = [0u8; TRAIT_COUNT];
        for t in Trait::all() {
            let value = draft.traits.get(t.name()).copied().ok_or_else(|| {
                Error::validation(format!("traits.{}", t.name()), "trait is missing")
            })?;
            scores[t.index()] = check_trait_value(*t, value)?;
        }

        draft.voice.validate()?;

        Ok(PersonaConfig {
            name,
            subject,
            level,
            traits: TraitScores(scores),
            voice: draft.voice,
        })
    }
}

impl From<PersonaConfig> for PersonaDraft {
    fn from(config: PersonaConfig) -> Self {
        PersonaDraft {
            name: config.name,
            subject: config.subject.as_str().to_string(),
            level: config.level.as_str().to_string(),
            traits: config.traits.to_map(),
            voice: config.voice,
        }
    }
}

impl PersonaConfig {
    /// Start a persona from default trait values.
    pub fn builder(name: impl Into<String>) -> PersonaBuilder {
        PersonaBuilder {
            name: name.into(),
            subject: Subject::Physics,
            level: EducationLevel::HighSchool,
            traits: TraitScores::default()
                .iter()
                .map(|(t, v)| (t, i64::from(v)))
                .collect(),
            voice: VoiceSettings::default(),
        }
    }

    /// Start a builder pre-filled with this persona's values.
    pub fn to_builder(&self) -> PersonaBuilder {
        PersonaBuilder {
            name: self.name.clone(),
            subject: self.subject,
            level: self.level,
            traits: self.traits.iter().map(|(t, v)| (t, i64::from(v))).collect(),
            voice: self.voice,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn level(&self) -> EducationLevel {
        self.level
    }

    pub fn traits(&self) -> &TraitScores {
        &self.traits
    }

    pub fn trait_value(&self, t: Trait) -> u8 {
        self.traits.get(t)
    }

    pub fn voice(&self) -> VoiceSettings {
        self.voice
    }

    /// Summary of teaching tendencies derived from the trait scores.
    pub fn profile(&self) -> PersonaProfile {
        PersonaProfile::from_traits(&self.traits)
    }
}

/// Builder for [`PersonaConfig`]. Values are checked in `build`.
#[derive(Debug, Clone)]
pub struct PersonaBuilder {
    name: String,
    subject: Subject,
    level: EducationLevel,
    traits: BTreeMap<Trait, i64>,
    voice: VoiceSettings,
}

impl PersonaBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn level(mut self, level: EducationLevel) -> Self {
        self.level = level;
        self
    }

    /// Set one trait. Out-of-range values are reported by `build`.
    pub fn trait_value(mut self, t: Trait, value: i64) -> Self {
        self.traits.insert(t, value);
        self
    }

    pub fn voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = voice;
        self
    }

    pub fn build(self) -> Result<PersonaConfig> {
        let draft = PersonaDraft {
            name: self.name,
            subject: self.subject.as_str().to_string(),
            level: self.level.as_str().to_string(),
            traits: self
                .traits
                .into_iter()
                .map(|(t, v)| (t.name().to_string(), v))
                .collect(),
            voice: self.voice,
        };
        PersonaConfig::try_from(draft)
    }
}

// ─────────────────────────────────────────────────────────────────
// Personality Profile
// ─────────────────────────────────────────────────────────────────

/// Coarse description of how a persona teaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaProfile {
    pub teaching_style: &'static str,
    pub interaction_level: &'static str,
    pub difficulty_level: &'static str,
    pub communication_style: &'static str,
    pub humor_tendency: &'static str,
}

impl PersonaProfile {
    fn from_traits(traits: &TraitScores) -> Self {
        Self {
            teaching_style: if traits.get(Trait::TheoryVsPractice) < 50 {
                "theory-centered"
            } else {
                "practice-centered"
            },
            interaction_level: if traits.get(Trait::InteractionFrequency) < 50 {
                "lecture"
            } else {
                "interactive"
            },
            difficulty_level: if traits.get(Trait::VocabularyLevel) < 50 {
                "basic"
            } else {
                "advanced"
            },
            communication_style: if traits.get(Trait::Friendliness) < 50 {
                "formal"
            } else {
                "friendly"
            },
            humor_tendency: if traits.get(Trait::HumorLevel) < 30 {
                "serious"
            } else {
                "humorous"
            },
        }
    }
}

impl fmt::Display for PersonaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Teaching style:      {}", self.teaching_style)?;
        writeln!(f, "Interaction level:   {}", self.interaction_level)?;
        writeln!(f, "Difficulty level:    {}", self.difficulty_level)?;
        writeln!(f, "Communication style: {}", self.communication_style)?;
        write!(f, "Humor tendency:      {}", self.humor_tendency)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
