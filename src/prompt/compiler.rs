//! Prompt compiler
//!
//! Renders a persona, the recent conversation, reference material and the
//! current request into the system prompt and user turn sent to the
//! language model. Output depends only on the inputs: identical inputs give
//! byte-identical prompts, and the SHA-256 fingerprint of the system prompt
//! can be used as a cache key.

use std::fmt::Write as _;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use super::directives::directives;
use crate::config::TutorConfig;
use crate::error::{Error, Result};
use crate::materials::ReferenceMaterial;
use crate::persona::PersonaConfig;
use crate::session::{ConversationTurn, Role};

/// Limits applied while compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSettings {
    /// Most recent turns included in the transcript
    pub max_history: usize,
    /// Characters of reference material allowed in the system prompt
    pub reference_char_budget: usize,
    /// Hard ceiling on transcript characters
    pub history_char_ceiling: usize,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            max_history: 10,
            reference_char_budget: 12_000,
            history_char_ceiling: 24_000,
        }
    }
}

impl From<&TutorConfig> for PromptSettings {
    fn from(config: &TutorConfig) -> Self {
        Self {
            max_history: config.app.max_history,
            reference_char_budget: config.limits.reference_char_budget,
            history_char_ceiling: config.limits.history_char_ceiling,
        }
    }
}

/// What the student asked for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRequest {
    /// A free-form chat message
    Message(String),
    /// A structured lesson on a topic
    Lesson { topic: String },
}

impl TurnRequest {
    /// Text recorded in history for the student's side of the turn.
    pub fn history_text(&self) -> String {
        match self {
            TurnRequest::Message(text) => text.clone(),
            TurnRequest::Lesson { topic } => format!("Please teach me about {}.", topic),
        }
    }
}

/// Output of one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPrompt {
    pub system_prompt: String,
    pub user_turn: String,
    /// Hex SHA-256 of `system_prompt`
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptCompiler {
    settings: PromptSettings,
}

impl PromptCompiler {
    pub fn new(settings: PromptSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    /// Compile the prompt pair for one turn.
    ///
    /// `history` is in insertion order; only the most recent `max_history`
    /// turns are used. Fails with [`Error::Compilation`] when those turns
    /// still exceed `history_char_ceiling`.
    pub fn compile(
        &self,
        persona: &PersonaConfig,
        history: &[ConversationTurn],
        materials: &[ReferenceMaterial],
        request: &TurnRequest,
    ) -> Result<CompiledPrompt> {
        let recent = select_recent(history, self.settings.max_history);
        let history_chars: usize = recent.iter().map(|t| t.text.chars().count()).sum();
        if history_chars > self.settings.history_char_ceiling {
            return Err(Error::compilation(format!(
                "last {} turns hold {} characters, above the ceiling of {}",
                recent.len(),
                history_chars,
                self.settings.history_char_ceiling
            )));
        }

        let system_prompt = self.render_system(persona, materials);
        let user_turn = render_user_turn(recent, request);
        let fingerprint = hex::encode(Sha256::digest(system_prompt.as_bytes()));

        debug!(
            persona = persona.name(),
            turns = recent.len(),
            history_chars,
            system_chars = system_prompt.len(),
            fingerprint = &fingerprint[..12],
            "Prompt compiled"
        );
        trace!(system = %system_prompt, user = %user_turn, "Compiled prompt text");

        Ok(CompiledPrompt {
            system_prompt,
            user_turn,
            fingerprint,
        })
    }

    fn render_system(&self, persona: &PersonaConfig, materials: &[ReferenceMaterial]) -> String {
        let mut out = String::with_capacity(2048);

        let _ = writeln!(
            out,
            "You are {}, an AI tutor specializing in {}. You teach students at the {} level.",
            persona.name(),
            persona.subject().display_name(),
            persona.level().display_name()
        );

        out.push_str("\nPersonality profile:\n");
        for (t, value) in persona.traits().iter() {
            let _ = writeln!(out, "- {}: {}/100", t.label(), value);
        }

        out.push_str("\nTeaching directives:\n");
        for directive in directives(persona) {
            let _ = writeln!(out, "- {}", directive.text);
        }

        out.push('\n');
        out.push_str(BLACKBOARD_RULES);

        let excerpts = fit_materials(materials, self.settings.reference_char_budget);
        if !excerpts.is_empty() {
            out.push_str("\nReference material provided by the student (use it when relevant):\n");
            for (filename, text) in excerpts {
                let _ = write!(out, "\n### {}\n{}\n", filename, text);
            }
        }

        out
    }
}

const BLACKBOARD_RULES: &str = "\
Blackboard rules:
Anything you want written on the blackboard must use these tags:
- Colors: [red]...[/red], [blue]...[/blue], [green]...[/green], [yellow]...[/yellow], [white]...[/white]
- Underline: [underline]...[/underline]
- Circle a key idea: [circle]...[/circle]
- Formulas: $...$ inline, $$...$$ for display, or [formula]...[/formula]
Tags may be nested. Your reply is also read aloud, so write sentences that are natural to speak.
Always point out safety precautions where they matter.
";

fn select_recent(history: &[ConversationTurn], max: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(max);
    &history[start..]
}

fn render_user_turn(recent: &[ConversationTurn], request: &TurnRequest) -> String {
    let mut out = String::new();

    if !recent.is_empty() {
        out.push_str("Conversation so far:\n");
        for turn in recent {
            let speaker = match turn.role {
                Role::User => "Student",
                Role::Tutor => "Tutor",
            };
            let _ = writeln!(out, "{}: {}", speaker, turn.text);
        }
        out.push('\n');
    }

    match request {
        TurnRequest::Message(text) => {
            if recent.is_empty() {
                out.push_str(text);
            } else {
                let _ = write!(out, "Student: {}", text);
            }
        }
        TurnRequest::Lesson { topic } => {
            let _ = write!(
                out,
                "Teach a lesson on '{}'. Structure it as follows:\n\
                 1. Introduce the topic and the learning goals.\n\
                 2. Explain the key concepts, writing the summary on the blackboard.\n\
                 3. Give a real example or experiment where possible.\n\
                 4. Summarize the important points.\n\
                 5. Finish with questions for the student.\n\
                 Use the blackboard tags for everything written on the board.",
                topic
            );
        }
    }

    out
}

/// Fit materials into `budget` characters.
///
/// Materials are taken in upload order. When the total exceeds the budget,
/// the overflow is cut from the oldest uploads first (each one losing its
/// tail) until the rest fits. Materials cut to nothing are dropped.
fn fit_materials(materials: &[ReferenceMaterial], budget: usize) -> Vec<(&str, String)> {
    let mut ordered: Vec<&ReferenceMaterial> = materials.iter().collect();
    ordered.sort_by_key(|m| m.uploaded_at);

    let lengths: Vec<usize> = ordered
        .iter()
        .map(|m| m.extracted_text.chars().count())
        .collect();
    let mut excess = lengths.iter().sum::<usize>().saturating_sub(budget);

    let mut fitted = Vec::with_capacity(ordered.len());
    for (material, len) in ordered.into_iter().zip(lengths) {
        let cut = excess.min(len);
        excess -= cut;
        let keep = len - cut;
        if keep == 0 {
            continue;
        }
        let text = if cut == 0 {
            material.extracted_text.clone()
        } else {
            material.extracted_text.chars().take(keep).collect()
        };
        fitted.push((material.filename.as_str(), text));
    }
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{Subject, Trait};
    use chrono::{Duration, TimeZone, Utc};

    fn persona() -> PersonaConfig {
        PersonaConfig::builder("Ms. Lee")
            .subject(Subject::Physics)
            .trait_value(Trait::HumorLevel, 90)
            .trait_value(Trait::Friendliness, 20)
            .build()
            .unwrap()
    }

    fn material(name: &str, text: &str, minutes: i64) -> ReferenceMaterial {
        ReferenceMaterial {
            filename: name.to_string(),
            extracted_text: text.to_string(),
            size_bytes: text.len() as u64,
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    fn turn(role: Role, text: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            text: text.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn ask(text: &str) -> TurnRequest {
        TurnRequest::Message(text.to_string())
    }

    #[test]
    fn test_deterministic() {
        let compiler = PromptCompiler::default();
        let a = compiler.compile(&persona(), &[], &[], &ask("hi")).unwrap();
        let b = compiler.compile(&persona(), &[], &[], &ask("hi")).unwrap();
        assert_eq!(a.system_prompt, b.system_prompt);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_directive_order() {
        let compiled = PromptCompiler::default()
            .compile(&persona(), &[], &[], &ask("hi"))
            .unwrap();
        let strict = compiled
            .system_prompt
            .find("professional, strict demeanor")
            .unwrap();
        let humor = compiled.system_prompt.find("frequent light humor").unwrap();
        assert!(strict < humor);
    }

    #[test]
    fn test_identity_and_profile() {
        let compiled = PromptCompiler::default()
            .compile(&persona(), &[], &[], &ask("hi"))
            .unwrap();
        assert!(compiled.system_prompt.starts_with("You are Ms. Lee"));
        assert!(compiled.system_prompt.contains("- Humor: 90/100"));
        assert!(compiled.system_prompt.contains("Blackboard rules:"));
        assert!(!compiled.system_prompt.contains("Reference material"));
        assert_eq!(compiled.user_turn, "hi");
    }

    #[test]
    fn test_history_window() {
        let settings = PromptSettings {
            max_history: 2,
            ..Default::default()
        };
        let history = vec![
            turn(Role::User, "first question"),
            turn(Role::Tutor, "first answer"),
            turn(Role::User, "second question"),
            turn(Role::Tutor, "second answer"),
        ];
        let compiled = PromptCompiler::new(settings)
            .compile(&persona(), &history, &[], &ask("third"))
            .unwrap();
        assert!(!compiled.user_turn.contains("first"));
        assert!(compiled
            .user_turn
            .contains("Student: second question\nTutor: second answer\n"));
        assert!(compiled.user_turn.ends_with("Student: third"));
    }

    #[test]
    fn test_history_ceiling() {
        let settings = PromptSettings {
            history_char_ceiling: 10,
            ..Default::default()
        };
        let history = vec![turn(Role::User, "this turn is far too long")];
        let err = PromptCompiler::new(settings)
            .compile(&persona(), &history, &[], &ask("next"))
            .unwrap_err();
        assert!(matches!(err, Error::Compilation { .. }));
    }

    #[test]
    fn test_lesson_request() {
        let compiled = PromptCompiler::default()
            .compile(
                &persona(),
                &[],
                &[],
                &TurnRequest::Lesson {
                    topic: "Newton's laws".to_string(),
                },
            )
            .unwrap();
        assert!(compiled.user_turn.contains("'Newton's laws'"));
        assert!(compiled.user_turn.contains("5. Finish with questions"));
    }

    #[test]
    fn test_materials_truncate_oldest_first() {
        let materials = vec![
            material("new.txt", "NNNNN", 10),
            material("old.txt", "OOOOO", 0),
        ];
        let fitted = fit_materials(&materials, 7);
        assert_eq!(
            fitted,
            vec![("old.txt", "OO".to_string()), ("new.txt", "NNNNN".to_string())]
        );

        let fitted = fit_materials(&materials, 3);
        assert_eq!(fitted, vec![("new.txt", "NNN".to_string())]);

        assert!(fit_materials(&materials, 0).is_empty());
        assert_eq!(fit_materials(&materials, 100).len(), 2);
    }

    #[test]
    fn test_materials_in_system_prompt() {
        let materials = vec![material("notes.md", "F = ma", 0)];
        let compiled = PromptCompiler::default()
            .compile(&persona(), &[], &materials, &ask("hi"))
            .unwrap();
        assert!(compiled.system_prompt.contains("### notes.md\nF = ma"));
    }
}
