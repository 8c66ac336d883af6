//! Tutoring session context.
//!
//! A session owns everything one conversation needs: the persona, the
//! ordered history, the current blackboard and attached reference material.
//! Sessions share nothing; the caller passes the context into every turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::blackboard::{BlackboardSegment, BlackboardState, ResponseParser};
use crate::client::TutorClient;
use crate::config::TutorConfig;
use crate::error::{Error, Result};
use crate::materials::{ReferenceMaterial, UploadLimits};
use crate::persona::PersonaConfig;
use crate::prompt::{CompiledPrompt, PromptCompiler, PromptSettings, TurnRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Tutor,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Session limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub prompt: PromptSettings,
    pub uploads: UploadLimits,
    pub max_nesting_depth: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            prompt: PromptSettings::default(),
            uploads: UploadLimits::default(),
            max_nesting_depth: crate::blackboard::DEFAULT_MAX_DEPTH,
        }
    }
}

impl From<&TutorConfig> for SessionSettings {
    fn from(config: &TutorConfig) -> Self {
        Self {
            prompt: PromptSettings::from(config),
            uploads: UploadLimits::from(&config.limits),
            max_nesting_depth: config.limits.max_nesting_depth,
        }
    }
}

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Conversational text with markup removed
    pub plain_text: String,
    /// Raw model output
    pub raw_text: String,
    /// False when the reply could not be parsed and is shown raw
    pub parsed: bool,
}

/// All mutable state for one tutoring conversation.
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    persona: PersonaConfig,
    history: Vec<ConversationTurn>,
    blackboard: BlackboardState,
    materials: Vec<ReferenceMaterial>,
    compiler: PromptCompiler,
    settings: SessionSettings,
}

impl SessionContext {
    pub fn new(persona: PersonaConfig, settings: SessionSettings) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, persona = persona.name(), "Session started");
        Self {
            id,
            persona,
            history: Vec::new(),
            blackboard: BlackboardState::new(),
            materials: Vec::new(),
            compiler: PromptCompiler::new(settings.prompt),
            settings,
        }
    }

    /// Start a session with materials saved alongside a tutor.
    pub fn with_materials(
        persona: PersonaConfig,
        materials: Vec<ReferenceMaterial>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let mut session = Self::new(persona, settings);
        for material in materials {
            session.attach_material(material)?;
        }
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn blackboard(&self) -> &BlackboardState {
        &self.blackboard
    }

    pub fn materials(&self) -> &[ReferenceMaterial] {
        &self.materials
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Attach reference material, enforcing the per-tutor file count.
    pub fn attach_material(&mut self, material: ReferenceMaterial) -> Result<()> {
        self.settings
            .uploads
            .check_count(&material.filename, self.materials.len())?;
        debug!(
            session = %self.id,
            filename = %material.filename,
            "Reference material attached"
        );
        self.materials.push(material);
        Ok(())
    }

    /// Drop all but the most recent `keep` turns.
    ///
    /// This is the recovery path after a compilation error.
    pub fn trim_history(&mut self, keep: usize) -> usize {
        let drop = self.history.len().saturating_sub(keep);
        self.history.drain(..drop);
        if drop > 0 {
            info!(session = %self.id, dropped = drop, "History trimmed");
        }
        drop
    }

    /// Compile the prompt for a request without sending it.
    pub fn compile_turn(&self, request: &TurnRequest) -> Result<CompiledPrompt> {
        self.compiler
            .compile(&self.persona, &self.history, &self.materials, request)
    }

    /// Run one turn: compile, call the client, parse onto the blackboard
    /// and record both sides in history.
    ///
    /// Client errors are returned unchanged and leave history untouched.
    /// A reply the parser cannot handle is shown raw as one plain segment.
    pub async fn take_turn(
        &mut self,
        client: &dyn TutorClient,
        request: TurnRequest,
    ) -> Result<TurnOutcome> {
        let prompt = self.compile_turn(&request)?;
        self.blackboard.clear();

        debug!(session = %self.id, client = client.name(), "Sending turn");
        let raw = client
            .complete(&prompt.system_prompt, &prompt.user_turn)
            .await?;

        let (segments, plain_text, parsed) =
            match ResponseParser::parse(&raw, self.settings.max_nesting_depth) {
                Ok(response) => (response.segments, response.plain_text, true),
                Err(e) => {
                    warn!(session = %self.id, error = %e.format_for_log(), "Showing raw reply");
                    (vec![BlackboardSegment::plain(raw.clone())], raw.clone(), false)
                }
            };
        self.blackboard.extend(segments);

        Ok(self.record(request, raw, plain_text, parsed))
    }

    /// Like [`take_turn`](Self::take_turn) but writes segments to the
    /// blackboard as they complete, handing each to `on_segment`.
    ///
    /// If `on_segment` returns `false` the turn is abandoned: the blackboard
    /// is cleared, history is unchanged and [`Error::TurnAbandoned`] is
    /// returned. If parsing fails midway, the segments already handed out
    /// stay and the rest of the reply follows verbatim as one plain segment.
    pub async fn take_turn_streaming<F>(
        &mut self,
        client: &dyn TutorClient,
        request: TurnRequest,
        mut on_segment: F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(&BlackboardSegment) -> bool + Send,
    {
        let prompt = self.compile_turn(&request)?;
        self.blackboard.clear();

        let mut parser = ResponseParser::new(self.settings.max_nesting_depth);
        let mut parse_error: Option<Error> = None;
        let board = &mut self.blackboard;

        let result = {
            let on_chunk = Box::new(|chunk: &str| {
                if parse_error.is_some() {
                    return true;
                }
                match parser.feed(chunk) {
                    Ok(segments) => deliver(&mut *board, segments, &mut on_segment),
                    Err(e) => {
                        parse_error = Some(e);
                        true
                    }
                }
            });
            client
                .complete_streaming(&prompt.system_prompt, &prompt.user_turn, on_chunk)
                .await
        };

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                self.blackboard.clear();
                if matches!(e, Error::TurnAbandoned) {
                    info!(session = %self.id, "Turn abandoned");
                }
                return Err(e);
            }
        };

        let tail = match parse_error {
            None => parser.finish(),
            Some(e) => Err(e),
        };

        let (plain_text, parsed) = match tail {
            Ok(segments) => {
                if !deliver(&mut self.blackboard, segments, &mut on_segment) {
                    self.blackboard.clear();
                    info!(session = %self.id, "Turn abandoned");
                    return Err(Error::TurnAbandoned);
                }
                (parser.into_response().plain_text, true)
            }
            Err(e) => {
                warn!(session = %self.id, error = %e.format_for_log(), "Showing raw reply");
                let rest = raw.get(parser.delivered_offset()..).unwrap_or_default();
                if !rest.is_empty() {
                    let fallback = vec![BlackboardSegment::plain(rest)];
                    if !deliver(&mut self.blackboard, fallback, &mut on_segment) {
                        self.blackboard.clear();
                        info!(session = %self.id, "Turn abandoned");
                        return Err(Error::TurnAbandoned);
                    }
                }
                (raw.clone(), false)
            }
        };

        Ok(self.record(request, raw, plain_text, parsed))
    }

    fn record(
        &mut self,
        request: TurnRequest,
        raw: String,
        plain_text: String,
        parsed: bool,
    ) -> TurnOutcome {
        self.history
            .push(ConversationTurn::new(Role::User, request.history_text()));
        self.history
            .push(ConversationTurn::new(Role::Tutor, plain_text.clone()));

        debug!(
            session = %self.id,
            turns = self.history.len(),
            segments = self.blackboard.len(),
            parsed,
            "Turn recorded"
        );

        TurnOutcome {
            plain_text,
            raw_text: raw,
            parsed,
        }
    }
}

/// Append segments to the board, stopping if the consumer abandons.
fn deliver<F>(
    board: &mut BlackboardState,
    segments: Vec<BlackboardSegment>,
    on_segment: &mut F,
) -> bool
where
    F: FnMut(&BlackboardSegment) -> bool,
{
    for segment in segments {
        let keep_going = on_segment(&segment);
        board.append(segment);
        if !keep_going {
            return false;
        }
    }
    true
}
