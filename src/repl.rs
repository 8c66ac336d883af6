//! Interactive chat loop and one-shot lessons.
//!
//! The loop reads student input line by line, runs turns through the
//! session and draws each reply on the terminal blackboard. Errors a
//! session can recover from are printed and the loop continues.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::blackboard::{render_ansi, render_plain, render_segment, BlackboardSegment};
use crate::client::TutorClient;
use crate::error::Error;
use crate::materials::ReferenceMaterial;
use crate::prompt::TurnRequest;
use crate::session::{Role, SessionContext, TurnOutcome};
use crate::speech::{speech_text, SpeechClient};

const HELP: &str = "\
Commands:
  /lesson <topic>   structured lesson on a topic
  /board            redraw the last blackboard
  /history          show the conversation so far
  /profile          show the tutor's personality profile
  /attach <file>    attach a txt or md reference file
  /clear            forget the conversation history
  /help             show this help
  /quit             leave the session
Anything else is sent to the tutor.";

/// How replies are shown.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Draw segments as they arrive
    pub stream: bool,
    /// Use ANSI colors
    pub color: bool,
    /// Synthesize replies into this directory
    pub audio_dir: Option<PathBuf>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            stream: true,
            color: true,
            audio_dir: None,
        }
    }
}

/// One line of student input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Quit,
    Help,
    Board,
    History,
    Profile,
    Clear,
    Attach(PathBuf),
    Lesson(String),
    Message(String),
    Unknown(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> ChatInput {
        let line = line.trim();
        if line.is_empty() {
            return ChatInput::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ChatInput::Message(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name.to_ascii_lowercase().as_str(), arg.is_empty()) {
            ("quit" | "exit" | "q", _) => ChatInput::Quit,
            ("help" | "?", _) => ChatInput::Help,
            ("board", _) => ChatInput::Board,
            ("history", _) => ChatInput::History,
            ("profile", _) => ChatInput::Profile,
            ("clear", _) => ChatInput::Clear,
            ("attach", false) => ChatInput::Attach(PathBuf::from(arg)),
            ("lesson", false) => ChatInput::Lesson(arg.to_string()),
            _ => ChatInput::Unknown(line.to_string()),
        }
    }
}

/// Run the chat loop until `/quit` or end of input.
pub async fn run_chat<R, W>(
    session: &mut SessionContext,
    client: &dyn TutorClient,
    speech: Option<&SpeechClient>,
    options: &ChatOptions,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: BufRead,
    W: Write + Send,
{
    let persona = session.persona();
    writeln!(
        out,
        "{} ({}, {}) is ready. Type /help for commands.",
        persona.name(),
        persona.subject().display_name(),
        persona.level().display_name()
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "\n> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read input")?;

        let request = match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => {
                writeln!(out, "{}", HELP)?;
                continue;
            }
            ChatInput::Board => {
                draw_board(session.blackboard().segments(), options, out)?;
                continue;
            }
            ChatInput::History => {
                for turn in session.history() {
                    let who = match turn.role {
                        Role::User => "You",
                        Role::Tutor => session.persona().name(),
                    };
                    writeln!(out, "{}: {}", who, turn.text)?;
                }
                continue;
            }
            ChatInput::Profile => {
                writeln!(out, "{}", session.persona().profile())?;
                continue;
            }
            ChatInput::Clear => {
                let dropped = session.trim_history(0);
                writeln!(out, "Forgot {} turns.", dropped)?;
                continue;
            }
            ChatInput::Attach(path) => {
                let attached = ReferenceMaterial::from_path(&path, &session.settings().uploads)
                    .and_then(|material| session.attach_material(material));
                match attached {
                    Ok(()) => writeln!(out, "Attached {}.", path.display())?,
                    Err(e) => write!(out, "{}", e.format_for_terminal())?,
                }
                continue;
            }
            ChatInput::Unknown(text) => {
                writeln!(out, "Unknown command '{}'. Type /help.", text)?;
                continue;
            }
            ChatInput::Lesson(topic) => TurnRequest::Lesson { topic },
            ChatInput::Message(text) => TurnRequest::Message(text),
        };

        match take_turn(session, client, request, options, out).await {
            Ok(outcome) => {
                if let (Some(speech), Some(dir)) = (speech, options.audio_dir.as_ref()) {
                    speak(session, speech, &outcome, dir, out).await?;
                }
            }
            Err(e) if e.is_session_recoverable() => {
                writeln!(out)?;
                write!(out, "{}", e.format_for_terminal())?;
                if matches!(e, Error::Compilation { .. }) {
                    writeln!(out, "Use /clear to start the conversation over.")?;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        session = %session.id(),
        turns = session.history().len(),
        "Chat ended"
    );
    Ok(())
}

/// Run a single lesson turn and draw it.
pub async fn run_lesson<W>(
    session: &mut SessionContext,
    client: &dyn TutorClient,
    topic: &str,
    options: &ChatOptions,
    out: &mut W,
) -> Result<TurnOutcome>
where
    W: Write + Send,
{
    let request = TurnRequest::Lesson {
        topic: topic.to_string(),
    };
    let outcome = take_turn(session, client, request, options, out).await?;
    Ok(outcome)
}

async fn take_turn<W>(
    session: &mut SessionContext,
    client: &dyn TutorClient,
    request: TurnRequest,
    options: &ChatOptions,
    out: &mut W,
) -> crate::error::Result<TurnOutcome>
where
    W: Write + Send,
{
    if !options.stream {
        let outcome = session.take_turn(client, request).await?;
        draw_board(session.blackboard().segments(), options, out)?;
        return Ok(outcome);
    }

    let color = options.color;
    let outcome = session
        .take_turn_streaming(client, request, |segment| {
            // A closed terminal abandons the turn.
            write!(out, "{}", render_one(segment, color))
                .and_then(|_| out.flush())
                .is_ok()
        })
        .await?;
    writeln!(out)?;

    if !outcome.parsed {
        debug!("Reply drawn raw");
    }
    Ok(outcome)
}

fn render_one(segment: &BlackboardSegment, color: bool) -> String {
    if color {
        render_segment(segment)
    } else {
        render_plain(std::slice::from_ref(segment))
    }
}

fn draw_board<W: Write>(
    segments: &[BlackboardSegment],
    options: &ChatOptions,
    out: &mut W,
) -> std::io::Result<()> {
    let text = if options.color {
        render_ansi(segments)
    } else {
        render_plain(segments)
    };
    writeln!(out, "{}", text)
}

async fn speak<W: Write>(
    session: &SessionContext,
    speech: &SpeechClient,
    outcome: &TurnOutcome,
    dir: &std::path::Path,
    out: &mut W,
) -> Result<()> {
    let text = speech_text(&outcome.raw_text, session.settings().max_nesting_depth);
    match speech
        .synthesize_to_file(&text, &session.persona().voice(), dir)
        .await
    {
        Ok(path) => writeln!(out, "[audio: {}]", path.display())?,
        Err(e) => warn!(error = %e, "Speech synthesis failed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;
    use crate::error::UpstreamKind;
    use crate::persona::PersonaConfig;
    use crate::session::SessionSettings;
    use std::io::Cursor;

    fn session() -> SessionContext {
        let persona = PersonaConfig::builder("Prof. Oak").build().unwrap();
        SessionContext::new(persona, SessionSettings::default())
    }

    fn plain(stream: bool) -> ChatOptions {
        ChatOptions {
            stream,
            color: false,
            audio_dir: None,
        }
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(ChatInput::parse("   "), ChatInput::Empty);
        assert_eq!(ChatInput::parse("/quit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/EXIT"), ChatInput::Quit);
        assert_eq!(
            ChatInput::parse("/lesson  photosynthesis "),
            ChatInput::Lesson("photosynthesis".to_string())
        );
        assert_eq!(
            ChatInput::parse("/lesson"),
            ChatInput::Unknown("/lesson".to_string())
        );
        assert_eq!(
            ChatInput::parse("/attach notes.md"),
            ChatInput::Attach(PathBuf::from("notes.md"))
        );
        assert_eq!(
            ChatInput::parse("what is a mole?"),
            ChatInput::Message("what is a mole?".to_string())
        );
    }

    #[tokio::test]
    async fn test_chat_loop() {
        let client = MockClient::with_responses(["The [red]answer[/red] is $42$."]);
        let mut session = session();
        let input = Cursor::new("hello\n/history\n/quit\nnot read\n");
        let mut out = Vec::new();

        run_chat(&mut session, &client, None, &plain(true), input, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Prof. Oak"));
        assert!(text.contains("The answer is $42$."));
        assert!(text.contains("You: hello"));
        assert_eq!(session.history().len(), 2);
        assert_eq!(client.call_count("complete_streaming"), 1);
    }

    #[tokio::test]
    async fn test_streamed_raw_fallback_printed_once() {
        let raw = format!("intro text [blue]x{}", "[red]".repeat(40));
        let client = MockClient::with_responses([raw.clone()]);
        let mut session = session();
        let mut out = Vec::new();

        run_chat(&mut session, &client, None, &plain(true), Cursor::new("hi
"), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&raw));
        assert_eq!(text.matches("intro text").count(), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_loop_running() {
        let client = MockClient::failing(UpstreamKind::Server);
        let mut session = session();
        let input = Cursor::new("first\nsecond\n");
        let mut out = Vec::new();

        run_chat(&mut session, &client, None, &plain(false), input, &mut out)
            .await
            .unwrap();

        assert_eq!(client.call_count("complete"), 2);
        assert!(session.history().is_empty());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("E603"));
    }

    #[tokio::test]
    async fn test_lesson_one_shot() {
        let client = MockClient::with_responses(["## Intro\n[blue]Cells[/blue] are units."]);
        let mut session = session();
        let mut out = Vec::new();

        let outcome = run_lesson(&mut session, &client, "cells", &plain(false), &mut out)
            .await
            .unwrap();

        assert!(outcome.parsed);
        assert!(client
            .last_user_turn()
            .unwrap()
            .contains("cells"));
        assert_eq!(session.history()[0].text, "Please teach me about cells.");
        assert!(String::from_utf8(out).unwrap().contains("Cells are units."));
    }
}
