//! Tutor Factory - personality-driven AI tutors
//!
//! Main entry point for the `tutor-factory` binary. Offline commands
//! (presets, tutors, prompt and markup inspection, config) run synchronously;
//! chat and lesson drive a single-threaded tokio runtime.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use tutor_factory::blackboard::{render_ansi, render_plain, ResponseParser};
use tutor_factory::cli::{
    Cli, Commands, ConfigSubcommand, PresetSubcommand, TutorSource, TutorSubcommand,
};
use tutor_factory::client::ClaudeClient;
use tutor_factory::config::{self, AnthropicSettings, TutorConfig};
use tutor_factory::error::{Error, Result};
use tutor_factory::logging;
use tutor_factory::materials::{ReferenceMaterial, UploadLimits};
use tutor_factory::persona::{PersonaConfig, Trait};
use tutor_factory::prompt::TurnRequest;
use tutor_factory::repl::{self, ChatOptions};
use tutor_factory::session::{SessionContext, SessionSettings};
use tutor_factory::speech::SpeechClient;
use tutor_factory::storage::{PresetStore, TutorStore};
use tutor_factory::version;

/// Preset used when neither `--preset` nor `--tutor` is given
const DEFAULT_PRESET: &str = "physics-professor";

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    // Commands that need neither a loaded config nor full logging
    match &cli.command {
        Commands::Version => {
            // A broken config file should not stop `version` from working
            let model = TutorConfig::load(cli.config.as_deref())
                .map(|config| config.anthropic.model)
                .unwrap_or_else(|_| AnthropicSettings::default().model);
            version::print_version(&model);
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(cli.config.as_deref(), subcommand.clone());
        }
        _ => {}
    }

    let config = TutorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat {
            tutor,
            materials,
            speak,
            no_stream,
        } => {
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;
            log_startup(&config);
            run_chat(&config, &tutor, &materials, speak, !no_stream)
        }
        Commands::Lesson {
            topic,
            tutor,
            materials,
            no_stream,
        } => {
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;
            log_startup(&config);
            run_lesson(&config, &tutor, &materials, &topic, !no_stream)
        }
        Commands::Prompt {
            tutor,
            topic,
            message,
            materials,
            json,
        } => {
            logging::init_simple(tracing::Level::WARN)?;
            let request = match (topic, message) {
                (Some(topic), _) => TurnRequest::Lesson { topic },
                (None, Some(message)) => TurnRequest::Message(message),
                (None, None) => {
                    return Err(Error::validation(
                        "message",
                        "pass --topic or --message to compile a prompt",
                    ))
                }
            };
            compile_prompt(&config, &tutor, &materials, request, json)
        }
        Commands::Render { file, json, plain } => {
            logging::init_simple(tracing::Level::WARN)?;
            render_markup(&config, file.as_deref(), json, plain)
        }
        Commands::Preset { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_preset_command(&config, subcommand)
        }
        Commands::Tutor { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_tutor_command(&config, subcommand)
        }
        // Handled before the config was loaded
        Commands::Version | Commands::Config { .. } => Ok(()),
    }
}

fn log_startup(config: &TutorConfig) {
    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        model = %config.anthropic.model,
        data_dir = %config.data_dir().display(),
        "Starting Tutor Factory"
    );
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))
}

// ─────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────

/// Resolve the persona and any saved material for a session.
fn resolve_tutor(
    config: &TutorConfig,
    source: &TutorSource,
) -> Result<(PersonaConfig, Vec<ReferenceMaterial>)> {
    if let Some(id) = &source.tutor {
        let store = TutorStore::open(config.tutors_path(), config.app.max_saved_tutors)?;
        let record = store.get(id)?;
        debug!(tutor = %record.id, "Using saved tutor");
        return Ok((record.persona.clone(), record.materials.clone()));
    }

    let name = source.preset.as_deref().unwrap_or(DEFAULT_PRESET);
    let store = PresetStore::open(config.presets_path())?;
    Ok((store.load(name)?, Vec::new()))
}

fn read_materials(config: &TutorConfig, paths: &[PathBuf]) -> Result<Vec<ReferenceMaterial>> {
    let limits = UploadLimits::from(&config.limits);
    paths
        .iter()
        .map(|path| ReferenceMaterial::from_path(path, &limits))
        .collect()
}

fn build_session(
    config: &TutorConfig,
    source: &TutorSource,
    paths: &[PathBuf],
) -> Result<SessionContext> {
    let (persona, mut materials) = resolve_tutor(config, source)?;
    materials.extend(read_materials(config, paths)?);
    SessionContext::with_materials(persona, materials, SessionSettings::from(config))
}

fn chat_options(config: &TutorConfig, stream: bool, audio: bool) -> ChatOptions {
    ChatOptions {
        stream: stream && config.anthropic.stream,
        color: io::stdout().is_terminal(),
        audio_dir: audio.then(|| config.audio_dir()),
    }
}

/// Repl errors carry crate errors through anyhow; recover them for exit codes.
fn from_anyhow(e: anyhow::Error) -> Error {
    e.downcast::<Error>()
        .unwrap_or_else(|e| Error::Internal(format!("{:#}", e)))
}

fn run_chat(
    config: &TutorConfig,
    source: &TutorSource,
    paths: &[PathBuf],
    speak: bool,
    stream: bool,
) -> Result<()> {
    let mut session = build_session(config, source, paths)?;
    let client = ClaudeClient::new(config.anthropic.clone())?;

    let speak = speak || (config.tts.enabled && session.persona().voice().autoplay);
    let speech = if speak {
        Some(SpeechClient::new(config.tts.clone())?)
    } else {
        None
    };
    let options = chat_options(config, stream, speak);

    let rt = runtime()?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    rt.block_on(repl::run_chat(
        &mut session,
        &client,
        speech.as_ref(),
        &options,
        stdin.lock(),
        &mut stdout,
    ))
    .map_err(from_anyhow)?;

    info!(requests = client.total_requests(), "Session closed");
    Ok(())
}

fn run_lesson(
    config: &TutorConfig,
    source: &TutorSource,
    paths: &[PathBuf],
    topic: &str,
    stream: bool,
) -> Result<()> {
    let mut session = build_session(config, source, paths)?;
    let client = ClaudeClient::new(config.anthropic.clone())?;
    let options = chat_options(config, stream, false);

    let rt = runtime()?;
    let mut stdout = io::stdout();
    rt.block_on(repl::run_lesson(
        &mut session,
        &client,
        topic,
        &options,
        &mut stdout,
    ))
    .map_err(from_anyhow)?;
    Ok(())
}

fn compile_prompt(
    config: &TutorConfig,
    source: &TutorSource,
    paths: &[PathBuf],
    request: TurnRequest,
    json: bool,
) -> Result<()> {
    let session = build_session(config, source, paths)?;
    let compiled = session.compile_turn(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
    } else {
        println!("=== System prompt ===");
        println!("{}", compiled.system_prompt);
        println!();
        println!("=== User turn ===");
        println!("{}", compiled.user_turn);
        println!();
        println!("Fingerprint: {}", compiled.fingerprint);
    }
    Ok(())
}

fn render_markup(config: &TutorConfig, file: Option<&Path>, json: bool, plain: bool) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let parsed = ResponseParser::parse(&text, config.limits.max_nesting_depth)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    } else if plain || !io::stdout().is_terminal() {
        println!("{}", render_plain(&parsed.segments));
    } else {
        println!("{}", render_ansi(&parsed.segments));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Presets
// ─────────────────────────────────────────────────────────────────

fn handle_preset_command(config: &TutorConfig, subcommand: PresetSubcommand) -> Result<()> {
    let mut store = PresetStore::open(config.presets_path())?;

    match subcommand {
        PresetSubcommand::List { json } => {
            let presets = store.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
                return Ok(());
            }
            for preset in presets {
                println!(
                    "{:<26} {:<18} {:<14} {}{}",
                    preset.name,
                    preset.subject.display_name(),
                    preset.level.display_name(),
                    if preset.builtin { "[builtin] " } else { "" },
                    preset.description
                );
            }
        }
        PresetSubcommand::Show { name, json } => {
            let persona = store.load(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&persona)?);
                return Ok(());
            }
            print_persona(&persona);
            let description = store.description(&name)?;
            if !description.is_empty() {
                println!("\n{}", description);
            }
        }
        PresetSubcommand::Save {
            name,
            file,
            from,
            sets,
            display_name,
            subject,
            level,
            description,
        } => {
            let base = match (file, from) {
                (Some(path), _) => read_persona_file(&path)?,
                (None, Some(from)) => store.load(&from)?,
                (None, None) => PersonaConfig::builder(name.clone()).build()?,
            };

            let mut builder = base.to_builder();
            if let Some(display_name) = display_name {
                builder = builder.name(display_name);
            }
            if let Some(subject) = subject {
                builder = builder.subject(subject);
            }
            if let Some(level) = level {
                builder = builder.level(level);
            }
            for set in &sets {
                let (t, value) = parse_trait_override(set)?;
                builder = builder.trait_value(t, value);
            }

            store.save(&name, &description, builder.build()?)?;
            println!("Saved preset '{}'.", name);
        }
        PresetSubcommand::Delete { name } => {
            store.delete(&name)?;
            println!("Deleted preset '{}'.", name);
        }
        PresetSubcommand::Export { name, output } => {
            let json = store.export(&name)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).map_err(|e| Error::IoWrite {
                        path: path.clone(),
                        source: e,
                    })?;
                    println!("Exported '{}' to {}", name, path.display());
                }
                None => println!("{}", json),
            }
        }
        PresetSubcommand::Import { file } => {
            let name = store.import_file(&file)?;
            println!("Imported preset '{}'.", name);
        }
        PresetSubcommand::Suggest { subject, level } => {
            let suggestions = store.suggest(subject, level)?;
            if suggestions.is_empty() {
                println!("No matching presets.");
            }
            for s in suggestions {
                println!("{:>2}  {:<26} {}", s.score, s.name, s.description);
            }
        }
    }

    Ok(())
}

/// Parse `trait=value` from `--set`.
fn parse_trait_override(set: &str) -> Result<(Trait, i64)> {
    let (name, value) = set
        .split_once('=')
        .ok_or_else(|| Error::validation("set", format!("expected TRAIT=VALUE, got '{}'", set)))?;
    let name = name.trim();
    let t = Trait::from_name(name)
        .ok_or_else(|| Error::validation(format!("traits.{}", name), "unknown trait"))?;
    let value = value.trim().parse::<i64>().map_err(|_| {
        Error::validation(format!("traits.{}", name), format!("'{}' is not a number", value))
    })?;
    Ok((t, value))
}

/// Read a persona document; `.toml` files are TOML, anything else JSON.
fn read_persona_file(path: &Path) -> Result<PersonaConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&content).map_err(|e| {
            Error::validation("persona", format!("{}: {}", path.display(), e.message()))
        })
    } else {
        serde_json::from_str(&content)
            .map_err(|e| Error::validation("persona", format!("{}: {}", path.display(), e)))
    }
}

fn print_persona(persona: &PersonaConfig) {
    println!("{}", persona.name());
    println!(
        "{} / {}",
        persona.subject().display_name(),
        persona.level().display_name()
    );
    println!();
    for (t, value) in persona.traits().iter() {
        println!("  {:<24} {:>3}", t.label(), value);
    }
    let voice = persona.voice();
    println!();
    println!(
        "Voice: rate {:.1}, pitch {:.1}, autoplay {}",
        voice.rate, voice.pitch, voice.autoplay
    );
    println!();
    println!("{}", persona.profile());
}

// ─────────────────────────────────────────────────────────────────
// Saved tutors
// ─────────────────────────────────────────────────────────────────

fn handle_tutor_command(config: &TutorConfig, subcommand: TutorSubcommand) -> Result<()> {
    let mut store = TutorStore::open(config.tutors_path(), config.app.max_saved_tutors)?;

    match subcommand {
        TutorSubcommand::List { limit } => {
            let tutors = store.list_recent(limit);
            if tutors.is_empty() {
                println!("No saved tutors.");
            }
            for tutor in tutors {
                println!(
                    "{}  {}  {} ({}, {}) {} file(s)",
                    tutor.id,
                    tutor.created_at.format("%Y-%m-%d %H:%M"),
                    tutor.persona.name(),
                    tutor.persona.subject().display_name(),
                    tutor.persona.level().display_name(),
                    tutor.materials.len()
                );
            }
        }
        TutorSubcommand::Create { preset, materials } => {
            let persona = PresetStore::open(config.presets_path())?.load(&preset)?;
            let limits = UploadLimits::from(&config.limits);
            let mut attached = Vec::with_capacity(materials.len());
            for path in &materials {
                let material = ReferenceMaterial::from_path(path, &limits)?;
                limits.check_count(&material.filename, attached.len())?;
                attached.push(material);
            }

            let record = store.create(persona, attached)?;
            println!("{}", record.id);
        }
        TutorSubcommand::Show { id } => {
            let record = store.get(&id)?;
            println!("Id:      {}", record.id);
            println!("Created: {}", record.created_at.to_rfc3339());
            println!();
            print_persona(&record.persona);
            if !record.materials.is_empty() {
                println!();
                println!("Reference material:");
                for material in &record.materials {
                    println!("  {} ({} bytes)", material.filename, material.size_bytes);
                }
            }
        }
        TutorSubcommand::Delete { id } => {
            let removed = store.delete(&id)?;
            println!("Deleted tutor {}.", removed.id);
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

fn handle_config_command(config_path: Option<&str>, subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let mut cfg = TutorConfig::load(config_path)?;
            for key in [&mut cfg.anthropic.api_key, &mut cfg.tts.api_key] {
                if !key.is_empty() {
                    *key = "********".to_string();
                }
            }
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Created configuration at {}", written.display());
        }
        ConfigSubcommand::Validate => {
            TutorConfig::load(config_path)?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
