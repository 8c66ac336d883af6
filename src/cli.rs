//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the tutor factory.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::persona::{EducationLevel, Subject};

/// Tutor Factory - build personality-driven AI tutors
///
/// Configure a tutor persona, attach reference material and study with it
/// on a terminal blackboard.
#[derive(Parser, Debug)]
#[command(name = "tutor-factory")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "TUTOR_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with a tutor on the blackboard
    Chat {
        #[command(flatten)]
        tutor: TutorSource,

        /// Reference file to attach (txt or md, repeatable)
        #[arg(short, long = "material")]
        materials: Vec<PathBuf>,

        /// Speak replies aloud (writes audio files)
        #[arg(long)]
        speak: bool,

        /// Wait for whole replies instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Ask for a structured lesson on one topic
    Lesson {
        /// Lesson topic
        topic: String,

        #[command(flatten)]
        tutor: TutorSource,

        /// Reference file to attach (txt or md, repeatable)
        #[arg(short, long = "material")]
        materials: Vec<PathBuf>,

        /// Wait for the whole reply instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Compile and print a prompt without calling the model
    Prompt {
        #[command(flatten)]
        tutor: TutorSource,

        /// Compile a lesson request for this topic
        #[arg(long, conflicts_with = "message")]
        topic: Option<String>,

        /// Compile a chat message
        #[arg(long)]
        message: Option<String>,

        /// Reference file to attach (txt or md, repeatable)
        #[arg(short, long = "material")]
        materials: Vec<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse blackboard markup from a file or stdin
    Render {
        /// Input file (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print segments as JSON
        #[arg(long, conflicts_with = "plain")]
        json: bool,

        /// Print without terminal colors
        #[arg(long)]
        plain: bool,
    },

    /// Preset management
    Preset {
        #[command(subcommand)]
        subcommand: PresetSubcommand,
    },

    /// Saved tutor management
    Tutor {
        #[command(subcommand)]
        subcommand: TutorSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Which persona to teach with
#[derive(Args, Debug, Clone, Default)]
pub struct TutorSource {
    /// Preset name (bundled or saved)
    #[arg(short, long, conflicts_with = "tutor")]
    pub preset: Option<String>,

    /// Saved tutor id or id prefix
    #[arg(short, long)]
    pub tutor: Option<String>,
}

/// Preset subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PresetSubcommand {
    /// List bundled and saved presets
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a preset with its personality profile
    Show {
        name: String,

        /// Print the persona as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save a user preset
    Save {
        /// Preset name
        name: String,

        /// Persona file (TOML or JSON)
        #[arg(long, conflicts_with = "from")]
        file: Option<PathBuf>,

        /// Start from an existing preset
        #[arg(long)]
        from: Option<String>,

        /// Override a trait, e.g. --set humor_level=80 (repeatable)
        #[arg(long = "set", value_name = "TRAIT=VALUE")]
        sets: Vec<String>,

        /// Tutor display name
        #[arg(long)]
        display_name: Option<String>,

        /// Subject taught
        #[arg(long)]
        subject: Option<Subject>,

        /// Student education level
        #[arg(long)]
        level: Option<EducationLevel>,

        /// Short description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Delete a user preset
    Delete { name: String },

    /// Export a preset as JSON
    Export {
        name: String,

        /// Output file (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a preset from an exported JSON file
    Import { file: PathBuf },

    /// Suggest presets for a subject and level
    Suggest {
        #[arg(long)]
        subject: Option<Subject>,

        #[arg(long)]
        level: Option<EducationLevel>,
    },
}

/// Saved tutor subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum TutorSubcommand {
    /// List saved tutors, newest first
    List {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Save a tutor from a preset and reference files
    Create {
        /// Preset to build the tutor from
        #[arg(short, long)]
        preset: String,

        /// Reference file to attach (txt or md, repeatable)
        #[arg(short, long = "material")]
        materials: Vec<PathBuf>,
    },

    /// Show a saved tutor
    Show { id: String },

    /// Delete a saved tutor and its reference material
    Delete { id: String },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}
