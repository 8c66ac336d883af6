//! Tutor Factory
//!
//! Personality-driven AI tutors: a persona's trait scores are compiled into
//! language-model prompts, and the tutor's replies are parsed into styled
//! blackboard segments.
//!
//! The core ([`persona`], [`prompt`], [`blackboard`], [`session`]) performs
//! no I/O. Network access lives behind [`client::TutorClient`] and
//! [`speech::SpeechClient`]; persistence lives in [`storage`].

pub mod blackboard;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod materials;
pub mod persona;
pub mod prompt;
pub mod repl;
pub mod session;
pub mod speech;
pub mod storage;
pub mod version;

pub use error::{Error, ErrorCode, Result};
