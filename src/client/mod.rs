//! Language-model clients.
//!
//! The session only sees [`TutorClient`]; [`ClaudeClient`] talks to the
//! Anthropic Messages API and [`MockClient`] replays scripted replies.

pub mod claude;
pub mod mock;
pub mod traits;

pub use claude::ClaudeClient;
pub use mock::{MockClient, MockConfig};
pub use traits::{ChunkCallback, TutorClient};
