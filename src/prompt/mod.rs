//! Persona → language-model prompt compilation.

pub mod compiler;
pub mod directives;

pub use compiler::{CompiledPrompt, PromptCompiler, PromptSettings, TurnRequest};
pub use directives::{directive_for, directives, Band, Directive};
