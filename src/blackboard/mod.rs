//! Blackboard: parsing tutor replies into styled chalk segments.

pub mod display;
pub mod parser;
pub mod segment;
pub mod state;

pub use display::{render_ansi, render_plain, render_segment};
pub use parser::{Directive, ParsedResponse, ResponseParser, DEFAULT_MAX_DEPTH, MAX_TAG_LEN};
pub use segment::{BlackboardSegment, ChalkColor, ChalkStyle};
pub use state::BlackboardState;
