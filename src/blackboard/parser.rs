//! Incremental parser for blackboard markup in model replies.
//!
//! Grammar:
//! - `[name]...[/name]` directives, names case-insensitive:
//!   colors `red` `blue` `green` `yellow` `white`, `underline` (`u`),
//!   `circle`, `formula` (`latex`, `math`)
//! - `$...$` inline and `$$...$$` display formulas, `\$` for a literal dollar
//!
//! Unknown or malformed bracket tokens are literal text. A closing tag closes
//! back to its matching open directive; a closing tag with nothing to match
//! is literal. Open directives left at the end of the reply are closed
//! implicitly. Only exceeding the nesting limit is an error.
//!
//! Input may arrive in arbitrary chunks: a tag or `$$` split across chunk
//! boundaries is held back until the next chunk decides it.

use serde::Serialize;
use tracing::trace;

use super::segment::{BlackboardSegment, ChalkColor, ChalkStyle};
use crate::error::{Error, Result};

/// Longest tag body (between the brackets) that is still recognised.
pub const MAX_TAG_LEN: usize = 32;

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// The closed set of directives the tutor can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Color(ChalkColor),
    Underline,
    Circle,
    Formula,
}

impl Directive {
    fn from_name(name: &str) -> Option<Directive> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "underline" | "u" => Some(Directive::Underline),
            "circle" => Some(Directive::Circle),
            "formula" | "latex" | "math" => Some(Directive::Formula),
            other => ChalkColor::from_name(other).map(Directive::Color),
        }
    }
}

/// One bracketed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Open(Directive),
    Close(Directive),
}

impl Tag {
    fn parse(body: &str) -> Option<Tag> {
        match body.strip_prefix('/') {
            Some(name) => Directive::from_name(name).map(Tag::Close),
            None => Directive::from_name(body).map(Tag::Open),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathMode {
    Inline,
    Display,
}

/// Outcome of looking at a `[`.
enum Bracket {
    /// A directive was applied; skip this many bytes
    Consumed(usize),
    /// Not a directive; emit `[` as text
    Literal,
    /// Could still become a directive once more input arrives
    Incomplete,
}

/// Final result of parsing one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedResponse {
    pub segments: Vec<BlackboardSegment>,
    /// Reply text with all markup removed
    pub plain_text: String,
}

#[derive(Debug)]
pub struct ResponseParser {
    max_depth: usize,
    pending: String,
    stack: Vec<Directive>,
    math: Option<MathMode>,
    run: String,
    run_style: (ChalkStyle, bool),
    segments: Vec<BlackboardSegment>,
    /// Input offset just past the last char of each segment
    segment_ends: Vec<usize>,
    emitted: usize,
    plain: String,
    /// Bytes of input fully consumed so far
    offset: usize,
    /// Input offset just past the last char of the current run
    run_end: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ResponseParser {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            pending: String::new(),
            stack: Vec::new(),
            math: None,
            run: String::new(),
            run_style: (ChalkStyle::default(), false),
            segments: Vec::new(),
            segment_ends: Vec::new(),
            emitted: 0,
            plain: String::new(),
            offset: 0,
            run_end: 0,
        }
    }

    /// Parse a complete reply in one call.
    pub fn parse(input: &str, max_depth: usize) -> Result<ParsedResponse> {
        let mut parser = Self::new(max_depth);
        parser.feed(input)?;
        parser.finish()?;
        Ok(parser.into_response())
    }

    /// Feed the next chunk; returns segments completed by it.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<BlackboardSegment>> {
        self.pending.push_str(chunk);
        self.scan(false)?;
        Ok(self.take_new())
    }

    /// Resolve held-back input, close open directives and flush the last
    /// run. Returns the segments not yet handed out by `feed`.
    pub fn finish(&mut self) -> Result<Vec<BlackboardSegment>> {
        self.scan(true)?;
        if !self.stack.is_empty() || self.math.is_some() {
            trace!(
                open = self.stack.len(),
                math = self.math.is_some(),
                "Closing unterminated directives"
            );
        }
        self.stack.clear();
        self.math = None;
        self.flush_run();
        Ok(self.take_new())
    }

    pub fn into_response(self) -> ParsedResponse {
        ParsedResponse {
            segments: self.segments,
            plain_text: self.plain,
        }
    }

    /// Directives currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bytes of input covered by the segments handed out so far.
    ///
    /// Everything from this offset on has not reached the caller yet, which
    /// is what a caller should show verbatim if parsing fails midway.
    pub fn delivered_offset(&self) -> usize {
        match self.emitted {
            0 => 0,
            n => self.segment_ends[n - 1],
        }
    }

    fn take_new(&mut self) -> Vec<BlackboardSegment> {
        let fresh = self.segments[self.emitted..].to_vec();
        self.emitted = self.segments.len();
        fresh
    }

    fn scan(&mut self, finished: bool) -> Result<()> {
        let buf = std::mem::take(&mut self.pending);
        let mut pos = 0;

        while let Some(c) = buf[pos..].chars().next() {
            let rest = &buf[pos..];
            let written = self.plain.len();
            match c {
                '[' => match self.bracket(rest, finished, self.offset + pos)? {
                    Bracket::Consumed(n) => pos += n,
                    Bracket::Literal => {
                        self.push_char('[');
                        pos += 1;
                    }
                    Bracket::Incomplete => break,
                },
                '\\' => match rest[1..].chars().next() {
                    Some('$') => {
                        self.push_char('$');
                        pos += 2;
                    }
                    None if !finished => break,
                    _ => {
                        self.push_char('\\');
                        pos += 1;
                    }
                },
                '$' => {
                    let next = rest[1..].chars().next();
                    if next.is_none() && !finished {
                        break;
                    }
                    pos += self.dollar(next == Some('$'));
                }
                _ => {
                    self.push_char(c);
                    pos += c.len_utf8();
                }
            }
            if self.plain.len() != written {
                self.run_end = self.offset + pos;
            }
        }

        self.offset += pos;
        self.pending = buf[pos..].to_string();
        Ok(())
    }

    fn bracket(&mut self, rest: &str, finished: bool, at: usize) -> Result<Bracket> {
        let body = &rest[1..];
        // Only the first MAX_TAG_LEN + 1 chars can hold a recognisable `]`
        let mut window = body.char_indices().take(MAX_TAG_LEN + 1);
        let Some(end) = window.find(|&(_, c)| c == ']').map(|(i, _)| i) else {
            let seen = body.chars().take(MAX_TAG_LEN + 1).count();
            if !finished && seen <= MAX_TAG_LEN {
                return Ok(Bracket::Incomplete);
            }
            return Ok(Bracket::Literal);
        };

        let token = &body[..end];

        match Tag::parse(token) {
            Some(Tag::Open(directive)) => {
                if self.stack.len() >= self.max_depth {
                    return Err(Error::parse(
                        format!(
                            "directive nesting exceeds the limit of {}",
                            self.max_depth
                        ),
                        at,
                    ));
                }
                self.stack.push(directive);
                Ok(Bracket::Consumed(end + 2))
            }
            Some(Tag::Close(directive)) => {
                match self.stack.iter().rposition(|open| *open == directive) {
                    Some(index) => {
                        self.stack.truncate(index);
                        Ok(Bracket::Consumed(end + 2))
                    }
                    None => Ok(Bracket::Literal),
                }
            }
            None => Ok(Bracket::Literal),
        }
    }

    /// Apply a `$` or `$$`; returns bytes consumed.
    fn dollar(&mut self, double: bool) -> usize {
        match (self.math, double) {
            (None, true) => {
                self.math = Some(MathMode::Display);
                2
            }
            (None, false) => {
                self.math = Some(MathMode::Inline);
                1
            }
            (Some(MathMode::Inline), _) => {
                self.math = None;
                1
            }
            (Some(MathMode::Display), true) => {
                self.math = None;
                2
            }
            (Some(MathMode::Display), false) => {
                self.push_char('$');
                1
            }
        }
    }

    fn current_style(&self) -> (ChalkStyle, bool) {
        let mut style = ChalkStyle::default();
        let mut formula = self.math.is_some();
        for directive in &self.stack {
            match directive {
                Directive::Color(color) => style.color = Some(*color),
                Directive::Underline => style.underlined = true,
                Directive::Circle => style.circled = true,
                Directive::Formula => formula = true,
            }
        }
        (style, formula)
    }

    fn push_char(&mut self, c: char) {
        let style = self.current_style();
        if style != self.run_style {
            self.flush_run();
            self.run_style = style;
        }
        self.run.push(c);
        self.plain.push(c);
    }

    fn flush_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let (style, is_formula) = self.run_style;
        self.segments.push(BlackboardSegment {
            text: std::mem::take(&mut self.run),
            style,
            is_formula,
        });
        self.segment_ends.push(self.run_end);
    }
}
