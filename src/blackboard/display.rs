//! Terminal rendering of blackboard segments.

use super::segment::{BlackboardSegment, ChalkColor};

const RESET: &str = "\x1b[0m";

fn color_code(color: ChalkColor) -> &'static str {
    match color {
        ChalkColor::Red => "31",
        ChalkColor::Green => "32",
        ChalkColor::Yellow => "33",
        ChalkColor::Blue => "34",
        ChalkColor::White => "97",
    }
}

/// Render one segment with ANSI styling.
///
/// Circled text is bracketed with `(( ))` and formulas are shown in italics,
/// since terminals have no circle attribute.
pub fn render_segment(segment: &BlackboardSegment) -> String {
    let mut codes: Vec<&str> = Vec::new();
    if let Some(color) = segment.style.color {
        codes.push(color_code(color));
    }
    if segment.style.underlined {
        codes.push("4");
    }
    if segment.style.circled {
        codes.push("1");
    }
    if segment.is_formula {
        codes.push("3");
    }

    let text = if segment.style.circled {
        format!("(( {} ))", segment.text)
    } else {
        segment.text.clone()
    };

    if codes.is_empty() {
        text
    } else {
        format!("\x1b[{}m{}{}", codes.join(";"), text, RESET)
    }
}

/// Render segments for an ANSI terminal.
pub fn render_ansi(segments: &[BlackboardSegment]) -> String {
    segments.iter().map(render_segment).collect()
}

/// Render segments without escape codes, keeping visible markers for
/// circled text and formulas.
pub fn render_plain(segments: &[BlackboardSegment]) -> String {
    segments
        .iter()
        .map(|s| match (s.style.circled, s.is_formula) {
            (true, true) => format!("(( ${}$ ))", s.text),
            (true, false) => format!("(( {} ))", s.text),
            (false, true) => format!("${}$", s.text),
            (false, false) => s.text.clone(),
        })
        .collect()
}
