//! Blackboard segment types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chalk colors the tutor may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChalkColor {
    Red,
    Blue,
    Green,
    Yellow,
    White,
}

impl ChalkColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChalkColor::Red => "red",
            ChalkColor::Blue => "blue",
            ChalkColor::Green => "green",
            ChalkColor::Yellow => "yellow",
            ChalkColor::White => "white",
        }
    }

    pub fn from_name(name: &str) -> Option<ChalkColor> {
        match name {
            "red" => Some(ChalkColor::Red),
            "blue" => Some(ChalkColor::Blue),
            "green" => Some(ChalkColor::Green),
            "yellow" => Some(ChalkColor::Yellow),
            "white" => Some(ChalkColor::White),
            _ => None,
        }
    }
}

impl fmt::Display for ChalkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visual styling of one segment. The innermost color wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChalkStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ChalkColor>,
    #[serde(default)]
    pub underlined: bool,
    #[serde(default)]
    pub circled: bool,
}

impl ChalkStyle {
    pub fn is_plain(&self) -> bool {
        self.color.is_none() && !self.underlined && !self.circled
    }
}

/// A run of text written on the blackboard with one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackboardSegment {
    pub text: String,
    #[serde(default)]
    pub style: ChalkStyle,
    #[serde(default)]
    pub is_formula: bool,
}

impl BlackboardSegment {
    /// Unstyled text segment.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: ChalkStyle::default(),
            is_formula: false,
        }
    }
}
