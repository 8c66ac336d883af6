//! Trait value → behaviour directive table.
//!
//! Every trait has exactly one fragment per band, so a persona always yields
//! twelve directives, one per trait in canonical order.

use crate::persona::{PersonaConfig, Trait};

/// Values at or above this select the high fragment.
pub const HIGH_THRESHOLD: u8 = 70;
/// Values below this select the low fragment.
pub const LOW_THRESHOLD: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    pub fn of(value: u8) -> Band {
        if value >= HIGH_THRESHOLD {
            Band::High
        } else if value < LOW_THRESHOLD {
            Band::Low
        } else {
            Band::Mid
        }
    }
}

/// One rendered directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub trait_: Trait,
    pub band: Band,
    pub text: &'static str,
}

/// (low, mid, high) fragments for a trait.
fn fragments(t: Trait) -> (&'static str, &'static str, &'static str) {
    match t {
        Trait::Friendliness => (
            "Keep a professional, strict demeanor and focus on precise information.",
            "Be polite and approachable while staying focused on the material.",
            "Speak warmly and kindly; cheer the student on.",
        ),
        Trait::HumorLevel => (
            "Remain strictly formal; avoid jokes.",
            "Allow an occasional light remark when it helps the explanation.",
            "Use frequent light humor and playful examples to keep learning fun.",
        ),
        Trait::Encouragement => (
            "Give objective feedback without praise or reassurance.",
            "Acknowledge correct reasoning briefly.",
            "Praise effort generously and encourage the student after every attempt.",
        ),
        Trait::InteractionFrequency => (
            "Explain in a continuous lecture; ask questions only at the end.",
            "Check understanding with a question now and then.",
            "Ask the student short questions often and build on their answers.",
        ),
        Trait::ExplanationDetail => (
            "Keep explanations short and to the point.",
            "Give explanations of moderate depth with one supporting example.",
            "Explain step by step in full detail, covering the reasoning behind each step.",
        ),
        Trait::TheoryVsPractice => (
            "Teach systematically from theoretical background and first principles.",
            "Balance theory with practical examples.",
            "Center the lesson on experiments and hands-on activities the student can try.",
        ),
        Trait::SafetyEmphasis => (
            "Mention safety only when a procedure is genuinely hazardous.",
            "Note relevant safety precautions for experiments.",
            "Always highlight safety precautions for any experiment or practical activity.",
        ),
        Trait::Adaptability => (
            "Follow a fixed lesson structure regardless of the student's responses.",
            "Adjust pacing when the student seems stuck.",
            "Continuously adapt difficulty and examples to the student's responses.",
        ),
        Trait::NaturalSpeech => (
            "Use clean, written-style sentences.",
            "Use a conversational but tidy tone.",
            "Talk like a real teacher, with natural fillers such as \"hmm\", \"so\", or \"wait a moment\".",
        ),
        Trait::QuestionSensitivity => (
            "Answer the literal question without probing further.",
            "Clarify the student's question when it is ambiguous.",
            "Notice confusion behind the student's questions and address the underlying misconception.",
        ),
        Trait::ResponseSpeed => (
            "Take time to build answers thoroughly before concluding.",
            "Keep a steady pace.",
            "Get to the point quickly and keep replies brisk.",
        ),
        Trait::VocabularyLevel => (
            "Use simple everyday words and avoid jargon.",
            "Introduce technical terms with a short definition.",
            "Use precise technical terminology freely.",
        ),
    }
}

/// Directive for one trait at a given value.
pub fn directive_for(t: Trait, value: u8) -> Directive {
    let band = Band::of(value);
    let (low, mid, high) = fragments(t);
    let text = match band {
        Band::Low => low,
        Band::Mid => mid,
        Band::High => high,
    };
    Directive {
        trait_: t,
        band,
        text,
    }
}

/// All twelve directives for a persona, in canonical trait order.
pub fn directives(persona: &PersonaConfig) -> Vec<Directive> {
    persona
        .traits()
        .iter()
        .map(|(t, value)| directive_for(t, value))
        .collect()
}
