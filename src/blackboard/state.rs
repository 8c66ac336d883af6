//! Blackboard contents for the current tutor reply.

use serde::Serialize;

use super::segment::BlackboardSegment;

/// Ordered, append-only log of segments written during one reply.
///
/// `clear` starts a new reply; earlier replies live on only in the
/// conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlackboardState {
    segments: Vec<BlackboardSegment>,
}

impl BlackboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, segment: BlackboardSegment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[BlackboardSegment] {
        &self.segments
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Text on the board with styling removed.
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

impl Extend<BlackboardSegment> for BlackboardState {
    fn extend<I: IntoIterator<Item = BlackboardSegment>>(&mut self, iter: I) {
        for segment in iter {
            self.append(segment);
        }
    }
}
