//! Append-only conversation transcript

use serde::Serialize;

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub is_user: bool,
}

/// Conversation turns in arrival order
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn; blank text is dropped. Returns whether it was kept.
    pub fn push(&mut self, text: String, is_user: bool) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.entries.push(TranscriptEntry { text, is_user });
        true
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_arrival_order() {
        let mut t = Transcript::new();
        assert!(t.push("hello".into(), true));
        assert!(t.push("hi there".into(), false));

        let texts: Vec<_> = t.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["hello", "hi there"]);
        assert!(t.entries()[0].is_user);
    }

    #[test]
    fn test_drops_blank_text() {
        let mut t = Transcript::new();
        assert!(!t.push("   ".into(), true));
        assert!(!t.push(String::new(), false));
        assert!(t.is_empty());
    }
}
