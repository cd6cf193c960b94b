//! Trigger phrase matching
//!
//! Matching is substring based: a normalized utterance matches when it
//! contains any accepted variant. "i am not human" therefore matches too.

/// Accepted variants, checked in this order
pub const ACCEPTED_PHRASES: &[&str] = &[
    "i am human",
    "i'm human",
    "i am a human",
    "i'm a human",
    "i am the human",
    "i am human being",
    "i am a human being",
    "i'm a human being",
    "i am the human being",
    "i am a human person",
];

/// Lowercase and trim an utterance
pub fn normalize(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

/// Checks utterances against the accepted variants
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    phrases: Vec<String>,
}

impl PhraseMatcher {
    pub fn new() -> Self {
        Self {
            phrases: ACCEPTED_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// First accepted variant contained in the utterance
    pub fn find(&self, utterance: &str) -> Option<&str> {
        let normalized = normalize(utterance);
        self.phrases
            .iter()
            .find(|phrase| normalized.contains(phrase.as_str()))
            .map(String::as_str)
    }

    pub fn is_match(&self, utterance: &str) -> bool {
        self.find(utterance).is_some()
    }

    /// Index of the first alternative that matches; later ones are not checked
    pub fn first_matching<'a, I>(&self, alternatives: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        alternatives
            .into_iter()
            .position(|alternative| self.is_match(alternative))
    }
}

impl Default for PhraseMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let matcher = PhraseMatcher::new();
        assert!(matcher.is_match("I AM HUMAN!"));
        assert!(matcher.is_match("   i'm a human   "));
    }

    #[test]
    fn test_substring_semantics() {
        let matcher = PhraseMatcher::new();
        assert!(matcher.is_match("well, i am a human being, yes"));
        assert!(matcher.is_match("i am not human"));
    }

    #[test]
    fn test_rejects_unrelated() {
        let matcher = PhraseMatcher::new();
        assert!(!matcher.is_match("hello mirror"));
        assert!(!matcher.is_match("human i am"));
        assert!(!matcher.is_match(""));
    }

    #[test]
    fn test_first_variant_wins() {
        let matcher = PhraseMatcher::new();
        assert_eq!(matcher.find("I am the human being"), Some("i am the human"));
        assert_eq!(matcher.find("i am a human person"), Some("i am a human"));
    }

    #[test]
    fn test_first_matching_alternative() {
        let matcher = PhraseMatcher::new();
        let alternatives = ["I am you men", "I am human", "I'm human"];
        assert_eq!(matcher.first_matching(alternatives), Some(1));
        assert_eq!(matcher.first_matching(["nothing here"]), None);
    }
}
