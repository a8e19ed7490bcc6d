use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// Upper bound on memories extracted from one reply.
pub const MAX_AUTO_MEMORIES: usize = 2;
pub const MIN_SENTENCE_CHARS: usize = 10;
pub const MAX_SENTENCE_CHARS: usize = 200;

/// Explicit requests to remember something. These win over the other cues.
pub const EXPLICIT_MEMORY_PATTERNS: [&str; 6] = [
    r"(I will|I'll|I am going to) (remember|not forget|keep in mind)",
    r"(Don't|Do not) forget",
    r"(This is|That's) important",
    r"(Promise|I promise)",
    r"(Always|Never) ",
    r"Must (remember|not forget|keep in mind)",
];

pub const PERSONAL_DISCLOSURE_PATTERNS: [&str; 8] = [
    r"My (name|age|birthday|address|phone|email)",
    r"I (am|was) (born|from|raised)",
    r"I (work|study) at",
    r"I (live|live in)",
    r"My (favorite|least favorite)",
    r"I (like|love|hate|enjoy|dislike|prefer)",
    r"I am (afraid of|scared of|worried about)",
    r"I have (a|an) .* (experience|story|memory)",
];

pub const FUTURE_INTENTION_PATTERNS: [&str; 3] = [
    r"I (will|would like to|plan to|intend to)",
    r"Going to ",
    r"In the future",
];

/// Why a sentence was considered memory-worthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCue {
    Explicit,
    PersonalDisclosure,
    FutureIntention,
}

struct CuePatterns {
    explicit: Vec<Regex>,
    personal: Vec<Regex>,
    intention: Vec<Regex>,
}

fn cue_patterns() -> &'static CuePatterns {
    static PATTERNS: OnceLock<CuePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CuePatterns {
        explicit: compile(&EXPLICIT_MEMORY_PATTERNS),
        personal: compile(&PERSONAL_DISCLOSURE_PATTERNS),
        intention: compile(&FUTURE_INTENTION_PATTERNS),
    })
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("memory cue pattern is a valid regex")
        })
        .collect()
}

fn sentence_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary is a valid regex"))
}

/// Split after `.`, `!` or `?` when followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in sentence_boundary().find_iter(text) {
        // The punctuation is ASCII, so `start() + 1` is a char boundary.
        sentences.push(&text[start..boundary.start() + 1]);
        start = boundary.end();
    }
    sentences.push(&text[start..]);
    sentences
}

/// Strongest cue matched by `sentence`, if any.
pub fn classify(sentence: &str) -> Option<MemoryCue> {
    let patterns = cue_patterns();
    let matches = |family: &[Regex]| family.iter().any(|pattern| pattern.is_match(sentence));
    if matches(&patterns.explicit) {
        Some(MemoryCue::Explicit)
    } else if matches(&patterns.personal) {
        Some(MemoryCue::PersonalDisclosure)
    } else if matches(&patterns.intention) {
        Some(MemoryCue::FutureIntention)
    } else {
        None
    }
}

/// Memory-worthy sentences from a model reply, explicit cues first.
///
/// Returns at most [`MAX_AUTO_MEMORIES`] sentences; within each priority the
/// order of appearance is kept.
pub fn extract(text: &str) -> Vec<String> {
    let mut explicit = Vec::new();
    let mut other = Vec::new();

    for sentence in split_sentences(text) {
        let sentence = sentence.trim();
        let length = sentence.chars().count();
        if !(MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&length) {
            continue;
        }
        match classify(sentence) {
            Some(MemoryCue::Explicit) => explicit.push(sentence.to_string()),
            Some(_) => other.push(sentence.to_string()),
            None => {}
        }
    }

    explicit.truncate(MAX_AUTO_MEMORIES);
    let remaining = MAX_AUTO_MEMORIES - explicit.len();
    explicit.extend(other.into_iter().take(remaining));
    explicit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sentences_breaks_after_terminal_punctuation() {
        assert_eq!(
            split_sentences("Hello there. How are you?  Fine! ok"),
            vec!["Hello there.", "How are you?", "Fine!", "ok"]
        );
    }

    #[test]
    fn split_sentences_ignores_punctuation_without_whitespace() {
        assert_eq!(split_sentences("Version 1.5 is out."), vec!["Version 1.5 is out."]);
    }

    #[test]
    fn classify_prefers_explicit_cues() {
        assert_eq!(
            classify("I will remember that you live in Paris."),
            Some(MemoryCue::Explicit)
        );
        assert_eq!(
            classify("My favorite tea is jasmine."),
            Some(MemoryCue::PersonalDisclosure)
        );
        assert_eq!(
            classify("We are going to sail at dawn."),
            Some(MemoryCue::FutureIntention)
        );
        assert_eq!(classify("The weather is grey today."), None);
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(classify("DON'T FORGET the key"), Some(MemoryCue::Explicit));
    }

    #[test]
    fn extract_skips_sentences_outside_length_bounds() {
        assert!(extract("I love.").is_empty());
        let long = format!("I love {}.", "very ".repeat(50));
        assert!(extract(&long).is_empty());
    }
}
