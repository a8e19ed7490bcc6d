use super::store::MemoryRecord;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

/// Minimum keyword length, in word characters.
pub const MIN_KEYWORD_LEN: usize = 4;

/// Inverted index from lowercase keyword to record keys.
///
/// Derived from the store and never authoritative: keys may dangle after
/// external edits to the memory file, so lookups must be resolved against a
/// fresh snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    keywords: HashMap<String, BTreeSet<u64>>,
}

impl MemoryIndex {
    /// Clear and repopulate from `records`.
    pub fn rebuild(&mut self, records: &[MemoryRecord]) {
        self.keywords.clear();
        for record in records {
            for word in tokenize(&record.note) {
                self.keywords.entry(word).or_default().insert(record.key);
            }
        }
    }

    /// Record keys whose note contains `word`. Unknown words yield an empty set.
    pub fn lookup(&self, word: &str) -> BTreeSet<u64> {
        self.keywords
            .get(&word.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Number of distinct keywords.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }
}

/// Lowercased word-character runs of at least four characters, deduplicated
/// in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut words: Vec<String> = Vec::new();
    for found in keyword_pattern().find_iter(&lowered) {
        let word = found.as_str();
        if !words.iter().any(|existing| existing == word) {
            words.push(word.to_string());
        }
    }
    words
}

fn keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"\b\w{{{MIN_KEYWORD_LEN},}}\b"))
            .expect("keyword pattern is a valid regex")
    })
}
