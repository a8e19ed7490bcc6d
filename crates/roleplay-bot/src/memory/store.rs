use super::config::MemoryConfig;
use super::index::MemoryIndex;
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, error};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const BASE_IMPORTANCE: i32 = 5;
pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 10;

/// Substrings that mark a note as critical, urgent or identity-related.
/// Each one found adds 2 to the importance.
pub const IMPORTANT_KEYWORDS: [&str; 15] = [
    "important",
    "crucial",
    "vital",
    "essential",
    "critical",
    "remember",
    "never forget",
    "always",
    "must",
    "promise",
    "name",
    "address",
    "phone",
    "birthday",
    "anniversary",
];

/// Personal-disclosure patterns, matched against the lowercased note.
/// Each one that matches adds 1 to the importance.
pub const PERSONAL_PATTERNS: [&str; 8] = [
    r"my name is",
    r"i live in",
    r"i was born",
    r"i work at",
    r"my favorite",
    r"i love",
    r"i hate",
    r"i am afraid of",
];

/// Errors that can occur in memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode memory record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Memory note is empty")]
    EmptyNote,
}

/// One persisted memory note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    /// 1-based line number in the memory file; unique within a file.
    pub key: u64,

    /// Creation time, ISO-8601 with second precision.
    pub timestamp: String,

    /// Trimmed note text.
    pub note: String,

    /// Provenance labels such as `manual` or `auto`.
    pub tags: Vec<String>,

    /// Importance in `1..=10`, fixed at creation.
    pub importance: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct MemoryLine {
    ts: String,
    note: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_importance")]
    importance: i64,
}

fn default_importance() -> i64 {
    BASE_IMPORTANCE as i64
}

#[derive(Debug, Clone)]
struct Snapshot {
    records: Vec<MemoryRecord>,
    modified: Option<SystemTime>,
}

/// Append-only memory log with a cached, sorted snapshot and a keyword index.
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    cache: Option<Snapshot>,
    index: MemoryIndex,
}

impl MemoryStore {
    /// Create a store over `config.memory_file`. Nothing is read until first use.
    pub fn new(config: &MemoryConfig) -> Self {
        Self::open(config.memory_file.clone())
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
            index: MemoryIndex::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a note. Failures are logged and reported as `None`.
    pub fn append(&mut self, note: &str, tags: &[&str]) -> Option<MemoryRecord> {
        match self.try_append(note, tags) {
            Ok(record) => Some(record),
            Err(error) => {
                error!(path = %self.path.display(), "failed to write memory: {error}");
                None
            }
        }
    }

    /// Append a note stamped with the current local time.
    pub fn try_append(&mut self, note: &str, tags: &[&str]) -> Result<MemoryRecord, MemoryError> {
        self.try_append_at(note, tags, Local::now().naive_local())
    }

    /// Append a note with an explicit creation time.
    pub fn try_append_at(
        &mut self,
        note: &str,
        tags: &[&str],
        created_at: NaiveDateTime,
    ) -> Result<MemoryRecord, MemoryError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(MemoryError::EmptyNote);
        }

        let mut unique_tags: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim();
            if !tag.is_empty() && !unique_tags.iter().any(|existing| existing == tag) {
                unique_tags.push(tag.to_string());
            }
        }

        let score = importance(note);
        let line = MemoryLine {
            ts: created_at.format(TIMESTAMP_FORMAT).to_string(),
            note: note.to_string(),
            tags: unique_tags,
            importance: i64::from(score),
        };
        let encoded = serde_json::to_string(&line)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let (existing_lines, needs_newline) = count_lines(&self.path)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_newline {
            // A truncated last line stays on its own line and is skipped by the parser.
            writeln!(file)?;
        }
        writeln!(file, "{encoded}")?;
        drop(file);

        let record = MemoryRecord {
            key: existing_lines + 1,
            timestamp: line.ts,
            note: line.note,
            tags: line.tags,
            importance: score,
        };
        debug!(
            key = record.key,
            importance = record.importance,
            "added memory: {}",
            preview(&record.note)
        );

        self.rebuild_index();
        Ok(record)
    }

    /// Drop the cached snapshot so the next load re-reads the file.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Re-read the file and rebuild the keyword index from it.
    pub fn rebuild_index(&mut self) {
        self.invalidate();
        self.load_all();
    }

    /// All records sorted by importance (desc), then timestamp (desc).
    pub fn load_all(&mut self) -> Vec<MemoryRecord> {
        let modified = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.modified().ok(),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                self.cache = None;
                self.index.rebuild(&[]);
                return Vec::new();
            }
            Err(error) => {
                error!(path = %self.path.display(), "failed to stat memory file: {error}");
                return Vec::new();
            }
        };

        if let Some(snapshot) = &self.cache {
            if let (Some(cached), Some(current)) = (snapshot.modified, modified) {
                if current <= cached {
                    return snapshot.records.clone();
                }
            }
        }

        let records = match read_records(&self.path) {
            Ok(records) => records,
            Err(error) => {
                error!(path = %self.path.display(), "failed to load memories: {error}");
                return Vec::new();
            }
        };
        // A fresh snapshot always replaces the index so lookups never
        // return keys from an older version of the file.
        self.index.rebuild(&records);
        self.cache = Some(Snapshot {
            records: records.clone(),
            modified,
        });
        records
    }

    /// The `limit` most important, most recent records.
    pub fn load_recent(&mut self, limit: usize) -> Vec<MemoryRecord> {
        let mut records = self.load_all();
        records.truncate(limit);
        records
    }

    /// Keyword index for the current file contents.
    pub fn index(&mut self) -> &MemoryIndex {
        self.load_all();
        &self.index
    }
}

/// Importance of a note in `1..=10`.
///
/// Starts at 5, adds 2 per [`IMPORTANT_KEYWORDS`] substring and 1 per
/// matching [`PERSONAL_PATTERNS`] entry, case-insensitive.
pub fn importance(text: &str) -> u8 {
    let text_lower = text.to_lowercase();
    let mut score = BASE_IMPORTANCE;
    for keyword in IMPORTANT_KEYWORDS {
        if text_lower.contains(keyword) {
            score += 2;
        }
    }
    for pattern in personal_patterns() {
        if pattern.is_match(&text_lower) {
            score += 1;
        }
    }
    score.clamp(i32::from(MIN_IMPORTANCE), i32::from(MAX_IMPORTANCE)) as u8
}

fn personal_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PERSONAL_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).expect("personal pattern is a valid regex"))
            .collect()
    })
}

fn count_lines(path: &Path) -> io::Result<(u64, bool)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok((0, false)),
        Err(error) => return Err(error),
    };
    let newlines = bytes.iter().filter(|byte| **byte == b'\n').count() as u64;
    match bytes.last() {
        Some(last) if *last != b'\n' => Ok((newlines + 1, true)),
        _ => Ok((newlines, false)),
    }
}

fn read_records(path: &Path) -> io::Result<Vec<MemoryRecord>> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (index, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let line_no = index as u64 + 1;
        let Ok(line) = std::str::from_utf8(&raw) else {
            debug!(line = line_no, "skipping non-utf8 memory line");
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: MemoryLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(line = line_no, "skipping malformed memory line: {error}");
                continue;
            }
        };
        let note = parsed.note.trim();
        if note.is_empty() || parsed.ts.trim().is_empty() {
            debug!(line = line_no, "skipping memory line without note or timestamp");
            continue;
        }
        records.push(MemoryRecord {
            key: line_no,
            timestamp: parsed.ts,
            note: note.to_string(),
            tags: parsed.tags,
            importance: parsed
                .importance
                .clamp(i64::from(MIN_IMPORTANCE), i64::from(MAX_IMPORTANCE))
                as u8,
        });
    }

    records.sort_by(|left, right| {
        right
            .importance
            .cmp(&left.importance)
            .then_with(|| right.timestamp.cmp(&left.timestamp))
            .then_with(|| right.key.cmp(&left.key))
    });
    Ok(records)
}

fn preview(note: &str) -> String {
    let mut text = note.chars().take(50).collect::<String>();
    if note.chars().count() > 50 {
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_starts_at_base() {
        assert_eq!(importance("We walked to the market."), 5);
    }

    #[test]
    fn importance_counts_keywords_and_personal_patterns() {
        // "name" +2, "my name is" +1, "i live in" +1
        assert_eq!(importance("My name is Kay and I live in Oslo."), 9);
        // "remember" +2, "always" +2
        assert_eq!(importance("Always remember the lighthouse"), 9);
    }

    #[test]
    fn importance_is_capped_at_ten() {
        let note = "It is important and crucial and vital: my name, address, phone and birthday.";
        assert_eq!(importance(note), 10);
    }

    #[test]
    fn importance_is_case_insensitive() {
        assert_eq!(importance("I LOVE THE SEA"), importance("i love the sea"));
        assert_eq!(importance("I LOVE THE SEA"), 6);
    }

    #[test]
    fn count_lines_treats_unterminated_tail_as_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");
        assert_eq!(count_lines(&path).unwrap(), (0, false));
        fs::write(&path, "a\nb\n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), (2, false));
        fs::write(&path, "a\nb").unwrap();
        assert_eq!(count_lines(&path).unwrap(), (2, true));
    }
}
