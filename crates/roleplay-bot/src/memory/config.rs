use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MEMORY_FILE: &str = "memories.jsonl";
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Configuration for the memory subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// JSONL file holding one memory record per line.
    pub memory_file: PathBuf,

    /// Whether memories are injected into prompts and extracted from replies.
    pub enabled: bool,

    /// Maximum number of results for `/search`.
    pub search_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_file: PathBuf::from(DEFAULT_MEMORY_FILE),
            enabled: true,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl MemoryConfig {
    /// Create a new memory config backed by the given file.
    pub fn new(memory_file: impl Into<PathBuf>) -> Self {
        Self {
            memory_file: memory_file.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.memory_file.as_os_str().is_empty() {
            return Err("memory_file cannot be empty".to_string());
        }
        if self.memory_file.is_dir() {
            return Err(format!(
                "memory_file {} is a directory",
                self.memory_file.display()
            ));
        }
        if self.search_limit == 0 {
            return Err("search_limit must be greater than 0".to_string());
        }
        Ok(())
    }
}
