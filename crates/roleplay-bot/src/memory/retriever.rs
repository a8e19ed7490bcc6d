use super::index::tokenize;
use super::store::{MemoryRecord, MemoryStore};
use std::collections::HashMap;

pub const CONTEXT_HEADER: &str = "Here are a few past notes for continuity:";

/// Ranks and selects memories for prompt injection and `/search`.
pub struct MemoryRetriever<'a> {
    store: &'a mut MemoryStore,
}

impl<'a> MemoryRetriever<'a> {
    pub fn new(store: &'a mut MemoryStore) -> Self {
        Self { store }
    }

    /// The `limit` most important, most recent records.
    pub fn recent(&mut self, limit: usize) -> Vec<MemoryRecord> {
        self.store.load_recent(limit)
    }

    /// Records ranked by how many distinct query keywords their note contains.
    ///
    /// Ties keep store order. Records sharing no keyword with the query are
    /// never returned.
    pub fn search(&mut self, query: &str, limit: usize) -> Vec<MemoryRecord> {
        if limit == 0 {
            return Vec::new();
        }
        let query_words = tokenize(query);
        if query_words.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<u64, usize> = HashMap::new();
        let index = self.store.index();
        for word in &query_words {
            for key in index.lookup(word) {
                *scores.entry(key).or_insert(0) += 1;
            }
        }
        if scores.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, usize, MemoryRecord)> = self
            .store
            .load_all()
            .into_iter()
            .enumerate()
            .filter_map(|(position, record)| {
                scores
                    .get(&record.key)
                    .map(|score| (*score, position, record))
            })
            .collect();
        ranked.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(&right.1)));
        ranked.truncate(limit);
        ranked.into_iter().map(|(_, _, record)| record).collect()
    }
}

/// 0-3 exclamation marks: `importance / 3`, capped at 3.
pub fn importance_marker(importance: u8) -> String {
    "!".repeat(usize::from((importance / 3).min(3)))
}

/// Render records as the context block prepended to a user turn.
pub fn format_context(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }
    let bullets = records
        .iter()
        .map(|record| {
            format!(
                "- ({}) {} {}",
                record.timestamp,
                importance_marker(record.importance),
                record.note
            )
        })
        .collect::<Vec<_>>();
    format!("{CONTEXT_HEADER}\n{}", bullets.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_marker_scales_and_caps() {
        assert_eq!(importance_marker(1), "");
        assert_eq!(importance_marker(2), "");
        assert_eq!(importance_marker(3), "!");
        assert_eq!(importance_marker(5), "!");
        assert_eq!(importance_marker(7), "!!");
        assert_eq!(importance_marker(9), "!!!");
        assert_eq!(importance_marker(10), "!!!");
    }

    #[test]
    fn format_context_of_nothing_is_empty() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn format_context_renders_one_bullet_per_record() {
        let records = vec![
            MemoryRecord {
                key: 2,
                timestamp: "2025-03-01T09:30:00".to_string(),
                note: "Kay lives in Oslo.".to_string(),
                tags: vec!["manual".to_string()],
                importance: 9,
            },
            MemoryRecord {
                key: 1,
                timestamp: "2025-02-01T09:30:00".to_string(),
                note: "Tea with honey.".to_string(),
                tags: vec!["auto".to_string()],
                importance: 5,
            },
        ];

        assert_eq!(
            format_context(&records),
            "Here are a few past notes for continuity:\n\
             - (2025-03-01T09:30:00) !!! Kay lives in Oslo.\n\
             - (2025-02-01T09:30:00) ! Tea with honey."
        );
    }
}
