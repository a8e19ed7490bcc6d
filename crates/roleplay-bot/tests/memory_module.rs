use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::NaiveDate;
use filetime::FileTime;
use roleplay_bot::memory::prelude::*;
use roleplay_bot::memory::{CONTEXT_HEADER, MAX_AUTO_MEMORIES};
use tempfile::tempdir;

fn at(day: u32, hour: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("valid test timestamp")
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

fn set_modified(path: &Path, time: SystemTime) -> std::io::Result<()> {
    filetime::set_file_mtime(path, FileTime::from_system_time(time))
}

#[test]
fn memory_config_validation_rejects_bad_settings() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    assert!(MemoryConfig::new(temp_dir.path().join("m.jsonl")).validate().is_ok());
    assert!(MemoryConfig::new("").validate().is_err());
    assert!(MemoryConfig::new(temp_dir.path()).validate().is_err());

    let mut config = MemoryConfig::default();
    config.search_limit = 0;
    assert!(config.validate().is_err());
    Ok(())
}

#[test]
fn appended_notes_are_loaded_in_priority_order() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let mut store = MemoryStore::open(temp_dir.path().join("memories.jsonl"));

    store.try_append_at("We walked along the pier.", &["auto"], at(1, 9))?;
    store.try_append_at("It is important to bring the map.", &["manual"], at(2, 9))?;
    store.try_append_at("The tea shop was closed.", &["auto"], at(3, 9))?;

    let records = store.load_all();
    assert_eq!(records.len(), 3);
    let notes: Vec<&str> = records.iter().map(|record| record.note.as_str()).collect();
    assert_eq!(
        notes,
        vec![
            "It is important to bring the map.",
            "The tea shop was closed.",
            "We walked along the pier.",
        ]
    );
    assert_eq!(records[0].importance, 7);
    assert_eq!(records[0].tags, vec!["manual".to_string()]);
    assert_eq!(records[0].key, 2);

    assert_eq!(store.load_recent(2).len(), 2);
    Ok(())
}

#[test]
fn keys_are_unique_even_with_identical_timestamps() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let mut store = MemoryStore::open(temp_dir.path().join("memories.jsonl"));

    let first = store.try_append_at("The harbor bell rang twice.", &[], at(4, 12))?;
    let second = store.try_append_at("The harbor gate was locked.", &[], at(4, 12))?;
    assert_ne!(first.key, second.key);

    let found = MemoryRetriever::new(&mut store).search("harbor", 5);
    assert_eq!(found.len(), 2);
    Ok(())
}

#[test]
fn malformed_lines_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("memories.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"ts\":\"2025-03-01T10:00:00\",\"note\":\"Kept note\",\"tags\":[\"manual\"],\"importance\":6}\n",
            "not json at all\n",
            "{\"ts\":\"2025-03-01T11:00:00\",\"note\":\"   \"}\n",
            "\n",
            "{\"ts\":\"2025-03-01T12:00:00\",\"note\":\"Legacy note\"}\n",
            "{\"ts\":\"2025-03-01T13:00:00\",\"note\":\"Loud note\",\"importance\":42}\n",
        ),
    )?;

    let mut store = MemoryStore::open(&path);
    let records = store.load_all();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].note, "Loud note");
    assert_eq!(records[0].importance, 10);
    assert_eq!(records[0].key, 6);
    let legacy = records
        .iter()
        .find(|record| record.note == "Legacy note")
        .expect("legacy note loaded");
    assert_eq!(legacy.importance, 5);
    assert!(legacy.tags.is_empty());
    Ok(())
}

#[test]
fn append_after_truncated_line_keeps_new_record_readable() -> Result<(), Box<dyn std::error::Error>>
{
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("memories.jsonl");
    std::fs::write(
        &path,
        "{\"ts\":\"2025-03-01T10:00:00\",\"note\":\"first\"}\n{\"ts\":\"2025-03-01T1",
    )?;

    let mut store = MemoryStore::open(&path);
    let record = store.try_append("Remember the blue door.", &["manual"])?;
    assert_eq!(record.key, 3);

    let records = store.load_all();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|record| record.key == 3 && record.note == "Remember the blue door."));
    Ok(())
}

#[test]
fn append_failure_is_reported_as_none() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let mut store = MemoryStore::open(temp_dir.path());
    assert!(store.append("This cannot be written.", &["manual"]).is_none());
    assert!(store.load_all().is_empty());

    let mut store = MemoryStore::open(temp_dir.path().join("m.jsonl"));
    assert!(matches!(store.try_append("   ", &[]), Err(MemoryError::EmptyNote)));
    Ok(())
}

#[test]
fn personal_note_scores_high_and_is_found_by_keyword() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let mut store = MemoryStore::open(temp_dir.path().join("nested").join("memories.jsonl"));

    store.try_append_at("We shared a pot of jasmine tea.", &["auto"], at(1, 8))?;
    let kay = store.try_append_at("My name is Kay and I live in Oslo.", &["manual"], at(2, 8))?;
    store.try_append_at("The ferry leaves at noon.", &["auto"], at(3, 8))?;
    assert!(kay.importance >= 7);

    let results = MemoryRetriever::new(&mut store).search("Oslo", 5);
    assert_eq!(results.first().map(|record| record.key), Some(kay.key));

    let context = format_context(&MemoryRetriever::new(&mut store).recent(8));
    assert!(context.starts_with(CONTEXT_HEADER));
    assert!(context.contains("!!! My name is Kay and I live in Oslo."));
    Ok(())
}

#[test]
fn search_ranks_by_keyword_overlap_and_respects_limit() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let mut store = MemoryStore::open(temp_dir.path().join("memories.jsonl"));
    store.try_append_at("Harbor market sells fresh bread.", &[], at(1, 9))?;
    store.try_append_at("The harbor lighthouse keeper waved.", &[], at(2, 9))?;
    store.try_append_at("A quiet forest cabin.", &[], at(3, 9))?;

    let mut retriever = MemoryRetriever::new(&mut store);
    let results = retriever.search("harbor lighthouse", 5);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].note, "The harbor lighthouse keeper waved.");
    assert_eq!(results[1].note, "Harbor market sells fresh bread.");

    assert_eq!(retriever.search("harbor lighthouse", 1).len(), 1);
    assert!(retriever.search("submarine", 5).is_empty());
    assert!(retriever.search("a an to", 5).is_empty());
    Ok(())
}

#[test]
fn search_drops_keys_that_no_longer_resolve() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("memories.jsonl");
    let mut store = MemoryStore::open(&path);
    store.try_append_at("Lanterns line the canal.", &[], at(1, 9))?;
    store.try_append_at("Canal boats race on Sunday.", &[], at(2, 9))?;
    assert_eq!(store.index().lookup("canal").len(), 2);

    std::fs::write(
        &path,
        "{\"ts\":\"2025-03-01T09:00:00\",\"note\":\"Lanterns line the canal.\"}\n",
    )?;
    store.invalidate();

    let results = MemoryRetriever::new(&mut store).search("boats canal", 5);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].note, "Lanterns line the canal.");
    Ok(())
}

#[test]
fn external_rewrite_refreshes_the_index_without_invalidate()
-> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("memories.jsonl");
    let mut store = MemoryStore::open(&path);
    store.try_append_at("The apple orchard blooms.", &[], at(1, 9))?;
    store.try_append_at("Zebra stripes are bold.", &[], at(2, 9))?;
    assert_eq!(MemoryRetriever::new(&mut store).search("orchard", 5).len(), 1);

    let before = modified(&path)?;
    std::fs::write(
        &path,
        "{\"ts\":\"2025-03-02T09:00:00\",\"note\":\"Zebra stripes are bold.\"}\n",
    )?;
    set_modified(&path, before + Duration::from_secs(5))?;

    let results = MemoryRetriever::new(&mut store).search("orchard", 5);
    assert!(results.iter().all(|record| record.note.contains("orchard")));
    assert!(results.is_empty());
    assert!(store.index().lookup("orchard").is_empty());

    let zebra = MemoryRetriever::new(&mut store).search("zebra", 5);
    assert_eq!(zebra.len(), 1);
    assert_eq!(zebra[0].key, 1);
    Ok(())
}

#[test]
fn snapshot_is_reused_until_the_file_mtime_advances() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("memories.jsonl");
    let mut store = MemoryStore::open(&path);
    store.try_append_at("The bakery opens at dawn.", &[], at(1, 6))?;
    assert_eq!(store.load_all().len(), 1);
    let cached_at = modified(&path)?;

    let mut other = MemoryStore::open(&path);
    other.try_append_at("The bakery sells rye loaves.", &[], at(2, 6))?;
    set_modified(&path, cached_at)?;
    assert_eq!(store.load_all().len(), 1);
    assert_eq!(store.index().lookup("loaves").len(), 0);

    set_modified(&path, cached_at + Duration::from_secs(5))?;
    let records = store.load_all();
    assert_eq!(records.len(), 2);
    assert_eq!(store.index().lookup("loaves").len(), 1);
    assert_eq!(MemoryRetriever::new(&mut store).search("bakery", 5).len(), 2);
    Ok(())
}

#[test]
fn removing_the_file_empties_the_index() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("memories.jsonl");
    let mut store = MemoryStore::open(&path);
    store.try_append("The violin case is blue.", &["manual"])?;
    assert!(!store.index().is_empty());

    std::fs::remove_file(&path)?;
    assert!(store.load_all().is_empty());
    assert!(store.index().is_empty());
    assert!(MemoryRetriever::new(&mut store).search("violin", 5).is_empty());
    Ok(())
}

#[test]
fn extraction_prefers_explicit_cues_and_caps_results() {
    let reply = "I will remember that you live in Paris. My favorite color is green. \
                 I love the smell of rain. I plan to visit the coast. \
                 I am afraid of deep water. The sky is clear.";
    let notes = extract(reply);
    assert!(notes.len() <= MAX_AUTO_MEMORIES);
    assert_eq!(notes[0], "I will remember that you live in Paris.");
    assert_eq!(notes[1], "My favorite color is green.");
}

#[test]
fn extraction_ignores_plain_narration() {
    assert!(extract("*smiles warmly* The fire crackles. Snow falls outside.").is_empty());
}
