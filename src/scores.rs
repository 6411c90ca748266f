//! Append-only score history.
//!
//! The scores file is a JSON list of [`ScoreEntry`] objects pretty-printed
//! with a 4-space indent. Entries are only ever appended: existing entries
//! are carried over as raw JSON, so ones this crate cannot interpret are
//! never dropped.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::models::{ScoreEntry, TIME_FORMAT};

/// Load all readable entries. A missing or corrupt file yields an empty
/// list; an entry that does not fit [`ScoreEntry`] is skipped.
pub fn load_scores(path: &Path) -> Vec<ScoreEntry> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "cannot read scores file");
            }
            return Vec::new();
        }
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let values: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "scores file is corrupt, treating as empty");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| match serde_json::from_value(v) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), index = i, error = %e, "skipping unreadable score entry");
                None
            }
        })
        .collect()
}

/// Append one entry and rewrite the file.
///
/// Prior entries are kept byte-for-byte as JSON values. A file that exists
/// but is not a JSON list is left untouched and reported as an error.
pub fn append_score(path: &Path, entry: ScoreEntry) -> Result<()> {
    let mut values: Vec<Value> = match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Vec::new(),
        Ok(raw) => serde_json::from_str(&raw).with_context(|| {
            format!(
                "Scores file {} is not a JSON list; refusing to overwrite it",
                path.display()
            )
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => bail!("Failed to read scores file {}: {}", path.display(), e),
    };
    values.push(serde_json::to_value(&entry)?);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, to_pretty_json(&values)?)
        .with_context(|| format!("Failed to write scores file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace scores file {}", path.display()))?;
    Ok(())
}

/// The entry recorded at exactly `time` (formatted `YYYY-MM-DD HH:MM:SS`).
pub fn find_by_time<'a>(entries: &'a [ScoreEntry], time: &str) -> Option<&'a ScoreEntry> {
    let time = NaiveDateTime::parse_from_str(time.trim(), TIME_FORMAT).ok()?;
    entries.iter().find(|e| e.time == time)
}

/// Distinct timestamps, in file order.
pub fn timestamps(entries: &[ScoreEntry]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for e in entries {
        let t = e.time.format(TIME_FORMAT).to_string();
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// CLI entry point for `mindcare scores`.
pub fn run_scores(path: &Path, time: Option<&str>) -> Result<()> {
    let entries = load_scores(path);

    if let Some(time) = time {
        match find_by_time(&entries, time) {
            Some(e) => {
                println!("Time: {}", e.time.format(TIME_FORMAT));
                println!("Score: {}", e.score);
                println!("Level: {}", e.level);
                println!("Content: {}", e.content);
                println!("Total Guess: {}", e.total_guess);
            }
            None => println!("No data available for the selected time."),
        }
        return Ok(());
    }

    if entries.is_empty() {
        println!("No data available to display.");
        return Ok(());
    }
    for e in &entries {
        println!(
            "{}  {:>4}  {}",
            e.time.format(TIME_FORMAT),
            e.score.to_string(),
            e.level
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreLevel;
    use tempfile::TempDir;

    fn entry(time: &str, score: i64) -> ScoreEntry {
        ScoreEntry {
            time: NaiveDateTime::parse_from_str(time, TIME_FORMAT).unwrap(),
            score: score.into(),
            level: ScoreLevel::Normal.label().to_string(),
            content: "ổn định".into(),
            total_guess: "không có dấu hiệu đáng lo".into(),
        }
    }

    #[test]
    fn missing_and_corrupt_files_are_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(load_scores(&tmp.path().join("none.json")).is_empty());
        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "{not a list").unwrap();
        assert!(load_scores(&bad).is_empty());
    }

    #[test]
    fn append_keeps_prior_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_storage/scores.json");
        append_score(&path, entry("2025-01-01 10:00:00", 4)).unwrap();
        let before = load_scores(&path);
        append_score(&path, entry("2025-01-02 10:00:00", 7)).unwrap();
        let after = load_scores(&path);
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after[..before.len()], before[..]);
        assert_eq!(after[1].score, 7.into());
    }

    #[test]
    fn file_uses_four_space_indent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scores.json");
        append_score(&path, entry("2025-01-01 10:00:00", 4)).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n    {\n        \"Time\": \"2025-01-01 10:00:00\""));
        assert!(raw.contains("\"Level\": \"bình thường\""));
    }

    #[test]
    fn lookup_by_time() {
        let entries = vec![entry("2025-01-01 10:00:00", 4), entry("2025-01-02 10:00:00", 7)];
        assert_eq!(find_by_time(&entries, "2025-01-02 10:00:00").unwrap().score, 7.into());
        assert!(find_by_time(&entries, "2025-01-03 10:00:00").is_none());
        assert!(find_by_time(&entries, "garbage").is_none());
        assert_eq!(timestamps(&entries).len(), 2);
    }

    #[test]
    fn append_preserves_entries_outside_the_typed_model() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scores.json");
        std::fs::write(
            &path,
            r#"[
    {"Time": "2025-01-01 10:00:00", "Score": 4, "Level": "kém", "Content": "mất ngủ", "Total guess": "lo âu"},
    {"Time": "2025-01-02 10:00:00", "Score": 6.5, "Level": "Trung bình", "Content": "đỡ hơn", "Total guess": "ổn"},
    {"Time": "yesterday", "Score": "cao"}
]"#,
        )
        .unwrap();

        assert_eq!(load_scores(&path).len(), 2);
        append_score(&path, entry("2025-01-03 10:00:00", 7)).unwrap();

        let raw: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[1]["Level"], "Trung bình");
        assert_eq!(raw[2]["Time"], "yesterday");

        let entries = load_scores(&path);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].score_value(), 6.5);
        assert_eq!(entries[2].score, 7.into());
    }

    #[test]
    fn append_refuses_to_overwrite_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scores.json");
        std::fs::write(&path, "{not a list").unwrap();

        let err = append_score(&path, entry("2025-01-03 10:00:00", 7)).unwrap_err();
        assert!(format!("{:#}", err).contains("not a JSON list"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not a list");
    }
}
