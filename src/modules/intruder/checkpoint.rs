use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::input::load_lines;

/// Candidates checked per pass when filtering a loaded file.
pub const FILTER_CHUNK: usize = 100_000;

/// Append one line to a text log, creating it if needed.
pub fn append_line(path: &Path, value: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(format!("{}\n", value).as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Already-attempted candidates: the on-disk log plus everything recorded this run.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl CheckpointStore {
    /// Load every line of the log. A missing log starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let seen = if path.exists() {
            load_lines(&path).into_iter().collect()
        } else {
            HashSet::new()
        };
        Self { path, seen }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.seen.contains(candidate)
    }

    /// Mark a candidate as attempted. The in-memory set is updated even when the
    /// append fails, so the candidate is not retried within this run.
    pub fn record(&mut self, candidate: &str) -> Result<()> {
        self.seen.insert(candidate.to_string());
        append_line(&self.path, candidate)
    }

    /// Candidates not yet attempted, preserving input order.
    pub fn filter_pending(&self, candidates: Vec<String>, chunk: usize) -> Vec<String> {
        let chunk = chunk.max(1);
        let mut pending = Vec::new();
        let mut rest = candidates;
        while !rest.is_empty() {
            let tail = rest.split_off(rest.len().min(chunk));
            pending.extend(rest.into_iter().filter(|c| !self.seen.contains(c)));
            rest = tail;
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn record_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");

        let mut store = CheckpointStore::open(&path);
        assert!(!store.contains("15550000001"));
        store.record("15550000001").unwrap();
        assert!(store.contains("15550000001"));

        let reloaded = CheckpointStore::open(&path);
        assert!(reloaded.contains("15550000001"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn duplicate_log_lines_are_harmless() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");
        fs::write(&path, "a\na\nb\n").unwrap();

        let mut store = CheckpointStore::open(&path);
        assert_eq!(store.len(), 2);
        store.record("a").unwrap();
        assert_eq!(CheckpointStore::open(&path).len(), 2);
    }

    #[test]
    fn filters_in_chunks_preserving_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");
        fs::write(&path, "2\n5\n").unwrap();
        let store = CheckpointStore::open(&path);

        let input: Vec<String> = (1..=7).map(|n| n.to_string()).collect();
        let pending = store.filter_pending(input, 3);
        assert_eq!(pending, vec!["1", "3", "4", "6", "7"]);
    }

    #[test]
    fn unwritable_log_still_marks_in_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("processed.txt");

        let mut store = CheckpointStore::open(&path);
        assert!(store.record("x").is_err());
        assert!(store.contains("x"));
    }
}
