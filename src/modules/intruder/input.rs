use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Highest numeric suffix probed when looking for candidate files.
pub const MAX_FILE_INDEX: usize = 100;

/// Enumerates candidate files named `{prefix}{N}.{ext}` for increasing N.
#[derive(Debug, Clone)]
pub struct InputSupplier {
    prefix: String,
    ext: String,
}

impl InputSupplier {
    pub fn new(prefix: &str, ext: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ext: ext.trim_start_matches('.').to_string(),
        }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        if self.ext.is_empty() {
            PathBuf::from(format!("{}{}", self.prefix, index))
        } else {
            PathBuf::from(format!("{}{}.{}", self.prefix, index, self.ext))
        }
    }

    /// First existing file at or after `start`, with its index.
    pub fn find_next(&self, start: usize) -> Option<(PathBuf, usize)> {
        (start.max(1)..=MAX_FILE_INDEX)
            .map(|i| (self.path_for(i), i))
            .find(|(path, _)| path.is_file())
    }
}

/// Trimmed, non-empty lines of a file. Missing or unreadable files yield nothing.
pub fn load_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
        Err(e) => {
            println!(
                "{}",
                format!("[!] Could not read {}: {}", path.display(), e).yellow()
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_next_existing_file_across_gaps() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("phone").to_string_lossy().to_string();
        fs::write(format!("{}2.txt", prefix), "1\n").unwrap();
        fs::write(format!("{}7.txt", prefix), "1\n").unwrap();

        let supplier = InputSupplier::new(&prefix, "txt");
        assert_eq!(supplier.find_next(1).map(|(_, i)| i), Some(2));
        assert_eq!(supplier.find_next(3).map(|(_, i)| i), Some(7));
        assert_eq!(supplier.find_next(8), None);
    }

    #[test]
    fn stops_at_the_index_bound() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("batch").to_string_lossy().to_string();
        fs::write(format!("{}{}", prefix, MAX_FILE_INDEX + 1), "x").unwrap();

        let supplier = InputSupplier::new(&prefix, "");
        assert_eq!(supplier.find_next(1), None);
    }

    #[test]
    fn extensionless_pattern() {
        let supplier = InputSupplier::new("data/phone", "");
        assert_eq!(supplier.path_for(1), PathBuf::from("data/phone1"));
        let supplier = InputSupplier::new("phone", ".txt");
        assert_eq!(supplier.path_for(12), PathBuf::from("phone12.txt"));
    }

    #[test]
    fn loads_trimmed_non_empty_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.txt");
        fs::write(&path, "  a \n\n\tb\r\n   \nc").unwrap();
        assert_eq!(load_lines(&path), vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_lines(&dir.path().join("nope.txt")).is_empty());
    }
}
