//! Submission scanner for discovering student answer images.
//!
//! Walks a directory of scanned submissions, keeps image files that match
//! the configured extensions and size limit, and derives each student's
//! name from the file name.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for submission scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Image extensions to include, lowercase, without the dot.
    pub extensions: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Maximum number of submissions to collect
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: crate::config::default_image_extensions(),
            max_file_size: 10 * 1024 * 1024,
            max_files: None,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size: config.max_file_size,
            max_files: Some(config.max_files),
        }
    }
}

/// A discovered submission image.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedSubmission {
    /// Absolute or root-joined path to the image.
    pub path: PathBuf,
    /// Student name derived from the file stem.
    pub student_name: String,
    /// File size in bytes
    pub size: u64,
}

/// Scanner over a submissions directory.
pub struct SubmissionScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl SubmissionScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Scan for submissions, sorted by path.
    pub fn scan(&self) -> Result<Vec<ScannedSubmission>> {
        if !self.root.is_dir() {
            anyhow::bail!("Submissions directory not found: {}", self.root.display());
        }

        let mut submissions = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let size = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?
                .len();

            if size > self.config.max_file_size {
                debug!("Skipping {} ({} bytes, over limit)", entry.path().display(), size);
                continue;
            }

            let Some(student_name) = student_name_from_path(entry.path()) else {
                warn!("Cannot derive a student name from {}", entry.path().display());
                continue;
            };

            submissions.push(ScannedSubmission {
                path: entry.path().to_path_buf(),
                student_name,
                size,
            });
        }

        submissions.sort_by(|a, b| a.path.cmp(&b.path));

        if let Some(max) = self.config.max_files {
            if submissions.len() > max {
                warn!("Found {} submissions, keeping the first {}", submissions.len(), max);
                submissions.truncate(max);
            }
        }

        debug!("Scanned {} submissions in {}", submissions.len(), self.root.display());
        Ok(submissions)
    }

    /// Check whether a path has one of the configured image extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.config.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Derive a student name from a file name: `jane_doe-2.png` becomes `jane doe 2`.
pub fn student_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_student_name_from_path() {
        assert_eq!(
            student_name_from_path(Path::new("scans/Alice_Johnson.png")),
            Some("Alice Johnson".to_string())
        );
        assert_eq!(
            student_name_from_path(Path::new("bob--smith .JPG")),
            Some("bob smith".to_string())
        );
        assert_eq!(student_name_from_path(Path::new("___.png")), None);
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("zoe_park.png"), b"img").unwrap();
        std::fs::write(root.join("Adam_Lee.JPG"), b"img").unwrap();
        std::fs::write(root.join("notes.txt"), b"text").unwrap();
        std::fs::write(root.join(".hidden.png"), b"img").unwrap();
        std::fs::create_dir(root.join("late")).unwrap();
        std::fs::write(root.join("late").join("mia_wong.jpeg"), b"img").unwrap();

        let scanner = SubmissionScanner::new(root.to_path_buf(), ScanConfig::default());
        let found = scanner.scan().unwrap();

        let names: Vec<_> = found.iter().map(|s| s.student_name.as_str()).collect();
        assert_eq!(names, vec!["Adam Lee", "mia wong", "zoe park"]);
        assert!(found.iter().all(|s| s.size == 3));
    }

    #[test]
    fn test_scan_respects_limits() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.png"), vec![0u8; 64]).unwrap();
        std::fs::write(root.join("b.png"), b"x").unwrap();
        std::fs::write(root.join("c.png"), b"x").unwrap();

        let config = ScanConfig {
            max_file_size: 16,
            max_files: Some(1),
            ..ScanConfig::default()
        };
        let found = SubmissionScanner::new(root.to_path_buf(), config)
            .scan()
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].student_name, "b");
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let scanner =
            SubmissionScanner::new(temp_dir.path().join("missing"), ScanConfig::default());
        assert!(scanner.scan().is_err());
    }
}
