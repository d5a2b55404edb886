use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::fingerprint::fingerprint;
use crate::front_matter;
use crate::parse::{match_open_item, TodoPattern};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan root does not exist or is not a directory: {0}")]
    RootNotFound(PathBuf),
    #[error("No file extensions to scan for")]
    NoExtensions,
}

/// One open checklist item found in a note, with provenance metadata.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub source_path: PathBuf,
    /// Trimmed text of the originating line, used as the rewrite search key.
    pub original_line: String,
    /// Checklist prefix with indentation preserved, e.g. `  - [ ] `.
    pub prefix: String,
    pub description: String,
    pub fingerprint: String,
    pub host: HostMeta,
}

/// Provenance only; never part of a task's identity.
#[derive(Debug, Clone)]
pub struct HostMeta {
    pub inode: u64,
    pub device: u64,
    pub hostname: String,
    /// File stem of the originating note.
    pub note_name: String,
    /// URI back-link into the originating note.
    pub note_uri: String,
}

/// Everything one tree walk produced: the records plus per-file anomalies
/// that were skipped over rather than aborting the walk.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<TaskRecord>,
    pub notes: Vec<String>,
}

/// Normalize extension suffixes to leading-dot form and drop duplicates.
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for ext in extensions {
        let ext = ext.trim();
        if ext.is_empty() {
            continue;
        }
        let ext = if ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{ext}")
        };
        if seen.insert(ext.clone()) {
            normalized.push(ext);
        }
    }
    normalized
}

/// Walk `root` and collect every open checklist item from files with a
/// recognized extension.
///
/// Items within one file come back in line order; no ordering is guaranteed
/// across files. The walk never mutates anything.
pub fn scan_tree(
    root: &Path,
    extensions: &[String],
    pattern: &TodoPattern,
) -> Result<ScanOutcome, ScanError> {
    let root = root
        .canonicalize()
        .map_err(|_| ScanError::RootNotFound(root.to_path_buf()))?;
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root));
    }
    let extensions = normalize_extensions(extensions);
    if extensions.is_empty() {
        return Err(ScanError::NoExtensions);
    }

    let mut outcome = ScanOutcome::default();
    for entry in WalkDir::new(&root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                outcome.notes.push(format!("skipping unreadable entry: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            continue;
        }

        let path = entry.path();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                outcome
                    .notes
                    .push(format!("skipping {}: {err}", path.display()));
                continue;
            }
        };
        match front_matter::participation(&text, path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                // Fatal for this file only; the rest of the tree continues.
                outcome.notes.push(err.to_string());
                continue;
            }
        }
        collect_records(path, &text, pattern, &mut outcome.records);
    }
    Ok(outcome)
}

fn collect_records(
    path: &Path,
    text: &str,
    pattern: &TodoPattern,
    records: &mut Vec<TaskRecord>,
) {
    let mut host: Option<HostMeta> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let todo = match match_open_item(line, pattern) {
            Ok(Some(todo)) => todo,
            // Blank lines are filtered above and lines() never yields an
            // embedded break, so parse errors cannot occur here.
            Ok(None) | Err(_) => continue,
        };
        let host = host.get_or_insert_with(|| host_meta(path));
        records.push(TaskRecord {
            source_path: path.to_path_buf(),
            original_line: line.trim().to_string(),
            prefix: todo.prefix,
            fingerprint: fingerprint(&todo.description),
            description: todo.description,
            host: host.clone(),
        });
    }
}

fn host_meta(path: &Path) -> HostMeta {
    let (inode, device) = inode_device(path);
    let note_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let note_uri = format!(
        "obsidian://open?path={}",
        urlencoding::encode(&path.to_string_lossy())
    );
    HostMeta {
        inode,
        device,
        hostname: hostname(),
        note_name,
        note_uri,
    }
}

#[cfg(unix)]
fn inode_device(path: &Path) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path)
        .map(|meta| (meta.ino(), meta.dev()))
        .unwrap_or((0, 0))
}

#[cfg(not(unix))]
fn inode_device(_path: &Path) -> (u64, u64) {
    (0, 0)
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn md_extensions() -> Vec<String> {
        vec![".md".to_string()]
    }

    fn pattern() -> TodoPattern {
        TodoPattern::default_pattern()
    }

    #[test]
    fn normalize_extensions_adds_dots_and_dedups() {
        let input = vec![
            "md".to_string(),
            ".md".to_string(),
            "txt".to_string(),
            " ".to_string(),
        ];
        assert_eq!(normalize_extensions(&input), vec![".md", ".txt"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = scan_tree(Path::new("/no/such/dir"), &md_extensions(), &pattern())
            .expect_err("missing root");
        assert!(matches!(err, ScanError::RootNotFound(_)));
    }

    #[test]
    fn empty_extension_list_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = scan_tree(temp.path(), &[], &pattern()).expect_err("no extensions");
        assert!(matches!(err, ScanError::NoExtensions));
    }

    #[test]
    fn finds_items_across_nested_directories_in_line_order() {
        let temp = TempDir::new().expect("tempdir");
        let nested = temp.path().join("projects").join("home");
        fs::create_dir_all(&nested).expect("nested dirs");
        fs::write(
            nested.join("chores.md"),
            "# Chores\n- [ ] Feed dog\nsome prose\n- [x] Done already\n- [ ] Water plants\n",
        )
        .expect("write note");

        let outcome = scan_tree(temp.path(), &md_extensions(), &pattern()).expect("scan");
        let descriptions: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["Feed dog", "Water plants"]);
        assert!(outcome.records[0].source_path.ends_with("chores.md"));
    }

    #[test]
    fn unrecognized_extensions_are_ignored() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("note.txt"), "- [ ] Feed dog\n").expect("write txt");
        fs::write(temp.path().join("note.md"), "- [ ] Water plants\n").expect("write md");

        let outcome = scan_tree(temp.path(), &md_extensions(), &pattern()).expect("scan");
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].description, "Water plants");
    }

    #[test]
    fn extension_without_dot_still_matches() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("note.md"), "- [ ] Feed dog\n").expect("write md");

        let outcome =
            scan_tree(temp.path(), &["md".to_string()], &pattern()).expect("scan");
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn opted_out_file_is_skipped_entirely() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(
            temp.path().join("template.md"),
            "---\nnotesweep: false\n---\n- [ ] Template item\n",
        )
        .expect("write template");
        fs::write(temp.path().join("note.md"), "- [ ] Real item\n").expect("write note");

        let outcome = scan_tree(temp.path(), &md_extensions(), &pattern()).expect("scan");
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].description, "Real item");
    }

    #[test]
    fn bad_participation_flag_skips_the_file_and_reports_it() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(
            temp.path().join("broken.md"),
            "---\nnotesweep: maybe\n---\n- [ ] Hidden item\n",
        )
        .expect("write broken");
        fs::write(temp.path().join("note.md"), "- [ ] Real item\n").expect("write note");

        let outcome = scan_tree(temp.path(), &md_extensions(), &pattern()).expect("scan");
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].contains("broken.md"));
        assert!(outcome.notes[0].contains("maybe"));
    }

    #[test]
    fn records_carry_fingerprint_and_host_metadata() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("inbox.md"), "- [ ] Feed dog\n").expect("write note");

        let outcome = scan_tree(temp.path(), &md_extensions(), &pattern()).expect("scan");
        let record = &outcome.records[0];
        assert_eq!(record.fingerprint, crate::fingerprint::fingerprint("Feed dog"));
        assert_eq!(record.host.note_name, "inbox");
        assert!(record.host.note_uri.starts_with("obsidian://open?path="));
        #[cfg(unix)]
        assert!(record.host.inode != 0);
    }

    #[test]
    fn empty_tree_yields_empty_records() {
        let temp = TempDir::new().expect("tempdir");
        let outcome = scan_tree(temp.path(), &md_extensions(), &pattern()).expect("scan");
        assert!(outcome.records.is_empty());
        assert!(outcome.notes.is_empty());
    }
}
