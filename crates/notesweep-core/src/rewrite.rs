use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

/// Marks a box as migrated. Any non-blank character reads as done in
/// checklist syntax; this one stays visually distinct from a manual `x`.
pub const DEFAULT_MIGRATED_MARKER: char = '→';

const LINK_TEXT: &str = "migrated to tracker";

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Failed to rewrite {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Checklist prefix {0:?} does not contain an open box")]
    UnrecognizedPrefix(String),
}

/// One line replacement, keyed by the trimmed text of the original line.
#[derive(Debug, Clone)]
pub struct LinePatch {
    pub needle: String,
    pub replacement: String,
}

/// Build the migrated form of a checklist line: the blank box marker swapped
/// for `marker`, the description struck through, and a link to the created
/// task appended.
///
/// The result no longer matches the open-item pattern, so a later scan will
/// never re-emit it.
pub fn migrated_line(
    prefix: &str,
    description: &str,
    task_url: &str,
    marker: char,
) -> Result<String, RewriteError> {
    let open_box = Regex::new(r"^(\s*- \[)( )(\]\s*)$").expect("regex");
    let caps = open_box
        .captures(prefix)
        .ok_or_else(|| RewriteError::UnrecognizedPrefix(prefix.to_string()))?;
    let opener = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let closer = caps
        .get(3)
        .map(|m| m.as_str().trim_end())
        .unwrap_or_default();
    Ok(format!(
        "{opener}{marker}{closer} ~~{description}~~ [({LINK_TEXT})]({task_url})"
    ))
}

/// Apply a patch set to one file: every line whose trimmed text starts with a
/// patch's needle is replaced by that patch's replacement.
///
/// The file is read in full and rewritten through a sibling temp file that is
/// renamed over the original, so a crash mid-write never leaves a truncated
/// note behind. Returns the number of lines replaced; when nothing matched
/// the file is left untouched.
pub fn apply_patches(path: &Path, patches: &[LinePatch]) -> Result<usize, RewriteError> {
    let io_err = |source| RewriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let text = fs::read_to_string(path).map_err(io_err)?;
    let had_trailing_newline = text.ends_with('\n');

    let mut replaced = 0;
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let patch = patches
            .iter()
            .find(|patch| line.trim().starts_with(patch.needle.as_str()));
        match patch {
            Some(patch) => {
                lines.push(patch.replacement.as_str());
                replaced += 1;
            }
            None => lines.push(line),
        }
    }
    if replaced == 0 {
        return Ok(0);
    }

    let mut output = lines.join("\n");
    if had_trailing_newline {
        output.push('\n');
    }
    write_atomic(path, &output).map_err(io_err)?;
    Ok(replaced)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "note".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
