use std::path::Path;

use serde_yaml::Value;
use thiserror::Error;

/// Front-matter key that opts a note out of scanning.
pub const PARTICIPATION_KEY: &str = "notesweep";

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("Unrecognized `notesweep` front-matter value {value:?} in {path}")]
    InvalidFlag { path: String, value: String },
}

/// Extract the leading `---`-delimited front-matter block, if any.
///
/// Returns `None` when the text does not start with a delimiter or the block
/// is never closed.
fn leading_front_matter(text: &str) -> Option<String> {
    let mut lines = text.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }
    let mut front = Vec::new();
    for line in lines {
        if line.trim() == "---" {
            return Some(front.join("\n"));
        }
        front.push(line);
    }
    None
}

/// Decide whether a note participates in scanning.
///
/// Absent key (or an explicit null) means participate. Front matter that is
/// not valid YAML (template placeholders like `{{date}}` are common in note
/// vaults) counts as no metadata at all and never blocks scanning.
pub fn participation(text: &str, path: &Path) -> Result<bool, FrontMatterError> {
    let Some(front) = leading_front_matter(text) else {
        return Ok(true);
    };
    let value = match serde_yaml::from_str::<Value>(&front) {
        Ok(value) => value,
        Err(_) => return Ok(true),
    };
    let Value::Mapping(map) = value else {
        return Ok(true);
    };
    match map.get(&Value::String(PARTICIPATION_KEY.to_string())) {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(FrontMatterError::InvalidFlag {
            path: path.display().to_string(),
            value: value_display(other),
        }),
    }
}

fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
