use regex::Regex;
use thiserror::Error;

/// An open checklist line: indentation, `- [ ]`, then the description.
pub const OPEN_TODO_PATTERN: &str = r"^(\s*- \[ \]\s+)(.*)$";

/// `#` assigns a project and `@` a label in the tracker's quick-add syntax,
/// so neither may survive into the migrated task text.
const TRACKER_SIGILS: [char; 2] = ['#', '@'];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Input line is empty")]
    EmptyInput,
    #[error("Input line contains an embedded line break")]
    EmbeddedLineBreak,
}

/// Structural parts of one open checklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoLine {
    /// Everything up to and including the closer, whitespace preserved.
    pub prefix: String,
    /// Trimmed description with tracker sigils stripped.
    pub description: String,
}

/// The compiled line pattern, possibly substituted for a bad override.
#[derive(Debug, Clone)]
pub struct TodoPattern {
    regex: Regex,
    warning: Option<String>,
}

impl TodoPattern {
    pub fn default_pattern() -> Self {
        Self {
            regex: Regex::new(OPEN_TODO_PATTERN).expect("regex"),
            warning: None,
        }
    }

    /// Compile a caller-supplied pattern, falling back to the default when it
    /// does not compile or lacks the two capture groups (prefix, description).
    pub fn compile(custom: Option<&str>) -> Self {
        let Some(raw) = custom else {
            return Self::default_pattern();
        };
        match Regex::new(raw) {
            Ok(regex) if regex.captures_len() >= 3 => Self {
                regex,
                warning: None,
            },
            Ok(_) => Self {
                warning: Some(format!(
                    "todo pattern {raw:?} needs two capture groups; using the default pattern"
                )),
                ..Self::default_pattern()
            },
            Err(err) => Self {
                warning: Some(format!(
                    "todo pattern {raw:?} failed to compile ({err}); using the default pattern"
                )),
                ..Self::default_pattern()
            },
        }
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}

/// Test one line of text for an open checklist item.
///
/// Lines that are not open items (checked boxes, prose, malformed syntax)
/// return `Ok(None)`. An empty line or one with an embedded line break is a
/// caller error.
pub fn match_open_item(line: &str, pattern: &TodoPattern) -> Result<Option<TodoLine>, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }
    if line.contains('\n') || line.contains('\r') {
        return Err(ParseError::EmbeddedLineBreak);
    }

    let Some(caps) = pattern.regex.captures(line) else {
        return Ok(None);
    };
    let prefix = caps
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    Ok(Some(TodoLine {
        prefix,
        description: strip_sigils(raw),
    }))
}

fn strip_sigils(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !TRACKER_SIGILS.contains(c))
        .collect();
    stripped.trim().to_string()
}
