use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub const DEFAULT_QUIET_PERIOD_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum FreshnessError {
    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessVerdict {
    Proceed,
    /// The file changed too recently (or claims a future mtime); its items
    /// sit out this pass.
    StillEditing,
}

/// Time-based suppression of tasks from files that may still be mid-edit.
///
/// Holds no state across runs. Within a run, a file this tool itself rewrote
/// is marked touched so its remaining tasks are not suppressed by the mtime
/// bump the rewrite caused.
#[derive(Debug)]
pub struct FreshnessGate {
    quiet_period_secs: i64,
    touched: HashSet<PathBuf>,
}

impl FreshnessGate {
    pub fn new(quiet_period_secs: i64) -> Self {
        Self {
            quiet_period_secs,
            touched: HashSet::new(),
        }
    }

    pub fn verdict(
        &self,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<FreshnessVerdict, FreshnessError> {
        if self.touched.contains(path) {
            return Ok(FreshnessVerdict::Proceed);
        }
        let metadata = fs::metadata(path).map_err(|source| FreshnessError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = metadata.modified().map_err(|source| FreshnessError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
        let mtime_secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs() as i64)
            .unwrap_or(0);
        let elapsed = now.timestamp() - mtime_secs;
        if elapsed < 0 || elapsed < self.quiet_period_secs {
            Ok(FreshnessVerdict::StillEditing)
        } else {
            Ok(FreshnessVerdict::Proceed)
        }
    }

    pub fn mark_touched(&mut self, path: &Path) {
        self.touched.insert(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn write_note(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("note.md");
        fs::write(&path, "- [ ] Buy milk\n").expect("write note");
        path
    }

    #[test]
    fn recently_modified_file_is_skipped() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_note(&temp);
        let gate = FreshnessGate::new(60);
        // The file was written moments ago, so "now" sits ~10s after mtime.
        let now = Utc::now() + Duration::seconds(10);
        assert_eq!(
            gate.verdict(&path, now).expect("verdict"),
            FreshnessVerdict::StillEditing
        );
    }

    #[test]
    fn future_mtime_is_skipped() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_note(&temp);
        let gate = FreshnessGate::new(60);
        // Pretend the clock sits 100s behind the file's mtime.
        let now = Utc::now() - Duration::seconds(100);
        assert_eq!(
            gate.verdict(&path, now).expect("verdict"),
            FreshnessVerdict::StillEditing
        );
    }

    #[test]
    fn quiet_file_proceeds() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_note(&temp);
        let gate = FreshnessGate::new(60);
        let now = Utc::now() + Duration::seconds(120);
        assert_eq!(
            gate.verdict(&path, now).expect("verdict"),
            FreshnessVerdict::Proceed
        );
    }

    #[test]
    fn touched_file_proceeds_despite_fresh_mtime() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_note(&temp);
        let mut gate = FreshnessGate::new(60);
        gate.mark_touched(&path);
        let now = Utc::now() + Duration::seconds(10);
        assert_eq!(
            gate.verdict(&path, now).expect("verdict"),
            FreshnessVerdict::Proceed
        );
    }

    #[test]
    fn zero_quiet_period_disables_the_gate() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_note(&temp);
        let gate = FreshnessGate::new(0);
        assert_eq!(
            gate.verdict(&path, Utc::now() + Duration::seconds(1))
                .expect("verdict"),
            FreshnessVerdict::Proceed
        );
    }

    #[test]
    fn missing_file_is_a_stat_error() {
        let gate = FreshnessGate::new(60);
        let err = gate
            .verdict(Path::new("/no/such/note.md"), Utc::now())
            .expect_err("missing file");
        assert!(matches!(err, FreshnessError::Stat { .. }));
    }
}
