use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;

use crate::dedup::RemoteSnapshot;
use crate::freshness::{FreshnessGate, FreshnessVerdict, DEFAULT_QUIET_PERIOD_SECS};
use crate::parse::TodoPattern;
use crate::rewrite::{self, LinePatch, DEFAULT_MIGRATED_MARKER};
use crate::scan::{scan_tree, ScanError, TaskRecord};
use crate::store::{RemoteTask, StoreError, TaskStore};

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// Without the open-task snapshot there is no dedup basis, so a failed
    /// fetch aborts the run before anything is created or rewritten.
    #[error("Failed to fetch the open task list: {0}")]
    Fetch(StoreError),
}

/// Explicit pipeline configuration; there is no ambient global state.
#[derive(Debug, Clone)]
pub struct MigrateSettings {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub quiet_period_secs: i64,
    pub todo_pattern: Option<String>,
    pub migrated_marker: char,
    pub due_hint: Option<String>,
    /// Classify every item but create and rewrite nothing.
    pub dry_run: bool,
}

impl MigrateSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec![".md".to_string()],
            quiet_period_secs: DEFAULT_QUIET_PERIOD_SECS,
            todo_pattern: None,
            migrated_marker: DEFAULT_MIGRATED_MARKER,
            due_hint: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Migrated { url: String },
    WouldMigrate,
    SkippedFresh,
    SkippedDuplicate { existing_content: String },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    pub description: String,
    pub source_path: PathBuf,
    pub outcome: Outcome,
}

/// One visible outcome per scanned item, so "nothing to do" is
/// distinguishable from "intentionally skipped" and from "failed".
#[derive(Debug, Default)]
pub struct MigrateReport {
    pub items: Vec<ItemReport>,
    pub notes: Vec<String>,
}

impl MigrateReport {
    pub fn migrated(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Migrated { .. } | Outcome::WouldMigrate))
    }

    pub fn skipped_fresh(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::SkippedFresh))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::SkippedDuplicate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Failed { .. }))
    }

    fn count(&self, matching: impl Fn(&Outcome) -> bool) -> usize {
        self.items
            .iter()
            .filter(|item| matching(&item.outcome))
            .count()
    }
}

/// Run the full scan-then-migrate pipeline once, sequentially.
///
/// The remote task list is fetched a single time and grown in memory as
/// creations succeed. A failed creation abandons that one item for the run;
/// prior and subsequent items are unaffected.
pub fn run_migration(
    store: &dyn TaskStore,
    settings: &MigrateSettings,
) -> Result<MigrateReport, MigrateError> {
    let pattern = TodoPattern::compile(settings.todo_pattern.as_deref());
    let mut report = MigrateReport::default();
    if let Some(warning) = pattern.warning() {
        report.notes.push(warning.to_string());
    }

    let scanned = scan_tree(&settings.root, &settings.extensions, &pattern)?;
    report.notes.extend(scanned.notes);
    if scanned.records.is_empty() {
        return Ok(report);
    }

    let remote = store.list_open_tasks().map_err(MigrateError::Fetch)?;
    let mut snapshot = RemoteSnapshot::new(remote);
    let mut gate = FreshnessGate::new(settings.quiet_period_secs);

    for record in scanned.records {
        let outcome = evaluate(
            store,
            settings,
            &mut snapshot,
            &mut gate,
            &record,
            &mut report.notes,
        );
        report.items.push(ItemReport {
            description: record.description,
            source_path: record.source_path,
            outcome,
        });
    }
    Ok(report)
}

fn evaluate(
    store: &dyn TaskStore,
    settings: &MigrateSettings,
    snapshot: &mut RemoteSnapshot,
    gate: &mut FreshnessGate,
    record: &TaskRecord,
    notes: &mut Vec<String>,
) -> Outcome {
    match gate.verdict(&record.source_path, Utc::now()) {
        Ok(FreshnessVerdict::Proceed) => {}
        Ok(FreshnessVerdict::StillEditing) => return Outcome::SkippedFresh,
        Err(err) => return Outcome::Failed {
            error: err.to_string(),
        },
    }

    if let Some(existing) = snapshot.resolve(record) {
        return Outcome::SkippedDuplicate {
            existing_content: existing.content.clone(),
        };
    }

    if settings.dry_run {
        return Outcome::WouldMigrate;
    }

    let task_description = format!(
        "Migrated from [{}]({}). (Link may break if the note was renamed or moved.)",
        record.host.note_name, record.host.note_uri
    );
    let created = match store.create_task(
        &record.description,
        &task_description,
        settings.due_hint.as_deref(),
    ) {
        Ok(created) => created,
        Err(err) => {
            return Outcome::Failed {
                error: err.to_string(),
            }
        }
    };
    // The remote task exists from here on: record it in the snapshot even if
    // the local rewrite goes wrong, so same-run twins still deduplicate.
    snapshot.insert(RemoteTask {
        content: record.description.clone(),
        url: created.url.clone(),
    });

    let replacement = match rewrite::migrated_line(
        &record.prefix,
        &record.description,
        &created.url,
        settings.migrated_marker,
    ) {
        Ok(line) => line,
        Err(err) => {
            return Outcome::Failed {
                error: format!("task created at {} but the rewrite failed: {err}", created.url),
            }
        }
    };
    let patch = LinePatch {
        needle: record.original_line.clone(),
        replacement,
    };
    match rewrite::apply_patches(&record.source_path, &[patch]) {
        Ok(0) => notes.push(format!(
            "{}: original line not found during rewrite",
            record.source_path.display()
        )),
        Ok(_) => gate.mark_touched(&record.source_path),
        Err(err) => {
            return Outcome::Failed {
                error: format!("task created at {} but the rewrite failed: {err}", created.url),
            }
        }
    }
    Outcome::Migrated { url: created.url }
}
