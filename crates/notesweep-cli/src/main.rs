use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use notesweep_core::config::{self, NotesweepConfig};
use notesweep_core::migrate::{run_migration, MigrateSettings, Outcome};
use notesweep_core::parse::TodoPattern;
use notesweep_core::scan::scan_tree;
use notesweep_core::store::HttpTaskStore;

mod version;

#[derive(Parser)]
#[command(
    name = "notesweep",
    version,
    about = "Migrate open checklist items from plain-text notes into a task tracker"
)]
struct Cli {
    /// Root of the note tree (defaults to root_dir from config, then cwd)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List open checklist items without touching notes or the tracker
    Scan {
        /// File extensions to scan (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
    /// Migrate open items into the tracker and rewrite their source lines
    Migrate {
        /// File extensions to scan (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
        /// Seconds a file must sit unmodified before its items are eligible
        #[arg(long)]
        quiet_secs: Option<i64>,
        /// Classify every item but create and rewrite nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Scan { extensions }) => cmd_scan(cli.root, extensions),
        Some(Command::Migrate {
            extensions,
            quiet_secs,
            dry_run,
        }) => cmd_migrate(cli.root, extensions, quiet_secs, dry_run),
        Some(Command::Version) => {
            println!("notesweep {}", version::FULL);
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Resolve layered config plus the effective scan root.
fn load_setup(root_flag: Option<PathBuf>) -> Result<(NotesweepConfig, MigrateSettings)> {
    let cwd = std::env::current_dir().context("resolving the current directory")?;
    let config_root = config::find_config_root(&cwd).unwrap_or_else(|| cwd.clone());
    let config = config::resolve_config(&config_root);
    let root = root_flag
        .or_else(|| config.root_dir.as_ref().map(PathBuf::from))
        .unwrap_or(cwd);
    let settings = config::settings_from_config(&config, root);
    Ok((config, settings))
}

fn cmd_scan(root_flag: Option<PathBuf>, extensions: Vec<String>) -> Result<()> {
    let (_, mut settings) = load_setup(root_flag)?;
    if !extensions.is_empty() {
        settings.extensions = extensions;
    }

    let pattern = TodoPattern::compile(settings.todo_pattern.as_deref());
    if let Some(warning) = pattern.warning() {
        eprintln!("warning: {warning}");
    }
    let outcome = scan_tree(&settings.root, &settings.extensions, &pattern)?;
    for note in &outcome.notes {
        eprintln!("warning: {note}");
    }
    if outcome.records.is_empty() {
        println!(
            "No open checklist items found under {}",
            settings.root.display()
        );
        return Ok(());
    }
    for record in &outcome.records {
        println!("{}: {}", record.source_path.display(), record.description);
    }
    println!("{} open item(s)", outcome.records.len());
    Ok(())
}

fn cmd_migrate(
    root_flag: Option<PathBuf>,
    extensions: Vec<String>,
    quiet_secs: Option<i64>,
    dry_run: bool,
) -> Result<()> {
    let (config, mut settings) = load_setup(root_flag)?;
    if !extensions.is_empty() {
        settings.extensions = extensions;
    }
    if let Some(secs) = quiet_secs {
        settings.quiet_period_secs = secs;
    }
    settings.dry_run = dry_run;

    let token = config::resolve_token(&config)?;
    let store = HttpTaskStore::new(config::tracker_base_url(&config), token)?;

    let report = run_migration(&store, &settings)?;
    for note in &report.notes {
        eprintln!("warning: {note}");
    }
    if report.items.is_empty() {
        println!("Nothing to migrate under {}", settings.root.display());
        return Ok(());
    }
    for item in &report.items {
        let place = item.source_path.display();
        match &item.outcome {
            Outcome::Migrated { url } => {
                println!("migrated   {} -> {url}", item.description);
            }
            Outcome::WouldMigrate => {
                println!("would migrate {} ({place})", item.description);
            }
            Outcome::SkippedFresh => {
                println!("deferred   {} ({place} is still being edited)", item.description);
            }
            Outcome::SkippedDuplicate { existing_content } => {
                println!(
                    "duplicate  {} (already tracked as {existing_content:?})",
                    item.description
                );
            }
            Outcome::Failed { error } => {
                eprintln!("failed     {} ({place}): {error}", item.description);
            }
        }
    }
    println!(
        "{} migrated, {} deferred, {} duplicate(s), {} failed",
        report.migrated(),
        report.skipped_fresh(),
        report.duplicates(),
        report.failed()
    );
    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
