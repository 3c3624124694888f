use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use depot_core::constants::{DEFAULT_LOCK_PRUNE_THRESHOLD, MAVEN2_LAYOUT, TEMP_DIR_NAME, TRASH_DIR_NAME};
use depot_core::{
    ArtifactManager, CoreConfig, LayoutProviderRegistry, LoggingListener, Metadata,
    RepositoryFileSystem, SnapshotRetention,
};
use depot_files::LocalStorageBackend;
use depot_types::{Repository, RepositoryId, RepositoryPolicy, Storage, StorageId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Depot artifact store maintenance CLI")]
struct Cli {
    /// Directory holding one subdirectory per repository
    #[arg(long, global = true, env = "DEPOT_STORAGE_DIR", default_value = "storage")]
    storage_dir: PathBuf,
    /// Storage identifier
    #[arg(long, global = true, env = "DEPOT_STORAGE_ID", default_value = "storage0")]
    storage_id: String,
    /// Layout alias of the repository
    #[arg(long, global = true, env = "DEPOT_LAYOUT", default_value = MAVEN2_LAYOUT)]
    layout: String,
    /// Repository policy: release, snapshot or mixed
    #[arg(long, global = true, env = "DEPOT_POLICY", default_value = "release")]
    policy: RepositoryPolicy,
    /// Move deleted files to the repository trash instead of removing them
    #[arg(long, global = true, env = "DEPOT_TRASH")]
    trash: bool,
    /// Number of idle path locks tolerated before the registry prunes them
    #[arg(long, global = true, env = "DEPOT_LOCK_PRUNE_THRESHOLD", default_value_t = DEFAULT_LOCK_PRUNE_THRESHOLD)]
    lock_prune_threshold: usize,
    /// Trash directory name below each repository
    #[arg(long, global = true, env = "DEPOT_TRASH_DIR", default_value = TRASH_DIR_NAME)]
    trash_dir: String,
    /// Temporary upload directory name below each repository
    #[arg(long, global = true, env = "DEPOT_TEMP_DIR", default_value = TEMP_DIR_NAME)]
    temp_dir: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered layout providers
    Layouts,
    /// Regenerate checksum side-files
    Checksums {
        /// Repository identifier
        repository: String,
        /// Path below the repository root (defaults to the whole repository)
        #[arg(default_value = "")]
        path: String,
        /// Restrict generation to these version directories (repeatable)
        #[arg(long = "version-dir")]
        version_dirs: Vec<String>,
        /// Overwrite existing side-files
        #[arg(long)]
        force: bool,
    },
    /// Rebuild maven-metadata.xml for an artifact
    Metadata {
        /// Repository identifier
        repository: String,
        /// Artifact base path, e.g. org/example/app
        base: String,
    },
    /// Remove old timestamped builds from a snapshot version directory
    Prune {
        /// Repository identifier
        repository: String,
        /// Version directory, e.g. org/example/app/1.0-SNAPSHOT
        version_dir: String,
        /// Number of newest builds to keep
        #[arg(long, conflicts_with = "older_than", required_unless_present = "older_than")]
        keep: Option<usize>,
        /// Remove builds deployed before this date (YYYY-MM-DD)
        #[arg(long)]
        older_than: Option<String>,
    },
    /// Manage the repository trash
    Trash {
        #[command(subcommand)]
        action: TrashCommand,
    },
}

#[derive(Subcommand)]
enum TrashCommand {
    /// Permanently delete everything in the trash
    Empty {
        /// Repository identifier
        repository: String,
    },
    /// Move trashed files back into the repository
    Restore {
        /// Repository identifier
        repository: String,
        /// Restore only this path (defaults to everything)
        path: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("depot=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CoreConfig::new(
        cli.lock_prune_threshold,
        cli.trash_dir.as_str(),
        cli.temp_dir.as_str(),
        true,
    )?;
    let fs = RepositoryFileSystem::new(
        Arc::new(LocalStorageBackend::new()),
        Arc::new(LayoutProviderRegistry::with_defaults()),
        config,
    );
    fs.events().subscribe(Arc::new(LoggingListener));
    let artifacts = ArtifactManager::new(Arc::new(fs));

    match &cli.command {
        Some(Commands::Layouts) => {
            let layouts = artifacts.fs().layouts();
            for alias in layouts.aliases() {
                let provider = layouts.get(&alias)?;
                let algorithms: Vec<&str> = provider
                    .digest_algorithms()
                    .into_iter()
                    .map(|algorithm| algorithm.name())
                    .collect();
                println!(
                    "{alias}: digests [{}], metadata {}",
                    algorithms.join(", "),
                    if provider.supports_metadata() { "yes" } else { "no" }
                );
            }
        }
        Some(Commands::Checksums {
            repository,
            path,
            version_dirs,
            force,
        }) => {
            let repository = open_repository(&cli, repository)?;
            let base = artifacts.fs().resolve(&repository, path)?;
            let report = artifacts.regenerate_checksums(&base, version_dirs, *force)?;
            println!(
                "Processed {} files: {} checksums written, {} skipped",
                report.files_processed, report.checksums_written, report.checksums_skipped
            );
            for failed in &report.failed {
                eprintln!("Failed: {}", failed.display());
            }
            if !report.failed.is_empty() {
                bail!("{} files could not be checksummed", report.failed.len());
            }
        }
        Some(Commands::Metadata { repository, base }) => {
            let repository = open_repository(&cli, repository)?;
            let base = artifacts.fs().resolve(&repository, base)?;
            match artifacts.rebuild_metadata(&base)? {
                Some(metadata) => print_metadata(&metadata),
                None => println!("No versions found; metadata removed."),
            }
        }
        Some(Commands::Prune {
            repository,
            version_dir,
            keep,
            older_than,
        }) => {
            let retention = match (keep, older_than) {
                (Some(keep), _) => SnapshotRetention::KeepLatest(*keep),
                (None, Some(date)) => SnapshotRetention::KeepNewerThan(parse_cutoff(date)?),
                (None, None) => bail!("either --keep or --older-than is required"),
            };
            let repository = open_repository(&cli, repository)?;
            let version_dir = artifacts.fs().resolve(&repository, version_dir)?;
            let report = artifacts.prune_snapshots(&version_dir, retention)?;
            println!(
                "Removed {} builds ({} files), kept {}",
                report.builds_removed.len(),
                report.files_removed,
                report.builds_kept
            );
            for build in &report.builds_removed {
                println!("  - {build}");
            }
            for skipped in &report.skipped {
                eprintln!("Skipped non-timestamped version {skipped}");
            }
        }
        Some(Commands::Trash { action }) => match action {
            TrashCommand::Empty { repository } => {
                let repository = open_repository(&cli, repository)?;
                artifacts.fs().delete_trash(&repository)?;
                println!("Trash emptied for {}", repository.qualified_id());
            }
            TrashCommand::Restore { repository, path } => {
                let repository = open_repository(&cli, repository)?;
                let restored = match path {
                    Some(path) => {
                        let path = artifacts.fs().resolve(&repository, path)?;
                        artifacts.fs().undelete_path(&path)?
                    }
                    None => artifacts.fs().undelete(&repository)?,
                };
                println!("Restored {restored} files to {}", repository.qualified_id());
            }
        },
        None => {
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

/// Builds the repository descriptor named on the command line.
fn open_repository(cli: &Cli, id: &str) -> anyhow::Result<Arc<Repository>> {
    let mut storage = Storage::new(StorageId::new(&cli.storage_id)?, &cli.storage_dir);
    let repository_id = RepositoryId::new(id)?;
    let basedir = storage.basedir().join(repository_id.as_str());
    if !basedir.is_dir() {
        bail!("repository directory {} does not exist", basedir.display());
    }

    let repository = Repository::new(storage.id().clone(), repository_id, basedir, cli.layout.as_str())?
        .with_policy(cli.policy)
        .with_trash(cli.trash);
    Ok(storage.add_repository(repository)?)
}

fn parse_cutoff(date: &str) -> anyhow::Result<DateTime<Utc>> {
    let midnight = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid date {date:?}, expected YYYY-MM-DD"))?
        .and_hms_opt(0, 0, 0)
        .context("midnight is always a valid time")?;
    Ok(Utc.from_utc_datetime(&midnight))
}

fn print_metadata(metadata: &Metadata) {
    println!(
        "{}:{}",
        metadata.group_id.as_deref().unwrap_or("?"),
        metadata.artifact_id.as_deref().unwrap_or("?")
    );
    if let Some(versioning) = &metadata.versioning {
        if let Some(latest) = &versioning.latest {
            println!("  latest:  {latest}");
        }
        if let Some(release) = &versioning.release {
            println!("  release: {release}");
        }
        for version in &versioning.versions.version {
            println!("  - {version}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cutoff_is_midnight_utc() {
        let cutoff = parse_cutoff("2024-01-03").unwrap();
        assert_eq!(cutoff.to_rfc3339(), "2024-01-03T00:00:00+00:00");
        assert!(parse_cutoff("03/01/2024").is_err());
    }

    #[test]
    fn test_prune_requires_a_retention_rule() {
        let parsed = Cli::try_parse_from(["depot", "prune", "libs", "org/app/1.0-SNAPSHOT"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "depot",
            "prune",
            "libs",
            "org/app/1.0-SNAPSHOT",
            "--keep",
            "2",
            "--older-than",
            "2024-01-01",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_options_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "depot",
            "trash",
            "restore",
            "libs",
            "--policy",
            "snapshot",
            "--trash",
        ])
        .unwrap();
        assert_eq!(cli.policy, RepositoryPolicy::Snapshot);
        assert!(cli.trash);
        assert!(matches!(
            cli.command,
            Some(Commands::Trash {
                action: TrashCommand::Restore { path: None, .. }
            })
        ));
    }
}
