use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use imap_migrate::{
    migrate::FolderListing, MigrateConfig, MigrateOptions, MigrateOutcome, MigrateReport,
    Migrator, SourceAccount, TargetAccount,
};
use imap_migrate_ledger::Ledger;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Copy emails from one IMAP account to another.
///
/// Messages already copied by a previous run are skipped, so an
/// interrupted migration can be resumed by running it again.
#[derive(Debug, Parser)]
#[command(name = "imap-migrate", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "PATH", default_value = "imap-migrate.toml")]
    config: PathBuf,

    /// Path to the ledger database, overrides the configuration.
    #[arg(long, value_name = "PATH")]
    ledger: Option<PathBuf>,

    /// Delete migrated messages from the source account.
    #[arg(short, long)]
    delete_source: bool,

    /// Migrate messages without asking for confirmation.
    #[arg(short, long)]
    force: bool,

    /// Do not write any processing commentary.
    #[arg(short, long)]
    quiet: bool,

    /// List source and target folders, then exit.
    #[arg(short, long)]
    list_folders: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let mut config = MigrateConfig::from_path(&cli.config)?;
    if let Some(ledger) = cli.ledger {
        config.ledger = Some(ledger);
    }
    let ledger_path = config.ledger_path(&cli.config);
    debug!("using ledger at {ledger_path:?}");

    let mut source = SourceAccount::connect(config.source)?;
    let separator = source.folder_separator()?;
    let target = TargetAccount::connect(config.target, separator)?;
    let ledger = Ledger::open(ledger_path)?;

    let options = MigrateOptions {
        delete_source: cli.delete_source,
    };
    let mut migrator = Migrator::new(source, target, ledger, options);

    let mut complete = true;

    if cli.list_folders {
        print_listing(&migrator.list_folders()?);
    } else {
        let force = cli.force;
        let outcome = migrator.migrate(|source, target| force || confirm(source, target))?;

        match outcome {
            MigrateOutcome::Aborted => println!("Didn't enter 'yes', exiting"),
            MigrateOutcome::Completed(report) => {
                print_report(&report);
                complete = report.is_complete();
            }
        }
    }

    let (mut source, mut target, ledger) = migrator.into_parts();
    ledger.close()?;
    if let Err(err) = source.logout() {
        warn!("{err}");
    }
    if let Err(err) = target.logout() {
        warn!("{err}");
    }

    if !complete {
        bail!("some folders could not be migrated, run the migration again once fixed");
    }

    Ok(())
}

fn confirm(source: &SourceAccount, target: &TargetAccount) -> bool {
    print!("Copy all mail\nfrom account\n\t{source}\nto account\n\t{target}\n[yes/no]? ");

    let mut answer = String::new();
    let read = io::stdout()
        .flush()
        .and_then(|()| io::stdin().lock().read_line(&mut answer))
        .context("cannot read confirmation from stdin");

    match read {
        Ok(_) => answer.trim() == "yes",
        Err(err) => {
            warn!("{err:#}");
            false
        }
    }
}

fn print_listing(listing: &FolderListing) {
    println!("Source Folders:");
    for (folder, status) in &listing.source {
        println!("    {folder:20} : {status}");
    }

    println!("\nDestination Folders:");
    for folder in &listing.target {
        println!("    {folder}");
    }
}

fn print_report(report: &MigrateReport) {
    for (folder, err) in &report.failed_folders {
        eprintln!("Folder '{folder}' could not be migrated: {err}");
    }

    println!(
        "Migrated {} messages ({} bytes) in {:.1?}, {} already migrated, {} vanished",
        report.messages, report.bytes, report.elapsed, report.skipped, report.vanished
    );
}
