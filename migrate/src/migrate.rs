//! Module dedicated to the migration.
//!
//! The core structure of this module is the [`Migrator`], which
//! drives the source account, the target account and the ledger.

use std::{
    fmt,
    time::{Duration, Instant},
};

use imap_migrate_ledger::Ledger;
use tracing::{debug, info, warn};

use crate::{
    session::{ImapSession, MailSession},
    source::SourceAccount,
    target::TargetAccount,
    Error, Result,
};

/// The migration options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MigrateOptions {
    /// Deletes source messages once migrated.
    pub delete_source: bool,
}

/// What happens to a source folder during the migration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FolderStatus {
    /// The folder is not migrated.
    Ignored,
    /// The folder is migrated to the given target folder.
    MappedTo(String),
    /// The folder is migrated to a folder of the same name.
    Direct,
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored => write!(f, "[Ignored]"),
            Self::MappedTo(folder) => write!(f, "[Migrated to: {folder}]"),
            Self::Direct => write!(f, "[Migrated Directly]"),
        }
    }
}

/// The folders of both accounts, as shown by the listing mode.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FolderListing {
    pub source: Vec<(String, FolderStatus)>,
    pub target: Vec<String>,
}

/// The report of one migrated folder.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FolderReport {
    pub source: String,
    pub target: String,
    pub messages: usize,
    pub bytes: u64,
    /// Messages already present in the ledger.
    pub skipped: usize,
    /// Messages that disappeared between listing and fetching.
    pub vanished: usize,
    pub elapsed: Duration,
}

/// The migration report.
#[derive(Debug, Default)]
pub struct MigrateReport {
    pub messages: usize,
    pub bytes: u64,
    pub skipped: usize,
    pub vanished: usize,
    pub elapsed: Duration,
    pub folders: Vec<FolderReport>,
    /// Folders that could not be migrated, with the reason why.
    pub failed_folders: Vec<(String, Error)>,
}

impl MigrateReport {
    pub fn is_complete(&self) -> bool {
        self.failed_folders.is_empty()
    }
}

/// The outcome of a migration run.
#[derive(Debug)]
pub enum MigrateOutcome {
    /// The run has been declined before anything changed.
    Aborted,
    Completed(MigrateReport),
}

/// The migration orchestrator.
pub struct Migrator<S = ImapSession, T = ImapSession>
where
    S: MailSession,
    T: MailSession,
{
    source: SourceAccount<S>,
    target: TargetAccount<T>,
    ledger: Ledger,
    options: MigrateOptions,
}

impl<S: MailSession, T: MailSession> Migrator<S, T> {
    pub fn new(
        source: SourceAccount<S>,
        target: TargetAccount<T>,
        ledger: Ledger,
        options: MigrateOptions,
    ) -> Self {
        Self {
            source,
            target,
            ledger,
            options,
        }
    }

    pub fn source(&self) -> &SourceAccount<S> {
        &self.source
    }

    pub fn target(&self) -> &TargetAccount<T> {
        &self.target
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Gives back the accounts and the ledger, so that they can be
    /// closed properly.
    pub fn into_parts(self) -> (SourceAccount<S>, TargetAccount<T>, Ledger) {
        (self.source, self.target, self.ledger)
    }

    /// Lists source folders with their status, then target folders.
    ///
    /// Nothing is modified, neither on accounts nor in the ledger.
    pub fn list_folders(&mut self) -> Result<FolderListing> {
        let source = self
            .source
            .list_folders()?
            .into_iter()
            .map(|folder| {
                let status = match self.source.map_target_folder(&folder) {
                    Some(target) => FolderStatus::MappedTo(target.to_owned()),
                    None if self.source.is_ignored(&folder) => FolderStatus::Ignored,
                    None => FolderStatus::Direct,
                };
                (folder, status)
            })
            .collect();

        let target = self.target.list_folders()?;

        Ok(FolderListing { source, target })
    }

    /// Migrates all non-ignored source folders.
    ///
    /// The `proceed` gate is asked first: when it answers `false`,
    /// the run stops before anything is modified.
    pub fn migrate<F>(&mut self, proceed: F) -> Result<MigrateOutcome>
    where
        F: FnOnce(&SourceAccount<S>, &TargetAccount<T>) -> bool,
    {
        if !proceed(&self.source, &self.target) {
            info!("migration declined, exiting");
            return Ok(MigrateOutcome::Aborted);
        }

        self.ledger.ensure_schema()?;

        let start = Instant::now();
        let mut report = MigrateReport::default();

        for folder in self.source.list_folders()? {
            if self.source.is_ignored(&folder) {
                info!("folder {folder} is ignored, skipping it");
                continue;
            }

            match self.migrate_folder(&folder, &mut report) {
                Ok(folder_report) => report.folders.push(folder_report),
                Err(err) if err.is_folder_error() => {
                    warn!("cannot migrate folder {folder}, skipping it: {err}");
                    debug!("{err:?}");
                    report.failed_folders.push((folder, err));
                }
                Err(err) => return Err(err),
            }
        }

        report.elapsed = start.elapsed();
        info!(
            "migration of {} messages ({} bytes) finished, took {:?}",
            report.messages, report.bytes, report.elapsed
        );

        Ok(MigrateOutcome::Completed(report))
    }

    fn migrate_folder(&mut self, folder: &str, report: &mut MigrateReport) -> Result<FolderReport> {
        let start = Instant::now();

        let target_folder = self
            .source
            .map_target_folder(folder)
            .unwrap_or(folder)
            .to_owned();
        info!("migrating folder {folder} to {target_folder}");

        let target_folder = self.target.create_folder(&target_folder)?;

        let info = self.source.select_folder(folder)?;
        info!("folder {folder} contains {} messages", info.message_count);

        let mut folder_report = FolderReport {
            source: folder.to_owned(),
            target: target_folder.clone(),
            ..Default::default()
        };

        for id in self.source.fetch_message_ids()? {
            if self.ledger.has_seen(&target_folder, id)? {
                debug!("skipping message {id}, already migrated to {target_folder}");
                folder_report.skipped += 1;
                continue;
            }

            let message = match self.source.fetch_message(id) {
                Ok(message) => message,
                Err(err) if err.is_message_vanished() => {
                    warn!("{err}, skipping it");
                    folder_report.vanished += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            debug!(
                "migrating message {id} of {} bytes to {target_folder}",
                message.size
            );
            self.target.append(&target_folder, &message)?;
            self.ledger.mark_seen(&target_folder, id)?;

            folder_report.messages += 1;
            folder_report.bytes += message.size;

            if self.options.delete_source {
                self.source.delete_message(id)?;
            }
        }

        folder_report.elapsed = start.elapsed();
        info!(
            "folder {folder} done, took {:?}, {} messages migrated",
            folder_report.elapsed, folder_report.messages
        );

        report.messages += folder_report.messages;
        report.bytes += folder_report.bytes;
        report.skipped += folder_report.skipped;
        report.vanished += folder_report.vanished;

        Ok(folder_report)
    }
}
