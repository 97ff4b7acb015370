//! Rust library to copy emails from one IMAP account to another.
//!
//! The migration is a one-shot batch: every folder of the source
//! account that is not ignored is copied to the target account,
//! message by message. Each migrated message is recorded in a
//! [`Ledger`](imap_migrate_ledger::Ledger), so that running the
//! migration again only copies what has not been copied yet.
//!
//! See [`Migrator`](crate::migrate::Migrator) for the entry point.

pub mod config;
mod error;
pub mod migrate;
pub mod session;
pub mod source;
pub mod target;

#[doc(inline)]
pub use self::{
    config::MigrateConfig,
    error::{Error, Result},
    migrate::{MigrateOptions, MigrateOutcome, MigrateReport, Migrator},
    source::SourceAccount,
    target::TargetAccount,
};
