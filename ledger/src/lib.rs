//! Rust library to keep track of IMAP messages already migrated.
//!
//! The [`Ledger`] is a seen-set persisted in a SQLite database. Each
//! entry is a pair made of a target folder name and a source message
//! UID. Once a pair is recorded, it is never updated nor deleted:
//! this is what allows an interrupted migration to be resumed by
//! simply running it again.

use std::{path::PathBuf, result};

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, trace};

const CREATE_SEEN_MESSAGES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS seen_messages (
        folder TEXT    NOT NULL,
        msgid  INTEGER NOT NULL
    )
";

const CREATE_SEEN_MESSAGES_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS seen_messages_idx
    ON seen_messages (folder, msgid)
";

const SELECT_SEEN_MESSAGE: &str = "
    SELECT 1
    FROM seen_messages
    WHERE folder = ?1
    AND msgid = ?2
    LIMIT 1
";

// The index is not unique, so duplicates are filtered out here.
const INSERT_SEEN_MESSAGE: &str = "
    INSERT INTO seen_messages (folder, msgid)
    SELECT ?1, ?2
    WHERE NOT EXISTS (
        SELECT 1 FROM seen_messages WHERE folder = ?1 AND msgid = ?2
    )
";

const COUNT_SEEN_MESSAGES: &str = "SELECT COUNT(*) FROM seen_messages";

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open ledger database at {1}")]
    OpenDbError(#[source] rusqlite::Error, PathBuf),
    #[error("cannot create ledger database schema")]
    EnsureSchemaError(#[source] rusqlite::Error),
    #[error("cannot begin ledger transaction")]
    BeginTransactionError(#[source] rusqlite::Error),
    #[error("cannot commit ledger transaction")]
    CommitTransactionError(#[source] rusqlite::Error),
    #[error("cannot check if message {2} of folder {1} has been seen")]
    SelectSeenError(#[source] rusqlite::Error, String, u32),
    #[error("cannot mark message {2} of folder {1} as seen")]
    InsertSeenError(#[source] rusqlite::Error, String, u32),
    #[error("cannot count ledger entries")]
    CountError(#[source] rusqlite::Error),
    #[error("cannot close ledger database")]
    CloseDbError(#[source] rusqlite::Error),
}

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The migration ledger.
///
/// Access is sequential: one connection, owned by the migration
/// flow for the whole run.
#[derive(Debug)]
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Opens the ledger database located at the given path,
    /// creating it if it does not exist yet.
    ///
    /// The schema is not created here, see [`Ledger::ensure_schema`].
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        debug!("opening ledger database at {path:?}");

        let conn = Connection::open(&path).map_err(|err| Error::OpenDbError(err, path))?;

        Ok(Self { conn })
    }

    /// Opens an in-memory ledger, mostly used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|err| Error::OpenDbError(err, PathBuf::from(":memory:")))?;
        Ok(Self { conn })
    }

    /// Creates the seen messages table and its lookup index.
    ///
    /// Both statements are no-ops when the schema already exists, so
    /// this can be called at the beginning of every run.
    pub fn ensure_schema(&mut self) -> Result<()> {
        debug!("ensuring ledger schema");

        let tx = self
            .conn
            .transaction()
            .map_err(Error::BeginTransactionError)?;

        trace!("create table query: {CREATE_SEEN_MESSAGES_TABLE}");
        tx.execute(CREATE_SEEN_MESSAGES_TABLE, ())
            .map_err(Error::EnsureSchemaError)?;

        trace!("create index query: {CREATE_SEEN_MESSAGES_INDEX}");
        tx.execute(CREATE_SEEN_MESSAGES_INDEX, ())
            .map_err(Error::EnsureSchemaError)?;

        tx.commit().map_err(Error::CommitTransactionError)?;

        Ok(())
    }

    /// Returns `true` if the given message has already been migrated
    /// to the given folder.
    pub fn has_seen(&self, folder: impl AsRef<str>, id: u32) -> Result<bool> {
        let folder = folder.as_ref();

        let seen = self
            .conn
            .query_row(SELECT_SEEN_MESSAGE, (folder, id), |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|err| Error::SelectSeenError(err, folder.to_owned(), id))?
            .is_some();

        trace!("message {id} of folder {folder} seen: {seen}");
        Ok(seen)
    }

    /// Records that the given message has been migrated to the given
    /// folder.
    ///
    /// Marking a pair that already exists does nothing.
    pub fn mark_seen(&mut self, folder: impl AsRef<str>, id: u32) -> Result<()> {
        let folder = folder.as_ref();
        debug!("marking message {id} of folder {folder} as seen");

        let tx = self
            .conn
            .transaction()
            .map_err(Error::BeginTransactionError)?;

        tx.execute(INSERT_SEEN_MESSAGE, (folder, id))
            .map_err(|err| Error::InsertSeenError(err, folder.to_owned(), id))?;

        tx.commit().map_err(Error::CommitTransactionError)?;

        Ok(())
    }

    /// Returns the number of entries of the ledger.
    pub fn len(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row(COUNT_SEEN_MESSAGES, (), |row| row.get::<_, i64>(0))
            .map_err(Error::CountError)?;
        Ok(count as usize)
    }

    /// Returns `true` if no message has been recorded yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Closes the underlying database connection.
    pub fn close(self) -> Result<()> {
        debug!("closing ledger database");
        self.conn
            .close()
            .map_err(|(_conn, err)| Error::CloseDbError(err))
    }
}
