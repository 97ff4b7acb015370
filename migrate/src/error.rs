use std::{io, path::PathBuf, result};

use thiserror::Error;

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    // config
    #[error("cannot read configuration file at {1}")]
    ReadConfigError(#[source] io::Error, PathBuf),
    #[error("cannot parse configuration file at {1}")]
    ParseConfigError(#[source] toml::de::Error, PathBuf),

    // session
    #[error("cannot connect to IMAP server {1}:{2}")]
    ConnectError(#[source] imap::Error, String, u16),
    #[error("cannot authenticate to IMAP server as {1}")]
    LoginError(#[source] imap::Error, String),
    #[error("cannot logout from IMAP server")]
    LogoutError(#[source] imap::Error),

    // folders
    #[error("cannot get IMAP folder separator")]
    GetFolderSeparatorError(#[source] imap::Error),
    #[error("cannot list IMAP folders")]
    ListFoldersError(#[source] imap::Error),
    #[error("cannot check existence of IMAP folder {1}")]
    CheckFolderError(#[source] imap::Error, String),
    #[error("cannot create IMAP folder {1}")]
    CreateFolderError(#[source] imap::Error, String),
    #[error("cannot select IMAP folder {1}")]
    SelectFolderError(#[source] imap::Error, String),
    #[error("cannot expunge IMAP folder {1}")]
    ExpungeFolderError(#[source] imap::Error, String),
    #[error("cannot operate on messages: no IMAP folder selected")]
    NoFolderSelectedError,

    // messages
    #[error("cannot search messages of IMAP folder {1}")]
    SearchMessagesError(#[source] imap::Error, String),
    #[error("cannot fetch message {1} from IMAP folder {2}")]
    FetchMessageError(#[source] imap::Error, u32, String),
    #[error("cannot find message {0} in IMAP folder {1}: message vanished")]
    MessageVanishedError(u32, String),
    #[error("cannot get content of message {0} from IMAP folder {1}")]
    GetMessageBodyError(u32, String),
    #[error("cannot append message to IMAP folder {1}")]
    AppendMessageError(#[source] imap::Error, String),
    #[error("cannot delete message {1} from IMAP folder {2}")]
    DeleteMessageError(#[source] imap::Error, u32, String),

    #[error(transparent)]
    LedgerError(#[from] imap_migrate_ledger::Error),
}

impl Error {
    /// Returns `true` for errors that only concern the current
    /// folder, so that the migration can carry on with the next one.
    pub fn is_folder_error(&self) -> bool {
        matches!(self, Self::SelectFolderError(..))
    }

    /// Returns `true` when the message disappeared from the source
    /// folder between its enumeration and its fetch.
    pub fn is_message_vanished(&self) -> bool {
        matches!(self, Self::MessageVanishedError(..))
    }
}
