//! Module dedicated to the IMAP session.
//!
//! The [`MailSession`] trait is the only boundary between the
//! migration logic and the IMAP protocol. [`ImapSession`] implements
//! it on top of the blocking [`imap`] client.

use std::io::{Read, Write};

use chrono::{DateTime, FixedOffset};
use imap::{types::Flag, ClientBuilder, Connection, ConnectionMode, Session, TlsKind};
use tracing::{debug, trace, warn};
use utf7_imap::{decode_utf7_imap as decode_utf7, encode_utf7_imap as encode_utf7};

use crate::{
    config::{ImapConfig, ImapEncryptionKind},
    Error, Result,
};

const FETCH_MESSAGE_QUERY: &str = "(UID FLAGS RFC822 RFC822.SIZE INTERNALDATE)";

/// Flag that cannot be set by clients, see RFC 3501 section 2.3.2.
const RECENT_FLAG: &str = "\\Recent";

/// Information about the currently selected folder.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FolderInfo {
    /// The number of messages the folder contains.
    pub message_count: u32,
}

/// A message fetched from a folder.
///
/// The message is held only during one fetch → append cycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    /// The raw RFC 822 content.
    pub raw: Vec<u8>,

    /// The flags of the message, like `\Seen` or `$Forwarded`.
    pub flags: Vec<String>,

    /// The size of the message, in bytes.
    pub size: u64,

    /// The date the server received the message at.
    pub internal_date: Option<DateTime<FixedOffset>>,
}

impl Message {
    /// Flags that can be given back to a server when appending the
    /// message.
    pub fn appendable_flags(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .map(String::as_str)
            .filter(|flag| !flag.eq_ignore_ascii_case(RECENT_FLAG))
    }
}

/// The protocol operations the migration relies on.
///
/// Folder names are always given and returned decoded. Message
/// operations apply to the folder selected last.
pub trait MailSession {
    /// Returns the folder hierarchy separator of the account, if any.
    fn folder_separator(&mut self) -> Result<Option<String>>;

    /// Lists the names of all the folders of the account.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    fn folder_exists(&mut self, folder: &str) -> Result<bool>;

    fn create_folder(&mut self, folder: &str) -> Result<()>;

    fn select_folder(&mut self, folder: &str) -> Result<FolderInfo>;

    /// Returns the UIDs of the messages of the selected folder that
    /// are not flagged as deleted.
    fn search_undeleted(&mut self) -> Result<Vec<u32>>;

    /// Fetches the message matching the given UID.
    ///
    /// Returns `None` when the server does not know this UID
    /// anymore.
    fn fetch_message(&mut self, uid: u32) -> Result<Option<Message>>;

    /// Appends the given message to the given folder, keeping its
    /// flags and its internal date.
    fn append_message(&mut self, folder: &str, message: &Message) -> Result<()>;

    /// Flags the message matching the given UID as deleted, then
    /// expunges the selected folder.
    fn delete_message(&mut self, uid: u32) -> Result<()>;

    fn logout(&mut self) -> Result<()>;
}

/// Quotes the given mailbox name so it can be sent as an IMAP
/// string, see RFC 3501 section 4.3.
fn quote(mailbox: &str) -> String {
    format!("\"{}\"", mailbox.replace('\\', "\\\\").replace('"', "\\\""))
}

/// The IMAP session, backed by a blocking connection.
pub struct ImapSession<T: Read + Write = Connection> {
    session: Session<T>,
    selected: Option<String>,
}

impl ImapSession {
    /// Connects then logs in to the IMAP server described by the
    /// given configuration.
    pub fn connect(config: &ImapConfig) -> Result<Self> {
        let host = config.host.as_str();
        let port = config.port();
        let encryption = config.encryption();
        debug!("connecting to {host}:{port} using {encryption} encryption");

        let mode = match encryption {
            ImapEncryptionKind::Tls => ConnectionMode::Tls,
            ImapEncryptionKind::StartTls => ConnectionMode::StartTls,
            ImapEncryptionKind::None => ConnectionMode::Plaintext,
        };

        let client = ClientBuilder::new(host, port)
            .mode(mode)
            .tls_kind(TlsKind::Rust)
            .connect()
            .map_err(|err| Error::ConnectError(err, host.to_owned(), port))?;

        debug!("logging in as {}", config.login);
        let session = client
            .login(&config.login, &config.password)
            .map_err(|(err, _client)| Error::LoginError(err, config.login.clone()))?;

        Ok(Self::new(session))
    }
}

impl<T: Read + Write> ImapSession<T> {
    /// Wraps an already authenticated session.
    pub fn new(session: Session<T>) -> Self {
        Self {
            session,
            selected: None,
        }
    }

    fn selected(&self) -> Result<&str> {
        self.selected
            .as_deref()
            .ok_or(Error::NoFolderSelectedError)
    }
}

impl<T: Read + Write> MailSession for ImapSession<T> {
    fn folder_separator(&mut self) -> Result<Option<String>> {
        // an empty pattern only returns the hierarchy delimiter
        let names = self
            .session
            .list(Some(""), Some(quote("").as_str()))
            .map_err(Error::GetFolderSeparatorError)?;

        let separator = names
            .iter()
            .find_map(|name| name.delimiter())
            .map(ToOwned::to_owned);
        debug!("folder separator: {separator:?}");

        Ok(separator)
    }

    fn list_folders(&mut self) -> Result<Vec<String>> {
        let names = self
            .session
            .list(Some(""), Some("*"))
            .map_err(Error::ListFoldersError)?;

        let folders = names
            .iter()
            .map(|name| decode_utf7(name.name().to_owned()))
            .collect::<Vec<_>>();
        trace!("folders: {folders:#?}");

        Ok(folders)
    }

    fn folder_exists(&mut self, folder: &str) -> Result<bool> {
        let mailbox = quote(&encode_utf7(folder.to_owned()));
        let names = self
            .session
            .list(Some(""), Some(mailbox.as_str()))
            .map_err(|err| Error::CheckFolderError(err, folder.to_owned()))?;

        // wildcards still apply to quoted patterns
        let exists = names
            .iter()
            .any(|name| decode_utf7(name.name().to_owned()) == folder);

        Ok(exists)
    }

    fn create_folder(&mut self, folder: &str) -> Result<()> {
        self.session
            .create(encode_utf7(folder.to_owned()))
            .map_err(|err| Error::CreateFolderError(err, folder.to_owned()))
    }

    fn select_folder(&mut self, folder: &str) -> Result<FolderInfo> {
        let mailbox = self
            .session
            .select(encode_utf7(folder.to_owned()))
            .map_err(|err| Error::SelectFolderError(err, folder.to_owned()))?;
        self.selected = Some(folder.to_owned());

        Ok(FolderInfo {
            message_count: mailbox.exists,
        })
    }

    fn search_undeleted(&mut self) -> Result<Vec<u32>> {
        let folder = self.selected()?.to_owned();

        let mut uids = self
            .session
            .uid_search("NOT DELETED")
            .map_err(|err| Error::SearchMessagesError(err, folder))?
            .into_iter()
            .collect::<Vec<_>>();
        uids.sort_unstable();

        Ok(uids)
    }

    fn fetch_message(&mut self, uid: u32) -> Result<Option<Message>> {
        let folder = self.selected()?.to_owned();

        let fetches = self
            .session
            .uid_fetch(uid.to_string(), FETCH_MESSAGE_QUERY)
            .map_err(|err| Error::FetchMessageError(err, uid, folder.clone()))?;

        let Some(fetch) = fetches.iter().find(|fetch| fetch.uid == Some(uid)) else {
            return Ok(None);
        };

        let raw = fetch
            .body()
            .ok_or_else(|| Error::GetMessageBodyError(uid, folder.clone()))?
            .to_vec();

        let flags = fetch
            .flags()
            .into_iter()
            .map(|flag| flag.to_string())
            .collect();

        let size = match fetch.size {
            Some(size) => size as u64,
            None => {
                warn!("no size returned for message {uid} of folder {folder}, using content length");
                raw.len() as u64
            }
        };

        Ok(Some(Message {
            raw,
            flags,
            size,
            internal_date: fetch.internal_date(),
        }))
    }

    fn append_message(&mut self, folder: &str, message: &Message) -> Result<()> {
        let mailbox = encode_utf7(folder.to_owned());
        let flags = message
            .appendable_flags()
            .map(|flag| Flag::from(flag.to_owned()))
            .collect::<Vec<_>>();

        let appended = match message.internal_date {
            Some(date) => self
                .session
                .append(&mailbox, &message.raw)
                .flags(flags)
                .internal_date(date)
                .finish(),
            None => self
                .session
                .append(&mailbox, &message.raw)
                .flags(flags)
                .finish(),
        };

        appended
            .map(|_| ())
            .map_err(|err| Error::AppendMessageError(err, folder.to_owned()))
    }

    fn delete_message(&mut self, uid: u32) -> Result<()> {
        let folder = self.selected()?.to_owned();

        self.session
            .uid_store(uid.to_string(), "+FLAGS (\\Deleted)")
            .map_err(|err| Error::DeleteMessageError(err, uid, folder.clone()))?;

        self.session
            .expunge()
            .map_err(|err| Error::ExpungeFolderError(err, folder))?;

        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout().map_err(Error::LogoutError)
    }
}
