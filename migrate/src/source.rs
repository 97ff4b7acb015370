//! Module dedicated to the source account.
//!
//! The source account is the one messages are read from. It owns the
//! folder policy: which folders are ignored and which ones are
//! migrated to an explicitly mapped target folder.

use std::fmt;

use tracing::{debug, info};

use crate::{
    config::SourceConfig,
    session::{FolderInfo, ImapSession, MailSession, Message},
    Error, Result,
};

/// Separator assumed when the server does not advertise one.
pub const DEFAULT_FOLDER_SEPARATOR: &str = "/";

/// The source account.
pub struct SourceAccount<S: MailSession = ImapSession> {
    config: SourceConfig,
    session: S,
    selected: Option<String>,
}

impl SourceAccount<ImapSession> {
    /// Connects to the source account.
    pub fn connect(config: SourceConfig) -> Result<Self> {
        info!("connecting to source account {}", config.imap.host);
        let session = ImapSession::connect(&config.imap)?;
        Ok(Self::new(session, config))
    }
}

impl<S: MailSession> SourceAccount<S> {
    pub fn new(session: S, config: SourceConfig) -> Self {
        Self {
            config,
            session,
            selected: None,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Returns the folder hierarchy separator of the account.
    pub fn folder_separator(&mut self) -> Result<String> {
        Ok(self
            .session
            .folder_separator()?
            .unwrap_or_else(|| DEFAULT_FOLDER_SEPARATOR.to_owned()))
    }

    /// Lists the folders of the account, sorted alphabetically.
    pub fn list_folders(&mut self) -> Result<Vec<String>> {
        let mut folders = self.session.list_folders()?;
        folders.sort();
        folders.dedup();
        Ok(folders)
    }

    /// Returns `true` if the given folder is part of the ignored
    /// folders.
    pub fn is_ignored(&self, folder: &str) -> bool {
        self.config.ignore_folders.contains(folder)
    }

    /// Returns the target folder the given folder is explicitly
    /// mapped to, if any.
    ///
    /// `None` means the folder keeps its name on the target account.
    pub fn map_target_folder(&self, folder: &str) -> Option<&str> {
        self.config.folder_mapping.get(folder).map(String::as_str)
    }

    pub fn select_folder(&mut self, folder: &str) -> Result<FolderInfo> {
        debug!("selecting source folder {folder}");
        let info = self.session.select_folder(folder)?;
        self.selected = Some(folder.to_owned());
        Ok(info)
    }

    /// Returns the UIDs of the messages of the selected folder that
    /// are not flagged as deleted, in ascending order.
    pub fn fetch_message_ids(&mut self) -> Result<Vec<u32>> {
        let ids = self.session.search_undeleted()?;
        debug!("found {} undeleted messages", ids.len());
        Ok(ids)
    }

    /// Fetches content, flags, size and internal date of the message
    /// matching the given UID.
    ///
    /// Fails with [`Error::MessageVanishedError`] if the message
    /// disappeared since its UID has been listed.
    pub fn fetch_message(&mut self, id: u32) -> Result<Message> {
        match self.session.fetch_message(id)? {
            Some(message) => Ok(message),
            None => {
                let folder = self.selected.clone().unwrap_or_default();
                Err(Error::MessageVanishedError(id, folder))
            }
        }
    }

    /// Deletes the message matching the given UID, then expunges the
    /// selected folder.
    ///
    /// This cannot be undone.
    pub fn delete_message(&mut self, id: u32) -> Result<()> {
        debug!("deleting source message {id}");
        self.session.delete_message(id)
    }

    pub fn logout(&mut self) -> Result<()> {
        debug!("logging out from source account");
        self.session.logout()
    }
}

impl<S: MailSession> fmt::Display for SourceAccount<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<user: {} | host: {}>",
            self.config.imap.login, self.config.imap.host
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use crate::{
        config::{ImapConfig, SourceConfig},
        session::{FolderInfo, MailSession, Message},
        Result,
    };

    use super::SourceAccount;

    /// Session that knows a fixed list of folders and nothing else.
    struct FoldersOnly(Vec<String>, Option<String>);

    impl MailSession for FoldersOnly {
        fn folder_separator(&mut self) -> Result<Option<String>> {
            Ok(self.1.clone())
        }
        fn list_folders(&mut self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
        fn folder_exists(&mut self, folder: &str) -> Result<bool> {
            Ok(self.0.iter().any(|f| f == folder))
        }
        fn create_folder(&mut self, _: &str) -> Result<()> {
            unreachable!()
        }
        fn select_folder(&mut self, _: &str) -> Result<FolderInfo> {
            Ok(FolderInfo::default())
        }
        fn search_undeleted(&mut self) -> Result<Vec<u32>> {
            Ok(Vec::new())
        }
        fn fetch_message(&mut self, _: u32) -> Result<Option<Message>> {
            Ok(None)
        }
        fn append_message(&mut self, _: &str, _: &Message) -> Result<()> {
            unreachable!()
        }
        fn delete_message(&mut self, _: u32) -> Result<()> {
            unreachable!()
        }
        fn logout(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn source(folders: &[&str], separator: Option<&str>) -> SourceAccount<FoldersOnly> {
        let session = FoldersOnly(
            folders.iter().map(ToString::to_string).collect(),
            separator.map(ToOwned::to_owned),
        );
        let config = SourceConfig {
            imap: ImapConfig {
                host: "example.com".into(),
                login: "user".into(),
                ..Default::default()
            },
            ignore_folders: BTreeSet::from_iter(["[Gmail]".to_owned(), "Trash".to_owned()]),
            folder_mapping: BTreeMap::from_iter([(
                "INBOX.Urgent".to_owned(),
                "[Gmail]/Important".to_owned(),
            )]),
        };
        SourceAccount::new(session, config)
    }

    #[test]
    fn list_folders_sorted() {
        let mut source = source(&["Sent", "INBOX", "Archive", "INBOX.Urgent"], None);
        assert_eq!(
            source.list_folders().unwrap(),
            vec!["Archive", "INBOX", "INBOX.Urgent", "Sent"],
        );
    }

    #[test]
    fn ignored_folders_match_exactly() {
        let source = source(&[], None);
        assert!(source.is_ignored("[Gmail]"));
        assert!(source.is_ignored("Trash"));
        assert!(!source.is_ignored("[Gmail]/Trash"));
        assert!(!source.is_ignored("trash"));
        assert!(!source.is_ignored("INBOX"));
    }

    #[test]
    fn mapped_folders_match_exactly() {
        let source = source(&[], None);
        assert_eq!(
            source.map_target_folder("INBOX.Urgent"),
            Some("[Gmail]/Important"),
        );
        assert_eq!(source.map_target_folder("INBOX"), None);
        assert_eq!(source.map_target_folder("INBOX.Urgent.Old"), None);
    }

    #[test]
    fn folder_separator_defaults_to_slash() {
        assert_eq!(source(&[], Some(".")).folder_separator().unwrap(), ".");
        assert_eq!(source(&[], None).folder_separator().unwrap(), "/");
    }

    #[test]
    fn vanished_message() {
        let mut source = source(&["INBOX"], None);
        source.select_folder("INBOX").unwrap();
        let err = source.fetch_message(3).unwrap_err();
        assert!(err.is_message_vanished());
        assert_eq!(
            err.to_string(),
            "cannot find message 3 in IMAP folder INBOX: message vanished",
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            source(&[], None).to_string(),
            "<user: user | host: example.com>"
        );
    }
}
