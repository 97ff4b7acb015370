//! Module dedicated to the target account.
//!
//! The target account is the one messages are written to. Source
//! folder names are translated into target folder names here: the
//! optional root folder is prepended and source separators are
//! replaced by target ones.

use std::fmt;

use tracing::{debug, info};

use crate::{
    config::TargetConfig,
    session::{ImapSession, MailSession, Message},
    source::DEFAULT_FOLDER_SEPARATOR,
    Result,
};

/// The target account.
pub struct TargetAccount<S: MailSession = ImapSession> {
    config: TargetConfig,
    session: S,
    source_separator: String,
    target_separator: String,
}

impl TargetAccount<ImapSession> {
    /// Connects to the target account, see [`TargetAccount::new`].
    pub fn connect(config: TargetConfig, source_separator: impl ToString) -> Result<Self> {
        info!("connecting to target account {}", config.imap.host);
        let session = ImapSession::connect(&config.imap)?;
        Self::new(session, config, source_separator)
    }
}

impl<S: MailSession> TargetAccount<S> {
    /// Builds the target account from the given session.
    ///
    /// The root folder is created if it does not exist yet.
    pub fn new(mut session: S, config: TargetConfig, source_separator: impl ToString) -> Result<Self> {
        let target_separator = session
            .folder_separator()?
            .unwrap_or_else(|| DEFAULT_FOLDER_SEPARATOR.to_owned());

        let root = config.root_folder.as_str();
        if !root.is_empty() && !session.folder_exists(root)? {
            info!("creating root folder {root}");
            session.create_folder(root)?;
        }

        Ok(Self {
            config,
            session,
            source_separator: source_separator.to_string(),
            target_separator,
        })
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn folder_separator(&self) -> &str {
        &self.target_separator
    }

    /// Lists the folders of the account, sorted alphabetically.
    pub fn list_folders(&mut self) -> Result<Vec<String>> {
        let mut folders = self.session.list_folders()?;
        folders.sort();
        folders.dedup();
        Ok(folders)
    }

    /// Translates the given source folder name into its target
    /// folder name.
    ///
    /// Without root folder, the name is kept as it is.
    pub fn resolve_folder(&self, folder: &str) -> String {
        let root = self.config.root_folder.as_str();

        if root.is_empty() {
            return folder.to_owned();
        }

        let folder = if self.source_separator != self.target_separator {
            folder.replace(&self.source_separator, &self.target_separator)
        } else {
            folder.to_owned()
        };

        format!("{root}{}{folder}", self.target_separator)
    }

    /// Creates the target folder matching the given source folder
    /// name if it does not exist yet, then returns its name.
    pub fn create_folder(&mut self, folder: &str) -> Result<String> {
        let folder = self.resolve_folder(folder);

        if self.session.folder_exists(&folder)? {
            debug!("target folder {folder} already exists");
        } else {
            info!("creating target folder {folder}");
            self.session.create_folder(&folder)?;
        }

        Ok(folder)
    }

    /// Appends the given message to the given target folder, keeping
    /// its flags and its internal date.
    pub fn append(&mut self, folder: &str, message: &Message) -> Result<()> {
        debug!(
            "appending message of {} bytes with flags {:?} to {folder}",
            message.size, message.flags
        );
        self.session.append_message(folder, message)
    }

    pub fn logout(&mut self) -> Result<()> {
        debug!("logging out from target account");
        self.session.logout()
    }
}

impl<S: MailSession> fmt::Display for TargetAccount<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<user: {} | host: {} | root folder: {}>",
            self.config.imap.login, self.config.imap.host, self.config.root_folder
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{ImapConfig, TargetConfig},
        session::{FolderInfo, MailSession, Message},
        Result,
    };

    use super::TargetAccount;

    /// Session that only keeps track of folders.
    #[derive(Default)]
    struct Folders {
        separator: Option<String>,
        folders: Vec<String>,
        created: Vec<String>,
    }

    impl MailSession for Folders {
        fn folder_separator(&mut self) -> Result<Option<String>> {
            Ok(self.separator.clone())
        }
        fn list_folders(&mut self) -> Result<Vec<String>> {
            Ok(self.folders.clone())
        }
        fn folder_exists(&mut self, folder: &str) -> Result<bool> {
            Ok(self.folders.iter().any(|f| f == folder))
        }
        fn create_folder(&mut self, folder: &str) -> Result<()> {
            self.folders.push(folder.to_owned());
            self.created.push(folder.to_owned());
            Ok(())
        }
        fn select_folder(&mut self, _: &str) -> Result<FolderInfo> {
            unreachable!()
        }
        fn search_undeleted(&mut self) -> Result<Vec<u32>> {
            unreachable!()
        }
        fn fetch_message(&mut self, _: u32) -> Result<Option<Message>> {
            unreachable!()
        }
        fn append_message(&mut self, _: &str, _: &Message) -> Result<()> {
            Ok(())
        }
        fn delete_message(&mut self, _: u32) -> Result<()> {
            unreachable!()
        }
        fn logout(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn config(root: &str) -> TargetConfig {
        TargetConfig {
            imap: ImapConfig {
                host: "imap.gmail.com".into(),
                login: "user@gmail.com".into(),
                ..Default::default()
            },
            root_folder: root.to_owned(),
        }
    }

    fn target(root: &str, source_sep: &str, target_sep: &str) -> TargetAccount<Folders> {
        let session = Folders {
            separator: Some(target_sep.to_owned()),
            ..Default::default()
        };
        TargetAccount::new(session, config(root), source_sep).unwrap()
    }

    #[test]
    fn root_folder_created_once() {
        let target = target("archive", ".", "/");
        assert_eq!(target.session.created, vec!["archive"]);

        let session = Folders {
            folders: vec!["archive".into()],
            ..Default::default()
        };
        let target = TargetAccount::new(session, config("archive"), "/").unwrap();
        assert!(target.session.created.is_empty());
    }

    #[test]
    fn empty_root_folder_not_created() {
        let target = target("", ".", "/");
        assert!(target.session.created.is_empty());
    }

    #[test]
    fn resolve_folder_translates_separators() {
        let target = target("archive", ".", "/");
        assert_eq!(target.resolve_folder("INBOX.Urgent"), "archive/INBOX/Urgent");
        assert_eq!(target.resolve_folder("INBOX"), "archive/INBOX");
        assert_eq!(
            target.resolve_folder("[Gmail]/Important"),
            "archive/[Gmail]/Important"
        );
    }

    #[test]
    fn resolve_folder_same_separators() {
        let target = target("archive", "/", "/");
        assert_eq!(target.resolve_folder("a/b.c"), "archive/a/b.c");
    }

    #[test]
    fn resolve_folder_without_root() {
        let target = target("", ".", "/");
        assert_eq!(target.resolve_folder("INBOX.Urgent"), "INBOX.Urgent");
    }

    #[test]
    fn missing_target_separator_defaults_to_slash() {
        let session = Folders::default();
        let target = TargetAccount::new(session, config("archive"), ".").unwrap();
        assert_eq!(target.folder_separator(), "/");
        assert_eq!(target.resolve_folder("INBOX.Sent"), "archive/INBOX/Sent");
    }

    #[test]
    fn create_folder_is_idempotent() {
        let mut target = target("archive", ".", "/");

        assert_eq!(target.create_folder("INBOX.Urgent").unwrap(), "archive/INBOX/Urgent");
        assert_eq!(target.create_folder("INBOX.Urgent").unwrap(), "archive/INBOX/Urgent");

        assert_eq!(target.session.created, vec!["archive", "archive/INBOX/Urgent"]);
    }

    #[test]
    fn display() {
        assert_eq!(
            target("archive", "/", "/").to_string(),
            "<user: user@gmail.com | host: imap.gmail.com | root folder: archive>",
        );
    }
}
