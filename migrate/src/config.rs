//! Module dedicated to the migration configuration.
//!
//! The configuration is read from a TOML file once, at startup, and
//! stays the same for the whole run.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    marker::PhantomData,
    path::{Path, PathBuf},
    result,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// The migration configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrateConfig {
    /// The path to the ledger database.
    ///
    /// Defaults to the configuration file path followed by
    /// `.sqlite`. Relative paths are resolved against the directory
    /// of the configuration file.
    #[serde(default)]
    pub ledger: Option<PathBuf>,

    /// The account messages are copied from.
    pub source: SourceConfig,

    /// The account messages are copied to.
    pub target: TargetConfig,
}

impl MigrateConfig {
    /// Reads and parses the configuration file at the given path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading configuration file at {path:?}");

        let content =
            fs::read_to_string(path).map_err(|err| Error::ReadConfigError(err, path.to_owned()))?;

        toml::from_str(&content).map_err(|err| Error::ParseConfigError(err, path.to_owned()))
    }

    /// Finds the ledger path, given the path of the configuration
    /// file it has been read from.
    pub fn ledger_path(&self, config_path: impl AsRef<Path>) -> PathBuf {
        let config_path = config_path.as_ref();

        match &self.ledger {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => match config_path.parent() {
                Some(dir) => dir.join(path),
                None => path.clone(),
            },
            None => {
                let mut path = config_path.as_os_str().to_owned();
                path.push(".sqlite");
                PathBuf::from(path)
            }
        }
    }
}

/// The connection parameters shared by source and target accounts.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImapConfig {
    /// The IMAP server host name.
    pub host: String,

    /// The IMAP server port.
    ///
    /// Defaults to 993 when using SSL/TLS, 143 otherwise.
    #[serde(default)]
    pub port: Option<u16>,

    /// The IMAP encryption protocol to use.
    ///
    /// Accepts either a kind (`tls`, `start-tls`, `none`) or a
    /// boolean, `true` meaning SSL/TLS.
    #[serde(default, deserialize_with = "some_bool_or_kind")]
    pub encryption: Option<ImapEncryptionKind>,

    /// The IMAP server login.
    pub login: String,

    /// The IMAP server password.
    pub password: String,
}

impl ImapConfig {
    pub fn encryption(&self) -> ImapEncryptionKind {
        self.encryption.clone().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.encryption() {
            ImapEncryptionKind::Tls => 993,
            ImapEncryptionKind::StartTls | ImapEncryptionKind::None => 143,
        })
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImapEncryptionKind {
    #[default]
    #[serde(alias = "ssl")]
    Tls,
    #[serde(alias = "starttls")]
    StartTls,
    None,
}

impl fmt::Display for ImapEncryptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls => write!(f, "SSL/TLS"),
            Self::StartTls => write!(f, "StartTLS"),
            Self::None => write!(f, "None"),
        }
    }
}

impl From<bool> for ImapEncryptionKind {
    fn from(value: bool) -> Self {
        if value {
            Self::Tls
        } else {
            Self::None
        }
    }
}

/// The source account configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    #[serde(flatten)]
    pub imap: ImapConfig,

    /// Folders that are never migrated.
    ///
    /// Names must match exactly, no pattern is supported.
    #[serde(default)]
    pub ignore_folders: BTreeSet<String>,

    /// Source folders migrated to an explicit target folder instead
    /// of a folder of the same name.
    #[serde(default)]
    pub folder_mapping: BTreeMap<String, String>,
}

/// The target account configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetConfig {
    #[serde(flatten)]
    pub imap: ImapConfig,

    /// The folder all migrated folders are nested under.
    ///
    /// An empty root folder means no nesting at all.
    #[serde(default)]
    pub root_folder: String,
}

fn some_bool_or_kind<'de, D>(
    deserializer: D,
) -> result::Result<Option<ImapEncryptionKind>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct SomeBoolOrKind(PhantomData<fn() -> Option<ImapEncryptionKind>>);

    impl<'de> serde::de::Visitor<'de> for SomeBoolOrKind {
        type Value = Option<ImapEncryptionKind>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("some or none")
        }

        fn visit_none<E>(self) -> result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> result::Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            struct BoolOrKind(PhantomData<fn() -> ImapEncryptionKind>);

            impl<'de> serde::de::Visitor<'de> for BoolOrKind {
                type Value = ImapEncryptionKind;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str("boolean or string")
                }

                fn visit_bool<E>(self, v: bool) -> result::Result<Self::Value, E>
                where
                    E: serde::de::Error,
                {
                    Ok(v.into())
                }

                fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
                where
                    E: serde::de::Error,
                {
                    Deserialize::deserialize(serde::de::value::StrDeserializer::new(v))
                }
            }

            deserializer
                .deserialize_any(BoolOrKind(PhantomData))
                .map(Option::Some)
        }
    }

    deserializer.deserialize_option(SomeBoolOrKind(PhantomData))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{ImapEncryptionKind, MigrateConfig};

    const CONFIG: &str = r#"
        [source]
        host = "example.com"
        login = "user"
        password = "password"
        encryption = true
        ignore-folders = ["[Gmail]", "[Gmail]/Trash"]

        [source.folder-mapping]
        "INBOX.Urgent" = "[Gmail]/Important"

        [target]
        host = "imap.gmail.com"
        port = 1993
        login = "user@gmail.com"
        password = "password"
        encryption = "start-tls"
        root-folder = "example-com-archive"
    "#;

    #[test]
    fn parse_full_config() {
        let config: MigrateConfig = toml::from_str(CONFIG).unwrap();

        assert_eq!(config.source.imap.host, "example.com");
        assert_eq!(config.source.imap.encryption(), ImapEncryptionKind::Tls);
        assert_eq!(config.source.imap.port(), 993);
        assert!(config.source.ignore_folders.contains("[Gmail]/Trash"));
        assert_eq!(
            config.source.folder_mapping.get("INBOX.Urgent").map(String::as_str),
            Some("[Gmail]/Important"),
        );

        assert_eq!(config.target.imap.port(), 1993);
        assert_eq!(config.target.imap.encryption(), ImapEncryptionKind::StartTls);
        assert_eq!(config.target.root_folder, "example-com-archive");
        assert_eq!(config.ledger, None);
    }

    #[test]
    fn parse_minimal_config() {
        let config: MigrateConfig = toml::from_str(
            r#"
            [source]
            host = "localhost"
            login = "alice"
            password = "password"
            encryption = false

            [target]
            host = "localhost"
            login = "bob"
            password = "password"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.imap.encryption(), ImapEncryptionKind::None);
        assert_eq!(config.source.imap.port(), 143);
        assert!(config.source.ignore_folders.is_empty());
        assert!(config.source.folder_mapping.is_empty());

        assert_eq!(config.target.imap.login, "bob");
        assert_eq!(config.target.imap.encryption(), ImapEncryptionKind::Tls);
        assert_eq!(config.target.root_folder, "");
    }

    #[test]
    fn ledger_path() {
        let mut config = MigrateConfig::default();
        let config_path = Path::new("/etc/migrate/config.toml");

        assert_eq!(
            config.ledger_path(config_path),
            PathBuf::from("/etc/migrate/config.toml.sqlite"),
        );

        config.ledger = Some(PathBuf::from("seen.sqlite"));
        assert_eq!(
            config.ledger_path(config_path),
            PathBuf::from("/etc/migrate/seen.sqlite"),
        );

        config.ledger = Some(PathBuf::from("/var/lib/seen.sqlite"));
        assert_eq!(
            config.ledger_path(config_path),
            PathBuf::from("/var/lib/seen.sqlite"),
        );
    }
}
