//! Source descriptor read from the forge's `app.ini`.
//!
//! Only the handful of keys the engine needs are extracted: database
//! connection parameters and the on-disk roots of repositories and avatars.

use crate::utils::errors::{BackupError, Result};
use crate::utils::secret::Secret;
use ini::{Ini, ParseOption};
use std::path::{Path, PathBuf};

/// Connection parameters of the forge's database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSource {
    /// Raw `DB_TYPE` value, lower-cased; validated when an adapter is selected
    pub kind: String,

    /// `host[:port]`, or a socket directory for local PostgreSQL
    pub host: String,

    /// Logical database name
    pub name: String,

    pub user: String,
    pub password: Secret,

    /// Database file for the embedded kind
    pub path: String,
}

/// A forge directory tree copied into a fixed staging subdirectory.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTree {
    /// Subdirectory name inside the staging tree
    pub staging_name: &'static str,

    /// Live location on the forge host
    pub root: PathBuf,
}

/// Everything the engine needs to know about the installation being protected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDescriptor {
    pub database: DatabaseSource,
    pub repository_root: Option<PathBuf>,
    pub avatar_upload_path: Option<PathBuf>,
    pub repository_avatar_upload_path: Option<PathBuf>,
}

impl SourceDescriptor {
    /// Parse a forge `app.ini` file.
    pub fn from_app_ini(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file_opt(path, parse_option()).map_err(|e| {
            BackupError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::from_ini(&ini))
    }

    /// Parse `app.ini` content already held in memory.
    pub fn from_app_ini_str(content: &str) -> Result<Self> {
        let ini = Ini::load_from_str_opt(content, parse_option())
            .map_err(|e| BackupError::Configuration(format!("failed to parse app.ini: {}", e)))?;
        Ok(Self::from_ini(&ini))
    }

    fn from_ini(ini: &Ini) -> Self {
        let get = |section: &str, key: &str| lookup(ini, section, key).unwrap_or_default();

        Self {
            database: DatabaseSource {
                kind: get("database", "DB_TYPE").to_lowercase(),
                host: get("database", "HOST"),
                name: get("database", "NAME"),
                user: get("database", "USER"),
                password: Secret::new(get("database", "PASSWD")),
                path: get("database", "PATH"),
            },
            repository_root: non_empty_path(get("repository", "ROOT")),
            avatar_upload_path: non_empty_path(get("picture", "AVATAR_UPLOAD_PATH")),
            repository_avatar_upload_path: non_empty_path(get(
                "picture",
                "REPOSITORY_AVATAR_UPLOAD_PATH",
            )),
        }
    }

    /// Configured file trees paired with their staging subdirectory names.
    pub fn file_trees(&self) -> Vec<FileTree> {
        [
            ("repo", &self.repository_root),
            ("avatars", &self.avatar_upload_path),
            ("repo-avatars", &self.repository_avatar_upload_path),
        ]
        .into_iter()
        .filter_map(|(staging_name, root)| {
            root.as_ref().map(|root| FileTree {
                staging_name,
                root: root.clone(),
            })
        })
        .collect()
    }
}

fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: true,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

/// Case-insensitive section/key lookup; the first match wins.
fn lookup(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.iter()
        .filter(|(name, _)| name.is_some_and(|n| n.trim().eq_ignore_ascii_case(section)))
        .flat_map(|(_, props)| props.iter())
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().to_string())
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_INI: &str = r#"
APP_NAME = Gitea: Git with a cup of tea
RUN_MODE = prod

[database]
DB_TYPE  = Postgres
HOST     = db:5432
NAME     = gitea
USER     = gitea
PASSWD   = "s3cr3t"

[repository]
ROOT = /data/git/repositories

[picture]
AVATAR_UPLOAD_PATH = /data/gitea/avatars
REPOSITORY_AVATAR_UPLOAD_PATH =
"#;

    #[test]
    fn test_reads_database_section() {
        let source = SourceDescriptor::from_app_ini_str(APP_INI).unwrap();

        assert_eq!(source.database.kind, "postgres");
        assert_eq!(source.database.host, "db:5432");
        assert_eq!(source.database.name, "gitea");
        assert_eq!(source.database.user, "gitea");
        assert_eq!(source.database.password.expose(), "s3cr3t");
        assert_eq!(source.database.path, "");
    }

    #[test]
    fn test_file_trees_skip_unconfigured_roots() {
        let source = SourceDescriptor::from_app_ini_str(APP_INI).unwrap();
        let trees = source.file_trees();

        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].staging_name, "repo");
        assert_eq!(trees[0].root, PathBuf::from("/data/git/repositories"));
        assert_eq!(trees[1].staging_name, "avatars");
    }

    #[test]
    fn test_sections_and_keys_are_case_insensitive() {
        let source = SourceDescriptor::from_app_ini_str("[Database]\ndb_type = sqlite3\npath = /data/gitea.db\n").unwrap();
        assert_eq!(source.database.kind, "sqlite3");
        assert_eq!(source.database.path, "/data/gitea.db");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = SourceDescriptor::from_app_ini(Path::new("/nonexistent/app.ini"));
        assert!(matches!(result, Err(BackupError::Configuration(_))));
    }
}
