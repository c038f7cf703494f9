//! PostgreSQL via `pg_dump` and `psql`.

use super::connection::HostPort;
use super::process::{apply_from_file, dump_to_file, run_best_effort};
use super::{DatabaseAdapter, DatabaseKind};
use crate::config::Settings;
use crate::source::{DatabaseSource, SourceDescriptor};
use crate::utils::errors::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

const DUMP_TOOL: &str = "pg_dump";
const CLIENT_TOOL: &str = "psql";
const PASSWORD_VAR: &str = "PGPASSWORD";

pub struct PostgresAdapter;

impl PostgresAdapter {
    fn connection_args(db: &DatabaseSource) -> Vec<String> {
        let hp = HostPort::parse(&db.host);
        let mut args = vec![hp.host_arg(), format!("--username={}", db.user)];
        args.extend(hp.port_arg());
        args
    }

    fn command(program: &str, db: &DatabaseSource) -> Command {
        let mut command = Command::new(program);
        command
            .args(Self::connection_args(db))
            .env(PASSWORD_VAR, db.password.expose());
        command
    }

    pub(crate) fn dump_command(db: &DatabaseSource) -> Command {
        let mut command = Self::command(DUMP_TOOL, db);
        command.arg(&db.name);
        command
    }

    /// Drops everything owned by the forge user so the dump applies cleanly.
    pub(crate) fn drop_owned_command(db: &DatabaseSource) -> Command {
        let mut command = Self::command(CLIENT_TOOL, db);
        command
            .arg("-c")
            .arg(format!("DROP OWNED BY {}", db.user))
            .arg(&db.name);
        command
    }

    pub(crate) fn restore_command(db: &DatabaseSource) -> Command {
        let mut command = Self::command(CLIENT_TOOL, db);
        command.arg(&db.name);
        command
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    async fn backup(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()> {
        let output = self.backup_dump_path(settings);
        dump_to_file(Self::dump_command(&source.database), DUMP_TOOL, &output).await?;
        info!("PostgreSQL database backup completed");
        Ok(())
    }

    async fn restore(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()> {
        let input = self.restore_dump_path(settings);

        // Fails on a fresh, empty database; that is expected.
        if !run_best_effort(Self::drop_owned_command(&source.database), CLIENT_TOOL).await {
            info!("Skipped dropping existing objects before restore");
        }

        apply_from_file(Self::restore_command(&source.database), CLIENT_TOOL, &input).await?;
        info!("PostgreSQL database restore completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(host: &str) -> DatabaseSource {
        DatabaseSource {
            kind: "postgres".to_string(),
            host: host.to_string(),
            name: "giteadb".to_string(),
            user: "gitea".to_string(),
            password: "hunter2".into(),
            path: String::new(),
        }
    }

    fn args(command: &Command) -> Vec<String> {
        command.as_std().get_args().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_dump_command_arguments() {
        let command = PostgresAdapter::dump_command(&source("pg:5433"));
        assert_eq!(command.as_std().get_program(), "pg_dump");
        assert_eq!(args(&command), vec!["--host=pg", "--username=gitea", "--port=5433", "giteadb"]);
    }

    #[test]
    fn test_drop_owned_command_arguments() {
        let command = PostgresAdapter::drop_owned_command(&source("pg"));
        assert_eq!(command.as_std().get_program(), "psql");
        assert_eq!(
            args(&command),
            vec!["--host=pg", "--username=gitea", "-c", "DROP OWNED BY gitea", "giteadb"]
        );
    }

    #[test]
    fn test_restore_command_carries_password_in_env_only() {
        let command = PostgresAdapter::restore_command(&source("pg"));
        assert_eq!(args(&command), vec!["--host=pg", "--username=gitea", "giteadb"]);
        assert!(command
            .as_std()
            .get_envs()
            .any(|(k, v)| k == PASSWORD_VAR && v == Some(std::ffi::OsStr::new("hunter2"))));
    }
}
