//! MySQL / MariaDB via `mysqldump` and `mysql`.

use super::connection::HostPort;
use super::process::{apply_from_file, dump_to_file};
use super::{DatabaseAdapter, DatabaseKind};
use crate::config::Settings;
use crate::source::{DatabaseSource, SourceDescriptor};
use crate::utils::errors::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

const DUMP_TOOL: &str = "mysqldump";
const CLIENT_TOOL: &str = "mysql";
const PASSWORD_VAR: &str = "MYSQL_PWD";

pub struct MysqlAdapter;

impl MysqlAdapter {
    fn connection_args(db: &DatabaseSource) -> Vec<String> {
        let hp = HostPort::parse(&db.host);
        let mut args = vec![hp.host_arg()];
        args.extend(hp.port_arg());
        args.push(format!("--user={}", db.user));
        args
    }

    pub(crate) fn dump_command(db: &DatabaseSource) -> Command {
        let mut command = Command::new(DUMP_TOOL);
        command
            .args(["--column-statistics=0", "--no-tablespaces"])
            .args(Self::connection_args(db))
            .arg(&db.name)
            .env(PASSWORD_VAR, db.password.expose());
        command
    }

    pub(crate) fn restore_command(db: &DatabaseSource) -> Command {
        let mut command = Command::new(CLIENT_TOOL);
        command
            .args(Self::connection_args(db))
            .arg(&db.name)
            .env(PASSWORD_VAR, db.password.expose());
        command
    }
}

#[async_trait]
impl DatabaseAdapter for MysqlAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Mysql
    }

    async fn backup(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()> {
        let output = self.backup_dump_path(settings);
        dump_to_file(Self::dump_command(&source.database), DUMP_TOOL, &output).await?;
        info!("MySQL database backup completed");
        Ok(())
    }

    async fn restore(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()> {
        let input = self.restore_dump_path(settings);
        apply_from_file(Self::restore_command(&source.database), CLIENT_TOOL, &input).await?;
        info!("MySQL database restore completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn source(host: &str) -> DatabaseSource {
        DatabaseSource {
            kind: "mysql".to_string(),
            host: host.to_string(),
            name: "gitea".to_string(),
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
        let command = MysqlAdapter::dump_command(&source("db:3307"));
        assert_eq!(command.as_std().get_program(), "mysqldump");
        assert_eq!(
            args(&command),
            vec!["--column-statistics=0", "--no-tablespaces", "--host=db", "--port=3307", "--user=gitea", "gitea"]
        );
    }

    #[test]
    fn test_restore_command_omits_default_port() {
        let command = MysqlAdapter::restore_command(&source("db"));
        assert_eq!(args(&command), vec!["--host=db", "--user=gitea", "gitea"]);
    }

    #[test]
    fn test_password_only_in_child_environment() {
        let command = MysqlAdapter::dump_command(&source("db"));
        let envs: Vec<_> = command.as_std().get_envs().collect();
        assert_eq!(envs, vec![(OsStr::new(PASSWORD_VAR), Some(OsStr::new("hunter2")))]);
        assert!(!args(&command).iter().any(|a| a.contains("hunter2")));
    }
}
