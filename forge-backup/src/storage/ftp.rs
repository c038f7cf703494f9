//! FTP backend.
//!
//! suppaftp's synchronous client is driven from `spawn_blocking`; every
//! operation opens its own session, logs in, switches to the configured
//! directory and quits when done.

use super::{require, require_restore_target, BackupMethod, StorageBackend};
use crate::config::Settings;
use crate::database::HostPort;
use crate::retention::RemoteEntry;
use crate::utils::errors::{BackupError, Result};
use crate::utils::secret::Secret;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use suppaftp::list;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PORT: u16 = 21;

/// FTP connection parameters.
#[derive(Debug, Clone, Default)]
pub struct FtpConfig {
    /// `host[:port]`
    pub host: String,
    pub user: String,
    pub password: Secret,

    /// Remote working directory; the login directory when unset
    pub dir: Option<String>,
}

impl FtpConfig {
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).unwrap_or_default();

        Self {
            host: var("BACKUP_FTP_HOST"),
            user: var("BACKUP_FTP_USER"),
            password: Secret::new(var("BACKUP_FTP_PASSWORD")),
            dir: Some(var("BACKUP_FTP_DIR")).filter(|d| !d.trim().is_empty()),
        }
    }

    fn address(&self) -> String {
        with_default_port(&self.host)
    }
}

/// `host:port`, filling in port 21 when the port is missing or empty.
fn with_default_port(host: &str) -> String {
    let parsed = HostPort::parse(host.trim());
    let port = parsed.port.unwrap_or_else(|| DEFAULT_PORT.to_string());
    format!("{}:{}", parsed.host, port)
}

pub struct FtpBackend {
    config: FtpConfig,
}

impl FtpBackend {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    /// Run `op` inside one logged-in session on the blocking pool.
    async fn session<T, F>(&self, action: String, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T> + Send + 'static,
    {
        self.validate_config()?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let mut ftp = connect(&config)?;
            let result = op(&mut ftp);
            if let Err(e) = ftp.quit() {
                debug!("FTP quit failed after {}: {}", action, e);
            }
            result
        })
        .await
        .map_err(|e| BackupError::TransferFailed(format!("FTP task failed: {}", e)))?
    }
}

fn connect(config: &FtpConfig) -> Result<FtpStream> {
    let address = config.address();
    let socket = address
        .to_socket_addrs()
        .map_err(|e| transfer_failed(&format!("resolve {}", address), e))?
        .next()
        .ok_or_else(|| BackupError::TransferFailed(format!("no address found for {}", address)))?;

    debug!("Connecting to FTP server {}", address);
    let mut ftp = FtpStream::connect_timeout(socket, CONNECT_TIMEOUT)
        .map_err(|e| transfer_failed(&format!("connect {}", address), e))?;

    ftp.login(config.user.as_str(), config.password.expose())
        .map_err(|e| transfer_failed("login", e))?;
    ftp.transfer_type(FileType::Binary)
        .map_err(|e| transfer_failed("set binary mode", e))?;

    if let Some(dir) = &config.dir {
        ftp.cwd(dir).map_err(|e| transfer_failed(&format!("change directory to {}", dir), e))?;
    }

    Ok(ftp)
}

fn transfer_failed(action: &str, e: impl std::fmt::Display) -> BackupError {
    BackupError::TransferFailed(format!("{}: {}", action, e))
}

fn is_file_unavailable(e: &FtpError) -> bool {
    matches!(e, FtpError::UnexpectedResponse(response) if response.status == Status::FileUnavailable)
}

/// Plain files from an `MLSD` reply whose name starts with `prefix`.
///
/// MLSD carries second-resolution UTC timestamps, so it is preferred over
/// `LIST`.
fn parse_mlsd(lines: &[String], prefix: &str) -> Vec<RemoteEntry> {
    collect_entries(lines, prefix, list::File::from_mlsx_line)
}

/// Plain files from a `LIST` reply whose name starts with `prefix`.
///
/// Timestamps are only as precise as the server's listing format (minutes
/// at best).
fn parse_listing(lines: &[String], prefix: &str) -> Vec<RemoteEntry> {
    collect_entries(lines, prefix, |line| line.parse::<list::File>())
}

fn collect_entries<E, P>(lines: &[String], prefix: &str, parse: P) -> Vec<RemoteEntry>
where
    E: std::fmt::Display,
    P: Fn(&str) -> std::result::Result<list::File, E>,
{
    lines
        .iter()
        .filter_map(|line| match parse(line) {
            Ok(file) => Some(file),
            Err(e) => {
                debug!("Skipping unparsable listing line {:?}: {}", line, e);
                None
            }
        })
        .filter(|file| file.is_file() && file.name().starts_with(prefix))
        .map(|file| RemoteEntry::new(file.name(), DateTime::<Utc>::from(file.modified())))
        .collect()
}

/// Stream a RETR reply into `local`. The file is only created once the
/// server has accepted the transfer.
fn write_retrieved(local: &Path, reader: &mut dyn Read) -> std::result::Result<u64, FtpError> {
    let mut out = File::create(local).map_err(FtpError::ConnectionError)?;
    io::copy(reader, &mut out).map_err(FtpError::ConnectionError)
}

#[async_trait]
impl StorageBackend for FtpBackend {
    fn method(&self) -> BackupMethod {
        BackupMethod::FileTransfer
    }

    fn validate_config(&self) -> Result<()> {
        require(&self.config.host, "BACKUP_FTP_HOST")?;
        require(&self.config.user, "BACKUP_FTP_USER")?;
        require(self.config.password.expose(), "BACKUP_FTP_PASSWORD")
    }

    async fn upload(&self, settings: &Settings) -> Result<()> {
        let local = settings.backup_archive.clone();
        let remote = settings.archive_identifier.clone();
        info!("Uploading {} to ftp://{}/{}", local.display(), self.config.host, remote);

        let bytes = self
            .session(format!("upload {}", remote), move |ftp| {
                let mut file = File::open(&local)?;
                ftp.put_file(&remote, &mut file)
                    .map_err(|e| transfer_failed(&format!("store {}", remote), e))
            })
            .await?;

        info!("Upload complete: {} bytes", bytes);
        Ok(())
    }

    async fn download(&self, settings: &Settings) -> Result<()> {
        self.validate_config()?;
        let remote = require_restore_target(settings)?.to_string();
        let local = settings.restore_archive.clone();
        info!("Downloading ftp://{}/{} to {}", self.config.host, remote, local.display());

        let bytes = self
            .session(format!("download {}", remote), move |ftp| {
                ftp.retr(&remote, |reader| write_retrieved(&local, reader))
                    .map_err(|e| {
                        if is_file_unavailable(&e) {
                            BackupError::ObjectNotFound(remote.clone())
                        } else {
                            transfer_failed(&format!("retrieve {}", remote), e)
                        }
                    })
            })
            .await?;

        info!("Download complete: {} bytes", bytes);
        Ok(())
    }

    async fn list_archives(&self, prefix: &str) -> Result<Vec<RemoteEntry>> {
        let prefix = prefix.to_string();

        self.session("list".to_string(), move |ftp| {
            let entries = match ftp.mlsd(None) {
                Ok(lines) => parse_mlsd(&lines, &prefix),
                Err(e) => {
                    debug!("MLSD unavailable ({}), falling back to LIST", e);
                    let lines = ftp.list(None).map_err(|e| transfer_failed("list", e))?;
                    parse_listing(&lines, &prefix)
                }
            };
            debug!("Listed {} archives under prefix {:?}", entries.len(), prefix);
            Ok(entries)
        })
        .await
    }

    async fn delete_archive(&self, name: &str) -> Result<()> {
        let name = name.to_string();

        self.session(format!("delete {}", name), move |ftp| {
            ftp.rm(&name).map_err(|e| {
                if is_file_unavailable(&e) {
                    warn!("Archive already gone: {}", name);
                }
                transfer_failed(&format!("delete {}", name), e)
            })
        })
        .await
    }
}
