//! Running native dump/restore tools as child processes.
//!
//! Credentials are attached to the child's environment only
//! (`Command::env`), so the engine's own environment never holds them.

use crate::utils::errors::{BackupError, Result};
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `command` with stdout redirected into `output`.
pub(crate) async fn dump_to_file(mut command: Command, tool: &'static str, output: &Path) -> Result<()> {
    let dump_failed = |reason: String| BackupError::DumpFailed { tool, reason };

    let file = File::create(output)
        .map_err(|e| dump_failed(format!("cannot create {}: {}", output.display(), e)))?;

    debug!("Running {}", describe(&command));

    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| dump_failed(format!("failed to start: {}", e)))?;
    let out = child
        .wait_with_output()
        .await
        .map_err(|e| dump_failed(format!("failed to wait: {}", e)))?;

    if !out.status.success() {
        return Err(dump_failed(exit_reason(out.status, &out.stderr)));
    }

    Ok(())
}

/// Run `command` with stdin fed from `input`.
pub(crate) async fn apply_from_file(mut command: Command, tool: &'static str, input: &Path) -> Result<()> {
    let apply_failed = |reason: String| BackupError::RestoreApplyFailed { tool, reason };

    let file = File::open(input).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => BackupError::SourceNotFound(format!("dump file {}", input.display())),
        _ => apply_failed(format!("cannot open {}: {}", input.display(), e)),
    })?;

    debug!("Running {}", describe(&command));

    let child = command
        .stdin(Stdio::from(file))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| apply_failed(format!("failed to start: {}", e)))?;
    let out = child
        .wait_with_output()
        .await
        .map_err(|e| apply_failed(format!("failed to wait: {}", e)))?;

    if !out.status.success() {
        return Err(apply_failed(exit_reason(out.status, &out.stderr)));
    }

    Ok(())
}

/// Run `command` and report whether it succeeded; failures are only logged.
pub(crate) async fn run_best_effort(mut command: Command, tool: &'static str) -> bool {
    debug!("Running {}", describe(&command));

    let child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!("{} could not be started (ignored): {}", tool, e);
            return false;
        }
    };

    match child.wait_with_output().await {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            warn!("{} exited unsuccessfully (ignored): {}", tool, exit_reason(out.status, &out.stderr));
            false
        }
        Err(e) => {
            warn!("{} did not finish (ignored): {}", tool, e);
            false
        }
    }
}

/// Program and arguments for logging; environment values are never included.
fn describe(command: &Command) -> String {
    let std = command.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().to_string()];
    parts.extend(std.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

fn exit_reason(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{}", status)
    } else {
        format!("{}: {}", status, stderr)
    }
}
