//! SSH target normalization and reachability probing.
//!
//! The registry stores bare SSH targets (`user@host [options]`). This
//! module validates targets on the way in, renders full connection
//! commands on the way out, and runs a bounded-timeout probe when a
//! caller asks for one. Nothing here ever opens an interactive session.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Time budget for the reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalize a raw SSH target.
///
/// Strips a leading `ssh ` (users paste whole commands), collapses
/// whitespace, and requires the first token to look like `user@host`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidSshTarget`] for empty targets or a
/// first token without `user@host` form.
pub fn normalize_target(raw: &str) -> RegistryResult<String> {
    let mut target = raw.trim();
    if let Some(rest) = target.strip_prefix("ssh ") {
        target = rest.trim();
    } else if target.eq_ignore_ascii_case("ssh") {
        target = "";
    }

    if target.is_empty() {
        return Err(RegistryError::invalid_ssh_target("target is empty"));
    }

    let tokens: Vec<&str> = target.split_whitespace().collect();
    let head = tokens[0];
    let valid_head = head
        .split_once('@')
        .is_some_and(|(user, host)| !user.is_empty() && !host.is_empty());
    if !valid_head {
        return Err(RegistryError::invalid_ssh_target(format!(
            "expected user@host, got '{head}'"
        )));
    }

    Ok(tokens.join(" "))
}

/// Render the full connection command for a stored target.
///
/// This only constructs the string; launching the session is the
/// caller's business.
#[must_use]
pub fn connection_command(target: &str) -> String {
    format!("ssh {target}")
}

/// Probe whether the target answers over SSH within [`PROBE_TIMEOUT`].
///
/// Runs `ssh -o BatchMode=yes -o ConnectTimeout=<secs> <target> hostname`
/// under an outer timeout. Any failure — launch error, non-zero exit,
/// deadline — reads as unreachable; the caller decides whether that is
/// fatal.
pub async fn probe(target: &str) -> bool {
    let connect_timeout = PROBE_TIMEOUT.as_secs().to_string();
    let mut command = Command::new("ssh");
    command
        .arg("-o")
        .arg("BatchMode=yes")
        .arg("-o")
        .arg(format!("ConnectTimeout={connect_timeout}"));
    for token in target.split_whitespace() {
        command.arg(token);
    }
    command
        .arg("hostname")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let outcome = tokio::time::timeout(PROBE_TIMEOUT * 2, command.output()).await;
    match outcome {
        Ok(Ok(output)) => {
            debug!(target, success = output.status.success(), "ssh probe finished");
            output.status.success()
        }
        Ok(Err(err)) => {
            debug!(target, error = %err, "ssh probe could not launch");
            false
        }
        Err(_) => {
            debug!(target, "ssh probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ssh_prefix() {
        assert_eq!(
            normalize_target("ssh root@pod.example.net").expect("ok"),
            "root@pod.example.net"
        );
    }

    #[test]
    fn keeps_options_after_host() {
        assert_eq!(
            normalize_target("  ssh root@pod.example.net  -p 2222 ").expect("ok"),
            "root@pod.example.net -p 2222"
        );
    }

    #[test]
    fn accepts_bare_target() {
        assert_eq!(
            normalize_target("ubuntu@10.0.0.5").expect("ok"),
            "ubuntu@10.0.0.5"
        );
    }

    #[test]
    fn rejects_missing_user() {
        assert!(normalize_target("pod.example.net").is_err());
        assert!(normalize_target("@host").is_err());
        assert!(normalize_target("user@").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(normalize_target("").is_err());
        assert!(normalize_target("ssh").is_err());
        assert!(normalize_target("ssh   ").is_err());
    }

    #[test]
    fn connection_command_prefixes_ssh() {
        assert_eq!(
            connection_command("root@pod.example.net -p 2222"),
            "ssh root@pod.example.net -p 2222"
        );
    }
}
