//! Thin async runner over the `git` binary.
//!
//! Every invocation:
//! - runs with `GIT_TERMINAL_PROMPT=0` so a missing credential fails fast
//! - runs with `LC_ALL=C` so stderr can be matched
//! - captures stdout/stderr instead of inheriting the terminal
//! - has every configured secret replaced with `***` before it reaches an
//!   error or a log line

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use confsync_core::CommitIdentity;

use crate::error::GitError;

const REDACTED: &str = "***";

/// Remote URL carrying `token` for https remotes. Other schemes (and
/// a missing token) return `url` unchanged.
pub fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (token, url.strip_prefix("https://")) {
        (Some(token), Some(rest)) if !token.is_empty() => {
            // Drop credentials already present in the URL.
            let host_and_path = rest.split_once('@').map_or(rest, |(_, after)| after);
            format!("https://x-access-token:{token}@{host_and_path}")
        }
        _ => url.to_string(),
    }
}

/// Replace every non-empty secret in `text` with `***`.
pub fn redact(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, s| acc.replace(s.as_str(), REDACTED))
}

/// `git remote remove` on a remote that does not exist.
pub fn is_missing_remote(err: &GitError) -> bool {
    match err {
        GitError::Failed { stderr, .. } => stderr.to_ascii_lowercase().contains("no such remote"),
        _ => false,
    }
}

/// Git command builder bound to an optional working directory.
#[derive(Debug, Clone, Default)]
pub struct Git {
    dir: Option<PathBuf>,
    identity: Option<CommitIdentity>,
    secrets: Vec<String>,
}

impl Git {
    /// Runs in the process working directory (clone, ls-remote).
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs inside `dir`.
    pub fn at(dir: &Path) -> Self {
        Self {
            dir: Some(dir.to_path_buf()),
            ..Self::default()
        }
    }

    /// Pass `user.name` / `user.email` per invocation.
    pub fn with_identity(mut self, identity: &CommitIdentity) -> Self {
        self.identity = Some(identity.clone());
        self
    }

    /// Redact `secret` from arguments and output.
    pub fn redacting(mut self, secret: Option<&str>) -> Self {
        if let Some(s) = secret.filter(|s| !s.is_empty()) {
            self.secrets.push(s.to_string());
        }
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        if let Some(id) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", id.name))
                .arg("-c")
                .arg(format!("user.email={}", id.email));
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn display_args(&self, args: &[&str]) -> String {
        redact(&args.join(" "), &self.secrets)
    }

    /// Run and return the exit code plus captured output.
    async fn exec(&self, args: &[&str]) -> Result<(i32, String, String), GitError> {
        let shown = self.display_args(args);
        debug!("git {shown}");
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                args: shown.clone(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = redact(
            String::from_utf8_lossy(&output.stderr).trim(),
            &self.secrets,
        );
        // A signal-terminated git has no code; report it as -1.
        Ok((output.status.code().unwrap_or(-1), stdout, stderr))
    }

    /// Run and require success. Returns stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let (code, stdout, stderr) = self.exec(args).await?;
        if code == 0 {
            Ok(stdout)
        } else {
            Err(GitError::Failed {
                args: self.display_args(args),
                code,
                stderr,
            })
        }
    }

    /// Run a yes/no query: exit 0 is `true`, exit 1 is `false`, anything
    /// else is an error.
    pub async fn check(&self, args: &[&str]) -> Result<bool, GitError> {
        let (code, _, stderr) = self.exec(args).await?;
        match code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(GitError::Failed {
                args: self.display_args(args),
                code,
                stderr,
            }),
        }
    }
}
