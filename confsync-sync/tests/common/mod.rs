#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use async_trait::async_trait;
use confsync_core::{RepoSlug, Settings, Target, TargetKind};
use confsync_sync::{PublishError, PullRequestPublisher};
use tempfile::TempDir;

/// Run git synchronously and return stdout; panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// A bare remote plus a seed clone used to push new commits into it.
pub struct Remote {
    pub bare: PathBuf,
    pub seed: PathBuf,
    pub branch: String,
}

impl Remote {
    pub fn create(root: &Path, name: &str, branch: &str, files: &[(&str, &str)]) -> Self {
        let bare = root.join(format!("{name}.git"));
        std::fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare", "-q"]);
        git(&bare, &["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")]);

        let seed = root.join(format!("{name}-seed"));
        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init", "-q"]);
        git(&seed, &["checkout", "-q", "-b", branch]);
        git(&seed, &["remote", "add", "origin", &bare.to_string_lossy()]);
        let remote = Self {
            bare,
            seed,
            branch: branch.to_string(),
        };
        remote.commit(files, "initial");
        remote
    }

    /// Commit `files` on the seed and push them to the bare remote.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) {
        for (path, content) in files {
            let full = self.seed.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        git(&self.seed, &["add", "-A"]);
        git(&self.seed, &["commit", "-q", "--allow-empty", "-m", message]);
        git(&self.seed, &["push", "-q", "origin", &self.branch]);
    }

    pub fn url(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    pub fn rev(&self, rev: &str) -> String {
        git(&self.bare, &["rev-parse", rev])
    }

    pub fn branches(&self) -> Vec<String> {
        git(&self.bare, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn show(&self, rev: &str, path: &str) -> String {
        git(&self.bare, &["show", &format!("{rev}:{path}")])
    }

    /// Exact bytes of `path` at `rev`, without trimming.
    pub fn raw(&self, rev: &str, path: &str) -> Vec<u8> {
        let out = Command::new("git")
            .args(["show", &format!("{rev}:{path}")])
            .current_dir(&self.bare)
            .output()
            .expect("spawn git");
        assert!(out.status.success(), "git show {rev}:{path} failed");
        out.stdout
    }

    /// Install a pre-receive hook that declines the next push and accepts
    /// every push after it.
    #[cfg(unix)]
    pub fn reject_next_push(&self) {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.bare.join("hooks").join("pre-receive");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(
            &hook,
            "#!/bin/sh\n\
             if [ ! -f rejected-once ]; then\n\
             \x20 touch rejected-once\n\
             \x20 echo 'push declined' >&2\n\
             \x20 exit 1\n\
             fi\n",
        )
        .unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

pub fn target(kind: TargetKind, remote: &Remote, owner: &str, repo: &str, file: &str) -> Target {
    Target::new(kind, RepoSlug::new(owner, repo), remote.url(), file)
}

pub fn settings(storage: &Path, extra: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("ANTHROPIC_API_KEY".into(), "test-key".into());
    vars.insert("HOME".into(), storage.to_string_lossy().into_owned());
    vars.insert(
        "SYNC_CONFIGS_STORAGE_DIR".into(),
        storage.to_string_lossy().into_owned(),
    );
    vars.insert("ACTOR".into(), "sync-bot".into());
    vars.insert("EMAIL".into(), "sync-bot@example.com".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Settings::from_vars(&vars).expect("settings")
}

pub fn workspace() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let storage = tmp.path().join("storage");
    (tmp, storage)
}

/// Records every call; answers 403 when `forbidden` is set.
#[derive(Default)]
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub forbidden: bool,
}

impl RecordingPublisher {
    pub fn forbidden() -> Self {
        Self {
            forbidden: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PullRequestPublisher for RecordingPublisher {
    async fn open_pull_request(
        &self,
        target: &Target,
        head: &str,
        base: &str,
        _instruction: &str,
    ) -> Result<String, PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push((target.file_name(), head.to_string(), base.to_string()));
        if self.forbidden {
            return Err(PublishError::Forbidden {
                repo: target.slug.to_string(),
                message: "Resource not accessible by integration".to_string(),
            });
        }
        Ok(format!("https://github.com/{}/pull/1", target.slug))
    }
}
