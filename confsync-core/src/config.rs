//! Run configuration.
//!
//! [`Settings`] is built once at startup from an environment snapshot and
//! passed by reference to every component. Nothing below the binary reads
//! process environment directly.
//!
//! # API pattern
//!
//! - [`Settings::from_vars`]: explicit variable map; used by tests
//! - [`Settings::from_env`]: snapshots `std::env::vars()` and delegates

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_IDENTITY_NAME: &str = "sync-configs[bot]";
pub const DEFAULT_IDENTITY_EMAIL: &str = "sync-configs[bot]@users.noreply.github.com";

/// Canonical token variable followed by its deprecated aliases, in precedence order.
const TOKEN_VARS: [&str; 3] = ["AUTH_TOKEN", "PERSONAL_ACCESS_TOKEN", "GITHUB_TOKEN"];
const APP_VARS: [&str; 3] = ["APP_ID", "APP_PRIVATE_KEY", "APP_INSTALLATION_ID"];

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Name and email recorded on every commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_key: Secret,
    pub model: String,
    pub base_url: String,
}

/// GitHub App credentials. Token minting happens outside this tool.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub private_key: Secret,
    pub installation_id: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Token for remote git and REST access.
    pub auth_token: Option<Secret>,
    /// Running under CI (`GITHUB_ACTIONS`): a token is mandatory.
    pub unattended: bool,
    /// Direct push to the default branch instead of topic branch + PR.
    pub interactive: bool,
    pub identity: CommitIdentity,
    /// Actor credited in commit messages and PR bodies.
    pub requested_by: String,
    pub anthropic: AnthropicSettings,
    pub github_api_url: String,
    pub instruction: Option<String>,
    pub app: Option<AppCredentials>,
    /// `USE_MOCK_CLAUDE_RESPONSE=true` was requested. Only honored by builds
    /// with the `mock-generation` feature.
    pub mock_generation: bool,
    /// Root directory holding one mirror per `owner/repo`.
    pub storage_root: PathBuf,
}

impl Settings {
    /// Build settings from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let interactive = match get("INTERACTIVE").as_deref() {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => {
                return Err(ConfigError::InvalidInteractive {
                    value: other.to_string(),
                })
            }
        };

        let api_key = get("ANTHROPIC_API_KEY").ok_or(ConfigError::MissingVar {
            name: "ANTHROPIC_API_KEY",
        })?;

        let auth_token = resolve_token(&get);
        let unattended = get("GITHUB_ACTIONS").is_some();
        let app = resolve_app_credentials(&get)?;
        if app.is_some() && auth_token.is_none() && unattended {
            return Err(ConfigError::AppTokenRequired);
        }

        let identity = CommitIdentity {
            name: get("ACTOR").unwrap_or_else(|| DEFAULT_IDENTITY_NAME.to_string()),
            email: get("EMAIL").unwrap_or_else(|| DEFAULT_IDENTITY_EMAIL.to_string()),
        };
        let requested_by = get("GITHUB_ACTOR")
            .or_else(|| get("ACTOR"))
            .unwrap_or_else(|| identity.name.clone());

        let storage_root = match get("SYNC_CONFIGS_STORAGE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => get("HOME")
                .map(PathBuf::from)
                .or_else(dirs::home_dir)
                .ok_or(ConfigError::HomeNotFound)?
                .join(".sync-configs")
                .join("repos"),
        };

        Ok(Settings {
            auth_token,
            unattended,
            interactive,
            identity,
            requested_by,
            anthropic: AnthropicSettings {
                api_key: Secret::new(api_key),
                model: get("ANTHROPIC_MODEL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                base_url: get("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
            },
            github_api_url: get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            instruction: get("EDITOR_INSTRUCTION"),
            app,
            mock_generation: get("USE_MOCK_CLAUDE_RESPONSE").as_deref() == Some("true"),
            storage_root,
        })
    }

    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// The token, if one is configured.
    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_ref().map(Secret::expose)
    }

    /// The instruction for a non-interactive run.
    pub fn require_instruction(&self) -> Result<&str, ConfigError> {
        self.instruction
            .as_deref()
            .ok_or(ConfigError::MissingInstruction)
    }
}

fn resolve_token(get: &impl Fn(&str) -> Option<String>) -> Option<Secret> {
    for (i, name) in TOKEN_VARS.iter().enumerate() {
        if let Some(value) = get(name) {
            if i > 0 {
                tracing::warn!(
                    "{name} is deprecated for remote authentication; set {} instead",
                    TOKEN_VARS[0]
                );
            }
            return Some(Secret::new(value));
        }
    }
    None
}

fn resolve_app_credentials(
    get: &impl Fn(&str) -> Option<String>,
) -> Result<Option<AppCredentials>, ConfigError> {
    let values: Vec<Option<String>> = APP_VARS.iter().map(|name| get(name)).collect();
    let missing: Vec<&'static str> = APP_VARS
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| *name)
        .collect();

    match missing.len() {
        0 => {
            let mut it = values.into_iter().flatten();
            match (it.next(), it.next(), it.next()) {
                (Some(app_id), Some(key), Some(installation_id)) => Ok(Some(AppCredentials {
                    app_id,
                    private_key: Secret::new(key),
                    installation_id,
                })),
                _ => Ok(None),
            }
        }
        n if n == APP_VARS.len() => Ok(None),
        _ => Err(ConfigError::IncompleteAppCredentials { missing }),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
