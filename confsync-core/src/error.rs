//! Error types for confsync-core.

use thiserror::Error;

/// Pre-flight configuration failures. Always fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A repository URL did not match `github.com/<owner>/<repo>[.git]`.
    #[error("invalid GitHub repository URL '{url}'; expected github.com/<owner>/<repo>[.git]")]
    InvalidUrl { url: String },

    /// A required environment variable is unset or empty.
    #[error("{name} environment variable must be set")]
    MissingVar { name: &'static str },

    #[error("Invalid value for INTERACTIVE environment variable. Expected \"true\" or \"false\", got \"{value}\"")]
    InvalidInteractive { value: String },

    /// Some, but not all, of the GitHub App variables are set.
    #[error("incomplete GitHub App credentials; missing {}", .missing.join(", "))]
    IncompleteAppCredentials { missing: Vec<&'static str> },

    /// App credentials are present but no installation token was minted.
    #[error("GitHub App credentials are set but no installation token was provided; mint one and export it as AUTH_TOKEN")]
    AppTokenRequired,

    #[error("an instruction is required in non-interactive mode; pass --instruction or set EDITOR_INSTRUCTION")]
    MissingInstruction,

    /// Neither `SYNC_CONFIGS_STORAGE_DIR` nor a home directory is available.
    #[error("cannot determine home directory; set SYNC_CONFIGS_STORAGE_DIR or $HOME")]
    HomeNotFound,
}
