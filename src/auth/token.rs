//! Cached OAuth token handling.
//!
//! Tokens live in a TOML file under the user config directory
//! (`~/.config/gsindex/token.toml`, overridable via `GSINDEX_TOKEN_FILE`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::AuthError;

/// Treat a token as expired slightly before its recorded expiry, so a
/// request started now does not race the cutoff.
const EXPIRY_SKEW: Duration = Duration::seconds(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,

    pub refresh_token: Option<String>,

    /// Absolute expiry of the access token.
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl Token {
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        now + EXPIRY_SKEW < self.expires_at
    }

    /// Load the cached token, `None` if no cache exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, AuthError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| AuthError::CacheRead(format!("{}: {}", path.display(), e)))?;
        let token = toml::from_str(&contents)
            .map_err(|e| AuthError::CacheRead(format!("{}: {}", path.display(), e)))?;
        Ok(Some(token))
    }

    /// Persist the token, creating the parent directory if needed. The file
    /// is written in one shot so an existing cache is never left truncated.
    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AuthError::CacheWrite(format!("{}: {}", parent.display(), e)))?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AuthError::CacheWrite(format!("{}: {}", path.display(), e)))?;
        fs::write(path, contents)
            .map_err(|e| AuthError::CacheWrite(format!("{}: {}", path.display(), e)))
    }
}

pub fn default_token_path() -> PathBuf {
    match std::env::var("GSINDEX_TOKEN_FILE") {
        Ok(path) => PathBuf::from(path),
        Err(_) => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gsindex")
            .join("token.toml"),
    }
}
