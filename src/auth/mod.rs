//! OAuth 2.0 authentication against Google Cloud Storage.
//!
//! Installed-application flow: a cached token is preferred, an expired one
//! is refreshed, and only when neither works (and the caller allowed it) is
//! an interactive login performed, with the verification code pasted from
//! the browser.

pub mod token;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::gs::{percent, Client};
pub use token::{default_token_path, Token};

// Installed-application credentials for the gsindex OAuth client.
const CLIENT_ID: &str = "937427706989-ldk3kfvrpavk7n5jgddonr4gcvrlqkbo.apps.googleusercontent.com";
const CLIENT_SECRET: &str = "ZT1Wye5sXJbUN47gsXhxHpZh";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read token file: {0}")]
    CacheRead(String),

    #[error("failed to write token file: {0}")]
    CacheWrite(String),

    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("no cached credential and interactive login not allowed (re-run with --interactive)")]
    InteractiveRequired,

    #[error("failed to read verification code: {0}")]
    CodeRead(String),

    #[error("no verification code entered")]
    NoCode,
}

/// The authentication operation as the CLI wrapper sees it: one call taking
/// the interactive preference and returning an authenticated client.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn client(&self, interactive: bool) -> Result<Client, AuthError>;
}

/// Google OAuth authenticator backed by the on-disk token cache.
pub struct GoogleAuth {
    token_path: PathBuf,
    http: reqwest::Client,
}

impl GoogleAuth {
    pub fn new() -> Self {
        Self::with_token_path(default_token_path())
    }

    pub fn with_token_path(token_path: PathBuf) -> Self {
        GoogleAuth {
            token_path,
            http: reqwest::Client::new(),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        debug!("refreshing cached access token");
        let mut token = self
            .exchange(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ])
            .await?;
        // The refresh response usually omits the refresh token; keep the one
        // we already hold so the cache stays usable.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn interactive_login(&self) -> Result<Token, AuthError> {
        eprintln!("Open the following URL in a browser and authorize gsindex:");
        eprintln!();
        eprintln!("  {}", auth_url());
        eprintln!();
        eprint!("Enter verification code: ");

        let mut code = String::new();
        std::io::stdin()
            .read_line(&mut code)
            .map_err(|e| AuthError::CodeRead(e.to_string()))?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::NoCode);
        }

        self.exchange(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("redirect_uri", REDIRECT_URI),
        ])
        .await
    }

    async fn exchange(&self, params: &[(&str, &str)]) -> Result<Token, AuthError> {
        let resp = self.http.post(TOKEN_URL).form(params).send().await?;
        if !resp.status().is_success() {
            return Err(AuthError::TokenEndpoint {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let body: TokenResponse = resp.json().await?;
        Ok(Token {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(body.expires_in),
        })
    }
}

impl Default for GoogleAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for GoogleAuth {
    async fn client(&self, interactive: bool) -> Result<Client, AuthError> {
        let cached = Token::load(&self.token_path)?;

        if let Some(token) = &cached {
            if token.is_fresh(OffsetDateTime::now_utc()) {
                debug!(path = %self.token_path.display(), "using cached access token");
                return Ok(Client::new(token.access_token.clone()));
            }
        }

        if let Some(refresh_token) = cached.as_ref().and_then(|t| t.refresh_token.as_deref()) {
            match self.refresh(refresh_token).await {
                Ok(token) => {
                    token.save(&self.token_path)?;
                    return Ok(Client::new(token.access_token));
                }
                // The operator explicitly allowed a login; a dead refresh
                // token is not terminal then.
                Err(e) if interactive => {
                    warn!("token refresh failed, falling back to interactive login: {e}")
                }
                Err(e) => return Err(e),
            }
        }

        if !interactive {
            return Err(AuthError::InteractiveRequired);
        }

        let token = self.interactive_login().await?;
        token.save(&self.token_path)?;
        Ok(Client::new(token.access_token))
    }
}

fn auth_url() -> String {
    format!(
        "{AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        percent(CLIENT_ID),
        percent(REDIRECT_URI),
        percent(SCOPE)
    )
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn no_cache_and_no_interactive_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let auth = GoogleAuth::with_token_path(temp_dir.path().join("token.toml"));

        let err = auth.client(false).await.unwrap_err();
        assert!(matches!(err, AuthError::InteractiveRequired));
    }

    #[tokio::test]
    async fn expired_cache_without_refresh_token_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.toml");
        Token {
            access_token: "ya29.stale".to_string(),
            refresh_token: None,
            expires_at: OffsetDateTime::now_utc() - Duration::hours(1),
        }
        .save(&path)
        .unwrap();

        let auth = GoogleAuth::with_token_path(path);
        let err = auth.client(false).await.unwrap_err();
        assert!(matches!(err, AuthError::InteractiveRequired));
    }

    #[tokio::test]
    async fn fresh_cache_is_used_without_any_request() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.toml");
        Token {
            access_token: "ya29.fresh".to_string(),
            refresh_token: None,
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        }
        .save(&path)
        .unwrap();

        let auth = GoogleAuth::with_token_path(path);
        assert!(auth.client(false).await.is_ok());
    }

    #[test]
    fn auth_url_requests_the_storage_scope() {
        let url = auth_url();
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("devstorage.read_write"));
        assert!(url.contains("access_type=offline"));
        // The scope value itself is percent-encoded.
        assert!(url.contains("scope=https%3A%2F%2F"));
    }

    #[test]
    fn token_response_parses_with_and_without_refresh_token() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token": "ya29.x", "expires_in": 3599, "refresh_token": "1//r", "token_type": "Bearer"}"#,
        )
        .unwrap();
        assert_eq!(body.access_token, "ya29.x");
        assert_eq!(body.expires_in, 3599);
        assert_eq!(body.refresh_token.as_deref(), Some("1//r"));

        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token": "ya29.y", "expires_in": 3599}"#).unwrap();
        assert!(body.refresh_token.is_none());
    }
}
