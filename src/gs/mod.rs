//! Google Cloud Storage JSON API client.
//!
//! Only the two operations the index updater needs are implemented: a flat
//! listing of every object under a prefix, and a media upload of a single
//! object. Both live behind the [`Storage`] trait so the updater can run
//! against [`mock::MockStorage`] in tests.

pub mod mock;

use std::fmt;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_API: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Query-component encoding for API request parameters.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn percent(s: &str) -> String {
    utf8_percent_encode(s, QUERY).to_string()
}

/// A parsed `gs://bucket/prefix` location.
///
/// The prefix names a directory, so a non-empty prefix is normalized to end
/// with `/`. `gs://bucket` addresses the bucket root (empty prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsUrl {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GsUrlError {
    #[error("not a gs:// URL: '{0}'")]
    Scheme(String),
    #[error("missing bucket name in '{0}'")]
    EmptyBucket(String),
}

impl GsUrl {
    pub fn parse(s: &str) -> Result<Self, GsUrlError> {
        let rest = s
            .strip_prefix("gs://")
            .ok_or_else(|| GsUrlError::Scheme(s.to_string()))?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(GsUrlError::EmptyBucket(s.to_string()));
        }
        let mut prefix = prefix.to_string();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Ok(GsUrl {
            bucket: bucket.to_string(),
            prefix,
        })
    }
}

impl fmt::Display for GsUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.prefix)
    }
}

/// One entry from an object listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Object {
    pub name: String,

    /// The API reports sizes as decimal strings.
    #[serde(default, deserialize_with = "size_from_string")]
    pub size: u64,

    #[serde(default)]
    pub updated: Option<String>,
}

fn size_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<Object>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum GsError {
    /// Transport failure or an undecodable response body.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage API returned {status} for {context}: {body}")]
    UnexpectedStatus {
        status: u16,
        context: String,
        body: String,
    },
}

/// Storage operations the index updater depends on.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Every object under `prefix`, flat (no delimiter), across all pages.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<Object>, GsError>;

    /// Media upload of a single object.
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), GsError>;
}

/// Authenticated storage client. Opaque to the CLI wrapper; it only carries
/// the bearer token and the HTTP client.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    token: String,
}

impl Client {
    pub fn new(token: String) -> Self {
        Client {
            http: reqwest::Client::new(),
            token,
        }
    }
}

#[async_trait]
impl Storage for Client {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<Object>, GsError> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{STORAGE_API}/b/{}/o?prefix={}",
                percent(bucket),
                percent(prefix)
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&percent(token));
            }

            let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
            if !resp.status().is_success() {
                return Err(GsError::UnexpectedStatus {
                    status: resp.status().as_u16(),
                    context: format!("listing gs://{bucket}/{prefix}"),
                    body: resp.text().await.unwrap_or_default(),
                });
            }

            let page: ListResponse = resp.json().await?;
            objects.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = objects.len(), "listed objects under gs://{bucket}/{prefix}");
        Ok(objects)
    }

    async fn put(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), GsError> {
        let url = format!(
            "{UPLOAD_API}/b/{}/o?uploadType=media&name={}",
            percent(bucket),
            percent(name)
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GsError::UnexpectedStatus {
                status: resp.status().as_u16(),
                context: format!("upload of gs://{bucket}/{name}"),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}
