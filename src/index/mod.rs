//! Index-page regeneration for a storage location.
//!
//! `update` is the whole operation: list every object under the location,
//! rebuild the directory tree, render one HTML index page per directory,
//! and upload each page as `{directory}index.html`.

pub mod tree;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use tracing::{debug, info};

use crate::gs::{Client, GsError, GsUrl, GsUrlError, Storage};
use tree::{DirTree, Listing};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid location: {0}")]
    InvalidLocation(#[from] GsUrlError),

    #[error(transparent)]
    Storage(#[from] GsError),
}

/// The index-update operation as the CLI wrapper sees it: one call taking
/// the authenticated client and the raw location argument.
#[async_trait]
pub trait IndexUpdater: Send + Sync {
    async fn update(&self, client: &Client, location: &str) -> Result<(), IndexError>;
}

/// Production updater, driving [`update`] against the real storage API.
#[derive(Debug, Default)]
pub struct Indexer;

impl Indexer {
    pub fn new() -> Self {
        Indexer
    }
}

#[async_trait]
impl IndexUpdater for Indexer {
    async fn update(&self, client: &Client, location: &str) -> Result<(), IndexError> {
        update(client, location).await
    }
}

/// Regenerate every index page under `location`.
pub async fn update<S: Storage>(storage: &S, location: &str) -> Result<(), IndexError> {
    let url = GsUrl::parse(location)?;
    let objects = storage.list(&url.bucket, &url.prefix).await?;
    let tree = DirTree::build(&url.prefix, &objects);
    info!(
        location = %url,
        directories = tree.len(),
        objects = objects.len(),
        "regenerating index pages"
    );

    for (dir, listing) in tree.iter() {
        let page = render_page(&url.bucket, dir, listing, dir == tree.root());
        let name = format!("{dir}index.html");
        debug!(page = %name, "uploading index page");
        storage
            .put(&url.bucket, &name, "text/html", page.into_bytes())
            .await?;
    }

    Ok(())
}

/// Href encoding for names inside a generated page.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'%')
    .add(b'&');

const NAME_COLUMN: usize = 50;

fn render_page(bucket: &str, dir: &str, listing: &Listing, is_root: bool) -> String {
    let title = escape_html(&format!("gs://{bucket}/{dir}"));

    let mut rows = String::new();
    if !is_root {
        rows.push_str("<a href=\"../\">../</a>\n");
    }
    for subdir in &listing.subdirs {
        let text = escape_html(subdir);
        let href = escape_href(subdir);
        rows.push_str(&format!("<a href=\"{href}\">{text}</a>\n"));
    }
    for entry in &listing.files {
        let text = escape_html(&entry.name);
        let href = escape_href(&entry.name);
        let pad = " ".repeat(NAME_COLUMN.saturating_sub(text.chars().count()).max(1));
        let size = entry.size;
        let updated = entry.updated.as_deref().map(escape_html).unwrap_or_default();
        rows.push_str(&format!(
            "<a href=\"{href}\">{text}</a>{pad}{size:>12}  {updated}\n"
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<hr>\n<pre>\n{rows}</pre>\n<hr>\n</body>\n</html>\n"
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_href(s: &str) -> String {
    utf8_percent_encode(s, HREF).to_string()
}

#[cfg(test)]
mod tests {
    use super::tree::Entry;
    use super::*;
    use std::collections::BTreeSet;

    fn listing(subdirs: &[&str], files: &[(&str, u64)]) -> Listing {
        Listing {
            subdirs: subdirs.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            files: files
                .iter()
                .map(|(name, size)| Entry {
                    name: name.to_string(),
                    size: *size,
                    updated: None,
                })
                .collect(),
        }
    }

    #[test]
    fn root_page_has_no_parent_link() {
        let page = render_page("builds", "p/", &listing(&["a/"], &[]), true);
        assert!(!page.contains("href=\"../\""));
        assert!(page.contains("<a href=\"a/\">a/</a>"));
        assert!(page.contains("<title>Index of gs://builds/p/</title>"));
    }

    #[test]
    fn subdirectory_page_links_to_parent() {
        let page = render_page("builds", "p/a/", &listing(&[], &[("x.txt", 7)]), false);
        assert!(page.contains("<a href=\"../\">../</a>"));
        assert!(page.contains("<a href=\"x.txt\">x.txt</a>"));
        assert!(page.contains("7"));
    }

    #[test]
    fn names_are_escaped_in_text_and_href() {
        let page = render_page("builds", "p/", &listing(&[], &[("a<b&c\".txt", 1)]), true);
        assert!(page.contains(">a&lt;b&amp;c&quot;.txt</a>"));
        assert!(page.contains("href=\"a%3Cb%26c%22.txt\""));
    }

    #[test]
    fn updated_timestamp_is_rendered_when_present() {
        let l = Listing {
            subdirs: BTreeSet::new(),
            files: vec![Entry {
                name: "x.txt".to_string(),
                size: 1,
                updated: Some("2024-05-01T10:00:00Z".to_string()),
            }],
        };
        let page = render_page("builds", "p/", &l, true);
        assert!(page.contains("2024-05-01T10:00:00Z"));
    }
}
