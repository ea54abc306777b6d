//! gsindex - directory index pages for Google Cloud Storage locations.
//!
//! Rebuilds the `index.html` pages under a `gs://bucket/prefix` location so
//! the location can be browsed like a static file tree. The CLI obtains an
//! OAuth-authenticated storage client, lists every object under the prefix,
//! and regenerates one index page per directory.

pub mod auth;
pub mod gs;
pub mod index;
