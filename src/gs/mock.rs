//! In-memory storage backend for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{GsError, Object, Storage};

/// Mock storage backend: a preloaded object listing plus a record of every
/// upload, shareable across clones.
#[derive(Clone, Default)]
pub struct MockStorage {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    objects: Vec<Object>,
    puts: Vec<PutRecord>,
    fail_list: Option<(u16, String)>,
    fail_put: Option<(u16, String)>,
}

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub bucket: String,
    pub name: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload an object (for test setup).
    pub fn push_object(&self, name: &str, size: u64) {
        self.state.lock().unwrap().objects.push(Object {
            name: name.to_string(),
            size,
            updated: None,
        });
    }

    /// Make every subsequent listing fail with the given status.
    pub fn fail_listing(&self, status: u16, body: &str) {
        self.state.lock().unwrap().fail_list = Some((status, body.to_string()));
    }

    /// Make every subsequent upload fail with the given status.
    pub fn fail_puts(&self, status: u16, body: &str) {
        self.state.lock().unwrap().fail_put = Some((status, body.to_string()));
    }

    /// Every upload recorded so far.
    pub fn puts(&self) -> Vec<PutRecord> {
        self.state.lock().unwrap().puts.clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn list(&self, _bucket: &str, prefix: &str) -> Result<Vec<Object>, GsError> {
        let state = self.state.lock().unwrap();
        if let Some((status, body)) = &state.fail_list {
            return Err(GsError::UnexpectedStatus {
                status: *status,
                context: "listing".to_string(),
                body: body.clone(),
            });
        }
        Ok(state
            .objects
            .iter()
            .filter(|o| o.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn put(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), GsError> {
        let mut state = self.state.lock().unwrap();
        if let Some((status, fail_body)) = &state.fail_put {
            return Err(GsError::UnexpectedStatus {
                status: *status,
                context: format!("upload of {name}"),
                body: fail_body.clone(),
            });
        }
        state.puts.push(PutRecord {
            bucket: bucket.to_string(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }
}
