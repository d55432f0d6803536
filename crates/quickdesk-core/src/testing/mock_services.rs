//! In-memory object storage and a recording mailer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{DeskError, Result};
use crate::notify::{EmailMessage, Mailer};
use crate::storage::ObjectStore;

/// Stored object with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// [`ObjectStore`] keeping objects in a map.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail from now on.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(DeskError::Storage(format!("upload of {} refused", path)));
        }
        self.objects.write().unwrap().insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .read()
            .unwrap()
            .get(path)
            .map(|o| o.bytes.clone()))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.objects.write().unwrap().remove(path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://attachments/{}", path)
    }
}

/// [`Mailer`] that records what it was asked to send.
#[derive(Default)]
pub struct MockMailer {
    sent: RwLock<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().unwrap().clone()
    }

    /// Recipients in send order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeskError::Internal("mailer offline".into()));
        }
        self.sent.write().unwrap().push(message.clone());
        Ok(())
    }
}
