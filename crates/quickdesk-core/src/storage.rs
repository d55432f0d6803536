//! Object storage for ticket attachments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

/// A bucket of opaque objects addressed by slash-separated keys.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Object bytes, or `None` when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Removing a missing object is not an error.
    async fn remove(&self, path: &str) -> Result<()>;

    /// URL a browser can fetch the object from.
    fn public_url(&self, path: &str) -> String;
}

/// Reduce a client-supplied file name to a safe basename.
///
/// Directory components are dropped and anything outside
/// `[A-Za-z0-9._-]` becomes `_`. Never returns an empty string or a name
/// starting with a dot.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Object key for an attachment:
/// `tickets/{ticket}/{unix millis}-{8 hex of upload_id}-{name}`.
///
/// `upload_id` tells apart same-named files stored in the same millisecond.
pub fn attachment_path(
    ticket_id: Uuid,
    file_name: &str,
    at: DateTime<Utc>,
    upload_id: Uuid,
) -> String {
    let tag = upload_id.simple().to_string();
    format!(
        "tickets/{}/{}-{}-{}",
        ticket_id,
        at.timestamp_millis(),
        &tag[..8],
        sanitize_file_name(file_name)
    )
}

/// Validate an object key: relative, no empty, `.` or `..` segments.
pub fn is_safe_key(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}
