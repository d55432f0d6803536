use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use quickdesk_core::storage::ObjectStore;
use quickdesk_core::DeskError;

/// MIME type for a stored object, from its extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain; charset=utf-8",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// `GET /storage/{*path}`: the target of attachment public URLs.
pub async fn file_handler(
    State(objects): State<Arc<dyn ObjectStore>>,
    Path(path): Path<String>,
) -> Response {
    match objects.get(&path).await {
        Ok(Some(bytes)) => (
            [
                (header::CONTENT_TYPE, content_type_for(&path)),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            bytes,
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(DeskError::InvalidArgument(_)) => StatusCode::BAD_REQUEST.into_response(),
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to read stored object");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("tickets/t/1-shot.PNG"), "image/png");
        assert_eq!(content_type_for("tickets/t/1-report.pdf"), "application/pdf");
        assert_eq!(content_type_for("tickets/t/1-README"), "application/octet-stream");
    }
}
