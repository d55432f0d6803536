use std::sync::Arc;

use axum::extract::{Extension, Multipart, Path, State};
use axum::http::HeaderMap;
use quickdesk_core::api::attachments::{upload_attachments, UploadFile, UploadReport};
use quickdesk_core::api::visible_ticket;
use quickdesk_core::{AuthContext, DeskError, MutationContext, RequestMetadata, Result};
use serde::Serialize;
use uuid::Uuid;

use super::response::{RpcError, RpcResponse};
use super::rpc::request_metadata;
use super::tracing::TracingState;
use crate::function::FunctionRouter;

/// Files accepted in one upload request.
pub const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Clone)]
pub struct UploadState {
    pub router: Arc<FunctionRouter>,
    /// Per-file ceiling from the deployment config.
    pub hard_limit_bytes: u64,
}

impl UploadState {
    /// Largest request body the upload route accepts.
    pub fn body_limit(&self) -> usize {
        let per_file = usize::try_from(self.hard_limit_bytes).unwrap_or(usize::MAX);
        per_file
            .saturating_mul(MAX_FILES_PER_REQUEST)
            .saturating_add(64 * 1024)
    }
}

#[derive(Debug, Serialize)]
struct UploadSummary {
    uploaded_count: usize,
    failed_count: usize,
    #[serde(flatten)]
    report: UploadReport,
}

async fn read_files(multipart: &mut Multipart) -> Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DeskError::Validation(format!("Malformed upload: {}", e)))?
    {
        // Plain form fields carry no file name.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if files.len() == MAX_FILES_PER_REQUEST {
            return Err(DeskError::Validation(format!(
                "At most {} files can be uploaded at once",
                MAX_FILES_PER_REQUEST
            )));
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DeskError::Validation(format!("Failed to read {}: {}", file_name, e)))?;
        files.push(UploadFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

async fn upload(
    state: &UploadState,
    ticket_id: Uuid,
    auth: AuthContext,
    request: RequestMetadata,
    multipart: &mut Multipart,
) -> Result<UploadSummary> {
    let viewer = state.router.resolve_viewer(&auth).await?;
    // Reject callers who cannot see the ticket before reading the body.
    visible_ticket(state.router.services().store.as_ref(), &viewer, ticket_id).await?;
    let files = read_files(multipart).await?;
    let ctx = MutationContext::new(state.router.services().clone(), viewer, auth, request);
    let report = upload_attachments(&ctx, ticket_id, files, state.hard_limit_bytes).await?;
    Ok(UploadSummary {
        uploaded_count: report.uploaded.len(),
        failed_count: report.failed.len(),
        report,
    })
}

/// `POST /tickets/{id}/attachments` with a multipart body.
pub async fn upload_handler(
    State(state): State<Arc<UploadState>>,
    Extension(auth): Extension<AuthContext>,
    Extension(tracing): Extension<TracingState>,
    Path(ticket_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> RpcResponse {
    let metadata = request_metadata(&tracing, &headers);
    let request_id = metadata.request_id.to_string();

    let response = match upload(&state, ticket_id, auth, metadata, &mut multipart).await {
        Ok(summary) => match serde_json::to_value(&summary) {
            Ok(data) => RpcResponse::success(data),
            Err(e) => RpcResponse::error(RpcError::internal(e.to_string())),
        },
        Err(e) => RpcResponse::error(RpcError::from(e)),
    };
    response.with_request_id(request_id)
}
