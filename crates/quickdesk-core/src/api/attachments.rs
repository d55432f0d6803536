//! Ticket attachments: listing, multipart uploads and removal.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{visible_ticket, TicketRef};
use crate::error::{DeskError, Result};
use crate::function::{MutationContext, QueryContext};
use crate::model::{Attachment, AttachmentView, NewAttachment};
use crate::storage::{self, ObjectStore};
use crate::validation;

/// One file from an upload request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFailure {
    pub file_name: String,
    pub error: String,
}

/// Outcome of an upload request. Files succeed or fail independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadReport {
    pub uploaded: Vec<AttachmentView>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub attachment_id: Uuid,
}

desk_query!(
    ListAttachments,
    "list_attachments",
    "Files attached to a ticket",
    TicketRef => Vec<AttachmentView>,
    list_attachments
);

desk_mutation!(
    DeleteAttachment,
    "delete_attachment",
    "Remove an attachment and its stored file",
    AttachmentRef => (),
    delete_attachment
);

fn view(objects: &dyn ObjectStore, attachment: Attachment) -> AttachmentView {
    AttachmentView {
        url: objects.public_url(&attachment.file_path),
        attachment,
    }
}

async fn list_attachments(ctx: &QueryContext, args: TicketRef) -> Result<Vec<AttachmentView>> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    let attachments = ctx.store().list_attachments(ticket.id).await?;
    Ok(attachments
        .into_iter()
        .map(|a| view(ctx.objects(), a))
        .collect())
}

/// Store each file under the ticket and record it.
///
/// `hard_limit_bytes` caps the size on top of the desk setting. A file that
/// fails validation, upload or recording is reported and the rest continue.
pub async fn upload_attachments(
    ctx: &MutationContext,
    ticket_id: Uuid,
    files: Vec<UploadFile>,
    hard_limit_bytes: u64,
) -> Result<UploadReport> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), ticket_id).await?;
    if files.is_empty() {
        return Err(DeskError::Validation("No files provided".into()));
    }
    let settings = ctx.store().load_settings().await?;

    let mut report = UploadReport::default();
    for file in files {
        let file_name = file.file_name.clone();
        match upload_one(ctx, ticket.id, file, &settings, hard_limit_bytes).await {
            Ok(view) => report.uploaded.push(view),
            Err(e) => {
                tracing::warn!(ticket_id = %ticket.id, file = %file_name, error = %e, "Attachment rejected");
                report.failed.push(UploadFailure {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        ticket_id = %ticket.id,
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        "Attachments processed"
    );
    Ok(report)
}

async fn upload_one(
    ctx: &MutationContext,
    ticket_id: Uuid,
    file: UploadFile,
    settings: &crate::model::DeskSettings,
    hard_limit_bytes: u64,
) -> Result<AttachmentView> {
    validation::check_attachment(
        &file.file_name,
        &file.content_type,
        file.bytes.len() as u64,
        settings,
        hard_limit_bytes,
    )?;

    let path = storage::attachment_path(ticket_id, &file.file_name, Utc::now(), Uuid::new_v4());
    ctx.objects()
        .upload(&path, &file.bytes, &file.content_type)
        .await?;

    let record = NewAttachment {
        ticket_id,
        file_name: file.file_name,
        file_path: path.clone(),
        file_size: file.bytes.len() as i64,
        file_type: file.content_type,
        uploaded_by: ctx.viewer().id,
    };
    match ctx.store().insert_attachment(record).await {
        Ok(attachment) => Ok(view(ctx.objects(), attachment)),
        // A conflicting row owns the object at this path; leave it alone.
        Err(e @ DeskError::Conflict(_)) => Err(e),
        Err(e) => {
            if let Err(cleanup) = ctx.objects().remove(&path).await {
                tracing::warn!(path = %path, error = %cleanup, "Failed to remove orphaned object");
            }
            Err(e)
        }
    }
}

async fn delete_attachment(ctx: &MutationContext, args: AttachmentRef) -> Result<()> {
    let attachment = ctx
        .store()
        .get_attachment(args.attachment_id)
        .await?
        .ok_or_else(|| DeskError::NotFound(format!("Attachment {} not found", args.attachment_id)))?;
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), attachment.ticket_id).await?;

    let viewer = ctx.viewer();
    if attachment.uploaded_by != viewer.id && !viewer.is_staff() {
        return Err(DeskError::forbidden(
            "Only the uploader or support staff can delete an attachment",
        ));
    }

    ctx.objects().remove(&attachment.file_path).await?;
    ctx.store().delete_attachment(attachment.id).await?;
    tracing::info!(ticket_id = %ticket.id, attachment_id = %attachment.id, "Attachment deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{DeskMutation, DeskQuery};
    use crate::model::Role;
    use crate::testing::TestDesk;
    use crate::{assert_err_variant, assert_redirected};

    const MB: u64 = 1024 * 1024;

    fn file(name: &str, content_type: &str, len: usize) -> UploadFile {
        UploadFile {
            file_name: name.into(),
            content_type: content_type.into(),
            bytes: vec![7u8; len],
        }
    }

    #[tokio::test]
    async fn test_upload_reports_each_file() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);

        let report = upload_attachments(
            &desk.mutation(&ann),
            ticket.id,
            vec![
                file("screen.png", "image/png", 2048),
                file("setup.exe", "application/x-msdownload", 10),
                file("empty.txt", "text/plain", 0),
            ],
            100 * MB,
        )
        .await
        .unwrap();

        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert!(!report.is_complete());

        let stored = &report.uploaded[0];
        assert!(stored
            .attachment
            .file_path
            .starts_with(&format!("tickets/{}/", ticket.id)));
        assert!(stored.url.starts_with("memory://attachments/tickets/"));
        assert_eq!(desk.objects.paths(), vec![stored.attachment.file_path.clone()]);
    }

    #[tokio::test]
    async fn test_same_name_files_keep_separate_objects() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);

        let report = upload_attachments(
            &desk.mutation(&ann),
            ticket.id,
            vec![file("log.txt", "text/plain", 5), file("log.txt", "text/plain", 9)],
            MB,
        )
        .await
        .unwrap();

        assert_eq!(report.uploaded.len(), 2);
        assert!(report.failed.is_empty());
        assert_ne!(
            report.uploaded[0].attachment.file_path,
            report.uploaded[1].attachment.file_path
        );
        assert_eq!(desk.objects.paths().len(), 2);

        let listed = ListAttachments::execute(&desk.query(&ann), TicketRef { ticket_id: ticket.id })
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_honours_smaller_limit() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);

        let report = upload_attachments(
            &desk.mutation(&ann),
            ticket.id,
            vec![file("big.pdf", "application/pdf", (2 * MB) as usize)],
            MB,
        )
        .await
        .unwrap();
        assert!(report.uploaded.is_empty());
        assert!(report.failed[0].error.contains("larger than"));
    }

    #[tokio::test]
    async fn test_upload_failure_is_per_file() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);
        desk.objects.fail_uploads(true);

        let report = upload_attachments(
            &desk.mutation(&ann),
            ticket.id,
            vec![file("a.txt", "text/plain", 3)],
            MB,
        )
        .await
        .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(ListAttachments::execute(&desk.query(&ann), TicketRef { ticket_id: ticket.id })
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_ticket_access() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let bob = desk.store.seed_profile("Bob", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);

        let result = upload_attachments(
            &desk.mutation(&bob),
            ticket.id,
            vec![file("a.txt", "text/plain", 3)],
            MB,
        )
        .await;
        assert_redirected!(result);
    }

    #[tokio::test]
    async fn test_delete_attachment_rights() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, Some(&sam));

        let report = upload_attachments(
            &desk.mutation(&sam),
            ticket.id,
            vec![file("log.txt", "text/plain", 12)],
            MB,
        )
        .await
        .unwrap();
        let id = report.uploaded[0].attachment.id;

        let result = DeleteAttachment::execute(&desk.mutation(&ann), AttachmentRef { attachment_id: id }).await;
        assert_err_variant!(result, DeskError::Forbidden { .. });

        DeleteAttachment::execute(&desk.mutation(&sam), AttachmentRef { attachment_id: id })
            .await
            .unwrap();
        assert!(desk.objects.paths().is_empty());

        let result = DeleteAttachment::execute(&desk.mutation(&sam), AttachmentRef { attachment_id: id }).await;
        assert_err_variant!(result, DeskError::NotFound(_));
    }
}
