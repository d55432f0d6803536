//! Input checks that run before anything touches the store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeskError, Result};
use crate::model::{CategoryInput, DeskSettings, NewTicket, TicketPriority};

/// Shown when a required ticket field is blank.
pub const REQUIRED_FIELDS_MESSAGE: &str = "Please fill in all required fields.";

/// MIME types accepted for attachments.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "video/mp4",
    "video/webm",
    "video/ogg",
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
];

/// Ticket form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTicketInput {
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
}

impl CreateTicketInput {
    /// Trimmed, complete ticket for `creator_id`, or the required-fields error.
    pub fn validate(&self, creator_id: Uuid) -> Result<NewTicket> {
        let title = self.title.trim();
        let description = self.description.trim();
        let category_id = match self.category_id {
            Some(id) if !title.is_empty() && !description.is_empty() => id,
            _ => return Err(DeskError::Validation(REQUIRED_FIELDS_MESSAGE.into())),
        };

        Ok(NewTicket {
            title: title.to_string(),
            description: description.to_string(),
            priority: self.priority.unwrap_or_default(),
            category_id,
            creator_id,
        })
    }
}

/// Comment body, trimmed and non-empty.
pub fn comment_content(content: &str) -> Result<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        Err(DeskError::Validation("Comment cannot be empty".into()))
    } else {
        Ok(trimmed)
    }
}

/// Check one upload against the MIME list, the extension allow-list and the
/// smaller of the two size limits.
pub fn check_attachment(
    file_name: &str,
    content_type: &str,
    size: u64,
    settings: &DeskSettings,
    hard_limit_bytes: u64,
) -> Result<()> {
    let limit = settings.max_file_size_bytes().min(hard_limit_bytes);
    if size == 0 {
        return Err(DeskError::Validation(format!("{} is empty", file_name)));
    }
    if size > limit {
        return Err(DeskError::Validation(format!(
            "{} is larger than {} MB",
            file_name,
            limit / (1024 * 1024)
        )));
    }
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(DeskError::Validation(format!(
            "{} has an unsupported file type ({})",
            file_name, content_type
        )));
    }
    if !settings.allows_extension(file_name) {
        return Err(DeskError::Validation(format!(
            "{} has a file extension that is not allowed",
            file_name
        )));
    }
    Ok(())
}

/// Category form: name required, color a `#rrggbb` hex value.
pub fn category_input(input: CategoryInput) -> Result<CategoryInput> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(DeskError::Validation("Category name is required".into()));
    }
    let color = input.color.trim();
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DeskError::Validation(format!(
            "Category color must look like #3B82F6, got '{}'",
            color
        )));
    }
    Ok(CategoryInput {
        name: name.to_string(),
        description: input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        color: color.to_string(),
    })
}

/// Admin settings ranges.
pub fn settings(settings: &DeskSettings) -> Result<()> {
    if settings.system_name.trim().is_empty() {
        return Err(DeskError::Validation("System name is required".into()));
    }
    if !(1..=100).contains(&settings.max_file_size_mb) {
        return Err(DeskError::Validation(
            "Maximum file size must be between 1 and 100 MB.".into(),
        ));
    }
    if !(1..=365).contains(&settings.auto_close_days) {
        return Err(DeskError::Validation(
            "Auto-close days must be between 1 and 365.".into(),
        ));
    }
    Ok(())
}

/// Loose e-mail shape check for profile edits.
pub fn email(address: &str) -> Result<String> {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(address.to_string())
        }
        _ => Err(DeskError::Validation(format!(
            "'{}' is not a valid e-mail address",
            address
        ))),
    }
}
