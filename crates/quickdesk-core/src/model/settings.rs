use serde::{Deserialize, Serialize};

/// Desk-wide settings managed by admins. Stored as a single JSON row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskSettings {
    pub system_name: String,
    pub system_description: String,
    /// Upload limit in megabytes, 1..=100.
    pub max_file_size_mb: u32,
    /// Lower-case file extensions accepted for attachments.
    pub allowed_file_types: Vec<String>,
    /// Stored for display; tickets are not closed automatically.
    pub auto_close_days: u32,
    pub enable_notifications: bool,
    pub enable_email_notifications: bool,
    pub maintenance_mode: bool,
    pub allow_registration: bool,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            system_name: "QuickDesk".to_string(),
            system_description: "Modern support ticket management system".to_string(),
            max_file_size_mb: 10,
            allowed_file_types: [
                "jpg", "jpeg", "png", "gif", "webp", "pdf", "doc", "docx", "txt", "mp4", "webm",
                "ogg", "mp3", "wav",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            auto_close_days: 30,
            enable_notifications: true,
            enable_email_notifications: true,
            maintenance_mode: false,
            allow_registration: true,
        }
    }
}

impl DeskSettings {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb as u64 * 1024 * 1024
    }

    /// Whether a file name's extension is on the allow-list.
    pub fn allows_extension(&self, file_name: &str) -> bool {
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => return false,
        };
        self.allowed_file_types
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}
