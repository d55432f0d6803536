use serde::{Deserialize, Serialize};

/// Outbound notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Master switch for e-mail delivery. When off, composed e-mails are dropped.
    #[serde(default = "default_email_enabled")]
    pub email_enabled: bool,

    /// When set, e-mails are POSTed as JSON to this URL instead of being logged.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Sender shown on outgoing e-mails.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Base URL used for ticket links in e-mail bodies.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            email_enabled: default_email_enabled(),
            webhook_url: None,
            from_address: default_from_address(),
            app_base_url: default_app_base_url(),
        }
    }
}

fn default_email_enabled() -> bool {
    true
}

fn default_from_address() -> String {
    "QuickDesk Support System <noreply@quickdesk.local>".to_string()
}

fn default_app_base_url() -> String {
    "http://localhost:5173".to_string()
}
