use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::{NotificationType, Role};

/// A desk identity. The id matches the token subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[sqlx(json)]
    pub notification_settings: NotificationSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Name to show in notification texts, falling back to the address.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

/// A profile provisioned on first sign-in. New profiles are end users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

/// Profile fields a user may change about themselves. Role is excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Per-user delivery preferences. Missing keys fall back to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub email_notifications: bool,
    pub in_app_notifications: bool,
    pub ticket_created: bool,
    pub ticket_updated: bool,
    pub ticket_commented: bool,
    pub ticket_assigned: bool,
    pub ticket_resolved: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            in_app_notifications: true,
            ticket_created: true,
            ticket_updated: true,
            ticket_commented: true,
            ticket_assigned: true,
            ticket_resolved: true,
        }
    }
}

impl NotificationSettings {
    /// Whether this kind of event is wanted at all.
    pub fn wants(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::TicketCreated => self.ticket_created,
            NotificationType::TicketUpdated => self.ticket_updated,
            NotificationType::TicketCommented => self.ticket_commented,
            NotificationType::TicketAssigned => self.ticket_assigned,
            NotificationType::TicketResolved => self.ticket_resolved,
        }
    }

    pub fn wants_in_app(&self, kind: NotificationType) -> bool {
        self.in_app_notifications && self.wants(kind)
    }

    pub fn wants_email(&self, kind: NotificationType) -> bool {
        self.email_notifications && self.wants(kind)
    }

    /// Overlay the fields present in a partial JSON object.
    pub fn merged(&self, patch: &serde_json::Value) -> crate::Result<Self> {
        let mut current = serde_json::to_value(self)?;
        if let (Some(target), Some(source)) = (current.as_object_mut(), patch.as_object()) {
            for (key, value) in source {
                if !target.contains_key(key) {
                    return Err(crate::DeskError::Validation(format!(
                        "Unknown notification setting '{}'",
                        key
                    )));
                }
                if !value.is_boolean() {
                    return Err(crate::DeskError::Validation(format!(
                        "Notification setting '{}' must be true or false",
                        key
                    )));
                }
                target.insert(key.clone(), value.clone());
            }
        } else {
            return Err(crate::DeskError::Validation(
                "Notification settings must be an object".into(),
            ));
        }
        Ok(serde_json::from_value(current)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_keys_default_to_enabled() {
        let settings: NotificationSettings =
            serde_json::from_value(json!({ "ticket_commented": false })).unwrap();
        assert!(settings.email_notifications);
        assert!(!settings.ticket_commented);
        assert!(!settings.wants_in_app(NotificationType::TicketCommented));
        assert!(settings.wants_in_app(NotificationType::TicketCreated));
    }

    #[test]
    fn test_master_switches() {
        let settings = NotificationSettings {
            in_app_notifications: false,
            ..Default::default()
        };
        assert!(!settings.wants_in_app(NotificationType::TicketAssigned));
        assert!(settings.wants_email(NotificationType::TicketAssigned));
    }

    #[test]
    fn test_merge() {
        let merged = NotificationSettings::default()
            .merged(&json!({ "email_notifications": false }))
            .unwrap();
        assert!(!merged.email_notifications);
        assert!(merged.ticket_resolved);

        assert!(NotificationSettings::default()
            .merged(&json!({ "sms": true }))
            .is_err());
        assert!(NotificationSettings::default()
            .merged(&json!({ "ticket_created": "yes" }))
            .is_err());
        assert!(NotificationSettings::default().merged(&json!([1])).is_err());
    }
}
