use std::sync::Arc;

use serde::Serialize;

use super::email::{self, Mailer};
use super::fanout::{TicketActivity, TicketEvent};
use crate::config::NotificationsConfig;
use crate::model::{DeskSettings, Profile};
use crate::store::DeskStore;

/// What happened to one activity's notifications.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub inserted: usize,
    /// Recipients who opted out of this kind of notification.
    pub skipped: usize,
    pub failed: usize,
    pub emailed: usize,
    pub email_failed: usize,
}

/// Inserts in-app notifications and hands e-mails to the mailer.
///
/// Delivery is best effort: failures are logged and counted, never
/// returned, so a mutation that already happened is not reported as failed.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn DeskStore>,
    mailer: Arc<dyn Mailer>,
    email_enabled: bool,
    app_base_url: String,
}

impl Notifier {
    pub fn new(store: Arc<dyn DeskStore>, mailer: Arc<dyn Mailer>, config: &NotificationsConfig) -> Self {
        Self {
            store,
            mailer,
            email_enabled: config.email_enabled,
            app_base_url: config.app_base_url.clone(),
        }
    }

    async fn settings(&self) -> DeskSettings {
        match self.store.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load desk settings, using defaults");
                DeskSettings::default()
            }
        }
    }

    pub async fn dispatch(&self, activity: &TicketActivity) -> FanoutReport {
        let mut report = FanoutReport::default();
        let settings = self.settings().await;
        let kind = activity.kind();

        if settings.enable_notifications {
            for planned in activity.notifications() {
                if !planned.recipient.notification_settings.wants_in_app(kind) {
                    report.skipped += 1;
                    continue;
                }
                let user_id = planned.recipient.id;
                match self.store.insert_notification(planned.notification).await {
                    Ok(_) => report.inserted += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            ticket_id = %activity.ticket.id,
                            user_id = %user_id,
                            error = %e,
                            "Failed to insert notification"
                        );
                    }
                }
            }
        }

        if self.email_enabled && settings.enable_email_notifications {
            let staff = if matches!(activity.event, TicketEvent::Created) {
                self.store.list_staff().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to load staff for e-mail");
                    Vec::new()
                })
            } else {
                Vec::new()
            };
            let messages = email::compose(activity, &staff, &self.app_base_url);
            let results =
                futures::future::join_all(messages.iter().map(|m| self.mailer.send(m))).await;
            for (message, result) in messages.iter().zip(results) {
                match result {
                    Ok(()) => report.emailed += 1,
                    Err(e) => {
                        report.email_failed += 1;
                        tracing::warn!(to = %message.to, error = %e, "Failed to send e-mail");
                    }
                }
            }
        }

        tracing::debug!(
            ticket_id = %activity.ticket.id,
            kind = %kind,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            emailed = report.emailed,
            "Notification fan-out complete"
        );
        report
    }

    /// Send the welcome e-mail. Returns whether it was handed off.
    pub async fn welcome(&self, profile: &Profile) -> bool {
        if !self.email_enabled || !self.settings().await.enable_email_notifications {
            return false;
        }
        match self.mailer.send(&email::welcome(profile)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %profile.id, error = %e, "Failed to send welcome e-mail");
                false
            }
        }
    }
}
