//! E-mail notifications.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::fanout::{TicketActivity, TicketEvent};
use crate::error::Result;
use crate::model::Profile;

const SIGNATURE: &str = "Best regards,\nQuickDesk Support System";

/// A composed e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers composed e-mails.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Writes e-mails to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "E-mail notification"
        );
        Ok(())
    }
}

/// Greeting sent when a profile is provisioned.
pub fn welcome(profile: &Profile) -> EmailMessage {
    EmailMessage {
        to: profile.email.clone(),
        subject: "Welcome to QuickDesk Support System".to_string(),
        body: format!(
            "Hello {},\n\n\
             Welcome to QuickDesk! Your account has been created successfully.\n\n\
             You can now:\n\
             - Create support tickets\n\
             - Track ticket status\n\
             - Receive updates via email\n\n\
             If you have any questions, please don't hesitate to contact our support team.\n\n\
             {}",
            profile.display_name(),
            SIGNATURE
        ),
    }
}

struct Outbox {
    seen: HashSet<String>,
    out: Vec<EmailMessage>,
}

impl Outbox {
    fn push(&mut self, to: &Profile, subject: String, body: String) {
        if self.seen.insert(to.email.to_ascii_lowercase()) {
            self.out.push(EmailMessage {
                to: to.email.clone(),
                subject,
                body,
            });
        }
    }
}

/// E-mails for an activity, one per address.
///
/// `staff` is only consulted for new tickets. Recipients who turned e-mail
/// off, or this kind of event off, and the actor are left out.
pub fn compose(activity: &TicketActivity, staff: &[Profile], app_base_url: &str) -> Vec<EmailMessage> {
    let kind = activity.kind();
    let wants = |p: &Profile| p.id != activity.actor.id && p.notification_settings.wants_email(kind);
    let ticket = &activity.ticket;
    let link = format!("{}/tickets/{}", app_base_url.trim_end_matches('/'), ticket.id);
    let category = activity.category_name.as_deref().unwrap_or("General");
    let status = ticket.status.label();
    let mut outbox = Outbox {
        seen: HashSet::new(),
        out: Vec::new(),
    };

    match &activity.event {
        TicketEvent::Created => {
            for member in staff.iter().filter(|p| p.is_staff() && wants(*p)) {
                outbox.push(
                    member,
                    format!("New Ticket Created: {}", ticket.title),
                    format!(
                        "Hello {},\n\n\
                         A new support ticket has been created:\n\n\
                         Title: {}\nCategory: {}\nPriority: {}\nCreated by: {}\n\n\
                         Please review and assign this ticket as needed.\n\n{}",
                        member.display_name(),
                        ticket.title,
                        category,
                        ticket.priority.label(),
                        activity.creator.display_name(),
                        SIGNATURE
                    ),
                );
            }
        }
        TicketEvent::StatusChanged { .. } => {
            let creator = &activity.creator;
            if wants(creator) {
                outbox.push(
                    creator,
                    format!("Ticket Status Updated: {}", ticket.title),
                    format!(
                        "Hello {},\n\n\
                         Your ticket status has been updated:\n\n\
                         Title: {}\nNew Status: {}\n\n\
                         You can view the updated ticket at: {}\n\n{}",
                        creator.display_name(),
                        ticket.title,
                        status,
                        link,
                        SIGNATURE
                    ),
                );
            }
        }
        TicketEvent::Assigned => {
            if let Some(agent) = activity.agent.as_ref().filter(|a| wants(*a)) {
                outbox.push(
                    agent,
                    format!("Ticket Assigned: {}", ticket.title),
                    format!(
                        "Hello {},\n\n\
                         A ticket has been assigned to you:\n\n\
                         Title: {}\nCategory: {}\nPriority: {}\nStatus: {}\n\n\
                         Please review and update the ticket status as needed.\n\n{}",
                        agent.display_name(),
                        ticket.title,
                        category,
                        ticket.priority.label(),
                        status,
                        SIGNATURE
                    ),
                );
            }
        }
        TicketEvent::Commented { .. } => {
            let recipients = std::iter::once(&activity.creator).chain(activity.agent.as_ref());
            for recipient in recipients.filter(|p| wants(*p)) {
                outbox.push(
                    recipient,
                    format!("New Comment on Ticket: {}", ticket.title),
                    format!(
                        "Hello,\n\n\
                         A new comment has been added to your ticket:\n\n\
                         Title: {}\nStatus: {}\n\n\
                         You can view the comment at: {}\n\n{}",
                        ticket.title, status, link, SIGNATURE
                    ),
                );
            }
        }
        TicketEvent::PriorityChanged { .. } | TicketEvent::Unassigned => {}
    }

    outbox.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Comment, NotificationSettings, Role, Ticket, TicketPriority, TicketStatus,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn profile(name: &str, role: Role) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            full_name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            role,
            notification_settings: NotificationSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn activity(event: TicketEvent, creator: &Profile, agent: Option<&Profile>, actor: &Profile) -> TicketActivity {
        let now = Utc::now();
        TicketActivity {
            event,
            ticket: Ticket {
                id: Uuid::nil(),
                title: "Email bounce".into(),
                description: "all mail bounces".into(),
                status: TicketStatus::InProgress,
                priority: TicketPriority::Urgent,
                category_id: Uuid::new_v4(),
                creator_id: creator.id,
                assigned_agent_id: agent.map(|a| a.id),
                created_at: now,
                updated_at: now,
            },
            creator: creator.clone(),
            agent: agent.cloned(),
            actor: actor.clone(),
            category_name: None,
        }
    }

    #[test]
    fn test_created_goes_to_staff_with_email_on() {
        let ann = profile("Ann", Role::EndUser);
        let bob = profile("Bob", Role::SupportAgent);
        let mut quiet = profile("Quiet", Role::Admin);
        quiet.notification_settings.email_notifications = false;
        let staff = vec![bob.clone(), quiet, ann.clone()];

        let mails = compose(&activity(TicketEvent::Created, &ann, None, &ann), &staff, "http://desk");
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].to, "bob@example.com");
        assert_eq!(mails[0].subject, "New Ticket Created: Email bounce");
        assert!(mails[0].body.contains("Category: General"));
        assert!(mails[0].body.contains("Created by: Ann"));
    }

    #[test]
    fn test_status_change_links_ticket() {
        let ann = profile("Ann", Role::EndUser);
        let bob = profile("Bob", Role::SupportAgent);
        let act = activity(
            TicketEvent::StatusChanged {
                from: TicketStatus::Open,
            },
            &ann,
            Some(&bob),
            &bob,
        );
        let mails = compose(&act, &[], "http://desk/");
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].to, "ann@example.com");
        assert!(mails[0]
            .body
            .contains("http://desk/tickets/00000000-0000-0000-0000-000000000000"));
        assert!(mails[0].body.contains("New Status: In Progress"));
    }

    #[test]
    fn test_comment_dedups_by_address() {
        let bob = profile("Bob", Role::SupportAgent);
        let root = profile("Root", Role::Admin);
        let comment = Comment {
            id: Uuid::new_v4(),
            ticket_id: Uuid::nil(),
            author_id: root.id,
            content: "?".into(),
            created_at: Utc::now(),
        };
        let act = activity(TicketEvent::Commented { comment }, &bob, Some(&bob), &root);
        let mails = compose(&act, &[], "http://desk");
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].subject, "New Comment on Ticket: Email bounce");
    }

    #[test]
    fn test_priority_change_sends_nothing() {
        let ann = profile("Ann", Role::EndUser);
        let bob = profile("Bob", Role::SupportAgent);
        let act = activity(
            TicketEvent::PriorityChanged {
                from: TicketPriority::Low,
            },
            &ann,
            None,
            &bob,
        );
        assert!(compose(&act, &[bob.clone()], "http://desk").is_empty());
    }

    #[test]
    fn test_welcome() {
        let ann = profile("Ann", Role::EndUser);
        let mail = welcome(&ann);
        assert_eq!(mail.subject, "Welcome to QuickDesk Support System");
        assert!(mail.body.starts_with("Hello Ann,"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let ann = profile("Ann", Role::EndUser);
        assert!(LogMailer.send(&welcome(&ann)).await.is_ok());
    }
}
