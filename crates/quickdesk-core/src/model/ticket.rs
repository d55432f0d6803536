use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::{TicketPriority, TicketStatus};

/// A support request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category_id: Uuid,
    pub creator_id: Uuid,
    pub assigned_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id
    }

    pub fn is_assigned_to(&self, user_id: Uuid) -> bool {
        self.assigned_agent_id == Some(user_id)
    }
}

/// A validated ticket ready to be inserted. Status always starts as open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub category_id: Uuid,
    pub creator_id: Uuid,
}

/// Partial update applied by status, priority and assignment changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    /// `Some(None)` clears the assignment.
    pub assigned_agent_id: Option<Option<Uuid>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.assigned_agent_id.is_none()
    }

    /// Apply to an in-memory ticket, bumping `updated_at`.
    pub fn apply(&self, ticket: &mut Ticket, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(agent) = self.assigned_agent_id {
            ticket.assigned_agent_id = agent;
        }
        ticket.updated_at = now;
    }
}

/// A ticket row as shown in list views, with its joined and counted columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: Ticket,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub creator_name: Option<String>,
    pub creator_email: Option<String>,
    pub assigned_agent_name: Option<String>,
    pub comment_count: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub has_attachments: bool,
}

/// One page of a ticket listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPage {
    pub items: Vec<TicketSummary>,
    /// Rows matching the filters across all pages.
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl TicketPage {
    pub fn new(items: Vec<TicketSummary>, total: i64, page: u32, page_size: u32) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64 + page_size as u64 - 1) / page_size as u64) as u32
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            title: "Printer on fire".into(),
            description: "Third floor".into(),
            status: TicketStatus::Open,
            priority: TicketPriority::High,
            category_id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            assigned_agent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_apply() {
        let mut t = ticket();
        let agent = Uuid::new_v4();
        let later = t.updated_at + chrono::Duration::seconds(5);
        let patch = TicketPatch {
            status: Some(TicketStatus::InProgress),
            assigned_agent_id: Some(Some(agent)),
            ..Default::default()
        };
        patch.apply(&mut t, later);
        assert_eq!(t.status, TicketStatus::InProgress);
        assert_eq!(t.priority, TicketPriority::High);
        assert!(t.is_assigned_to(agent));
        assert_eq!(t.updated_at, later);

        TicketPatch {
            assigned_agent_id: Some(None),
            ..Default::default()
        }
        .apply(&mut t, later);
        assert_eq!(t.assigned_agent_id, None);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(TicketPage::new(vec![], 0, 1, 10).total_pages, 0);
        assert_eq!(TicketPage::new(vec![], 10, 1, 10).total_pages, 1);
        assert_eq!(TicketPage::new(vec![], 11, 1, 10).total_pages, 2);
    }
}
