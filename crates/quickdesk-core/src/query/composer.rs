//! Turns a viewer and the list screen's filter state into a [`TicketQuery`].
//!
//! The query is a plain value. The Postgres store renders it to SQL and the
//! in-memory store evaluates it with [`TicketQuery::matches`] and
//! [`TicketQuery::compare`], so both backends agree on what a listing means.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::filters::{AssigneeFilter, SortField, SortOrder, TicketFilters, PAGE_SIZE};
use crate::error::Result;
use crate::model::{Profile, Role, Ticket, TicketPriority, TicketStatus};

/// One conjunct of a ticket listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `creator_id = id`
    CreatedBy(Uuid),
    /// `creator_id = id OR assigned_agent_id = id`
    CreatedByOrAssignedTo(Uuid),
    /// Case-insensitive substring of title or description, taken literally.
    Search(String),
    Status(TicketStatus),
    Priority(TicketPriority),
    Category(Uuid),
    /// `assigned_agent_id IS NULL`
    Unassigned,
    /// `assigned_agent_id = id`
    AssignedTo(Uuid),
}

impl Predicate {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            Predicate::CreatedBy(id) => ticket.creator_id == *id,
            Predicate::CreatedByOrAssignedTo(id) => {
                ticket.creator_id == *id || ticket.assigned_agent_id == Some(*id)
            }
            Predicate::Search(term) => {
                let term = term.to_lowercase();
                ticket.title.to_lowercase().contains(&term)
                    || ticket.description.to_lowercase().contains(&term)
            }
            Predicate::Status(status) => ticket.status == *status,
            Predicate::Priority(priority) => ticket.priority == *priority,
            Predicate::Category(id) => ticket.category_id == *id,
            Predicate::Unassigned => ticket.assigned_agent_id.is_none(),
            Predicate::AssignedTo(id) => ticket.assigned_agent_id == Some(*id),
        }
    }
}

/// A fully composed ticket listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketQuery {
    pub predicates: Vec<Predicate>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    /// Zero-based index of the first row. Wide enough that any `u32` page
    /// maps to its real offset.
    pub offset: u64,
    pub limit: u32,
}

impl TicketQuery {
    /// All predicates hold.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.predicates.iter().all(|p| p.matches(ticket))
    }

    /// Ordering used for the listing. Ties fall back to id so pages are stable.
    pub fn compare(&self, a: &Ticket, b: &Ticket) -> Ordering {
        let primary = match self.sort_field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Status => a.status.cmp(&b.status),
        };
        let ordered = primary.then_with(|| a.id.cmp(&b.id));
        match self.sort_order {
            SortOrder::Asc => ordered,
            SortOrder::Desc => ordered.reverse(),
        }
    }

    /// Inclusive row range, `(from, to)`.
    pub fn range(&self) -> (u64, u64) {
        (
            self.offset,
            self.offset + u64::from(self.limit.saturating_sub(1)),
        )
    }

    /// 1-based page this query selects.
    pub fn page(&self) -> u32 {
        let index = self.offset / u64::from(self.limit.max(1));
        u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1)
    }

    /// Whether the role scope restricts rows to the given creator.
    pub fn is_scoped_to_creator(&self, user_id: Uuid) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::CreatedBy(id) if *id == user_id))
    }
}

/// Arguments of a ticket listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketListRequest {
    #[serde(flatten)]
    pub filters: TicketFilters,
    /// 1-based. Zero is treated as the first page.
    pub page: u32,
    /// Staff only: restrict to tickets the viewer created.
    #[serde(alias = "showMyTicketsOnly")]
    pub mine_only: bool,
}

/// The visibility clause every listing for this viewer starts with.
pub fn role_scope(viewer: &Profile) -> Option<Predicate> {
    match viewer.role {
        Role::EndUser => Some(Predicate::CreatedBy(viewer.id)),
        Role::SupportAgent => Some(Predicate::CreatedByOrAssignedTo(viewer.id)),
        Role::Admin => None,
    }
}

/// Compose the listing for `viewer`.
///
/// The role scope is always the first predicate; no filter can widen it.
pub fn compose(viewer: &Profile, request: &TicketListRequest) -> Result<TicketQuery> {
    let filters = request.filters.parse()?;

    let mut predicates = Vec::new();
    predicates.extend(role_scope(viewer));
    if request.mine_only && viewer.role != Role::EndUser {
        predicates.push(Predicate::CreatedBy(viewer.id));
    }
    if let Some(term) = filters.search {
        predicates.push(Predicate::Search(term));
    }
    if let Some(status) = filters.status {
        predicates.push(Predicate::Status(status));
    }
    if let Some(priority) = filters.priority {
        predicates.push(Predicate::Priority(priority));
    }
    if let Some(category) = filters.category {
        predicates.push(Predicate::Category(category));
    }
    match filters.assignee {
        AssigneeFilter::Any => {}
        AssigneeFilter::Unassigned => predicates.push(Predicate::Unassigned),
        AssigneeFilter::Agent(id) => predicates.push(Predicate::AssignedTo(id)),
    }

    let page = request.page.max(1);
    Ok(TicketQuery {
        predicates,
        sort_field: filters.sort_field,
        sort_order: filters.sort_order,
        offset: u64::from(page - 1) * u64::from(PAGE_SIZE),
        limit: PAGE_SIZE,
    })
}

/// Newest tickets visible to `viewer`, for the dashboard.
pub fn recent(viewer: &Profile, limit: u32) -> TicketQuery {
    TicketQuery {
        predicates: role_scope(viewer).into_iter().collect(),
        sort_field: SortField::CreatedAt,
        sort_order: SortOrder::Desc,
        offset: 0,
        limit,
    }
}
