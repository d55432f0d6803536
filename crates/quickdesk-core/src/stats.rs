//! Dashboard and analytics figures, computed with store counts.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Profile, Role, TicketStatus, TicketSummary};
use crate::query::{self, Predicate};
use crate::store::DeskStore;

/// Number of tickets shown under "recent" on the dashboard and in analytics.
pub const RECENT_LIMIT: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub in_progress_tickets: i64,
    pub resolved_tickets: i64,
    /// Agents only: tickets assigned to the viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_tickets: Option<i64>,
    /// Agents only: assigned tickets still open or in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_open_tickets: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent: Vec<TicketSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub closed_tickets: i64,
    pub total_users: i64,
    pub total_categories: i64,
    pub by_status: Vec<LabelCount>,
    pub by_category: Vec<LabelCount>,
    pub recent: Vec<TicketSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_users: i64,
    pub total_tickets: i64,
    pub total_categories: i64,
    pub open_tickets: i64,
    pub closed_tickets: i64,
}

async fn count_with(
    store: &dyn DeskStore,
    scope: &[Predicate],
    extra: Option<Predicate>,
) -> Result<i64> {
    let mut predicates = scope.to_vec();
    predicates.extend(extra);
    store.count_tickets(&predicates).await
}

/// Counts and recent tickets within what `viewer` can see.
pub async fn dashboard(store: &dyn DeskStore, viewer: &Profile) -> Result<Dashboard> {
    let scope: Vec<Predicate> = query::role_scope(viewer).into_iter().collect();

    let mut stats = DashboardStats {
        total_tickets: count_with(store, &scope, None).await?,
        open_tickets: count_with(store, &scope, Some(Predicate::Status(TicketStatus::Open))).await?,
        in_progress_tickets: count_with(
            store,
            &scope,
            Some(Predicate::Status(TicketStatus::InProgress)),
        )
        .await?,
        resolved_tickets: count_with(
            store,
            &scope,
            Some(Predicate::Status(TicketStatus::Resolved)),
        )
        .await?,
        my_tickets: None,
        my_open_tickets: None,
    };

    if viewer.role == Role::SupportAgent {
        let mine = [Predicate::AssignedTo(viewer.id)];
        let open = count_with(store, &mine, Some(Predicate::Status(TicketStatus::Open))).await?;
        let in_progress =
            count_with(store, &mine, Some(Predicate::Status(TicketStatus::InProgress))).await?;
        stats.my_tickets = Some(count_with(store, &mine, None).await?);
        stats.my_open_tickets = Some(open + in_progress);
    }

    let (recent, _) = store
        .list_tickets(&query::recent(viewer, RECENT_LIMIT))
        .await?;
    Ok(Dashboard { stats, recent })
}

pub async fn system_stats(store: &dyn DeskStore) -> Result<SystemStats> {
    Ok(SystemStats {
        total_users: store.count_profiles().await?,
        total_tickets: store.count_tickets(&[]).await?,
        total_categories: store.count_categories().await?,
        open_tickets: store
            .count_tickets(&[Predicate::Status(TicketStatus::Open)])
            .await?,
        closed_tickets: store
            .count_tickets(&[Predicate::Status(TicketStatus::Closed)])
            .await?,
    })
}

/// Desk-wide figures for the analytics page.
pub async fn analytics(store: &dyn DeskStore, viewer: &Profile) -> Result<Analytics> {
    let system = system_stats(store).await?;

    let mut by_status = Vec::with_capacity(TicketStatus::ALL.len());
    for status in TicketStatus::ALL {
        by_status.push(LabelCount {
            label: status.label().to_string(),
            count: store.count_tickets(&[Predicate::Status(*status)]).await?,
        });
    }

    let by_category = store
        .list_categories_with_counts()
        .await?
        .into_iter()
        .map(|c| LabelCount {
            label: c.category.name,
            count: c.ticket_count,
        })
        .collect();

    let (recent, _) = store
        .list_tickets(&query::recent(viewer, RECENT_LIMIT))
        .await?;

    Ok(Analytics {
        total_tickets: system.total_tickets,
        open_tickets: system.open_tickets,
        closed_tickets: system.closed_tickets,
        total_users: system.total_users,
        total_categories: system.total_categories,
        by_status,
        by_category,
        recent,
    })
}
