use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::VoteType;

/// A user's vote on a ticket. At most one per (ticket, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

/// Vote totals for one ticket, with the caller's own vote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
    pub mine: Option<VoteType>,
}
