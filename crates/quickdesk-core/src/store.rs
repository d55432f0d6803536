//! The persistence seam. Every desk function talks to storage through
//! [`DeskStore`]; the runtime provides the Postgres implementation and
//! [`crate::testing::MemoryStore`] backs the tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Attachment, Category, CategoryInput, CategoryWithCount, Comment, CommentWithAuthor,
    DeskSettings, NewAttachment, NewNotification, NewProfile, NewTicket, Notification,
    NotificationSettings, Profile, ProfileUpdate, Role, Ticket, TicketPatch, TicketSummary, Vote,
    VoteTally, VoteType,
};
use crate::query::{Predicate, TicketQuery};

/// Data access for the desk.
///
/// Methods are single round trips; nothing here spans a transaction across
/// entities. Lookups return `Ok(None)` for missing rows, updates of missing
/// rows return `NotFound`.
#[async_trait]
pub trait DeskStore: Send + Sync + 'static {
    // Profiles

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile>;

    /// All profiles, newest first.
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Support agents and admins, by name.
    async fn list_staff(&self) -> Result<Vec<Profile>>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Profile>;

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Profile>;

    async fn update_notification_settings(
        &self,
        id: Uuid,
        settings: NotificationSettings,
    ) -> Result<Profile>;

    async fn count_profiles(&self) -> Result<i64>;

    // Categories

    /// Categories by name, optionally only active ones.
    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>>;

    /// Every category by name with its ticket count.
    async fn list_categories_with_counts(&self) -> Result<Vec<CategoryWithCount>>;

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;

    async fn create_category(&self, input: CategoryInput) -> Result<Category>;

    async fn update_category(&self, id: Uuid, input: CategoryInput) -> Result<Category>;

    async fn set_category_active(&self, id: Uuid, active: bool) -> Result<Category>;

    /// Fails with `Conflict` while tickets still reference the category.
    async fn delete_category(&self, id: Uuid) -> Result<()>;

    async fn count_categories(&self) -> Result<i64>;

    // Tickets

    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket>;

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>>;

    /// One page of `query` and the number of rows matching it overall.
    async fn list_tickets(&self, query: &TicketQuery) -> Result<(Vec<TicketSummary>, i64)>;

    /// Rows matching all predicates.
    async fn count_tickets(&self, predicates: &[Predicate]) -> Result<i64>;

    async fn update_ticket(&self, id: Uuid, patch: TicketPatch) -> Result<Ticket>;

    // Comments

    async fn insert_comment(&self, ticket_id: Uuid, author_id: Uuid, content: &str)
        -> Result<Comment>;

    /// Oldest first.
    async fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<CommentWithAuthor>>;

    // Attachments

    async fn insert_attachment(&self, attachment: NewAttachment) -> Result<Attachment>;

    async fn list_attachments(&self, ticket_id: Uuid) -> Result<Vec<Attachment>>;

    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>>;

    async fn delete_attachment(&self, id: Uuid) -> Result<()>;

    // Votes

    /// Insert or replace the vote of `user_id` on `ticket_id`.
    async fn upsert_vote(&self, ticket_id: Uuid, user_id: Uuid, vote_type: VoteType)
        -> Result<Vote>;

    /// Returns whether a vote existed.
    async fn remove_vote(&self, ticket_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn vote_tally(&self, ticket_id: Uuid, user_id: Uuid) -> Result<VoteTally>;

    // Notifications

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;

    /// Newest first, at most `limit`.
    async fn list_notifications(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>>;

    async fn unread_notification_count(&self, user_id: Uuid) -> Result<i64>;

    /// Returns whether a notification owned by `user_id` was updated.
    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool>;

    /// Returns the number of notifications flipped to read.
    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64>;

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool>;

    // Settings

    /// Stored settings, or defaults when none were saved.
    async fn load_settings(&self) -> Result<DeskSettings>;

    async fn save_settings(&self, settings: &DeskSettings) -> Result<()>;
}
