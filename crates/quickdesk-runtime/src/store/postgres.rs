use async_trait::async_trait;
use quickdesk_core::error::{DeskError, Result};
use quickdesk_core::model::{
    Attachment, Category, CategoryInput, CategoryWithCount, Comment, CommentWithAuthor,
    DeskSettings, NewAttachment, NewNotification, NewProfile, NewTicket, Notification,
    NotificationSettings, Profile, ProfileUpdate, Role, Ticket, TicketPatch, TicketSummary, Vote,
    VoteTally, VoteType,
};
use quickdesk_core::query::{Predicate, TicketQuery};
use quickdesk_core::store::DeskStore;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::sql;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// [`DeskStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn violation(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Map a unique violation to `Conflict`, everything else passes through.
fn conflict_on_duplicate(err: sqlx::Error, message: &str) -> DeskError {
    match violation(&err).as_deref() {
        Some(UNIQUE_VIOLATION) => DeskError::Conflict(message.to_string()),
        _ => DeskError::Sql(err),
    }
}

fn missing(what: &str, id: Uuid) -> DeskError {
    DeskError::NotFound(format!("{} {}", what, id))
}

#[async_trait]
impl DeskStore for PgStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, full_name, email, role, notification_settings)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(Role::EndUser)
        .bind(Json(NotificationSettings::default()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Profile already exists"))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let profiles =
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(profiles)
    }

    async fn list_staff(&self) -> Result<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles
            WHERE role IN ('support_agent', 'admin')
            ORDER BY full_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(profiles)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.full_name)
        .bind(update.email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Profile", id))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            "UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Profile", id))
    }

    async fn update_notification_settings(
        &self,
        id: Uuid,
        settings: NotificationSettings,
    ) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET notification_settings = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(settings))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Profile", id))
    }

    async fn count_profiles(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE ($1 = FALSE OR is_active) ORDER BY name ASC",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn list_categories_with_counts(&self) -> Result<Vec<CategoryWithCount>> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM tickets t WHERE t.category_id = c.id) AS ticket_count
            FROM categories c
            ORDER BY c.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn create_category(&self, input: CategoryInput) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, color)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "A category with that name already exists"))
    }

    async fn update_category(&self, id: Uuid, input: CategoryInput) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET name = $2, description = $3, color = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.color)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "A category with that name already exists"))?
        .ok_or_else(|| missing("Category", id))
    }

    async fn set_category_active(&self, id: Uuid, active: bool) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET is_active = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Category", id))
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        let (in_use,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE category_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if in_use > 0 {
            return Err(DeskError::Conflict(format!(
                "Category is used by {} ticket(s)",
                in_use
            )));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e).as_deref() {
                // A ticket slipped in between the count and the delete.
                Some(FOREIGN_KEY_VIOLATION) => {
                    DeskError::Conflict("Category is used by tickets".into())
                }
                _ => DeskError::Sql(e),
            })?;
        if result.rows_affected() == 0 {
            return Err(missing("Category", id));
        }
        Ok(())
    }

    async fn count_categories(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (title, description, priority, category_id, creator_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.priority)
        .bind(ticket.category_id)
        .bind(ticket.creator_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violation(&e).as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => {
                DeskError::Validation("Please choose an active category.".into())
            }
            _ => DeskError::Sql(e),
        })
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn list_tickets(&self, query: &TicketQuery) -> Result<(Vec<TicketSummary>, i64)> {
        let rows = sql::ticket_page(query)
            .build_query_as::<TicketSummary>()
            .fetch_all(&self.pool)
            .await?;
        let total = self.count_tickets(&query.predicates).await?;
        Ok((rows, total))
    }

    async fn count_tickets(&self, predicates: &[Predicate]) -> Result<i64> {
        let count = sql::ticket_count(predicates)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_ticket(&self, id: Uuid, patch: TicketPatch) -> Result<Ticket> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("UPDATE tickets SET updated_at = NOW()");
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = patch.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(agent) = patch.assigned_agent_id {
            qb.push(", assigned_agent_id = ").push_bind(agent);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        qb.build_query_as::<Ticket>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| missing("Ticket", id))
    }

    async fn insert_comment(
        &self,
        ticket_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO ticket_comments (ticket_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.*, p.full_name AS author_name, p.email AS author_email
            FROM ticket_comments c
            LEFT JOIN profiles p ON p.id = c.author_id
            WHERE c.ticket_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn insert_attachment(&self, attachment: NewAttachment) -> Result<Attachment> {
        sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO ticket_attachments
                (ticket_id, file_name, file_path, file_size, file_type, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(attachment.ticket_id)
        .bind(&attachment.file_name)
        .bind(&attachment.file_path)
        .bind(attachment.file_size)
        .bind(&attachment.file_type)
        .bind(attachment.uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "An attachment already uses that path"))
    }

    async fn list_attachments(&self, ticket_id: Uuid) -> Result<Vec<Attachment>> {
        let attachments = sqlx::query_as::<_, Attachment>(
            "SELECT * FROM ticket_attachments WHERE ticket_id = $1 ORDER BY created_at ASC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attachments)
    }

    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>> {
        let attachment =
            sqlx::query_as::<_, Attachment>("SELECT * FROM ticket_attachments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(attachment)
    }

    async fn delete_attachment(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM ticket_attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(missing("Attachment", id));
        }
        Ok(())
    }

    async fn upsert_vote(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        vote_type: VoteType,
    ) -> Result<Vote> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO ticket_votes (ticket_id, user_id, vote_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (ticket_id, user_id)
            DO UPDATE SET vote_type = EXCLUDED.vote_type, created_at = NOW()
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .bind(vote_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn remove_vote(&self, ticket_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ticket_votes WHERE ticket_id = $1 AND user_id = $2")
            .bind(ticket_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn vote_tally(&self, ticket_id: Uuid, user_id: Uuid) -> Result<VoteTally> {
        let (upvotes, downvotes, mine): (i64, i64, Option<VoteType>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE vote_type = 'upvote'),
                COUNT(*) FILTER (WHERE vote_type = 'downvote'),
                (SELECT vote_type FROM ticket_votes WHERE ticket_id = $1 AND user_id = $2)
            FROM ticket_votes
            WHERE ticket_id = $1
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(VoteTally {
            upvotes,
            downvotes,
            mine,
        })
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, title, message, type, ticket_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind)
        .bind(notification.ticket_id)
        .bind(Json(&notification.metadata))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_notifications(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn unread_notification_count(&self, user_id: Uuid) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $2 AND user_id = $1")
                .bind(user_id)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $2 AND user_id = $1")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_settings(&self) -> Result<DeskSettings> {
        let row: Option<(Json<DeskSettings>,)> =
            sqlx::query_as("SELECT settings FROM app_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(settings),)| settings).unwrap_or_default())
    }

    async fn save_settings(&self, settings: &DeskSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (id, settings, updated_at)
            VALUES (1, $1, NOW())
            ON CONFLICT (id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()
            "#,
        )
        .bind(Json(settings))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
