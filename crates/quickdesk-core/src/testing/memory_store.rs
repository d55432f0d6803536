//! In-memory [`DeskStore`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{DeskError, Result};
use crate::model::{
    Attachment, Category, CategoryInput, CategoryWithCount, Comment, CommentWithAuthor,
    DeskSettings, NewAttachment, NewNotification, NewProfile, NewTicket, Notification,
    NotificationSettings, Profile, ProfileUpdate, Role, Ticket, TicketPatch, TicketStatus,
    TicketSummary, Vote, VoteTally, VoteType,
};
use crate::query::{Predicate, TicketQuery};
use crate::store::DeskStore;

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    categories: HashMap<Uuid, Category>,
    tickets: HashMap<Uuid, Ticket>,
    comments: Vec<Comment>,
    attachments: Vec<Attachment>,
    votes: Vec<Vote>,
    notifications: Vec<Notification>,
    settings: Option<DeskSettings>,
}

/// A [`DeskStore`] over plain collections.
///
/// Counts every call so tests can assert that validation rejected input
/// before storage was reached, and can be told to fail notification inserts.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
    fail_notifications: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make `insert_notification` fail from now on.
    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    /// Insert a profile directly, bypassing call counting.
    pub fn seed_profile(&self, full_name: &str, role: Role) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            email: format!("{}@example.com", full_name.to_lowercase().replace(' ', ".")),
            role,
            notification_settings: NotificationSettings::default(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .unwrap()
            .profiles
            .insert(profile.id, profile.clone());
        profile
    }

    pub fn seed_category(&self, name: &str) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            color: crate::model::default_color(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .unwrap()
            .categories
            .insert(category.id, category.clone());
        category
    }

    /// Insert a ticket directly. `created_at` is spaced one second apart
    /// per ticket so ordering is deterministic.
    pub fn seed_ticket(
        &self,
        title: &str,
        category: &Category,
        creator: &Profile,
        agent: Option<&Profile>,
    ) -> Ticket {
        let mut tables = self.tables.write().unwrap();
        let at = Utc::now() + chrono::Duration::seconds(tables.tickets.len() as i64);
        let ticket = Ticket {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("{} description", title),
            status: TicketStatus::Open,
            priority: Default::default(),
            category_id: category.id,
            creator_id: creator.id,
            assigned_agent_id: agent.map(|a| a.id),
            created_at: at,
            updated_at: at,
        };
        tables.tickets.insert(ticket.id, ticket.clone());
        ticket
    }

    /// Every vote row, for uniqueness checks.
    pub fn votes(&self) -> Vec<Vote> {
        self.tables.read().unwrap().votes.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.tables.read().unwrap().notifications.clone()
    }

    pub fn ticket_count(&self) -> usize {
        self.tables.read().unwrap().tickets.len()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn summarize(tables: &Tables, ticket: &Ticket) -> TicketSummary {
    let category = tables.categories.get(&ticket.category_id);
    let creator = tables.profiles.get(&ticket.creator_id);
    let agent = ticket
        .assigned_agent_id
        .and_then(|id| tables.profiles.get(&id));
    let votes = tables.votes.iter().filter(|v| v.ticket_id == ticket.id);
    let (upvotes, downvotes) = votes.fold((0, 0), |(up, down), v| match v.vote_type {
        VoteType::Upvote => (up + 1, down),
        VoteType::Downvote => (up, down + 1),
    });

    TicketSummary {
        ticket: ticket.clone(),
        category_name: category.map(|c| c.name.clone()),
        category_color: category.map(|c| c.color.clone()),
        creator_name: creator.map(|p| p.full_name.clone()),
        creator_email: creator.map(|p| p.email.clone()),
        assigned_agent_name: agent.map(|p| p.full_name.clone()),
        comment_count: tables
            .comments
            .iter()
            .filter(|c| c.ticket_id == ticket.id)
            .count() as i64,
        upvotes,
        downvotes,
        has_attachments: tables.attachments.iter().any(|a| a.ticket_id == ticket.id),
    }
}

fn not_found(what: &str, id: Uuid) -> DeskError {
    DeskError::NotFound(format!("{} {} not found", what, id))
}

#[async_trait]
impl DeskStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.touch();
        Ok(self.tables.read().unwrap().profiles.get(&id).cloned())
    }

    async fn create_profile(&self, new: NewProfile) -> Result<Profile> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        if tables.profiles.contains_key(&new.id) {
            return Err(DeskError::Conflict(format!("Profile {} exists", new.id)));
        }
        let now = Utc::now();
        let profile = Profile {
            id: new.id,
            full_name: new.full_name,
            email: new.email,
            role: Role::EndUser,
            notification_settings: NotificationSettings::default(),
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.touch();
        let mut profiles: Vec<Profile> =
            self.tables.read().unwrap().profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn list_staff(&self) -> Result<Vec<Profile>> {
        self.touch();
        let mut staff: Vec<Profile> = self
            .tables
            .read()
            .unwrap()
            .profiles
            .values()
            .filter(|p| p.is_staff())
            .cloned()
            .collect();
        staff.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(staff)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Profile> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or_else(|| not_found("Profile", id))?;
        if let Some(name) = update.full_name {
            profile.full_name = name;
        }
        if let Some(email) = update.email {
            profile.email = email;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Profile> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or_else(|| not_found("Profile", id))?;
        profile.role = role;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn update_notification_settings(
        &self,
        id: Uuid,
        settings: NotificationSettings,
    ) -> Result<Profile> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or_else(|| not_found("Profile", id))?;
        profile.notification_settings = settings;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn count_profiles(&self) -> Result<i64> {
        self.touch();
        Ok(self.tables.read().unwrap().profiles.len() as i64)
    }

    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        self.touch();
        let mut categories: Vec<Category> = self
            .tables
            .read()
            .unwrap()
            .categories
            .values()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_categories_with_counts(&self) -> Result<Vec<CategoryWithCount>> {
        self.touch();
        let tables = self.tables.read().unwrap();
        let mut out: Vec<CategoryWithCount> = tables
            .categories
            .values()
            .map(|c| CategoryWithCount {
                category: c.clone(),
                ticket_count: tables
                    .tickets
                    .values()
                    .filter(|t| t.category_id == c.id)
                    .count() as i64,
            })
            .collect();
        out.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(out)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        self.touch();
        Ok(self.tables.read().unwrap().categories.get(&id).cloned())
    }

    async fn create_category(&self, input: CategoryInput) -> Result<Category> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        if tables.categories.values().any(|c| c.name == input.name) {
            return Err(DeskError::Conflict(format!(
                "A category named '{}' already exists",
                input.name
            )));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            color: input.color,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, input: CategoryInput) -> Result<Category> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let category = tables
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found("Category", id))?;
        category.name = input.name;
        category.description = input.description;
        category.color = input.color;
        Ok(category.clone())
    }

    async fn set_category_active(&self, id: Uuid, active: bool) -> Result<Category> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let category = tables
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found("Category", id))?;
        category.is_active = active;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        if tables.tickets.values().any(|t| t.category_id == id) {
            return Err(DeskError::Conflict(
                "Category still has tickets".into(),
            ));
        }
        tables
            .categories
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Category", id))
    }

    async fn count_categories(&self) -> Result<i64> {
        self.touch();
        Ok(self.tables.read().unwrap().categories.len() as i64)
    }

    async fn insert_ticket(&self, new: NewTicket) -> Result<Ticket> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        if !tables.categories.contains_key(&new.category_id) {
            return Err(DeskError::Validation(format!(
                "Category {} does not exist",
                new.category_id
            )));
        }
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            status: TicketStatus::Open,
            priority: new.priority,
            category_id: new.category_id,
            creator_id: new.creator_id,
            assigned_agent_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        self.touch();
        Ok(self.tables.read().unwrap().tickets.get(&id).cloned())
    }

    async fn list_tickets(&self, query: &TicketQuery) -> Result<(Vec<TicketSummary>, i64)> {
        self.touch();
        let tables = self.tables.read().unwrap();
        let mut rows: Vec<&Ticket> = tables.tickets.values().filter(|t| query.matches(t)).collect();
        rows.sort_by(|a, b| query.compare(a, b));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .map(|t| summarize(&tables, t))
            .collect();
        Ok((page, total))
    }

    async fn count_tickets(&self, predicates: &[Predicate]) -> Result<i64> {
        self.touch();
        Ok(self
            .tables
            .read()
            .unwrap()
            .tickets
            .values()
            .filter(|t| predicates.iter().all(|p| p.matches(t)))
            .count() as i64)
    }

    async fn update_ticket(&self, id: Uuid, patch: TicketPatch) -> Result<Ticket> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let ticket = tables
            .tickets
            .get_mut(&id)
            .ok_or_else(|| not_found("Ticket", id))?;
        patch.apply(ticket, Utc::now());
        Ok(ticket.clone())
    }

    async fn insert_comment(
        &self,
        ticket_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment> {
        self.touch();
        let comment = Comment {
            id: Uuid::new_v4(),
            ticket_id,
            author_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.tables.write().unwrap().comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        self.touch();
        let tables = self.tables.read().unwrap();
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.ticket_id == ticket_id)
            .map(|c| {
                let author = tables.profiles.get(&c.author_id);
                CommentWithAuthor {
                    comment: c.clone(),
                    author_name: author.map(|p| p.full_name.clone()),
                    author_email: author.map(|p| p.email.clone()),
                }
            })
            .collect())
    }

    async fn insert_attachment(&self, new: NewAttachment) -> Result<Attachment> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        if tables.attachments.iter().any(|a| a.file_path == new.file_path) {
            return Err(DeskError::Conflict(
                "An attachment already uses that path".into(),
            ));
        }
        let attachment = Attachment {
            id: Uuid::new_v4(),
            ticket_id: new.ticket_id,
            file_name: new.file_name,
            file_path: new.file_path,
            file_size: new.file_size,
            file_type: new.file_type,
            uploaded_by: new.uploaded_by,
            created_at: Utc::now(),
        };
        tables.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn list_attachments(&self, ticket_id: Uuid) -> Result<Vec<Attachment>> {
        self.touch();
        Ok(self
            .tables
            .read()
            .unwrap()
            .attachments
            .iter()
            .filter(|a| a.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>> {
        self.touch();
        Ok(self
            .tables
            .read()
            .unwrap()
            .attachments
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn delete_attachment(&self, id: Uuid) -> Result<()> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let before = tables.attachments.len();
        tables.attachments.retain(|a| a.id != id);
        if tables.attachments.len() == before {
            return Err(not_found("Attachment", id));
        }
        Ok(())
    }

    async fn upsert_vote(&self, ticket_id: Uuid, user_id: Uuid, vote_type: VoteType) -> Result<Vote> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        if let Some(existing) = tables
            .votes
            .iter_mut()
            .find(|v| v.ticket_id == ticket_id && v.user_id == user_id)
        {
            existing.vote_type = vote_type;
            return Ok(existing.clone());
        }
        let vote = Vote {
            ticket_id,
            user_id,
            vote_type,
            created_at: Utc::now(),
        };
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    async fn remove_vote(&self, ticket_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let before = tables.votes.len();
        tables
            .votes
            .retain(|v| !(v.ticket_id == ticket_id && v.user_id == user_id));
        Ok(tables.votes.len() != before)
    }

    async fn vote_tally(&self, ticket_id: Uuid, user_id: Uuid) -> Result<VoteTally> {
        self.touch();
        let tables = self.tables.read().unwrap();
        let mut tally = VoteTally::default();
        for vote in tables.votes.iter().filter(|v| v.ticket_id == ticket_id) {
            match vote.vote_type {
                VoteType::Upvote => tally.upvotes += 1,
                VoteType::Downvote => tally.downvotes += 1,
            }
            if vote.user_id == user_id {
                tally.mine = Some(vote.vote_type);
            }
        }
        Ok(tally)
    }

    async fn insert_notification(&self, new: NewNotification) -> Result<Notification> {
        self.touch();
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(DeskError::Database("notification insert failed".into()));
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            kind: new.kind,
            ticket_id: new.ticket_id,
            read: false,
            metadata: new.metadata,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .unwrap()
            .notifications
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        self.touch();
        let tables = self.tables.read().unwrap();
        // Insertion order stands in for created_at, newest last.
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn unread_notification_count(&self, user_id: Uuid) -> Result<i64> {
        self.touch();
        Ok(self
            .tables
            .read()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let mut flipped = 0;
        for n in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.touch();
        let mut tables = self.tables.write().unwrap();
        let before = tables.notifications.len();
        tables
            .notifications
            .retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(tables.notifications.len() != before)
    }

    async fn load_settings(&self) -> Result<DeskSettings> {
        self.touch();
        Ok(self
            .tables
            .read()
            .unwrap()
            .settings
            .clone()
            .unwrap_or_default())
    }

    async fn save_settings(&self, settings: &DeskSettings) -> Result<()> {
        self.touch();
        self.tables.write().unwrap().settings = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vote_upsert_keeps_one_row() {
        let store = MemoryStore::new();
        let ticket = Uuid::new_v4();
        let user = Uuid::new_v4();

        store.upsert_vote(ticket, user, VoteType::Upvote).await.unwrap();
        store.upsert_vote(ticket, user, VoteType::Upvote).await.unwrap();
        store.upsert_vote(ticket, user, VoteType::Downvote).await.unwrap();

        let votes = store.votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote_type, VoteType::Downvote);

        let tally = store.vote_tally(ticket, user).await.unwrap();
        assert_eq!((tally.upvotes, tally.downvotes), (0, 1));
        assert_eq!(tally.mine, Some(VoteType::Downvote));
    }

    #[tokio::test]
    async fn test_delete_category_in_use_conflicts() {
        let store = MemoryStore::new();
        let category = store.seed_category("Hardware");
        let ann = store.seed_profile("Ann", Role::EndUser);
        store.seed_ticket("a", &category, &ann, None);

        assert!(matches!(
            store.delete_category(category.id).await,
            Err(DeskError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_attachment_paths_are_unique() {
        let store = MemoryStore::new();
        let ann = store.seed_profile("Ann", Role::EndUser);
        let attachment = |ticket_id| NewAttachment {
            ticket_id,
            file_name: "log.txt".into(),
            file_path: "tickets/t/1-log.txt".into(),
            file_size: 4,
            file_type: "text/plain".into(),
            uploaded_by: ann.id,
        };

        store.insert_attachment(attachment(Uuid::new_v4())).await.unwrap();
        assert!(matches!(
            store.insert_attachment(attachment(Uuid::new_v4())).await,
            Err(DeskError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_call_counting() {
        let store = MemoryStore::new();
        store.seed_profile("Ann", Role::EndUser);
        assert_eq!(store.call_count(), 0);
        store.count_profiles().await.unwrap();
        assert_eq!(store.call_count(), 1);
    }
}
