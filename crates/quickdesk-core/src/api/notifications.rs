//! The caller's in-app notification feed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NoArgs;
use crate::error::{DeskError, Result};
use crate::function::{MutationContext, QueryContext};
use crate::model::NotificationFeed;

/// Number of notifications returned by the feed.
pub const FEED_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NotificationRef {
    pub notification_id: Uuid,
}

desk_query!(
    ListNotifications,
    "list_notifications",
    "Latest notifications for the caller, newest first",
    NoArgs => NotificationFeed,
    list_notifications
);

desk_query!(
    UnreadNotificationCount,
    "unread_notification_count",
    "Unread badge count",
    NoArgs => i64,
    unread_count
);

desk_mutation!(
    MarkNotificationRead,
    "mark_notification_read",
    "Mark one notification as read",
    NotificationRef => (),
    mark_read
);

desk_mutation!(
    MarkAllNotificationsRead,
    "mark_all_notifications_read",
    "Mark every notification as read",
    NoArgs => u64,
    mark_all_read
);

desk_mutation!(
    DeleteNotification,
    "delete_notification",
    "Delete one notification",
    NotificationRef => (),
    delete
);

fn missing(id: Uuid) -> DeskError {
    DeskError::NotFound(format!("Notification {} not found", id))
}

async fn list_notifications(ctx: &QueryContext, _: NoArgs) -> Result<NotificationFeed> {
    let user_id = ctx.viewer().id;
    let items = ctx.store().list_notifications(user_id, FEED_LIMIT).await?;
    let unread = ctx.store().unread_notification_count(user_id).await?;
    Ok(NotificationFeed { items, unread })
}

async fn unread_count(ctx: &QueryContext, _: NoArgs) -> Result<i64> {
    ctx.store().unread_notification_count(ctx.viewer().id).await
}

// The store matches on owner as well as id, so another user's notification
// looks missing.
async fn mark_read(ctx: &MutationContext, args: NotificationRef) -> Result<()> {
    if ctx
        .store()
        .mark_notification_read(ctx.viewer().id, args.notification_id)
        .await?
    {
        Ok(())
    } else {
        Err(missing(args.notification_id))
    }
}

async fn mark_all_read(ctx: &MutationContext, _: NoArgs) -> Result<u64> {
    let updated = ctx.store().mark_all_notifications_read(ctx.viewer().id).await?;
    tracing::debug!(user_id = %ctx.viewer().id, updated, "Notifications marked read");
    Ok(updated)
}

async fn delete(ctx: &MutationContext, args: NotificationRef) -> Result<()> {
    if ctx
        .store()
        .delete_notification(ctx.viewer().id, args.notification_id)
        .await?
    {
        Ok(())
    } else {
        Err(missing(args.notification_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_err_variant;
    use crate::function::{DeskMutation, DeskQuery};
    use crate::model::{NewNotification, NotificationType, Role};
    use crate::store::DeskStore;
    use crate::testing::TestDesk;

    async fn notify(desk: &TestDesk, user_id: Uuid, title: &str) -> Uuid {
        desk.store
            .insert_notification(NewNotification {
                user_id,
                title: title.into(),
                message: format!("{} message", title),
                kind: NotificationType::TicketUpdated,
                ticket_id: None,
                metadata: Default::default(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_feed_and_read_state() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let first = notify(&desk, ann.id, "one").await;
        notify(&desk, ann.id, "two").await;

        let feed = ListNotifications::execute(&desk.query(&ann), NoArgs {})
            .await
            .unwrap();
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.unread, 2);

        MarkNotificationRead::execute(&desk.mutation(&ann), NotificationRef { notification_id: first })
            .await
            .unwrap();
        let unread = UnreadNotificationCount::execute(&desk.query(&ann), NoArgs {})
            .await
            .unwrap();
        assert_eq!(unread, 1);

        let marked = MarkAllNotificationsRead::execute(&desk.mutation(&ann), NoArgs {})
            .await
            .unwrap();
        assert_eq!(marked, 1);
    }

    #[tokio::test]
    async fn test_cannot_touch_others_notifications() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let bob = desk.store.seed_profile("Bob", Role::EndUser);
        let id = notify(&desk, ann.id, "private").await;

        let result =
            MarkNotificationRead::execute(&desk.mutation(&bob), NotificationRef { notification_id: id }).await;
        assert_err_variant!(result, DeskError::NotFound(_));
        let result =
            DeleteNotification::execute(&desk.mutation(&bob), NotificationRef { notification_id: id }).await;
        assert_err_variant!(result, DeskError::NotFound(_));

        DeleteNotification::execute(&desk.mutation(&ann), NotificationRef { notification_id: id })
            .await
            .unwrap();
        assert!(desk.store.notifications().is_empty());
    }
}
