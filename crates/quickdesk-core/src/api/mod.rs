//! The desk functions callable over RPC.
//!
//! Each function is an `async fn` taking its context and arguments; the
//! `desk_query!` and `desk_mutation!` macros wrap them in unit structs
//! implementing [`DeskQuery`](crate::function::DeskQuery) or
//! [`DeskMutation`](crate::function::DeskMutation).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access;
use crate::error::{DeskError, Result};
use crate::function::{DeskMutation, DeskQuery, MutationContext};
use crate::model::{Profile, Ticket};
use crate::notify::{FanoutReport, TicketActivity, TicketEvent};
use crate::store::DeskStore;

macro_rules! desk_query {
    ($(#[$meta:meta])* $ty:ident, $name:literal, $desc:literal, $args:ty => $out:ty, $func:path $(, $admin:ident)?) => {
        $(#[$meta])*
        pub struct $ty;

        impl $crate::function::DeskQuery for $ty {
            type Args = $args;
            type Output = $out;

            fn info() -> $crate::function::FunctionInfo {
                $crate::function::FunctionInfo::query($name, $desc)$(.$admin())?
            }

            fn execute(
                ctx: &$crate::function::QueryContext,
                args: Self::Args,
            ) -> ::std::pin::Pin<
                Box<dyn ::std::future::Future<Output = $crate::Result<Self::Output>> + Send + '_>,
            > {
                Box::pin($func(ctx, args))
            }
        }
    };
}

macro_rules! desk_mutation {
    ($(#[$meta:meta])* $ty:ident, $name:literal, $desc:literal, $args:ty => $out:ty, $func:path $(, $admin:ident)?) => {
        $(#[$meta])*
        pub struct $ty;

        impl $crate::function::DeskMutation for $ty {
            type Args = $args;
            type Output = $out;

            fn info() -> $crate::function::FunctionInfo {
                $crate::function::FunctionInfo::mutation($name, $desc)$(.$admin())?
            }

            fn execute(
                ctx: &$crate::function::MutationContext,
                args: Self::Args,
            ) -> ::std::pin::Pin<
                Box<dyn ::std::future::Future<Output = $crate::Result<Self::Output>> + Send + '_>,
            > {
                Box::pin($func(ctx, args))
            }
        }
    };
}

pub mod admin;
pub mod attachments;
pub mod comments;
pub mod dashboard;
pub mod notifications;
pub mod profile;
pub mod tickets;
pub mod votes;

/// Arguments of functions that take none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArgs {}

/// Arguments naming a single ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub ticket_id: Uuid,
}

/// Public face of a profile shown next to tickets and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

impl From<&Profile> for Person {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id,
            full_name: p.full_name.clone(),
            email: p.email.clone(),
        }
    }
}

/// Something that collects desk functions, such as the runtime's registry.
pub trait Registrar {
    fn query<Q: DeskQuery>(&mut self)
    where
        Q::Args: Send + 'static,
        Q::Output: Send + 'static;

    fn mutation<M: DeskMutation>(&mut self)
    where
        M::Args: Send + 'static,
        M::Output: Send + 'static;
}

/// Register every desk function.
pub fn register_all<R: Registrar>(r: &mut R) {
    r.query::<profile::GetSession>();
    r.query::<tickets::ListTickets>();
    r.query::<tickets::GetTicket>();
    r.query::<comments::ListComments>();
    r.query::<attachments::ListAttachments>();
    r.query::<tickets::ListCategories>();
    r.query::<tickets::ListAgents>();
    r.query::<dashboard::GetDashboard>();
    r.query::<notifications::ListNotifications>();
    r.query::<notifications::UnreadNotificationCount>();
    r.query::<profile::GetNotificationSettings>();
    r.query::<admin::ListUsers>();
    r.query::<admin::ListAllCategories>();
    r.query::<admin::GetSettings>();
    r.query::<admin::GetSystemStats>();
    r.query::<dashboard::GetAnalytics>();

    r.mutation::<tickets::CreateTicket>();
    r.mutation::<tickets::UpdateTicketStatus>();
    r.mutation::<tickets::UpdateTicketPriority>();
    r.mutation::<tickets::AssignTicket>();
    r.mutation::<comments::AddComment>();
    r.mutation::<votes::CastVote>();
    r.mutation::<votes::RemoveVote>();
    r.mutation::<attachments::DeleteAttachment>();
    r.mutation::<notifications::MarkNotificationRead>();
    r.mutation::<notifications::MarkAllNotificationsRead>();
    r.mutation::<notifications::DeleteNotification>();
    r.mutation::<profile::UpdateProfile>();
    r.mutation::<profile::UpdateNotificationSettings>();
    r.mutation::<profile::ResetNotificationSettings>();
    r.mutation::<admin::UpdateUserRole>();
    r.mutation::<admin::UpdateUser>();
    r.mutation::<admin::CreateCategory>();
    r.mutation::<admin::UpdateCategory>();
    r.mutation::<admin::ToggleCategory>();
    r.mutation::<admin::DeleteCategory>();
    r.mutation::<admin::UpdateSettings>();
}

/// Load a ticket and run the detail-view access check on it.
pub async fn visible_ticket(store: &dyn DeskStore, viewer: &Profile, ticket_id: Uuid) -> Result<Ticket> {
    let ticket = store
        .get_ticket(ticket_id)
        .await?
        .ok_or_else(|| DeskError::NotFound(format!("Ticket {} not found", ticket_id)))?;
    access::require_ticket_access(viewer, &ticket)?;
    Ok(ticket)
}

async fn activity(ctx: &MutationContext, event: TicketEvent, ticket: &Ticket) -> Result<TicketActivity> {
    let store = ctx.store();
    let creator = if ticket.creator_id == ctx.viewer().id {
        ctx.viewer().clone()
    } else {
        store.get_profile(ticket.creator_id).await?.ok_or_else(|| {
            DeskError::NotFound(format!("Creator {} of ticket {} not found", ticket.creator_id, ticket.id))
        })?
    };
    let agent = match ticket.assigned_agent_id {
        Some(id) if id == ctx.viewer().id => Some(ctx.viewer().clone()),
        Some(id) => store.get_profile(id).await?,
        None => None,
    };
    let category_name = store.get_category(ticket.category_id).await?.map(|c| c.name);

    Ok(TicketActivity {
        event,
        ticket: ticket.clone(),
        creator,
        agent,
        actor: ctx.viewer().clone(),
        category_name,
    })
}

/// Fan out notifications for a change that already happened. Never fails.
pub(crate) async fn notify(ctx: &MutationContext, event: TicketEvent, ticket: &Ticket) -> FanoutReport {
    match activity(ctx, event, ticket).await {
        Ok(activity) => ctx.notifier().dispatch(&activity).await,
        Err(e) => {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Skipping notifications");
            FanoutReport::default()
        }
    }
}
