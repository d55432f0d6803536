//! Ticket listing, detail and triage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{notify, visible_ticket, NoArgs, Person, TicketRef};
use crate::access;
use crate::error::{DeskError, Result};
use crate::function::{MutationContext, QueryContext};
use crate::model::{Category, Ticket, TicketPage, TicketPatch, TicketPriority, TicketStatus, VoteTally};
use crate::notify::TicketEvent;
use crate::query::{self, TicketListRequest};
use crate::validation::CreateTicketInput;

/// A ticket with everything the detail view renders around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub category: Option<Category>,
    pub creator: Option<Person>,
    pub assigned_agent: Option<Person>,
    pub votes: VoteTally,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub ticket_id: Uuid,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityChange {
    pub ticket_id: Uuid,
    pub priority: TicketPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub ticket_id: Uuid,
    /// `null` unassigns.
    #[serde(default)]
    pub agent_id: Option<Uuid>,
}

desk_query!(
    ListTickets,
    "list_tickets",
    "One page of the tickets visible to the caller",
    TicketListRequest => TicketPage,
    list_tickets
);

desk_query!(
    GetTicket,
    "get_ticket",
    "Ticket detail, if the caller may see it",
    TicketRef => TicketDetail,
    get_ticket
);

desk_query!(
    ListCategories,
    "list_categories",
    "Active categories for the ticket form and filters",
    NoArgs => Vec<Category>,
    list_categories
);

desk_query!(
    ListAgents,
    "list_agents",
    "Support agents and admins a ticket can be assigned to",
    NoArgs => Vec<Person>,
    list_agents
);

desk_mutation!(
    /// Validates the form before touching the store.
    CreateTicket,
    "create_ticket",
    "Open a new ticket",
    CreateTicketInput => Ticket,
    create_ticket
);

desk_mutation!(
    UpdateTicketStatus,
    "update_ticket_status",
    "Move a ticket through its lifecycle",
    StatusChange => Ticket,
    update_status
);

desk_mutation!(
    UpdateTicketPriority,
    "update_ticket_priority",
    "Change a ticket's priority",
    PriorityChange => Ticket,
    update_priority
);

desk_mutation!(
    AssignTicket,
    "assign_ticket",
    "Assign a ticket to an agent or clear the assignment",
    Assignment => Ticket,
    assign
);

pub async fn list_tickets(ctx: &QueryContext, req: TicketListRequest) -> Result<TicketPage> {
    let query = query::compose(ctx.viewer(), &req)?;
    let (items, total) = ctx.store().list_tickets(&query).await?;
    Ok(TicketPage::new(items, total, query.page(), query.limit))
}

pub async fn get_ticket(ctx: &QueryContext, args: TicketRef) -> Result<TicketDetail> {
    let store = ctx.store();
    let ticket = visible_ticket(store, ctx.viewer(), args.ticket_id).await?;

    let category = store.get_category(ticket.category_id).await?;
    let creator = store.get_profile(ticket.creator_id).await?;
    let assigned_agent = match ticket.assigned_agent_id {
        Some(id) => store.get_profile(id).await?,
        None => None,
    };
    let votes = store.vote_tally(ticket.id, ctx.viewer().id).await?;

    Ok(TicketDetail {
        ticket,
        category,
        creator: creator.as_ref().map(Person::from),
        assigned_agent: assigned_agent.as_ref().map(Person::from),
        votes,
    })
}

async fn list_categories(ctx: &QueryContext, _: NoArgs) -> Result<Vec<Category>> {
    ctx.store().list_categories(true).await
}

async fn list_agents(ctx: &QueryContext, _: NoArgs) -> Result<Vec<Person>> {
    access::require_staff(ctx.viewer())?;
    let staff = ctx.store().list_staff().await?;
    Ok(staff.iter().map(Person::from).collect())
}

/// Create a ticket as the caller and tell staff about it.
pub async fn create_ticket(ctx: &MutationContext, input: CreateTicketInput) -> Result<Ticket> {
    let new_ticket = input.validate(ctx.viewer().id)?;

    let category = ctx
        .store()
        .get_category(new_ticket.category_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| DeskError::Validation("Please choose an active category.".into()))?;

    let ticket = ctx.store().insert_ticket(new_ticket).await?;
    tracing::info!(
        ticket_id = %ticket.id,
        creator_id = %ticket.creator_id,
        category = %category.name,
        priority = %ticket.priority,
        "Ticket created"
    );

    notify(ctx, TicketEvent::Created, &ticket).await;
    Ok(ticket)
}

pub async fn update_status(ctx: &MutationContext, args: StatusChange) -> Result<Ticket> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    access::require_status_change(ctx.viewer(), &ticket, args.status)?;
    if ticket.status == args.status {
        return Ok(ticket);
    }

    let from = ticket.status;
    let patch = TicketPatch {
        status: Some(args.status),
        ..Default::default()
    };
    let updated = ctx.store().update_ticket(ticket.id, patch).await?;
    tracing::info!(
        ticket_id = %updated.id,
        from = %from,
        to = %updated.status,
        by = %ctx.viewer().id,
        "Ticket status changed"
    );

    notify(ctx, TicketEvent::StatusChanged { from }, &updated).await;
    Ok(updated)
}

pub async fn update_priority(ctx: &MutationContext, args: PriorityChange) -> Result<Ticket> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    access::require_triage(ctx.viewer(), &ticket)?;
    if ticket.priority == args.priority {
        return Ok(ticket);
    }

    let from = ticket.priority;
    let patch = TicketPatch {
        priority: Some(args.priority),
        ..Default::default()
    };
    let updated = ctx.store().update_ticket(ticket.id, patch).await?;
    tracing::info!(ticket_id = %updated.id, from = %from, to = %updated.priority, "Ticket priority changed");

    notify(ctx, TicketEvent::PriorityChanged { from }, &updated).await;
    Ok(updated)
}

pub async fn assign(ctx: &MutationContext, args: Assignment) -> Result<Ticket> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    access::require_triage(ctx.viewer(), &ticket)?;
    if ticket.assigned_agent_id == args.agent_id {
        return Ok(ticket);
    }

    if let Some(agent_id) = args.agent_id {
        let agent = ctx
            .store()
            .get_profile(agent_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("User {} not found", agent_id)))?;
        if !agent.is_staff() {
            return Err(DeskError::Validation(format!(
                "{} is not a support agent",
                agent.display_name()
            )));
        }
    }

    let patch = TicketPatch {
        assigned_agent_id: Some(args.agent_id),
        ..Default::default()
    };
    let updated = ctx.store().update_ticket(ticket.id, patch).await?;
    let event = match updated.assigned_agent_id {
        Some(agent_id) => {
            tracing::info!(ticket_id = %updated.id, agent_id = %agent_id, "Ticket assigned");
            TicketEvent::Assigned
        }
        None => {
            tracing::info!(ticket_id = %updated.id, "Ticket unassigned");
            TicketEvent::Unassigned
        }
    };

    notify(ctx, event, &updated).await;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{DeskMutation, DeskQuery};
    use crate::model::{NotificationType, Role};
    use crate::query::TicketFilters;
    use crate::store::DeskStore;
    use crate::testing::TestDesk;
    use crate::{assert_err_variant, assert_redirected};

    fn form(category_id: Uuid) -> CreateTicketInput {
        CreateTicketInput {
            title: "Laptop will not boot".into(),
            description: "Black screen after the update".into(),
            category_id: Some(category_id),
            priority: Some(TicketPriority::High),
        }
    }

    #[tokio::test]
    async fn test_end_user_only_lists_own_tickets() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let bob = desk.store.seed_profile("Bob", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        for i in 0..3 {
            desk.store.seed_ticket(&format!("ann {}", i), &hw, &ann, None);
            desk.store.seed_ticket(&format!("bob {}", i), &hw, &bob, None);
        }

        let req = TicketListRequest {
            filters: TicketFilters {
                search: Some("bob".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let page = ListTickets::execute(&desk.query(&ann), req).await.unwrap();
        assert_eq!(page.total, 0);

        let page = ListTickets::execute(&desk.query(&ann), TicketListRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|t| t.ticket.creator_id == ann.id));
    }

    #[tokio::test]
    async fn test_agent_lists_created_or_assigned() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let kim = desk.store.seed_profile("Kim", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let mine = desk.store.seed_ticket("assigned", &hw, &ann, Some(&sam));
        desk.store.seed_ticket("someone else", &hw, &ann, Some(&kim));
        desk.store.seed_ticket("unassigned", &hw, &ann, None);

        let page = ListTickets::execute(&desk.query(&sam), TicketListRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].ticket.id, mine.id);
    }

    #[tokio::test]
    async fn test_admin_lists_everything_paged() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let root = desk.store.seed_profile("Root", Role::Admin);
        let hw = desk.store.seed_category("Hardware");
        for i in 0..12 {
            desk.store.seed_ticket(&format!("t{}", i), &hw, &ann, None);
        }

        let req = TicketListRequest {
            page: 2,
            ..Default::default()
        };
        let page = ListTickets::execute(&desk.query(&root), req).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_detail_denial_redirects() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let bob = desk.store.seed_profile("Bob", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("private", &hw, &ann, None);
        let args = TicketRef { ticket_id: ticket.id };

        assert_redirected!(GetTicket::execute(&desk.query(&bob), args).await);

        let detail = GetTicket::execute(&desk.query(&ann), args).await.unwrap();
        assert_eq!(detail.ticket.id, ticket.id);
        assert_eq!(detail.creator.unwrap().id, ann.id);
        assert_eq!(detail.category.unwrap().name, "Hardware");

        assert_redirected!(GetTicket::execute(&desk.query(&sam), args).await);
    }

    #[tokio::test]
    async fn test_missing_ticket_is_not_found() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let result = GetTicket::execute(
            &desk.query(&ann),
            TicketRef {
                ticket_id: Uuid::new_v4(),
            },
        )
        .await;
        assert_err_variant!(result, DeskError::NotFound(_));
    }

    #[tokio::test]
    async fn test_create_rejects_incomplete_form_before_store() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");

        let mut input = form(hw.id);
        input.description = "  ".into();
        let result = CreateTicket::execute(&desk.mutation(&ann), input).await;
        assert_err_variant!(result, DeskError::Validation(_));
        assert_eq!(desk.store.call_count(), 0);
        assert_eq!(desk.store.ticket_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_inactive_category() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        desk.store.set_category_active(hw.id, false).await.unwrap();

        let result = CreateTicket::execute(&desk.mutation(&ann), form(hw.id)).await;
        assert_err_variant!(result, DeskError::Validation(_));
        assert_eq!(desk.store.ticket_count(), 0);
    }

    #[tokio::test]
    async fn test_create_notifies_creator_and_staff() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");

        let ticket = CreateTicket::execute(&desk.mutation(&ann), form(hw.id))
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.title, "Laptop will not boot");

        let notes = desk.store.notifications();
        assert!(notes
            .iter()
            .any(|n| n.user_id == ann.id && n.kind == NotificationType::TicketCreated));
        assert!(desk.mailer.recipients().contains(&sam.email));
        assert!(!desk.mailer.recipients().contains(&ann.email));
    }

    #[tokio::test]
    async fn test_creator_may_only_close() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("mine", &hw, &ann, None);

        let result = UpdateTicketStatus::execute(
            &desk.mutation(&ann),
            StatusChange {
                ticket_id: ticket.id,
                status: TicketStatus::Resolved,
            },
        )
        .await;
        assert_err_variant!(result, DeskError::Forbidden { .. });

        let closed = UpdateTicketStatus::execute(
            &desk.mutation(&ann),
            StatusChange {
                ticket_id: ticket.id,
                status: TicketStatus::Closed,
            },
        )
        .await
        .unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);
    }

    #[tokio::test]
    async fn test_agent_resolves_and_creator_is_told() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, Some(&sam));

        let updated = UpdateTicketStatus::execute(
            &desk.mutation(&sam),
            StatusChange {
                ticket_id: ticket.id,
                status: TicketStatus::Resolved,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, TicketStatus::Resolved);

        let notes = desk.store.notifications();
        assert!(notes
            .iter()
            .any(|n| n.user_id == ann.id && n.kind == NotificationType::TicketResolved));
        assert!(notes.iter().all(|n| n.user_id != sam.id));
    }

    #[tokio::test]
    async fn test_unchanged_status_is_silent() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, Some(&sam));

        UpdateTicketStatus::execute(
            &desk.mutation(&sam),
            StatusChange {
                ticket_id: ticket.id,
                status: TicketStatus::Open,
            },
        )
        .await
        .unwrap();
        assert!(desk.store.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_assign_requires_staff_assignee() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let bob = desk.store.seed_profile("Bob", Role::EndUser);
        let root = desk.store.seed_profile("Root", Role::Admin);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);

        let result = AssignTicket::execute(
            &desk.mutation(&root),
            Assignment {
                ticket_id: ticket.id,
                agent_id: Some(bob.id),
            },
        )
        .await;
        assert_err_variant!(result, DeskError::Validation(_));

        let result = AssignTicket::execute(
            &desk.mutation(&ann),
            Assignment {
                ticket_id: ticket.id,
                agent_id: Some(sam.id),
            },
        )
        .await;
        assert_err_variant!(result, DeskError::Forbidden { .. });

        let assigned = AssignTicket::execute(
            &desk.mutation(&root),
            Assignment {
                ticket_id: ticket.id,
                agent_id: Some(sam.id),
            },
        )
        .await
        .unwrap();
        assert!(assigned.is_assigned_to(sam.id));
        assert!(desk
            .store
            .notifications()
            .iter()
            .any(|n| n.user_id == sam.id && n.kind == NotificationType::TicketAssigned));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_mutation() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, Some(&sam));
        desk.store.fail_notifications(true);

        let updated = UpdateTicketPriority::execute(
            &desk.mutation(&sam),
            PriorityChange {
                ticket_id: ticket.id,
                priority: TicketPriority::Urgent,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.priority, TicketPriority::Urgent);
        assert!(desk.store.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_list_agents_is_staff_only() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let sam = desk.store.seed_profile("Sam", Role::SupportAgent);
        desk.store.seed_profile("Root", Role::Admin);

        assert_err_variant!(
            ListAgents::execute(&desk.query(&ann), NoArgs {}).await,
            DeskError::Forbidden { .. }
        );
        let agents = ListAgents::execute(&desk.query(&sam), NoArgs {}).await.unwrap();
        assert_eq!(agents.len(), 2);
    }
}
