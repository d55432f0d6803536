//! Who may see and change a ticket.

use serde::Serialize;

use crate::error::{DeskError, Result};
use crate::model::{Profile, Role, Ticket, TicketStatus};

/// Where a denied viewer is sent.
pub const DENIED_REDIRECT: &str = "/tickets";

/// Message shown with a denied detail view.
pub const DENIED_MESSAGE: &str = "You do not have permission to view this ticket.";

/// Outcome of a detail-view access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allowed,
    Denied {
        redirect_to: &'static str,
        message: &'static str,
    },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    /// Turn a denial into a Forbidden error carrying the redirect.
    pub fn into_result(self) -> Result<()> {
        match self {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::Denied {
                redirect_to,
                message,
            } => Err(DeskError::Forbidden {
                message: message.to_string(),
                redirect_to: Some(redirect_to.to_string()),
            }),
        }
    }
}

/// Creator, assigned agent and admins may view a ticket. Everyone else is
/// redirected back to the list.
pub fn check_ticket_access(viewer: &Profile, ticket: &Ticket) -> AccessDecision {
    if viewer.role == Role::Admin
        || ticket.is_creator(viewer.id)
        || ticket.is_assigned_to(viewer.id)
    {
        AccessDecision::Allowed
    } else {
        AccessDecision::Denied {
            redirect_to: DENIED_REDIRECT,
            message: DENIED_MESSAGE,
        }
    }
}

/// [`check_ticket_access`] as a `Result`.
pub fn require_ticket_access(viewer: &Profile, ticket: &Ticket) -> Result<()> {
    check_ticket_access(viewer, ticket).into_result()
}

pub fn require_staff(viewer: &Profile) -> Result<()> {
    if viewer.is_staff() {
        Ok(())
    } else {
        Err(DeskError::forbidden("Only support staff can do this"))
    }
}

pub fn require_admin(viewer: &Profile) -> Result<()> {
    if viewer.is_admin() {
        Ok(())
    } else {
        Err(DeskError::forbidden(
            "You need admin privileges to access this page.",
        ))
    }
}

/// Staff who can see the ticket may move it to any status. Its creator may
/// only close it.
pub fn require_status_change(viewer: &Profile, ticket: &Ticket, to: TicketStatus) -> Result<()> {
    require_ticket_access(viewer, ticket)?;
    if viewer.is_staff() || (ticket.is_creator(viewer.id) && to == TicketStatus::Closed) {
        Ok(())
    } else {
        Err(DeskError::forbidden(
            "Only support staff can change the status of a ticket",
        ))
    }
}

/// Priority and assignment are staff decisions.
pub fn require_triage(viewer: &Profile, ticket: &Ticket) -> Result<()> {
    require_ticket_access(viewer, ticket)?;
    require_staff(viewer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationSettings, TicketPriority};
    use chrono::Utc;
    use uuid::Uuid;

    fn profile(role: Role) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            full_name: String::new(),
            email: "someone@example.com".into(),
            role,
            notification_settings: NotificationSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ticket(creator: Uuid, agent: Option<Uuid>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            status: TicketStatus::Open,
            priority: TicketPriority::Low,
            category_id: Uuid::new_v4(),
            creator_id: creator,
            assigned_agent_id: agent,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_creator_agent_admin_allowed() {
        let creator = profile(Role::EndUser);
        let agent = profile(Role::SupportAgent);
        let admin = profile(Role::Admin);
        let t = ticket(creator.id, Some(agent.id));

        assert!(check_ticket_access(&creator, &t).is_allowed());
        assert!(check_ticket_access(&agent, &t).is_allowed());
        assert!(check_ticket_access(&admin, &t).is_allowed());
    }

    #[test]
    fn test_outsiders_always_redirected() {
        let t = ticket(Uuid::new_v4(), Some(Uuid::new_v4()));
        for role in [Role::EndUser, Role::SupportAgent] {
            let outsider = profile(role);
            assert_eq!(
                check_ticket_access(&outsider, &t),
                AccessDecision::Denied {
                    redirect_to: "/tickets",
                    message: DENIED_MESSAGE,
                }
            );
            match require_ticket_access(&outsider, &t) {
                Err(DeskError::Forbidden { redirect_to, .. }) => {
                    assert_eq!(redirect_to.as_deref(), Some("/tickets"))
                }
                other => panic!("expected redirect, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unassigned_agent_denied() {
        let agent = profile(Role::SupportAgent);
        let t = ticket(Uuid::new_v4(), None);
        assert!(!check_ticket_access(&agent, &t).is_allowed());
    }

    #[test]
    fn test_creator_may_only_close() {
        let creator = profile(Role::EndUser);
        let t = ticket(creator.id, None);
        assert!(require_status_change(&creator, &t, TicketStatus::Closed).is_ok());
        assert!(require_status_change(&creator, &t, TicketStatus::Resolved).is_err());
        assert!(require_triage(&creator, &t).is_err());
    }

    #[test]
    fn test_staff_triage_needs_visibility() {
        let agent = profile(Role::SupportAgent);
        let admin = profile(Role::Admin);
        let t = ticket(Uuid::new_v4(), Some(agent.id));
        assert!(require_triage(&agent, &t).is_ok());
        assert!(require_triage(&admin, &t).is_ok());
        assert!(require_status_change(&agent, &t, TicketStatus::Resolved).is_ok());

        let other_agent = profile(Role::SupportAgent);
        assert!(require_triage(&other_agent, &t).is_err());
    }

    #[test]
    fn test_admin_gate() {
        assert!(require_admin(&profile(Role::Admin)).is_ok());
        assert!(require_admin(&profile(Role::SupportAgent)).is_err());
        assert!(require_staff(&profile(Role::EndUser)).is_err());
    }
}
