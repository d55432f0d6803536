//! Enum types shared by the desk model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::error::DeskError;

/// Generates `as_str`, `Display` and `FromStr` from one table of
/// variant/wire-name pairs so the three never drift apart.
macro_rules! wire_names {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DeskError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(DeskError::Validation(format!(
                        concat!("Unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Ticket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

wire_names!(TicketStatus, "status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

impl TicketStatus {
    /// Human label used in notification texts ("In Progress").
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }

    /// Still waiting on support.
    pub fn is_active(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::InProgress)
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

wire_names!(TicketPriority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl TicketPriority {
    pub fn label(&self) -> &'static str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
            TicketPriority::Urgent => "Urgent",
        }
    }
}

/// Desk role of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    /// Files tickets and sees only their own.
    EndUser,
    /// Works tickets they created or are assigned to.
    SupportAgent,
    /// Sees and manages everything.
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Self::EndUser
    }
}

wire_names!(Role, "role", {
    EndUser => "end_user",
    SupportAgent => "support_agent",
    Admin => "admin",
});

impl Role {
    /// Support agents and admins.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::SupportAgent | Role::Admin)
    }
}

/// Direction of a ticket vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "vote_type", rename_all = "snake_case")]
pub enum VoteType {
    Upvote,
    Downvote,
}

wire_names!(VoteType, "vote type", {
    Upvote => "upvote",
    Downvote => "downvote",
});

/// Kind of in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
pub enum NotificationType {
    TicketCreated,
    TicketUpdated,
    TicketCommented,
    TicketAssigned,
    TicketResolved,
}

wire_names!(NotificationType, "notification type", {
    TicketCreated => "ticket_created",
    TicketUpdated => "ticket_updated",
    TicketCommented => "ticket_commented",
    TicketAssigned => "ticket_assigned",
    TicketResolved => "ticket_resolved",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(TicketStatus::default(), TicketStatus::Open);
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
        assert_eq!(Role::default(), Role::EndUser);
    }

    #[test]
    fn test_wire_names_match_serde() {
        for status in TicketStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::json!(status.as_str()));
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), *status);
        }
        for kind in NotificationType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_value_is_validation_error() {
        let err = "escalated".parse::<TicketStatus>().unwrap_err();
        assert!(matches!(err, DeskError::Validation(_)));
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_staff() {
        assert!(!Role::EndUser.is_staff());
        assert!(Role::SupportAgent.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(TicketStatus::InProgress.label(), "In Progress");
        assert!(TicketStatus::InProgress.is_active());
        assert!(!TicketStatus::Closed.is_active());
    }
}
