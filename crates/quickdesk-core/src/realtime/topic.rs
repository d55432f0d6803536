use uuid::Uuid;

use super::change::Change;
use crate::error::{DeskError, Result};

/// Something a realtime client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// The subscriber's own notifications.
    Notifications { user_id: Uuid },
    /// One ticket row.
    Ticket { ticket_id: Uuid },
    /// Comments on one ticket.
    Comments { ticket_id: Uuid },
}

impl Topic {
    /// Build a topic from a client's `table` and optional `ticket_id=<uuid>`
    /// filter. Notification subscriptions are always bound to `user_id`.
    pub fn parse(table: &str, filter: Option<&str>, user_id: Uuid) -> Result<Self> {
        let ticket_id = || -> Result<Uuid> {
            let value = filter
                .and_then(|f| f.trim().strip_prefix("ticket_id="))
                .ok_or_else(|| {
                    DeskError::Validation(format!(
                        "Subscriptions to {} need a ticket_id=<id> filter",
                        table
                    ))
                })?;
            // Accept the `ticket_id=eq.<id>` spelling too.
            let value = value.strip_prefix("eq.").unwrap_or(value);
            Uuid::parse_str(value)
                .map_err(|_| DeskError::Validation(format!("Invalid ticket id '{}'", value)))
        };

        match table {
            "notifications" => Ok(Topic::Notifications { user_id }),
            "tickets" => Ok(Topic::Ticket {
                ticket_id: ticket_id()?,
            }),
            "ticket_comments" => Ok(Topic::Comments {
                ticket_id: ticket_id()?,
            }),
            other => Err(DeskError::Validation(format!(
                "Cannot subscribe to '{}'",
                other
            ))),
        }
    }

    /// Ticket whose access check guards this topic.
    pub fn ticket_id(&self) -> Option<Uuid> {
        match self {
            Topic::Notifications { .. } => None,
            Topic::Ticket { ticket_id } | Topic::Comments { ticket_id } => Some(*ticket_id),
        }
    }

    pub fn matches(&self, change: &Change) -> bool {
        match self {
            Topic::Notifications { user_id } => {
                change.table == "notifications" && change.owner_id == Some(*user_id)
            }
            Topic::Ticket { ticket_id } => {
                change.table == "tickets" && change.row_id == Some(*ticket_id)
            }
            Topic::Comments { ticket_id } => {
                change.table == "ticket_comments" && change.ticket_id == Some(*ticket_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChangeOperation;

    #[test]
    fn test_notifications_bound_to_subscriber() {
        let me = Uuid::new_v4();
        let topic = Topic::parse("notifications", Some("user_id=someone-else"), me).unwrap();
        assert_eq!(topic, Topic::Notifications { user_id: me });

        let mine = Change::new("notifications", ChangeOperation::Insert).with_owner(me);
        let theirs =
            Change::new("notifications", ChangeOperation::Insert).with_owner(Uuid::new_v4());
        assert!(topic.matches(&mine));
        assert!(!topic.matches(&theirs));
    }

    #[test]
    fn test_ticket_topics_need_filter() {
        let me = Uuid::new_v4();
        let ticket = Uuid::new_v4();
        assert!(Topic::parse("tickets", None, me).is_err());
        assert!(Topic::parse("ticket_comments", Some("ticket_id=nope"), me).is_err());

        let topic = Topic::parse("ticket_comments", Some(&format!("ticket_id=eq.{}", ticket)), me)
            .unwrap();
        assert_eq!(topic.ticket_id(), Some(ticket));
        let comment = Change::new("ticket_comments", ChangeOperation::Insert).with_ticket(ticket);
        assert!(topic.matches(&comment));
        let ticket_row = Change::new("tickets", ChangeOperation::Update).with_row_id(ticket);
        assert!(!topic.matches(&ticket_row));
        assert!(Topic::Ticket { ticket_id: ticket }.matches(&ticket_row));
    }

    #[test]
    fn test_unknown_table() {
        assert!(Topic::parse("profiles", None, Uuid::new_v4()).is_err());
    }
}
