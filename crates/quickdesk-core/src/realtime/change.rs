use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl FromStr for ChangeOperation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(ChangeOperation::Insert),
            "UPDATE" => Ok(ChangeOperation::Update),
            "DELETE" => Ok(ChangeOperation::Delete),
            _ => Err(()),
        }
    }
}

/// A row change published by the database trigger.
///
/// Payload format: `table:OPERATION:row_id[:owner_id[:ticket_id]]`, where
/// `owner_id` is the notification recipient or ticket creator and
/// `ticket_id` the ticket a comment, vote or attachment belongs to. Empty
/// segments mean "not applicable".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub table: String,
    pub operation: ChangeOperation,
    pub row_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub ticket_id: Option<Uuid>,
}

fn segment(parts: &[&str], index: usize) -> Option<Uuid> {
    parts
        .get(index)
        .filter(|s| !s.is_empty())
        .and_then(|s| Uuid::parse_str(s).ok())
}

impl Change {
    pub fn new(table: impl Into<String>, operation: ChangeOperation) -> Self {
        Self {
            table: table.into(),
            operation,
            row_id: None,
            owner_id: None,
            ticket_id: None,
        }
    }

    pub fn with_row_id(mut self, id: Uuid) -> Self {
        self.row_id = Some(id);
        self
    }

    pub fn with_owner(mut self, id: Uuid) -> Self {
        self.owner_id = Some(id);
        self
    }

    pub fn with_ticket(mut self, id: Uuid) -> Self {
        self.ticket_id = Some(id);
        self
    }

    /// Parse a trigger payload. Returns `None` for anything malformed.
    pub fn parse(payload: &str) -> Option<Self> {
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() < 2 || parts[0].is_empty() {
            return None;
        }
        let operation = parts[1].parse().ok()?;

        Some(Self {
            table: parts[0].to_string(),
            operation,
            row_id: segment(&parts, 2),
            owner_id: segment(&parts, 3),
            ticket_id: segment(&parts, 4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let row = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let ticket = Uuid::new_v4();
        let change =
            Change::parse(&format!("ticket_comments:INSERT:{}:{}:{}", row, owner, ticket)).unwrap();
        assert_eq!(change.table, "ticket_comments");
        assert_eq!(change.operation, ChangeOperation::Insert);
        assert_eq!(change.row_id, Some(row));
        assert_eq!(change.owner_id, Some(owner));
        assert_eq!(change.ticket_id, Some(ticket));
    }

    #[test]
    fn test_parse_empty_segments() {
        let row = Uuid::new_v4();
        let change = Change::parse(&format!("categories:delete:{}::", row)).unwrap();
        assert_eq!(change.operation, ChangeOperation::Delete);
        assert_eq!(change.owner_id, None);
        assert_eq!(change.ticket_id, None);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Change::parse("invalid").is_none());
        assert!(Change::parse("tickets:UPSERT:x").is_none());
        assert!(Change::parse(":INSERT").is_none());
    }

    #[test]
    fn test_operation_wire_format() {
        assert_eq!(
            serde_json::to_value(ChangeOperation::Update).unwrap(),
            serde_json::json!("UPDATE")
        );
    }
}
