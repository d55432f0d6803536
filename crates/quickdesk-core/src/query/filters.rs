use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeskError, Result};
use crate::model::{TicketPriority, TicketStatus};

/// Page size of every ticket listing.
pub const PAGE_SIZE: u32 = 10;

/// Assignee value meaning "nobody is assigned".
pub const UNASSIGNED: &str = "unassigned";

/// Filter state as sent by the ticket list screen. Blank values mean
/// "no filter"; camelCase spellings are accepted for the list screen's
/// query-string names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketFilters {
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "assignedTo")]
    pub assigned_to: Option<String>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
}

/// Who a listing should be restricted to by assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    Any,
    Unassigned,
    Agent(Uuid),
}

/// Sortable ticket columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    Status,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
            SortField::Priority => "priority",
            SortField::Status => "status",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "title" => Ok(SortField::Title),
            "priority" => Ok(SortField::Priority),
            "status" => Ok(SortField::Status),
            other => Err(DeskError::Validation(format!(
                "Cannot sort tickets by '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DeskError::Validation(format!(
                "Sort order must be 'asc' or 'desc', got '{}'",
                other
            ))),
        }
    }
}

/// Filters after parsing; every field is either absent or well-typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilters {
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<Uuid>,
    pub assignee: AssigneeFilter,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| DeskError::Validation(format!("Invalid {} id '{}'", what, value)))
}

impl TicketFilters {
    /// Parse the raw strings, rejecting values that name nothing.
    pub fn parse(&self) -> Result<ParsedFilters> {
        let assignee = match present(&self.assigned_to) {
            None => AssigneeFilter::Any,
            Some(UNASSIGNED) => AssigneeFilter::Unassigned,
            Some(id) => AssigneeFilter::Agent(parse_uuid(id, "agent")?),
        };

        Ok(ParsedFilters {
            search: present(&self.search).map(str::to_string),
            status: present(&self.status)
                .map(str::parse::<TicketStatus>)
                .transpose()?,
            priority: present(&self.priority)
                .map(str::parse::<TicketPriority>)
                .transpose()?,
            category: present(&self.category)
                .map(|c| parse_uuid(c, "category"))
                .transpose()?,
            assignee,
            sort_field: present(&self.sort_by)
                .map(SortField::parse)
                .transpose()?
                .unwrap_or_default(),
            sort_order: present(&self.sort_order)
                .map(SortOrder::parse)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}
