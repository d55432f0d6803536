//! Ticket listing composition.

mod composer;
mod filters;

pub use composer::{compose, recent, role_scope, Predicate, TicketListRequest, TicketQuery};
pub use filters::{
    AssigneeFilter, ParsedFilters, SortField, SortOrder, TicketFilters, PAGE_SIZE, UNASSIGNED,
};
