//! QuickDesk support desk server.
//!
//! Wires the Postgres store, local attachment storage, mail delivery and the
//! realtime feed into one HTTP gateway.

mod runtime;

pub use quickdesk_core;
pub use quickdesk_runtime;

pub use runtime::{build_services, mailer_for, Desk, DeskBuilder};
