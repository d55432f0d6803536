//! Notification fan-out for ticket activity.

pub mod email;
mod fanout;
mod service;

pub use email::{EmailMessage, LogMailer, Mailer};
pub use fanout::{Planned, TicketActivity, TicketEvent};
pub use service::{FanoutReport, Notifier};
