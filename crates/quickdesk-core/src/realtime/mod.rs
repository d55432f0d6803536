//! Row change events and what a realtime subscriber may listen to.

mod change;
mod topic;

pub use change::{Change, ChangeOperation};
pub use topic::Topic;
