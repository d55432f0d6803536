//! Desk data model.

mod attachment;
mod category;
mod comment;
mod enums;
mod notification;
mod profile;
mod settings;
mod ticket;
mod vote;

pub use attachment::{Attachment, AttachmentView, NewAttachment};
pub use category::{default_color, Category, CategoryInput, CategoryWithCount};
pub use comment::{Comment, CommentWithAuthor};
pub use enums::{NotificationType, Role, TicketPriority, TicketStatus, VoteType};
pub use notification::{NewNotification, Notification, NotificationFeed, NotificationMetadata};
pub use profile::{NewProfile, NotificationSettings, Profile, ProfileUpdate};
pub use settings::DeskSettings;
pub use ticket::{NewTicket, Ticket, TicketPage, TicketPatch, TicketSummary};
pub use vote::{Vote, VoteTally};
