//! Who hears about a ticket change, and what they are told.

use std::collections::HashSet;

use uuid::Uuid;

use crate::model::{
    Comment, NewNotification, NotificationMetadata, NotificationType, Profile, Ticket,
    TicketPriority, TicketStatus,
};

/// A ticket mutation worth telling people about.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketEvent {
    Created,
    StatusChanged { from: TicketStatus },
    PriorityChanged { from: TicketPriority },
    /// The ticket's current agent was just assigned.
    Assigned,
    Unassigned,
    Commented { comment: Comment },
}

/// An event together with the people it concerns.
#[derive(Debug, Clone)]
pub struct TicketActivity {
    pub event: TicketEvent,
    /// The ticket after the change.
    pub ticket: Ticket,
    pub creator: Profile,
    /// Current assigned agent, if any.
    pub agent: Option<Profile>,
    /// Who made the change.
    pub actor: Profile,
    pub category_name: Option<String>,
}

/// A notification addressed to a known profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Planned<'a> {
    pub recipient: &'a Profile,
    pub notification: NewNotification,
}

struct Plan<'a> {
    seen: HashSet<Uuid>,
    out: Vec<Planned<'a>>,
}

impl<'a> Plan<'a> {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    /// Add unless the recipient already has a notification in this plan.
    fn push(&mut self, recipient: &'a Profile, notification: NewNotification) {
        if self.seen.insert(recipient.id) {
            self.out.push(Planned {
                recipient,
                notification,
            });
        }
    }
}

impl TicketActivity {
    pub fn kind(&self) -> NotificationType {
        match &self.event {
            TicketEvent::Created => NotificationType::TicketCreated,
            TicketEvent::StatusChanged { .. } if self.ticket.status == TicketStatus::Resolved => {
                NotificationType::TicketResolved
            }
            TicketEvent::StatusChanged { .. }
            | TicketEvent::PriorityChanged { .. }
            | TicketEvent::Unassigned => NotificationType::TicketUpdated,
            TicketEvent::Assigned => NotificationType::TicketAssigned,
            TicketEvent::Commented { .. } => NotificationType::TicketCommented,
        }
    }

    fn metadata(&self) -> NotificationMetadata {
        NotificationMetadata {
            ticket_title: Some(self.ticket.title.clone()),
            comment_author: match &self.event {
                TicketEvent::Commented { .. } => Some(self.actor.display_name().to_string()),
                _ => None,
            },
            assigned_agent: self.agent.as_ref().map(|a| a.display_name().to_string()),
            status: Some(self.ticket.status.as_str().to_string()),
            priority: Some(self.ticket.priority.as_str().to_string()),
        }
    }

    fn notification(&self, recipient: &Profile, title: &str, message: String) -> NewNotification {
        NewNotification {
            user_id: recipient.id,
            title: title.to_string(),
            message,
            kind: self.kind(),
            ticket_id: Some(self.ticket.id),
            metadata: self.metadata(),
        }
    }

    fn is_actor(&self, profile: &Profile) -> bool {
        profile.id == self.actor.id
    }

    /// In-app notifications, one per recipient, in the order they are
    /// inserted. The actor is never told about their own change, except
    /// the creation receipt.
    pub fn notifications(&self) -> Vec<Planned<'_>> {
        let mut plan = Plan::new();
        let title = &self.ticket.title;
        let creator = &self.creator;

        match &self.event {
            TicketEvent::Created => plan.push(
                creator,
                self.notification(
                    creator,
                    "Ticket Created",
                    format!("Your ticket \"{}\" has been created successfully.", title),
                ),
            ),
            TicketEvent::StatusChanged { .. } if self.ticket.status == TicketStatus::Resolved => {
                if !self.is_actor(creator) {
                    plan.push(
                        creator,
                        self.notification(
                            creator,
                            "Ticket Resolved",
                            format!(
                                "Your ticket \"{}\" has been resolved by {}.",
                                title,
                                self.actor.display_name()
                            ),
                        ),
                    );
                }
            }
            TicketEvent::StatusChanged { from } => {
                let to = self.ticket.status;
                if !self.is_actor(creator) {
                    plan.push(
                        creator,
                        self.notification(
                            creator,
                            "Ticket Status Updated",
                            format!(
                                "Your ticket \"{}\" status changed from \"{}\" to \"{}\".",
                                title,
                                from.label(),
                                to.label()
                            ),
                        ),
                    );
                }
                if let Some(agent) = self.agent.as_ref().filter(|a| !self.is_actor(a)) {
                    plan.push(
                        agent,
                        self.notification(
                            agent,
                            "Ticket Status Updated",
                            format!(
                                "Ticket \"{}\" status changed from \"{}\" to \"{}\".",
                                title,
                                from.label(),
                                to.label()
                            ),
                        ),
                    );
                }
            }
            TicketEvent::PriorityChanged { from } => {
                if !self.is_actor(creator) {
                    plan.push(
                        creator,
                        self.notification(
                            creator,
                            "Ticket Priority Updated",
                            format!(
                                "Your ticket \"{}\" priority changed from \"{}\" to \"{}\".",
                                title,
                                from.label(),
                                self.ticket.priority.label()
                            ),
                        ),
                    );
                }
            }
            TicketEvent::Assigned => {
                if let Some(agent) = &self.agent {
                    if !self.is_actor(creator) {
                        plan.push(
                            creator,
                            self.notification(
                                creator,
                                "Ticket Assigned",
                                format!(
                                    "Your ticket \"{}\" has been assigned to {}.",
                                    title,
                                    agent.display_name()
                                ),
                            ),
                        );
                    }
                    if !self.is_actor(agent) {
                        plan.push(
                            agent,
                            self.notification(
                                agent,
                                "New Ticket Assigned",
                                format!("You have been assigned to ticket \"{}\".", title),
                            ),
                        );
                    }
                }
            }
            TicketEvent::Unassigned => {
                if !self.is_actor(creator) {
                    plan.push(
                        creator,
                        self.notification(
                            creator,
                            "Ticket Assignment Updated",
                            format!("Your ticket \"{}\" assignment has been removed.", title),
                        ),
                    );
                }
            }
            TicketEvent::Commented { .. } => {
                let author = self.actor.display_name();
                if !self.is_actor(creator) {
                    plan.push(
                        creator,
                        self.notification(
                            creator,
                            "New Comment on Your Ticket",
                            format!("{} commented on your ticket \"{}\".", author, title),
                        ),
                    );
                }
                if let Some(agent) = self
                    .agent
                    .as_ref()
                    .filter(|a| !self.is_actor(a) && a.id != creator.id)
                {
                    plan.push(
                        agent,
                        self.notification(
                            agent,
                            "New Comment on Assigned Ticket",
                            format!(
                                "{} commented on ticket \"{}\" which is assigned to you.",
                                author, title
                            ),
                        ),
                    );
                }
            }
        }

        plan.out
    }
}
