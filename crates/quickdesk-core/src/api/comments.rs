//! Ticket comment thread.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{notify, visible_ticket, TicketRef};
use crate::error::Result;
use crate::function::{MutationContext, QueryContext};
use crate::model::{Comment, CommentWithAuthor};
use crate::notify::TicketEvent;
use crate::validation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub ticket_id: Uuid,
    pub content: String,
}

desk_query!(
    ListComments,
    "list_comments",
    "Comments on a ticket, oldest first",
    TicketRef => Vec<CommentWithAuthor>,
    list_comments
);

desk_mutation!(
    AddComment,
    "add_comment",
    "Comment on a ticket",
    NewComment => Comment,
    add_comment
);

async fn list_comments(ctx: &QueryContext, args: TicketRef) -> Result<Vec<CommentWithAuthor>> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    ctx.store().list_comments(ticket.id).await
}

async fn add_comment(ctx: &MutationContext, args: NewComment) -> Result<Comment> {
    let content = validation::comment_content(&args.content)?;
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;

    let comment = ctx
        .store()
        .insert_comment(ticket.id, ctx.viewer().id, content)
        .await?;
    tracing::info!(ticket_id = %ticket.id, comment_id = %comment.id, author_id = %comment.author_id, "Comment added");

    notify(
        ctx,
        TicketEvent::Commented {
            comment: comment.clone(),
        },
        &ticket,
    )
    .await;
    Ok(comment)
}
