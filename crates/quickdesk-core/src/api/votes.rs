//! Up and down votes. One vote per user per ticket; voting again replaces it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{visible_ticket, TicketRef};
use crate::error::Result;
use crate::function::MutationContext;
use crate::model::{VoteTally, VoteType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub ticket_id: Uuid,
    pub vote_type: VoteType,
}

desk_mutation!(
    CastVote,
    "cast_vote",
    "Vote on a ticket, replacing any earlier vote",
    Ballot => VoteTally,
    cast_vote
);

desk_mutation!(
    RemoveVote,
    "remove_vote",
    "Withdraw the caller's vote",
    TicketRef => VoteTally,
    remove_vote
);

async fn cast_vote(ctx: &MutationContext, args: Ballot) -> Result<VoteTally> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    let user_id = ctx.viewer().id;
    ctx.store().upsert_vote(ticket.id, user_id, args.vote_type).await?;
    tracing::debug!(ticket_id = %ticket.id, user_id = %user_id, vote = %args.vote_type, "Vote cast");
    ctx.store().vote_tally(ticket.id, user_id).await
}

async fn remove_vote(ctx: &MutationContext, args: TicketRef) -> Result<VoteTally> {
    let ticket = visible_ticket(ctx.store(), ctx.viewer(), args.ticket_id).await?;
    let user_id = ctx.viewer().id;
    if ctx.store().remove_vote(ticket.id, user_id).await? {
        tracing::debug!(ticket_id = %ticket.id, user_id = %user_id, "Vote removed");
    }
    ctx.store().vote_tally(ticket.id, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::DeskMutation;
    use crate::model::Role;
    use crate::testing::TestDesk;

    #[tokio::test]
    async fn test_revote_replaces_row() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);
        let ctx = desk.mutation(&ann);

        for vote_type in [VoteType::Upvote, VoteType::Upvote, VoteType::Downvote] {
            CastVote::execute(
                &ctx,
                Ballot {
                    ticket_id: ticket.id,
                    vote_type,
                },
            )
            .await
            .unwrap();
        }

        let votes = desk.store.votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote_type, VoteType::Downvote);

        let tally = CastVote::execute(
            &ctx,
            Ballot {
                ticket_id: ticket.id,
                vote_type: VoteType::Upvote,
            },
        )
        .await
        .unwrap();
        assert_eq!(tally.upvotes, 1);
        assert_eq!(tally.downvotes, 0);
        assert_eq!(tally.mine, Some(VoteType::Upvote));
        assert_eq!(desk.store.votes().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_votes_keep_one_row() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);
        let ctx = desk.mutation(&ann);

        let ballots = (0..8).map(|i| {
            CastVote::execute(
                &ctx,
                Ballot {
                    ticket_id: ticket.id,
                    vote_type: if i % 2 == 0 { VoteType::Upvote } else { VoteType::Downvote },
                },
            )
        });
        for result in futures::future::join_all(ballots).await {
            result.unwrap();
        }
        assert_eq!(desk.store.votes().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_vote() {
        let desk = TestDesk::new();
        let ann = desk.store.seed_profile("Ann", Role::EndUser);
        let hw = desk.store.seed_category("Hardware");
        let ticket = desk.store.seed_ticket("broken", &hw, &ann, None);
        let ctx = desk.mutation(&ann);

        CastVote::execute(
            &ctx,
            Ballot {
                ticket_id: ticket.id,
                vote_type: VoteType::Downvote,
            },
        )
        .await
        .unwrap();
        let tally = RemoveVote::execute(&ctx, TicketRef { ticket_id: ticket.id })
            .await
            .unwrap();
        assert_eq!(tally, VoteTally::default());
        assert!(desk.store.votes().is_empty());

        // Removing again is a no-op.
        assert!(RemoveVote::execute(&ctx, TicketRef { ticket_id: ticket.id })
            .await
            .is_ok());
    }
}
