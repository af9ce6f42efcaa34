use super::{Strategy, StrategyError, StrategyKind, VoteWithBalance, WeightedVote};
use crate::eligibility::EligibilityPolicy;
use crate::proposal::Proposal;
use crate::tally::ProposalResults;
use rust_decimal::Decimal;

pub struct OneAddressOneVote;

impl Strategy for OneAddressOneVote {
    fn kind(&self) -> StrategyKind {
        StrategyKind::OneAddressOneVote
    }

    fn requires_snapshot(&self) -> bool {
        false
    }

    fn get_vote_weight(
        &self,
        vote: &VoteWithBalance,
        _proposal: &Proposal,
        _policy: &EligibilityPolicy,
    ) -> Result<Decimal, StrategyError> {
        if vote.ballot.voter_address.trim().is_empty() {
            return Err(StrategyError::EmptyAddress);
        }
        Ok(Decimal::ONE)
    }

    fn tally_votes(&self, votes: &[WeightedVote], results: &mut ProposalResults) {
        for vote in votes {
            results.add_count(&vote.choice);
        }
    }
}
