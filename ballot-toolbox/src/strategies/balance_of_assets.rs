use super::{
    fixed_point_to_weight, Strategy, StrategyError, StrategyKind, VoteWithBalance, WeightedVote,
};
use crate::eligibility::EligibilityPolicy;
use crate::proposal::Proposal;
use crate::tally::ProposalResults;
use rust_decimal::Decimal;

/// Weights votes by the number of assets of the collection the voter owns.
pub struct BalanceOfAssets;

impl Strategy for BalanceOfAssets {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BalanceOfAssets
    }

    fn get_vote_weight(
        &self,
        vote: &VoteWithBalance,
        proposal: &Proposal,
        policy: &EligibilityPolicy,
    ) -> Result<Decimal, StrategyError> {
        let count = vote
            .snapshot
            .asset_ids
            .as_ref()
            .map_or(vote.snapshot.primary_balance, |ids| ids.len() as u64);
        policy.validate_minimum(&proposal.contract, count as f64)?;
        Ok(fixed_point_to_weight(count))
    }

    fn tally_votes(&self, votes: &[WeightedVote], results: &mut ProposalResults) {
        for vote in votes {
            results.add_weight(&vote.choice, vote.weight);
        }
    }
}
