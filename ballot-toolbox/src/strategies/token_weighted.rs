use super::{
    fixed_point_to_weight, Strategy, StrategyError, StrategyKind, VoteWithBalance, WeightedVote,
};
use crate::eligibility::EligibilityPolicy;
use crate::proposal::Proposal;
use crate::tally::ProposalResults;
use rust_decimal::Decimal;
use snapshot_lib::FIXED_POINT_SCALE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceSource {
    Primary,
    Staking,
}

/// Weights votes by the voter's token balance at the snapshot height.
pub struct TokenWeighted {
    source: BalanceSource,
}

impl TokenWeighted {
    pub fn new(source: BalanceSource) -> Self {
        Self { source }
    }
}

impl Strategy for TokenWeighted {
    fn kind(&self) -> StrategyKind {
        match self.source {
            BalanceSource::Primary => StrategyKind::TokenWeighted,
            BalanceSource::Staking => StrategyKind::StakedTokenWeighted,
        }
    }

    fn get_vote_weight(
        &self,
        vote: &VoteWithBalance,
        proposal: &Proposal,
        policy: &EligibilityPolicy,
    ) -> Result<Decimal, StrategyError> {
        let raw = match self.source {
            BalanceSource::Primary => vote.snapshot.primary_balance,
            BalanceSource::Staking => vote.snapshot.staking_balance.unwrap_or_default(),
        };

        // thresholds are expressed in tokens and apply to the held balance
        policy.validate_minimum(&proposal.contract, raw as f64 / FIXED_POINT_SCALE)?;
        let capped = policy.cap_fixed_point(&proposal.contract, raw)?;
        Ok(fixed_point_to_weight(capped))
    }

    fn tally_votes(&self, votes: &[WeightedVote], results: &mut ProposalResults) {
        for vote in votes {
            results.add_weight(&vote.choice, vote.weight);
        }
    }
}
