//! Weighting and tallying strategies selectable per proposal.

mod balance_of_assets;
mod one_address_one_vote;
mod token_weighted;

pub use balance_of_assets::BalanceOfAssets;
pub use one_address_one_vote::OneAddressOneVote;
pub use token_weighted::{BalanceSource, TokenWeighted};

use crate::ballot::Ballot;
use crate::eligibility::{EligibilityPolicy, PolicyError};
use crate::proposal::Proposal;
use crate::tally::ProposalResults;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use snapshot_lib::{Address, BalanceSnapshot};
use thiserror::Error;

/// Weight of one fixed-point balance unit
pub const WEIGHT_UNIT: Decimal = dec!(0.00000001);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    #[serde(rename = "one-address-one-vote")]
    OneAddressOneVote,
    #[serde(rename = "token-weighted-default")]
    TokenWeighted,
    #[serde(rename = "staked-token-weighted-default")]
    StakedTokenWeighted,
    #[serde(rename = "balance-of-nfts")]
    BalanceOfAssets,
}

impl StrategyKind {
    pub fn strategy(self) -> Box<dyn Strategy> {
        match self {
            Self::OneAddressOneVote => Box::new(OneAddressOneVote),
            Self::TokenWeighted => Box::new(TokenWeighted::new(BalanceSource::Primary)),
            Self::StakedTokenWeighted => Box::new(TokenWeighted::new(BalanceSource::Staking)),
            Self::BalanceOfAssets => Box::new(BalanceOfAssets),
        }
    }
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no address found")]
    EmptyAddress,
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A verified ballot together with the holdings of its voter
#[derive(Clone, Debug, PartialEq)]
pub struct VoteWithBalance {
    pub ballot: Ballot,
    pub snapshot: BalanceSnapshot,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct WeightedVote {
    pub address: Address,
    pub choice: String,
    pub weight: Decimal,
}

/// Converts a fixed-point balance into a vote weight.
pub fn fixed_point_to_weight(balance: u64) -> Decimal {
    Decimal::from(balance) * WEIGHT_UNIT
}

pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether weights depend on the voter's holdings
    fn requires_snapshot(&self) -> bool {
        true
    }

    /// Weight of a single vote. Depends on nothing but the vote itself.
    fn get_vote_weight(
        &self,
        vote: &VoteWithBalance,
        proposal: &Proposal,
        policy: &EligibilityPolicy,
    ) -> Result<Decimal, StrategyError>;

    fn get_votes(
        &self,
        votes: Vec<VoteWithBalance>,
        proposal: &Proposal,
        policy: &EligibilityPolicy,
    ) -> Vec<Result<WeightedVote, StrategyError>> {
        votes
            .into_iter()
            .map(|vote| {
                let weight = self.get_vote_weight(&vote, proposal, policy)?;
                Ok(WeightedVote {
                    address: vote.ballot.voter_address,
                    choice: vote.ballot.choice,
                    weight,
                })
            })
            .collect()
    }

    /// Folds weighted votes into `results`. The order of `votes` does not
    /// matter.
    fn tally_votes(&self, votes: &[WeightedVote], results: &mut ProposalResults);
}

#[cfg(test)]
pub(crate) fn vote(address: &str, choice: &str, snapshot: BalanceSnapshot) -> VoteWithBalance {
    use crate::ballot::CompositeSignature;

    let mut ballot = Ballot {
        voter_address: address.to_string(),
        proposal_id: 1,
        choice: choice.to_string(),
        timestamp: 1_650_000_000_000,
        raw_message: String::new(),
        signatures: vec![CompositeSignature {
            addr: address.to_string(),
            key_id: 0,
            signature: "ab".repeat(64),
        }],
    };
    ballot.raw_message = ballot.canonical_message();
    VoteWithBalance { ballot, snapshot }
}
