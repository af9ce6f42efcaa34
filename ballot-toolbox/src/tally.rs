//! Verification, weighting and aggregation of the ballots cast on a proposal.

use crate::ballot::Ballot;
use crate::eligibility::EligibilityPolicy;
use crate::error::BallotError;
use crate::proposal::{Proposal, ProposalId};
use crate::script::ScriptClient;
use crate::signature::{MessageKind, SignatureVerifier};
use crate::snapshot::{BalanceService, PinnedResolver, ResolverError, SnapshotResolver};
use crate::strategies::{Strategy, VoteWithBalance, WeightedVote};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snapshot_lib::{Address, BalanceSnapshot};
use std::collections::btree_map::{BTreeMap, Entry};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResults {
    pub proposal_id: ProposalId,
    /// Vote counts, for strategies giving one vote per address
    pub results: BTreeMap<String, u64>,
    /// Summed weights, for balance weighted strategies
    pub results_float: BTreeMap<String, Decimal>,
}

impl ProposalResults {
    /// Empty results with every choice of `proposal` at zero
    pub fn new(proposal: &Proposal) -> Self {
        Self {
            proposal_id: proposal.id,
            results: proposal.choices.iter().map(|c| (c.clone(), 0)).collect(),
            results_float: proposal
                .choices
                .iter()
                .map(|c| (c.clone(), Decimal::ZERO))
                .collect(),
        }
    }

    pub fn add_count(&mut self, choice: &str) {
        *self.results.entry(choice.to_string()).or_default() += 1;
    }

    pub fn add_weight(&mut self, choice: &str, weight: Decimal) {
        *self.results_float.entry(choice.to_string()).or_default() += weight;
    }
}

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("proposal {0} was cancelled")]
    Cancelled(ProposalId),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// A ballot left out of the results
#[derive(Debug)]
pub struct Rejection {
    pub address: Address,
    pub choice: String,
    pub error: BallotError,
}

#[derive(Debug)]
pub struct TallyOutcome {
    pub results: ProposalResults,
    pub counted: Vec<WeightedVote>,
    /// Ballots that will never count
    pub rejected: Vec<Rejection>,
    /// Ballots whose evaluation failed for transient reasons
    pub retry: Vec<Rejection>,
}

pub struct TallyRun<'a, V, S, B> {
    proposal: &'a Proposal,
    verifier: &'a SignatureVerifier<V>,
    resolver: &'a SnapshotResolver<S, B>,
    policy: EligibilityPolicy,
    strategy: Box<dyn Strategy>,
}

impl<'a, V, S, B> TallyRun<'a, V, S, B>
where
    V: ScriptClient,
    S: ScriptClient,
    B: BalanceService,
{
    pub fn new(
        proposal: &'a Proposal,
        verifier: &'a SignatureVerifier<V>,
        resolver: &'a SnapshotResolver<S, B>,
        policy: EligibilityPolicy,
    ) -> Self {
        Self {
            proposal,
            verifier,
            resolver,
            policy,
            strategy: proposal.strategy.strategy(),
        }
    }

    pub fn run(&self, ballots: Vec<Ballot>) -> Result<TallyOutcome, TallyError> {
        if self.proposal.is_cancelled() {
            return Err(TallyError::Cancelled(self.proposal.id));
        }
        let pinned = if self.strategy.requires_snapshot() {
            Some(self.resolver.pin(self.proposal)?)
        } else {
            None
        };
        info!(
            proposal = self.proposal.id,
            strategy = ?self.proposal.strategy,
            block_height = ?pinned.as_ref().map(PinnedResolver::block_height),
            ballots = ballots.len(),
            "tallying proposal"
        );

        let evaluated: Vec<_> = ballots
            .into_par_iter()
            .map(|ballot| {
                let address = ballot.voter_address.clone();
                let choice = ballot.choice.clone();
                let timestamp = ballot.timestamp;
                let outcome = self.evaluate(ballot, pinned.as_ref());
                (address, choice, timestamp, outcome)
            })
            .collect();

        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        let mut retry = Vec::new();
        for (address, choice, timestamp, outcome) in evaluated {
            match outcome {
                Ok(vote) => valid.push((timestamp, vote)),
                Err(error) if error.is_retryable() => {
                    warn!(%address, %error, "ballot evaluation failed, to be retried");
                    retry.push(Rejection { address, choice, error });
                }
                Err(error) => {
                    warn!(%address, %error, "ballot rejected");
                    rejected.push(Rejection { address, choice, error });
                }
            }
        }
        let counted = latest_per_voter(valid, &mut rejected);

        // resolutions may finish after a cancellation, their results are dropped
        if self.proposal.is_cancelled() {
            return Err(TallyError::Cancelled(self.proposal.id));
        }
        let mut results = ProposalResults::new(self.proposal);
        self.strategy.tally_votes(&counted, &mut results);
        info!(
            proposal = self.proposal.id,
            counted = counted.len(),
            rejected = rejected.len(),
            retry = retry.len(),
            "tally complete"
        );

        Ok(TallyOutcome {
            results,
            counted,
            rejected,
            retry,
        })
    }

    fn evaluate(
        &self,
        ballot: Ballot,
        pinned: Option<&PinnedResolver<'_, S, B>>,
    ) -> Result<WeightedVote, BallotError> {
        if ballot.proposal_id != self.proposal.id {
            return Err(BallotError::WrongProposal {
                expected: self.proposal.id,
                found: ballot.proposal_id,
            });
        }
        if !self.proposal.has_choice(&ballot.choice) {
            return Err(BallotError::UnknownChoice(ballot.choice));
        }
        if !ballot.is_bound() {
            return Err(BallotError::InvalidSignature(
                "signed message does not match the ballot".to_string(),
            ));
        }

        self.verifier.verify(
            &ballot.voter_address,
            &ballot.raw_message,
            &ballot.signatures,
            MessageKind::UserMessage,
        )?;

        let contract = &self.proposal.contract;
        let snapshot = match pinned {
            Some(pinned) => pinned.resolve_snapshot(&ballot.voter_address, contract)?,
            None => BalanceSnapshot::empty(
                ballot.voter_address.clone(),
                self.proposal.block_height.unwrap_or_default(),
            ),
        };
        let vote = VoteWithBalance { ballot, snapshot };
        let weight = self
            .strategy
            .get_vote_weight(&vote, self.proposal, &self.policy)?;
        debug!(address = %vote.ballot.voter_address, choice = %vote.ballot.choice, %weight, "ballot counted");

        Ok(WeightedVote {
            address: vote.ballot.voter_address,
            choice: vote.ballot.choice,
            weight,
        })
    }
}

/// Keeps the latest valid ballot of every voter, the others are rejected.
/// Ties on the timestamp go to the greatest choice.
fn latest_per_voter(
    valid: Vec<(u64, WeightedVote)>,
    rejected: &mut Vec<Rejection>,
) -> Vec<WeightedVote> {
    let mut latest: BTreeMap<Address, (u64, WeightedVote)> = BTreeMap::new();
    for (timestamp, vote) in valid {
        match latest.entry(vote.address.clone()) {
            Entry::Vacant(entry) => {
                entry.insert((timestamp, vote));
            }
            Entry::Occupied(mut entry) => {
                let (kept_at, kept) = entry.get();
                let newer = (timestamp, vote.choice.as_str()) > (*kept_at, kept.choice.as_str());
                let (_, superseded) = if newer {
                    entry.insert((timestamp, vote))
                } else {
                    (timestamp, vote)
                };
                warn!(address = %superseded.address, choice = %superseded.choice, "ballot superseded");
                rejected.push(Rejection {
                    address: superseded.address.clone(),
                    choice: superseded.choice,
                    error: BallotError::DuplicateVoter(superseded.address),
                });
            }
        }
    }
    latest.into_values().map(|(_, vote)| vote).collect()
}
