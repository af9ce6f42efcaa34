use crate::strategies::StrategyKind;
use serde::{Deserialize, Serialize};
use snapshot_lib::{BlockHeight, EligibilityContract};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type ProposalId = u64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Published,
    Cancelled,
    Closed,
}

/// Shared flag set when a proposal is cancelled, observed by tallies running
/// on other threads.
#[derive(Clone, Debug, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: ProposalId,
    pub choices: Vec<String>,
    pub strategy: StrategyKind,
    pub contract: EligibilityContract,
    /// Height every balance for this proposal is resolved at
    #[serde(default)]
    pub block_height: Option<BlockHeight>,
    #[serde(default)]
    pub status: ProposalStatus,
    #[serde(skip)]
    cancellation: CancellationHandle,
}

impl Proposal {
    pub fn new(
        id: ProposalId,
        choices: Vec<String>,
        strategy: StrategyKind,
        contract: EligibilityContract,
        block_height: Option<BlockHeight>,
    ) -> Self {
        Self {
            id,
            choices,
            strategy,
            contract,
            block_height,
            status: ProposalStatus::Published,
            cancellation: CancellationHandle::default(),
        }
    }

    pub fn has_choice(&self, choice: &str) -> bool {
        self.choices.iter().any(|c| c == choice)
    }

    /// Cancels the proposal. Clones share the cancellation flag.
    pub fn cancel(&mut self) {
        self.status = ProposalStatus::Cancelled;
        self.cancellation.cancel();
    }

    pub fn cancellation(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ProposalStatus::Cancelled || self.cancellation.is_cancelled()
    }
}
