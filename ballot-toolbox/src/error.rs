use crate::chain_value::DecodeError;
use crate::eligibility::PolicyError;
use crate::proposal::ProposalId;
use crate::script::ScriptError;
use crate::signature::SignatureError;
use crate::snapshot::ResolverError;
use crate::strategies::StrategyError;
use snapshot_lib::Address;
use thiserror::Error;

/// Why a ballot did not make it into a tally
#[derive(Debug, Error)]
pub enum BallotError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("could not resolve voter balance")]
    Resolver(#[source] ResolverError),
    #[error("insufficient balance: {weight} is below the threshold of {threshold}")]
    InsufficientBalance { threshold: f64, weight: f64 },
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("signature oracle unavailable")]
    Oracle(#[source] ScriptError),
    #[error(transparent)]
    Policy(PolicyError),
    #[error(transparent)]
    Strategy(StrategyError),
    #[error("ballot is for proposal {found}, expected {expected}")]
    WrongProposal {
        expected: ProposalId,
        found: ProposalId,
    },
    #[error("unknown choice {0:?}")]
    UnknownChoice(String),
    #[error("superseded by a later ballot of {0}")]
    DuplicateVoter(Address),
}

impl BallotError {
    /// Short name of the failure, for reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Resolver(_) => "resolver",
            Self::InsufficientBalance { .. } => "insufficient-balance",
            Self::InvalidSignature(_) => "invalid-signature",
            Self::Oracle(_) => "oracle",
            Self::Policy(_) => "policy",
            Self::Strategy(_) => "strategy",
            Self::WrongProposal { .. } => "wrong-proposal",
            Self::UnknownChoice(_) => "unknown-choice",
            Self::DuplicateVoter(_) => "duplicate-voter",
        }
    }

    /// Transient failures, to be retried rather than reported to the voter
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Oracle(_) => true,
            Self::Resolver(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<SignatureError> for BallotError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::InvalidSignature(reason) => Self::InvalidSignature(reason),
            SignatureError::Oracle(e) => Self::Oracle(e),
        }
    }
}

impl From<ResolverError> for BallotError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::Decode(e) => Self::Decode(e),
            e => Self::Resolver(e),
        }
    }
}

impl From<PolicyError> for BallotError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::InsufficientBalance { threshold, weight } => {
                Self::InsufficientBalance { threshold, weight }
            }
            e => Self::Policy(e),
        }
    }
}

impl From<StrategyError> for BallotError {
    fn from(e: StrategyError) -> Self {
        match e {
            StrategyError::Policy(e) => e.into(),
            e => Self::Strategy(e),
        }
    }
}
