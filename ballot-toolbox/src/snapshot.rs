//! Resolution of voter holdings, pinned to the snapshot height of a proposal.

use crate::chain_value::{decode, DecodeError, GenericValue};
use crate::proposal::{Proposal, ProposalId};
use crate::script::{
    templates::{self, ContractRegistry, TemplateKind},
    BlockSelector, ScriptArg, ScriptClient, ScriptError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use snapshot_lib::{
    to_fixed_point, AssetKind, BalanceAtHeight, BalanceService, BalanceSnapshot, BlockHeight,
    EligibilityContract,
};

/// Where historical fungible balances come from
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Query the balance snapshot service at the pinned height
    #[default]
    Service,
    /// Use the live balance instead, for development networks without a
    /// snapshot service
    Bypass,
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Service(#[from] snapshot_lib::Error),
    #[error("proposal {0} has no snapshot height")]
    Unpinned(ProposalId),
    #[error("contract {0} has no event id")]
    MissingEventId(String),
    #[error("contract {0} is not an asset collection")]
    NotAnAsset(String),
}

impl ResolverError {
    /// Failures of the oracle or the snapshot service rather than of the
    /// resolved data
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Script(ScriptError::Decode(_)) | Self::Script(ScriptError::Arguments(_)) => {
                false
            }
            Self::Script(_) | Self::Service(_) => true,
            Self::Decode(_) | Self::Unpinned(_) | Self::MissingEventId(_) | Self::NotAnAsset(_) => {
                false
            }
        }
    }
}

pub struct SnapshotResolver<S, B> {
    scripts: S,
    service: B,
    registry: ContractRegistry,
    mode: SnapshotMode,
}

impl<S: ScriptClient, B: BalanceService> SnapshotResolver<S, B> {
    pub fn new(scripts: S, service: B, registry: ContractRegistry, mode: SnapshotMode) -> Self {
        match mode {
            SnapshotMode::Service => info!("resolving balances through the snapshot service"),
            SnapshotMode::Bypass => warn!("snapshot service bypassed, using live balances"),
        }
        Self {
            scripts,
            service,
            registry,
            mode,
        }
    }

    pub fn mode(&self) -> SnapshotMode {
        self.mode
    }

    /// Handle resolving every balance of `proposal` at its snapshot height
    pub fn pin(&self, proposal: &Proposal) -> Result<PinnedResolver<'_, S, B>, ResolverError> {
        let block_height = proposal
            .block_height
            .ok_or(ResolverError::Unpinned(proposal.id))?;
        Ok(PinnedResolver {
            resolver: self,
            block_height,
        })
    }

    /// Current balance of `address` in token units.
    ///
    /// Asset contracts count owned items, an event badge counts as one.
    pub fn live_balance(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<f64, ResolverError> {
        match contract.kind {
            AssetKind::Fungible => {
                let script = templates::render(
                    templates::FUNGIBLE_BALANCE,
                    contract,
                    &self.registry,
                    TemplateKind::Fungible,
                );
                let args = [
                    ScriptArg::public_path(contract.public_path.clone()),
                    ScriptArg::address(address),
                ];
                let value = decode(&self.scripts.execute(&script, &args, BlockSelector::Sealed)?);
                let balance = parse_decimal(&value)?;
                debug!(address, token = %contract.name, balance, "live balance");
                Ok(balance)
            }
            AssetKind::NonFungible => {
                Ok(self.asset_ids_at(address, contract, BlockSelector::Sealed)?.len() as f64)
            }
            AssetKind::EventBadge => {
                Ok(if self.owns_event_badge(address, contract)? { 1.0 } else { 0.0 })
            }
        }
    }

    pub fn owns_event_badge(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<bool, ResolverError> {
        let event_id = contract
            .event_id
            .ok_or_else(|| ResolverError::MissingEventId(contract.name.clone()))?;
        let script = templates::render(
            templates::OWNS_FLOAT,
            contract,
            &self.registry,
            TemplateKind::NonFungible,
        );
        let args = [ScriptArg::address(address), ScriptArg::UInt64(event_id)];
        let value = decode(&self.scripts.execute(&script, &args, BlockSelector::Sealed)?);
        value.as_bool().ok_or(ResolverError::Decode(DecodeError::UnexpectedShape {
            expected: "boolean",
            found: value.kind(),
        }))
    }

    /// Whether `address` currently holds at least the contract's threshold,
    /// as required to create a proposal.
    pub fn enforce_token_threshold(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<bool, ResolverError> {
        let balance = self.live_balance(address, contract)?;
        Ok(balance >= contract.threshold.unwrap_or_default())
    }

    fn asset_ids_at(
        &self,
        address: &str,
        contract: &EligibilityContract,
        at: BlockSelector,
    ) -> Result<BTreeSet<String>, ResolverError> {
        let (template, args) = match contract.kind {
            AssetKind::NonFungible => (templates::NFT_IDS, vec![ScriptArg::address(address)]),
            AssetKind::EventBadge => {
                let event_id = contract
                    .event_id
                    .ok_or_else(|| ResolverError::MissingEventId(contract.name.clone()))?;
                (
                    templates::FLOAT_IDS,
                    vec![ScriptArg::address(address), ScriptArg::UInt64(event_id)],
                )
            }
            AssetKind::Fungible => return Err(ResolverError::NotAnAsset(contract.name.clone())),
        };
        let script = templates::render(template, contract, &self.registry, TemplateKind::NonFungible);
        let ids = parse_ids(&decode(&self.scripts.execute(&script, &args, at)?))?;
        debug!(address, collection = %contract.name, %at, count = ids.len(), "owned assets");
        Ok(ids)
    }
}

/// Resolves balances of one proposal, always at its snapshot height.
pub struct PinnedResolver<'a, S, B> {
    resolver: &'a SnapshotResolver<S, B>,
    block_height: BlockHeight,
}

impl<'a, S: ScriptClient, B: BalanceService> PinnedResolver<'a, S, B> {
    pub fn block_height(&self) -> BlockHeight {
        self.block_height
    }

    /// Balance of `address` in fixed-point units.
    pub fn resolve_balance(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<f64, ResolverError> {
        match contract.kind {
            AssetKind::Fungible => {
                let balance = self.fungible_balance(address, contract)?;
                Ok(balance.primary_account_balance as f64)
            }
            AssetKind::NonFungible | AssetKind::EventBadge => {
                Ok(self.resolve_asset_ids(address, contract)?.len() as f64)
            }
        }
    }

    pub fn resolve_asset_ids(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<BTreeSet<String>, ResolverError> {
        self.resolver
            .asset_ids_at(address, contract, BlockSelector::Height(self.block_height))
    }

    pub fn resolve_snapshot(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<BalanceSnapshot, ResolverError> {
        match contract.kind {
            AssetKind::Fungible => Ok(BalanceSnapshot::from_balance(
                address,
                self.block_height,
                self.fungible_balance(address, contract)?,
            )),
            AssetKind::NonFungible | AssetKind::EventBadge => Ok(BalanceSnapshot::from_assets(
                address,
                self.block_height,
                self.resolve_asset_ids(address, contract)?,
            )),
        }
    }

    fn fungible_balance(
        &self,
        address: &str,
        contract: &EligibilityContract,
    ) -> Result<BalanceAtHeight, ResolverError> {
        match self.resolver.mode {
            SnapshotMode::Service => Ok(self
                .resolver
                .service
                .balance_at_height(address, self.block_height, contract)?),
            SnapshotMode::Bypass => {
                let live = self.resolver.live_balance(address, contract)?;
                Ok(BalanceAtHeight {
                    primary_account_balance: to_fixed_point(live),
                    block_height: self.block_height,
                    ..Default::default()
                })
            }
        }
    }
}

fn parse_decimal(value: &GenericValue) -> Result<f64, DecodeError> {
    let text = value.as_text().ok_or(DecodeError::UnexpectedShape {
        expected: "decimal",
        found: value.kind(),
    })?;
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(DecodeError::InvalidDecimal(text.to_string())),
    }
}

/// A missing collection owns nothing.
fn parse_ids(value: &GenericValue) -> Result<BTreeSet<String>, DecodeError> {
    match value {
        GenericValue::Absent => Ok(BTreeSet::new()),
        GenericValue::List(items) => items
            .iter()
            .map(|item| match item {
                GenericValue::Text(id) => Ok(id.clone()),
                other => Err(DecodeError::UnexpectedShape {
                    expected: "identifier",
                    found: other.kind(),
                }),
            })
            .collect(),
        other => Err(DecodeError::UnexpectedShape {
            expected: "list",
            found: other.kind(),
        }),
    }
}
