pub mod client;
pub mod contract;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use client::{Error, SnapshotClient};
pub use contract::{AssetKind, EligibilityContract, NATIVE_TOKEN_NAME};

/// Balances are exchanged as integers in units of 10^-FIXED_POINT_DECIMALS tokens
pub const FIXED_POINT_DECIMALS: u32 = 8;
pub const FIXED_POINT_SCALE: f64 = 100_000_000.0;

pub type Address = String;
pub type BlockHeight = u64;

/// Converts a balance in token units to fixed-point units, rounding to the
/// closest representable value.
pub fn to_fixed_point(balance: f64) -> u64 {
    (balance * FIXED_POINT_SCALE).round() as u64
}

/// Balances of an account as indexed by the snapshot service at a given height
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAtHeight {
    pub primary_account_balance: u64,
    #[serde(default)]
    pub secondary_account_balance: u64,
    #[serde(default)]
    pub staking_balance: u64,
    pub block_height: BlockHeight,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    #[serde(default)]
    pub message: String,
    pub status: String,
    pub block_height: BlockHeight,
}

impl SnapshotData {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SnapshotResponse {
    pub data: SnapshotData,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LatestSnapshot {
    #[serde(default)]
    pub id: String,
    pub block_height: BlockHeight,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FungibleTokenContract {
    pub contract_address: String,
    pub contract_name: String,
    pub public_capability_path: String,
}

/// The view of a voter's holdings used to weight their ballot.
///
/// Every snapshot taken for a proposal carries the proposal's pinned height.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub address: Address,
    pub block_height: BlockHeight,
    pub primary_balance: u64,
    #[serde(default)]
    pub secondary_balance: Option<u64>,
    #[serde(default)]
    pub staking_balance: Option<u64>,
    #[serde(default)]
    pub asset_ids: Option<BTreeSet<String>>,
}

impl BalanceSnapshot {
    /// A snapshot holding nothing, for strategies that do not look at balances
    pub fn empty(address: impl Into<Address>, block_height: BlockHeight) -> Self {
        Self {
            address: address.into(),
            block_height,
            primary_balance: 0,
            secondary_balance: None,
            staking_balance: None,
            asset_ids: None,
        }
    }

    pub fn from_balance(
        address: impl Into<Address>,
        block_height: BlockHeight,
        balance: BalanceAtHeight,
    ) -> Self {
        Self {
            address: address.into(),
            block_height,
            primary_balance: balance.primary_account_balance,
            secondary_balance: Some(balance.secondary_account_balance),
            staking_balance: Some(balance.staking_balance),
            asset_ids: None,
        }
    }

    pub fn from_assets(
        address: impl Into<Address>,
        block_height: BlockHeight,
        asset_ids: BTreeSet<String>,
    ) -> Self {
        Self {
            address: address.into(),
            block_height,
            primary_balance: asset_ids.len() as u64,
            secondary_balance: None,
            staking_balance: None,
            asset_ids: Some(asset_ids),
        }
    }
}

/// Historical balances, keyed by `(address, block height, contract)`
pub trait BalanceService: Send + Sync {
    fn balance_at_height(
        &self,
        address: &str,
        block_height: BlockHeight,
        contract: &EligibilityContract,
    ) -> Result<BalanceAtHeight, Error>;
}

impl<T: BalanceService + ?Sized> BalanceService for std::sync::Arc<T> {
    fn balance_at_height(
        &self,
        address: &str,
        block_height: BlockHeight,
        contract: &EligibilityContract,
    ) -> Result<BalanceAtHeight, Error> {
        (**self).balance_at_height(address, block_height, contract)
    }
}
impl<T: BalanceService + ?Sized> BalanceService for &T {
    fn balance_at_height(
        &self,
        address: &str,
        block_height: BlockHeight,
        contract: &EligibilityContract,
    ) -> Result<BalanceAtHeight, Error> {
        (**self).balance_at_height(address, block_height, contract)
    }
}

#[cfg(any(test, feature = "proptest"))]
mod arbitrary {
    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for BalanceSnapshot {
        type Parameters = ();
        type Strategy = BoxedStrategy<BalanceSnapshot>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (
                any::<[u8; 8]>(),
                0..1_000_000u64,
                0..10_000_000_000_000u64,
                proptest::option::of(0..10_000_000_000_000u64),
                proptest::option::of(proptest::collection::btree_set(any::<u32>(), 0..16)),
            )
                .prop_map(|(address, block_height, primary, staking, ids)| {
                    let address = format!(
                        "0x{}",
                        address.iter().map(|b| format!("{:02x}", b)).collect::<String>()
                    );
                    BalanceSnapshot {
                        address,
                        block_height,
                        primary_balance: primary,
                        secondary_balance: None,
                        staking_balance: staking,
                        asset_ids: ids.map(|ids| ids.into_iter().map(|id| id.to_string()).collect()),
                    }
                })
                .boxed()
        }
    }
}
