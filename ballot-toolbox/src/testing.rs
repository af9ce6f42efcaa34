//! In-memory stand-ins for the access node and the snapshot service.

use crate::chain_value::ChainValue;
use crate::script::{BlockSelector, ContractRegistry, ScriptArg, ScriptClient, ScriptError};
use reqwest::StatusCode;
use snapshot_lib::{AssetKind, BalanceAtHeight, BalanceService, EligibilityContract};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Answers the bundled scripts from in-memory state, recording every call
#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
    signature_hook: Mutex<Option<Hook>>,
}

#[derive(Default)]
struct ChainState {
    balances: HashMap<String, String>,
    asset_ids: HashMap<String, Vec<String>>,
    badge_owners: HashSet<String>,
    rejected_signers: HashSet<String>,
    signature_result: Option<Result<ChainValue, ScriptError>>,
    failure: Option<ScriptError>,
    calls: Vec<(&'static str, BlockSelector)>,
}

fn copy_error(e: &ScriptError) -> ScriptError {
    match e {
        ScriptError::Transport(m) => ScriptError::Transport(m.clone()),
        ScriptError::Execution(m) => ScriptError::Execution(m.clone()),
        other => ScriptError::Execution(other.to_string()),
    }
}

fn copy_result(result: &Result<ChainValue, ScriptError>) -> Result<ChainValue, ScriptError> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(e) => Err(copy_error(e)),
    }
}

fn address_arg(args: &[ScriptArg]) -> String {
    args.iter()
        .find_map(|arg| match arg {
            ScriptArg::Address(address) => Some(address.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn boolean(value: bool) -> ChainValue {
    ChainValue::Scalar(value.to_string())
}

impl MockChain {
    pub fn set_balance(&self, address: &str, balance: &str) {
        let mut state = self.state.lock().unwrap();
        state.balances.insert(address.to_string(), balance.to_string());
    }

    pub fn set_asset_ids(&self, address: &str, ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state
            .asset_ids
            .insert(address.to_string(), ids.iter().map(|id| id.to_string()).collect());
    }

    pub fn set_badge_owner(&self, address: &str) {
        self.state.lock().unwrap().badge_owners.insert(address.to_string());
    }

    pub fn reject_signatures_of(&self, address: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_signers
            .insert(address.to_string());
    }

    pub fn set_signature_result(&self, result: Result<ChainValue, ScriptError>) {
        self.state.lock().unwrap().signature_result = Some(result);
    }

    /// Every script fails with `error` from now on
    pub fn set_failure(&self, error: ScriptError) {
        self.state.lock().unwrap().failure = Some(error);
    }

    pub fn calls(&self) -> Vec<(&'static str, BlockSelector)> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Runs `hook` whenever a signature is verified
    pub fn on_signature(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.signature_hook.lock().unwrap() = Some(Box::new(hook));
    }
}

impl ScriptClient for MockChain {
    fn execute(
        &self,
        script: &str,
        args: &[ScriptArg],
        at: BlockSelector,
    ) -> Result<ChainValue, ScriptError> {
        let address = address_arg(args);
        let name = if script.contains("Crypto.KeyList") {
            "validate_signature"
        } else if script.contains("FungibleToken.Balance") {
            "fungible_balance"
        } else if script.contains(".length > 0") {
            "owns_float"
        } else if script.contains("ownedIdsFromEvent") {
            "float_ids"
        } else if script.contains("getIDs") {
            "nft_ids"
        } else {
            return Err(ScriptError::Execution("unknown script".to_string()));
        };

        if name == "validate_signature" {
            if let Some(hook) = &*self.signature_hook.lock().unwrap() {
                hook();
            }
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push((name, at));
        if let Some(failure) = &state.failure {
            return Err(copy_error(failure));
        }

        match name {
            "validate_signature" => {
                if state.rejected_signers.contains(&address) {
                    return Ok(boolean(false));
                }
                state
                    .signature_result
                    .as_ref()
                    .map_or(Ok(boolean(true)), copy_result)
            }
            "fungible_balance" => Ok(ChainValue::Scalar(
                state
                    .balances
                    .get(&address)
                    .cloned()
                    .unwrap_or_else(|| "0.00000000".to_string()),
            )),
            "owns_float" => Ok(boolean(state.badge_owners.contains(&address))),
            _ => Ok(state
                .asset_ids
                .get(&address)
                .map_or(ChainValue::Absent, |ids| {
                    ChainValue::List(ids.iter().map(|id| ChainValue::Scalar(id.clone())).collect())
                })),
        }
    }
}

/// Snapshot service answering from a map of balances
#[derive(Default)]
pub struct MockService {
    state: Mutex<ServiceState>,
}

#[derive(Default)]
struct ServiceState {
    balances: HashMap<String, (u64, u64)>,
    failure: Option<u16>,
    requests: Vec<(String, u64)>,
}

impl MockService {
    pub fn set_balance(&self, address: &str, primary: u64, staking: u64) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(address.to_string(), (primary, staking));
    }

    pub fn fail_with(&self, status: u16) {
        self.state.lock().unwrap().failure = Some(status);
    }

    pub fn requests(&self) -> Vec<(String, u64)> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl BalanceService for MockService {
    fn balance_at_height(
        &self,
        address: &str,
        block_height: u64,
        _contract: &EligibilityContract,
    ) -> Result<BalanceAtHeight, snapshot_lib::Error> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((address.to_string(), block_height));
        if let Some(status) = state.failure {
            return Err(snapshot_lib::Error::Status {
                status: StatusCode::from_u16(status).unwrap(),
                url: format!("/balance-at-blockheight/{}/{}", address, block_height),
            });
        }
        let (primary, staking) = state.balances.get(address).copied().unwrap_or_default();
        Ok(BalanceAtHeight {
            primary_account_balance: primary,
            secondary_account_balance: 0,
            staking_balance: staking,
            block_height,
        })
    }
}

pub fn registry() -> ContractRegistry {
    ContractRegistry {
        fungible_token: "0xee82856bf20e2aa6".to_string(),
        non_fungible_token: "0xf8d6e0586b0a20c7".to_string(),
        metadata_views: "0xf8d6e0586b0a20c7".to_string(),
        topshot: None,
    }
}

pub fn token_contract(threshold: Option<f64>, max_weight: Option<f64>) -> EligibilityContract {
    EligibilityContract {
        kind: AssetKind::Fungible,
        name: "FlowToken".to_string(),
        addr: "0x0ae53cb6e3f42a79".to_string(),
        public_path: "flowTokenBalance".to_string(),
        threshold,
        max_weight,
        event_id: None,
    }
}

pub fn asset_contract(threshold: Option<f64>) -> EligibilityContract {
    EligibilityContract {
        kind: AssetKind::NonFungible,
        name: "Flovatar".to_string(),
        addr: "0x921ea449dffec68a".to_string(),
        public_path: "FlovatarCollection".to_string(),
        threshold,
        max_weight: None,
        event_id: None,
    }
}

pub fn badge_contract(event_id: Option<u64>) -> EligibilityContract {
    EligibilityContract {
        kind: AssetKind::EventBadge,
        name: "FLOAT".to_string(),
        addr: "0x2d4c3caffbeab845".to_string(),
        public_path: "FLOATCollectionPublicPath".to_string(),
        threshold: Some(1.0),
        max_weight: None,
        event_id,
    }
}
