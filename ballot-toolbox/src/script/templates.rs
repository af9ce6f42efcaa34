//! Script sources and the substitution of contract placeholders into them.
//!
//! Templates refer to contracts through quoted placeholders such as
//! `"./FUNGIBLE_TOKEN_ADDRESS"`. Any quoted token ending in a placeholder name
//! is replaced, quotes included, by the value taken from the eligibility
//! contract or from the [`ContractRegistry`] of the selected network.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Deserialize;
use snapshot_lib::EligibilityContract;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const VALIDATE_SIGNATURE: &str = include_str!("../../resources/scripts/validate_signature.cdc");
pub const FUNGIBLE_BALANCE: &str = include_str!("../../resources/scripts/fungible_balance.cdc");
pub const NFT_IDS: &str = include_str!("../../resources/scripts/nft_ids.cdc");
pub const FLOAT_IDS: &str = include_str!("../../resources/scripts/float_ids.cdc");
pub const OWNS_FLOAT: &str = include_str!("../../resources/scripts/owns_float.cdc");

fn placeholder(name: &str) -> Regex {
    Regex::new(&format!(r#""[^"\s]*{}""#, name)).expect("placeholder pattern is valid")
}

static TOKEN_NAME: Lazy<Regex> = Lazy::new(|| placeholder("TOKEN_NAME"));
static TOKEN_ADDRESS: Lazy<Regex> = Lazy::new(|| placeholder("TOKEN_ADDRESS"));
static FUNGIBLE_TOKEN_ADDRESS: Lazy<Regex> = Lazy::new(|| placeholder("FUNGIBLE_TOKEN_ADDRESS"));
static NON_FUNGIBLE_TOKEN_ADDRESS: Lazy<Regex> =
    Lazy::new(|| placeholder("NON_FUNGIBLE_TOKEN_ADDRESS"));
static METADATA_VIEWS_ADDRESS: Lazy<Regex> = Lazy::new(|| placeholder("METADATA_VIEWS_ADDRESS"));
static COLLECTION_PUBLIC_PATH: Lazy<Regex> = Lazy::new(|| placeholder("COLLECTION_PUBLIC_PATH"));
static TOPSHOT_ADDRESS: Lazy<Regex> = Lazy::new(|| placeholder("TOPSHOT_ADDRESS"));

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("contract {contract} has no alias for network {network}")]
    MissingAlias { contract: String, network: String },
    #[error("could not read contract registry")]
    Io(#[from] std::io::Error),
    #[error("malformed contract registry")]
    Json(#[from] serde_json::Error),
}

/// Addresses of the standard contracts on one network
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractRegistry {
    pub fungible_token: String,
    pub non_fungible_token: String,
    pub metadata_views: String,
    pub topshot: Option<String>,
}

#[derive(Deserialize)]
struct FlowProject {
    #[serde(default)]
    contracts: HashMap<String, ProjectContract>,
}

#[derive(Deserialize)]
struct ProjectContract {
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl ContractRegistry {
    pub fn load(path: &Path, network: &str) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_flow_json(&content, network)
    }

    /// Reads `contracts.<Name>.aliases.<network>` from a project file.
    pub fn from_flow_json(content: &str, network: &str) -> Result<Self, RegistryError> {
        let project: FlowProject = serde_json::from_str(content)?;
        let alias = |contract: &str| {
            project
                .contracts
                .get(contract)
                .and_then(|c| c.aliases.get(network))
                .cloned()
        };
        let required = |contract: &str| {
            alias(contract).ok_or_else(|| RegistryError::MissingAlias {
                contract: contract.to_string(),
                network: network.to_string(),
            })
        };

        Ok(Self {
            fungible_token: required("FungibleToken")?,
            non_fungible_token: required("NonFungibleToken")?,
            metadata_views: required("MetadataViews")?,
            topshot: alias("TopShot"),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    Fungible,
    NonFungible,
}

/// Public path expression for a collection path given as a bare identifier
fn collection_path(public_path: &str) -> String {
    if public_path.starts_with('/') {
        public_path.to_string()
    } else {
        format!("/public/{}", public_path)
    }
}

/// Substitutes the placeholders of `template` for `contract`.
///
/// Standard-address placeholders are replaced before `TOKEN_ADDRESS`, which
/// would otherwise also match them.
pub fn render(
    template: &str,
    contract: &EligibilityContract,
    registry: &ContractRegistry,
    kind: TemplateKind,
) -> String {
    let mut code = match kind {
        TemplateKind::Fungible => FUNGIBLE_TOKEN_ADDRESS
            .replace_all(template, NoExpand(&registry.fungible_token))
            .into_owned(),
        TemplateKind::NonFungible => {
            let path = collection_path(&contract.public_path);
            let code = COLLECTION_PUBLIC_PATH.replace_all(template, NoExpand(&path));
            NON_FUNGIBLE_TOKEN_ADDRESS
                .replace_all(&code, NoExpand(&registry.non_fungible_token))
                .into_owned()
        }
    };

    code = METADATA_VIEWS_ADDRESS
        .replace_all(&code, NoExpand(&registry.metadata_views))
        .into_owned();
    code = TOKEN_NAME
        .replace_all(&code, NoExpand(&contract.name))
        .into_owned();
    code = TOKEN_ADDRESS
        .replace_all(&code, NoExpand(&contract.addr))
        .into_owned();
    if let Some(topshot) = &registry.topshot {
        code = TOPSHOT_ADDRESS
            .replace_all(&code, NoExpand(topshot))
            .into_owned();
    }
    code
}
