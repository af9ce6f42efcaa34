use super::load_json;
use color_eyre::Report;
use snapshot_lib::{BalanceService, EligibilityContract, SnapshotClient};
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use tracing::debug;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Snapshot {
    /// Base url of the snapshot service
    #[structopt(long)]
    url: String,

    /// Request timeout, in seconds
    #[structopt(long, default_value = "10")]
    timeout: u64,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
enum Command {
    /// Snapshot balances of a token at the current height
    Take {
        /// Json encoded eligibility contract
        #[structopt(long)]
        contract: PathBuf,
    },
    /// Status of a snapshot
    Status {
        #[structopt(long)]
        contract: PathBuf,
        block_height: u64,
    },
    /// Height of the latest snapshot
    Latest,
    /// Start indexing balances of a fungible token
    AddToken {
        #[structopt(long)]
        contract: PathBuf,
    },
    /// Balance of an account at a snapshot height
    Balance {
        #[structopt(long)]
        contract: PathBuf,
        address: String,
        block_height: u64,
    },
}

impl Snapshot {
    pub fn exec(self) -> Result<(), Report> {
        let client = SnapshotClient::with_timeout(self.url, Duration::from_secs(self.timeout))?;
        debug!(url = client.base_url(), "using snapshot service");
        let contract = |path: &PathBuf| load_json::<EligibilityContract>(path);

        let output = match self.command {
            Command::Take { contract: path } => {
                serde_json::to_string_pretty(&client.take_snapshot(&contract(&path)?)?)?
            }
            Command::Status {
                contract: path,
                block_height,
            } => serde_json::to_string_pretty(
                &client.status_at_height(&contract(&path)?, block_height)?,
            )?,
            Command::Latest => serde_json::to_string_pretty(&client.latest_block_height()?)?,
            Command::AddToken { contract: path } => {
                let contract = contract(&path)?;
                client.add_fungible_token(&contract)?;
                format!("{} registered", contract.name)
            }
            Command::Balance {
                contract: path,
                address,
                block_height,
            } => serde_json::to_string_pretty(&client.balance_at_height(
                &address,
                block_height,
                &contract(&path)?,
            )?)?,
        };
        println!("{}", output);
        Ok(())
    }
}
