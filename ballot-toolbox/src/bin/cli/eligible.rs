use super::load_json;
use ballot_toolbox::config::ToolboxConfig;
use ballot_toolbox::script::AccessNodeClient;
use ballot_toolbox::snapshot::{EligibilityContract, SnapshotResolver};
use color_eyre::Report;
use snapshot_lib::SnapshotClient;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Eligible {
    /// Toolbox configuration file
    #[structopt(long)]
    config: PathBuf,

    /// Json encoded eligibility contract
    #[structopt(long)]
    contract: PathBuf,

    /// Account to check
    address: String,
}

impl Eligible {
    pub fn exec(self) -> Result<(), Report> {
        let config = ToolboxConfig::load(&self.config)?;
        let contract: EligibilityContract = load_json(&self.contract)?;
        let resolver = SnapshotResolver::new(
            AccessNodeClient::new(&config.access_node_url)?,
            SnapshotClient::with_timeout(&config.snapshot_service_url, config.snapshot_timeout())?,
            config.registry()?,
            config.snapshot_mode,
        );

        let balance = resolver.live_balance(&self.address, &contract)?;
        let eligible = resolver.enforce_token_threshold(&self.address, &contract)?;
        println!(
            "{}: balance {} (threshold {}), {}",
            self.address,
            balance,
            contract.threshold.unwrap_or_default(),
            if eligible { "eligible" } else { "not eligible" }
        );
        Ok(())
    }
}
