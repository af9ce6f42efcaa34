use super::{load_json, open_output};
use ballot_toolbox::ballot::Ballot;
use ballot_toolbox::config::ToolboxConfig;
use ballot_toolbox::proposal::Proposal;
use ballot_toolbox::script::AccessNodeClient;
use ballot_toolbox::signature::SignatureVerifier;
use ballot_toolbox::snapshot::SnapshotResolver;
use ballot_toolbox::strategies::StrategyKind;
use ballot_toolbox::tally::{Rejection, TallyOutcome, TallyRun};
use color_eyre::{eyre::eyre, Report};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use snapshot_lib::SnapshotClient;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use structopt::StructOpt;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(eyre!("unknown output format {}", other)),
        }
    }
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Tally {
    /// Toolbox configuration file
    #[structopt(long)]
    config: PathBuf,

    /// Json encoded proposal, with its eligibility contract and snapshot height
    #[structopt(long)]
    proposal: PathBuf,

    /// Json encoded list of ballots cast on the proposal
    #[structopt(long)]
    ballots: PathBuf,

    /// Results output path, stdout if missing
    #[structopt(long)]
    output: Option<PathBuf>,

    /// Either `csv` or `json`
    #[structopt(long, default_value = "csv")]
    format: OutputFormat,

    /// Write rejected and retryable ballots to this csv file
    #[structopt(long)]
    rejections: Option<PathBuf>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ResultRecord<'a> {
    choice: &'a str,
    votes: u64,
    weight: String,
}

#[derive(Serialize)]
struct RejectionRecord<'a> {
    address: &'a str,
    choice: &'a str,
    retryable: bool,
    reason: &'a str,
    detail: String,
}

impl Tally {
    pub fn exec(self) -> Result<(), Report> {
        let config = ToolboxConfig::load(&self.config)?;
        let proposal: Proposal = load_json(&self.proposal)?;
        let ballots: Vec<Ballot> = load_json(&self.ballots)?;

        let scripts = Arc::new(AccessNodeClient::new(&config.access_node_url)?);
        let service =
            SnapshotClient::with_timeout(&config.snapshot_service_url, config.snapshot_timeout())?;
        let verifier = SignatureVerifier::new(Arc::clone(&scripts));
        let resolver =
            SnapshotResolver::new(scripts, service, config.registry()?, config.snapshot_mode);

        let outcome = TallyRun::new(&proposal, &verifier, &resolver, config.policy()).run(ballots)?;
        report(&outcome);

        match self.format {
            OutputFormat::Csv => write_csv(&self.output, proposal.strategy, &outcome)?,
            OutputFormat::Json => {
                let mut writer = open_output(&self.output)?;
                serde_json::to_writer_pretty(&mut writer, &outcome.results)?;
                writeln!(writer)?;
            }
        }
        if let Some(path) = self.rejections {
            write_rejections(&Some(path), &outcome)?;
        }
        Ok(())
    }
}

fn report(outcome: &TallyOutcome) {
    for (reason, count) in outcome
        .rejected
        .iter()
        .counts_by(|r| r.error.kind())
        .into_iter()
        .sorted()
    {
        warn!(reason, count, "rejected ballots");
    }
    if !outcome.retry.is_empty() {
        warn!(count = outcome.retry.len(), "ballots to be retried");
    }
    info!(counted = outcome.counted.len(), "ballots counted");
}

/// One row per choice: the number of counted ballots and the choice's weight,
/// which is that same number when every address has one vote.
fn result_records(kind: StrategyKind, outcome: &TallyOutcome) -> Vec<ResultRecord<'_>> {
    let ballots = outcome.counted.iter().counts_by(|vote| vote.choice.as_str());
    outcome
        .results
        .results_float
        .iter()
        .map(|(choice, weight)| {
            let votes = ballots.get(choice.as_str()).copied().unwrap_or_default() as u64;
            let weight = match kind {
                StrategyKind::OneAddressOneVote => Decimal::from(votes),
                _ => *weight,
            };
            ResultRecord {
                choice,
                votes,
                weight: weight.normalize().to_string(),
            }
        })
        .collect()
}

fn write_csv(
    output: &Option<PathBuf>,
    kind: StrategyKind,
    outcome: &TallyOutcome,
) -> Result<(), Report> {
    let mut csv_writer = csv::Writer::from_writer(open_output(output)?);
    for record in result_records(kind, outcome) {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn write_rejections(output: &Option<PathBuf>, outcome: &TallyOutcome) -> Result<(), Report> {
    let mut csv_writer = csv::Writer::from_writer(open_output(output)?);
    let records = outcome
        .rejected
        .iter()
        .map(|r| (false, r))
        .chain(outcome.retry.iter().map(|r| (true, r)));
    for (retryable, Rejection { address, choice, error }) in records {
        csv_writer.serialize(RejectionRecord {
            address,
            choice,
            retryable,
            reason: error.kind(),
            detail: error.to_string(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
