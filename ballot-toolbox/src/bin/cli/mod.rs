mod decode;
mod eligible;
mod snapshot;
mod tally;

use color_eyre::Report;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub enum Cli {
    /// Verify, weight and count the ballots of a proposal
    Tally(tally::Tally),
    /// Decode a script result into plain json
    Decode(decode::Decode),
    /// Check whether an account holds enough to create a proposal
    Eligible(eligible::Eligible),
    /// Talk to the balance snapshot service
    Snapshot(snapshot::Snapshot),
}

impl Cli {
    pub fn exec(self) -> Result<(), Report> {
        match self {
            Self::Tally(cmd) => cmd.exec(),
            Self::Decode(cmd) => cmd.exec(),
            Self::Eligible(cmd) => cmd.exec(),
            Self::Snapshot(cmd) => cmd.exec(),
        }
    }
}

pub(crate) fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn Read>, Report> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(std::io::stdin()),
    })
}

pub(crate) fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>, Report> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    })
}

pub(crate) fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Report> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}
