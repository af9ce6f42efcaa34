use super::{open_input, open_output};
use ballot_toolbox::chain_value::{decode, ChainValue};
use color_eyre::Report;
use std::io::Write;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Decode {
    /// Json encoded script result, stdin if missing
    input: Option<PathBuf>,

    /// Output path, stdout if missing
    #[structopt(long)]
    output: Option<PathBuf>,
}

impl Decode {
    pub fn exec(self) -> Result<(), Report> {
        let value: ChainValue = serde_json::from_reader(open_input(&self.input)?)?;
        let mut writer = open_output(&self.output)?;
        serde_json::to_writer_pretty(&mut writer, &decode(&value))?;
        writeln!(writer)?;
        Ok(())
    }
}
