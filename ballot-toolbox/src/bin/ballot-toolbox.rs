mod cli;

use color_eyre::Report;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Report> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    cli::Cli::from_args().exec()
}
