pub mod ballot;
pub mod chain_value;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod proposal;
pub mod script;
pub mod signature;
pub mod snapshot;
pub mod strategies;
pub mod tally;

#[cfg(test)]
mod testing;
