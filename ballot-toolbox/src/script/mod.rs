//! Read-only script execution against the ledger.

mod access_node;
pub mod templates;

pub use access_node::AccessNodeClient;
pub use templates::{ContractRegistry, RegistryError, TemplateKind};

use crate::chain_value::{ChainValue, DecodeError};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Access nodes report storage faults while serving a script with this message.
/// Such failures say nothing about the script's inputs and can be retried.
pub const LEDGER_FAULT: &str = "ledger returns unsuccessful";

/// State a script is executed against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockSelector {
    /// Latest sealed block
    Sealed,
    Height(u64),
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sealed => f.write_str("sealed"),
            Self::Height(height) => write!(f, "{}", height),
        }
    }
}

/// Typed script argument, serialized in the json value format understood by
/// access nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum ScriptArg {
    Address(String),
    Path {
        domain: String,
        identifier: String,
    },
    UInt64(#[serde(serialize_with = "as_string")] u64),
    Int(#[serde(serialize_with = "as_string")] i64),
    String(String),
    Array(Vec<ScriptArg>),
}

fn as_string<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: fmt::Display,
{
    serializer.collect_str(value)
}

impl ScriptArg {
    /// Addresses are passed with their `0x` prefix.
    pub fn address(address: &str) -> Self {
        let trimmed = address.trim();
        if trimmed.starts_with("0x") {
            Self::Address(trimmed.to_string())
        } else {
            Self::Address(format!("0x{}", trimmed))
        }
    }

    pub fn public_path(identifier: impl Into<String>) -> Self {
        Self::Path {
            domain: "public".to_string(),
            identifier: identifier.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("could not reach the access node: {0}")]
    Transport(String),
    #[error("script execution failed: {0}")]
    Execution(String),
    #[error("could not encode script arguments")]
    Arguments(#[source] serde_json::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ScriptError {
    /// Failures of the access layer rather than of the script itself
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Execution(message) => message.contains(LEDGER_FAULT),
            Self::Arguments(_) | Self::Decode(_) => false,
        }
    }
}

/// Executes read-only scripts and returns their result as a value tree.
pub trait ScriptClient: Send + Sync {
    fn execute(
        &self,
        script: &str,
        args: &[ScriptArg],
        at: BlockSelector,
    ) -> Result<ChainValue, ScriptError>;
}

impl<T: ScriptClient + ?Sized> ScriptClient for std::sync::Arc<T> {
    fn execute(
        &self,
        script: &str,
        args: &[ScriptArg],
        at: BlockSelector,
    ) -> Result<ChainValue, ScriptError> {
        (**self).execute(script, args, at)
    }
}

impl<T: ScriptClient + ?Sized> ScriptClient for &T {
    fn execute(
        &self,
        script: &str,
        args: &[ScriptArg],
        at: BlockSelector,
    ) -> Result<ChainValue, ScriptError> {
        (**self).execute(script, args, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_arguments() {
        let args = vec![
            ScriptArg::address("f8d6e0586b0a20c7"),
            ScriptArg::Array(vec![ScriptArg::Int(0), ScriptArg::Int(-1)]),
            ScriptArg::UInt64(102906478),
            ScriptArg::public_path("flowTokenBalance"),
        ];
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!([
                {"type": "Address", "value": "0xf8d6e0586b0a20c7"},
                {"type": "Array", "value": [
                    {"type": "Int", "value": "0"},
                    {"type": "Int", "value": "-1"}
                ]},
                {"type": "UInt64", "value": "102906478"},
                {"type": "Path", "value": {"domain": "public", "identifier": "flowTokenBalance"}}
            ])
        );
    }

    #[test]
    fn classify_failures() {
        assert!(ScriptError::Transport("connection refused".into()).is_transient());
        assert!(ScriptError::Execution(
            "rpc error: failed to execute script: ledger returns unsuccessful: x".into()
        )
        .is_transient());
        assert!(!ScriptError::Execution("cannot find declaration `Foo`".into()).is_transient());
        assert_eq!(BlockSelector::Height(42).to_string(), "42");
        assert_eq!(BlockSelector::Sealed.to_string(), "sealed");
    }
}
