//! Ballot authentication through the on-chain signature verification script.

use crate::ballot::CompositeSignature;
use crate::chain_value::decode;
use crate::script::{templates, BlockSelector, ScriptArg, ScriptClient, ScriptError};
use thiserror::Error;
use tracing::{debug, warn};

pub const TRANSACTION_DOMAIN_TAG: &str = "FLOW-V0.0-transaction";
pub const USER_DOMAIN_TAG: &str = "FLOW-V0.0-user";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Transaction,
    UserMessage,
}

impl MessageKind {
    pub fn domain_tag(self) -> &'static str {
        match self {
            Self::Transaction => TRANSACTION_DOMAIN_TAG,
            Self::UserMessage => USER_DOMAIN_TAG,
        }
    }
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// The verification could not be carried out; resubmitting may succeed.
    #[error("signature oracle unavailable")]
    Oracle(#[source] ScriptError),
}

pub struct SignatureVerifier<S> {
    scripts: S,
}

impl<S: ScriptClient> SignatureVerifier<S> {
    pub fn new(scripts: S) -> Self {
        Self { scripts }
    }

    /// Arguments of the verification script, in the order it declares them.
    pub fn verification_args(
        address: &str,
        message: &str,
        signatures: &[CompositeSignature],
        kind: MessageKind,
    ) -> Vec<ScriptArg> {
        let key_ids = signatures
            .iter()
            .map(|s| ScriptArg::Int(s.key_id))
            .collect();
        let signatures = signatures
            .iter()
            .map(|s| ScriptArg::String(strip_hex_prefix(&s.signature).to_string()))
            .collect();
        vec![
            ScriptArg::address(address),
            ScriptArg::Array(key_ids),
            ScriptArg::Array(signatures),
            ScriptArg::String(strip_hex_prefix(message).to_string()),
            ScriptArg::String(kind.domain_tag().to_string()),
        ]
    }

    pub fn verify(
        &self,
        address: &str,
        message: &str,
        signatures: &[CompositeSignature],
        kind: MessageKind,
    ) -> Result<(), SignatureError> {
        if signatures.is_empty() {
            return Err(SignatureError::InvalidSignature(
                "no signatures provided".to_string(),
            ));
        }
        if let Some(bad) = signatures
            .iter()
            .find(|s| hex::decode(strip_hex_prefix(&s.signature)).is_err())
        {
            return Err(SignatureError::InvalidSignature(format!(
                "signature of key {} is not hex encoded",
                bad.key_id
            )));
        }

        let args = Self::verification_args(address, message, signatures, kind);
        match self
            .scripts
            .execute(templates::VALIDATE_SIGNATURE, &args, BlockSelector::Sealed)
        {
            Ok(value) => match decode(&value).as_bool() {
                Some(true) => {
                    debug!(address, "signature verified");
                    Ok(())
                }
                Some(false) => Err(SignatureError::InvalidSignature(
                    "signature does not match".to_string(),
                )),
                None => Err(SignatureError::InvalidSignature(format!(
                    "unexpected verification result {}",
                    value
                ))),
            },
            Err(e) if e.is_transient() => {
                warn!(address, error = %e, "signature oracle failure");
                Err(SignatureError::Oracle(e))
            }
            Err(e) => Err(SignatureError::InvalidSignature(e.to_string())),
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}
