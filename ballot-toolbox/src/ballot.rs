use crate::proposal::ProposalId;
use serde::{Deserialize, Serialize};
use snapshot_lib::Address;

/// Signature produced by one key of an account
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSignature {
    #[serde(default)]
    pub addr: Address,
    pub key_id: i64,
    /// Hex encoded, with or without `0x`
    pub signature: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    #[serde(alias = "addr")]
    pub voter_address: Address,
    pub proposal_id: ProposalId,
    pub choice: String,
    pub timestamp: u64,
    /// Hex encoded message the signatures were produced over
    pub raw_message: String,
    #[serde(alias = "compositeSignatures")]
    pub signatures: Vec<CompositeSignature>,
}

impl Ballot {
    /// The message a voter signs: hex of `"{proposal}:{choice}:{timestamp}"`
    pub fn canonical_message(&self) -> String {
        hex::encode(format!(
            "{}:{}:{}",
            self.proposal_id, self.choice, self.timestamp
        ))
    }

    /// Whether the signed message commits to this ballot's proposal, choice and time
    pub fn is_bound(&self) -> bool {
        self.raw_message
            .trim_start_matches("0x")
            .eq_ignore_ascii_case(&self.canonical_message())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_message_binds_ballot() {
        let mut ballot: Ballot = serde_json::from_str(
            r#"{
                "addr": "0xf8d6e0586b0a20c7",
                "proposalId": 1,
                "choice": "a",
                "timestamp": 1650000000000,
                "rawMessage": "313a613a31363530303030303030303030",
                "compositeSignatures": [{"addr": "0xf8d6e0586b0a20c7", "keyId": 0, "signature": "0xab"}]
            }"#,
        )
        .unwrap();

        assert_eq!(ballot.canonical_message(), "313a613a31363530303030303030303030");
        assert!(ballot.is_bound());

        ballot.choice = "b".to_string();
        assert!(!ballot.is_bound());
    }
}
