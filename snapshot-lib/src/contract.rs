use serde::{Deserialize, Serialize};

/// Name of the chain's native fungible token. Balances of this token are indexed
/// by the snapshot service without a contract suffix in the route.
pub const NATIVE_TOKEN_NAME: &str = "FlowToken";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    #[default]
    Fungible,
    NonFungible,
    /// Ownership of a badge minted for a specific event
    EventBadge,
}

/// The asset that weights votes on a proposal, together with the
/// eligibility rules attached to it.
///
/// Numeric fields accept both json numbers and decimal strings, as
/// communities are frequently configured from form inputs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityContract {
    #[serde(default)]
    pub kind: AssetKind,
    pub name: String,
    pub addr: String,
    #[serde(default)]
    pub public_path: String,
    /// Minimum balance, in token units, required to cast a vote
    #[serde(default, deserialize_with = "deser::optional_number")]
    pub threshold: Option<f64>,
    /// Upper bound on the weight a single voter can carry, in token units
    #[serde(default, deserialize_with = "deser::optional_number")]
    pub max_weight: Option<f64>,
    #[serde(
        default,
        alias = "floatEventId",
        deserialize_with = "deser::optional_number"
    )]
    pub event_id: Option<u64>,
}

impl EligibilityContract {
    pub fn is_native_token(&self) -> bool {
        self.name == NATIVE_TOKEN_NAME
    }
}

mod deser {
    use serde::{de::Error, Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString<T> {
        Number(T),
        String(String),
    }

    pub fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match Option::<NumberOrString<T>>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberOrString::Number(n)) => Ok(Some(n)),
            Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
            Some(NumberOrString::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid number {:?}: {}", s, e))),
        }
    }
}
