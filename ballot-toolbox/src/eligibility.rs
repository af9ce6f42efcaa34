//! Minimum balance and maximum weight rules of an eligibility contract.

use serde::{Deserialize, Serialize};
use snapshot_lib::{EligibilityContract, FIXED_POINT_DECIMALS};
use thiserror::Error;

/// Number of digit positions a shifted weight cap spans
const CAP_DIGITS: i32 = FIXED_POINT_DECIMALS as i32 + 1;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("insufficient balance: {weight} is below the threshold of {threshold}")]
    InsufficientBalance { threshold: f64, weight: f64 },
    #[error("unsupported max weight {0}: expected a finite value with 1 to 8 integer digits")]
    UnsupportedMaxWeight(f64),
}

/// Checks `weight` against the contract's threshold. An absent or zero
/// threshold accepts everything.
pub fn validate_minimum(contract: &EligibilityContract, weight: f64) -> Result<(), PolicyError> {
    let threshold = match contract.threshold {
        Some(threshold) if threshold != 0.0 => threshold,
        _ => return Ok(()),
    };
    if weight == 0.0 || weight < threshold {
        return Err(PolicyError::InsufficientBalance { threshold, weight });
    }
    Ok(())
}

/// The contract's weight cap in fixed-point units.
///
/// The cap is given in token units; it is scaled by `10^(9 - d)` where `d` is
/// the number of integer digits of its decimal representation.
pub fn shifted_max_weight(max_weight: f64) -> Result<f64, PolicyError> {
    if !max_weight.is_finite() || max_weight < 0.0 {
        return Err(PolicyError::UnsupportedMaxWeight(max_weight));
    }
    let repr = max_weight.to_string();
    let integer_digits = repr.split('.').next().map_or(0, str::len);
    if !(1..=8).contains(&integer_digits) {
        return Err(PolicyError::UnsupportedMaxWeight(max_weight));
    }
    let shift = CAP_DIGITS - integer_digits as i32;
    Ok((max_weight * 10f64.powi(shift)).round())
}

/// Caps a fixed-point balance to the contract's max weight, if it has one.
pub fn cap_weight(contract: &EligibilityContract, raw: f64) -> Result<f64, PolicyError> {
    match contract.max_weight {
        None => Ok(raw),
        Some(max_weight) => Ok(raw.min(shifted_max_weight(max_weight)?)),
    }
}

/// Same as [`cap_weight`] for an integer balance, keeping it exact.
pub fn cap_fixed_point(contract: &EligibilityContract, raw: u64) -> Result<u64, PolicyError> {
    match contract.max_weight {
        None => Ok(raw),
        // a shifted cap has at most CAP_DIGITS integer digits
        Some(max_weight) => Ok(raw.min(shifted_max_weight(max_weight)? as u64)),
    }
}

/// Switches applied on top of the contract's rules
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityPolicy {
    /// When false, minimum balance checks always pass. Meant for development
    /// networks where voters hold no tokens.
    pub enforce_minimum: bool,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            enforce_minimum: true,
        }
    }
}

impl EligibilityPolicy {
    pub fn validate_minimum(
        &self,
        contract: &EligibilityContract,
        weight: f64,
    ) -> Result<(), PolicyError> {
        if !self.enforce_minimum {
            return Ok(());
        }
        validate_minimum(contract, weight)
    }

    pub fn cap_fixed_point(
        &self,
        contract: &EligibilityContract,
        raw: u64,
    ) -> Result<u64, PolicyError> {
        cap_fixed_point(contract, raw)
    }
}
