//! Risk check rejection types (§4.3: pre-trade validation is a pure
//! function returning ok or a typed rejection).

use thiserror::Error;

use crate::types::LimitKind;

/// Why a candidate order was rejected by one of the 9 fixed-order checks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskError {
    /// A limit check failed; `kind` identifies which of the 9 checks,
    /// `limit`/`observed` are in the same units as the profile's limit value.
    #[error("{kind:?} limit exceeded: observed {observed} > limit {limit}")]
    LimitExceeded {
        /// Which check rejected the order.
        kind: LimitKind,
        /// The configured limit.
        limit: i64,
        /// The value that would result if the order were accepted.
        observed: i64,
    },

    /// No risk profile is registered for the id the caller passed in.
    #[error("unknown risk profile {0}")]
    UnknownProfile(crate::types::RiskProfileId),
}

/// Result alias for risk checks.
pub type RiskResult<T> = Result<T, RiskError>;
