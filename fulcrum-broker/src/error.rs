//! Failure taxonomy shared between the coordinator, router, and façade.

use std::fmt;

use thiserror::Error;

/// Per-request failures delivered to the originating requester only.
///
/// The `Display` strings are part of the public surface and must stay
/// stable; callers match on them across language boundaries.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OrderRejection {
    #[error("Risk Rejected")]
    RiskRejected,
    #[error("Invalid Volume")]
    InvalidVolume,
    #[error("Instrument Not Found")]
    InstrumentNotFound,
    #[error("Exchange Id Error")]
    ExchangeIdError,
    #[error("Request Error")]
    RequestError,
    #[error("Order Not Found")]
    OrderNotFound,
    #[error("Already Canceled")]
    AlreadyCanceled,
    /// The gateway reported an insert/action failure.
    #[error("{id}: {message}")]
    Gateway { id: i32, message: String },
}

impl OrderRejection {
    /// Wrap a gateway error pair.
    #[must_use]
    pub fn gateway(id: i32, message: impl Into<String>) -> Self {
        Self::Gateway {
            id,
            message: message.into(),
        }
    }
}

/// Engine-level error classes surfaced through [`crate::Lifecycle::on_error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineErrorKind {
    Login,
    QueryOrder,
    QueryTrade,
    QueryInstrument,
    QueryMarginRate,
    QueryCommissionRate,
    QueryAccounts,
    QueryPositions,
    QueryPositionDetails,
    QueryDepthMarketData,
}

impl EngineErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login-error",
            Self::QueryOrder => "query-order-error",
            Self::QueryTrade => "query-trade-error",
            Self::QueryInstrument => "query-instrument-error",
            Self::QueryMarginRate => "query-margin-rate-error",
            Self::QueryCommissionRate => "query-commission-rate-error",
            Self::QueryAccounts => "query-accounts-error",
            Self::QueryPositions => "query-positions-error",
            Self::QueryPositionDetails => "query-position-details-error",
            Self::QueryDepthMarketData => "query-depth-market-data-error",
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_strings_are_stable() {
        assert_eq!(OrderRejection::RiskRejected.to_string(), "Risk Rejected");
        assert_eq!(OrderRejection::InvalidVolume.to_string(), "Invalid Volume");
        assert_eq!(
            OrderRejection::gateway(42, "price out of range").to_string(),
            "42: price out of range"
        );
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(EngineErrorKind::Login.to_string(), "login-error");
        assert_eq!(
            EngineErrorKind::QueryDepthMarketData.to_string(),
            "query-depth-market-data-error"
        );
    }
}
