//! Fundamental data types shared across the fulcrum workspace.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

mod identifiers;
mod market;
mod position;
mod trading;

pub use identifiers::{ExchangeId, IdentifierParseError, OrderId, ReceiptId, Symbol};
pub use market::{Bar, BookLevel, Tape, Tick};
pub use position::{Pending, Position, PositionCell, SidePair};
pub use trading::{
    Account, CommissionRate, Instrument, MarginRate, Order, OrderRequest, OrderStatistic,
    PositionDetail, RateEntry, Trade,
};

/// Alias for price precision.
pub type Price = Decimal;
/// Alias for traded quantities (futures contracts are whole lots).
pub type Volume = i64;

/// The side of an order or position.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buy side; a filled open builds a long position.
    Long,
    /// Sell side; a filled open builds a short position.
    Short,
}

impl Side {
    /// Returns the opposite side (long <-> short).
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// Whether an order opens a new position or closes an existing one.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Offset {
    Open,
    /// Close a position, consuming history lots before today lots.
    Close,
    /// Close only lots opened today (exchange-specific).
    CloseToday,
}

/// Price discipline requested by the caller.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFlag {
    /// Execute at the provided limit price.
    Limit,
    /// Converted by the engine into a limit order at an exchange price bound.
    Market,
}

/// High-level order status maintained inside the engine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// True when no further transitions are possible for this order.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected)
    }
}

/// Enumerates the supported instrument families.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Futures,
    Options,
    Spot,
    SpotOptions,
}

/// Call/put flag carried by options instruments.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionsType {
    Call,
    Put,
}

/// Position-change intent derived from two consecutive ticks.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapeType {
    /// New interest entered on one side only.
    Open,
    /// Interest left on one side only.
    Close,
    /// Both sides opened against each other.
    DualOpen,
    /// Both sides closed against each other.
    DualClose,
    /// Volume changed hands without an interest change.
    Turnover,
    NoDeal,
}

/// Aggressor direction derived from price action against the book.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapeDirection {
    Up,
    Down,
    Neutral,
}

/// Composition of tape type and direction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapeStatus {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    TurnoverLong,
    TurnoverShort,
    DualOpen,
    DualClose,
    Invalid,
}

impl TapeStatus {
    /// Compose type and direction into a status.
    ///
    /// An upward open is a long entering, an upward close is a short
    /// leaving; dual types carry no direction of their own.
    #[must_use]
    pub fn from_parts(kind: TapeType, direction: TapeDirection) -> Self {
        match (kind, direction) {
            (TapeType::Open, TapeDirection::Up) => Self::OpenLong,
            (TapeType::Open, TapeDirection::Down) => Self::OpenShort,
            (TapeType::Close, TapeDirection::Up) => Self::CloseShort,
            (TapeType::Close, TapeDirection::Down) => Self::CloseLong,
            (TapeType::Turnover, TapeDirection::Up) => Self::TurnoverLong,
            (TapeType::Turnover, TapeDirection::Down) => Self::TurnoverShort,
            (TapeType::DualOpen, _) => Self::DualOpen,
            (TapeType::DualClose, _) => Self::DualClose,
            _ => Self::Invalid,
        }
    }
}
