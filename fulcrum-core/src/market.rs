//! Market data snapshots: ticks, tape records, and aggregated bars.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Price, Symbol, TapeDirection, TapeStatus, TapeType, Volume};

/// A single level of the best-5 order book.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct BookLevel {
    pub price: Price,
    pub volume: Volume,
}

/// Immutable depth snapshot delivered to tick receivers.
///
/// Scalar prices the wire marks with the missing sentinel are `None`; book
/// levels are dense from index 0 upward (decoding stops at the first invalid
/// level).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Tick {
    pub symbol: Symbol,
    /// Calendar date of the quote, `YYYYMMDD`.
    pub date: String,
    /// Trading day the quote belongs to, `YYYYMMDD`.
    pub trading_day: String,
    /// Quote time encoded as `HHMMSS` plus a millisecond fraction.
    pub time: f64,
    pub last: Price,
    pub open: Option<Price>,
    pub high: Option<Price>,
    pub low: Option<Price>,
    pub pre_close: Option<Price>,
    pub open_interest: f64,
    pub pre_open_interest: f64,
    /// Cumulative session volume.
    pub volume: Volume,
    /// Cumulative session turnover.
    pub turnover: f64,
    /// Daily price limits.
    pub upper_limit: Option<Price>,
    pub lower_limit: Option<Price>,
    /// Intraday circuit-breaker bands, when the exchange publishes them.
    pub upper_band: Option<Price>,
    pub lower_band: Option<Price>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl Tick {
    /// Best bid price if the book has one.
    #[must_use]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|level| level.price)
    }

    /// Best ask price if the book has one.
    #[must_use]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|level| level.price)
    }
}

/// Per-tick classification of trade direction and position-change intent.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Tape {
    pub kind: TapeType,
    pub direction: TapeDirection,
    pub status: TapeStatus,
    /// Volume traded since the previous tick.
    pub volume_delta: Volume,
    /// Open-interest change since the previous tick.
    pub interest_delta: f64,
}

/// Aggregated bar with signed order flow and a volume profile.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub trading_day: String,
    /// Bucket open time in the tick's `HHMMSS.fff` encoding.
    pub time: f64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// Price with the highest buy+sell volume.
    pub poc: Price,
    pub volume: Volume,
    pub turnover: f64,
    pub open_interest: f64,
    /// Signed order flow: buy volume minus sell volume.
    pub delta: i64,
    pub buy_volumes: BTreeMap<Price, Volume>,
    pub sell_volumes: BTreeMap<Price, Volume>,
}

impl Bar {
    /// Total traded volume recorded at `price` across both sides.
    #[must_use]
    pub fn volume_at(&self, price: Price) -> Volume {
        self.buy_volumes.get(&price).copied().unwrap_or(0)
            + self.sell_volumes.get(&price).copied().unwrap_or(0)
    }

    /// Fold a later bar into this one.
    ///
    /// OHLC extends, volumes and per-price maps accumulate, and the POC is
    /// promoted only on a strict volume increase, matching live aggregation.
    /// Merging an all-zero bar is the identity.
    #[must_use]
    pub fn merge(&self, later: &Bar) -> Bar {
        let mut merged = self.clone();
        merged.close = if later.volume > 0 { later.close } else { merged.close };
        merged.high = merged.high.max(later.high);
        if later.volume > 0 {
            merged.low = merged.low.min(later.low);
            merged.open_interest = later.open_interest;
        }
        merged.volume += later.volume;
        merged.turnover += later.turnover;
        merged.delta += later.delta;
        for (price, volume) in &later.buy_volumes {
            *merged.buy_volumes.entry(*price).or_insert(0) += volume;
        }
        for (price, volume) in &later.sell_volumes {
            *merged.sell_volumes.entry(*price).or_insert(0) += volume;
        }
        let mut poc = merged.poc;
        let mut best = merged.volume_at(poc);
        for price in merged.buy_volumes.keys().chain(merged.sell_volumes.keys()) {
            let total = merged.volume_at(*price);
            if total > best {
                best = total;
                poc = *price;
            }
        }
        merged.poc = poc;
        merged
    }
}
