//! Trading-side entities: orders, trades, statistics, rates, instruments.

use serde::{Deserialize, Serialize};

use crate::{
    ExchangeId, Offset, OptionsType, OrderFlag, OrderId, OrderStatus, Price, ProductType,
    ReceiptId, Side, Symbol, Volume,
};

/// Desired order placement parameters as provided by the caller.
///
/// For market orders the engine substitutes an exchange price bound and the
/// `price` field is ignored.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub offset: Offset,
    pub flag: OrderFlag,
    pub price: Price,
    pub volume: Volume,
}

/// One open lot batch from the position-detail query.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PositionDetail {
    pub symbol: Symbol,
    pub side: Side,
    pub open_date: String,
    pub volume: Volume,
    pub open_price: Price,
    pub close_volume: Volume,
}

/// Execution record bound to exactly one order.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Trade {
    pub id: String,
    pub order_id: OrderId,
    /// Trade date, `YYYYMMDD`.
    pub date: String,
    /// Trade time, `HH:MM:SS`.
    pub time: String,
    pub price: Price,
    pub volume: Volume,
}

/// Client-side view of one order's lifecycle.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub receipt: ReceiptId,
    pub symbol: Symbol,
    pub insert_date: String,
    pub insert_time: String,
    pub side: Side,
    pub offset: Offset,
    pub flag: OrderFlag,
    pub price: Price,
    pub volume: Volume,
    pub traded: Volume,
    pub status: OrderStatus,
    pub trades: Vec<Trade>,
    pub cancel_time: Option<String>,
}

impl Order {
    /// Unfilled remainder.
    #[must_use]
    pub fn remaining(&self) -> Volume {
        self.volume - self.traded
    }

    /// True when no further transitions are possible.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}

/// Per-symbol order counters, monotonic within a trading day.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderStatistic {
    pub symbol: Symbol,
    /// Requests handed to the gateway.
    pub places: u32,
    /// Orders acknowledged by the exchange.
    pub entrusts: u32,
    pub filleds: u32,
    pub cancels: u32,
    pub rejects: u32,
}

impl OrderStatistic {
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            places: 0,
            entrusts: 0,
            filleds: 0,
            cancels: 0,
            rejects: 0,
        }
    }
}

/// A fee or margin component: a ratio of notional plus a per-lot amount.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RateEntry {
    pub ratio: Price,
    pub per_volume: Price,
}

impl RateEntry {
    /// Charge for `volume` lots at `price` with the contract multiplier.
    #[must_use]
    pub fn charge(&self, price: Price, volume: Volume, volume_multiple: u32) -> Price {
        let volume = Price::from(volume);
        price * volume * Price::from(volume_multiple) * self.ratio + volume * self.per_volume
    }
}

/// Commission schedule split by offset, cached for a trading day.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CommissionRate {
    pub symbol: Symbol,
    pub open: RateEntry,
    pub close: RateEntry,
    pub close_today: RateEntry,
}

impl CommissionRate {
    /// Fee for one fill, picking the entry by the order's offset.
    #[must_use]
    pub fn fee(&self, offset: Offset, price: Price, volume: Volume, volume_multiple: u32) -> Price {
        let entry = match offset {
            Offset::Open => &self.open,
            Offset::Close => &self.close,
            Offset::CloseToday => &self.close_today,
        };
        entry.charge(price, volume, volume_multiple)
    }
}

/// Margin schedule split by side, cached for a trading day.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MarginRate {
    pub symbol: Symbol,
    pub long: RateEntry,
    pub short: RateEntry,
}

impl MarginRate {
    /// Margin requirement for holding `volume` lots on `side`.
    #[must_use]
    pub fn requirement(
        &self,
        side: Side,
        price: Price,
        volume: Volume,
        volume_multiple: u32,
    ) -> Price {
        let entry = match side {
            Side::Long => &self.long,
            Side::Short => &self.short,
        };
        entry.charge(price, volume, volume_multiple)
    }
}

/// Immutable metadata describing a tradable contract.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Instrument {
    pub symbol: Symbol,
    /// Wire-side instrument id (the part before the dot).
    pub id: String,
    pub name: String,
    pub exchange: ExchangeId,
    pub product_id: String,
    pub product_type: ProductType,
    /// Delivery month encoded as `year * 100 + month`.
    pub delivery: u32,
    pub create_date: String,
    pub open_date: String,
    pub expire_date: String,
    pub volume_multiple: u32,
    pub price_tick: Price,
    pub min_limit_order_volume: Volume,
    pub max_limit_order_volume: Volume,
    pub strike_price: Option<Price>,
    pub options_type: Option<OptionsType>,
}

impl Instrument {
    #[must_use]
    pub fn is_option(&self) -> bool {
        matches!(
            self.product_type,
            ProductType::Options | ProductType::SpotOptions
        )
    }

    /// Delivery year component.
    #[must_use]
    pub fn delivery_year(&self) -> u32 {
        self.delivery / 100
    }

    /// Delivery month component, 1-12.
    #[must_use]
    pub fn delivery_month(&self) -> u32 {
        self.delivery % 100
    }
}

/// Funds snapshot for one investor account.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Account {
    pub id: String,
    pub pre_balance: Price,
    pub balance: Price,
    pub available: Price,
    pub margin: Price,
    pub frozen_margin: Price,
    pub frozen_commission: Price,
    pub commission: Price,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_remaining_tracks_traded() {
        let order = Order {
            id: "DCE:t1:1".parse().unwrap(),
            receipt: ReceiptId::new(1, 1, 1),
            symbol: Symbol::from("y2501.DCE"),
            insert_date: "20260803".into(),
            insert_time: "09:30:00".into(),
            side: Side::Long,
            offset: Offset::Open,
            flag: OrderFlag::Limit,
            price: dec!(8000),
            volume: 5,
            traded: 2,
            status: OrderStatus::PartiallyFilled,
            trades: Vec::new(),
            cancel_time: None,
        };
        assert_eq!(order.remaining(), 3);
        assert!(!order.is_final());
    }

    #[test]
    fn rate_charges_combine_ratio_and_per_volume() {
        let rate = CommissionRate {
            symbol: Symbol::from("rb2410.SHFE"),
            open: RateEntry {
                ratio: dec!(0.0001),
                per_volume: dec!(0),
            },
            close: RateEntry {
                ratio: dec!(0),
                per_volume: dec!(2),
            },
            close_today: RateEntry {
                ratio: dec!(0.0002),
                per_volume: dec!(1),
            },
        };
        // 3600 * 2 * 10 * 0.0001
        assert_eq!(rate.fee(Offset::Open, dec!(3600), 2, 10), dec!(7.2));
        assert_eq!(rate.fee(Offset::Close, dec!(3600), 2, 10), dec!(4));
        assert_eq!(rate.fee(Offset::CloseToday, dec!(3600), 2, 10), dec!(16.4));

        let margin = MarginRate {
            symbol: Symbol::from("rb2410.SHFE"),
            long: RateEntry {
                ratio: dec!(0.12),
                per_volume: dec!(0),
            },
            short: RateEntry {
                ratio: dec!(0.13),
                per_volume: dec!(0),
            },
        };
        assert_eq!(margin.requirement(Side::Long, dec!(3600), 1, 10), dec!(4320));
        assert_eq!(
            margin.requirement(Side::Short, dec!(3600), 1, 10),
            dec!(4680)
        );
    }

    #[test]
    fn delivery_decomposition() {
        let instrument = Instrument {
            symbol: Symbol::from("rb2410.SHFE"),
            id: "rb2410".into(),
            name: "rb2410".into(),
            exchange: ExchangeId::register("SHFE"),
            product_id: "rb".into(),
            product_type: ProductType::Futures,
            delivery: 202_410,
            create_date: "20230902".into(),
            open_date: "20230915".into(),
            expire_date: "20241015".into(),
            volume_multiple: 10,
            price_tick: dec!(1),
            min_limit_order_volume: 1,
            max_limit_order_volume: 500,
            strike_price: None,
            options_type: None,
        };
        assert_eq!(instrument.delivery_year(), 2024);
        assert_eq!(instrument.delivery_month(), 10);
        assert!(!instrument.is_option());
    }
}
