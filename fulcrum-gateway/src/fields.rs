//! Raw structures exchanged with the gateway, and the sentinel rules used
//! to decode them.

use chrono::NaiveTime;
use fulcrum_core::{Offset, OptionsType, Price, ProductType, Side};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Depth of the order book snapshot carried on every tick.
pub const BOOK_DEPTH: usize = 5;

/// Numeric sentinel the gateway uses for absent price/volume fields.
pub const PRICE_SENTINEL: f64 = f64::MAX;

/// A raw field is present iff it is neither zero nor the sentinel.
#[must_use]
pub fn is_present(value: f64) -> bool {
    value != 0.0 && value != PRICE_SENTINEL && value.is_finite()
}

/// Decode a raw price into an exact decimal, `None` when absent.
#[must_use]
pub fn decode_price(raw: f64) -> Option<Price> {
    if is_present(raw) {
        Decimal::from_f64(raw)
    } else {
        None
    }
}

/// Parse `HH:MM:SS` into the `HH*10000 + MM*100 + SS` integer encoding.
#[must_use]
pub fn parse_hms(time: &str) -> Option<i32> {
    use chrono::Timelike;
    let parsed = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    Some((parsed.hour() * 10_000 + parsed.minute() * 100 + parsed.second()) as i32)
}

/// Quote time with millisecond refinement as a fractional second.
#[must_use]
pub fn tick_seconds(time: &str, millisec: i32) -> Option<f64> {
    let base = parse_hms(time)?;
    Some(f64::from(base) + f64::from(millisec) / 1000.0)
}

/// Error payload attached to gateway responses.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RspInfo {
    pub error_id: i32,
    pub error_msg: String,
}

impl RspInfo {
    /// Returns the error pair when the payload actually carries a failure.
    #[must_use]
    pub fn error(&self) -> Option<(i32, &str)> {
        if self.error_id == 0 {
            None
        } else {
            Some((self.error_id, self.error_msg.as_str()))
        }
    }

    /// Canonical `{id}:{msg}` rendering used by the error sink.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}:{}", self.error_id, self.error_msg)
    }
}

/// Checks an optional response payload for an attached failure.
#[must_use]
pub fn rsp_error(rsp: Option<&RspInfo>) -> Option<(i32, String)> {
    rsp.and_then(RspInfo::error)
        .map(|(id, msg)| (id, msg.to_string()))
}

/// Order direction as encoded on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DirectionCode {
    Buy,
    Sell,
}

impl DirectionCode {
    #[must_use]
    pub fn to_side(self) -> Side {
        match self {
            Self::Buy => Side::Long,
            Self::Sell => Side::Short,
        }
    }

    #[must_use]
    pub fn from_side(side: Side) -> Self {
        match side {
            Side::Long => Self::Buy,
            Side::Short => Self::Sell,
        }
    }
}

/// Offset flag as encoded on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum OffsetCode {
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

impl OffsetCode {
    #[must_use]
    pub fn to_offset(self) -> Offset {
        match self {
            Self::Open => Offset::Open,
            Self::Close | Self::CloseYesterday => Offset::Close,
            Self::CloseToday => Offset::CloseToday,
        }
    }

    #[must_use]
    pub fn from_offset(offset: Offset) -> Self {
        match offset {
            Offset::Open => Self::Open,
            Offset::Close => Self::Close,
            Offset::CloseToday => Self::CloseToday,
        }
    }
}

/// Price discipline as encoded on the wire.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PriceTypeCode {
    #[default]
    LimitPrice,
    AnyPrice,
}

/// Raw order state reported by the exchange.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum OrderStatusCode {
    AllTraded,
    PartTradedQueueing,
    PartTradedNotQueueing,
    NoTradeQueueing,
    NoTradeNotQueueing,
    Canceled,
    #[default]
    Unknown,
    NotTouched,
    Touched,
}

/// Raw submission state reported by the exchange front.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SubmitStatusCode {
    #[default]
    InsertSubmitted,
    CancelSubmitted,
    ModifySubmitted,
    Accepted,
    InsertRejected,
    CancelRejected,
    ModifyRejected,
}

impl SubmitStatusCode {
    /// True for the three terminal rejection states.
    #[must_use]
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::InsertRejected | Self::CancelRejected | Self::ModifyRejected
        )
    }
}

/// Product family of an instrument row.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ProductClass {
    #[default]
    Futures,
    Options,
    Combination,
    Spot,
    EfP,
    SpotOption,
}

impl ProductClass {
    /// Engine-level product type, `None` for families the engine drops.
    #[must_use]
    pub fn to_product_type(self) -> Option<ProductType> {
        match self {
            Self::Futures => Some(ProductType::Futures),
            Self::Options => Some(ProductType::Options),
            Self::Spot => Some(ProductType::Spot),
            Self::SpotOption => Some(ProductType::SpotOptions),
            Self::Combination | Self::EfP => None,
        }
    }
}

/// Whether a position row describes today or carried-over lots.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PositionDateCode {
    #[default]
    Today,
    History,
}

/// Options call/put flag on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum OptionsTypeCode {
    Call,
    Put,
}

impl OptionsTypeCode {
    #[must_use]
    pub fn to_options_type(self) -> OptionsType {
        match self {
            Self::Call => OptionsType::Call,
            Self::Put => OptionsType::Put,
        }
    }
}

/// Login acknowledgement payload.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LoginField {
    pub trading_day: String,
    pub front_id: i32,
    pub session_id: i32,
    pub max_order_ref: String,
}

/// Raw best-5 depth snapshot.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DepthField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub action_day: String,
    pub trading_day: String,
    pub update_time: String,
    pub update_millisec: i32,
    pub last_price: f64,
    pub open_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub pre_close_price: f64,
    pub pre_open_interest: f64,
    pub open_interest: f64,
    pub volume: i64,
    pub turnover: f64,
    pub upper_limit_price: f64,
    pub lower_limit_price: f64,
    pub band_upper_price: f64,
    pub band_lower_price: f64,
    pub bid_prices: [f64; BOOK_DEPTH],
    pub bid_volumes: [i64; BOOK_DEPTH],
    pub ask_prices: [f64; BOOK_DEPTH],
    pub ask_volumes: [i64; BOOK_DEPTH],
}

impl Default for DepthField {
    fn default() -> Self {
        Self {
            instrument_id: String::new(),
            exchange_id: String::new(),
            action_day: String::new(),
            trading_day: String::new(),
            update_time: "00:00:00".into(),
            update_millisec: 0,
            last_price: 0.0,
            open_price: 0.0,
            highest_price: 0.0,
            lowest_price: 0.0,
            pre_close_price: 0.0,
            pre_open_interest: 0.0,
            open_interest: 0.0,
            volume: 0,
            turnover: 0.0,
            upper_limit_price: 0.0,
            lower_limit_price: 0.0,
            band_upper_price: 0.0,
            band_lower_price: 0.0,
            bid_prices: [0.0; BOOK_DEPTH],
            bid_volumes: [0; BOOK_DEPTH],
            ask_prices: [0.0; BOOK_DEPTH],
            ask_volumes: [0; BOOK_DEPTH],
        }
    }
}

/// Raw order snapshot pushed on every state change.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OrderField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub front_id: i32,
    pub session_id: i32,
    pub trader_id: String,
    pub order_local_id: String,
    pub order_sys_id: String,
    pub direction: Option<DirectionCode>,
    pub offset: Option<OffsetCode>,
    pub price_type: PriceTypeCode,
    pub limit_price: f64,
    pub volume_total_original: i64,
    pub volume_traded: i64,
    pub order_status: OrderStatusCode,
    pub submit_status: SubmitStatusCode,
    pub insert_date: String,
    pub insert_time: String,
    pub cancel_time: String,
    pub status_msg: String,
}

/// Raw execution report.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TradeField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub trade_id: String,
    pub trader_id: String,
    pub order_local_id: String,
    pub direction: Option<DirectionCode>,
    pub offset: Option<OffsetCode>,
    pub price: f64,
    pub volume: i64,
    pub trade_date: String,
    pub trade_time: String,
}

/// Raw instrument metadata row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct InstrumentField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub instrument_name: String,
    pub product_id: String,
    pub product_class: ProductClass,
    pub delivery_year: i32,
    pub delivery_month: i32,
    pub create_date: String,
    pub open_date: String,
    pub expire_date: String,
    pub volume_multiple: i32,
    pub price_tick: f64,
    pub min_limit_order_volume: i64,
    pub max_limit_order_volume: i64,
    pub strike_price: f64,
    pub options_type: Option<OptionsTypeCode>,
}

/// Raw investor position row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PositionField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub direction: Option<DirectionCode>,
    pub position: i64,
    pub today_position: i64,
    pub position_date: PositionDateCode,
}

/// Raw position-detail row (one open lot batch).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PositionDetailField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub direction: Option<DirectionCode>,
    pub open_date: String,
    pub volume: i64,
    pub open_price: f64,
    pub close_volume: i64,
}

/// Raw trading-account funds row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AccountField {
    pub account_id: String,
    pub pre_balance: f64,
    pub balance: f64,
    pub available: f64,
    pub curr_margin: f64,
    pub frozen_margin: f64,
    pub frozen_commission: f64,
    pub commission: f64,
}

/// Raw margin-rate row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MarginRateField {
    pub instrument_id: String,
    pub long_margin_ratio_by_money: f64,
    pub long_margin_ratio_by_volume: f64,
    pub short_margin_ratio_by_money: f64,
    pub short_margin_ratio_by_volume: f64,
}

/// Raw commission-rate row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CommissionRateField {
    pub instrument_id: String,
    pub open_ratio_by_money: f64,
    pub open_ratio_by_volume: f64,
    pub close_ratio_by_money: f64,
    pub close_ratio_by_volume: f64,
    pub close_today_ratio_by_money: f64,
    pub close_today_ratio_by_volume: f64,
}
