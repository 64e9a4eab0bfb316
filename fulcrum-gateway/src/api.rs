//! Request side of the gateway contract.
//!
//! Every request method queues work on the gateway and returns its numeric
//! code: `0` accepted (the assigned request id is then read out-of-band via
//! [`TraderApi::last_request_id`]), `-2`/`-3` flow control, any other
//! negative a terminal failure.

use serde::{Deserialize, Serialize};

use crate::fields::{DirectionCode, OffsetCode};

/// Terminal-authentication request issued before login.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AuthenticateRequest {
    pub broker_id: String,
    pub user_id: String,
    pub app_id: String,
    pub auth_code: String,
}

/// Credentials for the login step on either endpoint.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LoginRequest {
    pub broker_id: String,
    pub user_id: String,
    pub password: String,
}

/// Limit-order insertion parameters.
///
/// The fixed order attributes (speculation hedge flag, good-for-day,
/// any-volume condition, immediate contingent, no force-close) are the
/// implementation's responsibility; the engine only ever places this shape.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OrderInsertRequest {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub direction: Option<DirectionCode>,
    pub offset: Option<OffsetCode>,
    pub limit_price: f64,
    pub volume: i64,
}

/// Order cancellation (the delete action).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OrderActionRequest {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_local_id: String,
    pub trader_id: String,
}

/// Trading endpoint request surface.
pub trait TraderApi: Send + Sync {
    fn req_authenticate(&self, request: &AuthenticateRequest) -> i32;
    fn req_user_login(&self, request: &LoginRequest) -> i32;
    fn req_settlement_info_confirm(&self) -> i32;
    fn req_qry_order(&self) -> i32;
    fn req_qry_trade(&self) -> i32;
    fn req_qry_instrument(&self) -> i32;
    fn req_qry_investor_position(&self) -> i32;
    fn req_qry_investor_position_detail(&self) -> i32;
    fn req_qry_trading_account(&self) -> i32;
    fn req_qry_margin_rate(&self, instrument_id: &str) -> i32;
    fn req_qry_commission_rate(&self, instrument_id: &str) -> i32;
    fn req_qry_depth_market_data(&self, instrument_id: &str) -> i32;
    fn req_order_insert(&self, request: &OrderInsertRequest) -> i32;
    fn req_order_action(&self, request: &OrderActionRequest) -> i32;

    /// Request id assigned to the most recently accepted request.
    ///
    /// The SDK exposes this as process-wide state; it must only be read
    /// immediately after a `0` return, which the adapter guarantees.
    fn last_request_id(&self) -> i32;
}

/// Market-data endpoint request surface.
pub trait MarketApi: Send + Sync {
    fn req_user_login(&self, request: &LoginRequest) -> i32;
    fn subscribe_market_data(&self, instrument_ids: &[String]) -> i32;
    fn unsubscribe_market_data(&self, instrument_ids: &[String]) -> i32;
}
