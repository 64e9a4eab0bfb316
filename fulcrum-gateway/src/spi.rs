//! Event side of the gateway contract.
//!
//! The gateway invokes these callbacks on a single thread; implementations
//! run all engine state transitions inline. Queries stream `is_last = false`
//! rows followed by a final `is_last = true` row (which may carry no data).

use crate::fields::{
    AccountField, CommissionRateField, DepthField, InstrumentField, LoginField, MarginRateField,
    OrderField, PositionDetailField, PositionField, RspInfo, TradeField,
};

/// Trading endpoint events. All methods default to no-ops.
#[allow(unused_variables)]
pub trait TraderSpi: Send + Sync {
    fn on_front_connected(&self) {}
    fn on_front_disconnected(&self, reason: i32) {}
    fn on_rsp_authenticate(&self, rsp: Option<&RspInfo>) {}
    fn on_rsp_user_login(&self, login: Option<&LoginField>, rsp: Option<&RspInfo>) {}
    fn on_rsp_settlement_info_confirm(&self, rsp: Option<&RspInfo>) {}
    fn on_rsp_qry_order(&self, order: Option<&OrderField>, rsp: Option<&RspInfo>, is_last: bool) {}
    fn on_rsp_qry_trade(&self, trade: Option<&TradeField>, rsp: Option<&RspInfo>, is_last: bool) {}
    fn on_rsp_qry_instrument(
        &self,
        instrument: Option<&InstrumentField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    fn on_rsp_qry_investor_position(
        &self,
        position: Option<&PositionField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    fn on_rsp_qry_investor_position_detail(
        &self,
        detail: Option<&PositionDetailField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    fn on_rsp_qry_trading_account(
        &self,
        account: Option<&AccountField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    fn on_rsp_qry_margin_rate(
        &self,
        rate: Option<&MarginRateField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    fn on_rsp_qry_commission_rate(
        &self,
        rate: Option<&CommissionRateField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    fn on_rsp_qry_depth_market_data(
        &self,
        depth: Option<&DepthField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
    }
    /// Synchronous rejection of an order insert; `request_id` correlates to
    /// the submitting call. Absence of this callback is not acceptance.
    fn on_rsp_order_insert(&self, rsp: Option<&RspInfo>, request_id: i32) {}
    /// Synchronous rejection of an order action.
    fn on_rsp_order_action(&self, rsp: Option<&RspInfo>, request_id: i32) {}
    fn on_rtn_order(&self, order: &OrderField) {}
    fn on_rtn_trade(&self, trade: &TradeField) {}
}

/// Market-data endpoint events. All methods default to no-ops.
#[allow(unused_variables)]
pub trait MarketSpi: Send + Sync {
    fn on_front_connected(&self) {}
    fn on_front_disconnected(&self, reason: i32) {}
    fn on_rsp_user_login(&self, login: Option<&LoginField>, rsp: Option<&RspInfo>) {}
    fn on_rsp_sub_market_data(&self, instrument_id: &str, rsp: Option<&RspInfo>) {}
    fn on_rsp_unsub_market_data(&self, instrument_id: &str, rsp: Option<&RspInfo>) {}
    fn on_rtn_depth_market_data(&self, depth: &DepthField) {}
}
