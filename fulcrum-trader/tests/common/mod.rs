//! Recording gateway mock and event builders shared by the trader suites.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use fulcrum_broker::Lifecycle;
use fulcrum_gateway::{
    AuthenticateRequest, DirectionCode, InstrumentField, LoginField, LoginRequest, OffsetCode,
    OrderActionRequest, OrderField, OrderInsertRequest, OrderStatusCode, ProductClass,
    RetryPolicy, SubmitStatusCode, TradeField, TraderApi, TraderSpi,
};
use fulcrum_trader::{SessionConfig, Trader};

#[derive(Default)]
pub struct MockTraderApi {
    pub request_id: Mutex<i32>,
    pub requests: Mutex<Vec<String>>,
    pub inserts: Mutex<Vec<OrderInsertRequest>>,
    pub actions: Mutex<Vec<OrderActionRequest>>,
    pub margin_queries: Mutex<Vec<String>>,
    pub commission_queries: Mutex<Vec<String>>,
    pub depth_queries: Mutex<Vec<String>>,
}

impl MockTraderApi {
    fn accept(&self, name: &str) -> i32 {
        self.requests.lock().push(name.to_string());
        *self.request_id.lock() += 1;
        0
    }
}

impl TraderApi for MockTraderApi {
    fn req_authenticate(&self, _request: &AuthenticateRequest) -> i32 {
        self.accept("authenticate")
    }

    fn req_user_login(&self, _request: &LoginRequest) -> i32 {
        self.accept("login")
    }

    fn req_settlement_info_confirm(&self) -> i32 {
        self.accept("confirm")
    }

    fn req_qry_order(&self) -> i32 {
        self.accept("qry_order")
    }

    fn req_qry_trade(&self) -> i32 {
        self.accept("qry_trade")
    }

    fn req_qry_instrument(&self) -> i32 {
        self.accept("qry_instrument")
    }

    fn req_qry_investor_position(&self) -> i32 {
        self.accept("qry_position")
    }

    fn req_qry_investor_position_detail(&self) -> i32 {
        self.accept("qry_position_detail")
    }

    fn req_qry_trading_account(&self) -> i32 {
        self.accept("qry_account")
    }

    fn req_qry_margin_rate(&self, instrument_id: &str) -> i32 {
        self.margin_queries.lock().push(instrument_id.to_string());
        self.accept("qry_margin_rate")
    }

    fn req_qry_commission_rate(&self, instrument_id: &str) -> i32 {
        self.commission_queries
            .lock()
            .push(instrument_id.to_string());
        self.accept("qry_commission_rate")
    }

    fn req_qry_depth_market_data(&self, instrument_id: &str) -> i32 {
        self.depth_queries.lock().push(instrument_id.to_string());
        self.accept("qry_depth")
    }

    fn req_order_insert(&self, request: &OrderInsertRequest) -> i32 {
        self.inserts.lock().push(request.clone());
        self.accept("order_insert")
    }

    fn req_order_action(&self, request: &OrderActionRequest) -> i32 {
        self.actions.lock().push(request.clone());
        self.accept("order_action")
    }

    fn last_request_id(&self) -> i32 {
        *self.request_id.lock()
    }
}

#[derive(Default)]
pub struct RecordingLifecycle {
    pub opens: Mutex<u32>,
    pub errors: Mutex<Vec<String>>,
}

impl Lifecycle for RecordingLifecycle {
    fn on_open(&self) {
        *self.opens.lock() += 1;
    }

    fn on_error(&self, kind: fulcrum_broker::EngineErrorKind, message: &str) {
        self.errors.lock().push(format!("{kind}: {message}"));
    }
}

pub fn instrument_row(id: &str, exchange: &str) -> InstrumentField {
    InstrumentField {
        instrument_id: id.into(),
        exchange_id: exchange.into(),
        instrument_name: id.into(),
        product_id: id.trim_end_matches(char::is_numeric).into(),
        product_class: ProductClass::Futures,
        delivery_year: 2026,
        delivery_month: 1,
        volume_multiple: 10,
        price_tick: 1.0,
        min_limit_order_volume: 1,
        max_limit_order_volume: 500,
        ..InstrumentField::default()
    }
}

/// Drive the full login pipeline against the mock gateway.
pub fn ready_trader() -> (Arc<MockTraderApi>, Arc<RecordingLifecycle>, Trader) {
    let api = Arc::new(MockTraderApi::default());
    let trader = Trader::new(
        api.clone(),
        SessionConfig {
            broker_id: "9999".into(),
            user_id: "u1".into(),
            password: "pw".into(),
            ..SessionConfig::default()
        },
        RetryPolicy {
            delay: Duration::from_millis(1),
            attempts: 2,
        },
    );
    let lifecycle = Arc::new(RecordingLifecycle::default());
    trader.open(lifecycle.clone());

    trader.on_front_connected();
    trader.on_rsp_authenticate(None);
    let login = LoginField {
        trading_day: "20260803".into(),
        front_id: 1,
        session_id: 7,
        max_order_ref: "0".into(),
    };
    trader.on_rsp_user_login(Some(&login), None);
    trader.on_rsp_settlement_info_confirm(None);
    trader.on_rsp_qry_order(None, None, true);
    trader.on_rsp_qry_trade(None, None, true);
    trader.on_rsp_qry_instrument(Some(&instrument_row("y2501", "DCE")), None, false);
    trader.on_rsp_qry_instrument(Some(&instrument_row("rb2410", "SHFE")), None, true);
    trader.on_rsp_qry_investor_position(None, None, true);
    (api, lifecycle, trader)
}

#[allow(clippy::too_many_arguments)]
pub fn order_event(
    instrument: &str,
    exchange: &str,
    local_id: &str,
    direction: DirectionCode,
    offset: OffsetCode,
    volume: i64,
    traded: i64,
    status: OrderStatusCode,
    submit: SubmitStatusCode,
) -> OrderField {
    OrderField {
        instrument_id: instrument.into(),
        exchange_id: exchange.into(),
        trader_id: "t1".into(),
        order_local_id: local_id.into(),
        order_ref: "1".into(),
        front_id: 1,
        session_id: 7,
        direction: Some(direction),
        offset: Some(offset),
        limit_price: 8000.0,
        volume_total_original: volume,
        volume_traded: traded,
        order_status: status,
        submit_status: submit,
        insert_date: "20260803".into(),
        insert_time: "09:30:00".into(),
        ..OrderField::default()
    }
}

pub fn trade_event(
    instrument: &str,
    exchange: &str,
    local_id: &str,
    trade_id: &str,
    volume: i64,
) -> TradeField {
    TradeField {
        instrument_id: instrument.into(),
        exchange_id: exchange.into(),
        trader_id: "t1".into(),
        order_local_id: local_id.into(),
        trade_id: trade_id.into(),
        price: 8000.0,
        volume,
        trade_date: "20260803".into(),
        trade_time: "09:30:01".into(),
        ..TradeField::default()
    }
}
