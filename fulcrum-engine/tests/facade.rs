//! Façade-level scenarios: start sequencing, risk gating, bar plumbing.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal_macros::dec;

use fulcrum_broker::{
    BarReceiver, Lifecycle, OrderRejection, PlaceOrderReceiver, Recorder, RiskManager,
    RiskVerdict, Strategy, TickReceiver,
};
use fulcrum_core::{
    Bar, Instrument, OrderRequest, ReceiptId, Symbol, Tape, Tick,
};
use fulcrum_engine::{Broker, EngineConfig};
use fulcrum_gateway::{
    AuthenticateRequest, DepthField, InstrumentField, LoginField, LoginRequest, MarketApi,
    MarketSpi, OrderActionRequest, OrderInsertRequest, ProductClass, TraderApi, TraderSpi,
};

#[derive(Default)]
struct MockTraderApi {
    request_id: Mutex<i32>,
    inserts: Mutex<Vec<OrderInsertRequest>>,
}

impl MockTraderApi {
    fn accept(&self) -> i32 {
        *self.request_id.lock() += 1;
        0
    }
}

impl TraderApi for MockTraderApi {
    fn req_authenticate(&self, _request: &AuthenticateRequest) -> i32 {
        self.accept()
    }

    fn req_user_login(&self, _request: &LoginRequest) -> i32 {
        self.accept()
    }

    fn req_settlement_info_confirm(&self) -> i32 {
        self.accept()
    }

    fn req_qry_order(&self) -> i32 {
        self.accept()
    }

    fn req_qry_trade(&self) -> i32 {
        self.accept()
    }

    fn req_qry_instrument(&self) -> i32 {
        self.accept()
    }

    fn req_qry_investor_position(&self) -> i32 {
        self.accept()
    }

    fn req_qry_investor_position_detail(&self) -> i32 {
        self.accept()
    }

    fn req_qry_trading_account(&self) -> i32 {
        self.accept()
    }

    fn req_qry_margin_rate(&self, _instrument_id: &str) -> i32 {
        self.accept()
    }

    fn req_qry_commission_rate(&self, _instrument_id: &str) -> i32 {
        self.accept()
    }

    fn req_qry_depth_market_data(&self, _instrument_id: &str) -> i32 {
        self.accept()
    }

    fn req_order_insert(&self, request: &OrderInsertRequest) -> i32 {
        self.inserts.lock().push(request.clone());
        self.accept()
    }

    fn req_order_action(&self, _request: &OrderActionRequest) -> i32 {
        self.accept()
    }

    fn last_request_id(&self) -> i32 {
        *self.request_id.lock()
    }
}

#[derive(Default)]
struct MockMarketApi {
    subscribes: Mutex<Vec<Vec<String>>>,
    unsubscribes: Mutex<Vec<Vec<String>>>,
}

impl MarketApi for MockMarketApi {
    fn req_user_login(&self, _request: &LoginRequest) -> i32 {
        0
    }

    fn subscribe_market_data(&self, instrument_ids: &[String]) -> i32 {
        self.subscribes.lock().push(instrument_ids.to_vec());
        0
    }

    fn unsubscribe_market_data(&self, instrument_ids: &[String]) -> i32 {
        self.unsubscribes.lock().push(instrument_ids.to_vec());
        0
    }
}

#[derive(Default)]
struct TestStrategy {
    inits: Mutex<u32>,
    destroys: Mutex<u32>,
    risks: Mutex<Vec<(String, Option<String>)>>,
}

impl Strategy for TestStrategy {
    fn name(&self) -> &str {
        "test"
    }

    fn on_init(&self) {
        *self.inits.lock() += 1;
    }

    fn on_destroy(&self) {
        *self.destroys.lock() += 1;
    }

    fn on_risk(&self, kind: &str, reason: Option<&str>) {
        self.risks
            .lock()
            .push((kind.to_string(), reason.map(str::to_string)));
    }
}

#[derive(Default)]
struct Sink {
    opens: Mutex<u32>,
    closes: Mutex<u32>,
}

impl Lifecycle for Sink {
    fn on_open(&self) {
        *self.opens.lock() += 1;
    }

    fn on_close(&self) {
        *self.closes.lock() += 1;
    }
}

#[derive(Default)]
struct PlaceResult {
    sent: Mutex<Vec<ReceiptId>>,
    errors: Mutex<Vec<String>>,
}

impl PlaceOrderReceiver for PlaceResult {
    fn on_place_order_sent(&self, receipt: ReceiptId) {
        self.sent.lock().push(receipt);
    }

    fn on_place_order_error(&self, reason: &OrderRejection) {
        self.errors.lock().push(reason.to_string());
    }
}

struct DenyAll;

impl RiskManager for DenyAll {
    fn check_place(&self, _request: &OrderRequest) -> RiskVerdict {
        RiskVerdict::deny("position limit breached")
    }
}

fn instrument_row(id: &str, exchange: &str, product: &str) -> InstrumentField {
    InstrumentField {
        instrument_id: id.into(),
        exchange_id: exchange.into(),
        instrument_name: id.into(),
        product_id: product.into(),
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

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.session.broker_id = "9999".into();
    config.session.user_id = "u1".into();
    config.session.password = "pw".into();
    config.retry.delay_ms = 1;
    config
}

/// Walk both endpoints through their login sequences.
fn start(broker: &Arc<Broker>, sink: Arc<Sink>) {
    broker.open(sink);
    let trader = broker.trader();
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
    trader.on_rsp_qry_instrument(Some(&instrument_row("rb2410", "SHFE", "rb")), None, false);
    trader.on_rsp_qry_instrument(Some(&instrument_row("y2501", "DCE", "y")), None, true);
    trader.on_rsp_qry_investor_position(None, None, true);

    let market = broker.market();
    market.on_front_connected();
    market.on_rsp_user_login(Some(&login), None);
}

fn depth(instrument_id: &str, last: f64, volume: i64) -> DepthField {
    DepthField {
        instrument_id: instrument_id.into(),
        trading_day: "20260803".into(),
        action_day: "20260803".into(),
        update_time: "09:30:00".into(),
        update_millisec: 0,
        last_price: last,
        volume,
        open_interest: 10.0,
        ..DepthField::default()
    }
}

#[test]
fn start_sequencing_initializes_strategies_once_both_endpoints_open() {
    let broker = Broker::new(
        Arc::new(MockTraderApi::default()),
        Arc::new(MockMarketApi::default()),
        config(),
    );
    let strategy = Arc::new(TestStrategy::default());
    broker.add_strategy(strategy.clone());
    let sink = Arc::new(Sink::default());
    start(&broker, sink.clone());

    assert_eq!(*strategy.inits.lock(), 1);
    assert_eq!(*sink.opens.lock(), 1);

    broker.close();
    assert_eq!(*strategy.destroys.lock(), 1);
    assert_eq!(*sink.closes.lock(), 1);
}

#[test]
fn risk_chain_denial_stops_the_order() {
    let trader_api = Arc::new(MockTraderApi::default());
    let broker = Broker::new(trader_api.clone(), Arc::new(MockMarketApi::default()), config());
    let strategy = Arc::new(TestStrategy::default());
    broker.add_strategy(strategy.clone());
    broker.add_risk_manager(Arc::new(DenyAll));
    start(&broker, Arc::new(Sink::default()));

    let receiver = Arc::new(PlaceResult::default());
    broker.buy_open(Symbol::from("rb2410.SHFE"), dec!(100), 1, receiver.clone());

    assert_eq!(receiver.errors.lock().as_slice(), ["Risk Rejected"]);
    assert!(trader_api.inserts.lock().is_empty());
    let risks = strategy.risks.lock();
    assert_eq!(
        risks.as_slice(),
        [(
            "place-order-risk".to_string(),
            Some("position limit breached".to_string())
        )]
    );
}

#[test]
fn convenience_helpers_compose_side_and_offset() {
    let trader_api = Arc::new(MockTraderApi::default());
    let broker = Broker::new(trader_api.clone(), Arc::new(MockMarketApi::default()), config());
    start(&broker, Arc::new(Sink::default()));

    let receiver = Arc::new(PlaceResult::default());
    broker.sell_close(Symbol::from("y2501.DCE"), dec!(8000), 2, receiver.clone());

    let inserts = trader_api.inserts.lock();
    assert_eq!(inserts.len(), 1);
    assert_eq!(
        inserts[0].direction,
        Some(fulcrum_gateway::DirectionCode::Sell)
    );
    assert_eq!(inserts[0].offset, Some(fulcrum_gateway::OffsetCode::Close));
    assert_eq!(receiver.sent.lock().len(), 1);
}

#[derive(Default)]
struct BarLog {
    bars: Mutex<Vec<Bar>>,
}

impl BarReceiver for BarLog {
    fn on_bar(&self, bar: &Bar) {
        self.bars.lock().push(bar.clone());
    }
}

#[test]
fn bar_generators_are_shared_and_collected() {
    let market_api = Arc::new(MockMarketApi::default());
    let broker = Broker::new(Arc::new(MockTraderApi::default()), market_api.clone(), config());
    start(&broker, Arc::new(Sink::default()));

    let symbol = Symbol::from("rb2410.SHFE");
    let first: Arc<dyn BarReceiver> = Arc::new(BarLog::default());
    let log = Arc::new(BarLog::default());
    let second: Arc<dyn BarReceiver> = log.clone();
    broker.subscribe_bars(&symbol, fulcrum_market::BarMode::Time, &first);
    broker.subscribe_bars(&symbol, fulcrum_market::BarMode::Time, &second);

    // One wire subscription backs both logical receivers.
    let wire_subscribes: usize = market_api.subscribes.lock().iter().map(Vec::len).sum();
    assert_eq!(wire_subscribes, 1);

    let market = broker.market();
    let mut early = depth("rb2410", 100.0, 10);
    early.update_time = "09:30:01".into();
    market.on_rtn_depth_market_data(&early);
    let mut late = depth("rb2410", 101.0, 14);
    late.update_time = "09:31:02".into();
    market.on_rtn_depth_market_data(&late);

    assert_eq!(log.bars.lock().len(), 1);
    assert_eq!(log.bars.lock()[0].volume, 10);

    broker.unsubscribe_bars(&symbol, fulcrum_market::BarMode::Time, &first);
    assert!(market_api.unsubscribes.lock().is_empty());
    broker.unsubscribe_bars(&symbol, fulcrum_market::BarMode::Time, &second);
    assert_eq!(market_api.unsubscribes.lock().len(), 1);
}

#[test]
fn recorder_universe_is_primed_from_instruments() {
    #[derive(Default)]
    struct ProductRecorder {
        raw: Mutex<Vec<String>>,
    }

    impl Recorder for ProductRecorder {
        fn select(&self, instruments: &[Instrument]) -> Vec<Symbol> {
            instruments
                .iter()
                .filter(|instrument| instrument.product_id == "rb")
                .map(|instrument| instrument.symbol.clone())
                .collect()
        }

        fn on_raw_depth(&self, depth: &DepthField) {
            self.raw.lock().push(depth.instrument_id.clone());
        }
    }

    let market_api = Arc::new(MockMarketApi::default());
    let broker = Broker::new(Arc::new(MockTraderApi::default()), market_api.clone(), config());
    let recorder = Arc::new(ProductRecorder::default());
    broker.set_recorder(recorder.clone());
    start(&broker, Arc::new(Sink::default()));

    // Only the rb product was selected for recording.
    let subscribed: Vec<String> = market_api
        .subscribes
        .lock()
        .iter()
        .flatten()
        .cloned()
        .collect();
    assert_eq!(subscribed, ["rb2410".to_string()]);

    broker.market().on_rtn_depth_market_data(&depth("rb2410", 100.0, 1));
    assert_eq!(recorder.raw.lock().as_slice(), ["rb2410".to_string()]);
}

#[test]
fn strategies_can_trade_from_tick_callbacks() {
    // Re-entrancy: a tick receiver placing an order inside its callback.
    struct TickTrader {
        broker: Mutex<Option<Arc<Broker>>>,
        receiver: Arc<PlaceResult>,
    }

    impl TickReceiver for TickTrader {
        fn on_tick(&self, tick: &Tick, _tape: &Tape) {
            if let Some(broker) = self.broker.lock().clone() {
                broker.buy_open(
                    tick.symbol.clone(),
                    tick.last,
                    1,
                    self.receiver.clone(),
                );
            }
        }
    }

    let trader_api = Arc::new(MockTraderApi::default());
    let broker = Broker::new(trader_api.clone(), Arc::new(MockMarketApi::default()), config());
    start(&broker, Arc::new(Sink::default()));

    let result = Arc::new(PlaceResult::default());
    let tick_trader = Arc::new(TickTrader {
        broker: Mutex::new(Some(broker.clone())),
        receiver: result.clone(),
    });
    let receiver: Arc<dyn TickReceiver> = tick_trader;
    broker.subscribe(&[Symbol::from("rb2410.SHFE")], &receiver);

    broker.market().on_rtn_depth_market_data(&depth("rb2410", 100.0, 5));

    assert_eq!(result.sent.lock().len(), 1);
    assert_eq!(trader_api.inserts.lock().len(), 1);
}
