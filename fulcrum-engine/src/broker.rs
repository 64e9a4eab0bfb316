//! The broker façade: one object strategies talk to.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use fulcrum_broker::{
    BarReceiver, CancelOrderReceiver, EngineErrorKind, Lifecycle, OrderRejection,
    PlaceOrderReceiver, Recorder, RiskManager, RiskVerdict, Strategy, TickReceiver,
    CANCEL_ORDER_RISK, PLACE_ORDER_RISK,
};
use fulcrum_core::{
    Instrument, Offset, OrderFlag, OrderId, OrderRequest, Position, Price, ProductType, Side,
    Symbol, Volume,
};
use fulcrum_gateway::{MarketApi, TraderApi};
use fulcrum_market::{BarGenerator, BarMode, MarketRouter};
use fulcrum_trader::Trader;

use crate::EngineConfig;

#[derive(Default)]
struct BrokerState {
    strategies: Vec<Arc<dyn Strategy>>,
    risks: Vec<Arc<dyn RiskManager>>,
    bars: HashMap<(Symbol, BarMode), Arc<BarGenerator>>,
    recorder: Option<Arc<dyn Recorder>>,
    sink: Option<Arc<dyn Lifecycle>>,
}

/// Composes strategies, risk managers, the market router, and the trading
/// coordinator; sequences start/stop across the two endpoints.
pub struct Broker {
    trader: Arc<Trader>,
    market: Arc<MarketRouter>,
    weak: Weak<Broker>,
    /// When non-empty, restricts the recorder universe to these product ids.
    recorder_products: Vec<String>,
    state: Mutex<BrokerState>,
}

impl Broker {
    /// Build the engine over the two gateway endpoints.
    pub fn new(
        trader_api: Arc<dyn TraderApi>,
        market_api: Arc<dyn MarketApi>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let policy = config.retry.policy();
        let login = config.session.login_request();
        let trader = Arc::new(Trader::new(trader_api, config.session, policy));
        let market = Arc::new(MarketRouter::new(market_api, login, policy));
        let broker = Arc::new_cyclic(|weak| Self {
            trader: trader.clone(),
            market: market.clone(),
            weak: weak.clone(),
            recorder_products: config.recorder.products,
            state: Mutex::new(BrokerState::default()),
        });
        // Market orders price themselves from the router's tick cache when
        // the instrument is already subscribed.
        let router = market.clone();
        trader.set_tick_source(Arc::new(move |symbol| router.last_tick(symbol)));
        broker
    }

    /// The trading coordinator; wire the gateway's trading events to it.
    #[must_use]
    pub fn trader(&self) -> &Arc<Trader> {
        &self.trader
    }

    /// The market router; wire the gateway's market events to it.
    #[must_use]
    pub fn market(&self) -> &Arc<MarketRouter> {
        &self.market
    }

    /// Register a strategy. Strategies receive order events from the
    /// coordinator and `on_init`/`on_destroy` from the façade.
    pub fn add_strategy(&self, strategy: Arc<dyn Strategy>) {
        self.trader.add_strategy(strategy.clone());
        self.state.lock().strategies.push(strategy);
    }

    /// Append a risk manager to the pre-trade chain.
    pub fn add_risk_manager(&self, risk: Arc<dyn RiskManager>) {
        self.state.lock().risks.push(risk);
    }

    /// Install the raw recorder; it starts once the market endpoint opens.
    pub fn set_recorder(&self, recorder: Arc<dyn Recorder>) {
        self.state.lock().recorder = Some(recorder);
    }

    /// Start the engine: the trading endpoint first, the market endpoint
    /// once trading is ready, strategies once both are open. `sink`
    /// receives engine errors and the fully-open notification.
    pub fn open(&self, sink: Arc<dyn Lifecycle>) {
        self.state.lock().sink = Some(sink);
        self.trader.open(Arc::new(TraderBridge {
            broker: self.weak.clone(),
        }));
    }

    /// Stop the engine and notify strategies.
    pub fn close(&self) {
        let (strategies, sink) = {
            let mut state = self.state.lock();
            (state.strategies.clone(), state.sink.take())
        };
        for strategy in &strategies {
            strategy.on_destroy();
        }
        self.market.close();
        self.trader.close();
        if let Some(sink) = sink {
            sink.on_close();
        }
        info!("engine closed");
    }

    fn handle_trader_open(&self) {
        info!("trading endpoint open, starting market endpoint");
        self.market.open(Arc::new(MarketBridge {
            broker: self.weak.clone(),
        }));
    }

    fn handle_market_open(&self) {
        let (strategies, recorder, sink) = {
            let state = self.state.lock();
            (
                state.strategies.clone(),
                state.recorder.clone(),
                state.sink.clone(),
            )
        };
        if let Some(recorder) = recorder {
            let mut instruments = self.trader.instruments(None);
            if !self.recorder_products.is_empty() {
                instruments
                    .retain(|instrument| self.recorder_products.contains(&instrument.product_id));
            }
            self.market.start_recorder(recorder, &instruments);
        }
        for strategy in &strategies {
            debug!(strategy = strategy.name(), "initializing strategy");
            strategy.on_init();
        }
        if let Some(sink) = sink {
            sink.on_open();
        }
    }

    fn forward_error(&self, kind: EngineErrorKind, message: &str) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink.on_error(kind, message);
        }
    }

    /// Place an order after the risk chain allows it.
    pub fn place_order(&self, request: &OrderRequest, receiver: Arc<dyn PlaceOrderReceiver>) {
        let (risks, strategies) = {
            let state = self.state.lock();
            (state.risks.clone(), state.strategies.clone())
        };
        for risk in &risks {
            if let RiskVerdict::Deny(reason) = risk.check_place(request) {
                for strategy in &strategies {
                    strategy.on_risk(PLACE_ORDER_RISK, reason.as_deref());
                }
                receiver.on_place_order_error(&OrderRejection::RiskRejected);
                return;
            }
        }
        self.trader.place_order(request, receiver);
    }

    /// Cancel an order after the risk chain allows it.
    pub fn cancel_order(&self, order_id: &OrderId, receiver: Arc<dyn CancelOrderReceiver>) {
        if let Some(order) = self.trader.order(order_id) {
            let (risks, strategies) = {
                let state = self.state.lock();
                (state.risks.clone(), state.strategies.clone())
            };
            for risk in &risks {
                if let RiskVerdict::Deny(reason) = risk.check_cancel(&order) {
                    for strategy in &strategies {
                        strategy.on_risk(CANCEL_ORDER_RISK, reason.as_deref());
                    }
                    receiver.on_cancel_order_error(&OrderRejection::RiskRejected);
                    return;
                }
            }
        }
        self.trader.cancel_order(order_id, receiver);
    }

    /// Buy to open a long position at a limit price.
    pub fn buy_open(
        &self,
        symbol: Symbol,
        price: Price,
        volume: Volume,
        receiver: Arc<dyn PlaceOrderReceiver>,
    ) {
        self.place_limit(symbol, Side::Long, Offset::Open, price, volume, receiver);
    }

    /// Buy to close an existing short position.
    pub fn buy_close(
        &self,
        symbol: Symbol,
        price: Price,
        volume: Volume,
        receiver: Arc<dyn PlaceOrderReceiver>,
    ) {
        self.place_limit(symbol, Side::Long, Offset::Close, price, volume, receiver);
    }

    /// Sell to open a short position at a limit price.
    pub fn sell_open(
        &self,
        symbol: Symbol,
        price: Price,
        volume: Volume,
        receiver: Arc<dyn PlaceOrderReceiver>,
    ) {
        self.place_limit(symbol, Side::Short, Offset::Open, price, volume, receiver);
    }

    /// Sell to close an existing long position.
    pub fn sell_close(
        &self,
        symbol: Symbol,
        price: Price,
        volume: Volume,
        receiver: Arc<dyn PlaceOrderReceiver>,
    ) {
        self.place_limit(symbol, Side::Short, Offset::Close, price, volume, receiver);
    }

    fn place_limit(
        &self,
        symbol: Symbol,
        side: Side,
        offset: Offset,
        price: Price,
        volume: Volume,
        receiver: Arc<dyn PlaceOrderReceiver>,
    ) {
        self.place_order(
            &OrderRequest {
                symbol,
                side,
                offset,
                flag: OrderFlag::Limit,
                price,
                volume,
            },
            receiver,
        );
    }

    /// Subscribe a tick receiver to a set of symbols.
    pub fn subscribe(&self, symbols: &[Symbol], receiver: &Arc<dyn TickReceiver>) {
        self.market.subscribe(symbols, receiver);
    }

    /// Remove a tick receiver from a set of symbols.
    pub fn unsubscribe(&self, symbols: &[Symbol], receiver: &Arc<dyn TickReceiver>) {
        self.market.unsubscribe(symbols, receiver);
    }

    /// Attach a bar receiver, lazily creating the per-symbol generator.
    pub fn subscribe_bars(&self, symbol: &Symbol, mode: BarMode, receiver: &Arc<dyn BarReceiver>) {
        let generator = {
            let mut state = self.state.lock();
            state
                .bars
                .entry((symbol.clone(), mode))
                .or_insert_with(|| Arc::new(BarGenerator::new(symbol.clone(), mode)))
                .clone()
        };
        generator.add_receiver(receiver);
        let tick_receiver: Arc<dyn TickReceiver> = generator;
        self.market.subscribe(std::slice::from_ref(symbol), &tick_receiver);
    }

    /// Detach a bar receiver, collecting the generator when unused.
    pub fn unsubscribe_bars(
        &self,
        symbol: &Symbol,
        mode: BarMode,
        receiver: &Arc<dyn BarReceiver>,
    ) {
        let generator = {
            let state = self.state.lock();
            state.bars.get(&(symbol.clone(), mode)).cloned()
        };
        let Some(generator) = generator else {
            return;
        };
        if !generator.remove_receiver(receiver) {
            self.state.lock().bars.remove(&(symbol.clone(), mode));
            let tick_receiver: Arc<dyn TickReceiver> = generator;
            self.market
                .unsubscribe(std::slice::from_ref(symbol), &tick_receiver);
        }
    }

    /// Position snapshot for a symbol, delegated to the coordinator.
    #[must_use]
    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.trader.position(symbol)
    }

    /// Instrument metadata, optionally filtered by product type.
    #[must_use]
    pub fn instruments(&self, filter: Option<ProductType>) -> Vec<Instrument> {
        self.trader.instruments(filter)
    }
}

/// Forwards trading-endpoint lifecycle events into the façade sequencing.
struct TraderBridge {
    broker: Weak<Broker>,
}

impl Lifecycle for TraderBridge {
    fn on_open(&self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.handle_trader_open();
        }
    }

    fn on_error(&self, kind: EngineErrorKind, message: &str) {
        if let Some(broker) = self.broker.upgrade() {
            broker.forward_error(kind, message);
        }
    }
}

/// Forwards market-endpoint lifecycle events into the façade sequencing.
struct MarketBridge {
    broker: Weak<Broker>,
}

impl Lifecycle for MarketBridge {
    fn on_open(&self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.handle_market_open();
        }
    }

    fn on_error(&self, kind: EngineErrorKind, message: &str) {
        if let Some(broker) = self.broker.upgrade() {
            broker.forward_error(kind, message);
        }
    }
}
