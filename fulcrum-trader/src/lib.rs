//! The trading coordinator.
//!
//! Owns the authoritative client-side views of orders, trades, positions,
//! rates, and order statistics; sequences the multi-phase login pipeline;
//! correlates asynchronous order results back to their requesters; and
//! converts market orders into limit orders at exchange price bounds.
//!
//! All gateway callbacks arrive on a single thread. Internal state sits
//! behind one mutex that is never held while user receivers run, so
//! strategies may re-enter the coordinator (e.g. place an order from within
//! a fill callback) without deadlocking.

mod orders;
mod queries;
mod session;

pub use session::{SessionConfig, SessionState};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::error;

use fulcrum_broker::{
    AccountsCallback, CancelOrderReceiver, CommissionRateCallback, EngineErrorKind, Lifecycle,
    MarginRateCallback, PlaceOrderReceiver, PositionDetailsCallback, Strategy,
};
use fulcrum_core::{
    Account, CommissionRate, Instrument, MarginRate, Order, OrderId, OrderRequest, OrderStatistic,
    Position, PositionDetail, ProductType, Symbol, Tick, Trade,
};
use fulcrum_gateway::{
    AuthenticateRequest, LoginRequest, OrderStatusCode, RetryPolicy, RspInfo, SubmitStatusCode,
    TraderApi,
};

/// Hook the façade installs so market orders can price themselves from the
/// router's tick cache without a network round trip.
pub type TickSource = Arc<dyn Fn(&Symbol) -> Option<Tick> + Send + Sync>;

pub(crate) struct PendingMarketOrder {
    pub(crate) request: OrderRequest,
    pub(crate) receiver: Arc<dyn PlaceOrderReceiver>,
}

#[derive(Default)]
pub(crate) struct TraderState {
    pub(crate) session: SessionState,
    pub(crate) trading_day: String,
    pub(crate) front_id: i32,
    pub(crate) session_id: i32,
    pub(crate) order_ref: i64,

    pub(crate) orders: HashMap<OrderId, Order>,
    /// Raw `(submit_status, order_status)` pairs used for de-duplication.
    pub(crate) raw_status: HashMap<OrderId, (SubmitStatusCode, OrderStatusCode)>,
    pub(crate) trades: Vec<Trade>,
    pub(crate) instruments: HashMap<String, Instrument>,
    pub(crate) positions: HashMap<String, Position>,
    pub(crate) statistics: HashMap<String, OrderStatistic>,

    pub(crate) margin_cache: HashMap<String, MarginRate>,
    pub(crate) commission_cache: HashMap<String, CommissionRate>,
    pub(crate) margin_queue: VecDeque<(Symbol, MarginRateCallback)>,
    pub(crate) commission_queue: VecDeque<(Symbol, CommissionRateCallback)>,

    pub(crate) accounts_receivers: Vec<AccountsCallback>,
    pub(crate) accounts_accum: Vec<Account>,
    pub(crate) accounts_snapshot: Vec<Account>,
    pub(crate) accounts_at: Option<Instant>,
    pub(crate) accounts_inflight: bool,

    pub(crate) details_receivers: Vec<PositionDetailsCallback>,
    pub(crate) details_accum: Vec<PositionDetail>,
    pub(crate) details_snapshot: Vec<PositionDetail>,
    pub(crate) details_inflight: bool,
    pub(crate) position_details_changed: bool,

    pub(crate) price_limits: HashMap<String, (fulcrum_core::Price, fulcrum_core::Price)>,
    pub(crate) market_orders: HashMap<String, Vec<PendingMarketOrder>>,
    pub(crate) place_correlations: HashMap<i32, Arc<dyn PlaceOrderReceiver>>,
    pub(crate) cancel_correlations: HashMap<i32, Arc<dyn CancelOrderReceiver>>,

    pub(crate) lifecycle: Option<Arc<dyn Lifecycle>>,
    pub(crate) strategies: Vec<Arc<dyn Strategy>>,
    pub(crate) tick_source: Option<TickSource>,
    pub(crate) opened: bool,
}

/// Client-side trading state coordinator over the gateway's trading endpoint.
pub struct Trader {
    pub(crate) api: Arc<dyn TraderApi>,
    pub(crate) policy: RetryPolicy,
    pub(crate) authenticate: AuthenticateRequest,
    pub(crate) login: LoginRequest,
    pub(crate) state: Mutex<TraderState>,
}

impl Trader {
    pub fn new(api: Arc<dyn TraderApi>, config: SessionConfig, policy: RetryPolicy) -> Self {
        Self {
            api,
            policy,
            authenticate: config.authenticate_request(),
            login: config.login_request(),
            state: Mutex::new(TraderState::default()),
        }
    }

    /// Install the lifecycle listener; readiness is reported via
    /// [`Lifecycle::on_open`] once the login pipeline completes.
    pub fn open(&self, lifecycle: Arc<dyn Lifecycle>) {
        let mut state = self.state.lock();
        state.opened = false;
        state.lifecycle = Some(lifecycle);
    }

    /// Tear down explicitly; fires [`Lifecycle::on_close`].
    pub fn close(&self) {
        let lifecycle = {
            let mut state = self.state.lock();
            state.opened = false;
            state.session = SessionState::Disconnected;
            state.lifecycle.take()
        };
        if let Some(lifecycle) = lifecycle {
            lifecycle.on_close();
        }
    }

    /// Register a strategy for order event fan-out.
    pub fn add_strategy(&self, strategy: Arc<dyn Strategy>) {
        let mut state = self.state.lock();
        if !state
            .strategies
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &strategy))
        {
            state.strategies.push(strategy);
        }
    }

    /// Install the fast last-tick hook used by market-order conversion.
    pub fn set_tick_source(&self, source: TickSource) {
        self.state.lock().tick_source = Some(source);
    }

    /// Current login pipeline state.
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.state.lock().session
    }

    /// Trading day captured at login, empty before the first login.
    #[must_use]
    pub fn trading_day(&self) -> String {
        self.state.lock().trading_day.clone()
    }

    /// Snapshot of every order seen this trading day.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.state.lock().orders.values().cloned().collect()
    }

    /// Snapshot of one order.
    #[must_use]
    pub fn order(&self, id: &OrderId) -> Option<Order> {
        self.state.lock().orders.get(id).cloned()
    }

    /// Snapshot of every trade seen this trading day.
    #[must_use]
    pub fn trades(&self) -> Vec<Trade> {
        self.state.lock().trades.clone()
    }

    /// Per-symbol order statistics.
    #[must_use]
    pub fn statistic(&self, symbol: &Symbol) -> Option<OrderStatistic> {
        self.state.lock().statistics.get(&symbol.instrument).cloned()
    }

    /// All order statistics recorded this trading day.
    #[must_use]
    pub fn statistics(&self) -> Vec<OrderStatistic> {
        self.state.lock().statistics.values().cloned().collect()
    }

    pub(crate) fn report_error(&self, kind: EngineErrorKind, message: &str) {
        error!(kind = %kind, message, "engine error");
        let lifecycle = self.state.lock().lifecycle.clone();
        if let Some(lifecycle) = lifecycle {
            lifecycle.on_error(kind, message);
        }
    }

    /// Route an attached error payload through the lifecycle listener.
    ///
    /// Returns true when the payload carried a failure, in which case the
    /// caller halts its pipeline step.
    pub(crate) fn check_rsp(&self, kind: EngineErrorKind, rsp: Option<&RspInfo>) -> bool {
        match rsp.and_then(RspInfo::error) {
            Some(_) => {
                let described = rsp.map(RspInfo::describe).unwrap_or_default();
                self.report_error(kind, &described);
                true
            }
            None => false,
        }
    }

    /// Submit a request through the bounded-retry adapter and fetch the
    /// request id the gateway assigned.
    pub(crate) fn submit_request<F>(&self, send: F) -> Option<i32>
    where
        F: FnMut() -> i32,
    {
        match fulcrum_gateway::submit(&self.policy, send) {
            Ok(()) => Some(self.api.last_request_id()),
            Err(_) => None,
        }
    }
}

/// Query surface backed by the coordinator's caches.
impl Trader {
    /// All cached instruments, optionally filtered by product type.
    #[must_use]
    pub fn instruments(&self, filter: Option<ProductType>) -> Vec<Instrument> {
        self.state
            .lock()
            .instruments
            .values()
            .filter(|instrument| filter.map_or(true, |kind| instrument.product_type == kind))
            .cloned()
            .collect()
    }

    /// Instrument lookup requiring both instrument and exchange to match.
    #[must_use]
    pub fn instrument(&self, symbol: &Symbol) -> Option<Instrument> {
        self.state
            .lock()
            .instruments
            .get(&symbol.instrument)
            .filter(|instrument| instrument.exchange == symbol.exchange)
            .cloned()
    }

    /// Per-symbol position read.
    ///
    /// A known instrument with no recorded lots yields a zeroed snapshot;
    /// an unknown instrument yields `None`.
    #[must_use]
    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        let state = self.state.lock();
        if let Some(position) = state.positions.get(&symbol.instrument) {
            return Some(position.clone());
        }
        state
            .instruments
            .contains_key(&symbol.instrument)
            .then(|| Position::new(symbol.clone()))
    }
}
