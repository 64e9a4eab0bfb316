//! Reference-counted instrument subscriptions and tick fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use fulcrum_broker::{EngineErrorKind, Lifecycle, Recorder, TickReceiver};
use fulcrum_core::{BookLevel, Instrument, Symbol, Tick};
use fulcrum_gateway::{
    decode_price, submit, tick_seconds, DepthField, LoginField, LoginRequest, MarketApi,
    MarketSpi, RetryPolicy, RspInfo,
};

#[derive(Default)]
struct RouterState {
    subscribers: HashMap<String, Vec<Arc<dyn TickReceiver>>>,
    recordings: HashSet<String>,
    symbols: HashMap<String, Symbol>,
    last_ticks: HashMap<String, Tick>,
    trading_day: String,
    recorder: Option<Arc<dyn Recorder>>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    opened: bool,
}

/// Routes depth ticks from the market endpoint to logical receivers while
/// keeping exactly one wire subscription per instrument.
pub struct MarketRouter {
    api: Arc<dyn MarketApi>,
    login: LoginRequest,
    policy: RetryPolicy,
    state: Mutex<RouterState>,
}

impl MarketRouter {
    pub fn new(api: Arc<dyn MarketApi>, login: LoginRequest, policy: RetryPolicy) -> Self {
        Self {
            api,
            login,
            policy,
            state: Mutex::new(RouterState::default()),
        }
    }

    /// Install the lifecycle listener. The endpoint reports readiness via
    /// [`Lifecycle::on_open`] after its login completes.
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
            state.lifecycle.take()
        };
        if let Some(lifecycle) = lifecycle {
            lifecycle.on_close();
        }
    }

    /// Trading day learned at login, empty before the first login.
    #[must_use]
    pub fn trading_day(&self) -> String {
        self.state.lock().trading_day.clone()
    }

    /// Latest decoded tick for a symbol, if one arrived this trading day.
    #[must_use]
    pub fn last_tick(&self, symbol: &Symbol) -> Option<Tick> {
        self.state.lock().last_ticks.get(&symbol.instrument).cloned()
    }

    /// Attach `receiver` to each symbol, subscribing new instruments on the
    /// wire as one batch.
    pub fn subscribe(&self, symbols: &[Symbol], receiver: &Arc<dyn TickReceiver>) {
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            for symbol in symbols {
                let instrument_id = symbol.instrument.clone();
                if let Some(receivers) = state.subscribers.get_mut(&instrument_id) {
                    if !receivers.iter().any(|r| Arc::ptr_eq(r, receiver)) {
                        receivers.push(Arc::clone(receiver));
                    }
                    continue;
                }
                state
                    .subscribers
                    .insert(instrument_id.clone(), vec![Arc::clone(receiver)]);
                state.symbols.insert(instrument_id.clone(), symbol.clone());
                if !state.recordings.contains(&instrument_id) {
                    pending.push(instrument_id);
                }
            }
        }
        self.subscribe_on_wire(&pending);
    }

    /// Detach `receiver`; instruments left without interest are removed from
    /// the wire as one batch.
    pub fn unsubscribe(&self, symbols: &[Symbol], receiver: &Arc<dyn TickReceiver>) {
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            for symbol in symbols {
                let instrument_id = &symbol.instrument;
                let Some(receivers) = state.subscribers.get_mut(instrument_id) else {
                    continue;
                };
                receivers.retain(|r| !Arc::ptr_eq(r, receiver));
                if !receivers.is_empty() {
                    continue;
                }
                state.subscribers.remove(instrument_id);
                if !state.recordings.contains(instrument_id) {
                    state.symbols.remove(instrument_id);
                    pending.push(instrument_id.clone());
                }
            }
        }
        self.unsubscribe_on_wire(&pending);
    }

    /// Install the raw recorder and subscribe its selected universe.
    pub fn start_recorder(&self, recorder: Arc<dyn Recorder>, instruments: &[Instrument]) {
        let selected = recorder.select(instruments);
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            state.recorder = Some(recorder);
            for symbol in &selected {
                let instrument_id = symbol.instrument.clone();
                let newly_recorded = state.recordings.insert(instrument_id.clone());
                if newly_recorded && !state.subscribers.contains_key(&instrument_id) {
                    pending.push(instrument_id);
                }
            }
        }
        info!(count = selected.len(), "recorder started");
        self.subscribe_on_wire(&pending);
    }

    /// Drop the recorder, unsubscribing instruments no receiver still holds.
    pub fn stop_recorder(&self) {
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            state.recorder = None;
            let recordings = std::mem::take(&mut state.recordings);
            for instrument_id in recordings {
                if !state.subscribers.contains_key(&instrument_id) {
                    pending.push(instrument_id);
                }
            }
        }
        self.unsubscribe_on_wire(&pending);
    }

    fn subscribe_on_wire(&self, instrument_ids: &[String]) {
        if instrument_ids.is_empty() {
            return;
        }
        debug!(count = instrument_ids.len(), "subscribing instruments");
        if let Err(err) = submit(&self.policy, || {
            self.api.subscribe_market_data(instrument_ids)
        }) {
            warn!(%err, "market data subscribe failed");
        }
    }

    fn unsubscribe_on_wire(&self, instrument_ids: &[String]) {
        if instrument_ids.is_empty() {
            return;
        }
        debug!(count = instrument_ids.len(), "unsubscribing instruments");
        if let Err(err) = submit(&self.policy, || {
            self.api.unsubscribe_market_data(instrument_ids)
        }) {
            warn!(%err, "market data unsubscribe failed");
        }
    }

    fn lifecycle(&self) -> Option<Arc<dyn Lifecycle>> {
        self.state.lock().lifecycle.clone()
    }
}

impl MarketSpi for MarketRouter {
    fn on_front_connected(&self) {
        info!("market front connected, logging in");
        if let Err(err) = submit(&self.policy, || self.api.req_user_login(&self.login)) {
            if let Some(lifecycle) = self.lifecycle() {
                lifecycle.on_error(EngineErrorKind::Login, &err.to_string());
            }
        }
    }

    fn on_front_disconnected(&self, reason: i32) {
        warn!(reason, "market front disconnected");
    }

    fn on_rsp_user_login(&self, login: Option<&LoginField>, rsp: Option<&RspInfo>) {
        if let Some(info) = rsp {
            if info.error().is_some() {
                if let Some(lifecycle) = self.lifecycle() {
                    lifecycle.on_error(EngineErrorKind::Login, &info.describe());
                }
                return;
            }
        }

        let (resubscribe, lifecycle, first_open) = {
            let mut state = self.state.lock();
            if let Some(login) = login {
                if !login.trading_day.is_empty() && login.trading_day != state.trading_day {
                    debug!(day = %login.trading_day, "trading day changed, clearing tick cache");
                    state.last_ticks.clear();
                    state.trading_day = login.trading_day.clone();
                }
            }
            let union: Vec<String> = state
                .subscribers
                .keys()
                .chain(state.recordings.iter())
                .cloned()
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let first_open = !state.opened;
            state.opened = true;
            (union, state.lifecycle.clone(), first_open)
        };

        info!(instruments = resubscribe.len(), "market endpoint ready");
        self.subscribe_on_wire(&resubscribe);
        if first_open {
            if let Some(lifecycle) = lifecycle {
                lifecycle.on_open();
            }
        }
    }

    fn on_rsp_sub_market_data(&self, instrument_id: &str, rsp: Option<&RspInfo>) {
        if let Some((id, msg)) = rsp.and_then(RspInfo::error) {
            warn!(instrument_id, id, msg, "subscribe rejected");
        }
    }

    fn on_rsp_unsub_market_data(&self, instrument_id: &str, rsp: Option<&RspInfo>) {
        if let Some((id, msg)) = rsp.and_then(RspInfo::error) {
            warn!(instrument_id, id, msg, "unsubscribe rejected");
        }
    }

    fn on_rtn_depth_market_data(&self, depth: &DepthField) {
        let (recorder, symbol) = {
            let state = self.state.lock();
            let recorder = if state.recordings.contains(&depth.instrument_id) {
                state.recorder.clone()
            } else {
                None
            };
            (recorder, state.symbols.get(&depth.instrument_id).cloned())
        };

        if let Some(recorder) = recorder {
            recorder.on_raw_depth(depth);
        }
        // Quotes for instruments no receiver asked about are orphans.
        let Some(symbol) = symbol else {
            return;
        };
        let Some(tick) = decode_tick(depth, symbol) else {
            warn!(instrument_id = %depth.instrument_id, "undecodable depth payload dropped");
            return;
        };

        let (previous, receivers) = {
            let mut state = self.state.lock();
            let previous = state.last_ticks.get(&depth.instrument_id).cloned();
            // Store before fan-out so re-entrant receivers observe the latest.
            state
                .last_ticks
                .insert(depth.instrument_id.clone(), tick.clone());
            let receivers = state
                .subscribers
                .get(&depth.instrument_id)
                .cloned()
                .unwrap_or_default();
            (previous, receivers)
        };

        let tape = crate::tape::classify(&tick, previous.as_ref());
        for receiver in &receivers {
            receiver.on_tick(&tick, &tape);
        }
    }
}

/// Decode a raw depth payload into an engine tick.
///
/// Book levels are dense-prefix: decoding stops at the first level whose
/// price or volume is absent. Payloads without a valid last price or quote
/// time are unusable and dropped by the caller.
fn decode_tick(depth: &DepthField, symbol: Symbol) -> Option<Tick> {
    let last = decode_price(depth.last_price)?;
    let time = tick_seconds(&depth.update_time, depth.update_millisec)?;

    let decode_book = |prices: &[f64], volumes: &[i64]| {
        let mut levels = Vec::new();
        for (price, volume) in prices.iter().zip(volumes) {
            let Some(price) = decode_price(*price) else {
                break;
            };
            if *volume == 0 || *volume == i64::MAX {
                break;
            }
            levels.push(BookLevel {
                price,
                volume: *volume,
            });
        }
        levels
    };

    Some(Tick {
        symbol,
        date: depth.action_day.clone(),
        trading_day: depth.trading_day.clone(),
        time,
        last,
        open: decode_price(depth.open_price),
        high: decode_price(depth.highest_price),
        low: decode_price(depth.lowest_price),
        pre_close: decode_price(depth.pre_close_price),
        open_interest: depth.open_interest,
        pre_open_interest: depth.pre_open_interest,
        volume: depth.volume,
        turnover: depth.turnover,
        upper_limit: decode_price(depth.upper_limit_price),
        lower_limit: decode_price(depth.lower_limit_price),
        upper_band: decode_price(depth.band_upper_price),
        lower_band: decode_price(depth.band_lower_price),
        bids: decode_book(&depth.bid_prices, &depth.bid_volumes),
        asks: decode_book(&depth.ask_prices, &depth.ask_volumes),
    })
}
