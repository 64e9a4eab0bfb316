//! Coalesced data queries: rates, account funds, and position details.
//!
//! Rate queries share one in-flight request per kind through a queue that is
//! drained synchronously whenever the head is already cached. Account and
//! position-detail queries batch all receivers behind a single request and
//! serve repeat callers from a short-lived snapshot.

use std::time::Duration;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use fulcrum_broker::{
    AccountsCallback, CommissionRateCallback, EngineErrorKind, MarginRateCallback,
    PositionDetailsCallback,
};
use fulcrum_core::{
    Account, CommissionRate, MarginRate, PositionDetail, Price, RateEntry, Symbol,
};
use fulcrum_gateway::{
    AccountField, CommissionRateField, DirectionCode, MarginRateField, PositionDetailField,
    RspInfo,
};

use crate::{SessionState, Trader, TraderState};

/// Account snapshots younger than this answer queries without a round trip.
const ACCOUNT_SNAPSHOT_TTL: Duration = Duration::from_secs(3);

fn dec(value: f64) -> Price {
    Decimal::from_f64(value).unwrap_or_default()
}

fn resolve_symbol(state: &TraderState, instrument_id: &str) -> Symbol {
    state
        .instruments
        .get(instrument_id)
        .map(|instrument| instrument.symbol.clone())
        .unwrap_or_else(|| Symbol::from(instrument_id))
}

fn margin_from_field(field: &MarginRateField, symbol: Symbol) -> MarginRate {
    MarginRate {
        symbol,
        long: RateEntry {
            ratio: dec(field.long_margin_ratio_by_money),
            per_volume: dec(field.long_margin_ratio_by_volume),
        },
        short: RateEntry {
            ratio: dec(field.short_margin_ratio_by_money),
            per_volume: dec(field.short_margin_ratio_by_volume),
        },
    }
}

fn commission_from_field(field: &CommissionRateField, symbol: Symbol) -> CommissionRate {
    CommissionRate {
        symbol,
        open: RateEntry {
            ratio: dec(field.open_ratio_by_money),
            per_volume: dec(field.open_ratio_by_volume),
        },
        close: RateEntry {
            ratio: dec(field.close_ratio_by_money),
            per_volume: dec(field.close_ratio_by_volume),
        },
        close_today: RateEntry {
            ratio: dec(field.close_today_ratio_by_money),
            per_volume: dec(field.close_today_ratio_by_volume),
        },
    }
}

fn account_from_field(field: &AccountField) -> Account {
    Account {
        id: field.account_id.clone(),
        pre_balance: dec(field.pre_balance),
        balance: dec(field.balance),
        available: dec(field.available),
        margin: dec(field.curr_margin),
        frozen_margin: dec(field.frozen_margin),
        frozen_commission: dec(field.frozen_commission),
        commission: dec(field.commission),
    }
}

enum Pump<C, R> {
    Deliver(C, R),
    Issue(String),
    Idle,
}

impl Trader {
    /// Margin rate for a symbol, from cache when possible.
    pub fn query_margin_rate(&self, symbol: &Symbol, callback: MarginRateCallback) {
        let cached = self
            .state
            .lock()
            .margin_cache
            .get(&symbol.instrument)
            .cloned();
        if let Some(rate) = cached {
            callback(&rate);
            return;
        }
        let pump = {
            let mut state = self.state.lock();
            state.margin_queue.push_back((symbol.clone(), callback));
            state.margin_queue.len() == 1 && state.session == SessionState::Ready
        };
        if pump {
            self.pump_margin_queue();
        }
    }

    /// Commission rate for a symbol, from cache when possible.
    pub fn query_commission_rate(&self, symbol: &Symbol, callback: CommissionRateCallback) {
        let cached = self
            .state
            .lock()
            .commission_cache
            .get(&symbol.instrument)
            .cloned();
        if let Some(rate) = cached {
            callback(&rate);
            return;
        }
        let pump = {
            let mut state = self.state.lock();
            state.commission_queue.push_back((symbol.clone(), callback));
            state.commission_queue.len() == 1 && state.session == SessionState::Ready
        };
        if pump {
            self.pump_commission_queue();
        }
    }

    /// Serve cached heads synchronously, then issue one network request for
    /// the first uncached symbol in the margin queue.
    pub(crate) fn pump_margin_queue(&self) {
        loop {
            let step = {
                let mut state = self.state.lock();
                match state.margin_queue.front() {
                    None => Pump::Idle,
                    Some((symbol, _)) => {
                        match state.margin_cache.get(&symbol.instrument).cloned() {
                            Some(rate) => match state.margin_queue.pop_front() {
                                Some((_, callback)) => Pump::Deliver(callback, rate),
                                None => Pump::Idle,
                            },
                            None => Pump::Issue(symbol.instrument.clone()),
                        }
                    }
                }
            };
            match step {
                Pump::Idle => return,
                Pump::Deliver(callback, rate) => callback(&rate),
                Pump::Issue(instrument_id) => {
                    if self
                        .submit_request(|| self.api.req_qry_margin_rate(&instrument_id))
                        .is_some()
                    {
                        return;
                    }
                    self.report_error(
                        EngineErrorKind::QueryMarginRate,
                        "margin rate query rejected",
                    );
                    self.state.lock().margin_queue.pop_front();
                }
            }
        }
    }

    pub(crate) fn pump_commission_queue(&self) {
        loop {
            let step = {
                let mut state = self.state.lock();
                match state.commission_queue.front() {
                    None => Pump::Idle,
                    Some((symbol, _)) => {
                        match state.commission_cache.get(&symbol.instrument).cloned() {
                            Some(rate) => match state.commission_queue.pop_front() {
                                Some((_, callback)) => Pump::Deliver(callback, rate),
                                None => Pump::Idle,
                            },
                            None => Pump::Issue(symbol.instrument.clone()),
                        }
                    }
                }
            };
            match step {
                Pump::Idle => return,
                Pump::Deliver(callback, rate) => callback(&rate),
                Pump::Issue(instrument_id) => {
                    if self
                        .submit_request(|| self.api.req_qry_commission_rate(&instrument_id))
                        .is_some()
                    {
                        return;
                    }
                    self.report_error(
                        EngineErrorKind::QueryCommissionRate,
                        "commission rate query rejected",
                    );
                    self.state.lock().commission_queue.pop_front();
                }
            }
        }
    }

    pub(crate) fn handle_margin_rate_response(
        &self,
        rate: Option<&MarginRateField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryMarginRate, rsp) {
            self.state.lock().margin_queue.pop_front();
            self.pump_margin_queue();
            return;
        }
        if let Some(field) = rate {
            let delivery = {
                let mut state = self.state.lock();
                let symbol = resolve_symbol(&state, &field.instrument_id);
                let converted = margin_from_field(field, symbol);
                state
                    .margin_cache
                    .insert(field.instrument_id.clone(), converted.clone());
                state
                    .margin_queue
                    .pop_front()
                    .map(|(_, callback)| (callback, converted))
            };
            if let Some((callback, converted)) = delivery {
                callback(&converted);
            }
        }
        if is_last {
            self.pump_margin_queue();
        }
    }

    pub(crate) fn handle_commission_rate_response(
        &self,
        rate: Option<&CommissionRateField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryCommissionRate, rsp) {
            self.state.lock().commission_queue.pop_front();
            self.pump_commission_queue();
            return;
        }
        if let Some(field) = rate {
            let delivery = {
                let mut state = self.state.lock();
                let symbol = resolve_symbol(&state, &field.instrument_id);
                let converted = commission_from_field(field, symbol);
                state
                    .commission_cache
                    .insert(field.instrument_id.clone(), converted.clone());
                state
                    .commission_queue
                    .pop_front()
                    .map(|(_, callback)| (callback, converted))
            };
            if let Some((callback, converted)) = delivery {
                callback(&converted);
            }
        }
        if is_last {
            self.pump_commission_queue();
        }
    }

    /// Account funds snapshot; coalesces callers behind one request and
    /// serves recent snapshots from cache.
    pub fn query_accounts(&self, callback: AccountsCallback) {
        enum Path {
            Cached(AccountsCallback, Vec<Account>),
            Joined,
            Issue,
        }
        let path = {
            let mut state = self.state.lock();
            if state.accounts_inflight {
                state.accounts_receivers.push(callback);
                Path::Joined
            } else if state
                .accounts_at
                .map_or(false, |at| at.elapsed() < ACCOUNT_SNAPSHOT_TTL)
            {
                Path::Cached(callback, state.accounts_snapshot.clone())
            } else {
                state.accounts_accum.clear();
                state.accounts_receivers.push(callback);
                state.accounts_inflight = true;
                if state.session == SessionState::Ready {
                    Path::Issue
                } else {
                    Path::Joined
                }
            }
        };
        match path {
            Path::Cached(callback, snapshot) => callback(&snapshot),
            Path::Joined => {}
            Path::Issue => self.issue_account_request(),
        }
    }

    fn issue_account_request(&self) {
        if self
            .submit_request(|| self.api.req_qry_trading_account())
            .is_none()
        {
            self.report_error(EngineErrorKind::QueryAccounts, "account query rejected");
            let mut state = self.state.lock();
            state.accounts_inflight = false;
            state.accounts_receivers.clear();
        }
    }

    /// Issue the account request queued while the login pipeline ran.
    pub(crate) fn drain_queued_account_requests(&self) {
        let pending = {
            let state = self.state.lock();
            state.accounts_inflight && !state.accounts_receivers.is_empty()
        };
        if pending {
            self.issue_account_request();
        }
    }

    pub(crate) fn handle_account_response(
        &self,
        account: Option<&AccountField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryAccounts, rsp) {
            let mut state = self.state.lock();
            state.accounts_inflight = false;
            state.accounts_receivers.clear();
            return;
        }
        if let Some(field) = account {
            self.state.lock().accounts_accum.push(account_from_field(field));
        }
        if is_last {
            let (receivers, snapshot) = {
                let mut state = self.state.lock();
                let snapshot = std::mem::take(&mut state.accounts_accum);
                state.accounts_snapshot = snapshot.clone();
                state.accounts_at = Some(std::time::Instant::now());
                state.accounts_inflight = false;
                (std::mem::take(&mut state.accounts_receivers), snapshot)
            };
            debug!(receivers = receivers.len(), rows = snapshot.len(), "accounts delivered");
            for receiver in receivers {
                receiver(&snapshot);
            }
        }
    }

    /// Position details; served from cache while no fill has arrived since
    /// the last snapshot.
    pub fn query_position_details(&self, callback: PositionDetailsCallback) {
        enum Path {
            Cached(PositionDetailsCallback, Vec<PositionDetail>),
            Joined,
            Issue,
        }
        let path = {
            let mut state = self.state.lock();
            if state.details_inflight {
                state.details_receivers.push(callback);
                Path::Joined
            } else if !state.position_details_changed {
                Path::Cached(callback, state.details_snapshot.clone())
            } else {
                state.details_accum.clear();
                state.details_receivers.push(callback);
                state.details_inflight = true;
                if state.session == SessionState::Ready {
                    Path::Issue
                } else {
                    Path::Joined
                }
            }
        };
        match path {
            Path::Cached(callback, snapshot) => callback(&snapshot),
            Path::Joined => {}
            Path::Issue => self.issue_detail_request(),
        }
    }

    fn issue_detail_request(&self) {
        if self
            .submit_request(|| self.api.req_qry_investor_position_detail())
            .is_none()
        {
            self.report_error(
                EngineErrorKind::QueryPositionDetails,
                "position detail query rejected",
            );
            let mut state = self.state.lock();
            state.details_inflight = false;
            state.details_receivers.clear();
        }
    }

    pub(crate) fn drain_queued_detail_requests(&self) {
        let pending = {
            let state = self.state.lock();
            state.details_inflight && !state.details_receivers.is_empty()
        };
        if pending {
            self.issue_detail_request();
        }
    }

    pub(crate) fn handle_position_detail_response(
        &self,
        detail: Option<&PositionDetailField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryPositionDetails, rsp) {
            let mut state = self.state.lock();
            state.details_inflight = false;
            state.details_receivers.clear();
            return;
        }
        if let Some(field) = detail {
            if let Some(direction) = field.direction {
                let mut state = self.state.lock();
                let symbol = resolve_symbol(&state, &field.instrument_id);
                state.details_accum.push(PositionDetail {
                    symbol,
                    side: DirectionCode::to_side(direction),
                    open_date: field.open_date.clone(),
                    volume: field.volume,
                    open_price: dec(field.open_price),
                    close_volume: field.close_volume,
                });
            }
        }
        if is_last {
            let (receivers, snapshot) = {
                let mut state = self.state.lock();
                let snapshot = std::mem::take(&mut state.details_accum);
                state.details_snapshot = snapshot.clone();
                state.details_inflight = false;
                state.position_details_changed = false;
                (std::mem::take(&mut state.details_receivers), snapshot)
            };
            for receiver in receivers {
                receiver(&snapshot);
            }
        }
    }
}
