//! The multi-phase login pipeline and the trading-endpoint event dispatch.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fulcrum_broker::EngineErrorKind;
use fulcrum_core::{ExchangeId, Instrument, Position, Symbol};
use fulcrum_gateway::{
    decode_price, AuthenticateRequest, InstrumentField, LoginField, LoginRequest, PositionDateCode,
    PositionField, RspInfo, TraderSpi,
};

use crate::Trader;

/// Credentials and identifiers for one gateway session.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SessionConfig {
    pub broker_id: String,
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub auth_code: String,
}

impl SessionConfig {
    #[must_use]
    pub fn authenticate_request(&self) -> AuthenticateRequest {
        AuthenticateRequest {
            broker_id: self.broker_id.clone(),
            user_id: self.user_id.clone(),
            app_id: self.app_id.clone(),
            auth_code: self.auth_code.clone(),
        }
    }

    #[must_use]
    pub fn login_request(&self) -> LoginRequest {
        LoginRequest {
            broker_id: self.broker_id.clone(),
            user_id: self.user_id.clone(),
            password: self.password.clone(),
        }
    }
}

/// Login pipeline states. Each gateway acknowledgement advances one step;
/// an error halts the machine in place until the front reconnects.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Authenticating,
    LoggingIn,
    Confirming,
    LoadingOrders,
    LoadingTrades,
    LoadingInstruments,
    LoadingPositions,
    Ready,
}

impl Trader {
    fn advance(&self, next: SessionState) {
        info!(state = ?next, "session state");
        self.state.lock().session = next;
    }

    fn handle_front_connected(&self) {
        self.advance(SessionState::Authenticating);
        let request = self.authenticate.clone();
        if self.submit_request(|| self.api.req_authenticate(&request)).is_none() {
            self.report_error(EngineErrorKind::Login, "authenticate request rejected");
        }
    }

    /// Connection loss invalidates all in-flight request correlations.
    fn handle_front_disconnected(&self, reason: i32) {
        warn!(reason, "trader front disconnected");
        let dropped = {
            let mut state = self.state.lock();
            state.session = SessionState::Disconnected;
            state.place_correlations.clear();
            state.cancel_correlations.clear();
            std::mem::take(&mut state.market_orders)
        };
        self.fail_market_orders(dropped);
    }

    fn handle_rsp_authenticate(&self, rsp: Option<&RspInfo>) {
        if self.check_rsp(EngineErrorKind::Login, rsp) {
            return;
        }
        self.advance(SessionState::LoggingIn);
        let request = self.login.clone();
        if self.submit_request(|| self.api.req_user_login(&request)).is_none() {
            self.report_error(EngineErrorKind::Login, "login request rejected");
        }
    }

    fn handle_rsp_user_login(&self, login: Option<&LoginField>, rsp: Option<&RspInfo>) {
        if self.check_rsp(EngineErrorKind::Login, rsp) {
            return;
        }
        let Some(login) = login else {
            self.report_error(EngineErrorKind::Login, "login response missing payload");
            return;
        };
        {
            let mut state = self.state.lock();
            state.front_id = login.front_id;
            state.session_id = login.session_id;
            state.order_ref = login.max_order_ref.trim().parse().unwrap_or(0);
            if login.trading_day != state.trading_day {
                info!(day = %login.trading_day, "trading day advanced, clearing day caches");
                state.margin_cache.clear();
                state.commission_cache.clear();
                state.statistics.clear();
                state.price_limits.clear();
                state.trading_day = login.trading_day.clone();
            }
        }
        self.advance(SessionState::Confirming);
        if self
            .submit_request(|| self.api.req_settlement_info_confirm())
            .is_none()
        {
            self.report_error(EngineErrorKind::Login, "settlement confirm rejected");
        }
    }

    fn handle_rsp_settlement_confirm(&self, rsp: Option<&RspInfo>) {
        if self.check_rsp(EngineErrorKind::Login, rsp) {
            return;
        }
        {
            let mut state = self.state.lock();
            state.orders.clear();
            state.raw_status.clear();
        }
        self.advance(SessionState::LoadingOrders);
        if self.submit_request(|| self.api.req_qry_order()).is_none() {
            self.report_error(EngineErrorKind::QueryOrder, "order query rejected");
        }
    }

    pub(crate) fn finish_order_load(&self) {
        self.state.lock().trades.clear();
        self.advance(SessionState::LoadingTrades);
        if self.submit_request(|| self.api.req_qry_trade()).is_none() {
            self.report_error(EngineErrorKind::QueryTrade, "trade query rejected");
        }
    }

    pub(crate) fn finish_trade_load(&self) {
        self.state.lock().instruments.clear();
        self.advance(SessionState::LoadingInstruments);
        if self.submit_request(|| self.api.req_qry_instrument()).is_none() {
            self.report_error(EngineErrorKind::QueryInstrument, "instrument query rejected");
        }
    }

    fn handle_instrument_row(&self, field: &InstrumentField) {
        // Only futures and options participate in trading state.
        let Some(product_type) = field.product_class.to_product_type() else {
            return;
        };
        if !matches!(
            product_type,
            fulcrum_core::ProductType::Futures | fulcrum_core::ProductType::Options
        ) {
            return;
        }
        let exchange = ExchangeId::register(&field.exchange_id);
        let instrument = Instrument {
            symbol: Symbol::new(field.instrument_id.clone(), exchange),
            id: field.instrument_id.clone(),
            name: field.instrument_name.clone(),
            exchange,
            product_id: field.product_id.clone(),
            product_type,
            delivery: (field.delivery_year * 100 + field.delivery_month).max(0) as u32,
            create_date: field.create_date.clone(),
            open_date: field.open_date.clone(),
            expire_date: field.expire_date.clone(),
            volume_multiple: field.volume_multiple.max(0) as u32,
            price_tick: decode_price(field.price_tick).unwrap_or_default(),
            min_limit_order_volume: field.min_limit_order_volume,
            max_limit_order_volume: field.max_limit_order_volume,
            strike_price: decode_price(field.strike_price),
            options_type: field.options_type.map(|code| code.to_options_type()),
        };
        self.state
            .lock()
            .instruments
            .insert(field.instrument_id.clone(), instrument);
    }

    pub(crate) fn finish_instrument_load(&self) {
        self.state.lock().positions.clear();
        self.advance(SessionState::LoadingPositions);
        if self
            .submit_request(|| self.api.req_qry_investor_position())
            .is_none()
        {
            self.report_error(EngineErrorKind::QueryPositions, "position query rejected");
        }
    }

    /// Fold one investor-position row into the position map.
    ///
    /// SHFE and INE report today lots through the dedicated today-position
    /// field; other exchanges report them in the plain position field.
    /// History rows carry `position - today_position`.
    fn handle_position_row(&self, field: &PositionField) {
        let Some(direction) = field.direction else {
            return;
        };
        let side = direction.to_side();
        let exchange = ExchangeId::register(&field.exchange_id);
        let mut state = self.state.lock();
        let symbol = state
            .instruments
            .get(&field.instrument_id)
            .map(|instrument| instrument.symbol.clone())
            .unwrap_or_else(|| Symbol::new(field.instrument_id.clone(), exchange));
        let position = state
            .positions
            .entry(field.instrument_id.clone())
            .or_insert_with(|| Position::new(symbol));
        match field.position_date {
            PositionDateCode::Today => {
                let volume = if exchange.splits_today_position() {
                    field.today_position
                } else {
                    field.position
                };
                position.today.cell_mut(side).position += volume;
            }
            PositionDateCode::History => {
                position.history.cell_mut(side).position +=
                    field.position - field.today_position;
            }
        }
    }

    pub(crate) fn finish_position_load(&self) {
        let (lifecycle, first_open) = {
            let mut state = self.state.lock();
            state.session = SessionState::Ready;
            // The reload invalidated any detail snapshot a prior session had.
            state.position_details_changed = true;
            let first_open = !state.opened;
            state.opened = true;
            (state.lifecycle.clone(), first_open)
        };
        info!("trading endpoint ready");
        if first_open {
            if let Some(lifecycle) = lifecycle {
                lifecycle.on_open();
            }
        }
        // Requests queued while the pipeline ran go out now.
        self.drain_queued_account_requests();
        self.drain_queued_detail_requests();
        self.pump_margin_queue();
        self.pump_commission_queue();
    }
}

impl TraderSpi for Trader {
    fn on_front_connected(&self) {
        self.handle_front_connected();
    }

    fn on_front_disconnected(&self, reason: i32) {
        self.handle_front_disconnected(reason);
    }

    fn on_rsp_authenticate(&self, rsp: Option<&RspInfo>) {
        self.handle_rsp_authenticate(rsp);
    }

    fn on_rsp_user_login(&self, login: Option<&LoginField>, rsp: Option<&RspInfo>) {
        self.handle_rsp_user_login(login, rsp);
    }

    fn on_rsp_settlement_info_confirm(&self, rsp: Option<&RspInfo>) {
        self.handle_rsp_settlement_confirm(rsp);
    }

    fn on_rsp_qry_order(
        &self,
        order: Option<&fulcrum_gateway::OrderField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryOrder, rsp) {
            return;
        }
        if let Some(order) = order {
            self.load_order_row(order);
        }
        if is_last {
            self.finish_order_load();
        }
    }

    fn on_rsp_qry_trade(
        &self,
        trade: Option<&fulcrum_gateway::TradeField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryTrade, rsp) {
            return;
        }
        if let Some(trade) = trade {
            self.load_trade_row(trade);
        }
        if is_last {
            self.finish_trade_load();
        }
    }

    fn on_rsp_qry_instrument(
        &self,
        instrument: Option<&InstrumentField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryInstrument, rsp) {
            return;
        }
        if let Some(instrument) = instrument {
            self.handle_instrument_row(instrument);
        }
        if is_last {
            self.finish_instrument_load();
        }
    }

    fn on_rsp_qry_investor_position(
        &self,
        position: Option<&PositionField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        if self.check_rsp(EngineErrorKind::QueryPositions, rsp) {
            return;
        }
        if let Some(position) = position {
            self.handle_position_row(position);
        }
        if is_last {
            self.finish_position_load();
        }
    }

    fn on_rsp_qry_investor_position_detail(
        &self,
        detail: Option<&fulcrum_gateway::PositionDetailField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        self.handle_position_detail_response(detail, rsp, is_last);
    }

    fn on_rsp_qry_trading_account(
        &self,
        account: Option<&fulcrum_gateway::AccountField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        self.handle_account_response(account, rsp, is_last);
    }

    fn on_rsp_qry_margin_rate(
        &self,
        rate: Option<&fulcrum_gateway::MarginRateField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        self.handle_margin_rate_response(rate, rsp, is_last);
    }

    fn on_rsp_qry_commission_rate(
        &self,
        rate: Option<&fulcrum_gateway::CommissionRateField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        self.handle_commission_rate_response(rate, rsp, is_last);
    }

    fn on_rsp_qry_depth_market_data(
        &self,
        depth: Option<&fulcrum_gateway::DepthField>,
        rsp: Option<&RspInfo>,
        is_last: bool,
    ) {
        self.handle_depth_response(depth, rsp, is_last);
    }

    fn on_rsp_order_insert(&self, rsp: Option<&RspInfo>, request_id: i32) {
        self.handle_rsp_order_insert(rsp, request_id);
    }

    fn on_rsp_order_action(&self, rsp: Option<&RspInfo>, request_id: i32) {
        self.handle_rsp_order_action(rsp, request_id);
    }

    fn on_rtn_order(&self, order: &fulcrum_gateway::OrderField) {
        self.handle_rtn_order(order);
    }

    fn on_rtn_trade(&self, trade: &fulcrum_gateway::TradeField) {
        self.handle_rtn_trade(trade);
    }
}
