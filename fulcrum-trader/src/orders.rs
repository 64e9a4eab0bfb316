//! Order submission, the lifecycle reduction over gateway order events, and
//! the market-to-limit conversion.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

use fulcrum_broker::{CancelOrderReceiver, EngineErrorKind, OrderRejection, PlaceOrderReceiver};
use fulcrum_core::{
    ExchangeId, Order, OrderFlag, OrderId, OrderRequest, OrderStatistic, OrderStatus, Position,
    Price, ReceiptId, Side, Symbol, Trade,
};
use fulcrum_gateway::{
    decode_price, DepthField, DirectionCode, OffsetCode, OrderActionRequest, OrderField,
    OrderInsertRequest, OrderStatusCode, PriceTypeCode, RspInfo, TradeField,
};

use crate::{PendingMarketOrder, Trader, TraderState};

/// Strategy notification chosen by the status transition.
enum OrderEvent {
    None,
    Entrust,
    Cancel,
    Reject,
}

fn order_id_of(exchange_id: &str, trader_id: &str, local_id: &str) -> OrderId {
    OrderId::new(ExchangeId::register(exchange_id), trader_id, local_id)
}

/// Map the raw state pair onto the engine-level order status using the
/// row's own traded volume. Used when reconciling query snapshots; the live
/// reduction derives traded volume from the attached trades instead.
fn map_status(field: &OrderField) -> OrderStatus {
    match field.order_status {
        OrderStatusCode::Unknown => OrderStatus::Submitted,
        OrderStatusCode::AllTraded => OrderStatus::Filled,
        OrderStatusCode::Canceled => {
            if field.submit_status.is_rejection() {
                OrderStatus::Rejected
            } else {
                OrderStatus::Canceled
            }
        }
        _ => {
            if field.volume_traded == field.volume_total_original {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            }
        }
    }
}

fn order_from_field(field: &OrderField, id: OrderId, status: OrderStatus, traded: i64) -> Order {
    let side = field
        .direction
        .map(DirectionCode::to_side)
        .unwrap_or(Side::Long);
    let offset = field
        .offset
        .map(OffsetCode::to_offset)
        .unwrap_or(fulcrum_core::Offset::Open);
    Order {
        symbol: Symbol::new(
            field.instrument_id.clone(),
            ExchangeId::register(&field.exchange_id),
        ),
        receipt: ReceiptId::new(
            field.front_id,
            field.session_id,
            field.order_ref.trim().parse().unwrap_or(0),
        ),
        id,
        insert_date: field.insert_date.clone(),
        insert_time: field.insert_time.clone(),
        side,
        offset,
        flag: match field.price_type {
            PriceTypeCode::LimitPrice => OrderFlag::Limit,
            PriceTypeCode::AnyPrice => OrderFlag::Market,
        },
        price: decode_price(field.limit_price).unwrap_or_default(),
        volume: field.volume_total_original,
        traded,
        status,
        trades: Vec::new(),
        cancel_time: (!field.cancel_time.is_empty()).then(|| field.cancel_time.clone()),
    }
}

fn position_mut<'a>(state: &'a mut TraderState, symbol: &Symbol) -> &'a mut Position {
    state
        .positions
        .entry(symbol.instrument.clone())
        .or_insert_with(|| Position::new(symbol.clone()))
}

fn statistic_mut<'a>(state: &'a mut TraderState, symbol: &Symbol) -> &'a mut OrderStatistic {
    state
        .statistics
        .entry(symbol.instrument.clone())
        .or_insert_with(|| OrderStatistic::new(symbol.clone()))
}

impl Trader {
    /// Fold one row from the login-time order query, without side effects:
    /// positions are reconstructed by their own query.
    pub(crate) fn load_order_row(&self, field: &OrderField) {
        let id = order_id_of(&field.exchange_id, &field.trader_id, &field.order_local_id);
        let status = map_status(field);
        let order = order_from_field(field, id.clone(), status, field.volume_traded);
        let mut state = self.state.lock();
        state
            .raw_status
            .insert(id.clone(), (field.submit_status, field.order_status));
        state.orders.insert(id, order);
    }

    /// Fold one row from the login-time trade query.
    pub(crate) fn load_trade_row(&self, field: &TradeField) {
        let id = order_id_of(&field.exchange_id, &field.trader_id, &field.order_local_id);
        let trade = Trade {
            id: field.trade_id.clone(),
            order_id: id.clone(),
            date: field.trade_date.clone(),
            time: field.trade_time.clone(),
            price: decode_price(field.price).unwrap_or_default(),
            volume: field.volume,
        };
        let mut state = self.state.lock();
        if let Some(order) = state.orders.get_mut(&id) {
            order.trades.push(trade.clone());
        }
        state.trades.push(trade);
    }

    /// Reduce one asynchronous order event into the authoritative maps and
    /// fan the transition out to strategies.
    pub(crate) fn handle_rtn_order(&self, field: &OrderField) {
        let id = order_id_of(&field.exchange_id, &field.trader_id, &field.order_local_id);
        let (snapshot, event, strategies) = {
            let mut state = self.state.lock();
            let raw_pair = (field.submit_status, field.order_status);
            if state.raw_status.get(&id) == Some(&raw_pair) {
                debug!(order = %id, "duplicate order status ignored");
                return;
            }
            state.raw_status.insert(id.clone(), raw_pair);

            let previous = state.orders.get(&id).map(|order| order.status);
            // Traded volume is the sum of the attached trades; order events
            // carry a cumulative counter too, but it can run ahead of the
            // trade stream and consecutive partial-fill events dedup away.
            let traded = state.orders.get(&id).map_or(0, |order| order.traded);
            let status = match field.order_status {
                OrderStatusCode::Unknown => OrderStatus::Submitted,
                OrderStatusCode::AllTraded => OrderStatus::Filled,
                OrderStatusCode::Canceled => {
                    if field.submit_status.is_rejection() {
                        OrderStatus::Rejected
                    } else {
                        OrderStatus::Canceled
                    }
                }
                _ => {
                    if traded == field.volume_total_original {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::PartiallyFilled
                    }
                }
            };
            let entry = state
                .orders
                .entry(id.clone())
                .or_insert_with(|| order_from_field(field, id.clone(), status, traded));
            entry.status = status;
            if !field.cancel_time.is_empty() {
                entry.cancel_time = Some(field.cancel_time.clone());
            }
            let snapshot = entry.clone();

            let mut event = OrderEvent::None;
            if previous != Some(status) {
                event = self.apply_transition(&mut state, &snapshot);
            }
            (snapshot, event, state.strategies.clone())
        };

        match event {
            OrderEvent::Entrust => {
                for strategy in &strategies {
                    strategy.on_entrust(&snapshot);
                }
            }
            OrderEvent::Cancel => {
                for strategy in &strategies {
                    strategy.on_cancel(&snapshot);
                }
            }
            OrderEvent::Reject => {
                for strategy in &strategies {
                    strategy.on_reject(&snapshot);
                }
            }
            OrderEvent::None => {}
        }
    }

    /// Position and statistics side effects on entry into a status.
    fn apply_transition(&self, state: &mut TraderState, order: &Order) -> OrderEvent {
        match order.status {
            OrderStatus::Submitted => {
                let position = position_mut(state, &order.symbol);
                match order.offset {
                    fulcrum_core::Offset::Open => position.record_pending(order.side, order.volume),
                    offset => position.freeze(order.side, offset, order.volume),
                }
                statistic_mut(state, &order.symbol).entrusts += 1;
                OrderEvent::Entrust
            }
            OrderStatus::Filled => {
                statistic_mut(state, &order.symbol).filleds += 1;
                OrderEvent::None
            }
            OrderStatus::Canceled => {
                let remaining = order.remaining();
                let position = position_mut(state, &order.symbol);
                match order.offset {
                    fulcrum_core::Offset::Open => position.recover_pending(order.side, remaining),
                    offset => position.unfreeze(order.side, offset, remaining),
                }
                statistic_mut(state, &order.symbol).cancels += 1;
                OrderEvent::Cancel
            }
            OrderStatus::Rejected => {
                statistic_mut(state, &order.symbol).rejects += 1;
                OrderEvent::Reject
            }
            OrderStatus::PartiallyFilled => OrderEvent::None,
        }
    }

    /// Attach an execution to its order, adjust the position, and notify.
    pub(crate) fn handle_rtn_trade(&self, field: &TradeField) {
        let id = order_id_of(&field.exchange_id, &field.trader_id, &field.order_local_id);
        let (snapshot, trade, strategies) = {
            let mut state = self.state.lock();
            let Some(order) = state.orders.get_mut(&id) else {
                warn!(order = %id, trade = %field.trade_id, "trade for unknown order dropped");
                return;
            };
            let trade = Trade {
                id: field.trade_id.clone(),
                order_id: id,
                date: field.trade_date.clone(),
                time: field.trade_time.clone(),
                price: decode_price(field.price).unwrap_or_default(),
                volume: field.volume,
            };
            order.trades.push(trade.clone());
            order.traded += trade.volume;
            let snapshot = order.clone();
            state.trades.push(trade.clone());
            state.position_details_changed = true;
            let position = position_mut(&mut state, &snapshot.symbol);
            position.apply_trade(snapshot.side, snapshot.offset, trade.volume);
            (snapshot, trade, state.strategies.clone())
        };

        for strategy in &strategies {
            strategy.on_trade(&snapshot, &trade);
        }
    }

    /// Place an order. Every outcome reaches `receiver`; nothing is returned.
    pub fn place_order(&self, request: &OrderRequest, receiver: Arc<dyn PlaceOrderReceiver>) {
        eprintln!("DBG place_order enter");
        if request.volume <= 0 {
            receiver.on_place_order_error(&OrderRejection::InvalidVolume);
            return;
        }
        eprintln!("DBG before instrument lock");
        let instrument = {
            self.state
                .lock()
                .instruments
                .get(&request.symbol.instrument)
                .cloned()
        };
        eprintln!("DBG after instrument lock");
        let Some(instrument) = instrument else {
            receiver.on_place_order_error(&OrderRejection::InstrumentNotFound);
            return;
        };
        if instrument.exchange != request.symbol.exchange {
            receiver.on_place_order_error(&OrderRejection::ExchangeIdError);
            return;
        }
        eprintln!("DBG dispatching flag={:?}", request.flag);
        match request.flag {
            OrderFlag::Limit => self.place_limit(request, request.price, receiver),
            OrderFlag::Market => self.place_market(request, receiver),
        }
        eprintln!("DBG place_order exit");
    }

    /// Convert a market order into a limit order at an exchange price bound.
    fn place_market(&self, request: &OrderRequest, receiver: Arc<dyn PlaceOrderReceiver>) {
        eprintln!("DBG place_market enter");
        let instrument_id = request.symbol.instrument.clone();

        let cached = self.state.lock().price_limits.get(&instrument_id).copied();
        eprintln!("DBG cached={:?}", cached);
        if let Some(bounds) = cached {
            let bound = pick_bound(request.side, bounds);
            self.place_limit(request, bound, receiver);
            return;
        }

        let hook = self.state.lock().tick_source.clone();
        eprintln!("DBG hook is_some={}", hook.is_some());
        if let Some(hook) = hook {
            if let Some(tick) = hook(&request.symbol) {
                if tick.trading_day == self.trading_day() {
                    if let (Some(upper), Some(lower)) = (tick.upper_band, tick.lower_band) {
                        let bound = pick_bound(request.side, (upper, lower));
                        self.place_limit(request, bound, receiver);
                        return;
                    }
                    if let (Some(upper), Some(lower)) = (tick.upper_limit, tick.lower_limit) {
                        self.state
                            .lock()
                            .price_limits
                            .insert(instrument_id, (upper, lower));
                        let bound = pick_bound(request.side, (upper, lower));
                        self.place_limit(request, bound, receiver);
                        return;
                    }
                }
            }
        }

        // No usable bound yet: park the order behind one depth query.
        eprintln!("DBG before queue lock");
        let issue_query = {
            let mut state = self.state.lock();
            let queue = state.market_orders.entry(instrument_id.clone()).or_default();
            queue.push(PendingMarketOrder {
                request: request.clone(),
                receiver,
            });
            queue.len() == 1
        };
        eprintln!("DBG issue_query={}", issue_query);
        if issue_query
            && self
                .submit_request(|| self.api.req_qry_depth_market_data(&instrument_id))
                .is_none()
        {
            let dropped = self.state.lock().market_orders.remove(&instrument_id);
            if let Some(dropped) = dropped {
                for pending in dropped {
                    pending
                        .receiver
                        .on_place_order_error(&OrderRejection::RequestError);
                }
            }
        }
    }

    fn place_limit(
        &self,
        request: &OrderRequest,
        price: Price,
        receiver: Arc<dyn PlaceOrderReceiver>,
    ) {
        let (order_ref, front_id, session_id) = {
            let mut state = self.state.lock();
            state.order_ref += 1;
            (state.order_ref, state.front_id, state.session_id)
        };
        let insert = OrderInsertRequest {
            instrument_id: request.symbol.instrument.clone(),
            exchange_id: request.symbol.exchange.name().to_string(),
            order_ref: order_ref.to_string(),
            direction: Some(DirectionCode::from_side(request.side)),
            offset: Some(OffsetCode::from_offset(request.offset)),
            limit_price: price.to_f64().unwrap_or(0.0),
            volume: request.volume,
        };
        let request_id = self
            .submit_request(|| self.api.req_order_insert(&insert))
            .filter(|id| *id > 0);
        let Some(request_id) = request_id else {
            receiver.on_place_order_error(&OrderRejection::RequestError);
            return;
        };
        {
            let mut state = self.state.lock();
            statistic_mut(&mut state, &request.symbol).places += 1;
            state.place_correlations.insert(request_id, receiver.clone());
        }
        let receipt = ReceiptId::new(front_id, session_id, order_ref);
        info!(symbol = %request.symbol, %receipt, volume = request.volume, "order sent");
        receiver.on_place_order_sent(receipt);
    }

    /// Cancel an existing, not-yet-canceled order.
    pub fn cancel_order(&self, order_id: &OrderId, receiver: Arc<dyn CancelOrderReceiver>) {
        let order = self.state.lock().orders.get(order_id).cloned();
        let Some(order) = order else {
            receiver.on_cancel_order_error(&OrderRejection::OrderNotFound);
            return;
        };
        if order.cancel_time.is_some() {
            receiver.on_cancel_order_error(&OrderRejection::AlreadyCanceled);
            return;
        }
        let action = OrderActionRequest {
            instrument_id: order.symbol.instrument.clone(),
            exchange_id: order.id.exchange.name().to_string(),
            order_local_id: order.id.local_id.clone(),
            trader_id: order.id.trader_id.clone(),
        };
        let request_id = self
            .submit_request(|| self.api.req_order_action(&action))
            .filter(|id| *id > 0);
        let Some(request_id) = request_id else {
            receiver.on_cancel_order_error(&OrderRejection::RequestError);
            return;
        };
        self.state
            .lock()
            .cancel_correlations
            .insert(request_id, receiver.clone());
        info!(order = %order_id, "cancel sent");
        receiver.on_cancel_order_sent(order_id);
    }

    /// Synchronous insert rejection: routed to the correlated requester only.
    /// The asynchronous order flow stays authoritative when no error is set.
    pub(crate) fn handle_rsp_order_insert(&self, rsp: Option<&RspInfo>, request_id: i32) {
        let Some((id, message)) = rsp.and_then(RspInfo::error) else {
            return;
        };
        let receiver = self.state.lock().place_correlations.remove(&request_id);
        if let Some(receiver) = receiver {
            receiver.on_place_order_error(&OrderRejection::gateway(id, message));
        }
    }

    pub(crate) fn handle_rsp_order_action(&self, rsp: Option<&RspInfo>, request_id: i32) {
        let Some((id, message)) = rsp.and_then(RspInfo::error) else {
            return;
        };
        let receiver = self.state.lock().cancel_correlations.remove(&request_id);
        if let Some(receiver) = receiver {
            receiver.on_cancel_order_error(&OrderRejection::gateway(id, message));
        }
    }

    /// Depth response feeding queued market orders their price bounds.
    pub(crate) fn handle_depth_response(
        &self,
        depth: Option<&DepthField>,
        rsp: Option<&RspInfo>,
        _is_last: bool,
    ) {
        eprintln!("DBG handle_depth_response enter");
        if self.check_rsp(EngineErrorKind::QueryDepthMarketData, rsp) {
            let dropped = std::mem::take(&mut self.state.lock().market_orders);
            self.fail_market_orders(dropped);
            return;
        }
        let Some(depth) = depth else {
            return;
        };

        // Circuit-breaker bands take precedence; daily limits are cached
        // because they hold for the whole trading day.
        let bands = (
            decode_price(depth.band_upper_price),
            decode_price(depth.band_lower_price),
        );
        let bounds = match bands {
            (Some(upper), Some(lower)) => Some(((upper, lower), false)),
            _ => match (
                decode_price(depth.upper_limit_price),
                decode_price(depth.lower_limit_price),
            ) {
                (Some(upper), Some(lower)) => Some(((upper, lower), true)),
                _ => None,
            },
        };

        let pending = {
            let mut state = self.state.lock();
            if let Some((limits, cache)) = bounds {
                if cache {
                    state
                        .price_limits
                        .insert(depth.instrument_id.clone(), limits);
                }
            }
            state.market_orders.remove(&depth.instrument_id)
        };
        let Some(pending) = pending else {
            return;
        };
        match bounds {
            Some((limits, _)) => {
                for queued in pending {
                    let bound = pick_bound(queued.request.side, limits);
                    self.place_limit(&queued.request, bound, queued.receiver);
                }
            }
            None => {
                for queued in pending {
                    queued
                        .receiver
                        .on_place_order_error(&OrderRejection::RequestError);
                }
            }
        }
    }

    pub(crate) fn fail_market_orders(&self, dropped: HashMap<String, Vec<PendingMarketOrder>>) {
        for pending in dropped.into_values().flatten() {
            pending
                .receiver
                .on_place_order_error(&OrderRejection::RequestError);
        }
    }
}

fn pick_bound(side: Side, (upper, lower): (Price, Price)) -> Price {
    match side {
        Side::Long => upper,
        Side::Short => lower,
    }
}
