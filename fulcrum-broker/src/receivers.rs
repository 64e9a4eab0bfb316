//! Receiver interfaces for every event class the engine emits.

use fulcrum_core::{
    Account, Bar, CommissionRate, Instrument, MarginRate, Order, OrderId, PositionDetail,
    ReceiptId, Symbol, Tape, Tick, Trade,
};
use fulcrum_gateway::DepthField;

use crate::{EngineErrorKind, OrderRejection};

/// Risk-event kind passed to [`Strategy::on_risk`] when a place is denied.
pub const PLACE_ORDER_RISK: &str = "place-order-risk";
/// Risk-event kind passed to [`Strategy::on_risk`] when a cancel is denied.
pub const CANCEL_ORDER_RISK: &str = "cancel-order-risk";

/// Endpoint lifecycle listener: open/close transitions and engine errors.
#[allow(unused_variables)]
pub trait Lifecycle: Send + Sync {
    /// Fired exactly once per lifecycle when the endpoint becomes usable.
    fn on_open(&self) {}
    fn on_close(&self) {}
    /// Engine-level failures in the `{gateway_error_id}:{msg}` format.
    fn on_error(&self, kind: EngineErrorKind, message: &str) {}
}

/// Market data receiver fed by the router in registration order.
pub trait TickReceiver: Send + Sync {
    fn on_tick(&self, tick: &Tick, tape: &Tape);
}

/// Bar receiver; implement [`BarReceiver::wants_updates`] to additionally
/// observe intra-bar snapshots.
#[allow(unused_variables)]
pub trait BarReceiver: Send + Sync {
    fn on_bar(&self, bar: &Bar);

    /// Opt in to per-tick snapshots of the working bar.
    fn wants_updates(&self) -> bool {
        false
    }

    fn on_update_bar(&self, bar: &Bar, tick: &Tick, tape: &Tape) {}
}

/// Raw-depth sink paired with an instrument selector.
///
/// The router subscribes the selected universe on the wire and hands this
/// receiver the undecoded payloads before any engine processing.
pub trait Recorder: Send + Sync {
    /// Choose the symbols to record out of the full instrument list.
    fn select(&self, instruments: &[Instrument]) -> Vec<Symbol>;

    fn on_raw_depth(&self, depth: &DepthField);
}

/// User-written decision code driven by the broker façade.
#[allow(unused_variables)]
pub trait Strategy: Send + Sync {
    /// Human-friendly identifier used in logs.
    fn name(&self) -> &str;

    /// Called once both endpoints are open.
    fn on_init(&self) {}

    /// Called during teardown.
    fn on_destroy(&self) {}

    /// A risk manager denied an order on this strategy's behalf.
    fn on_risk(&self, kind: &str, reason: Option<&str>) {}

    /// The exchange acknowledged an order.
    fn on_entrust(&self, order: &Order) {}

    /// An execution arrived; `order` reflects the post-fill state.
    fn on_trade(&self, order: &Order, trade: &Trade) {}

    fn on_cancel(&self, order: &Order) {}

    fn on_reject(&self, order: &Order) {}
}

/// Result receiver for one order placement.
#[allow(unused_variables)]
pub trait PlaceOrderReceiver: Send + Sync {
    /// The request reached the gateway; correlate further events by receipt.
    fn on_place_order_sent(&self, receipt: ReceiptId) {}

    fn on_place_order_error(&self, reason: &OrderRejection) {}
}

/// Result receiver for one cancellation.
#[allow(unused_variables)]
pub trait CancelOrderReceiver: Send + Sync {
    fn on_cancel_order_sent(&self, order_id: &OrderId) {}

    fn on_cancel_order_error(&self, reason: &OrderRejection) {}
}

/// One-shot margin-rate callback; invoked from cache or on response.
pub type MarginRateCallback = Box<dyn FnOnce(&MarginRate) + Send>;
/// One-shot commission-rate callback.
pub type CommissionRateCallback = Box<dyn FnOnce(&CommissionRate) + Send>;
/// One-shot accounts-snapshot callback.
pub type AccountsCallback = Box<dyn FnOnce(&[Account]) + Send>;
/// One-shot position-details callback.
pub type PositionDetailsCallback = Box<dyn FnOnce(&[PositionDetail]) + Send>;
