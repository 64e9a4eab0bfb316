//! Engine-agnostic receiver traits used by the rest of the workspace.
//!
//! The engine hides the gateway's request/response asynchrony behind these
//! typed receiver interfaces: components invoke them on the single gateway
//! callback thread, always with immutable snapshots, and never while holding
//! internal locks (so receivers may re-enter the engine, e.g. place an order
//! from inside a tick callback).

mod error;
mod receivers;
mod risk;

pub use error::{EngineErrorKind, OrderRejection};
pub use receivers::{
    AccountsCallback, BarReceiver, CancelOrderReceiver, CommissionRateCallback, Lifecycle,
    MarginRateCallback, PlaceOrderReceiver, PositionDetailsCallback, Recorder, Strategy,
    TickReceiver, CANCEL_ORDER_RISK, PLACE_ORDER_RISK,
};
pub use risk::{RiskManager, RiskVerdict};
