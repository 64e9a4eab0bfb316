//! Top-level composition of the fulcrum engine.
//!
//! The [`Broker`] façade wires strategies, risk managers, the market router,
//! and the trading coordinator together, sequences start and stop across the
//! two gateway endpoints, and gates every order through the configured risk
//! chain before it can reach the wire.

mod broker;
mod config;

pub use broker::Broker;
pub use config::{EngineConfig, RecorderConfig, RetryConfig};

/// The user-facing surface in one import.
pub mod prelude {
    pub use crate::{Broker, EngineConfig};
    pub use fulcrum_broker::{
        BarReceiver, CancelOrderReceiver, EngineErrorKind, Lifecycle, OrderRejection,
        PlaceOrderReceiver, Recorder, RiskManager, RiskVerdict, Strategy, TickReceiver,
    };
    pub use fulcrum_core::{
        Bar, Instrument, Offset, Order, OrderFlag, OrderId, OrderRequest, OrderStatus, Position,
        Price, ReceiptId, Side, Symbol, Tape, TapeDirection, TapeStatus, TapeType, Tick, Trade,
        Volume,
    };
    pub use fulcrum_market::BarMode;
    pub use fulcrum_trader::SessionConfig;
}
