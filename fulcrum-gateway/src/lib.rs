//! Contract required from the upstream brokerage gateway, plus the thin
//! adapter the engine uses to talk to it.
//!
//! The gateway SDK exposes a synchronous "queue request, get numeric return"
//! API and delivers results through callbacks on its own thread. This crate
//! pins down that contract as Rust traits ([`TraderApi`], [`MarketApi`] for
//! requests; [`TraderSpi`], [`MarketSpi`] for events), mirrors the raw wire
//! structures, and provides the bounded-retry submit primitive that absorbs
//! the gateway's flow-control return codes.

mod adapter;
mod api;
mod fields;
mod spi;

pub use adapter::{submit, GatewayError, GatewayResult, RetryPolicy};
pub use api::{
    AuthenticateRequest, LoginRequest, MarketApi, OrderActionRequest, OrderInsertRequest,
    TraderApi,
};
pub use fields::{
    decode_price, is_present, parse_hms, rsp_error, tick_seconds, AccountField, CommissionRateField,
    DepthField, DirectionCode, InstrumentField, LoginField, MarginRateField, OffsetCode,
    OptionsTypeCode, OrderField, OrderStatusCode, PositionDateCode, PositionDetailField,
    PositionField, PriceTypeCode, ProductClass, RspInfo, SubmitStatusCode, TradeField,
    BOOK_DEPTH, PRICE_SENTINEL,
};
pub use spi::{MarketSpi, TraderSpi};
