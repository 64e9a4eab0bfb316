//! Market-data side of the engine: the subscription router, the tape
//! classifier, and the bar aggregator.

mod bars;
mod router;
mod tape;

pub use bars::{minute_bucket, BarGenerator, BarMode};
pub use router::MarketRouter;
pub use tape::classify;
