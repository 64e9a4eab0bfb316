//! Property: tape classification is a pure function of the tick pair.

use fulcrum_core::{BookLevel, Symbol, Tick};
use fulcrum_market::classify;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|raw| Decimal::new(raw, 2))
}

fn level_strategy() -> impl Strategy<Value = BookLevel> {
    (price_strategy(), 1i64..500).prop_map(|(price, volume)| BookLevel { price, volume })
}

fn tick_strategy() -> impl Strategy<Value = Tick> {
    (
        price_strategy(),
        prop::option::of(price_strategy()),
        0i64..10_000,
        0.0f64..5_000.0,
        0.0f64..5_000.0,
        prop::collection::vec(level_strategy(), 0..3),
        prop::collection::vec(level_strategy(), 0..3),
    )
        .prop_map(|(last, pre_close, volume, oi, pre_oi, bids, asks)| Tick {
            symbol: Symbol::from("rb2410.SHFE"),
            date: "20260803".into(),
            trading_day: "20260803".into(),
            time: 93000.0,
            last,
            open: None,
            high: None,
            low: None,
            pre_close,
            open_interest: oi,
            pre_open_interest: pre_oi,
            volume,
            turnover: 0.0,
            upper_limit: None,
            lower_limit: None,
            upper_band: None,
            lower_band: None,
            bids,
            asks,
        })
}

proptest! {
    /// Identical `(current, previous)` inputs always yield identical tapes,
    /// and an unrelated classification in between cannot influence the
    /// result: the classifier carries no state of its own.
    #[test]
    fn identical_inputs_yield_identical_tapes(
        current in tick_strategy(),
        previous in prop::option::of(tick_strategy()),
        other in tick_strategy(),
    ) {
        let first = classify(&current, previous.as_ref());
        let _ = classify(&other, Some(&current));
        let _ = classify(&other, None);
        let second = classify(&current, previous.as_ref());
        prop_assert_eq!(first, second);
    }

    /// Cloned inputs classify identically to the originals.
    #[test]
    fn classification_depends_only_on_input_values(
        current in tick_strategy(),
        previous in prop::option::of(tick_strategy()),
    ) {
        let copied_current = current.clone();
        let copied_previous = previous.clone();
        prop_assert_eq!(
            classify(&current, previous.as_ref()),
            classify(&copied_current, copied_previous.as_ref())
        );
    }
}
