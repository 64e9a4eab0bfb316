//! Per-symbol reduction of ticks into time- or volume-bucketed bars.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use fulcrum_broker::{BarReceiver, TickReceiver};
use fulcrum_core::{Bar, Symbol, Tape, TapeDirection, Tick, Volume};

/// Bucketing discipline for a generator.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BarMode {
    /// One-minute buckets keyed on the `HHMMSS` encoding.
    Time,
    /// Close the bar once its cumulative volume reaches `max_volume`.
    Volume { max_volume: Volume },
}

/// Truncate a tick time to its minute bucket.
#[must_use]
pub fn minute_bucket(time: f64) -> f64 {
    (time / 100.0).floor() * 100.0
}

struct GeneratorState {
    current: Option<Bar>,
    last_turnover: Option<f64>,
    receivers: Vec<Arc<dyn BarReceiver>>,
}

/// Reduces the `(tick, tape)` stream of one symbol into bars.
///
/// The generator is itself a tick receiver, so the façade registers it with
/// the market router like any strategy. Receivers are reference-counted;
/// the generator is working while at least one is attached.
pub struct BarGenerator {
    symbol: Symbol,
    mode: BarMode,
    state: Mutex<GeneratorState>,
}

impl BarGenerator {
    #[must_use]
    pub fn new(symbol: Symbol, mode: BarMode) -> Self {
        Self {
            symbol,
            mode,
            state: Mutex::new(GeneratorState {
                current: None,
                last_turnover: None,
                receivers: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[must_use]
    pub fn mode(&self) -> BarMode {
        self.mode
    }

    /// Attach a receiver, idempotently.
    pub fn add_receiver(&self, receiver: &Arc<dyn BarReceiver>) {
        let mut state = self.state.lock();
        if !state
            .receivers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, receiver))
        {
            state.receivers.push(Arc::clone(receiver));
        }
    }

    /// Detach a receiver; returns whether any receivers remain.
    pub fn remove_receiver(&self, receiver: &Arc<dyn BarReceiver>) -> bool {
        let mut state = self.state.lock();
        state
            .receivers
            .retain(|existing| !Arc::ptr_eq(existing, receiver));
        !state.receivers.is_empty()
    }

    /// True while at least one receiver is attached.
    #[must_use]
    pub fn is_working(&self) -> bool {
        !self.state.lock().receivers.is_empty()
    }

    fn is_finished(&self, bar: &Bar, tick: &Tick) -> bool {
        match self.mode {
            BarMode::Time => minute_bucket(tick.time) != bar.time,
            BarMode::Volume { max_volume } => bar.volume >= max_volume,
        }
    }

    fn open_bar(&self, tick: &Tick) -> Bar {
        let time = match self.mode {
            BarMode::Time => minute_bucket(tick.time),
            BarMode::Volume { .. } => tick.time,
        };
        Bar {
            symbol: self.symbol.clone(),
            trading_day: tick.trading_day.clone(),
            time,
            open: tick.last,
            high: tick.last,
            low: tick.last,
            close: tick.last,
            poc: tick.last,
            volume: 0,
            turnover: 0.0,
            open_interest: tick.open_interest,
            delta: 0,
            buy_volumes: BTreeMap::new(),
            sell_volumes: BTreeMap::new(),
        }
    }
}

impl TickReceiver for BarGenerator {
    fn on_tick(&self, tick: &Tick, tape: &Tape) {
        let mut finished: Option<Bar> = None;
        let mut update: Option<Bar> = None;
        let receivers;
        {
            let mut state = self.state.lock();
            if let Some(bar) = state.current.take() {
                if self.is_finished(&bar, tick) {
                    debug!(symbol = %self.symbol, time = bar.time, volume = bar.volume, "bar closed");
                    finished = Some(bar);
                } else {
                    state.current = Some(bar);
                }
            }

            // A tick without new business can close a bar but never extends one.
            if tape.volume_delta != 0 {
                let last = tick.last;
                let turnover_delta = state
                    .last_turnover
                    .map_or(tick.turnover, |prev| tick.turnover - prev);
                let bar = state.current.get_or_insert_with(|| self.open_bar(tick));
                bar.open_interest = tick.open_interest;
                bar.close = last;
                bar.high = bar.high.max(last);
                bar.low = bar.low.min(last);
                bar.volume += tape.volume_delta;
                bar.turnover += turnover_delta;
                match tape.direction {
                    TapeDirection::Up => {
                        *bar.buy_volumes.entry(last).or_insert(0) += tape.volume_delta;
                        bar.delta += tape.volume_delta;
                    }
                    TapeDirection::Down => {
                        *bar.sell_volumes.entry(last).or_insert(0) += tape.volume_delta;
                        bar.delta -= tape.volume_delta;
                    }
                    TapeDirection::Neutral => {}
                }
                if last != bar.poc
                    && tape.direction != TapeDirection::Neutral
                    && bar.volume_at(last) > bar.volume_at(bar.poc)
                {
                    bar.poc = last;
                }
                if state
                    .receivers
                    .iter()
                    .any(|receiver| receiver.wants_updates())
                {
                    update = state.current.clone();
                }
            }
            state.last_turnover = Some(tick.turnover);
            receivers = state.receivers.clone();
        }

        if let Some(bar) = finished {
            for receiver in &receivers {
                receiver.on_bar(&bar);
            }
        }
        if let Some(bar) = update {
            for receiver in &receivers {
                if receiver.wants_updates() {
                    receiver.on_update_bar(&bar, tick, tape);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use fulcrum_core::{BookLevel, Price};
    use parking_lot::Mutex as PlMutex;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct CollectingReceiver {
        bars: PlMutex<Vec<Bar>>,
        updates: PlMutex<Vec<Bar>>,
        intra: bool,
    }

    impl BarReceiver for CollectingReceiver {
        fn on_bar(&self, bar: &Bar) {
            self.bars.lock().push(bar.clone());
        }

        fn wants_updates(&self) -> bool {
            self.intra
        }

        fn on_update_bar(&self, bar: &Bar, _tick: &Tick, _tape: &Tape) {
            self.updates.lock().push(bar.clone());
        }
    }

    fn tick(time: f64, last: Price, volume: i64, oi: f64) -> Tick {
        Tick {
            symbol: Symbol::from("rb2410.SHFE"),
            date: "20260803".into(),
            trading_day: "20260803".into(),
            time,
            last,
            open: None,
            high: None,
            low: None,
            pre_close: None,
            open_interest: oi,
            pre_open_interest: 0.0,
            volume,
            turnover: 0.0,
            upper_limit: None,
            lower_limit: None,
            upper_band: None,
            lower_band: None,
            bids: vec![BookLevel {
                price: last - dec!(1),
                volume: 1,
            }],
            asks: vec![BookLevel {
                price: last + dec!(1),
                volume: 1,
            }],
        }
    }

    fn feed(generator: &BarGenerator, ticks: &[Tick]) {
        let mut previous: Option<Tick> = None;
        for t in ticks {
            let tape = classify(t, previous.as_ref());
            generator.on_tick(t, &tape);
            previous = Some(t.clone());
        }
    }

    #[test]
    fn minute_bucket_truncates() {
        assert_eq!(minute_bucket(93059.5), 93000.0);
        assert_eq!(minute_bucket(93100.0), 93100.0);
    }

    #[test]
    fn time_mode_emits_on_bucket_rollover() {
        let generator = BarGenerator::new(Symbol::from("rb2410.SHFE"), BarMode::Time);
        let receiver = Arc::new(CollectingReceiver::default());
        let handle: Arc<dyn BarReceiver> = receiver.clone();
        generator.add_receiver(&handle);

        feed(
            &generator,
            &[
                tick(93001.0, dec!(100), 10, 50.0),
                tick(93030.0, dec!(102), 14, 50.0),
                tick(93101.0, dec!(101), 16, 50.0),
            ],
        );

        let bars = receiver.bars.lock();
        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(bar.time, 93000.0);
        assert_eq!(bar.open, dec!(100));
        assert_eq!(bar.high, dec!(102));
        assert_eq!(bar.close, dec!(102));
        assert_eq!(bar.volume, 14);
    }

    #[test]
    fn volume_mode_closes_at_threshold() {
        let generator = BarGenerator::new(
            Symbol::from("rb2410.SHFE"),
            BarMode::Volume { max_volume: 10 },
        );
        let receiver = Arc::new(CollectingReceiver::default());
        let handle: Arc<dyn BarReceiver> = receiver.clone();
        generator.add_receiver(&handle);

        feed(
            &generator,
            &[
                tick(93001.0, dec!(100), 6, 50.0),
                tick(93002.0, dec!(101), 12, 50.0),
                tick(93003.0, dec!(102), 14, 50.0),
            ],
        );

        let bars = receiver.bars.lock();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 12);
        // The third tick opened a fresh bar.
        assert!(generator.is_working());
    }

    #[test]
    fn direction_apportions_buy_and_sell_volume() {
        let generator = BarGenerator::new(Symbol::from("rb2410.SHFE"), BarMode::Time);
        let receiver = Arc::new(CollectingReceiver::default());
        let handle: Arc<dyn BarReceiver> = receiver.clone();
        generator.add_receiver(&handle);

        feed(
            &generator,
            &[
                tick(93001.0, dec!(100), 4, 50.0),
                // Lifts the 101 ask: up, +6.
                tick(93002.0, dec!(101), 10, 50.0),
                // Hits the 100 bid: down, -2.
                tick(93003.0, dec!(100), 12, 50.0),
                // Next minute flushes the bar.
                tick(93101.0, dec!(100), 12, 50.0),
            ],
        );

        let bars = receiver.bars.lock();
        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(bar.delta, 4);
        assert_eq!(bar.buy_volumes.get(&dec!(101)), Some(&6));
        assert_eq!(bar.sell_volumes.get(&dec!(100)), Some(&2));
        assert_eq!(bar.volume, 12);
        // 101 carries the most volume and took the POC.
        assert_eq!(bar.poc, dec!(101));
    }

    #[test]
    fn zero_delta_ticks_are_dropped() {
        let generator = BarGenerator::new(Symbol::from("rb2410.SHFE"), BarMode::Time);
        let receiver = Arc::new(CollectingReceiver::default());
        let handle: Arc<dyn BarReceiver> = receiver.clone();
        generator.add_receiver(&handle);

        feed(
            &generator,
            &[
                tick(93001.0, dec!(100), 4, 50.0),
                tick(93002.0, dec!(105), 4, 50.0),
            ],
        );

        let state = generator.state.lock();
        let bar = state.current.as_ref().unwrap();
        assert_eq!(bar.high, dec!(100));
        assert_eq!(bar.volume, 4);
    }

    #[test]
    fn intra_bar_updates_reach_opted_in_receivers() {
        let generator = BarGenerator::new(Symbol::from("rb2410.SHFE"), BarMode::Time);
        let receiver = Arc::new(CollectingReceiver {
            intra: true,
            ..CollectingReceiver::default()
        });
        let handle: Arc<dyn BarReceiver> = receiver.clone();
        generator.add_receiver(&handle);

        feed(
            &generator,
            &[
                tick(93001.0, dec!(100), 4, 50.0),
                tick(93002.0, dec!(101), 6, 50.0),
            ],
        );

        assert_eq!(receiver.updates.lock().len(), 2);
    }

    #[test]
    fn receiver_refcounting() {
        let generator = BarGenerator::new(Symbol::from("rb2410.SHFE"), BarMode::Time);
        let first: Arc<dyn BarReceiver> = Arc::new(CollectingReceiver::default());
        let second: Arc<dyn BarReceiver> = Arc::new(CollectingReceiver::default());
        generator.add_receiver(&first);
        generator.add_receiver(&first);
        generator.add_receiver(&second);
        assert!(generator.remove_receiver(&first));
        assert!(!generator.remove_receiver(&second));
        assert!(!generator.is_working());
    }
}
