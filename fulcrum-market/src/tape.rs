//! Tape classification: a pure function of two consecutive ticks.

use fulcrum_core::{Tape, TapeDirection, TapeStatus, TapeType, Tick, Volume};

/// Classify the business carried by `tick` against the previous tick of the
/// same instrument.
///
/// On the first tick of a session the cumulative session volume counts as
/// the delta and the interest change is measured against the pre-session
/// open interest.
#[must_use]
pub fn classify(tick: &Tick, previous: Option<&Tick>) -> Tape {
    let (volume_delta, interest_delta) = match previous {
        Some(prev) => (
            tick.volume - prev.volume,
            tick.open_interest - prev.open_interest,
        ),
        None => (tick.volume, tick.open_interest - tick.pre_open_interest),
    };
    let kind = derive_kind(volume_delta, interest_delta);
    let direction = derive_direction(tick, previous);
    Tape {
        kind,
        direction,
        status: TapeStatus::from_parts(kind, direction),
        volume_delta,
        interest_delta,
    }
}

/// Position-change intent from the (volume, interest) deltas.
///
/// Interest up by exactly the traded volume means both counterparties
/// opened; interest down matching the volume means both closed. Anything
/// else is a one-sided open/close, or pure turnover when interest held.
fn derive_kind(volume_delta: Volume, interest_delta: f64) -> TapeType {
    if interest_delta > 0.0 {
        if volume_delta as f64 == interest_delta {
            TapeType::DualOpen
        } else {
            TapeType::Open
        }
    } else if interest_delta < 0.0 {
        if volume_delta as f64 + interest_delta == 0.0 {
            TapeType::DualClose
        } else {
            TapeType::Close
        }
    } else if volume_delta > 0 {
        TapeType::Turnover
    } else {
        TapeType::NoDeal
    }
}

/// Aggressor direction, probing the books from strongest to weakest signal.
///
/// A missing best ask behaves like +inf and a missing best bid like -inf,
/// so absent levels never satisfy their comparison and the cascade falls
/// through naturally.
fn derive_direction(tick: &Tick, previous: Option<&Tick>) -> TapeDirection {
    let last = tick.last;
    let Some(prev) = previous else {
        if tick.best_ask().is_some_and(|ask| last >= ask) {
            return TapeDirection::Up;
        }
        if tick.best_bid().is_some_and(|bid| last <= bid) {
            return TapeDirection::Down;
        }
        if let Some(pre_close) = tick.pre_close {
            if last > pre_close {
                return TapeDirection::Up;
            }
            if last < pre_close {
                return TapeDirection::Down;
            }
        }
        return TapeDirection::Neutral;
    };

    if prev.best_ask().is_some_and(|ask| last >= ask) {
        return TapeDirection::Up;
    }
    if prev.best_bid().is_some_and(|bid| last <= bid) {
        return TapeDirection::Down;
    }
    if tick.best_ask().is_some_and(|ask| last >= ask) {
        return TapeDirection::Up;
    }
    if tick.best_bid().is_some_and(|bid| last <= bid) {
        return TapeDirection::Down;
    }
    if last > prev.last {
        return TapeDirection::Up;
    }
    if last < prev.last {
        return TapeDirection::Down;
    }
    let crossed_up = match (tick.best_bid(), prev.best_ask()) {
        (Some(bid), Some(ask)) => bid >= ask,
        _ => false,
    };
    if crossed_up {
        return TapeDirection::Up;
    }
    let crossed_down = match (tick.best_ask(), prev.best_bid()) {
        (Some(ask), Some(bid)) => ask <= bid,
        _ => false,
    };
    if crossed_down {
        return TapeDirection::Down;
    }
    TapeDirection::Neutral
}
