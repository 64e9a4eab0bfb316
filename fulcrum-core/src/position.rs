//! Position accounting with the today/history split used by the exchanges.

use serde::{Deserialize, Serialize};

use crate::{Offset, Side, Symbol, Volume};

/// One bucket of lots plus the portion earmarked by outstanding closes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PositionCell {
    pub position: Volume,
    pub frozen: Volume,
}

/// Long/short pair of cells.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePair {
    pub long: PositionCell,
    pub short: PositionCell,
}

impl SidePair {
    #[must_use]
    pub fn cell(&self, side: Side) -> &PositionCell {
        match side {
            Side::Long => &self.long,
            Side::Short => &self.short,
        }
    }

    pub fn cell_mut(&mut self, side: Side) -> &mut PositionCell {
        match side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        }
    }
}

/// Intended new lots from outstanding open orders not yet filled.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pending {
    pub long: Volume,
    pub short: Volume,
}

impl Pending {
    #[must_use]
    pub fn get(&self, side: Side) -> Volume {
        match side {
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut Volume {
        match side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        }
    }
}

/// Authoritative per-symbol position view.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Position {
    pub symbol: Symbol,
    pub today: SidePair,
    pub history: SidePair,
    pub pending: Pending,
}

impl Position {
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            today: SidePair::default(),
            history: SidePair::default(),
            pending: Pending::default(),
        }
    }

    /// True when no lots, frozen lots, or pending intent remain.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self == &Self::new(self.symbol.clone())
    }

    /// Total held lots on `side` across today and history.
    #[must_use]
    pub fn total(&self, side: Side) -> Volume {
        self.today.cell(side).position + self.history.cell(side).position
    }

    /// Apply a fill, dispatching on the order's offset.
    pub fn apply_trade(&mut self, side: Side, offset: Offset, volume: Volume) {
        match offset {
            Offset::Open => self.apply_open(side, volume),
            Offset::Close => self.apply_close(side, volume),
            Offset::CloseToday => self.apply_close_today(side, volume),
        }
    }

    /// An open fill builds today lots on its own side and consumes the
    /// pending intent reserved at submission.
    pub fn apply_open(&mut self, side: Side, volume: Volume) {
        self.today.cell_mut(side).position += volume;
        let pending = self.pending.get_mut(side);
        *pending = (*pending - volume).max(0);
    }

    /// A close fill consumes the opposite side, history lots first with
    /// overflow into today, repeating the same sequence for frozen lots.
    pub fn apply_close(&mut self, side: Side, volume: Volume) {
        let opposite = side.inverse();

        let history = self.history.cell_mut(opposite);
        let from_history = volume.min(history.position);
        history.position -= from_history;
        let overflow = volume - from_history;
        let today = self.today.cell_mut(opposite);
        today.position = (today.position - overflow).max(0);

        let history = self.history.cell_mut(opposite);
        let frozen_from_history = volume.min(history.frozen);
        history.frozen -= frozen_from_history;
        let frozen_overflow = volume - frozen_from_history;
        let today = self.today.cell_mut(opposite);
        today.frozen = (today.frozen - frozen_overflow).max(0);
    }

    /// A close-today fill touches only the opposite side's today bucket.
    pub fn apply_close_today(&mut self, side: Side, volume: Volume) {
        let today = self.today.cell_mut(side.inverse());
        today.position = (today.position - volume).max(0);
        today.frozen = (today.frozen - volume).max(0);
    }

    /// Reserve pending intent when an open order is accepted.
    pub fn record_pending(&mut self, side: Side, volume: Volume) {
        *self.pending.get_mut(side) += volume;
    }

    /// Release pending intent when an open order leaves the book.
    ///
    /// Callers pass the order's unfilled remainder; fills already reduced
    /// pending through [`Position::apply_open`].
    pub fn recover_pending(&mut self, side: Side, volume: Volume) {
        *self.pending.get_mut(side) -= volume;
    }

    /// Earmark opposite-side lots for an accepted close order.
    ///
    /// Plain closes target history (the exchange consumes history first);
    /// close-today targets today.
    pub fn freeze(&mut self, side: Side, offset: Offset, volume: Volume) {
        let target = self.freeze_target(side, offset);
        target.frozen += volume;
    }

    /// Release the earmark when a close order leaves the book, floored at 0.
    pub fn unfreeze(&mut self, side: Side, offset: Offset, volume: Volume) {
        let target = self.freeze_target(side, offset);
        target.frozen = (target.frozen - volume).max(0);
    }

    fn freeze_target(&mut self, side: Side, offset: Offset) -> &mut PositionCell {
        let opposite = side.inverse();
        match offset {
            Offset::CloseToday => self.today.cell_mut(opposite),
            _ => self.history.cell_mut(opposite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::new(Symbol::from("y2501.DCE"))
    }

    #[test]
    fn open_consumes_pending() {
        let mut pos = position();
        pos.record_pending(Side::Long, 3);
        pos.apply_open(Side::Long, 2);
        assert_eq!(pos.today.long.position, 2);
        assert_eq!(pos.pending.long, 1);
        pos.apply_open(Side::Long, 1);
        assert_eq!(pos.today.long.position, 3);
        assert_eq!(pos.pending.long, 0);
    }

    #[test]
    fn close_drains_history_before_today() {
        let mut pos = position();
        pos.history.short.position = 2;
        pos.today.short.position = 3;
        // A long close order consumes short lots.
        pos.apply_close(Side::Long, 4);
        assert_eq!(pos.history.short.position, 0);
        assert_eq!(pos.today.short.position, 1);
    }

    #[test]
    fn close_never_goes_negative() {
        let mut pos = position();
        pos.today.long.position = 1;
        pos.apply_close(Side::Short, 5);
        assert_eq!(pos.today.long.position, 0);
        assert_eq!(pos.history.long.position, 0);
    }

    #[test]
    fn close_today_only_touches_today() {
        let mut pos = position();
        pos.history.long.position = 2;
        pos.today.long.position = 2;
        pos.today.long.frozen = 2;
        pos.apply_close_today(Side::Short, 2);
        assert_eq!(pos.today.long.position, 0);
        assert_eq!(pos.today.long.frozen, 0);
        assert_eq!(pos.history.long.position, 2);
    }

    #[test]
    fn freeze_targets_follow_offset() {
        let mut pos = position();
        pos.freeze(Side::Long, Offset::Close, 2);
        assert_eq!(pos.history.short.frozen, 2);
        pos.freeze(Side::Long, Offset::CloseToday, 1);
        assert_eq!(pos.today.short.frozen, 1);
        pos.unfreeze(Side::Long, Offset::Close, 5);
        assert_eq!(pos.history.short.frozen, 0);
    }

    #[test]
    fn close_sequence_from_s3() {
        // submit-open-long(3), fill(2), fill(1), close-today(2), fill(2)
        let mut pos = position();
        pos.record_pending(Side::Long, 3);
        pos.apply_open(Side::Long, 2);
        assert_eq!((pos.today.long.position, pos.pending.long), (2, 1));
        pos.apply_open(Side::Long, 1);
        assert_eq!((pos.today.long.position, pos.pending.long), (3, 0));
        pos.freeze(Side::Short, Offset::CloseToday, 2);
        assert_eq!(pos.today.long.frozen, 2);
        pos.apply_close_today(Side::Short, 2);
        assert_eq!(pos.today.long.position, 1);
        assert_eq!(pos.today.long.frozen, 0);
    }
}
