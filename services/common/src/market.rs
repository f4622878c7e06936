//! Market data model shared by the connector, cache, historical store, and
//! distribution crates.

use crate::types::{Px, Qty, Symbol, Ts};
use serde::{Deserialize, Serialize};

/// A single market data snapshot for `(symbol, exchange, timestamp)`.
///
/// `(symbol, exchange, timestamp)` tuples are idempotent: re-applying the
/// same tuple must not create a duplicate record anywhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Instrument.
    pub symbol: Symbol,
    /// Exchange identifier the quote originated from.
    pub exchange: ExchangeId,
    /// Authoritative event timestamp.
    pub timestamp: Ts,
    /// Last traded price.
    pub last: Px,
    /// Best bid price.
    pub bid: Px,
    /// Best ask price.
    pub ask: Px,
    /// Size at best bid.
    pub bid_size: Qty,
    /// Size at best ask.
    pub ask_size: Qty,
    /// Session open.
    pub open: Px,
    /// Session high.
    pub high: Px,
    /// Session low.
    pub low: Px,
    /// Session close (previous bar's close, or last for the live tick).
    pub close: Px,
    /// Cumulative session volume.
    pub volume: Qty,
}

impl MarketData {
    /// Identity key used for idempotent upserts.
    #[must_use]
    pub const fn key(&self) -> (Symbol, ExchangeId, Ts) {
        (self.symbol, self.exchange, self.timestamp)
    }

    /// Mid of best bid/ask.
    #[must_use]
    pub fn mid(&self) -> Px {
        Px::from_i64((self.bid.as_i64() + self.ask.as_i64()) / 2)
    }
}

/// Exchange identifier. Kept as a small interned id rather than a string so
/// that `MarketData` stays `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub u16);

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// One minute.
    OneMin,
    /// Five minutes.
    FiveMin,
    /// Fifteen minutes.
    FifteenMin,
    /// Thirty minutes.
    ThirtyMin,
    /// One hour.
    OneHour,
    /// One day.
    OneDay,
    /// One week.
    OneWeek,
    /// One month.
    OneMonth,
}

/// An OHLCV bar. Invariant: `low <= min(open, close) <= max(open, close) <=
/// high`, `volume >= 0` — checked by [`OhlcvBar::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Instrument.
    pub symbol: Symbol,
    /// Bar interval.
    pub interval: Interval,
    /// Bar open (start) timestamp.
    pub timestamp: Ts,
    /// Open price.
    pub open: Px,
    /// High price.
    pub high: Px,
    /// Low price.
    pub low: Px,
    /// Close price.
    pub close: Px,
    /// Volume traded during the bar.
    pub volume: Qty,
}

impl OhlcvBar {
    /// Construct a bar, rejecting one that violates the OHLC invariant.
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        timestamp: Ts,
        open: Px,
        high: Px,
        low: Px,
        close: Px,
        volume: Qty,
    ) -> Result<Self, String> {
        let body_max = open.max(close);
        let body_min = open.min(close);
        if low > body_min || body_max > high {
            return Err(format!(
                "bar invariant violated: low={low} open={open} close={close} high={high}"
            ));
        }
        if volume.as_i64() < 0 {
            return Err("bar volume must be non-negative".to_string());
        }
        Ok(Self {
            symbol,
            interval,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// A computed indicator value: a deterministic function of a bar window and
/// a set of parameters. `name`/`params` together identify the indicator
/// instance; the registry that computes these values lives outside this
/// crate (concrete technical-indicator math is pluggable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    /// Instrument.
    pub symbol: Symbol,
    /// Indicator name, e.g. `"ema"`, `"rsi"`.
    pub indicator: String,
    /// Parameters used to compute this value, e.g. `period=14`.
    pub parameters: Vec<(String, String)>,
    /// Timestamp of the bar this value was computed for.
    pub timestamp: Ts,
    /// Scalar output, when the indicator has a single value.
    pub scalar: Option<f64>,
    /// Named components, for multi-output indicators (e.g. MACD line/signal).
    pub components: Vec<(String, f64)>,
}

/// `(portfolio id, symbol) -> position` snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Owning portfolio.
    pub portfolio_id: uuid::Uuid,
    /// Instrument.
    pub symbol: Symbol,
    /// Signed quantity held (negative = short).
    pub quantity: Qty,
    /// Volume-weighted average entry price.
    pub average_price: Px,
    /// Last observed market price, used for unrealized PnL.
    pub last_price: Px,
    /// Realized PnL, in price ticks.
    pub realized_pnl: i64,
    /// Unrealized PnL at `last_price`, in price ticks.
    pub unrealized_pnl: i64,
}

impl Position {
    /// A flat (no holding) position for a new `(portfolio, symbol)` pair.
    #[must_use]
    pub const fn flat(portfolio_id: uuid::Uuid, symbol: Symbol) -> Self {
        Self {
            portfolio_id,
            symbol,
            quantity: Qty::ZERO,
            average_price: Px::ZERO,
            last_price: Px::ZERO,
            realized_pnl: 0,
            unrealized_pnl: 0,
        }
    }

    /// Recompute unrealized PnL against a fresh last price.
    pub fn mark(&mut self, last_price: Px) {
        self.last_price = last_price;
        let diff = last_price.as_i64() - self.average_price.as_i64();
        self.unrealized_pnl = diff * self.quantity.as_i64() / crate::types::SCALE_4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> Symbol {
        Symbol(1)
    }

    #[test]
    fn bar_rejects_inverted_high_low() {
        let bad = OhlcvBar::new(
            sym(),
            Interval::OneMin,
            Ts::from_millis(0),
            Px::new(10.0),
            Px::new(9.0), // high below open
            Px::new(8.0),
            Px::new(9.5),
            Qty::from_units(1),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn bar_accepts_consistent_ohlc() {
        let ok = OhlcvBar::new(
            sym(),
            Interval::OneMin,
            Ts::from_millis(0),
            Px::new(10.0),
            Px::new(12.0),
            Px::new(9.0),
            Px::new(11.0),
            Qty::from_units(100),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn market_data_key_is_idempotent_identity() {
        let m1 = MarketData {
            symbol: sym(),
            exchange: ExchangeId(1),
            timestamp: Ts::from_millis(1000),
            last: Px::new(1.0),
            bid: Px::new(0.99),
            ask: Px::new(1.01),
            bid_size: Qty::from_units(1),
            ask_size: Qty::from_units(1),
            open: Px::new(1.0),
            high: Px::new(1.0),
            low: Px::new(1.0),
            close: Px::new(1.0),
            volume: Qty::ZERO,
        };
        let m2 = m1;
        assert_eq!(m1.key(), m2.key());
    }

    #[test]
    fn position_mark_updates_unrealized_pnl() {
        let mut pos = Position::flat(uuid::Uuid::nil(), sym());
        pos.quantity = Qty::from_units(10);
        pos.average_price = Px::new(100.0);
        pos.mark(Px::new(110.0));
        // real pnl = 10 units * 10.0 price diff = 100; stored scaled by SCALE_4.
        assert_eq!(pos.unrealized_pnl, 100 * crate::types::SCALE_4);
    }
}
