//! Historical store (§4.10): append-with-idempotent-upsert persistence
//! for ticks, bars, and indicator values, backed by SQLite. Schema
//! creation happens on first use of a fresh connection.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use common::market::{ExchangeId, Interval, IndicatorValue, MarketData, OhlcvBar};
use common::{Px, Qty, Symbol, Ts};

use crate::error::StoreResult;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS ticks (
    symbol INTEGER NOT NULL,
    exchange INTEGER NOT NULL,
    timestamp_ns INTEGER NOT NULL,
    last INTEGER NOT NULL,
    bid INTEGER NOT NULL,
    ask INTEGER NOT NULL,
    bid_size INTEGER NOT NULL,
    ask_size INTEGER NOT NULL,
    open INTEGER NOT NULL,
    high INTEGER NOT NULL,
    low INTEGER NOT NULL,
    close INTEGER NOT NULL,
    volume INTEGER NOT NULL,
    UNIQUE(symbol, exchange, timestamp_ns)
);
CREATE INDEX IF NOT EXISTS idx_ticks_range ON ticks(symbol, exchange, timestamp_ns);

CREATE TABLE IF NOT EXISTS bars (
    symbol INTEGER NOT NULL,
    interval TEXT NOT NULL,
    timestamp_ns INTEGER NOT NULL,
    open INTEGER NOT NULL,
    high INTEGER NOT NULL,
    low INTEGER NOT NULL,
    close INTEGER NOT NULL,
    volume INTEGER NOT NULL,
    UNIQUE(symbol, interval, timestamp_ns)
);
CREATE INDEX IF NOT EXISTS idx_bars_range ON bars(symbol, interval, timestamp_ns);

CREATE TABLE IF NOT EXISTS indicator_values (
    symbol INTEGER NOT NULL,
    indicator TEXT NOT NULL,
    timestamp_ns INTEGER NOT NULL,
    parameters TEXT NOT NULL,
    scalar REAL,
    components TEXT NOT NULL,
    UNIQUE(symbol, indicator, timestamp_ns)
);
CREATE INDEX IF NOT EXISTS idx_indicators_range ON indicator_values(symbol, indicator, timestamp_ns);
"#;

fn interval_to_str(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMin => "1m",
        Interval::FiveMin => "5m",
        Interval::FifteenMin => "15m",
        Interval::ThirtyMin => "30m",
        Interval::OneHour => "1h",
        Interval::OneDay => "1d",
        Interval::OneWeek => "1w",
        Interval::OneMonth => "1mo",
    }
}

fn str_to_interval(s: &str) -> Option<Interval> {
    Some(match s {
        "1m" => Interval::OneMin,
        "5m" => Interval::FiveMin,
        "15m" => Interval::FifteenMin,
        "30m" => Interval::ThirtyMin,
        "1h" => Interval::OneHour,
        "1d" => Interval::OneDay,
        "1w" => Interval::OneWeek,
        "1mo" => Interval::OneMonth,
        _ => return None,
    })
}

/// Parse an interval query parameter (`"1m"`, `"1d"`, `"1mo"`, ...) into an
/// [`Interval`], for callers outside this crate that accept the same
/// wire encoding this store uses for its `bars`/`indicator_values` tables.
#[must_use]
pub fn parse_interval(s: &str) -> Option<Interval> {
    str_to_interval(s)
}

/// SQLite-backed historical store for ticks, bars, and indicator values.
pub struct HistoricalStore {
    conn: Mutex<Connection>,
}

impl HistoricalStore {
    /// Open (creating if absent) the database at `path` and ensure the
    /// schema exists.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// An in-memory store, for tests and ephemeral callers.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Upsert one tick, keyed by `(symbol, exchange, timestamp)`.
    pub fn append_tick(&self, tick: &MarketData) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO ticks (symbol, exchange, timestamp_ns, last, bid, ask, bid_size, ask_size, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(symbol, exchange, timestamp_ns) DO UPDATE SET
                 last = excluded.last, bid = excluded.bid, ask = excluded.ask,
                 bid_size = excluded.bid_size, ask_size = excluded.ask_size,
                 open = excluded.open, high = excluded.high, low = excluded.low,
                 close = excluded.close, volume = excluded.volume",
            params![
                tick.symbol.0,
                tick.exchange.0,
                tick.timestamp.as_nanos() as i64,
                tick.last.as_i64(),
                tick.bid.as_i64(),
                tick.ask.as_i64(),
                tick.bid_size.as_i64(),
                tick.ask_size.as_i64(),
                tick.open.as_i64(),
                tick.high.as_i64(),
                tick.low.as_i64(),
                tick.close.as_i64(),
                tick.volume.as_i64(),
            ],
        )?;
        Ok(())
    }

    /// Upsert one bar, keyed by `(symbol, interval, timestamp)`.
    pub fn append_bar(&self, bar: &OhlcvBar) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO bars (symbol, interval, timestamp_ns, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(symbol, interval, timestamp_ns) DO UPDATE SET
                 open = excluded.open, high = excluded.high, low = excluded.low,
                 close = excluded.close, volume = excluded.volume",
            params![
                bar.symbol.0,
                interval_to_str(bar.interval),
                bar.timestamp.as_nanos() as i64,
                bar.open.as_i64(),
                bar.high.as_i64(),
                bar.low.as_i64(),
                bar.close.as_i64(),
                bar.volume.as_i64(),
            ],
        )?;
        Ok(())
    }

    /// Upsert one indicator value, keyed by `(symbol, indicator, timestamp)`.
    pub fn append_indicator(&self, value: &IndicatorValue) -> StoreResult<()> {
        let parameters = serde_json::to_string(&value.parameters).unwrap_or_default();
        let components = serde_json::to_string(&value.components).unwrap_or_default();
        self.conn.lock().execute(
            "INSERT INTO indicator_values (symbol, indicator, timestamp_ns, parameters, scalar, components)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(symbol, indicator, timestamp_ns) DO UPDATE SET
                 parameters = excluded.parameters, scalar = excluded.scalar, components = excluded.components",
            params![value.symbol.0, value.indicator, value.timestamp.as_nanos() as i64, parameters, value.scalar, components],
        )?;
        Ok(())
    }

    /// Ticks for `(symbol, exchange)` in `[from, to]`, ascending by
    /// timestamp.
    pub fn ticks_range(&self, symbol: Symbol, exchange: ExchangeId, from: Ts, to: Ts) -> StoreResult<Vec<MarketData>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp_ns, last, bid, ask, bid_size, ask_size, open, high, low, close, volume
             FROM ticks WHERE symbol = ?1 AND exchange = ?2 AND timestamp_ns BETWEEN ?3 AND ?4
             ORDER BY timestamp_ns ASC",
        )?;
        let rows = stmt.query_map(params![symbol.0, exchange.0, from.as_nanos() as i64, to.as_nanos() as i64], |row| {
            Ok(MarketData {
                symbol,
                exchange,
                timestamp: Ts::from_nanos(row.get::<_, i64>(0)? as u64),
                last: Px::from_i64(row.get(1)?),
                bid: Px::from_i64(row.get(2)?),
                ask: Px::from_i64(row.get(3)?),
                bid_size: Qty::from_i64(row.get(4)?),
                ask_size: Qty::from_i64(row.get(5)?),
                open: Px::from_i64(row.get(6)?),
                high: Px::from_i64(row.get(7)?),
                low: Px::from_i64(row.get(8)?),
                close: Px::from_i64(row.get(9)?),
                volume: Qty::from_i64(row.get(10)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The most recent `n` ticks for `(symbol, exchange)`, in ascending
    /// order.
    pub fn latest_ticks(&self, symbol: Symbol, exchange: ExchangeId, n: usize) -> StoreResult<Vec<MarketData>> {
        let mut ticks = self.ticks_range(symbol, exchange, Ts::from_nanos(0), Ts::from_nanos(u64::MAX))?;
        if ticks.len() > n {
            ticks.drain(..ticks.len() - n);
        }
        Ok(ticks)
    }

    /// Bars for `(symbol, interval)` in `[from, to]`, ascending by
    /// timestamp.
    pub fn bars_range(&self, symbol: Symbol, interval: Interval, from: Ts, to: Ts) -> StoreResult<Vec<OhlcvBar>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp_ns, open, high, low, close, volume FROM bars
             WHERE symbol = ?1 AND interval = ?2 AND timestamp_ns BETWEEN ?3 AND ?4
             ORDER BY timestamp_ns ASC",
        )?;
        let rows = stmt.query_map(
            params![symbol.0, interval_to_str(interval), from.as_nanos() as i64, to.as_nanos() as i64],
            |row| {
                Ok(OhlcvBar {
                    symbol,
                    interval,
                    timestamp: Ts::from_nanos(row.get::<_, i64>(0)? as u64),
                    open: Px::from_i64(row.get(1)?),
                    high: Px::from_i64(row.get(2)?),
                    low: Px::from_i64(row.get(3)?),
                    close: Px::from_i64(row.get(4)?),
                    volume: Qty::from_i64(row.get(5)?),
                })
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The most recent `n` bars for `(symbol, interval)`, in ascending
    /// order.
    pub fn latest_bars(&self, symbol: Symbol, interval: Interval, n: usize) -> StoreResult<Vec<OhlcvBar>> {
        let mut bars = self.bars_range(symbol, interval, Ts::from_nanos(0), Ts::from_nanos(u64::MAX))?;
        if bars.len() > n {
            bars.drain(..bars.len() - n);
        }
        Ok(bars)
    }

    /// Indicator values for `(symbol, indicator)` in `[from, to]`,
    /// ascending by timestamp.
    pub fn indicator_range(
        &self,
        symbol: Symbol,
        indicator: &str,
        from: Ts,
        to: Ts,
    ) -> StoreResult<Vec<IndicatorValue>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp_ns, parameters, scalar, components FROM indicator_values
             WHERE symbol = ?1 AND indicator = ?2 AND timestamp_ns BETWEEN ?3 AND ?4
             ORDER BY timestamp_ns ASC",
        )?;
        let rows = stmt.query_map(params![symbol.0, indicator, from.as_nanos() as i64, to.as_nanos() as i64], |row| {
            let parameters_json: String = row.get(1)?;
            let components_json: String = row.get(3)?;
            Ok(IndicatorValue {
                symbol,
                indicator: indicator.to_string(),
                parameters: serde_json::from_str(&parameters_json).unwrap_or_default(),
                timestamp: Ts::from_nanos(row.get::<_, i64>(0)? as u64),
                scalar: row.get(2)?,
                components: serde_json::from_str(&components_json).unwrap_or_default(),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Whether the schema considers `interval`'s textual encoding valid;
    /// exposed mainly so callers can validate input before round-tripping
    /// through SQLite.
    #[must_use]
    pub fn interval_known(s: &str) -> bool {
        str_to_interval(s).is_some()
    }

    /// Row count across all three tables, for diagnostics and tests.
    pub fn total_rows(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM ticks) + (SELECT COUNT(*) FROM bars) + (SELECT COUNT(*) FROM indicator_values)",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(symbol: Symbol, ts: u64) -> MarketData {
        MarketData {
            symbol,
            exchange: ExchangeId(1),
            timestamp: Ts::from_nanos(ts),
            last: Px::new(100.0),
            bid: Px::new(99.5),
            ask: Px::new(100.5),
            bid_size: Qty::from_units(1),
            ask_size: Qty::from_units(1),
            open: Px::new(100.0),
            high: Px::new(100.0),
            low: Px::new(100.0),
            close: Px::new(100.0),
            volume: Qty::from_units(10),
        }
    }

    #[test]
    fn append_tick_is_idempotent_on_same_key() {
        let store = HistoricalStore::open_in_memory().unwrap();
        store.append_tick(&tick(Symbol(1), 100)).unwrap();
        store.append_tick(&tick(Symbol(1), 100)).unwrap();
        assert_eq!(store.total_rows().unwrap(), 1);
    }

    #[test]
    fn ticks_range_is_ascending_by_timestamp() {
        let store = HistoricalStore::open_in_memory().unwrap();
        store.append_tick(&tick(Symbol(1), 300)).unwrap();
        store.append_tick(&tick(Symbol(1), 100)).unwrap();
        store.append_tick(&tick(Symbol(1), 200)).unwrap();

        let rows = store.ticks_range(Symbol(1), ExchangeId(1), Ts::from_nanos(0), Ts::from_nanos(u64::MAX)).unwrap();
        let stamps: Vec<u64> = rows.iter().map(|t| t.timestamp.as_nanos()).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn latest_n_returns_ascending_tail() {
        let store = HistoricalStore::open_in_memory().unwrap();
        for ts in [100, 200, 300, 400] {
            store.append_tick(&tick(Symbol(1), ts)).unwrap();
        }
        let rows = store.latest_ticks(Symbol(1), ExchangeId(1), 2).unwrap();
        let stamps: Vec<u64> = rows.iter().map(|t| t.timestamp.as_nanos()).collect();
        assert_eq!(stamps, vec![300, 400]);
    }

    #[test]
    fn bar_upsert_round_trips() {
        let store = HistoricalStore::open_in_memory().unwrap();
        let bar = OhlcvBar::new(
            Symbol(1),
            Interval::OneMin,
            Ts::from_nanos(100),
            Px::new(10.0),
            Px::new(12.0),
            Px::new(9.0),
            Px::new(11.0),
            Qty::from_units(5),
        )
        .unwrap();
        store.append_bar(&bar).unwrap();
        let rows = store.bars_range(Symbol(1), Interval::OneMin, Ts::from_nanos(0), Ts::from_nanos(u64::MAX)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, Px::new(11.0));
    }

    #[test]
    fn indicator_value_round_trips_parameters_and_components() {
        let store = HistoricalStore::open_in_memory().unwrap();
        let value = IndicatorValue {
            symbol: Symbol(1),
            indicator: "ema".to_string(),
            parameters: vec![("period".to_string(), "14".to_string())],
            timestamp: Ts::from_nanos(100),
            scalar: Some(101.5),
            components: vec![("line".to_string(), 101.5)],
        };
        store.append_indicator(&value).unwrap();
        let rows = store.indicator_range(Symbol(1), "ema", Ts::from_nanos(0), Ts::from_nanos(u64::MAX)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parameters, vec![("period".to_string(), "14".to_string())]);
        assert_eq!(rows[0].scalar, Some(101.5));
    }
}
