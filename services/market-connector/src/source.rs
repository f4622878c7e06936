//! The connector trait every market data source implements (§4.8).

use async_trait::async_trait;
use tokio::sync::mpsc;

use common::market::{Interval, MarketData, OhlcvBar};
use common::{Symbol, Ts};

use crate::error::SourceResult;

/// A single upstream market data connection: quotes, history, and a push
/// subscription. Implementations wrap a specific exchange/vendor feed;
/// this crate is agnostic to the wire protocol underneath.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Stable name used in logs, metrics, and [`crate::error::ManagerError`].
    fn name(&self) -> &str;

    /// Latest quote for each requested symbol. Implementations should
    /// return as many as are available rather than failing the whole
    /// batch over one bad symbol.
    async fn get_quotes(&self, symbols: &[Symbol]) -> SourceResult<Vec<MarketData>>;

    /// OHLCV history for `symbol` at `interval`, ascending by timestamp,
    /// over `[from, to]`.
    async fn get_history(
        &self,
        symbol: Symbol,
        interval: Interval,
        from: Ts,
        to: Ts,
    ) -> SourceResult<Vec<OhlcvBar>>;

    /// Subscribe once to `symbol`'s live feed; every update the
    /// connector receives afterward is pushed onto `sink`. Called at
    /// most once per `(symbol, connector)` pair by the subscription hub,
    /// which fans a single upstream subscription out to any number of
    /// local callbacks.
    async fn subscribe(&self, symbol: Symbol, sink: mpsc::Sender<MarketData>) -> SourceResult<()>;

    /// Tear down the subscription established by [`Self::subscribe`].
    async fn unsubscribe(&self, symbol: Symbol) -> SourceResult<()>;
}
