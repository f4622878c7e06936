//! Fixed-point value types shared by every component in the workspace.
//!
//! All prices and quantities are carried as scaled `i64` ticks rather than
//! floats so that order state, fills, and risk limits compare exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale factor for 4-decimal fixed-point arithmetic (`Px`, `Qty`).
pub const SCALE_4: i64 = 10_000;

/// Interned symbol id. Symbol→string mapping lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub u32);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYM{}", self.0)
    }
}

/// Order/quote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Bid / buy side.
    Bid,
    /// Ask / sell side.
    Ask,
}

impl Side {
    /// The opposite side, used by OCO/bracket cancellation and hedging.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

/// Fixed-point price, stored as ticks of `1 / SCALE_4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Px(i64);

impl Px {
    /// Zero price.
    pub const ZERO: Self = Self(0);

    const MAX_SAFE: f64 = (i64::MAX / SCALE_4) as f64;
    const MIN_SAFE: f64 = (i64::MIN / SCALE_4) as f64;

    /// Build from a floating-point price, clamped to what fits in `i64` ticks.
    #[must_use]
    pub fn new(price: f64) -> Self {
        let clamped = price.clamp(Self::MIN_SAFE, Self::MAX_SAFE);
        Self((clamped * SCALE_4 as f64).round() as i64)
    }

    /// Build directly from raw ticks.
    #[must_use]
    pub const fn from_i64(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Raw tick value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Convert to `f64` for display/reporting; never used for order math.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE_4 as f64
    }

    /// Checked addition; used for limit price adjustments.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Checked subtraction.
    #[must_use]
    pub const fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }

    /// Notional value of `self` at the given quantity, in scaled ticks.
    #[must_use]
    pub const fn mul_qty(self, qty: Qty) -> i64 {
        (self.0 * qty.as_i64()) / SCALE_4
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE_4;
        let frac = (self.0 % SCALE_4).abs();
        write!(f, "{whole}.{frac:04}")
    }
}

/// Fixed-point quantity, stored as ticks of `1 / SCALE_4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qty(i64);

impl Qty {
    /// Zero quantity.
    pub const ZERO: Self = Self(0);

    /// Build from a floating-point quantity.
    #[must_use]
    pub fn new(qty: f64) -> Self {
        Self((qty * SCALE_4 as f64).round() as i64)
    }

    /// Build directly from raw ticks.
    #[must_use]
    pub const fn from_i64(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Build from a whole-unit count (no fractional part).
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units * SCALE_4)
    }

    /// Raw tick value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Convert to `f64` for display/reporting.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE_4 as f64
    }

    /// True if zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Checked subtraction; saturates at zero since filled/remaining
    /// quantities must never go negative.
    #[must_use]
    pub const fn sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Self(0) } else { Self(diff) }
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE_4;
        let frac = (self.0 % SCALE_4).abs();
        write!(f, "{whole}.{frac:04}")
    }
}

/// Nanosecond timestamp since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ts(pub u64);

impl Ts {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(nanos as u64)
    }

    /// Build from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Build from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Raw nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Milliseconds, truncated.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_round_trips_through_display() {
        let p = Px::new(123.4567);
        assert_eq!(p.as_i64(), 1_234_567);
        assert_eq!(p.to_string(), "123.4567");
    }

    #[test]
    fn qty_sub_saturates_at_zero() {
        let a = Qty::from_units(5);
        let b = Qty::from_units(8);
        assert_eq!(a.sub(b), Qty::ZERO);
    }

    #[test]
    fn px_mul_qty_computes_notional() {
        let price = Px::from_i64(2 * SCALE_4);
        let qty = Qty::from_units(3);
        assert_eq!(price.mul_qty(qty), 6 * SCALE_4);
    }

    #[test]
    fn side_opposite_is_involutive() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite().opposite(), Side::Ask);
    }

    #[test]
    fn ts_millis_round_trip() {
        let t = Ts::from_millis(1_700_000_000);
        assert_eq!(t.as_millis(), 1_700_000_000);
    }
}
