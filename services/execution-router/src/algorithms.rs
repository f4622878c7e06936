//! Execution algorithms (§4.6): each produces a schedule of child order
//! quantities for a parent order. TWAP/VWAP/`ImpactMin` compute their whole
//! schedule up front; POV/Adaptive are driven slice-by-slice since they
//! react to live market observations.

use common::Qty;
use rand::Rng;

use crate::error::{ExecutionError, ExecutionResult};

/// Supplies the per-slice volume fraction VWAP allocates against. A
/// fraction vector always sums to 1.0 (§9 decision: `VolumeProfileSource`).
pub trait VolumeProfileSource {
    /// `slices` fractions summing to 1.0.
    fn profile(&self, slices: usize) -> Vec<f64>;
}

/// Equal-weighted slices; the default when no historical curve is on hand.
pub struct UniformProfile;

impl VolumeProfileSource for UniformProfile {
    fn profile(&self, slices: usize) -> Vec<f64> {
        let slices = slices.max(1);
        vec![1.0 / slices as f64; slices]
    }
}

/// A caller-supplied fraction vector, e.g. sourced from the historical
/// store's intraday volume curve.
pub struct HistoricalProfile(pub Vec<f64>);

impl VolumeProfileSource for HistoricalProfile {
    fn profile(&self, _slices: usize) -> Vec<f64> {
        self.0.clone()
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// TWAP (§4.6): `slice_qty = ceil(parent.qty / slices)`, with the last
/// slice absorbing whatever remains so the schedule sums to exactly
/// `parent_qty`. Pair with one submission every `duration / slices`.
pub fn twap_slices(parent_qty: Qty, slices: u32) -> ExecutionResult<Vec<Qty>> {
    if slices == 0 {
        return Err(ExecutionError::AlgorithmExecutionFailed { reason: "twap: slices must be > 0".into() });
    }
    let slice_qty = ceil_div(parent_qty.as_i64(), i64::from(slices));
    let mut remaining = parent_qty.as_i64();
    let mut out = Vec::with_capacity(slices as usize);
    for i in 0..slices {
        let qty = if i + 1 == slices { remaining } else { slice_qty.min(remaining) };
        out.push(Qty::from_i64(qty.max(0)));
        remaining -= qty;
    }
    Ok(out)
}

/// VWAP (§4.6): child `i` quantity = `round(parent.qty * profile[i])`. The
/// final slice is adjusted so the schedule's total equals `parent_qty`
/// exactly, since independently rounded fractions otherwise drift by a
/// tick or two.
pub fn vwap_slices(parent_qty: Qty, profile: &[f64]) -> ExecutionResult<Vec<Qty>> {
    if profile.is_empty() {
        return Err(ExecutionError::AlgorithmExecutionFailed { reason: "vwap: empty profile".into() });
    }
    let total = parent_qty.as_i64();
    let mut out: Vec<i64> = profile
        .iter()
        .map(|frac| (total as f64 * frac).round() as i64)
        .collect();
    let drift = total - out.iter().sum::<i64>();
    if let Some(last) = out.last_mut() {
        *last += drift;
    }
    Ok(out.into_iter().map(|q| Qty::from_i64(q.max(0))).collect())
}

/// `ImpactMin` (§4.6): uniform split with `+/- randomize * slice_qty`
/// jitter per slice; slice count scales `*1.5` above 0.7 volatility and
/// `*0.7` below 0.3, floored at 2 slices.
pub fn impact_min_slices(parent_qty: Qty, slices: u32, randomize: f64, volatility: f64) -> ExecutionResult<Vec<Qty>> {
    let scaled = if volatility > 0.7 {
        (f64::from(slices) * 1.5).round() as u32
    } else if volatility < 0.3 {
        (f64::from(slices) * 0.7).round() as u32
    } else {
        slices
    }
    .max(2);

    let base = twap_slices(parent_qty, scaled)?;
    let mut rng = rand::thread_rng();
    let total = parent_qty.as_i64();
    let mut out: Vec<i64> = base
        .iter()
        .map(|q| {
            let jitter = if randomize > 0.0 {
                rng.gen_range(-randomize..=randomize) * q.as_i64() as f64
            } else {
                0.0
            };
            (q.as_i64() as f64 + jitter).round() as i64
        })
        .collect();
    let drift = total - out.iter().sum::<i64>();
    if let Some(last) = out.last_mut() {
        *last += drift;
    }
    Ok(out.into_iter().map(|q| Qty::from_i64(q.max(0))).collect())
}

/// POV (§4.6) driver: each check interval, the caller reports observed
/// market volume and elapsed time; the scheduler returns the next child
/// quantity (or `None` once the parent is filled or `max_duration`
/// elapses).
pub struct PovScheduler {
    target_pct: f64,
    max_duration_secs: u64,
    remaining: i64,
}

impl PovScheduler {
    /// A POV scheduler targeting `target_pct` (e.g. 0.1 = 10%) of observed
    /// volume per interval, running for at most `max_duration_secs`.
    #[must_use]
    pub fn new(parent_qty: Qty, target_pct: f64, max_duration_secs: u64) -> Self {
        Self { target_pct, max_duration_secs, remaining: parent_qty.as_i64() }
    }

    /// Remaining unscheduled quantity.
    #[must_use]
    pub fn remaining(&self) -> Qty {
        Qty::from_i64(self.remaining)
    }

    /// The next child quantity given `observed_volume` over the last
    /// interval and `elapsed_secs` since the parent started.
    pub fn next_slice(&mut self, observed_volume: Qty, elapsed_secs: u64) -> Option<Qty> {
        if self.remaining <= 0 || elapsed_secs >= self.max_duration_secs {
            return None;
        }
        let raw = (observed_volume.as_i64() as f64 * self.target_pct).round() as i64;
        let qty = raw.clamp(0, self.remaining);
        if qty == 0 {
            return None;
        }
        self.remaining -= qty;
        Some(Qty::from_i64(qty))
    }
}

/// Adaptive (§4.6) driver: starts from an even `parent.qty / initial`
/// baseline and rescales each interval by observed price/volume
/// deltas relative to the side the parent is trading.
pub struct AdaptiveScheduler {
    base_slice: f64,
    remaining: i64,
}

impl AdaptiveScheduler {
    /// `sliceQty = parent.qty / initial_slices`.
    #[must_use]
    pub fn new(parent_qty: Qty, initial_slices: u32) -> Self {
        let initial_slices = initial_slices.max(1);
        Self {
            base_slice: parent_qty.as_i64() as f64 / f64::from(initial_slices),
            remaining: parent_qty.as_i64(),
        }
    }

    /// Remaining unscheduled quantity.
    #[must_use]
    pub fn remaining(&self) -> Qty {
        Qty::from_i64(self.remaining)
    }

    /// Next child quantity given the fractional price move since the last
    /// interval (`delta_price`, positive = favorable to the order) and the
    /// fractional volume move (`delta_volume`).
    pub fn next_slice(&mut self, delta_price: f64, delta_volume: f64) -> Option<Qty> {
        if self.remaining <= 0 {
            return None;
        }
        let price_factor = if delta_price >= 0.0 {
            1.0 + delta_price.abs()
        } else {
            1.0 - 0.5 * delta_price.abs()
        };
        let volume_factor = 1.0 + 0.5 * delta_volume;
        let scaled = self.base_slice * price_factor * volume_factor;
        let qty = (scaled.round() as i64).clamp(1, self.remaining);
        self.remaining -= qty;
        Some(Qty::from_i64(qty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twap_splits_evenly_and_sums_to_parent() {
        let slices = twap_slices(Qty::from_units(10), 3).unwrap();
        assert_eq!(slices.len(), 3);
        let sum: i64 = slices.iter().map(|q| q.as_i64()).sum();
        assert_eq!(sum, Qty::from_units(10).as_i64());
    }

    #[test]
    fn twap_rejects_zero_slices() {
        assert!(twap_slices(Qty::from_units(10), 0).is_err());
    }

    #[test]
    fn vwap_sums_exactly_to_parent_despite_rounding() {
        let profile = UniformProfile.profile(3);
        let slices = vwap_slices(Qty::from_units(10), &profile).unwrap();
        let sum: i64 = slices.iter().map(|q| q.as_i64()).sum();
        assert_eq!(sum, Qty::from_units(10).as_i64());
    }

    #[test]
    fn impact_min_scales_slice_count_with_volatility() {
        let high_vol = impact_min_slices(Qty::from_units(100), 4, 0.0, 0.9).unwrap();
        let low_vol = impact_min_slices(Qty::from_units(100), 4, 0.0, 0.1).unwrap();
        assert_eq!(high_vol.len(), 6);
        assert_eq!(low_vol.len(), 3);
    }

    #[test]
    fn impact_min_floors_at_two_slices() {
        let slices = impact_min_slices(Qty::from_units(100), 1, 0.0, 0.1).unwrap();
        assert!(slices.len() >= 2);
    }

    #[test]
    fn pov_terminates_once_duration_elapses() {
        let mut pov = PovScheduler::new(Qty::from_units(100), 0.1, 60);
        assert!(pov.next_slice(Qty::from_units(50), 10).is_some());
        assert!(pov.next_slice(Qty::from_units(50), 61).is_none());
    }

    #[test]
    fn pov_clamps_to_remaining_quantity() {
        let mut pov = PovScheduler::new(Qty::from_units(5), 0.5, 60);
        let slice = pov.next_slice(Qty::from_units(100), 0).unwrap();
        assert_eq!(slice, Qty::from_units(5));
        assert_eq!(pov.remaining(), Qty::ZERO);
    }

    #[test]
    fn adaptive_scales_up_on_favorable_price_move() {
        let mut favorable = AdaptiveScheduler::new(Qty::from_units(100), 10);
        let mut flat = AdaptiveScheduler::new(Qty::from_units(100), 10);
        let fav = favorable.next_slice(0.2, 0.0).unwrap();
        let base = flat.next_slice(0.0, 0.0).unwrap();
        assert!(fav.as_i64() > base.as_i64());
    }

    #[test]
    fn adaptive_never_exceeds_remaining() {
        let mut sched = AdaptiveScheduler::new(Qty::from_units(1), 1);
        let slice = sched.next_slice(5.0, 5.0).unwrap();
        assert_eq!(slice, Qty::from_units(1));
        assert!(sched.next_slice(0.0, 0.0).is_none());
    }
}
