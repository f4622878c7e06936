//! The 9 pre-trade checks, evaluated in the fixed order §4.3 mandates,
//! short-circuiting on the first failure.

use common::{Px, Ts};

use crate::error::{RiskError, RiskResult};
use crate::types::{LimitKind, OrderCandidate, PortfolioSnapshot, RiskProfile};

/// Everything a check needs beyond the candidate order and its profile:
/// the resulting position size if the order fills, the orders already
/// submitted by this strategy in the trailing minute, and the portfolio's
/// aggregate figures.
pub struct CheckContext {
    /// Signed position size that would result if `order` filled completely.
    pub resulting_position: i64,
    /// Orders already submitted by `order.strategy_id` in the last 60s.
    pub orders_last_minute: usize,
    /// Portfolio aggregate figures.
    pub portfolio: PortfolioSnapshot,
}

/// Run the 9 checks against `order` in fixed order, stopping at the first
/// one that fails. `order.price` and `order.qty` must already reflect the
/// candidate (no partial-fill adjustment happens here).
pub fn validate(order: &OrderCandidate, ctx: &CheckContext, profile: &RiskProfile) -> RiskResult<()> {
    let order_value = order.price.mul_qty(order.qty).abs();

    check(profile, LimitKind::OrderValue, order_value)?;
    check(profile, LimitKind::PositionSize, ctx.resulting_position.abs())?;
    check(profile, LimitKind::Drawdown, drawdown_bps(&ctx.portfolio))?;
    check(profile, LimitKind::Leverage, leverage_bps(&ctx.portfolio))?;
    check(
        profile,
        LimitKind::Concentration,
        concentration_bps(&ctx.portfolio, order_value),
    )?;
    check(
        profile,
        LimitKind::OrderRate,
        i64::try_from(ctx.orders_last_minute).unwrap_or(i64::MAX),
    )?;
    check(
        profile,
        LimitKind::Exposure,
        ctx.portfolio.gross_exposure + order_value,
    )?;
    check(profile, LimitKind::Var, value_at_risk(&ctx.portfolio))?;
    check(profile, LimitKind::Stress, stress_loss(&ctx.portfolio))?;

    Ok(())
}

/// A single limit check: passes if the kind has no configured limit, the
/// limit is disabled, or `observed <= limit.value`.
fn check(profile: &RiskProfile, kind: LimitKind, observed: i64) -> RiskResult<()> {
    let Some(limit) = profile.get(kind) else {
        return Ok(());
    };
    if !limit.enabled || observed <= limit.value {
        return Ok(());
    }
    Err(RiskError::LimitExceeded {
        kind,
        limit: limit.value,
        observed,
    })
}

/// Drawdown from peak equity, in basis points ×100 (1_000_000 = 100%).
fn drawdown_bps(portfolio: &PortfolioSnapshot) -> i64 {
    if portfolio.peak_equity <= 0 || portfolio.peak_equity <= portfolio.equity {
        return 0;
    }
    let diff = portfolio.peak_equity - portfolio.equity;
    diff.saturating_mul(1_000_000) / portfolio.peak_equity
}

/// Gross exposure over equity, in basis points ×100.
fn leverage_bps(portfolio: &PortfolioSnapshot) -> i64 {
    if portfolio.equity <= 0 {
        return i64::MAX;
    }
    portfolio.gross_exposure.saturating_mul(1_000_000) / portfolio.equity
}

/// Share of gross exposure this single order would represent, in basis
/// points ×100 — a proxy for single-symbol concentration.
fn concentration_bps(portfolio: &PortfolioSnapshot, order_value: i64) -> i64 {
    let total = portfolio.gross_exposure + order_value;
    if total <= 0 {
        return 0;
    }
    order_value.saturating_mul(1_000_000) / total
}

/// One-day 99% parametric VaR estimate: `2.33 * volatility * equity /
/// sqrt(252)`, in the same ticks as `equity`.
fn value_at_risk(portfolio: &PortfolioSnapshot) -> i64 {
    let daily_vol = portfolio.volatility / 252f64.sqrt();
    (2.33 * daily_vol * portfolio.equity as f64) as i64
}

/// Worst-case loss under a fixed stress shock (a 3× daily-vol move against
/// the full gross exposure).
fn stress_loss(portfolio: &PortfolioSnapshot) -> i64 {
    let shock = (3.0 * portfolio.volatility / 252f64.sqrt()).min(1.0);
    (shock * portfolio.gross_exposure as f64) as i64
}

/// Builds a [`CheckContext`] from the pieces a caller typically already
/// has on hand: the resulting position and current timestamp.
#[must_use]
pub fn resulting_position(side: common::Side, current_qty: i64, order_qty: common::Qty) -> i64 {
    match side {
        common::Side::Bid => current_qty + order_qty.as_i64(),
        common::Side::Ask => current_qty - order_qty.as_i64(),
    }
}

/// Current wall-clock timestamp, exposed so callers building a
/// [`CheckContext`] don't need to depend on `common::Ts` directly.
#[must_use]
pub fn now() -> Ts {
    Ts::now()
}
