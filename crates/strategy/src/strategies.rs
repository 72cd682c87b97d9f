//! The six scoring strategies.
//!
//! Each one reads a single `IndicatorSet` and returns one vote. None of them
//! keeps state between calls or looks at another strategy's output.

use std::str::FromStr;

use serde::Serialize;

use crate::indicators::IndicatorSet;
use crate::Strategy;

/// Direction of a single strategy vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stance {
    Long,
    Short,
    Neutral,
}

/// One strategy's opinion on one symbol for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyVote {
    pub direction: Stance,
    /// Always within `[0, 1]`; 0 for `Neutral`.
    pub confidence: f64,
}

impl StrategyVote {
    pub fn new(direction: Stance, confidence: f64) -> Self {
        let confidence = match direction {
            Stance::Neutral => 0.0,
            _ if !confidence.is_finite() => 0.0,
            _ => confidence.clamp(0.0, 1.0),
        };
        Self { direction, confidence }
    }

    pub fn long(confidence: f64) -> Self {
        Self::new(Stance::Long, confidence)
    }

    pub fn short(confidence: f64) -> Self {
        Self::new(Stance::Short, confidence)
    }

    pub fn neutral() -> Self {
        Self::new(Stance::Neutral, 0.0)
    }
}

/// Identifies a strategy type in config files and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    IvRank,
    VixReversion,
    IvHvSpread,
    Momentum,
    Contrarian,
    Trend,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::IvRank,
        StrategyKind::VixReversion,
        StrategyKind::IvHvSpread,
        StrategyKind::Momentum,
        StrategyKind::Contrarian,
        StrategyKind::Trend,
    ];

    /// Identifier used in the `type` field of the strategy file.
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::IvRank => "iv_rank",
            StrategyKind::VixReversion => "vix_reversion",
            StrategyKind::IvHvSpread => "iv_hv_spread",
            StrategyKind::Momentum => "momentum",
            StrategyKind::Contrarian => "contrarian",
            StrategyKind::Trend => "trend",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::IvRank => "IVRank",
            StrategyKind::VixReversion => "VIXRev",
            StrategyKind::IvHvSpread => "IVHV",
            StrategyKind::Momentum => "Momentum",
            StrategyKind::Contrarian => "Contra",
            StrategyKind::Trend => "Trend",
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            StrategyKind::IvRank => 1.0,
            StrategyKind::VixReversion => 0.8,
            StrategyKind::IvHvSpread => 0.7,
            StrategyKind::Momentum => 0.6,
            StrategyKind::Contrarian => 0.5,
            StrategyKind::Trend => 0.5,
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .iter()
            .copied()
            .find(|k| k.id() == s)
            .ok_or_else(|| format!("unknown type '{s}'"))
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ─── IV rank ──────────────────────────────────────────────────────────────────

/// Sells rich volatility, buys cheap volatility.
#[derive(Debug, Clone)]
pub struct IvRankStrategy {
    pub upper: f64,
    pub lower: f64,
}

impl Default for IvRankStrategy {
    fn default() -> Self {
        Self { upper: 65.0, lower: 35.0 }
    }
}

impl Strategy for IvRankStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IvRank
    }

    fn evaluate(&self, ind: &IndicatorSet) -> StrategyVote {
        if ind.iv_rank > self.upper {
            StrategyVote::short(((ind.iv_rank - 50.0) / 50.0).min(1.0))
        } else if ind.iv_rank < self.lower {
            StrategyVote::long(((50.0 - ind.iv_rank) / 50.0).min(1.0))
        } else {
            StrategyVote::neutral()
        }
    }
}

// ─── VIX mean reversion ───────────────────────────────────────────────────────

/// Fades extremes of the reference volatility index.
#[derive(Debug, Clone)]
pub struct VixReversionStrategy {
    /// Above this level a sharp drop is treated as capitulation.
    pub panic_level: f64,
    /// Below this level a sharp rally is treated as complacency.
    pub complacent_level: f64,
    pub elevated_level: f64,
    pub calm_level: f64,
    /// Percent move over the short horizon that counts as sharp.
    pub move_pct: f64,
    pub strong_confidence: f64,
    pub mild_confidence: f64,
}

impl Default for VixReversionStrategy {
    fn default() -> Self {
        Self {
            panic_level: 25.0,
            complacent_level: 15.0,
            elevated_level: 22.0,
            calm_level: 14.0,
            move_pct: 3.0,
            strong_confidence: 0.6,
            mild_confidence: 0.4,
        }
    }
}

impl Strategy for VixReversionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VixReversion
    }

    fn evaluate(&self, ind: &IndicatorSet) -> StrategyVote {
        let change = ind.change_short_pct;
        if ind.vix > self.panic_level && change < -self.move_pct {
            StrategyVote::long(self.strong_confidence)
        } else if ind.vix < self.complacent_level && change > self.move_pct {
            StrategyVote::short(self.strong_confidence)
        } else if ind.vix > self.elevated_level {
            StrategyVote::short(self.mild_confidence)
        } else if ind.vix < self.calm_level {
            StrategyVote::long(self.mild_confidence)
        } else {
            StrategyVote::neutral()
        }
    }
}

// ─── IV / HV spread ───────────────────────────────────────────────────────────

/// Compares implied against realized volatility.
#[derive(Debug, Clone)]
pub struct IvHvSpreadStrategy {
    /// Spread above which IV is considered rich.
    pub rich: f64,
    /// Spread below which IV is considered cheap (negative).
    pub cheap: f64,
}

impl Default for IvHvSpreadStrategy {
    fn default() -> Self {
        Self { rich: 0.30, cheap: -0.20 }
    }
}

impl Strategy for IvHvSpreadStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IvHvSpread
    }

    fn evaluate(&self, ind: &IndicatorSet) -> StrategyVote {
        if ind.hv == 0.0 {
            return StrategyVote::neutral();
        }
        let spread = (ind.iv - ind.hv) / ind.hv;
        if spread > self.rich {
            StrategyVote::short((spread - 0.20).min(0.80))
        } else if spread < self.cheap {
            StrategyVote::long((-spread * 0.5).min(0.60))
        } else {
            StrategyVote::neutral()
        }
    }
}

// ─── Momentum ─────────────────────────────────────────────────────────────────

/// Follows moves confirmed on both horizons, filtered by volatility regime.
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    pub short_pct: f64,
    pub long_pct: f64,
    pub rank_pivot: f64,
    pub confidence: f64,
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self {
            short_pct: 3.0,
            long_pct: 5.0,
            rank_pivot: 50.0,
            confidence: 0.5,
        }
    }
}

impl Strategy for MomentumStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn evaluate(&self, ind: &IndicatorSet) -> StrategyVote {
        let (short, long) = (ind.change_short_pct, ind.change_long_pct);
        if short > self.short_pct && long > self.long_pct && ind.iv_rank < self.rank_pivot {
            StrategyVote::long(self.confidence)
        } else if short < -self.short_pct && long < -self.long_pct && ind.iv_rank > self.rank_pivot {
            StrategyVote::short(self.confidence)
        } else {
            StrategyVote::neutral()
        }
    }
}

// ─── Contrarian ───────────────────────────────────────────────────────────────

/// Buys panic dips and fades complacent rallies.
#[derive(Debug, Clone)]
pub struct ContrarianStrategy {
    pub move_pct: f64,
    pub high_rank: f64,
    pub low_rank: f64,
    pub confidence: f64,
}

impl Default for ContrarianStrategy {
    fn default() -> Self {
        Self {
            move_pct: 5.0,
            high_rank: 70.0,
            low_rank: 30.0,
            confidence: 0.6,
        }
    }
}

impl Strategy for ContrarianStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Contrarian
    }

    fn evaluate(&self, ind: &IndicatorSet) -> StrategyVote {
        let change = ind.change_short_pct;
        if change < -self.move_pct && ind.iv_rank > self.high_rank {
            StrategyVote::long(self.confidence)
        } else if change > self.move_pct && ind.iv_rank < self.low_rank {
            StrategyVote::short(self.confidence)
        } else {
            StrategyVote::neutral()
        }
    }
}

// ─── Trend ────────────────────────────────────────────────────────────────────

/// Moving-average stack alignment confirmed by the short-horizon move.
#[derive(Debug, Clone)]
pub struct TrendStrategy {
    pub confidence: f64,
}

impl Default for TrendStrategy {
    fn default() -> Self {
        Self { confidence: 0.5 }
    }
}

impl Strategy for TrendStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Trend
    }

    fn evaluate(&self, ind: &IndicatorSet) -> StrategyVote {
        let change = ind.change_short_pct;
        if ind.price > ind.sma_fast && ind.sma_fast > ind.sma_slow && change > 0.0 {
            StrategyVote::long(self.confidence)
        } else if ind.price < ind.sma_fast && ind.sma_fast < ind.sma_slow && change < 0.0 {
            StrategyVote::short(self.confidence)
        } else {
            StrategyVote::neutral()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Indicator state that triggers none of the six strategies.
    pub(crate) fn quiet() -> IndicatorSet {
        IndicatorSet {
            symbol: "TEST".into(),
            price: 100.0,
            sma_fast: 100.0,
            sma_slow: 100.0,
            ema_fast: 100.0,
            ema_slow: 100.0,
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            bb_upper: 102.0,
            bb_middle: 100.0,
            bb_lower: 98.0,
            vwap: 100.0,
            hv: 0.25,
            iv: 0.30,
            iv_rank: 50.0,
            iv_hv_spread: 0.2,
            vix: 18.0,
            change_short_pct: 0.0,
            change_long_pct: 0.0,
            volume_ratio: 1.0,
        }
    }

    #[test]
    fn quiet_market_is_neutral_everywhere() {
        let ind = quiet();
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(IvRankStrategy::default()),
            Box::new(VixReversionStrategy::default()),
            Box::new(IvHvSpreadStrategy::default()),
            Box::new(MomentumStrategy::default()),
            Box::new(ContrarianStrategy::default()),
            Box::new(TrendStrategy::default()),
        ];
        for s in strategies {
            assert_eq!(s.evaluate(&ind), StrategyVote::neutral(), "{}", s.name());
        }
    }

    #[test]
    fn vote_confidence_is_clamped() {
        assert_eq!(StrategyVote::long(1.7).confidence, 1.0);
        assert_eq!(StrategyVote::short(-0.3).confidence, 0.0);
        assert_eq!(StrategyVote::new(Stance::Neutral, 0.8).confidence, 0.0);
        assert_eq!(StrategyVote::long(f64::NAN).confidence, 0.0);
    }

    #[test]
    fn iv_rank_votes_against_extremes() {
        let s = IvRankStrategy::default();
        let high = IndicatorSet { iv_rank: 90.0, ..quiet() };
        let low = IndicatorSet { iv_rank: 30.0, ..quiet() };
        assert_eq!(s.evaluate(&high), StrategyVote::short(0.8));
        let vote = s.evaluate(&low);
        assert_eq!(vote.direction, Stance::Long);
        assert!((vote.confidence - 0.4).abs() < 1e-12);
        assert_eq!(s.evaluate(&IndicatorSet { iv_rank: 65.0, ..quiet() }), StrategyVote::neutral());
    }

    #[test]
    fn vix_rules_apply_in_order() {
        let s = VixReversionStrategy::default();
        let capitulation = IndicatorSet { vix: 30.0, change_short_pct: -4.0, ..quiet() };
        let complacency = IndicatorSet { vix: 12.0, change_short_pct: 4.0, ..quiet() };
        let elevated = IndicatorSet { vix: 23.0, ..quiet() };
        let calm = IndicatorSet { vix: 13.0, ..quiet() };
        assert_eq!(s.evaluate(&capitulation), StrategyVote::long(0.6));
        assert_eq!(s.evaluate(&complacency), StrategyVote::short(0.6));
        assert_eq!(s.evaluate(&elevated), StrategyVote::short(0.4));
        assert_eq!(s.evaluate(&calm), StrategyVote::long(0.4));
    }

    #[test]
    fn iv_hv_spread_caps_confidence() {
        let s = IvHvSpreadStrategy::default();
        let rich = IndicatorSet { hv: 0.2, iv: 0.5, ..quiet() }; // spread 1.5
        let cheap = IndicatorSet { hv: 0.4, iv: 0.2, ..quiet() }; // spread -0.5
        assert_eq!(s.evaluate(&rich), StrategyVote::short(0.8));
        assert_eq!(s.evaluate(&cheap), StrategyVote::long(0.25));
        assert_eq!(s.evaluate(&IndicatorSet { hv: 0.0, ..quiet() }), StrategyVote::neutral());
    }

    #[test]
    fn momentum_needs_both_horizons_and_regime() {
        let s = MomentumStrategy::default();
        let up = IndicatorSet { change_short_pct: 4.0, change_long_pct: 6.0, iv_rank: 40.0, ..quiet() };
        let down = IndicatorSet { change_short_pct: -4.0, change_long_pct: -6.0, iv_rank: 60.0, ..quiet() };
        assert_eq!(s.evaluate(&up), StrategyVote::long(0.5));
        assert_eq!(s.evaluate(&down), StrategyVote::short(0.5));
        assert_eq!(s.evaluate(&IndicatorSet { iv_rank: 60.0, ..up }), StrategyVote::neutral());
    }

    #[test]
    fn contrarian_fades_sharp_moves() {
        let s = ContrarianStrategy::default();
        let dip = IndicatorSet { change_short_pct: -6.0, iv_rank: 80.0, ..quiet() };
        let rally = IndicatorSet { change_short_pct: 6.0, iv_rank: 20.0, ..quiet() };
        assert_eq!(s.evaluate(&dip), StrategyVote::long(0.6));
        assert_eq!(s.evaluate(&rally), StrategyVote::short(0.6));
    }

    #[test]
    fn trend_requires_ordered_averages() {
        let s = TrendStrategy::default();
        let up = IndicatorSet { price: 110.0, sma_fast: 105.0, sma_slow: 100.0, change_short_pct: 1.0, ..quiet() };
        let down = IndicatorSet { price: 90.0, sma_fast: 95.0, sma_slow: 100.0, change_short_pct: -1.0, ..quiet() };
        assert_eq!(s.evaluate(&up), StrategyVote::long(0.5));
        assert_eq!(s.evaluate(&down), StrategyVote::short(0.5));
        assert_eq!(s.evaluate(&IndicatorSet { change_short_pct: -1.0, ..up }), StrategyVote::neutral());
    }

    #[test]
    fn kind_ids_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.id().parse::<StrategyKind>(), Ok(kind));
        }
        assert!("astrology".parse::<StrategyKind>().is_err());
    }
}
