//! Weighted vote aggregation with a dominance rule.

use chrono::{DateTime, Utc};
use serde::Serialize;

use common::{Direction, Signal};

use crate::strategies::{Stance, StrategyVote};

/// A strategy vote together with the weight it carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedVote {
    pub strategy: String,
    pub weight: f64,
    pub vote: StrategyVote,
}

/// Weighted Long and Short totals for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBoard {
    pub buy_score: f64,
    pub sell_score: f64,
}

impl ScoreBoard {
    /// Sum `weight × confidence` per side. Neutral votes add nothing.
    pub fn tally<'a>(votes: impl IntoIterator<Item = &'a WeightedVote>) -> Self {
        let mut board = Self::default();
        for v in votes {
            let score = v.weight * v.vote.confidence;
            match v.vote.direction {
                Stance::Long => board.buy_score += score,
                Stance::Short => board.sell_score += score,
                Stance::Neutral => {}
            }
        }
        board
    }

    pub fn total(&self) -> f64 {
        self.buy_score + self.sell_score
    }
}

/// Why an aggregation produced no signal. Logged, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSignalReason {
    /// Neither side scored anything.
    NoVotes,
    /// Neither side beat the other by the dominance ratio.
    Ambiguous,
    /// A side dominated but its share was under the confidence floor.
    BelowFloor,
}

impl std::fmt::Display for NoSignalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoSignalReason::NoVotes => write!(f, "no_votes"),
            NoSignalReason::Ambiguous => write!(f, "ambiguous"),
            NoSignalReason::BelowFloor => write!(f, "below_floor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Decision {
    Emit { direction: Direction, confidence: f64 },
    None(NoSignalReason),
}

impl Decision {
    /// Turn an emitting decision into a signal stamped with `price` and `now`.
    pub fn to_signal(&self, symbol: &str, price: f64, now: DateTime<Utc>) -> Result<Signal, NoSignalReason> {
        match *self {
            Decision::Emit { direction, confidence } => Ok(Signal {
                symbol: symbol.to_string(),
                direction,
                confidence,
                reference_price: price,
                timestamp: now,
            }),
            Decision::None(reason) => Err(reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    pub dominance_ratio: f64,
    pub min_confidence: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            dominance_ratio: 1.2,
            min_confidence: 0.55,
        }
    }
}

impl Aggregator {
    pub fn new(dominance_ratio: f64, min_confidence: f64) -> Self {
        Self {
            dominance_ratio,
            min_confidence,
        }
    }

    /// Apply the dominance rule to a score board.
    ///
    /// A side wins only when it is strictly greater than the other side times
    /// the ratio. Confidence is the winner's share of the combined score.
    pub fn decide(&self, board: &ScoreBoard) -> Decision {
        let ScoreBoard { buy_score: buy, sell_score: sell } = *board;
        if buy <= 0.0 && sell <= 0.0 {
            return Decision::None(NoSignalReason::NoVotes);
        }

        let (direction, winner) = if buy > sell * self.dominance_ratio {
            (Direction::Long, buy)
        } else if sell > buy * self.dominance_ratio {
            (Direction::Short, sell)
        } else {
            return Decision::None(NoSignalReason::Ambiguous);
        };

        let confidence = (winner / (buy + sell)).clamp(0.0, 1.0);
        if confidence < self.min_confidence {
            return Decision::None(NoSignalReason::BelowFloor);
        }
        Decision::Emit { direction, confidence }
    }
}
