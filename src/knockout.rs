use serde::Serialize;

use crate::calibration::{OddsQuote, TARGET_OVERROUND, apply_power_overround};
use crate::elo::{RatingTable, elo_of, expected_score, round_to};
use crate::roster::PlayerId;

// Knockout matches regress toward a coin flip relative to round-robin form.
const KNOCKOUT_ALPHA: f64 = 0.70;
const CHOKING_PENALTY: f64 = 0.02;
const THROW_ORDER_BONUS: f64 = 0.03;
const MIN_PROB: f64 = 0.05;
const MAX_PROB: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    QuarterFinal,
    SemiFinal,
    Final,
}

impl Stage {
    pub fn fatigue(self) -> f64 {
        match self {
            Stage::QuarterFinal => 1.00,
            Stage::SemiFinal => 0.97,
            Stage::Final => 0.93,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::QuarterFinal => "QF",
            Stage::SemiFinal => "SF",
            Stage::Final => "Final",
        }
    }
}

/// Probability that `a` beats `b` in a bracket match, clamped to `[0.05, 0.95]`.
pub fn knockout_probability(elo_a: f64, elo_b: f64, a_is_higher_seed: bool, stage: Stage) -> f64 {
    let raw = expected_score(elo_a, elo_b);
    let mut p = KNOCKOUT_ALPHA * raw + (1.0 - KNOCKOUT_ALPHA) * 0.5;

    // The current favourite gives back a little; the underdog gets the same bump.
    if p > 0.5 {
        p -= CHOKING_PENALTY;
    } else {
        p += CHOKING_PENALTY;
    }

    // Higher seed throws first.
    if a_is_higher_seed {
        p += THROW_ORDER_BONUS;
    } else {
        p -= THROW_ORDER_BONUS;
    }

    let p = 0.5 + (p - 0.5) * stage.fatigue();
    p.clamp(MIN_PROB, MAX_PROB)
}

/// Seeded pairings as (higher, lower) indices into a standings-ordered top 8.
pub const QUARTERFINAL_PAIRS: [(usize, usize); 4] = [(0, 7), (3, 4), (1, 6), (2, 5)];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterfinalOdds {
    pub label: String,
    pub higher_seed: PlayerId,
    pub lower_seed: PlayerId,
    pub elo_higher: f64,
    pub elo_lower: f64,
    pub higher: OddsQuote,
    pub lower: OddsQuote,
}

/// Head-to-head quotes for the four seeded quarterfinals. Needs a full top 8.
pub fn quarterfinal_odds(ratings: &RatingTable, top8: &[PlayerId]) -> Vec<QuarterfinalOdds> {
    if top8.len() < 8 {
        return Vec::new();
    }

    QUARTERFINAL_PAIRS
        .iter()
        .enumerate()
        .map(|(i, &(h, l))| {
            let higher = &top8[h];
            let lower = &top8[l];
            let elo_h = elo_of(ratings, higher);
            let elo_l = elo_of(ratings, lower);

            let prob_h = knockout_probability(elo_h, elo_l, true, Stage::QuarterFinal);
            let prob_l = 1.0 - prob_h;
            let implied = apply_power_overround(&[prob_h, prob_l], TARGET_OVERROUND);

            QuarterfinalOdds {
                label: format!("QF{}", i + 1),
                higher_seed: higher.clone(),
                lower_seed: lower.clone(),
                elo_higher: round_to(elo_h, 1),
                elo_lower: round_to(elo_l, 1),
                higher: OddsQuote::new(higher.clone(), prob_h, implied[0]),
                lower: OddsQuote::new(lower.clone(), prob_l, implied[1]),
            }
        })
        .collect()
}
