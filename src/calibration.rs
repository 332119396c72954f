use serde::{Deserialize, Serialize};

use crate::elo::round_to;
use crate::roster::PlayerId;

/// Book sum applied to every market we price (108%).
pub const TARGET_OVERROUND: f64 = 1.08;

/// Odds quoted when a probability is zero or negative.
pub const MAX_DECIMAL_ODDS: f64 = 999.0;

const K_LOW: f64 = 0.01;
const K_HIGH: f64 = 10.0;
const BISECTION_STEPS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub selection: PlayerId,
    pub true_probability: f64,
    pub implied_probability: f64,
    pub decimal_odds: f64,
}

impl OddsQuote {
    pub fn new(selection: PlayerId, true_probability: f64, implied_probability: f64) -> Self {
        Self {
            selection,
            true_probability,
            implied_probability,
            decimal_odds: prob_to_decimal_odds(implied_probability),
        }
    }

    /// Report form: probabilities to 4 places (odds are already 2 places).
    pub fn rounded(&self) -> Self {
        Self {
            selection: self.selection.clone(),
            true_probability: round_to(self.true_probability, 4),
            implied_probability: round_to(self.implied_probability, 4),
            decimal_odds: self.decimal_odds,
        }
    }
}

fn power_sum(true_probs: &[f64], k: f64) -> f64 {
    true_probs.iter().map(|p| p.powf(1.0 / k)).sum()
}

/// Power-method overround: finds `k` with `sum(p_i^(1/k)) == target` and returns `p_i^(1/k)`.
///
/// The sum grows monotonically with `k`, so a fixed bisection over `[0.01, 10]` converges
/// well past 1e-6. An empty input yields an empty output.
pub fn apply_power_overround(true_probs: &[f64], target: f64) -> Vec<f64> {
    if true_probs.is_empty() {
        return Vec::new();
    }

    let (mut k_low, mut k_high) = (K_LOW, K_HIGH);
    for _ in 0..BISECTION_STEPS {
        let k_mid = (k_low + k_high) / 2.0;
        if power_sum(true_probs, k_mid) > target {
            k_high = k_mid;
        } else {
            k_low = k_mid;
        }
    }

    let k = (k_low + k_high) / 2.0;
    true_probs.iter().map(|p| p.powf(1.0 / k)).collect()
}

/// European decimal odds rounded to 2 places; saturates at 999.0 for non-positive input.
pub fn prob_to_decimal_odds(prob: f64) -> f64 {
    if prob <= 0.0 || prob.is_nan() {
        return MAX_DECIMAL_ODDS;
    }
    round_to(1.0 / prob, 2)
}

/// Quotes for a complete selection set, in input order.
pub fn quotes_with_overround(
    selections: &[PlayerId],
    true_probs: &[f64],
    target: f64,
) -> Vec<OddsQuote> {
    let implied = apply_power_overround(true_probs, target);
    selections
        .iter()
        .zip(true_probs)
        .zip(implied)
        .map(|((sel, p), ip)| OddsQuote::new(sel.clone(), *p, ip))
        .collect()
}
