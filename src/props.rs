use serde::Serialize;

use crate::calibration::{TARGET_OVERROUND, apply_power_overround, prob_to_decimal_odds};
use crate::elo::{RatingTable, elo_of, expected_score};
use crate::match_data::MatchRecord;
use crate::roster::short_name;

// Elo 1200..1800 maps linearly onto skill 0.30..0.90.
const ELO_FLOOR: f64 = 1200.0;
const ELO_CEIL: f64 = 1800.0;
const SKILL_FLOOR: f64 = 0.30;
const SKILL_CEIL: f64 = 0.90;

const TOTAL_180S_LINE: f64 = 2.5;
const TOTAL_LEGS_LINE: f64 = 4.5;
const CHECKOUT_LINE: f64 = 80.5;

// Exact-score split of a win: 3-0, 3-1, 3-2.
const SCORE_WEIGHTS: [f64; 3] = [0.30, 0.35, 0.35];
const EXACT_SCORE_FLOOR: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropSelection {
    pub name: String,
    pub odds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropMarket {
    pub name: String,
    pub description: String,
    pub selections: Vec<PropSelection>,
    pub match_round: u32,
    pub match_id: u32,
}

pub fn elo_to_skill(elo: f64) -> f64 {
    let t = ((elo - ELO_FLOOR) / (ELO_CEIL - ELO_FLOOR)).clamp(0.0, 1.0);
    SKILL_FLOOR + t * (SKILL_CEIL - SKILL_FLOOR)
}

fn make_selections(true_probs: &[f64], names: &[String]) -> Vec<PropSelection> {
    let implied = apply_power_overround(true_probs, TARGET_OVERROUND);
    names
        .iter()
        .zip(implied)
        .map(|(name, ip)| PropSelection {
            name: name.clone(),
            odds: prob_to_decimal_odds(ip),
        })
        .collect()
}

fn two_way(p_yes: f64, yes: &str, no: &str) -> Vec<PropSelection> {
    make_selections(&[p_yes, 1.0 - p_yes], &[yes.to_string(), no.to_string()])
}

fn market(name: String, description: String, selections: Vec<PropSelection>) -> PropMarket {
    PropMarket {
        name,
        description,
        selections,
        match_round: 0,
        match_id: 0,
    }
}

/// Over/under 2.5 maximums in the match. Stronger pairings throw more 180s.
pub fn total_180s_market(elo_a: f64, elo_b: f64, a: &str, b: &str) -> PropMarket {
    let avg_skill = (elo_to_skill(elo_a) + elo_to_skill(elo_b)) / 2.0;
    let expected = 1.5 + avg_skill * 5.0;
    let p_over = (0.50 + (expected - TOTAL_180S_LINE) * 0.12).clamp(0.10, 0.90);

    market(
        format!("{a} vs {b}: Total 180s"),
        format!(
            "Will there be over or under 2.5 180s in the match? Expected: ~{expected:.1}"
        ),
        two_way(p_over, "Over 2.5", "Under 2.5"),
    )
}

/// Over/under 4.5 legs, i.e. whether a best-of-five goes the distance.
pub fn total_legs_market(elo_a: f64, elo_b: f64, a: &str, b: &str) -> PropMarket {
    let p_a = expected_score(elo_a, elo_b);
    let closeness = 1.0 - (p_a - 0.50).abs() * 2.0;
    let p_over = (0.20 + closeness * 0.40).clamp(0.15, 0.65);

    market(
        format!("{a} vs {b}: Total Legs"),
        "Will the match go to a deciding 5th leg?".to_string(),
        two_way(p_over, "Over 4.5", "Under 4.5"),
    )
}

pub fn highest_checkout_market(elo_a: f64, elo_b: f64, a: &str, b: &str) -> PropMarket {
    let best_skill = elo_to_skill(elo_a).max(elo_to_skill(elo_b));
    let expected_max = 50.0 + best_skill * 90.0;
    let p_over = (0.50 + (expected_max - CHECKOUT_LINE) * 0.008).clamp(0.10, 0.90);

    market(
        format!("{a} vs {b}: Highest Checkout"),
        format!("Will the highest checkout exceed 80.5? Estimated max: ~{expected_max:.0}"),
        two_way(p_over, "Over 80.5", "Under 80.5"),
    )
}

pub fn player_180_market(elo: f64, player: &str, opponent: &str) -> PropMarket {
    let p_yes = (0.10 + elo_to_skill(elo) * 0.75).clamp(0.10, 0.85);
    market(
        format!("{player} to hit a 180 (vs {opponent})"),
        format!("Will {player} score at least one maximum 180?"),
        two_way(p_yes, "Yes", "No"),
    )
}

pub fn first_leg_market(elo_a: f64, elo_b: f64, a: &str, b: &str) -> PropMarket {
    let p_a = expected_score(elo_a, elo_b);
    market(
        format!("{a} vs {b}: First Leg Winner"),
        "Who will win the opening leg of the match?".to_string(),
        make_selections(&[p_a, 1.0 - p_a], &[a.to_string(), b.to_string()]),
    )
}

/// Raw exact-score probabilities in order a 3-0, a 3-1, a 3-2, b 3-0, b 3-1, b 3-2.
///
/// Each side's win probability is split 30/35/35, shifted up to 10 points from 3-2 toward
/// 3-0 as the match gets more lopsided, floored at 2% and renormalised.
pub fn exact_score_probs(elo_a: f64, elo_b: f64) -> [f64; 6] {
    let p_a = expected_score(elo_a, elo_b);
    let p_b = 1.0 - p_a;
    let bonus = (p_a - 0.50).abs() * 0.20;
    let split = [
        SCORE_WEIGHTS[0] + bonus,
        SCORE_WEIGHTS[1],
        SCORE_WEIGHTS[2] - bonus,
    ];

    let mut probs = [0.0; 6];
    for (i, w) in split.iter().enumerate() {
        probs[i] = (p_a * w).max(EXACT_SCORE_FLOOR);
        probs[i + 3] = (p_b * w).max(EXACT_SCORE_FLOOR);
    }
    let total: f64 = probs.iter().sum();
    for p in &mut probs {
        *p /= total;
    }
    probs
}

pub fn exact_score_market(elo_a: f64, elo_b: f64, a: &str, b: &str) -> PropMarket {
    let probs = exact_score_probs(elo_a, elo_b);
    let names: Vec<String> = [a, b]
        .iter()
        .flat_map(|p| ["3-0", "3-1", "3-2"].map(|s| format!("{p} {s}")))
        .collect();

    market(
        format!("{a} vs {b}: Exact Score"),
        "Predict the exact final score of the match.".to_string(),
        make_selections(&probs, &names),
    )
}

pub fn player_ton_plus_checkout_market(elo: f64, player: &str, opponent: &str) -> PropMarket {
    let p_yes = (0.05 + elo_to_skill(elo) * 0.55).clamp(0.05, 0.70);
    market(
        format!("{player} 100+ checkout (vs {opponent})"),
        format!("Will {player} hit a checkout of 100 or higher?"),
        two_way(p_yes, "Yes", "No"),
    )
}

/// The nine prop markets offered on one match, tagged with its round and id.
pub fn prop_markets_for_match(ratings: &RatingTable, m: &MatchRecord) -> Vec<PropMarket> {
    let elo_a = elo_of(ratings, &m.player_a);
    let elo_b = elo_of(ratings, &m.player_b);
    let a = short_name(m.player_a.as_str());
    let b = short_name(m.player_b.as_str());

    let mut markets = vec![
        total_180s_market(elo_a, elo_b, &a, &b),
        total_legs_market(elo_a, elo_b, &a, &b),
        highest_checkout_market(elo_a, elo_b, &a, &b),
        player_180_market(elo_a, &a, &b),
        player_180_market(elo_b, &b, &a),
        first_leg_market(elo_a, elo_b, &a, &b),
        exact_score_market(elo_a, elo_b, &a, &b),
        player_ton_plus_checkout_market(elo_a, &a, &b),
        player_ton_plus_checkout_market(elo_b, &b, &a),
    ];
    for market in &mut markets {
        market.match_round = m.round;
        market.match_id = m.match_id;
    }
    markets
}
