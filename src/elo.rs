use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::match_data::MatchRecord;
use crate::roster::{PlayerId, Roster};

pub const INITIAL_ELO: f64 = 1500.0;
pub const K_BASE: f64 = 32.0;

// Games-played decay: K multiplier falls linearly from 1.5 to 0.75 over 30 games.
const DECAY_START: f64 = 1.5;
const DECAY_END: f64 = 0.75;
const DECAY_GAMES: u32 = 30;

const PHASE_EARLY_END: u32 = 10;
const PHASE_MID_END: u32 = 20;
const PHASE_WEIGHT_EARLY: f64 = 1.1;
const PHASE_WEIGHT_MID: f64 = 1.0;
const PHASE_WEIGHT_LATE: f64 = 0.9;

const MOV_DEFAULT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRating {
    pub player: PlayerId,
    pub elo: f64,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// `(match_id, elo after the match)`, one entry per game played.
    pub history: Vec<(u32, f64)>,
}

impl PlayerRating {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            elo: INITIAL_ELO,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            history: Vec::new(),
        }
    }

    fn record_snapshot(&mut self, match_id: u32) {
        self.history.push((match_id, self.elo));
    }

    fn record_draw(&mut self, match_id: u32) {
        self.games_played += 1;
        self.draws += 1;
        self.record_snapshot(match_id);
    }
}

/// Ratings keyed by player, iterated in roster (sorted) order.
pub type RatingTable = BTreeMap<PlayerId, PlayerRating>;

/// Elo for `id`, or the starting rating for players the table has never seen.
pub fn elo_of(ratings: &RatingTable, id: &PlayerId) -> f64 {
    ratings.get(id).map(|r| r.elo).unwrap_or(INITIAL_ELO)
}

/// Logistic base-400 win expectation for `a` against `b`.
pub fn expected_score(elo_a: f64, elo_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((elo_b - elo_a) / 400.0))
}

pub fn games_played_decay(games_played: u32) -> f64 {
    if games_played >= DECAY_GAMES {
        return DECAY_END;
    }
    DECAY_START + (DECAY_END - DECAY_START) * (games_played as f64 / DECAY_GAMES as f64)
}

pub fn phase_weight(round: u32) -> f64 {
    if round <= PHASE_EARLY_END {
        PHASE_WEIGHT_EARLY
    } else if round <= PHASE_MID_END {
        PHASE_WEIGHT_MID
    } else {
        PHASE_WEIGHT_LATE
    }
}

/// Margin-of-victory multiplier keyed on (winner legs, loser legs).
/// Scores outside the table fall back to a neutral 1.0 instead of failing.
pub fn mov_multiplier(winner_score: u8, loser_score: u8) -> f64 {
    match (winner_score, loser_score) {
        (3, 0) => 1.30,
        (3, 1) => 1.10,
        (3, 2) => 0.85,
        _ => MOV_DEFAULT,
    }
}

pub fn effective_k(games_played: u32, round: u32) -> f64 {
    K_BASE * games_played_decay(games_played) * phase_weight(round)
}

/// Applies one decisive result. Both K-factors are taken before either record changes.
fn update_elo(
    winner: &mut PlayerRating,
    loser: &mut PlayerRating,
    winner_score: u8,
    loser_score: u8,
    round: u32,
    match_id: u32,
) {
    let e_winner = expected_score(winner.elo, loser.elo);
    let e_loser = 1.0 - e_winner;

    let k_winner = effective_k(winner.games_played, round);
    let k_loser = effective_k(loser.games_played, round);
    let mov = mov_multiplier(winner_score, loser_score);

    winner.elo += k_winner * mov * (1.0 - e_winner);
    loser.elo += k_loser * mov * (0.0 - e_loser);

    winner.games_played += 1;
    winner.wins += 1;
    loser.games_played += 1;
    loser.losses += 1;

    winner.record_snapshot(match_id);
    loser.record_snapshot(match_id);
}

/// Takes both players out of the table (fresh at the starting rating if unseen), lets `f`
/// update them, and puts them back. A player listed against themselves is left alone.
fn with_pair(
    ratings: &mut RatingTable,
    a: &PlayerId,
    b: &PlayerId,
    f: impl FnOnce(&mut PlayerRating, &mut PlayerRating),
) {
    if a == b {
        return;
    }
    let take = |ratings: &mut RatingTable, id: &PlayerId| {
        ratings
            .remove(id)
            .unwrap_or_else(|| PlayerRating::new(id.clone()))
    };
    let mut first = take(ratings, a);
    let mut second = take(ratings, b);
    f(&mut first, &mut second);
    ratings.insert(a.clone(), first);
    ratings.insert(b.clone(), second);
}

fn apply_match(ratings: &mut RatingTable, m: &MatchRecord) {
    if !m.completed {
        return;
    }
    if m.is_draw {
        with_pair(ratings, &m.player_a, &m.player_b, |a, b| {
            a.record_draw(m.match_id);
            b.record_draw(m.match_id);
        });
        return;
    }
    let Some(result) = m.decisive_result() else {
        debug!(match_id = m.match_id, "skipping completed match without a recognised winner");
        return;
    };
    with_pair(ratings, result.winner, result.loser, |winner, loser| {
        update_elo(
            winner,
            loser,
            result.winner_score,
            result.loser_score,
            m.round,
            m.match_id,
        );
    });
}

/// Left fold of `matches` over a fresh table holding every roster player at 1500.
/// Matches are applied in the order given; callers supply them sorted by `match_id`.
pub fn compute_ratings(roster: &Roster, matches: &[MatchRecord]) -> RatingTable {
    let mut ratings: RatingTable = roster
        .iter()
        .map(|p| (p.clone(), PlayerRating::new(p.clone())))
        .collect();

    let mut last_id: Option<u32> = None;
    for m in matches {
        if let Some(prev) = last_id.filter(|prev| m.match_id <= *prev) {
            warn!(
                match_id = m.match_id,
                previous = prev,
                "match history is not in increasing match_id order"
            );
        }
        last_id = Some(m.match_id);
        apply_match(&mut ratings, m);
    }

    debug!(players = ratings.len(), matches = matches.len(), "ratings computed");
    ratings
}

/// `(player, elo)` pairs, highest elo first.
pub fn sorted_ratings(ratings: &RatingTable) -> Vec<(PlayerId, f64)> {
    let mut out: Vec<(PlayerId, f64)> = ratings
        .values()
        .map(|r| (r.player.clone(), r.elo))
        .collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrongPrediction {
    pub match_id: u32,
    pub predicted: PlayerId,
    pub actual: PlayerId,
    pub elo_a: f64,
    pub elo_b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
    pub accuracy_pct: f64,
    pub wrong_predictions: Vec<WrongPrediction>,
}

/// Walk-forward check of "the higher pre-match elo wins", scored once both players
/// have at least two games behind them.
pub fn run_backtest(roster: &Roster, completed: &[MatchRecord]) -> BacktestReport {
    let mut ratings: RatingTable = roster
        .iter()
        .map(|p| (p.clone(), PlayerRating::new(p.clone())))
        .collect();

    let mut correct = 0usize;
    let mut total = 0usize;
    let mut wrong_predictions = Vec::new();

    for m in completed.iter().filter(|m| m.completed) {
        if let Some(result) = m.decisive_result() {
            let a = ratings.get(&m.player_a);
            let b = ratings.get(&m.player_b);
            let seasoned = match (a, b) {
                (Some(a), Some(b)) if a.games_played >= 2 && b.games_played >= 2 => Some((a, b)),
                _ => None,
            };
            if let Some((a, b)) = seasoned {
                let predicted = if a.elo >= b.elo {
                    &m.player_a
                } else {
                    &m.player_b
                };
                total += 1;
                if predicted == result.winner {
                    correct += 1;
                } else {
                    wrong_predictions.push(WrongPrediction {
                        match_id: m.match_id,
                        predicted: predicted.clone(),
                        actual: result.winner.clone(),
                        elo_a: round_to(a.elo, 1),
                        elo_b: round_to(b.elo, 1),
                    });
                }
            }
        }
        apply_match(&mut ratings, m);
    }

    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    BacktestReport {
        correct,
        total,
        accuracy,
        accuracy_pct: round_to(accuracy * 100.0, 1),
        wrong_predictions,
    }
}

pub(crate) fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10.0_f64.powi(places);
    (v * scale).round() / scale
}
