use std::cmp::Reverse;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::calibration::{OddsQuote, TARGET_OVERROUND, apply_power_overround};
use crate::elo::{RatingTable, elo_of, expected_score, round_to};
use crate::knockout::{QUARTERFINAL_PAIRS, Stage, knockout_probability};
use crate::match_data::{TournamentSnapshot, standings};
use crate::roster::PlayerId;

pub const MC_ITERATIONS: usize = 10_000;
pub const RANDOM_SEED: u64 = 42;

pub const BRACKET_SIZE: usize = 8;

// Players at or below a 0.1% title chance are left out of the outright market.
const MIN_OUTRIGHT_PROB: f64 = 0.001;

// Simulated margins: 3-0 30%, 3-1 35%, 3-2 35%. (cumulative roll, leg difference)
const MARGIN_TABLE: [(f64, i32); 3] = [(0.30, 3), (0.65, 2), (1.0, 1)];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutrightEntry {
    pub quote: OddsQuote,
    pub win_count: u32,
    pub top8_count: u32,
    pub top8_pct: f64,
}

/// Seed flag for `a` in a bracket match against `b`.
///
/// Quarterfinals list the better standings rank first, so `a` is always the higher seed.
/// Semifinals and the final ignore the bracket and give the flag to the higher current elo
/// (ties to `a`).
pub fn higher_seed_flag(stage: Stage, elo_a: f64, elo_b: f64) -> bool {
    match stage {
        Stage::QuarterFinal => true,
        Stage::SemiFinal | Stage::Final => elo_a >= elo_b,
    }
}

/// Index-based view of one snapshot, built once and shared by every iteration.
#[derive(Debug)]
struct Field {
    players: Vec<PlayerId>,
    elos: Vec<f64>,
    /// Actual standings order; the stable per-iteration sort starts from it.
    base_order: Vec<usize>,
    base_wins: Vec<u32>,
    base_leg_diff: Vec<i32>,
    fixtures: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
struct Tally {
    win_counts: Vec<u32>,
    top8_counts: Vec<u32>,
}

impl Tally {
    fn new(n: usize) -> Self {
        Self {
            win_counts: vec![0; n],
            top8_counts: vec![0; n],
        }
    }

    fn merge(mut self, other: &Tally) -> Self {
        for (a, b) in self.win_counts.iter_mut().zip(&other.win_counts) {
            *a += b;
        }
        for (a, b) in self.top8_counts.iter_mut().zip(&other.top8_counts) {
            *a += b;
        }
        self
    }
}

impl Field {
    fn prepare(snapshot: &TournamentSnapshot, ratings: &RatingTable) -> Option<Self> {
        let roster = &snapshot.roster;
        if roster.len() < BRACKET_SIZE {
            warn!(players = roster.len(), "not enough players to fill the bracket");
            return None;
        }

        let players: Vec<PlayerId> = roster.players().to_vec();
        let elos: Vec<f64> = players.iter().map(|p| elo_of(ratings, p)).collect();

        let n = players.len();
        let mut base_wins = vec![0u32; n];
        let mut base_leg_diff = vec![0i32; n];
        let mut base_order = Vec::with_capacity(n);
        for row in standings(roster, &snapshot.completed()) {
            let Some(i) = roster.index_of(&row.player) else {
                continue;
            };
            base_wins[i] = row.wins;
            base_leg_diff[i] = row.leg_diff;
            base_order.push(i);
        }

        let mut fixtures = Vec::new();
        for m in snapshot.scheduled() {
            match (roster.index_of(&m.player_a), roster.index_of(&m.player_b)) {
                (Some(a), Some(b)) if a != b => fixtures.push((a, b)),
                _ => warn!(
                    match_id = m.match_id,
                    "scheduled match references players outside the roster; ignored"
                ),
            }
        }

        Some(Self {
            players,
            elos,
            base_order,
            base_wins,
            base_leg_diff,
            fixtures,
        })
    }

    fn run<R: Rng + ?Sized>(&self, iterations: usize, rng: &mut R) -> Tally {
        let n = self.players.len();
        let mut tally = Tally::new(n);
        let mut wins = vec![0u32; n];
        let mut leg_diff = vec![0i32; n];
        let mut order = Vec::with_capacity(n);

        for _ in 0..iterations {
            wins.copy_from_slice(&self.base_wins);
            leg_diff.copy_from_slice(&self.base_leg_diff);

            for &(a, b) in &self.fixtures {
                let p_a = expected_score(self.elos[a], self.elos[b]);
                let (winner, loser) = if rng.gen_range(0.0..1.0) < p_a {
                    (a, b)
                } else {
                    (b, a)
                };
                let margin = draw_margin(rng);
                wins[winner] += 1;
                leg_diff[winner] += margin;
                leg_diff[loser] -= margin;
            }

            // Stable: equal (wins, leg_diff) keep the actual standings order.
            order.clone_from(&self.base_order);
            order.sort_by_key(|&i| (Reverse(wins[i]), Reverse(leg_diff[i])));

            let mut top8 = [0usize; BRACKET_SIZE];
            top8.copy_from_slice(&order[..BRACKET_SIZE]);
            for &i in &top8 {
                tally.top8_counts[i] += 1;
            }

            let champion = self.play_bracket(&top8, rng);
            tally.win_counts[champion] += 1;
        }
        tally
    }

    fn play<R: Rng + ?Sized>(&self, a: usize, b: usize, stage: Stage, rng: &mut R) -> usize {
        let (elo_a, elo_b) = (self.elos[a], self.elos[b]);
        let flag = higher_seed_flag(stage, elo_a, elo_b);
        let p_a = knockout_probability(elo_a, elo_b, flag, stage);
        if rng.gen_range(0.0..1.0) < p_a { a } else { b }
    }

    /// QF1 #1v#8, QF2 #4v#5, QF3 #2v#7, QF4 #3v#6; SF1 QF1vQF2, SF2 QF3vQF4.
    fn play_bracket<R: Rng + ?Sized>(&self, top8: &[usize; BRACKET_SIZE], rng: &mut R) -> usize {
        let mut qf = [0usize; 4];
        for (slot, &(h, l)) in qf.iter_mut().zip(QUARTERFINAL_PAIRS.iter()) {
            *slot = self.play(top8[h], top8[l], Stage::QuarterFinal, rng);
        }
        let sf1 = self.play(qf[0], qf[1], Stage::SemiFinal, rng);
        let sf2 = self.play(qf[2], qf[3], Stage::SemiFinal, rng);
        self.play(sf1, sf2, Stage::Final, rng)
    }

    fn quotes(&self, tally: &Tally, iterations: usize) -> Vec<OutrightEntry> {
        let n_iter = iterations as f64;
        let mut in_market = Vec::new();
        let mut true_probs = Vec::new();
        for i in 0..self.players.len() {
            if tally.top8_counts[i] == 0 {
                continue;
            }
            let prob = tally.win_counts[i] as f64 / n_iter;
            if prob > MIN_OUTRIGHT_PROB {
                in_market.push(i);
                true_probs.push(prob);
            }
        }

        let implied = apply_power_overround(&true_probs, TARGET_OVERROUND);
        let mut out: Vec<OutrightEntry> = in_market
            .iter()
            .zip(&true_probs)
            .zip(implied)
            .map(|((&i, &p), ip)| OutrightEntry {
                quote: OddsQuote::new(self.players[i].clone(), p, ip),
                win_count: tally.win_counts[i],
                top8_count: tally.top8_counts[i],
                top8_pct: round_to(tally.top8_counts[i] as f64 / n_iter * 100.0, 1),
            })
            .collect();
        out.sort_by(|a, b| b.quote.true_probability.total_cmp(&a.quote.true_probability));
        out
    }
}

fn draw_margin<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    let roll: f64 = rng.gen_range(0.0..1.0);
    MARGIN_TABLE
        .iter()
        .find(|(cum, _)| roll < *cum)
        .map(|(_, diff)| *diff)
        .unwrap_or(1)
}

/// Outright-winner market from `iterations` simulated finishes of the tournament,
/// drawing from the caller's random stream. Sorted by descending title probability.
pub fn simulate_outright_with_rng<R: Rng + ?Sized>(
    snapshot: &TournamentSnapshot,
    ratings: &RatingTable,
    iterations: usize,
    rng: &mut R,
) -> Vec<OutrightEntry> {
    if iterations == 0 {
        return Vec::new();
    }
    let Some(field) = Field::prepare(snapshot, ratings) else {
        return Vec::new();
    };
    let tally = field.run(iterations, rng);
    let out = field.quotes(&tally, iterations);
    debug!(
        iterations,
        fixtures = field.fixtures.len(),
        selections = out.len(),
        "outright simulation finished"
    );
    out
}

/// Seeded outright simulation. The same seed and inputs always give identical output.
pub fn simulate_outright(
    snapshot: &TournamentSnapshot,
    ratings: &RatingTable,
    iterations: usize,
    seed: u64,
) -> Vec<OutrightEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    simulate_outright_with_rng(snapshot, ratings, iterations, &mut rng)
}

/// splitmix64 finaliser over (seed, stream) so partitions get unrelated streams.
fn sub_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Parallel outright simulation over a fixed number of partitions.
///
/// Each partition owns a contiguous share of the iterations and its own generator seeded
/// from `(seed, partition)`, so the result depends on `seed` and `partitions` only, never on
/// the thread pool. It is not expected to match the single-stream [`simulate_outright`].
pub fn simulate_outright_partitioned(
    snapshot: &TournamentSnapshot,
    ratings: &RatingTable,
    iterations: usize,
    seed: u64,
    partitions: usize,
) -> Vec<OutrightEntry> {
    if iterations == 0 {
        return Vec::new();
    }
    let Some(field) = Field::prepare(snapshot, ratings) else {
        return Vec::new();
    };
    let partitions = partitions.clamp(1, iterations);
    let base = iterations / partitions;
    let extra = iterations % partitions;

    let tallies: Vec<Tally> = (0..partitions)
        .into_par_iter()
        .map(|p| {
            let share = base + usize::from(p < extra);
            let mut rng = StdRng::seed_from_u64(sub_seed(seed, p as u64));
            field.run(share, &mut rng)
        })
        .collect();

    let tally = tallies
        .iter()
        .fold(Tally::new(field.players.len()), |acc, t| acc.merge(t));
    field.quotes(&tally, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elo::compute_ratings;
    use crate::match_data::MatchRecord;
    use crate::roster::Roster;
    use rand::rngs::mock::StepRng;

    const NAMES: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];

    fn snapshot_with(matches: Vec<MatchRecord>) -> TournamentSnapshot {
        TournamentSnapshot::new(Roster::from_names(NAMES), matches)
    }

    /// Completed results give a strict table A > B > ... > J; one extra fixture left.
    fn ladder_snapshot() -> TournamentSnapshot {
        let mut matches = Vec::new();
        let mut id = 0;
        for (i, a) in NAMES.iter().enumerate() {
            for b in NAMES.iter().skip(i + 1) {
                id += 1;
                matches.push(MatchRecord::completed(1, id, a, b, 3, 1));
            }
        }
        id += 1;
        matches.push(MatchRecord::scheduled(2, id, "I", "J"));
        snapshot_with(matches)
    }

    #[test]
    fn seed_flag_uses_rank_in_quarters_and_elo_after() {
        assert!(higher_seed_flag(Stage::QuarterFinal, 1400.0, 1700.0));
        assert!(!higher_seed_flag(Stage::SemiFinal, 1400.0, 1700.0));
        assert!(higher_seed_flag(Stage::SemiFinal, 1700.0, 1400.0));
        assert!(higher_seed_flag(Stage::Final, 1500.0, 1500.0));
        assert!(!higher_seed_flag(Stage::Final, 1499.9, 1500.0));
    }

    #[test]
    fn always_low_draws_crown_the_top_seed() {
        // Every draw is 0.0: the first-listed side always wins, so #1 takes every bracket.
        let snap = ladder_snapshot();
        let ratings = compute_ratings(&snap.roster, &snap.completed());
        let mut rng = StepRng::new(0, 0);
        let out = simulate_outright_with_rng(&snap, &ratings, 50, &mut rng);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quote.selection.as_str(), "A");
        assert_eq!(out[0].win_count, 50);
        assert_eq!(out[0].top8_pct, 100.0);
    }

    #[test]
    fn always_high_draws_follow_the_bracket_to_sixth_seed() {
        // Every draw is just under 1.0: the second-listed side always wins.
        // QF winners #8, #5, #7, #6 -> SF winners #5, #6 -> champion #6.
        let snap = ladder_snapshot();
        let ratings = compute_ratings(&snap.roster, &snap.completed());
        let mut rng = StepRng::new(u64::MAX, 0);
        let out = simulate_outright_with_rng(&snap, &ratings, 20, &mut rng);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quote.selection.as_str(), "F");
        assert_eq!(out[0].win_count, 20);
    }

    #[test]
    fn simulated_ties_keep_snapshot_standings_order() {
        // Y and Z both sit on 0 wins, -2 legs; Z has more legs won so the table puts Z 8th.
        let mut matches = Vec::new();
        for (i, p) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
            matches.push(MatchRecord::completed(1, i as u32 + 1, p, "X", 3, 0));
        }
        matches.push(MatchRecord::completed(2, 8, "A", "Y", 3, 1));
        matches.push(MatchRecord::completed(2, 9, "B", "Z", 3, 2));
        matches.push(MatchRecord::completed(2, 10, "C", "Z", 3, 2));
        // Both lose 3-0 again in the simulation; only wins and leg difference are tracked.
        matches.push(MatchRecord::scheduled(3, 11, "D", "Y"));
        matches.push(MatchRecord::scheduled(3, 12, "E", "Z"));
        let snap = TournamentSnapshot::new(
            Roster::from_names(["A", "B", "C", "D", "E", "F", "G", "X", "Y", "Z"]),
            matches,
        );
        let ratings = compute_ratings(&snap.roster, &snap.completed());

        let field = Field::prepare(&snap, &ratings).unwrap();
        let tally = field.run(25, &mut StepRng::new(0, 0));
        let y = snap.roster.index_of(&PlayerId::from("Y")).unwrap();
        let z = snap.roster.index_of(&PlayerId::from("Z")).unwrap();
        assert_eq!(tally.top8_counts[z], 25);
        assert_eq!(tally.top8_counts[y], 0);
    }

    #[test]
    fn margin_table_boundaries() {
        let mut low = StepRng::new(0, 0);
        assert_eq!(draw_margin(&mut low), 3);
        let mut high = StepRng::new(u64::MAX, 0);
        assert_eq!(draw_margin(&mut high), 1);
    }

    #[test]
    fn too_small_field_or_no_iterations_is_empty() {
        let snap = TournamentSnapshot::new(
            Roster::from_names(["A", "B", "C"]),
            vec![MatchRecord::scheduled(1, 1, "A", "B")],
        );
        let ratings = compute_ratings(&snap.roster, &[]);
        assert!(simulate_outright(&snap, &ratings, 100, RANDOM_SEED).is_empty());

        let snap = ladder_snapshot();
        let ratings = compute_ratings(&snap.roster, &snap.completed());
        assert!(simulate_outright(&snap, &ratings, 0, RANDOM_SEED).is_empty());
    }

    #[test]
    fn unknown_fixture_players_are_ignored() {
        let mut snap = ladder_snapshot();
        snap.matches.push(MatchRecord::scheduled(3, 999, "A", "Stranger"));
        let ratings = compute_ratings(&snap.roster, &snap.completed());
        let out = simulate_outright(&snap, &ratings, 200, RANDOM_SEED);
        assert!(!out.is_empty());
    }

    #[test]
    fn sub_seeds_differ_per_partition() {
        assert_ne!(sub_seed(42, 0), sub_seed(42, 1));
        assert_ne!(sub_seed(42, 0), sub_seed(43, 0));
        assert_eq!(sub_seed(7, 3), sub_seed(7, 3));
    }
}
