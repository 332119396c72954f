use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roster::{PlayerId, Roster};

/// Legs needed to win a match (first to 3).
pub const LEGS_TO_WIN: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchDataError {
    #[error("match {0} is already completed")]
    AlreadyCompleted(u32),

    #[error("winner '{winner}' must be one of '{player_a}' or '{player_b}'")]
    WinnerNotContestant {
        winner: PlayerId,
        player_a: PlayerId,
        player_b: PlayerId,
    },

    #[error("match {0} is completed but has no winner and is not a draw")]
    MissingWinner(u32),

    #[error("match {match_id} has unusual score {score_a}-{score_b}")]
    UnusualScore {
        match_id: u32,
        score_a: u8,
        score_b: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub round: u32,
    pub match_id: u32,
    pub player_a: PlayerId,
    pub player_b: PlayerId,
    #[serde(default)]
    pub score_a: Option<u8>,
    #[serde(default)]
    pub score_b: Option<u8>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub winner: Option<PlayerId>,
    #[serde(default)]
    pub is_draw: bool,
}

/// Winner/loser view of a decisive result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisiveResult<'a> {
    pub winner: &'a PlayerId,
    pub loser: &'a PlayerId,
    pub winner_score: u8,
    pub loser_score: u8,
}

impl MatchRecord {
    pub fn scheduled(round: u32, match_id: u32, a: &str, b: &str) -> Self {
        Self {
            round,
            match_id,
            player_a: PlayerId::from(a),
            player_b: PlayerId::from(b),
            score_a: None,
            score_b: None,
            completed: false,
            winner: None,
            is_draw: false,
        }
    }

    /// Completed result; the winner is derived from the scores (equal scores make a draw).
    pub fn completed(round: u32, match_id: u32, a: &str, b: &str, score_a: u8, score_b: u8) -> Self {
        let mut m = Self::scheduled(round, match_id, a, b);
        m.score_a = Some(score_a);
        m.score_b = Some(score_b);
        m.completed = true;
        m.is_draw = score_a == score_b;
        m.winner = if score_a > score_b {
            Some(m.player_a.clone())
        } else if score_b > score_a {
            Some(m.player_b.clone())
        } else {
            None
        };
        m
    }

    pub fn involves(&self, id: &PlayerId) -> bool {
        self.player_a == *id || self.player_b == *id
    }

    /// `None` for draws, unplayed matches, or a winner who is not a contestant.
    pub fn decisive_result(&self) -> Option<DecisiveResult<'_>> {
        if !self.completed || self.is_draw {
            return None;
        }
        let winner = self.winner.as_ref()?;
        let (loser, w, l) = if *winner == self.player_a {
            (&self.player_b, self.score_a, self.score_b)
        } else if *winner == self.player_b {
            (&self.player_a, self.score_b, self.score_a)
        } else {
            return None;
        };
        Some(DecisiveResult {
            winner,
            loser,
            winner_score: w.unwrap_or(0),
            loser_score: l.unwrap_or(0),
        })
    }

    /// Data-quality check for callers. The engine itself tolerates anything this rejects.
    pub fn check(&self) -> Result<(), MatchDataError> {
        if !self.completed || self.is_draw {
            return Ok(());
        }
        let Some(winner) = self.winner.as_ref() else {
            return Err(MatchDataError::MissingWinner(self.match_id));
        };
        if !self.involves(winner) {
            return Err(MatchDataError::WinnerNotContestant {
                winner: winner.clone(),
                player_a: self.player_a.clone(),
                player_b: self.player_b.clone(),
            });
        }
        let score_a = self.score_a.unwrap_or(0);
        let score_b = self.score_b.unwrap_or(0);
        let (hi, lo) = (score_a.max(score_b), score_a.min(score_b));
        if hi != LEGS_TO_WIN || lo >= LEGS_TO_WIN {
            return Err(MatchDataError::UnusualScore {
                match_id: self.match_id,
                score_a,
                score_b,
            });
        }
        Ok(())
    }
}

/// Checks a result about to be recorded against a scheduled match.
pub fn validate_result(
    record: &MatchRecord,
    score_a: u8,
    score_b: u8,
    winner: &PlayerId,
) -> Result<MatchRecord, MatchDataError> {
    if record.completed {
        return Err(MatchDataError::AlreadyCompleted(record.match_id));
    }
    if !record.involves(winner) {
        return Err(MatchDataError::WinnerNotContestant {
            winner: winner.clone(),
            player_a: record.player_a.clone(),
            player_b: record.player_b.clone(),
        });
    }
    let mut out = record.clone();
    out.score_a = Some(score_a);
    out.score_b = Some(score_b);
    out.completed = true;
    out.is_draw = score_a == score_b;
    out.winner = if out.is_draw { None } else { Some(winner.clone()) };
    Ok(out)
}

/// Everything the pricing engine reads: who plays, and every match played or scheduled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    pub roster: Roster,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

impl TournamentSnapshot {
    pub fn new(roster: Roster, matches: Vec<MatchRecord>) -> Self {
        Self { roster, matches }
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read snapshot {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parse snapshot {}", path.display()))
    }

    /// Completed matches in `match_id` order.
    pub fn completed(&self) -> Vec<MatchRecord> {
        let mut out: Vec<MatchRecord> =
            self.matches.iter().filter(|m| m.completed).cloned().collect();
        out.sort_by_key(|m| m.match_id);
        out
    }

    /// Scheduled (not yet completed) matches in `match_id` order.
    pub fn scheduled(&self) -> Vec<MatchRecord> {
        let mut out: Vec<MatchRecord> =
            self.matches.iter().filter(|m| !m.completed).cloned().collect();
        out.sort_by_key(|m| m.match_id);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    pub player: PlayerId,
    pub played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub legs_for: i32,
    pub legs_against: i32,
    pub leg_diff: i32,
}

impl StandingRow {
    fn empty(player: PlayerId) -> Self {
        Self {
            player,
            played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            legs_for: 0,
            legs_against: 0,
            leg_diff: 0,
        }
    }

    /// Counts `m` for `self.player` if they took part. `leg_diff` is refreshed every time.
    fn record(&mut self, m: &MatchRecord) {
        let (own, other) = if m.player_a == self.player {
            (m.score_a, m.score_b)
        } else if m.player_b == self.player {
            (m.score_b, m.score_a)
        } else {
            return;
        };
        self.played += 1;
        self.legs_for += i32::from(own.unwrap_or(0));
        self.legs_against += i32::from(other.unwrap_or(0));
        self.leg_diff = self.legs_for - self.legs_against;
        if m.is_draw {
            self.draws += 1;
        } else if m.winner.as_ref() == Some(&self.player) {
            self.wins += 1;
        } else {
            // A completed non-draw without a recognised winner still counts against the player.
            self.losses += 1;
        }
    }
}

pub fn player_record(player: &PlayerId, completed: &[MatchRecord]) -> StandingRow {
    let mut row = StandingRow::empty(player.clone());
    for m in completed.iter().filter(|m| m.completed) {
        row.record(m);
    }
    row
}

/// League table ranked by wins, then leg difference, then legs won. Ties keep roster order.
pub fn standings(roster: &Roster, completed: &[MatchRecord]) -> Vec<StandingRow> {
    let mut rows: BTreeMap<&PlayerId, StandingRow> = roster
        .iter()
        .map(|p| (p, StandingRow::empty(p.clone())))
        .collect();

    // Single pass instead of one scan per player.
    for m in completed.iter().filter(|m| m.completed) {
        for player in [&m.player_a, &m.player_b] {
            if let Some(row) = rows.get_mut(player) {
                row.record(m);
            }
        }
    }

    let mut out: Vec<StandingRow> = rows.into_values().collect();
    out.sort_by_key(|r| (Reverse(r.wins), Reverse(r.leg_diff), Reverse(r.legs_for)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::from_names(["Ali", "Baran", "Ece", "Okan"])
    }

    #[test]
    fn completed_derives_winner_and_draw() {
        let m = MatchRecord::completed(1, 1, "Ali", "Baran", 1, 3);
        assert_eq!(m.winner, Some(PlayerId::from("Baran")));
        let r = m.decisive_result().unwrap();
        assert_eq!(r.loser.as_str(), "Ali");
        assert_eq!((r.winner_score, r.loser_score), (3, 1));

        let d = MatchRecord::completed(1, 2, "Ali", "Baran", 2, 2);
        assert!(d.is_draw);
        assert!(d.winner.is_none());
        assert!(d.decisive_result().is_none());
        assert!(d.check().is_ok());
    }

    #[test]
    fn check_flags_unusual_scores_and_outsiders() {
        let mut m = MatchRecord::completed(1, 7, "Ali", "Baran", 2, 1);
        assert_eq!(
            m.check(),
            Err(MatchDataError::UnusualScore {
                match_id: 7,
                score_a: 2,
                score_b: 1
            })
        );
        m.score_a = Some(3);
        assert!(m.check().is_ok());
        m.winner = Some(PlayerId::from("Okan"));
        assert!(matches!(m.check(), Err(MatchDataError::WinnerNotContestant { .. })));
        m.winner = None;
        assert_eq!(m.check(), Err(MatchDataError::MissingWinner(7)));
    }

    #[test]
    fn validate_result_rejects_completed_and_foreign_winner() {
        let sched = MatchRecord::scheduled(2, 10, "Ali", "Ece");
        let done = validate_result(&sched, 3, 2, &PlayerId::from("Ece")).unwrap();
        assert!(done.completed);
        assert_eq!(done.winner, Some(PlayerId::from("Ece")));

        assert_eq!(
            validate_result(&done, 3, 0, &PlayerId::from("Ali")),
            Err(MatchDataError::AlreadyCompleted(10))
        );
        assert!(validate_result(&sched, 3, 0, &PlayerId::from("Okan")).is_err());
    }

    #[test]
    fn standings_tiebreak_on_leg_diff_then_legs_for() {
        let completed = vec![
            MatchRecord::completed(1, 1, "Ali", "Baran", 3, 0),
            MatchRecord::completed(1, 2, "Ece", "Okan", 3, 0),
            MatchRecord::completed(2, 3, "Ali", "Ece", 2, 3),
            MatchRecord::completed(2, 4, "Baran", "Okan", 3, 2),
        ];
        let table = standings(&roster(), &completed);
        let order: Vec<&str> = table.iter().map(|r| r.player.as_str()).collect();
        // Ece 2W, Ali 1W +2, Baran 1W -2, Okan 0W.
        assert_eq!(order, vec!["Ece", "Ali", "Baran", "Okan"]);
        assert_eq!(table[1].legs_for, 5);
        assert_eq!(table[1].leg_diff, 2);
        assert_eq!(table[0], player_record(&PlayerId::from("Ece"), &completed));
    }

    #[test]
    fn standings_legs_for_breaks_equal_leg_diff() {
        // Ali and Baran both 1W with leg diff +1; Baran has more legs won.
        let completed = vec![
            MatchRecord::completed(1, 1, "Ali", "Ece", 3, 2),
            MatchRecord::completed(1, 2, "Baran", "Okan", 3, 2),
            MatchRecord::completed(2, 3, "Baran", "Ece", 2, 2),
        ];
        let table = standings(&roster(), &completed);
        assert_eq!(table[0].player.as_str(), "Baran");
        assert_eq!(table[1].player.as_str(), "Ali");
        assert_eq!(table[0].draws, 1);
    }

    #[test]
    fn snapshot_splits_and_sorts_by_match_id() {
        let snap = TournamentSnapshot::new(
            roster(),
            vec![
                MatchRecord::scheduled(3, 9, "Ali", "Okan"),
                MatchRecord::completed(1, 2, "Ece", "Okan", 3, 0),
                MatchRecord::completed(1, 1, "Ali", "Baran", 3, 0),
                MatchRecord::scheduled(3, 8, "Baran", "Ece"),
            ],
        );
        let ids: Vec<u32> = snap.completed().iter().map(|m| m.match_id).collect();
        assert_eq!(ids, vec![1, 2]);
        let ids: Vec<u32> = snap.scheduled().iter().map(|m| m.match_id).collect();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn snapshot_parses_json() {
        let raw = r#"{
            "roster": ["Ece", "Ali"],
            "matches": [
                {"round": 1, "match_id": 1, "player_a": "Ali", "player_b": "Ece",
                 "score_a": 3, "score_b": 1, "completed": true, "winner": "Ali", "is_draw": false},
                {"round": 2, "match_id": 2, "player_a": "Ece", "player_b": "Ali"}
            ]
        }"#;
        let snap = TournamentSnapshot::from_json_str(raw).unwrap();
        assert_eq!(snap.roster.players()[0].as_str(), "Ali");
        assert_eq!(snap.completed().len(), 1);
        assert_eq!(snap.scheduled().len(), 1);
        assert!(TournamentSnapshot::from_json_str("{").is_err());
    }

    #[test]
    fn padded_names_in_json_resolve_to_one_player() {
        let raw = r#"{
            "roster": ["Ali ", " Ece"],
            "matches": [
                {"round": 1, "match_id": 1, "player_a": "Ali", "player_b": "Ece ",
                 "score_a": 3, "score_b": 0, "completed": true, "winner": " Ali", "is_draw": false}
            ]
        }"#;
        let snap = TournamentSnapshot::from_json_str(raw).unwrap();
        assert_eq!(snap.roster.players()[0].as_str(), "Ali");
        assert!(snap.roster.contains(&snap.matches[0].player_a));
        assert!(snap.roster.contains(&snap.matches[0].player_b));

        let ratings = crate::elo::compute_ratings(&snap.roster, &snap.completed());
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[&PlayerId::from("Ali")].games_played, 1);
        assert!((ratings[&PlayerId::from("Ali")].elo - 1534.32).abs() < 1e-9);
    }

    #[test]
    fn parse_errors_keep_their_position() {
        let err = TournamentSnapshot::from_json_str("{\n  \"roster\": [1]\n}").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(err.is_data());
    }

    #[test]
    fn player_record_matches_table_row() {
        let mut orphan = MatchRecord::completed(2, 4, "Okan", "Ece", 3, 1);
        orphan.winner = Some(PlayerId::from("Nobody"));
        let completed = vec![
            MatchRecord::completed(1, 1, "Ali", "Ece", 3, 2),
            MatchRecord::completed(1, 2, "Baran", "Okan", 1, 3),
            MatchRecord::completed(2, 3, "Ali", "Okan", 2, 2),
            orphan,
        ];
        let table = standings(&roster(), &completed);
        for row in &table {
            assert_eq!(player_record(&row.player, &completed), *row);
        }
        let okan = player_record(&PlayerId::from("Okan"), &completed);
        assert_eq!((okan.wins, okan.losses, okan.draws), (1, 1, 1));
        assert_eq!(okan.leg_diff, 4);
    }
}
