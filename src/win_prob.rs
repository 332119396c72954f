use serde::Serialize;

use crate::calibration::{OddsQuote, TARGET_OVERROUND, apply_power_overround};
use crate::elo::{RatingTable, elo_of, expected_score, round_to};
use crate::match_data::MatchRecord;
use crate::roster::PlayerId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOdds {
    pub match_id: u32,
    pub round: u32,
    pub player_a: PlayerId,
    pub player_b: PlayerId,
    pub elo_a: f64,
    pub elo_b: f64,
    pub quote_a: OddsQuote,
    pub quote_b: OddsQuote,
}

/// Round-robin head-to-head price: raw Elo expectation plus the standard book margin.
pub fn head_to_head(elo_a: f64, elo_b: f64, target: f64) -> (f64, f64, Vec<f64>) {
    let p_a = expected_score(elo_a, elo_b);
    let p_b = 1.0 - p_a;
    (p_a, p_b, apply_power_overround(&[p_a, p_b], target))
}

/// Head-to-head markets for every scheduled match, in the order given.
pub fn match_odds(ratings: &RatingTable, scheduled: &[MatchRecord]) -> Vec<MatchOdds> {
    scheduled
        .iter()
        .map(|m| {
            let elo_a = elo_of(ratings, &m.player_a);
            let elo_b = elo_of(ratings, &m.player_b);
            let (p_a, p_b, implied) = head_to_head(elo_a, elo_b, TARGET_OVERROUND);
            MatchOdds {
                match_id: m.match_id,
                round: m.round,
                player_a: m.player_a.clone(),
                player_b: m.player_b.clone(),
                elo_a: round_to(elo_a, 1),
                elo_b: round_to(elo_b, 1),
                quote_a: OddsQuote::new(m.player_a.clone(), p_a, implied[0]),
                quote_b: OddsQuote::new(m.player_b.clone(), p_b, implied[1]),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elo::compute_ratings;
    use crate::roster::Roster;

    #[test]
    fn fresh_players_price_at_even_money_less_margin() {
        let roster = Roster::from_names(["Ali", "Baran"]);
        let ratings = compute_ratings(&roster, &[]);
        let odds = match_odds(&ratings, &[MatchRecord::scheduled(1, 1, "Ali", "Baran")]);
        assert_eq!(odds.len(), 1);
        assert_eq!(odds[0].quote_a.decimal_odds, 1.85);
        assert_eq!(odds[0].quote_b.decimal_odds, 1.85);
        assert_eq!(odds[0].elo_a, 1500.0);
    }

    #[test]
    fn favourite_is_shorter_and_book_is_108() {
        let roster = Roster::from_names(["Ali", "Baran", "Ece"]);
        let history = vec![
            MatchRecord::completed(1, 1, "Ali", "Baran", 3, 0),
            MatchRecord::completed(1, 2, "Ali", "Ece", 3, 0),
        ];
        let ratings = compute_ratings(&roster, &history);
        let odds = match_odds(
            &ratings,
            &[
                MatchRecord::scheduled(2, 3, "Ali", "Baran"),
                MatchRecord::scheduled(2, 4, "Ece", "Guest"),
            ],
        );
        let m = &odds[0];
        assert!(m.quote_a.true_probability > 0.5);
        assert!(m.quote_a.decimal_odds < m.quote_b.decimal_odds);
        let book = m.quote_a.implied_probability + m.quote_b.implied_probability;
        assert!((book - 1.08).abs() < 1e-6);
        // Unknown players price from the starting rating.
        assert_eq!(odds[1].elo_b, 1500.0);
    }
}
