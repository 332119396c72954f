use serde::{Deserialize, Serialize};

use crate::elo::round_to;

/// Pool size (tokens) at which displayed odds become fully pool-driven.
pub const BLEND_THRESHOLD: f64 = 500.0;
pub const DEFAULT_HOUSE_CUT: f64 = 0.10;

const MIN_BLEND: f64 = 0.2;
const MIN_DISPLAY_ODDS: f64 = 1.01;
// Seed odds used when a selection was created without a usable rating price.
const FALLBACK_RATING_ODDS: f64 = 2.0;

/// Weight on pool-derived odds: 0 with an empty pool, 0.2 once any money is in,
/// rising linearly to 1.0 at `threshold`.
pub fn blend_factor(total_pool: f64, threshold: f64) -> f64 {
    if total_pool <= 0.0 {
        return 0.0;
    }
    let ratio = if threshold > 0.0 {
        total_pool / threshold
    } else {
        1.0
    };
    (MIN_BLEND + (1.0 - MIN_BLEND) * ratio).min(1.0)
}

/// Displayed decimal odds for one selection, mixing the rating price with the
/// pool-proportional price. Never below 1.01; rounded to 2 places.
pub fn blend_odds(
    rating_odds: f64,
    pool_total_for_selection: f64,
    total_pool: f64,
    house_cut: f64,
    blend_threshold: f64,
) -> f64 {
    let blend = blend_factor(total_pool, blend_threshold);
    let pool_odds = if pool_total_for_selection > 0.0 && total_pool > 0.0 {
        total_pool * (1.0 - house_cut) / pool_total_for_selection
    } else {
        rating_odds
    };
    let blended = (1.0 - blend) * rating_odds + blend * pool_odds;
    round_to(blended.max(MIN_DISPLAY_ODDS), 2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSelection {
    pub name: String,
    /// Rating-implied decimal odds the selection was listed at, if any.
    #[serde(default)]
    pub rating_odds: Option<f64>,
    #[serde(default)]
    pub pool_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendedOdds {
    pub name: String,
    pub odds: f64,
    pub pool_total: f64,
    pub pool_pct: f64,
    pub rating_odds: f64,
    pub blend_factor: f64,
}

/// Display odds for every selection of a pool market.
pub fn parimutuel_odds(
    selections: &[PoolSelection],
    house_cut: f64,
    blend_threshold: f64,
) -> Vec<BlendedOdds> {
    let total_pool: f64 = selections.iter().map(|s| s.pool_total.max(0.0)).sum();
    let blend = blend_factor(total_pool, blend_threshold);

    selections
        .iter()
        .map(|s| {
            let rating_odds = s
                .rating_odds
                .filter(|o| *o > 1.0)
                .unwrap_or(FALLBACK_RATING_ODDS);
            let pool_total = s.pool_total.max(0.0);
            let pool_pct = if pool_total > 0.0 && total_pool > 0.0 {
                round_to(pool_total / total_pool * 100.0, 1)
            } else {
                0.0
            };
            BlendedOdds {
                name: s.name.clone(),
                odds: blend_odds(rating_odds, pool_total, total_pool, house_cut, blend_threshold),
                pool_total,
                pool_pct,
                rating_odds: round_to(rating_odds, 2),
                blend_factor: round_to(blend, 2),
            }
        })
        .collect()
}
