use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use darts_odds::config::EngineConfig;
use darts_odds::elo::{compute_ratings, sorted_ratings};
use darts_odds::knockout::quarterfinal_odds;
use darts_odds::logging::init_logging;
use darts_odds::match_data::{TournamentSnapshot, standings};
use darts_odds::parimutuel::{PoolSelection, parimutuel_odds};
use darts_odds::props::prop_markets_for_match;
use darts_odds::roster::PlayerId;
use darts_odds::simulation::{simulate_outright, simulate_outright_partitioned};
use darts_odds::win_prob::match_odds;

fn main() -> Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    init_logging();

    let config_path = std::env::var_os("DARTS_CONFIG").map(PathBuf::from);
    let config = EngineConfig::load(config_path.as_deref())?;

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/tournament_snapshot.json"));
    let snapshot = TournamentSnapshot::load(&path)?;

    for m in &snapshot.matches {
        if let Err(err) = m.check() {
            warn!(match_id = m.match_id, %err, "suspicious match record");
        }
    }

    let completed = snapshot.completed();
    let scheduled = snapshot.scheduled();
    let ratings = compute_ratings(&snapshot.roster, &completed);
    info!(
        players = snapshot.roster.len(),
        completed = completed.len(),
        scheduled = scheduled.len(),
        "snapshot loaded"
    );

    println!(
        "Darts odds report ({})",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("Snapshot: {}", path.display());

    println!("\nRatings");
    let ranked = sorted_ratings(&ratings);
    for (i, (player, elo)) in ranked.iter().enumerate() {
        let games = ratings.get(player).map(|r| r.games_played).unwrap_or(0);
        println!("{:>2}. {:<24} {:>7.1}  ({} games)", i + 1, player, elo, games);
    }

    println!("\nStandings");
    for (i, row) in standings(&snapshot.roster, &completed).iter().enumerate() {
        println!(
            "{:>2}. {:<24} W{:<2} L{:<2} D{:<2} legs {:>+3}",
            i + 1,
            row.player,
            row.wins,
            row.losses,
            row.draws,
            row.leg_diff
        );
    }

    println!("\nMatch odds");
    for odds in match_odds(&ratings, &scheduled) {
        println!(
            "R{:<2} #{:<3} {:<24} {:>6.2}  v  {:>6.2} {}",
            odds.round,
            odds.match_id,
            odds.player_a,
            odds.quote_a.decimal_odds,
            odds.quote_b.decimal_odds,
            odds.player_b
        );
    }

    let outright = if config.partitions > 0 {
        simulate_outright_partitioned(
            &snapshot,
            &ratings,
            config.iterations,
            config.seed,
            config.partitions,
        )
    } else {
        simulate_outright(&snapshot, &ratings, config.iterations, config.seed)
    };
    println!(
        "\nOutright winner ({} simulations, seed {})",
        config.iterations, config.seed
    );
    if outright.is_empty() {
        println!("  (not enough players for an 8-player bracket)");
    }
    for entry in &outright {
        let q = entry.quote.rounded();
        println!(
            "{:<24} {:>7.2}  win {:>6.2}%  top8 {:>5.1}%",
            q.selection,
            q.decimal_odds,
            q.true_probability * 100.0,
            entry.top8_pct
        );
    }

    let top8: Vec<PlayerId> = ranked.iter().take(8).map(|(p, _)| p.clone()).collect();
    let quarterfinals = quarterfinal_odds(&ratings, &top8);
    if !quarterfinals.is_empty() {
        println!("\nQuarterfinals (top 8 by elo)");
        for qf in &quarterfinals {
            println!(
                "{} {:<24} {:>6.2}  v  {:>6.2} {}",
                qf.label,
                qf.higher_seed,
                qf.higher.decimal_odds,
                qf.lower.decimal_odds,
                qf.lower_seed
            );
        }
    }

    if let Some(next) = scheduled.first() {
        println!(
            "\nProps: round {} match {} ({} v {})",
            next.round, next.match_id, next.player_a, next.player_b
        );
        for market in prop_markets_for_match(&ratings, next) {
            let prices: Vec<String> = market
                .selections
                .iter()
                .map(|s| format!("{} {:.2}", s.name, s.odds))
                .collect();
            println!("  {}: {}", market.name, prices.join(" | "));
        }

        // Illustrative pool on the next match: the favourite takes most of the money.
        let odds = match_odds(&ratings, std::slice::from_ref(next));
        if let Some(h2h) = odds.first() {
            let pool = [
                PoolSelection {
                    name: h2h.player_a.to_string(),
                    rating_odds: Some(h2h.quote_a.decimal_odds),
                    pool_total: 180.0,
                },
                PoolSelection {
                    name: h2h.player_b.to_string(),
                    rating_odds: Some(h2h.quote_b.decimal_odds),
                    pool_total: 70.0,
                },
            ];
            println!(
                "\nPool blend (cut {:.0}%, threshold {})",
                config.house_cut * 100.0,
                config.blend_threshold
            );
            for row in parimutuel_odds(&pool, config.house_cut, config.blend_threshold) {
                println!(
                    "  {:<24} {:>6.2}  (rating {:.2}, pool {:.1}%, blend {:.2})",
                    row.name, row.odds, row.rating_odds, row.pool_pct, row.blend_factor
                );
            }
        }
    }

    Ok(())
}
