use std::path::PathBuf;

use darts_odds::elo::{compute_ratings, run_backtest, sorted_ratings};
use darts_odds::logging::init_logging;
use darts_odds::match_data::{TournamentSnapshot, standings};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/tournament_snapshot.json"));
    let snapshot = TournamentSnapshot::load(&path)?;
    let completed = snapshot.completed();

    let report = run_backtest(&snapshot.roster, &completed);
    println!(
        "Backtest: {}/{} correct ({:.1}%)",
        report.correct, report.total, report.accuracy_pct
    );
    for miss in &report.wrong_predictions {
        println!(
            "  #{:<3} predicted {} ({:.1} v {:.1}), won by {}",
            miss.match_id, miss.predicted, miss.elo_a, miss.elo_b, miss.actual
        );
    }

    let ratings = compute_ratings(&snapshot.roster, &completed);
    let table = standings(&snapshot.roster, &completed);
    println!("\n{:<4} {:<24} {:>7} {:>6}", "Elo", "Player", "Rating", "Table");
    for (i, (player, elo)) in sorted_ratings(&ratings).iter().enumerate() {
        let table_pos = table
            .iter()
            .position(|row| &row.player == player)
            .map(|p| (p + 1).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<4} {:<24} {:>7.1} {:>6}", i + 1, player, elo, table_pos);
    }

    Ok(())
}
