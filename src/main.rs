use tablut_arena::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("Tablut Arena - engine self-play");
    println!("===============================\n");

    // Optional JSON overrides, e.g. TABLUT_SEARCH='{"depth": 3}'
    let search = match std::env::var("TABLUT_SEARCH") {
        Ok(text) => SearchConfig::from_json(&text)?,
        Err(_) => SearchConfig::default(),
    };
    let config = match std::env::var("TABLUT_MATCH") {
        Ok(text) => MatchConfig::from_json(&text)?,
        Err(_) => MatchConfig {
            move_limit: Some(60),
            show_boards: true,
        },
    };

    let attackers = Box::new(AlphaBetaBot::new("AlphaBeta-Black".to_string(), search));
    let defenders = Box::new(AlphaBetaBot::new("AlphaBeta-White".to_string(), search));

    let mut game = Match::new(attackers, defenders, config)?;
    let result = game.play();

    println!("\n===============================");
    println!("Match Result:");
    match &result {
        MatchResult::Decided {
            winner,
            winner_name,
            moves,
            reason,
        } => {
            println!(
                "  {} wins as {} in {} moves ({:?})",
                winner_name, winner, moves, reason
            );
        }
        MatchResult::Stalemate {
            winner,
            winner_name,
            moves,
        } => {
            println!(
                "  {} wins as {} in {} moves: opponent has no legal move",
                winner_name, winner, moves
            );
        }
        MatchResult::IllegalMove { violator, winner } => {
            println!("  {} made an illegal move - {} wins", violator, winner);
        }
    }
    println!("\nFinal position:\n{}", game.board());

    Ok(())
}
