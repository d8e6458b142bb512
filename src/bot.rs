use crate::game::{Board, Side};
use crate::search::{SearchConfig, SearchEngine};
use crate::square::Move;

/// Trait that all players must implement
pub trait Bot: Send {
    /// Get the name of the bot
    fn name(&self) -> &str;

    /// Get the next move for the side to move in `board`
    fn get_move(&mut self, board: &Board) -> Option<Move>;

    /// Notified when the game starts
    fn game_start(&mut self, _side: Side) {}

    /// Notified when a move is made (by either side)
    fn notify_move(&mut self, _mv: Move) {}

    /// Notified when the game ends
    fn game_end(&mut self) {}
}

/// A bot that plays the move found by the alpha-beta search
pub struct AlphaBetaBot {
    name: String,
    engine: SearchEngine,
}

impl AlphaBetaBot {
    pub fn new(name: String, config: SearchConfig) -> Self {
        AlphaBetaBot {
            name,
            engine: SearchEngine::new(config),
        }
    }
}

impl Bot for AlphaBetaBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, board: &Board) -> Option<Move> {
        self.engine.choose_move(board)
    }
}

/// Plays the first legal move; handy as a weak sparring partner
pub struct FirstMoveBot {
    name: String,
}

impl FirstMoveBot {
    pub fn new(name: String) -> Self {
        FirstMoveBot { name }
    }
}

impl Bot for FirstMoveBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, board: &Board) -> Option<Move> {
        board.legal_moves(board.turn()).first().copied()
    }
}
