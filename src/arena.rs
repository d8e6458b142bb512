use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bot::Bot;
use crate::game::{Board, GameError, Side, WinReason};
use crate::square::Move;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Moves allowed to each side before the side to move loses.
    pub move_limit: Option<usize>,
    /// Print the board after every move.
    pub show_boards: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            move_limit: Some(100),
            show_boards: false,
        }
    }
}

impl MatchConfig {
    pub fn from_json(text: &str) -> Result<Self, GameError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The board decided the game.
    Decided {
        winner: Side,
        winner_name: String,
        moves: usize,
        reason: WinReason,
    },
    /// The side to move had no legal move and lost.
    Stalemate {
        winner: Side,
        winner_name: String,
        moves: usize,
    },
    /// A bot returned a move the board rejected.
    IllegalMove { violator: String, winner: String },
}

impl MatchResult {
    pub fn winner(&self) -> &str {
        match self {
            MatchResult::Decided { winner_name, .. } => winner_name,
            MatchResult::Stalemate { winner_name, .. } => winner_name,
            MatchResult::IllegalMove { winner, .. } => winner,
        }
    }
}

pub struct Match {
    config: MatchConfig,
    board: Board,
    attacker_bot: Box<dyn Bot>,
    defender_bot: Box<dyn Bot>,
}

impl Match {
    pub fn new(
        attacker_bot: Box<dyn Bot>,
        defender_bot: Box<dyn Bot>,
        config: MatchConfig,
    ) -> Result<Self, GameError> {
        let mut board = Board::new();
        if let Some(limit) = config.move_limit {
            board.set_move_limit(limit)?;
        }
        Ok(Match {
            config,
            board,
            attacker_bot,
            defender_bot,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn name(&self, side: Side) -> String {
        match side {
            Side::Attackers => self.attacker_bot.name().to_string(),
            Side::Defenders => self.defender_bot.name().to_string(),
        }
    }

    pub fn play(&mut self) -> MatchResult {
        self.attacker_bot.game_start(Side::Attackers);
        self.defender_bot.game_start(Side::Defenders);

        info!(
            attackers = self.attacker_bot.name(),
            defenders = self.defender_bot.name(),
            "match starting"
        );
        if self.config.show_boards {
            println!("{}", self.board);
        }

        let result = loop {
            if let Some(result) = self.play_turn() {
                break result;
            }
        };

        self.attacker_bot.game_end();
        self.defender_bot.game_end();
        info!(winner = result.winner(), "match finished");
        result
    }

    /// Play one move. Returns the result once the game is over.
    fn play_turn(&mut self) -> Option<MatchResult> {
        if let (Some(winner), Some(reason)) = (self.board.winner(), self.board.win_reason()) {
            return Some(MatchResult::Decided {
                winner,
                winner_name: self.name(winner),
                moves: self.board.move_count(),
                reason,
            });
        }

        let side = self.board.turn();
        if !self.board.has_move(side) {
            let winner = side.opponent();
            info!(%side, "no legal moves");
            return Some(MatchResult::Stalemate {
                winner,
                winner_name: self.name(winner),
                moves: self.board.move_count(),
            });
        }

        let bot = match side {
            Side::Attackers => &mut self.attacker_bot,
            Side::Defenders => &mut self.defender_bot,
        };
        let mv = bot.get_move(&self.board);
        self.handle_move(side, mv)
    }

    fn handle_move(&mut self, side: Side, mv: Option<Move>) -> Option<MatchResult> {
        let bot_name = self.name(side);
        let applied = match mv {
            Some(mv) => self.board.make_move(mv).map(|_| mv),
            None => Err(GameError::InvalidMove("no move returned".to_string())),
        };

        let mv = match applied {
            Ok(mv) => mv,
            Err(e) => {
                warn!(bot = %bot_name, error = %e, "illegal move");
                return Some(MatchResult::IllegalMove {
                    violator: bot_name,
                    winner: self.name(side.opponent()),
                });
            }
        };

        info!(
            ply = self.board.move_count(),
            bot = %bot_name,
            mv = %mv,
            "move played"
        );
        self.attacker_bot.notify_move(mv);
        self.defender_bot.notify_move(mv);

        if self.config.show_boards {
            println!("{}", self.board);
        }

        None
    }
}
