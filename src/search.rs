//! Depth-limited minimax with alpha-beta pruning.
//!
//! Scores are from the defenders' point of view: the defenders maximise
//! (`sense == 1`) and the attackers minimise (`sense == -1`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::{Board, GameError, Piece, Side};
use crate::square::{Direction, Move};

/// A magnitude greater than any position score.
pub const INFTY: i32 = i32::MAX;
/// A position-score magnitude indicating a win.
pub const WINNING_VALUE: i32 = INFTY - 20;
/// A position-score magnitude indicating a forced win on a later move.
/// Smaller than `WINNING_VALUE` so immediate wins are preferred.
pub const WILL_WIN_VALUE: i32 = INFTY - 40;

/// Chooses how deep to search a given position.
pub trait DepthPolicy: Send {
    fn depth(&self, board: &Board) -> u32;
}

/// Always search to the same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDepth(pub u32);

impl DepthPolicy for FixedDepth {
    fn depth(&self, _board: &Board) -> u32 {
        self.0
    }
}

/// Searches one ply deeper once few pieces remain on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialDepth {
    pub base: u32,
    pub sparse_below: usize,
}

impl DepthPolicy for MaterialDepth {
    fn depth(&self, board: &Board) -> u32 {
        let pieces = board.piece_count(Piece::Attacker) + board.piece_count(Piece::Defender);
        if pieces < self.sparse_below {
            self.base + 1
        } else {
            self.base
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Plies searched from the root.
    pub depth: u32,
    /// When set, search one ply deeper below this many non-king pieces.
    pub deepen_below: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            depth: 2,
            deepen_below: None,
        }
    }
}

impl SearchConfig {
    pub fn from_json(text: &str) -> Result<Self, GameError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn policy(&self) -> Box<dyn DepthPolicy> {
        match self.deepen_below {
            Some(sparse_below) => Box::new(MaterialDepth {
                base: self.depth,
                sparse_below,
            }),
            None => Box::new(FixedDepth(self.depth)),
        }
    }
}

pub struct SearchEngine {
    policy: Box<dyn DepthPolicy>,
    last_found: Option<Move>,
    nodes: u64,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self::with_policy(config.policy())
    }

    pub fn with_policy(policy: Box<dyn DepthPolicy>) -> Self {
        SearchEngine {
            policy,
            last_found: None,
            nodes: 0,
        }
    }

    /// The move recorded by the last top-level search, if any.
    pub fn last_found(&self) -> Option<Move> {
        self.last_found
    }

    /// Positions visited by the last top-level search.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Pick a move for the side to move in `board`. `board` itself is never modified.
    pub fn choose_move(&mut self, board: &Board) -> Option<Move> {
        let depth = self.policy.depth(board);
        let sense = match board.turn() {
            Side::Defenders => 1,
            Side::Attackers => -1,
        };

        self.last_found = None;
        self.nodes = 0;
        let score = self.find_move(board, depth, true, sense, -INFTY, INFTY);

        debug!(
            side = %board.turn(),
            depth,
            score,
            nodes = self.nodes,
            chosen = ?self.last_found.map(|m| m.to_string()),
            "search finished"
        );
        self.last_found
    }

    /// Value of `board` searched to `depth` plies within the window (`alpha`, `beta`).
    /// With `save_move`, the best move found at this ply is recorded for
    /// [`SearchEngine::last_found`]. At depth 0 or in a decided game this is
    /// [`static_score`] and nothing is recorded.
    pub fn find_move(
        &mut self,
        board: &Board,
        depth: u32,
        save_move: bool,
        sense: i32,
        mut alpha: i32,
        mut beta: i32,
    ) -> i32 {
        debug_assert!(sense == 1 || sense == -1);
        self.nodes += 1;

        if depth == 0 || board.winner().is_some() {
            return static_score(board);
        }
        debug_assert_eq!(
            sense == 1,
            board.turn() == Side::Defenders,
            "sense must match the side to move"
        );

        if sense == 1 {
            let mut best = -INFTY;
            for mv in board.legal_moves(Side::Defenders) {
                let response = self.respond(board, mv, depth, -1, alpha, beta);
                if response >= best {
                    best = response;
                    if save_move {
                        self.last_found = Some(mv);
                    }
                    alpha = alpha.max(best);
                    if beta <= alpha {
                        break;
                    }
                }
            }
            best
        } else {
            let mut best = INFTY;
            for mv in board.legal_moves(Side::Attackers) {
                let response = self.respond(board, mv, depth, 1, alpha, beta);
                if response <= best {
                    best = response;
                    if save_move {
                        self.last_found = Some(mv);
                    }
                    beta = beta.min(best);
                    if beta <= alpha {
                        break;
                    }
                }
            }
            best
        }
    }

    fn respond(
        &mut self,
        board: &Board,
        mv: Move,
        depth: u32,
        sense: i32,
        alpha: i32,
        beta: i32,
    ) -> i32 {
        let mut next = board.clone();
        // Unreachable while `sense` matches the side to move: `mv` came from its legal moves
        if next.make_move(mv).is_err() {
            return static_score(&next);
        }
        self.find_move(&next, depth - 1, false, sense, alpha, beta)
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

/// Heuristic value of `board` for the defenders.
pub fn static_score(board: &Board) -> i32 {
    let Some(king) = board.king_position() else {
        return -INFTY;
    };
    if king.is_edge() {
        return INFTY;
    }

    let open_line = Direction::ALL.iter().any(|&dir| {
        king.line(dir)
            .last()
            .is_some_and(|&edge| board.is_unblocked(king, edge))
    });
    if open_line {
        return match board.turn() {
            Side::Attackers => WILL_WIN_VALUE,
            Side::Defenders => WINNING_VALUE,
        };
    }

    board.piece_count(Piece::Defender) as i32 - board.piece_count(Piece::Attacker) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Plain minimax without pruning.
    fn minimax(board: &Board, depth: u32, sense: i32) -> i32 {
        if depth == 0 || board.winner().is_some() {
            return static_score(board);
        }
        let side = if sense == 1 {
            Side::Defenders
        } else {
            Side::Attackers
        };
        let mut best = if sense == 1 { -INFTY } else { INFTY };
        for mv in board.legal_moves(side) {
            let mut next = board.clone();
            next.make_move(mv).unwrap();
            let value = minimax(&next, depth - 1, -sense);
            best = if sense == 1 {
                best.max(value)
            } else {
                best.min(value)
            };
        }
        best
    }

    fn sense_of(board: &Board) -> i32 {
        match board.turn() {
            Side::Defenders => 1,
            Side::Attackers => -1,
        }
    }

    /// Encoded board built from a picture with row 9 first, side to move in front.
    fn position(turn: char, rows: [&str; 9]) -> Board {
        let mut cells = vec!['-'; 81];
        for (i, line) in rows.iter().enumerate() {
            let row = 8 - i;
            for (col, c) in line.chars().filter(|c| !c.is_whitespace()).enumerate() {
                cells[row * 9 + col] = c;
            }
        }
        let encoded: String = std::iter::once(turn).chain(cells).collect();
        Board::from_encoded(&encoded).unwrap()
    }

    #[test]
    fn test_static_score_start_is_material() {
        let board = Board::new();
        assert_eq!(static_score(&board), 8 - 16);
    }

    #[test]
    fn test_static_score_sentinels() {
        let captured = position('W', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - B - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
        ]);
        assert_eq!(static_score(&captured), -INFTY);

        let escaped = position('B', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "K - - - B - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
        ]);
        assert_eq!(static_score(&escaped), INFTY);
    }

    #[test]
    fn test_static_score_open_line() {
        // only the west line from c3 is open
        let rows = [
            "- - B - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - K - - - - - B",
            "- - B - - - - - -",
            "- - - - - - - - -",
        ];
        assert_eq!(static_score(&position('B', rows)), WILL_WIN_VALUE);
        assert_eq!(static_score(&position('W', rows)), WINNING_VALUE);

        let boxed = position('W', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - B - - - - - -",
            "- B K B - - - - -",
            "- - B - - - - - -",
            "- - - - - - - - -",
        ]);
        assert_eq!(static_score(&boxed), 0 - 4);
    }

    #[test]
    fn test_depth_zero_is_static_score() {
        let board = Board::new();
        let mut engine = SearchEngine::default();

        let score = engine.find_move(&board, 0, true, -1, -INFTY, INFTY);
        assert_eq!(score, static_score(&board));
        assert_eq!(engine.last_found(), None);
    }

    #[test]
    fn test_decided_game_is_not_searched() {
        let mut board = position('W', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - K - - - - - -",
            "- - - - - - - B -",
        ]);
        board.make_move("c2-c1".parse().unwrap()).unwrap();
        assert!(board.is_game_over());

        let mut engine = SearchEngine::default();
        let score = engine.find_move(&board, 3, true, -1, -INFTY, INFTY);
        assert_eq!(score, INFTY);
        assert_eq!(engine.last_found(), None);
        assert_eq!(engine.choose_move(&board), None);
    }

    #[test]
    fn test_start_position_depth_two() {
        let board = Board::new();
        let before = board.encoded();
        let mut engine = SearchEngine::new(SearchConfig::default());

        let score = engine.find_move(&board, 2, true, -1, -INFTY, INFTY);
        assert_eq!(score, -8);
        let chosen = engine.last_found().unwrap();
        assert!(board.legal_moves(Side::Attackers).contains(&chosen));

        // the caller's board is left alone
        assert_eq!(board.encoded(), before);
        assert_eq!(board.move_count(), 0);
    }

    #[test]
    fn test_ties_go_to_the_later_move() {
        let mut board = Board::new();
        let mut engine = SearchEngine::with_policy(Box::new(FixedDepth(1)));

        for side in [Side::Attackers, Side::Defenders] {
            assert_eq!(board.turn(), side);
            let scored: Vec<(Move, i32)> = board
                .legal_moves(side)
                .into_iter()
                .map(|mv| {
                    let mut next = board.clone();
                    next.make_move(mv).unwrap();
                    (mv, static_score(&next))
                })
                .collect();
            let best = match side {
                Side::Attackers => scored.iter().map(|&(_, s)| s).min().unwrap(),
                Side::Defenders => scored.iter().map(|&(_, s)| s).max().unwrap(),
            };
            assert!(best > -INFTY && best < INFTY);
            let tied: Vec<Move> = scored
                .iter()
                .filter(|&&(_, s)| s == best)
                .map(|&(mv, _)| mv)
                .collect();
            assert!(tied.len() > 1);

            let chosen = engine.choose_move(&board).unwrap();
            assert_eq!(Some(&chosen), tied.last());
            assert_ne!(Some(&chosen), tied.first());
            board.make_move(chosen).unwrap();
        }
    }

    #[test]
    fn test_choose_move_uses_side_to_move() {
        let mut board = Board::new();
        let mut engine = SearchEngine::default();

        let first = engine.choose_move(&board).unwrap();
        assert!(board.is_legal(first.from(), first.to()));
        assert!(engine.nodes() > 1);

        board.make_move(first).unwrap();
        let reply = engine.choose_move(&board).unwrap();
        assert_eq!(board.get(reply.from()).side(), Some(Side::Defenders));
    }

    #[test]
    fn test_defenders_take_the_escape() {
        let board = position('W', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - B - - -",
            "- - - - - - - - -",
            "- - K - - - - - -",
            "B - - - - - - - -",
            "- - - - - - - - -",
        ]);
        let mut engine = SearchEngine::new(SearchConfig {
            depth: 1,
            deepen_below: None,
        });

        let mv = engine.choose_move(&board).unwrap();
        assert_eq!(mv.from().to_string(), "c3");
        assert!(mv.to().is_edge());
    }

    #[test]
    fn test_attackers_capture_the_king() {
        let board = position('B', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- B - - - - - - -",
            "- K - - - - - - -",
            "- - - - - - B - -",
        ]);
        let mut engine = SearchEngine::new(SearchConfig {
            depth: 2,
            deepen_below: None,
        });

        let mv = engine.choose_move(&board).unwrap();
        assert_eq!(mv.to_string(), "g1-b1");

        let mut next = board.clone();
        next.make_move(mv).unwrap();
        assert_eq!(next.winner(), Some(Side::Attackers));
    }

    #[test]
    fn test_pruning_preserves_minimax_value() {
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..4 {
            let mut board = Board::new();
            for _ in 0..rng.gen_range(0..8) {
                let moves = board.legal_moves(board.turn());
                if moves.is_empty() || board.is_game_over() {
                    break;
                }
                board.make_move(moves[rng.gen_range(0..moves.len())]).unwrap();
            }
            if board.is_game_over() {
                continue;
            }

            let sense = sense_of(&board);
            let mut engine = SearchEngine::default();
            let pruned = engine.find_move(&board, 2, true, sense, -INFTY, INFTY);
            assert_eq!(pruned, minimax(&board, 2, sense), "{}", board);
        }
    }

    #[test]
    fn test_pruning_preserves_value_at_depth_three() {
        let board = position('B', [
            "- - - B - - - - -",
            "- - - - - - - - -",
            "- - - - W - - - -",
            "- - - - - - - - -",
            "- - - W K - - - B",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- B - - - - - - -",
            "- - - - - - - - -",
        ]);
        let sense = sense_of(&board);
        let mut engine = SearchEngine::default();

        let pruned = engine.find_move(&board, 3, true, sense, -INFTY, INFTY);
        assert_eq!(pruned, minimax(&board, 3, sense));
    }

    #[test]
    fn test_config_from_json() {
        let config = SearchConfig::from_json(r#"{"depth": 3}"#).unwrap();
        assert_eq!(config.depth, 3);
        assert_eq!(config.deepen_below, None);

        let config = SearchConfig::from_json("{}").unwrap();
        assert_eq!(config, SearchConfig::default());

        assert!(matches!(
            SearchConfig::from_json("{\"depth\": -1}"),
            Err(GameError::Config(_))
        ));
    }

    #[test]
    fn test_material_depth_policy() {
        let policy = MaterialDepth {
            base: 2,
            sparse_below: 10,
        };
        assert_eq!(policy.depth(&Board::new()), 2);

        let sparse = position('B', [
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - - - - - -",
            "- - - - K - - - -",
            "- - - - W - - - -",
            "- - - - - - - - -",
            "- - - - B - - - -",
            "- - - - - - - - -",
        ]);
        assert_eq!(policy.depth(&sparse), 3);
        assert_eq!(FixedDepth(2).depth(&sparse), 2);
    }
}
