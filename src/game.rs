use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::square::{Direction, Move, SIZE, SQUARE_COUNT, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attackers,
    Defenders,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::Attackers => Side::Defenders,
            Side::Defenders => Side::Attackers,
        }
    }

    /// Single-character code used as the first character of an encoded board.
    pub fn symbol(&self) -> char {
        match self {
            Side::Attackers => 'B',
            Side::Defenders => 'W',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Attackers => write!(f, "Attackers"),
            Side::Defenders => write!(f, "Defenders"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Piece {
    #[default]
    Empty,
    Attacker,
    Defender,
    King,
}

impl Piece {
    /// The side this piece plays for. The king plays for the defenders.
    pub fn side(&self) -> Option<Side> {
        match self {
            Piece::Empty => None,
            Piece::Attacker => Some(Side::Attackers),
            Piece::Defender | Piece::King => Some(Side::Defenders),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Piece::Empty
    }

    pub fn symbol(&self) -> char {
        match self {
            Piece::Empty => '-',
            Piece::Attacker => 'B',
            Piece::Defender => 'W',
            Piece::King => 'K',
        }
    }

    fn from_symbol(c: char) -> Option<Piece> {
        match c {
            '-' => Some(Piece::Empty),
            'B' => Some(Piece::Attacker),
            'W' => Some(Piece::Defender),
            'K' => Some(Piece::King),
            _ => None,
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Game already over")]
    GameOver,
    #[error("Move limit {limit} already exceeded after {moves} moves")]
    InvalidMoveLimit { limit: usize, moves: usize },
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid board encoding: {0}")]
    InvalidEncoding(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinReason {
    Escape,
    KingCaptured,
    Repetition,
    MoveLimit,
}

/// The throne (centre) square.
pub const THRONE: Square = match Square::new(SIZE / 2, SIZE / 2) {
    Some(sq) => sq,
    None => panic!("throne lies off the board"),
};

const INITIAL_ATTACKERS: [(usize, usize); 16] = [
    (3, 0),
    (4, 0),
    (5, 0),
    (4, 1),
    (3, 8),
    (4, 8),
    (5, 8),
    (4, 7),
    (0, 3),
    (0, 4),
    (0, 5),
    (1, 4),
    (8, 3),
    (8, 4),
    (8, 5),
    (7, 4),
];

const INITIAL_DEFENDERS: [(usize, usize); 8] = [
    (4, 5),
    (5, 4),
    (4, 3),
    (3, 4),
    (6, 4),
    (2, 4),
    (4, 6),
    (4, 2),
];

/// One visited position: its canonical encoding and the outcome in force there,
/// linked to the position before it. Clones of a board share their common past.
#[derive(Debug)]
struct PositionRecord {
    encoded: String,
    winner: Option<Side>,
    reason: Option<WinReason>,
    previous: Option<Arc<PositionRecord>>,
}

impl PositionRecord {
    /// This record and every earlier one, newest first.
    fn chain(&self) -> impl Iterator<Item = &PositionRecord> {
        std::iter::successors(Some(self), |record| record.previous.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    grid: [Piece; SQUARE_COUNT],
    turn: Side,
    king_position: Option<Square>,
    move_count: usize,
    move_limit: Option<usize>,
    /// `2 * move_limit`, saturated.
    ply_limit: Option<usize>,
    winner: Option<Side>,
    reason: Option<WinReason>,
    /// Latest position since the base position.
    history: Option<Arc<PositionRecord>>,
}

impl Board {
    /// A board in the standard starting position, attackers to move.
    pub fn new() -> Self {
        let mut board = Board::empty(Side::Attackers);

        for &(col, row) in &INITIAL_ATTACKERS {
            if let Some(sq) = Square::new(col, row) {
                board.grid[sq.index()] = Piece::Attacker;
            }
        }
        for &(col, row) in &INITIAL_DEFENDERS {
            if let Some(sq) = Square::new(col, row) {
                board.grid[sq.index()] = Piece::Defender;
            }
        }
        board.grid[THRONE.index()] = Piece::King;
        board.king_position = Some(THRONE);

        board.clear_undo();
        board
    }

    fn empty(turn: Side) -> Self {
        Board {
            grid: [Piece::Empty; SQUARE_COUNT],
            turn,
            king_position: None,
            move_count: 0,
            move_limit: None,
            ply_limit: None,
            winner: None,
            reason: None,
            history: None,
        }
    }

    /// A board whose base position is `encoded` (as produced by [`Board::encoded`]).
    pub fn from_encoded(encoded: &str) -> Result<Self, GameError> {
        let turn = match encoded.chars().next() {
            Some('B') => Side::Attackers,
            Some('W') => Side::Defenders,
            _ => {
                return Err(GameError::InvalidEncoding(
                    "missing side-to-move character".to_string(),
                ));
            }
        };
        let mut board = Board::empty(turn);
        board.decode(encoded)?;
        board.clear_undo();
        Ok(board)
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn win_reason(&self) -> Option<WinReason> {
        self.reason
    }

    /// True iff the game was decided by a repeated position.
    pub fn repeated_position(&self) -> bool {
        self.reason == Some(WinReason::Repetition)
    }

    pub fn is_game_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn king_position(&self) -> Option<Square> {
        self.king_position
    }

    /// Number of moves since the base position that have not been undone.
    pub fn move_count(&self) -> usize {
        self.move_count
    }

    pub fn move_limit(&self) -> Option<usize> {
        self.move_limit
    }

    /// Limit each side to `limit` moves. Fails if `2 * limit <= move_count()`.
    pub fn set_move_limit(&mut self, limit: usize) -> Result<(), GameError> {
        let plies = limit.saturating_mul(2);
        if plies <= self.move_count {
            return Err(GameError::InvalidMoveLimit {
                limit,
                moves: self.move_count,
            });
        }
        self.move_limit = Some(limit);
        self.ply_limit = Some(plies);
        Ok(())
    }

    pub fn get(&self, sq: Square) -> Piece {
        self.grid[sq.index()]
    }

    /// Place `piece` on `sq` directly, bypassing move rules and history.
    pub fn put(&mut self, piece: Piece, sq: Square) {
        if piece == Piece::King {
            if let Some(old) = self.king_position {
                self.grid[old.index()] = Piece::Empty;
            }
            self.king_position = Some(sq);
        } else if self.king_position == Some(sq) {
            self.king_position = None;
        }
        self.grid[sq.index()] = piece;
    }

    pub fn piece_count(&self, piece: Piece) -> usize {
        self.grid.iter().filter(|&&p| p == piece).count()
    }

    /// Encodings of every position since the base position, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        let newest_first: Vec<&str> = self
            .records()
            .map(|record| record.encoded.as_str())
            .collect();
        newest_first.into_iter().rev()
    }

    fn records(&self) -> impl Iterator<Item = &PositionRecord> {
        self.history.iter().flat_map(|latest| latest.chain())
    }

    /// True iff every square after `from` up to and including `to` is empty.
    pub fn is_unblocked(&self, from: Square, to: Square) -> bool {
        match from.path_to(to) {
            Some(path) => path.iter().all(|&sq| self.get(sq).is_empty()),
            None => false,
        }
    }

    /// True iff `from` holds a piece of the side to move.
    pub fn is_legal_from(&self, from: Square) -> bool {
        self.get(from).side() == Some(self.turn)
    }

    /// True iff `from`-`to` is a legal move for the side to move.
    pub fn is_legal(&self, from: Square, to: Square) -> bool {
        self.is_legal_from(from) && self.is_legal_for_piece(from, to)
    }

    fn is_legal_for_piece(&self, from: Square, to: Square) -> bool {
        if to == THRONE && self.get(from) != Piece::King {
            return false;
        }
        self.is_unblocked(from, to)
    }

    /// All legal moves for `side`, regardless of whose turn it is.
    pub fn legal_moves(&self, side: Side) -> Vec<Move> {
        let mut moves = Vec::new();

        for from in Square::all() {
            let piece = self.get(from);
            if piece.side() != Some(side) {
                continue;
            }
            for dir in Direction::ALL {
                for &to in from.line(dir) {
                    if !self.get(to).is_empty() {
                        break;
                    }
                    // Only the king may stop on the throne, but others may pass over it
                    if to == THRONE && piece != Piece::King {
                        continue;
                    }
                    if let Some(mv) = Move::new(from, to) {
                        moves.push(mv);
                    }
                }
            }
        }

        moves
    }

    pub fn has_move(&self, side: Side) -> bool {
        !self.legal_moves(side).is_empty()
    }

    /// Make a move and update the game state.
    pub fn make_move(&mut self, mv: Move) -> Result<(), GameError> {
        self.check_escape();
        if self.is_game_over() {
            return Err(GameError::GameOver);
        }

        let (from, to) = (mv.from(), mv.to());
        if !self.is_legal(from, to) {
            return Err(GameError::InvalidMove(format!("Move {} is not legal", mv)));
        }

        let piece = self.get(from);
        self.grid[from.index()] = Piece::Empty;
        self.grid[to.index()] = piece;
        if piece == Piece::King {
            self.king_position = Some(to);
        }
        self.check_escape();

        self.move_count += 1;
        self.turn = self.turn.opponent();

        self.check_captures(to);
        let encoded = self.encoded();
        self.check_repeated(&encoded);
        self.check_move_limit();
        self.record_position(encoded);

        Ok(())
    }

    fn declare(&mut self, winner: Side, reason: WinReason) {
        if self.winner.is_none() {
            trace!(%winner, ?reason, "game decided");
            self.winner = Some(winner);
            self.reason = Some(reason);
        }
    }

    fn check_escape(&mut self) {
        if self.king_position.is_some_and(|k| k.is_edge()) {
            self.declare(Side::Defenders, WinReason::Escape);
        }
    }

    fn check_captures(&mut self, moved_to: Square) {
        for dir in Direction::ALL {
            if let &[target, beyond, ..] = moved_to.line(dir) {
                self.capture(moved_to, target, beyond);
            }
        }
    }

    /// Capture the piece on `target` between `moved_to` and `beyond` if the rules allow.
    fn capture(&mut self, moved_to: Square, target: Square, beyond: Square) {
        let victim = self.get(target);
        if victim.is_empty() || victim.side() == self.get(moved_to).side() {
            return;
        }

        let captured = if victim == Piece::King && is_throne_area(target) {
            self.is_king_encircled(target)
        } else {
            self.is_hostile(victim, beyond)
        };

        if captured {
            trace!(square = %target, piece = %victim, "captured");
            self.grid[target.index()] = Piece::Empty;
            if victim == Piece::King {
                self.king_position = None;
                self.declare(Side::Attackers, WinReason::KingCaptured);
            }
        }
    }

    /// On or beside the throne the king must be hostile-bound on all four sides.
    fn is_king_encircled(&self, king: Square) -> bool {
        Direction::ALL.iter().all(|&dir| {
            king.neighbor(dir)
                .is_some_and(|sq| self.is_hostile(Piece::Defender, sq))
        })
    }

    /// Whether `sq` helps capture a `piece` standing next to it.
    fn is_hostile(&self, piece: Piece, sq: Square) -> bool {
        let occupant = self.get(sq);
        if occupant.is_empty() {
            // An empty throne is hostile to everyone
            return sq == THRONE;
        }
        if piece == Piece::Defender && sq == THRONE {
            return self.throne_attackers() >= 3;
        }
        match (piece.side(), occupant.side()) {
            (Some(side), Some(other)) => side.opponent() == other,
            _ => false,
        }
    }

    fn throne_attackers(&self) -> usize {
        Direction::ALL
            .iter()
            .filter_map(|&dir| THRONE.neighbor(dir))
            .filter(|&sq| self.get(sq) == Piece::Attacker)
            .count()
    }

    /// A position seen before hands the game to the side to move.
    fn check_repeated(&mut self, encoded: &str) {
        if self.records().any(|record| record.encoded == encoded) {
            self.declare(self.turn, WinReason::Repetition);
        }
    }

    fn check_move_limit(&mut self) {
        // The side to move would exceed the limit
        if self.ply_limit.is_some_and(|plies| self.move_count >= plies) {
            self.declare(self.turn.opponent(), WinReason::MoveLimit);
        }
    }

    fn record_position(&mut self, encoded: String) {
        trace!(%encoded, "position recorded");
        self.history = Some(Arc::new(PositionRecord {
            encoded,
            winner: self.winner,
            reason: self.reason,
            previous: self.history.take(),
        }));
    }

    /// Undo one move. Has no effect on the base position.
    pub fn undo(&mut self) {
        if self.move_count == 0 {
            return;
        }
        let previous = self
            .history
            .take()
            .and_then(|latest| latest.previous.clone());
        if let Some(record) = &previous {
            let restored = self.decode(&record.encoded);
            debug_assert!(restored.is_ok(), "history holds only encoded positions");
            self.winner = record.winner;
            self.reason = record.reason;
        }
        self.history = previous;
        self.move_count -= 1;
        self.turn = self.turn.opponent();
    }

    /// Forget the history, making the current position the base position.
    /// Does not modify the current position or win status.
    pub fn clear_undo(&mut self) {
        self.history = None;
        self.move_count = 0;
        let encoded = self.encoded();
        self.record_position(encoded);
    }

    /// Canonical key for this position: side to move, then every square in index order.
    pub fn encoded(&self) -> String {
        std::iter::once(self.turn.symbol())
            .chain(self.grid.iter().map(Piece::symbol))
            .collect()
    }

    /// Restore the grid contents (and the cached king square) from `encoded`.
    /// The side to move and the outcome are left alone.
    pub fn decode(&mut self, encoded: &str) -> Result<(), GameError> {
        let cells: Vec<char> = encoded.chars().skip(1).collect();
        if cells.len() != SQUARE_COUNT {
            return Err(GameError::InvalidEncoding(format!(
                "expected {} squares, found {}",
                SQUARE_COUNT,
                cells.len()
            )));
        }

        let mut grid = [Piece::Empty; SQUARE_COUNT];
        let mut king = None;
        for (index, &c) in cells.iter().enumerate() {
            let piece = Piece::from_symbol(c).ok_or_else(|| {
                GameError::InvalidEncoding(format!("unknown piece '{}' at {}", c, index))
            })?;
            if piece == Piece::King {
                if king.is_some() {
                    return Err(GameError::InvalidEncoding("more than one king".to_string()));
                }
                king = Square::from_index(index);
            }
            grid[index] = piece;
        }

        self.grid = grid;
        self.king_position = king;
        Ok(())
    }

    /// Text rendering, row 9 at the top. With `coordinates`, rows and columns are labelled.
    pub fn render(&self, coordinates: bool) -> String {
        let mut out = String::new();
        for row in (0..SIZE).rev() {
            if coordinates {
                out.push_str(&format!("{:2}", row + 1));
            } else {
                out.push_str("  ");
            }
            for col in 0..SIZE {
                if let Some(sq) = Square::new(col, row) {
                    out.push(' ');
                    out.push(self.get(sq).symbol());
                }
            }
            out.push('\n');
        }
        if coordinates {
            out.push_str("  ");
            for c in 'a'..='i' {
                out.push(' ');
                out.push(c);
            }
            out.push('\n');
        }
        out
    }
}

/// The throne and its four orthogonal neighbours.
fn is_throne_area(sq: Square) -> bool {
    sq == THRONE || THRONE.col().abs_diff(sq.col()) + THRONE.row().abs_diff(sq.row()) == 1
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(true))
    }
}
