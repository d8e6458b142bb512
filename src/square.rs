use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::game::GameError;

/// Number of squares on a side of the board.
pub const SIZE: usize = 9;
pub const SQUARE_COUNT: usize = SIZE * SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One of the 81 cells. Column 0 is file `a`, row 0 is rank `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Square(u8);

/// Rook lines for every square and direction, nearest square first.
static ROOK_LINES: LazyLock<Vec<[Vec<Square>; 4]>> = LazyLock::new(|| {
    (0..SQUARE_COUNT)
        .map(|index| {
            let from = Square(index as u8);
            Direction::ALL.map(|dir| walk(from, dir))
        })
        .collect()
});

fn walk(from: Square, dir: Direction) -> Vec<Square> {
    let (dc, dr) = dir.delta();
    let mut col = from.col() as i32;
    let mut row = from.row() as i32;
    let mut line = Vec::with_capacity(SIZE - 1);
    loop {
        col += dc;
        row += dr;
        match Square::at(col, row) {
            Some(sq) => line.push(sq),
            None => break,
        }
    }
    line
}

impl Square {
    /// The square at (`col`, `row`), or `None` when off the board.
    pub const fn new(col: usize, row: usize) -> Option<Square> {
        if col < SIZE && row < SIZE {
            Some(Square((row * SIZE + col) as u8))
        } else {
            None
        }
    }

    fn at(col: i32, row: i32) -> Option<Square> {
        if col < 0 || row < 0 {
            return None;
        }
        Square::new(col as usize, row as usize)
    }

    pub const fn from_index(index: usize) -> Option<Square> {
        if index < SQUARE_COUNT {
            Some(Square(index as u8))
        } else {
            None
        }
    }

    /// All squares in index order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..SQUARE_COUNT as u8).map(Square)
    }

    pub fn col(self) -> usize {
        self.0 as usize % SIZE
    }

    pub fn row(self) -> usize {
        self.0 as usize / SIZE
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_edge(self) -> bool {
        let last = SIZE - 1;
        self.col() == 0 || self.row() == 0 || self.col() == last || self.row() == last
    }

    /// Direction of travel from `self` to `other`, if they share a row or column.
    pub fn direction(self, other: Square) -> Option<Direction> {
        if self == other {
            return None;
        }
        if self.col() == other.col() {
            Some(if other.row() > self.row() {
                Direction::North
            } else {
                Direction::South
            })
        } else if self.row() == other.row() {
            Some(if other.col() > self.col() {
                Direction::East
            } else {
                Direction::West
            })
        } else {
            None
        }
    }

    /// Squares met walking from `self` to the edge in `dir`, excluding `self`.
    pub fn line(self, dir: Direction) -> &'static [Square] {
        &ROOK_LINES[self.index()][dir.index()]
    }

    /// The orthogonally adjacent square in `dir`, if any.
    pub fn neighbor(self, dir: Direction) -> Option<Square> {
        self.line(dir).first().copied()
    }

    /// Squares strictly between `self` and `other` followed by `other` itself.
    pub fn path_to(self, other: Square) -> Option<&'static [Square]> {
        let dir = self.direction(other)?;
        let line = self.line(dir);
        let len = self.col().abs_diff(other.col()) + self.row().abs_diff(other.row());
        Some(&line[..len])
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.col() as u8) as char, self.row() + 1)
    }
}

fn parse_col(c: char) -> Option<usize> {
    ('a'..='i').contains(&c).then(|| c as usize - 'a' as usize)
}

fn parse_row(c: char) -> Option<usize> {
    ('1'..='9').contains(&c).then(|| c as usize - '1' as usize)
}

impl FromStr for Square {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let parsed = match (chars.next(), chars.next(), chars.next()) {
            (Some(c), Some(r), None) => parse_col(c)
                .zip(parse_row(r))
                .and_then(|(col, row)| Square::new(col, row)),
            _ => None,
        };
        parsed.ok_or_else(|| GameError::InvalidSquare(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Move {
    from: Square,
    to: Square,
}

impl Move {
    /// A rook move from `from` to `to`; `None` unless the squares differ and are aligned.
    pub fn new(from: Square, to: Square) -> Option<Move> {
        from.direction(to).map(|_| Move { from, to })
    }

    pub fn from(&self) -> Square {
        self.from
    }

    pub fn to(&self) -> Square {
        self.to
    }

    pub fn direction(&self) -> Direction {
        match self.from.direction(self.to) {
            Some(dir) => dir,
            None => unreachable!("moves are always aligned"),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for Move {
    type Err = GameError;

    /// Accepts `e2-e6` as well as the shorthand `e2-6` and `e2-g`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GameError::InvalidMove(format!("cannot parse move '{}'", s));
        let (from, to) = s.trim().split_once('-').ok_or_else(invalid)?;
        let from: Square = from.parse()?;
        let mut chars = to.chars();
        let to = match (chars.next(), chars.next(), chars.next()) {
            (Some(c), None, None) => {
                if let Some(row) = parse_row(c) {
                    Square::new(from.col(), row)
                } else {
                    parse_col(c).and_then(|col| Square::new(col, from.row()))
                }
            }
            _ => to.parse().ok(),
        }
        .ok_or_else(invalid)?;
        Move::new(from, to).ok_or_else(invalid)
    }
}
