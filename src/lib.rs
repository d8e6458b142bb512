pub mod arena;
pub mod bot;
pub mod game;
pub mod search;
pub mod square;

pub use arena::*;
pub use bot::*;
pub use game::*;
pub use search::*;
pub use square::*;
