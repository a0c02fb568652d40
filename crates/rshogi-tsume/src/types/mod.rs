//! 詰将棋探索で使う基本型

mod color;
mod hand;
mod pndn;
mod result;

pub use color::Color;
pub use hand::{Hand, HandPiece};
pub use pndn::{
    Depth, INFINITE_PNDN, MAX_NUM_MATE_MOVES, PnDn, SearchedAmount, clamp_pndn, delta, phi,
};
pub use result::{NodeState, SearchResult};
