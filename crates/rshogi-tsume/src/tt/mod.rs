//! 詰将棋用置換表（Transposition Table）
//!
//! - 局面は `(board_key, 攻め方の持ち駒)` で識別する
//! - 証明駒・反証駒による優等・劣等局面の流用
//! - 探索量に基づく置換と GC
//! - 経路ハッシュによる千日手の記録

mod entry;
mod table;

pub use table::{EntrySlot, LookUpQuery, LookUpResult, TableStats, TranspositionTable};

/// 同一盤面のエントリを置く連続領域の大きさ
pub const CLUSTER_SIZE: usize = 16;
