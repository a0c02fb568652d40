//! 詰将棋ソルバ
//!
//! 証明数・反証数による深さ優先探索（df-pn）で、攻め方が王手を続けて詰ませられるかを調べる。
//!
//! - 局面は `MatePosition` トレイト越しに扱い、盤面表現や合法手生成は持たない
//! - 置換表は証明駒・反証駒による優等・劣等局面の流用と、経路ハッシュによる千日手の記録を行う
//! - 証明後に最短の詰み手順を復元できる
//!
//! 動作確認用に、局面を明示的に列挙した `graph::MateGraph` を同梱する。
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use rshogi_tsume::graph::{GraphBuilder, NodeSpec};
//! use rshogi_tsume::{DfPnSearcher, SearchConfig};
//!
//! let graph = GraphBuilder::new("root")
//!     .node(NodeSpec::attacker("root").to_labeled("mated", "G*5b"))
//!     .node(NodeSpec::defender("mated"))
//!     .build()
//!     .unwrap();
//! let mut pos = graph.position();
//! let mut searcher = DfPnSearcher::new(SearchConfig { hash_mb: 1, ..SearchConfig::default() });
//! assert!(searcher.search(&mut pos, Arc::new(AtomicBool::new(false))));
//! let line = searcher.best_moves(&mut pos);
//! assert_eq!(graph.move_label(line[0]), "G*5b");
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod position;
pub mod search;
pub mod tt;
pub mod types;

pub use config::SearchConfig;
pub use error::{TsumeError, TsumeResult};
pub use position::{MatePosition, MoveList};
pub use search::{DfPnSearcher, SearchInfo};
pub use types::{Color, Hand, HandPiece, NodeState, SearchResult};
