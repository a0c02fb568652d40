//! df-pn 探索
//!
//! - `node`: 探索中の局面（深さ・経路ハッシュ・経路履歴）
//! - `children_cache`: 子局面の pn/dn の集計と次に展開する子局面の選択
//! - `leaf`: 初訪問局面の末端探索と 1 手詰め判定
//! - `driver`: df-pn の再帰本体
//! - `mate_line`: 証明後の詰み手順の復元

mod children_cache;
mod driver;
mod leaf;
mod mate_line;
mod monitor;
mod node;
mod node_history;

pub use children_cache::ChildrenCache;
pub use driver::DfPnSearcher;
pub use monitor::{SearchInfo, SearchMonitor};
pub use node::{MoveGuard, Node, path_key_after};
pub use node_history::{HistoryState, NodeHistory};
