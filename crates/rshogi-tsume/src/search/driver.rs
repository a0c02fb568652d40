//! df-pn 探索本体

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use super::children_cache::ChildrenCache;
use super::leaf::leaf_search;
use super::monitor::{SearchInfo, SearchMonitor};
use super::node::Node;
use super::node_history::HistoryState;
use crate::config::SearchConfig;
use crate::position::MatePosition;
use crate::tt::{LookUpQuery, TableStats, TranspositionTable};
use crate::types::{Depth, INFINITE_PNDN, NodeState, PnDn, SearchResult, SearchedAmount};

/// df-pn による詰将棋ソルバ
///
/// 置換表は探索をまたいで保持する。別の問題を解く前には `clear` を呼ぶ。
pub struct DfPnSearcher<P: MatePosition> {
    pub(super) config: SearchConfig,
    pub(super) tt: TranspositionTable<P::Move>,
    pub(super) monitor: SearchMonitor,
    last_gc: Instant,
    pub(super) root_result: Option<SearchResult<P::Move>>,
    /// 直前に `best_moves` で復元した詰み手順の手数
    pub(super) mate_line_len: Option<Depth>,
}

impl<P: MatePosition> DfPnSearcher<P> {
    pub fn new(config: SearchConfig) -> Self {
        let tt = TranspositionTable::new(config.hash_mb);
        Self::with_table(config, tt)
    }

    /// 置換表のエントリ数を直接指定して作る
    pub fn with_table_entries(config: SearchConfig, num_entries: usize) -> Self {
        Self::with_table(config, TranspositionTable::with_entries(num_entries))
    }

    fn with_table(config: SearchConfig, mut tt: TranspositionTable<P::Move>) -> Self {
        tt.set_repetition_capacity(config.repetition_capacity);
        tt.set_deep_dfpn(config.deep_dfpn_depth, config.deep_dfpn_base);
        Self {
            config,
            tt,
            monitor: SearchMonitor::default(),
            last_gc: Instant::now(),
            root_result: None,
            mate_line_len: None,
        }
    }

    /// 探索局面数の上限を変更する。次の `search` から有効
    pub fn set_nodes_limit(&mut self, nodes_limit: u64) {
        self.config.nodes_limit = nodes_limit;
    }

    /// 置換表と直前の探索結果を捨てる
    pub fn clear(&mut self) {
        self.tt.clear();
        self.root_result = None;
        self.mate_line_len = None;
    }

    /// `pos` の手番側を攻め方として詰みを探す
    ///
    /// 詰みを証明できたら `true`。局面数の上限・停止要求で打ち切った場合や不詰・千日手の
    /// 場合は `false` で、詳細は `root_result` で確認できる。
    pub fn search(&mut self, pos: &mut P, stop: Arc<AtomicBool>) -> bool {
        let time_limit = self.config.time_limit_ms.map(Duration::from_millis);
        self.monitor.new_search(stop, self.config.nodes_limit, time_limit);
        self.last_gc = Instant::now();
        self.root_result = None;
        self.mate_line_len = None;

        let mut node = Node::new(pos);
        let result = self.search_impl(&mut node, INFINITE_PNDN, INFINITE_PNDN, false);
        self.root_result = Some(result);

        if result.state == NodeState::Unknown && self.monitor.is_time_up() {
            log::info!("search stopped: time limit {:?}ms", self.config.time_limit_ms);
        }
        let info = self.info();
        log::info!(
            "search finished: state={:?} pn={} dn={} len={:?} nodes={} nps={} time={}ms hashfull={}",
            result.state,
            result.pn,
            result.dn,
            result.len,
            info.nodes,
            info.nps,
            info.time_ms,
            info.hashfull,
        );
        result.state == NodeState::Proven
    }

    /// 直前の `search` の root の結果
    pub fn root_result(&self) -> Option<&SearchResult<P::Move>> {
        self.root_result.as_ref()
    }

    pub fn searched_nodes(&self) -> u64 {
        self.monitor.nodes()
    }

    /// 到達した最大深さ
    pub fn searched_depth(&self) -> u32 {
        self.monitor.max_depth()
    }

    /// 探索情報。`depth` は `best_moves` で復元した詰み手順の手数（復元前は 0）
    pub fn info(&self) -> SearchInfo {
        self.monitor.info(self.mate_line_len.unwrap_or(0), self.tt.hashfull())
    }

    pub fn table_stats(&self) -> TableStats {
        self.tt.stats()
    }

    /// 現局面をしきい値 `(thpn, thdn)` の範囲で探索する
    ///
    /// `inc_flag` が立っているときは、しきい値を現局面の pn/dn より大きくしてから探索を始める。
    /// 浅い位置で探索済みの子局面に戻ってきた場合に、何もせず戻るのを避けるため。
    pub(super) fn search_impl(
        &mut self,
        node: &mut Node<'_, P>,
        mut thpn: PnDn,
        mut thdn: PnDn,
        mut inc_flag: bool,
    ) -> SearchResult<P::Move> {
        let query = node.query();
        let or_hand = node.or_hand();

        // 深さ制限は千日手扱い。経路に依存する結果なので局面の性質としては記録しない
        if node.depth() >= self.config.max_depth {
            self.tt.set_repetition(&query, 1);
            return SearchResult::repetition(or_hand);
        }

        match node.history_state() {
            HistoryState::Repetition | HistoryState::Inferior => {
                self.tt.set_repetition(&query, 1);
                return SearchResult::repetition(or_hand);
            }
            HistoryState::First | HistoryState::Superior => {}
        }

        let looked_up = self.tt.look_up(&query, false);
        if looked_up.result.is_settled() {
            return looked_up.result;
        }

        let nodes_at_entry = self.monitor.nodes();
        if looked_up.is_first_visit {
            let first_search_depth = if node.is_or_node() {
                self.config.first_search_or_depth
            } else {
                self.config.first_search_and_depth
            };
            let remain = first_search_depth.min(self.config.max_depth - node.depth());
            let result = leaf_search(&mut self.tt, node, remain);
            if result.is_final() {
                return result;
            }
            inc_flag = false;
        }

        node.enter_history();
        let mut cache = ChildrenCache::build(&mut self.tt, node, looked_up.is_first_visit);
        if cache.has_old_child() {
            inc_flag = true;
        }

        if inc_flag {
            let current = cache.current_result(node);
            if !current.is_settled() {
                thpn = thpn.max(current.pn.saturating_add(1)).min(INFINITE_PNDN);
                thdn = thdn.max(current.dn.saturating_add(1)).min(INFINITE_PNDN);
            }
        }

        self.maybe_collect_garbage();

        let mut slot = looked_up.slot;
        let result = loop {
            let current = cache.current_result(node);
            if current.is_settled() {
                let amount = self.monitor.nodes() - nodes_at_entry;
                self.store(&query, &current, amount);
                break current;
            }

            let refreshed = self.tt.refresh(&query, slot);
            self.tt.update_pn_dn(refreshed, current.pn, current.dn, 0);
            slot = Some(refreshed);

            if current.pn >= thpn || current.dn >= thdn || self.monitor.should_stop() {
                break current;
            }

            self.monitor.visit(node.depth() + 1);
            let (child_thpn, child_thdn) = cache.child_threshold(thpn, thdn);
            let best_move = cache.best_move();
            let nodes_before = self.monitor.nodes();
            let child_result = if cache.best_move_is_first_visit() && cache.best_result().is_final()
            {
                *cache.best_result()
            } else {
                let mut child = node.apply(best_move);
                self.search_impl(&mut *child, child_thpn, child_thdn, inc_flag)
            };
            let amount = (self.monitor.nodes() - nodes_before).max(1);
            cache.update_front(&mut self.tt, child_result, amount);
        };

        node.leave_history();
        result
    }

    /// 確定した結果を置換表に書き込む
    fn store(&mut self, query: &LookUpQuery, result: &SearchResult<P::Move>, amount: SearchedAmount) {
        match result.state {
            NodeState::Proven => {
                let len = result.len.unwrap_or(0);
                self.tt.set_proven(query, result.hand, result.best_move, len, amount);
            }
            NodeState::Disproven => {
                self.tt.set_disproven(query, result.hand, result.best_move, amount);
            }
            NodeState::Repetition => self.tt.set_repetition(query, amount),
            NodeState::Unknown => {}
        }
    }

    fn maybe_collect_garbage(&mut self) {
        if self.last_gc.elapsed() < Duration::from_millis(self.config.gc_interval_ms) {
            return;
        }
        self.last_gc = Instant::now();

        let fill_ratio = self.tt.fill_ratio();
        if fill_ratio < self.config.gc_fill_ratio {
            return;
        }
        let removed = self.tt.collect_garbage(self.config.gc_remove_ratio);
        log::debug!(
            "gc: removed {} entries (fill {:.3} -> {:.3})",
            removed,
            fill_ratio,
            self.tt.fill_ratio()
        );
    }
}
