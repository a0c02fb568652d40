//! 探索の進捗管理と中断判定

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::types::Depth;

/// 外部へ報告する探索情報のスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchInfo {
    pub depth: Depth,
    pub seldepth: Depth,
    pub nodes: u64,
    pub nps: u64,
    pub time_ms: u64,
    pub hashfull: u32,
}

/// 探索局面数・到達深さ・経過時間を記録し、中断条件を判定する
///
/// 局面数の上限は一時的に積み増せる（`push_limit` / `pop_limit`）。積み増している間は
/// 時間制限を見ない。
#[derive(Debug)]
pub struct SearchMonitor {
    nodes: u64,
    max_depth: Depth,
    start: Instant,
    stop: Arc<AtomicBool>,
    nodes_limit: u64,
    deadline: Option<Instant>,
    limit_stack: Vec<(u64, Option<Instant>)>,
}

impl Default for SearchMonitor {
    fn default() -> Self {
        Self {
            nodes: 0,
            max_depth: 0,
            start: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
            nodes_limit: u64::MAX,
            deadline: None,
            limit_stack: Vec::new(),
        }
    }
}

impl SearchMonitor {
    /// 新しい探索を開始する
    pub fn new_search(
        &mut self,
        stop: Arc<AtomicBool>,
        nodes_limit: u64,
        time_limit: Option<Duration>,
    ) {
        self.nodes = 0;
        self.max_depth = 0;
        self.start = Instant::now();
        self.stop = stop;
        self.nodes_limit = nodes_limit;
        self.deadline = time_limit.map(|limit| self.start + limit);
        self.limit_stack.clear();
    }

    /// 子局面へ降りるたびに呼ぶ
    #[inline]
    pub fn visit(&mut self, depth: Depth) {
        self.nodes += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    #[inline]
    pub fn max_depth(&self) -> Depth {
        self.max_depth
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 停止要求があるか、局面数・時間の上限に達したか
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.nodes >= self.nodes_limit
            || self.stop.load(Ordering::Relaxed)
            || self.is_time_up()
    }

    /// 時間制限を過ぎたか
    pub fn is_time_up(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// 現在の局面数から `extra` 局面だけ探索できるよう上限を差し替える
    pub fn push_limit(&mut self, extra: u64) {
        self.limit_stack.push((self.nodes_limit, self.deadline.take()));
        self.nodes_limit = self.nodes.saturating_add(extra);
    }

    /// `push_limit` 前の上限に戻す
    pub fn pop_limit(&mut self) {
        if let Some((limit, deadline)) = self.limit_stack.pop() {
            self.nodes_limit = limit;
            self.deadline = deadline;
        }
    }

    pub fn info(&self, depth: Depth, hashfull: u32) -> SearchInfo {
        let time_ms = (self.elapsed().as_millis() as u64).max(1);
        SearchInfo {
            depth,
            seldepth: self.max_depth,
            nodes: self.nodes,
            nps: self.nodes.saturating_mul(1000) / time_ms,
            time_ms,
            hashfull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_limit_and_stop_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut monitor = SearchMonitor::default();
        monitor.new_search(stop.clone(), 2, None);

        assert!(!monitor.should_stop());
        monitor.visit(3);
        monitor.visit(1);
        assert!(monitor.should_stop());
        assert_eq!(monitor.max_depth(), 3);

        monitor.new_search(stop.clone(), u64::MAX, None);
        assert!(!monitor.should_stop());
        stop.store(true, Ordering::Relaxed);
        assert!(monitor.should_stop());
    }

    #[test]
    fn test_push_pop_limit() {
        let mut monitor = SearchMonitor::default();
        monitor.new_search(Arc::new(AtomicBool::new(false)), 1, None);
        monitor.visit(1);
        assert!(monitor.should_stop());

        monitor.push_limit(2);
        assert!(!monitor.should_stop());
        monitor.visit(1);
        monitor.visit(1);
        assert!(monitor.should_stop());

        monitor.pop_limit();
        assert!(monitor.should_stop());
        assert_eq!(monitor.info(0, 0).nodes, 3);
    }

    #[test]
    fn test_time_limit_is_suspended_while_pushed() {
        let mut monitor = SearchMonitor::default();
        monitor.new_search(Arc::new(AtomicBool::new(false)), u64::MAX, Some(Duration::ZERO));
        assert!(monitor.should_stop());
        assert!(monitor.is_time_up());

        monitor.push_limit(1);
        assert!(!monitor.should_stop());
        monitor.visit(1);
        assert!(monitor.should_stop());

        monitor.pop_limit();
        assert!(monitor.is_time_up());

        let an_hour = Some(Duration::from_secs(3600));
        monitor.new_search(Arc::new(AtomicBool::new(false)), u64::MAX, an_hour);
        assert!(!monitor.should_stop());
        assert!(!monitor.is_time_up());
    }
}
