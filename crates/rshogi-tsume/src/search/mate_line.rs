//! 詰み手順の復元
//!
//! df-pn の証明木は最短手順とは限らない。root から置換表で詰みと分かっている王手を辿り、
//! 手数最小（同手数なら攻め方の余り駒が多い方）の手順を組み立てる。置換表に結果がない王手は
//! 局面数を制限した df-pn で追加探索する。

use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};

use super::driver::DfPnSearcher;
use super::leaf::check_mate_1ply;
use super::node::Node;
use crate::position::MatePosition;
use crate::types::{Depth, Hand, INFINITE_PNDN, MAX_NUM_MATE_MOVES, NodeState};

/// 詰み手数。手数が同じなら詰み上がりで攻め方の持ち駒が多い方を短いとみなす
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MateLen {
    len: Depth,
    surplus: u32,
}

impl MateLen {
    fn key(self) -> (Depth, Reverse<u32>) {
        (self.len, Reverse(self.surplus))
    }

    fn plus_one(self) -> Self {
        Self { len: self.len + 1, ..self }
    }
}

impl Ord for MateLen {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for MateLen {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 詰み手数とその手順の初手
type Candidate<M> = Option<(MateLen, Option<M>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    board_key: u64,
    hand: Hand,
    or_node: bool,
}

impl MemoKey {
    fn of<P: MatePosition>(node: &Node<'_, P>) -> Self {
        Self { board_key: node.board_key(), hand: node.or_hand(), or_node: node.is_or_node() }
    }
}

#[derive(Debug, Clone, Copy)]
struct MateEntry<M> {
    len: MateLen,
    best_move: Option<M>,
    /// 経路や手数の打ち切りに依存せず求まった値か
    exact: bool,
}

/// 1 局面を調べた結果
#[derive(Debug, Clone, Copy)]
struct Outcome {
    len: Option<MateLen>,
    /// 結果が依存する経路上の局面の深さのうち最も浅いもの
    depends_on: Option<Depth>,
}

impl Outcome {
    fn resolved(len: Option<MateLen>) -> Self {
        Self { len, depends_on: None }
    }
}

fn shallower(lhs: Option<Depth>, rhs: Option<Depth>) -> Option<Depth> {
    match (lhs, rhs) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// 復元中の状態
struct MateLineState<M> {
    mates: HashMap<MemoKey, MateEntry<M>>,
    /// 経路に依存せず不詰と分かった局面
    no_mates: HashSet<MemoKey>,
    /// 現在の経路上の局面と深さ
    path: HashMap<(u64, Hand), Depth>,
    /// これより長い手順は探さない
    window: Depth,
}

impl<M: Copy> MateLineState<M> {
    fn new(window: Depth) -> Self {
        Self { mates: HashMap::new(), no_mates: HashSet::new(), path: HashMap::new(), window }
    }

    /// 詰み手順を記録する。既により短い手順があれば残す
    fn record_mate(&mut self, key: MemoKey, entry: MateEntry<M>) {
        let replace = match self.mates.get(&key) {
            Some(old) => entry.len < old.len || (entry.exact && !old.exact && entry.len == old.len),
            None => true,
        };
        if replace {
            self.mates.insert(key, entry);
        }
    }
}

impl<P: MatePosition> DfPnSearcher<P> {
    /// 直前の `search` で証明した局面の詰み手順
    ///
    /// root が詰みでなければ空を返す。`pos` は `search` に渡したのと同じ局面でなければならない。
    pub fn best_moves(&mut self, pos: &mut P) -> Vec<P::Move> {
        let Some(root_result) = self.root_result else {
            return Vec::new();
        };
        if root_result.state != NodeState::Proven {
            return Vec::new();
        }

        let mut node = Node::new(pos);
        let first_window = root_result.len.unwrap_or(MAX_NUM_MATE_MOVES);
        let mut state = MateLineState::new(first_window);
        let mut outcome = self.visit(&mut state, &mut node);
        if outcome.len.is_none() {
            log::debug!("mate line: nothing within {} plies, retry without window", first_window);
            state = MateLineState::new(MAX_NUM_MATE_MOVES);
            outcome = self.visit(&mut state, &mut node);
        }
        let Some(len) = outcome.len else {
            log::warn!("mate line: failed to rebuild a proven position");
            return Vec::new();
        };

        let mut moves = Vec::new();
        while moves.len() < MAX_NUM_MATE_MOVES as usize {
            let next = state.mates.get(&MemoKey::of(&node)).and_then(|entry| entry.best_move);
            let Some(mv) = next else {
                break;
            };
            node.do_move(mv);
            moves.push(mv);
        }
        node.roll_back(&moves);
        self.mate_line_len = Some(moves.len() as Depth);

        log::debug!("mate line: {} plies (surplus {})", len.len, len.surplus);
        moves
    }

    fn visit(&mut self, state: &mut MateLineState<P::Move>, node: &mut Node<'_, P>) -> Outcome {
        let key = MemoKey::of(node);
        if let Some(entry) = state.mates.get(&key).filter(|entry| entry.exact) {
            return Outcome::resolved(Some(entry.len));
        }
        if state.no_mates.contains(&key) {
            return Outcome::resolved(None);
        }

        let depth = node.depth();
        let path_key = (key.board_key, key.hand);
        if let Some(&ancestor) = state.path.get(&path_key) {
            return Outcome { len: None, depends_on: Some(ancestor) };
        }
        // 証明は末端の 1 手詰め判定で max_depth を越えることがあるので、手数の上限だけで打ち切る
        if depth >= MAX_NUM_MATE_MOVES || (key.or_node && depth + 1 > state.window) {
            return Outcome { len: None, depends_on: Some(0) };
        }

        state.path.insert(path_key, depth);
        node.enter_history();
        let (best, depends_on) = if key.or_node {
            self.visit_or(state, node)
        } else {
            self.visit_and(state, node)
        };
        node.leave_history();
        state.path.remove(&path_key);

        let exact = depends_on.is_none_or(|d| d >= depth);
        match best {
            Some((len, best_move)) => {
                state.record_mate(key, MateEntry { len, best_move, exact });
            }
            None if exact => {
                state.no_mates.insert(key);
            }
            None => {}
        }

        Outcome { len: best.map(|(len, _)| len), depends_on: if exact { None } else { depends_on } }
    }

    fn visit_or(
        &mut self,
        state: &mut MateLineState<P::Move>,
        node: &mut Node<'_, P>,
    ) -> (Candidate<P::Move>, Option<Depth>) {
        let mate_1ply = check_mate_1ply(node).map(|(mv, _)| mv);
        let mut best: Candidate<P::Move> = None;
        let mut depends_on = None;

        for mv in node.generate_moves() {
            if Some(mv) != mate_1ply && !self.is_proven_child(node, mv) {
                continue;
            }

            let outcome = {
                let mut child = node.apply(mv);
                self.visit(state, &mut *child)
            };
            depends_on = shallower(depends_on, outcome.depends_on);
            let Some(len) = outcome.len else {
                continue;
            };

            let len = len.plus_one();
            if best.is_none_or(|(b, _)| len < b) {
                best = Some((len, Some(mv)));
            }
            if node.depth() == 0 {
                state.window = state.window.min(len.len);
            }
        }

        (best, depends_on)
    }

    fn visit_and(
        &mut self,
        state: &mut MateLineState<P::Move>,
        node: &mut Node<'_, P>,
    ) -> (Candidate<P::Move>, Option<Depth>) {
        let moves = node.generate_moves();
        if moves.is_empty() {
            let len = MateLen { len: 0, surplus: node.or_hand().total_count() };
            return (Some((len, None)), None);
        }

        let mut worst: Candidate<P::Move> = None;
        let mut depends_on = None;
        for mv in moves {
            let outcome = {
                let mut child = node.apply(mv);
                self.visit(state, &mut *child)
            };
            depends_on = shallower(depends_on, outcome.depends_on);
            let Some(len) = outcome.len else {
                // 1 つでも逃れる手があれば詰まない
                return (None, depends_on);
            };

            let len = len.plus_one();
            if worst.is_none_or(|(w, _)| len > w) {
                worst = Some((len, Some(mv)));
            }
        }

        (worst, depends_on)
    }

    /// `mv` の先が詰みか。置換表に結論がなければ局面数を制限して探索する
    fn is_proven_child(&mut self, node: &mut Node<'_, P>, mv: P::Move) -> bool {
        if node.is_repetition_after(mv) {
            return false;
        }

        let query = node.child_query(mv);
        let looked_up = self.tt.look_up(&query, false);
        match looked_up.result.state {
            NodeState::Proven => true,
            NodeState::Disproven | NodeState::Repetition => false,
            NodeState::Unknown => {
                if self.config.post_search_nodes == 0 {
                    return false;
                }
                self.monitor.push_limit(self.config.post_search_nodes);
                let result = {
                    let mut child = node.apply(mv);
                    self.search_impl(&mut *child, INFINITE_PNDN, INFINITE_PNDN, false)
                };
                self.monitor.pop_limit();
                result.state == NodeState::Proven
            }
        }
    }
}
