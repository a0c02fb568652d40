//! 子局面キャッシュ
//!
//! 1 局面の全ての子局面について置換表の検索結果を保持し、次に展開すべき子局面の選択と
//! 現局面の pn/dn の集計を行う。子局面は φ 値の昇順に並べ、先頭だけが更新される前提で
//! 挿入ソート 1 回分の手間で並びを保つ。δ 値の総和は差分で更新する。

use std::cmp::Ordering;

use super::leaf::check_mate_1ply;
use super::node::Node;
use crate::position::MatePosition;
use crate::tt::{EntrySlot, LookUpQuery, TranspositionTable};
use crate::types::{
    Depth, Hand, INFINITE_PNDN, MAX_NUM_MATE_MOVES, NodeState, PnDn, SearchResult, SearchedAmount,
    clamp_pndn, delta, phi,
};

/// 子局面 1 つ分のキャッシュ
#[derive(Debug, Clone)]
struct ChildEntry<M> {
    mv: M,
    query: LookUpQuery,
    slot: Option<EntrySlot>,
    result: SearchResult<M>,
    /// まだ一度も探索していない子局面か
    is_first_visit: bool,
    /// 置換表に記録された最小到達深さ
    min_depth: Depth,
}

/// 子局面キャッシュ
pub struct ChildrenCache<M> {
    or_node: bool,
    children: Vec<ChildEntry<M>>,
    /// `children` を優先度順に並べた添字。`idx[0]` が最善手
    idx: Vec<usize>,
    /// δ 値の総和（丸めない）
    delta: u128,
    /// 現局面より浅い位置で探索された未解決の子局面があるか
    has_old_child: bool,
}

impl<M: Copy + Ord> ChildrenCache<M> {
    /// `node` の子局面を列挙してキャッシュを作る
    ///
    /// `first_search` が真の AND node では、未訪問の子局面について 1 手詰めと
    /// 王手の有無を先に調べておく。
    pub fn build<P>(tt: &mut TranspositionTable<M>, node: &mut Node<'_, P>, first_search: bool) -> Self
    where
        P: MatePosition<Move = M>,
    {
        let or_node = node.is_or_node();
        let moves = node.generate_moves();
        let mut cache = Self {
            or_node,
            children: Vec::with_capacity(moves.len()),
            idx: Vec::with_capacity(moves.len()),
            delta: 0,
            has_old_child: false,
        };

        for mv in moves {
            let query = node.child_query(mv);
            let child = if node.is_repetition_after(mv) {
                ChildEntry {
                    mv,
                    query,
                    slot: None,
                    result: SearchResult::repetition(node.or_hand()),
                    is_first_visit: false,
                    min_depth: MAX_NUM_MATE_MOVES,
                }
            } else {
                let looked_up = tt.look_up(&query, false);
                let mut child = ChildEntry {
                    mv,
                    query,
                    slot: looked_up.slot,
                    result: looked_up.result,
                    is_first_visit: looked_up.is_first_visit,
                    min_depth: looked_up.min_depth,
                };
                if child.result.state == NodeState::Unknown && child.min_depth < node.depth() {
                    cache.has_old_child = true;
                }
                if !or_node && first_search && child.is_first_visit {
                    Self::first_search(tt, node, &mut child);
                }
                child
            };

            cache.delta += child.result.delta(or_node) as u128;
            let settled = child.result.phi(or_node) == 0;
            cache.idx.push(cache.children.len());
            cache.children.push(child);
            if settled {
                // 現局面の結論が出たのでこれ以上調べても意味がない
                break;
            }
        }

        let children = &cache.children;
        cache.idx.sort_by(|&a, &b| compare(or_node, &children[a], &children[b]));
        cache
    }

    /// AND node の子局面（OR node）を 1 手だけ掘り進める
    fn first_search<P>(tt: &mut TranspositionTable<M>, node: &mut Node<'_, P>, child: &mut ChildEntry<M>)
    where
        P: MatePosition<Move = M>,
    {
        let mut child_node = node.apply(child.mv);
        if let Some((mate, proof_hand)) = check_mate_1ply(&mut *child_node) {
            child.result = SearchResult::proven(proof_hand, Some(mate), 1);
            child.is_first_visit = false;
            child.slot = Some(tt.set_proven(&child.query, proof_hand, Some(mate), 1, 1));
            return;
        }

        // 王手が 1 つもなければ不詰。置換表への書き込みは探索時に行う
        if child_node.generate_moves().is_empty() {
            let disproof_hand = child_node.pos().remove_if_hand_gives_other_checks(Hand::FULL);
            child.result = SearchResult::disproven(disproof_hand, None);
        }
    }

    fn front(&self) -> &ChildEntry<M> {
        &self.children[self.idx[0]]
    }

    /// 子局面の数
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// 現在の最善手。子局面が 1 つ以上あるときだけ呼べる
    pub fn best_move(&self) -> M {
        self.front().mv
    }

    /// 最善手の子局面が未探索か
    pub fn best_move_is_first_visit(&self) -> bool {
        self.front().is_first_visit
    }

    /// 最善手の子局面のキャッシュ済み結果
    pub fn best_result(&self) -> &SearchResult<M> {
        &self.front().result
    }

    pub fn has_old_child(&self) -> bool {
        self.has_old_child
    }

    /// δ 値の総和（`INFINITE_PNDN` で丸める）
    pub fn delta_sum(&self) -> PnDn {
        clamp_pndn(self.delta)
    }

    /// 最善手の子局面の探索結果を反映する
    ///
    /// 結果を置換表に書き込み、δ 値の総和を差分更新し、先頭要素だけを挿入ソートで並べ直す。
    pub fn update_front(
        &mut self,
        tt: &mut TranspositionTable<M>,
        result: SearchResult<M>,
        amount: SearchedAmount,
    ) {
        let or_node = self.or_node;
        let child = &mut self.children[self.idx[0]];
        let old_delta = child.result.delta(or_node) as u128;
        child.result = result;
        child.is_first_visit = false;
        self.delta = self.delta - old_delta + result.delta(or_node) as u128;

        match result.state {
            NodeState::Proven => {
                let len = result.len.unwrap_or(0);
                child.slot = Some(tt.set_proven(&child.query, result.hand, result.best_move, len, amount));
            }
            NodeState::Disproven => {
                child.slot =
                    Some(tt.set_disproven(&child.query, result.hand, result.best_move, amount));
            }
            NodeState::Repetition => {
                tt.set_repetition(&child.query, amount);
                child.slot = None;
            }
            NodeState::Unknown => {
                let slot = tt.refresh(&child.query, child.slot);
                tt.update_pn_dn(slot, result.pn, result.dn, amount);
                child.slot = Some(slot);
            }
        }

        // [1, n) はソート済みなので、先頭要素を入るべき位置まで送る
        let mut j = 1;
        while j < self.idx.len()
            && compare(or_node, &self.children[self.idx[j]], &self.children[self.idx[0]])
                == Ordering::Less
        {
            j += 1;
        }
        self.idx[..j].rotate_left(1);
    }

    /// 現局面の探索結果
    pub fn current_result<P>(&self, node: &Node<'_, P>) -> SearchResult<M>
    where
        P: MatePosition<Move = M>,
    {
        if self.delta == 0 {
            if self.or_node { self.disproven_result(node) } else { self.proven_result(node) }
        } else if self.front().result.phi(self.or_node) == 0 {
            if self.or_node { self.proven_result(node) } else { self.disproven_result(node) }
        } else {
            let best = &self.front().result;
            let delta = self.delta_sum();
            if self.or_node {
                SearchResult::unknown(best.pn, delta, node.or_hand())
            } else {
                SearchResult::unknown(delta, best.dn, node.or_hand())
            }
        }
    }

    fn proven_result<P>(&self, node: &Node<'_, P>) -> SearchResult<M>
    where
        P: MatePosition<Move = M>,
    {
        if self.or_node {
            let best = self.front();
            let proof_hand = node.pos().before_hand(best.mv, best.result.hand);
            let len = best.result.len.unwrap_or(0) + 1;
            return SearchResult::proven(proof_hand, Some(best.mv), len);
        }

        // 千日手の逃げ道が 1 つでもあれば詰みとは言えない
        if self.children.iter().any(|child| child.result.state == NodeState::Repetition) {
            return SearchResult::repetition(node.or_hand());
        }

        let mut hand = Hand::EMPTY;
        let mut longest: Option<(M, Depth)> = None;
        for child in &self.children {
            hand = hand.join(child.result.hand);
            let len = child.result.len.unwrap_or(0);
            if longest.is_none_or(|(_, l)| l < len) {
                longest = Some((child.mv, len));
            }
        }
        let proof_hand = node.pos().add_if_hand_gives_other_evasions(hand);
        match longest {
            Some((mv, len)) => SearchResult::proven(proof_hand, Some(mv), len + 1),
            None => SearchResult::proven(proof_hand, None, 0),
        }
    }

    fn disproven_result<P>(&self, node: &Node<'_, P>) -> SearchResult<M>
    where
        P: MatePosition<Move = M>,
    {
        // 千日手の子局面はソートで先頭に来るので、先頭だけ見ればよい
        if !self.is_empty() && self.front().result.state == NodeState::Repetition {
            return SearchResult::repetition(node.or_hand());
        }

        if self.or_node {
            let hand = self.children.iter().fold(Hand::FULL, |acc, child| {
                acc.meet(node.pos().before_hand(child.mv, child.result.hand))
            });
            SearchResult::disproven(node.pos().remove_if_hand_gives_other_checks(hand), None)
        } else {
            let best = self.front();
            SearchResult::disproven(best.result.hand, Some(best.mv))
        }
    }

    /// 最善手の子局面を探索するときの (pn, dn) しきい値
    ///
    /// φ のしきい値は次善手の φ + 1 で抑え、δ のしきい値は他の子局面の δ の和を差し引く。
    pub fn child_threshold(&self, thpn: PnDn, thdn: PnDn) -> (PnDn, PnDn) {
        let thphi = phi(thpn, thdn, self.or_node);
        let thdelta = delta(thpn, thdn, self.or_node);

        let second_phi = match self.idx.get(1) {
            Some(&i) => self.children[i].result.phi(self.or_node),
            None => INFINITE_PNDN,
        };
        let child_thphi = thphi.min(second_phi.saturating_add(1)).max(1);

        let delta_except_best = self.delta - self.front().result.delta(self.or_node) as u128;
        let child_thdelta = clamp_pndn((thdelta as u128).saturating_sub(delta_except_best));

        if self.or_node { (child_thphi, child_thdelta) } else { (child_thdelta, child_thphi) }
    }
}

/// 子局面の優先順位。φ 値の昇順、同値なら状態（OR node は昇順、AND node は降順）、最後に指し手
fn compare<M: Ord>(or_node: bool, lhs: &ChildEntry<M>, rhs: &ChildEntry<M>) -> Ordering {
    lhs.result
        .phi(or_node)
        .cmp(&rhs.result.phi(or_node))
        .then_with(|| {
            if or_node {
                lhs.result.state.cmp(&rhs.result.state)
            } else {
                rhs.result.state.cmp(&lhs.result.state)
            }
        })
        .then_with(|| lhs.mv.cmp(&rhs.mv))
}

#[cfg(test)]
impl<M: Copy + Ord> ChildrenCache<M> {
    /// 探索結果の列から直接キャッシュを作る
    fn from_results(or_node: bool, results: Vec<(M, SearchResult<M>)>) -> Self {
        let mut children = Vec::new();
        let mut delta = 0u128;
        for (i, (mv, result)) in results.into_iter().enumerate() {
            delta += result.delta(or_node) as u128;
            children.push(ChildEntry {
                mv,
                query: LookUpQuery {
                    board_key: 1000 + i as u64,
                    hand: Hand::EMPTY,
                    depth: 1,
                    path_key: i as u64,
                    estimate: (1, 1),
                },
                slot: None,
                result,
                is_first_visit: false,
                min_depth: 1,
            });
        }
        let mut idx: Vec<usize> = (0..children.len()).collect();
        idx.sort_by(|&a, &b| compare(or_node, &children[a], &children[b]));
        Self { or_node, children, idx, delta, has_old_child: false }
    }

    fn recomputed_delta(&self) -> u128 {
        self.children.iter().map(|c| c.result.delta(self.or_node) as u128).sum()
    }

    fn is_sorted(&self) -> bool {
        self.idx.windows(2).all(|w| {
            compare(self.or_node, &self.children[w[1]], &self.children[w[0]]) != Ordering::Less
        })
    }
}
