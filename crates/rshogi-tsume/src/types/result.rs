//! 探索結果

use super::{Depth, Hand, INFINITE_PNDN, PnDn};

/// 局面の探索状態
///
/// 並び順は `ChildrenCache` の同値比較で使う。OR node では昇順、AND node では降順に並べる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeState {
    /// 探索中（詰みも不詰も未確定）
    Unknown,
    /// 千日手。経路に依存するため局面の性質としては記録しない
    Repetition,
    /// 不詰
    Disproven,
    /// 詰み
    Proven,
}

/// 1 局面の探索結果
///
/// - `Proven` なら `pn == 0 && dn == INFINITE_PNDN`
/// - `Disproven` / `Repetition` なら `pn == INFINITE_PNDN && dn == 0`
/// - `Unknown` なら `0 < pn < INFINITE_PNDN && 0 < dn < INFINITE_PNDN`
///
/// `hand` は `Proven` なら証明駒、`Disproven` なら反証駒、それ以外は攻め方の持ち駒。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult<M> {
    pub state: NodeState,
    pub pn: PnDn,
    pub dn: PnDn,
    pub hand: Hand,
    pub best_move: Option<M>,
    /// 詰み手数（`Proven` のときのみ意味を持つ）
    pub len: Option<Depth>,
}

impl<M> SearchResult<M> {
    pub fn proven(hand: Hand, best_move: Option<M>, len: Depth) -> Self {
        Self {
            state: NodeState::Proven,
            pn: 0,
            dn: INFINITE_PNDN,
            hand,
            best_move,
            len: Some(len),
        }
    }

    pub fn disproven(hand: Hand, best_move: Option<M>) -> Self {
        Self {
            state: NodeState::Disproven,
            pn: INFINITE_PNDN,
            dn: 0,
            hand,
            best_move,
            len: None,
        }
    }

    pub fn repetition(hand: Hand) -> Self {
        Self {
            state: NodeState::Repetition,
            pn: INFINITE_PNDN,
            dn: 0,
            hand,
            best_move: None,
            len: None,
        }
    }

    /// 未解決の結果。pn/dn は `[1, INFINITE_PNDN - 1]` に丸める
    pub fn unknown(pn: PnDn, dn: PnDn, hand: Hand) -> Self {
        Self {
            state: NodeState::Unknown,
            pn: pn.clamp(1, INFINITE_PNDN - 1),
            dn: dn.clamp(1, INFINITE_PNDN - 1),
            hand,
            best_move: None,
            len: None,
        }
    }

    /// 詰みまたは不詰が確定しているか（千日手は含まない）
    #[inline]
    pub fn is_final(&self) -> bool {
        matches!(self.state, NodeState::Proven | NodeState::Disproven)
    }

    /// `Unknown` 以外か
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.state != NodeState::Unknown
    }

    #[inline]
    pub fn phi(&self, or_node: bool) -> PnDn {
        super::phi(self.pn, self.dn, or_node)
    }

    #[inline]
    pub fn delta(&self, or_node: bool) -> PnDn {
        super::delta(self.pn, self.dn, or_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_constructors_keep_invariants() {
        let p = SearchResult::<u32>::proven(Hand::EMPTY, Some(3), 5);
        assert_eq!((p.pn, p.dn), (0, INFINITE_PNDN));
        assert!(p.is_final());

        let d = SearchResult::<u32>::disproven(Hand::FULL, None);
        assert_eq!((d.pn, d.dn), (INFINITE_PNDN, 0));

        let r = SearchResult::<u32>::repetition(Hand::EMPTY);
        assert!(r.is_settled());
        assert!(!r.is_final());
    }

    #[test]
    fn test_unknown_is_clamped_open_interval() {
        let u = SearchResult::<u32>::unknown(0, INFINITE_PNDN, Hand::EMPTY);
        assert_eq!(u.pn, 1);
        assert_eq!(u.dn, INFINITE_PNDN - 1);
        assert_eq!(u.phi(true), 1);
        assert_eq!(u.delta(true), INFINITE_PNDN - 1);
    }

    #[test]
    fn test_node_state_rank() {
        assert!(NodeState::Unknown < NodeState::Repetition);
        assert!(NodeState::Repetition < NodeState::Disproven);
        assert!(NodeState::Disproven < NodeState::Proven);
    }
}
