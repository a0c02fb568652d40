//! TTEntry: 置換表の 1 レコード

use crate::types::{Depth, Hand, INFINITE_PNDN, MAX_NUM_MATE_MOVES, NodeState, PnDn, SearchedAmount};

/// エントリの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EntryKind {
    /// 空き
    Vacant,
    /// 探索中
    Unknown,
    /// 詰み（`hand` は証明駒）
    Proven,
    /// 不詰（`hand` は反証駒）
    Disproven,
}

/// 置換表エントリ
///
/// 固定長のレコードで、`board_key` と攻め方の持ち駒 `hand` の組で局面を識別する。
#[derive(Debug, Clone, Copy)]
pub(super) struct TTEntry<M> {
    pub(super) board_key: u64,
    pub(super) hand: Hand,
    pub(super) kind: EntryKind,
    pub(super) pn: PnDn,
    pub(super) dn: PnDn,
    /// root からの最小到達深さ（Unknown のときのみ有効）
    pub(super) min_depth: Depth,
    pub(super) amount: SearchedAmount,
    pub(super) best_move: Option<M>,
    pub(super) len: Option<Depth>,
    /// 経路によっては千日手になる局面
    pub(super) maybe_repetition: bool,
}

impl<M: Copy> TTEntry<M> {
    pub(super) const fn vacant() -> Self {
        Self {
            board_key: 0,
            hand: Hand::EMPTY,
            kind: EntryKind::Vacant,
            pn: 1,
            dn: 1,
            min_depth: MAX_NUM_MATE_MOVES,
            amount: 0,
            best_move: None,
            len: None,
            maybe_repetition: false,
        }
    }

    pub(super) fn unknown(board_key: u64, hand: Hand, pn: PnDn, dn: PnDn, depth: Depth) -> Self {
        Self {
            board_key,
            hand,
            kind: EntryKind::Unknown,
            pn,
            dn,
            min_depth: depth,
            ..Self::vacant()
        }
    }

    pub(super) fn proven(
        board_key: u64,
        hand: Hand,
        best_move: Option<M>,
        len: Depth,
        amount: SearchedAmount,
    ) -> Self {
        Self {
            board_key,
            hand,
            kind: EntryKind::Proven,
            pn: 0,
            dn: INFINITE_PNDN,
            amount,
            best_move,
            len: Some(len),
            ..Self::vacant()
        }
    }

    pub(super) fn disproven(
        board_key: u64,
        hand: Hand,
        best_move: Option<M>,
        amount: SearchedAmount,
    ) -> Self {
        Self {
            board_key,
            hand,
            kind: EntryKind::Disproven,
            pn: INFINITE_PNDN,
            dn: 0,
            amount,
            best_move,
            ..Self::vacant()
        }
    }

    #[inline]
    pub(super) fn is_vacant(&self) -> bool {
        self.kind == EntryKind::Vacant
    }

    #[inline]
    pub(super) fn is_unknown(&self) -> bool {
        self.kind == EntryKind::Unknown
    }

    pub(super) fn state(&self) -> NodeState {
        match self.kind {
            EntryKind::Proven => NodeState::Proven,
            EntryKind::Disproven => NodeState::Disproven,
            EntryKind::Vacant | EntryKind::Unknown => NodeState::Unknown,
        }
    }

    /// 持ち駒 `hand` の局面の結果としてこのエントリを使えるか
    ///
    /// 証明済みなら証明駒以上、反証済みなら反証駒以下の持ち駒に一致する。
    /// 探索中のエントリは持ち駒が完全に一致する場合のみ。
    pub(super) fn matches(&self, board_key: u64, hand: Hand) -> bool {
        if self.board_key != board_key {
            return false;
        }
        match self.kind {
            EntryKind::Vacant => false,
            EntryKind::Unknown => self.hand == hand,
            EntryKind::Proven => hand.is_superior_or_equal(self.hand),
            EntryKind::Disproven => self.hand.is_superior_or_equal(hand),
        }
    }

    /// GC・置換で使う探索量。詰みのエントリは 10 倍重く扱い、消されにくくする
    pub(super) fn adjusted_amount(&self) -> SearchedAmount {
        const PROVEN_AMOUNT_INCREASE: SearchedAmount = 10;
        match self.kind {
            EntryKind::Proven => self.amount.saturating_mul(PROVEN_AMOUNT_INCREASE),
            _ => self.amount,
        }
    }

    pub(super) fn add_amount(&mut self, amount: SearchedAmount) {
        self.amount = self.amount.saturating_add(amount).max(1);
    }

    pub(super) fn clear(&mut self) {
        *self = Self::vacant();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HandPiece;

    #[test]
    fn test_proven_entry_matches_superior_hands() {
        let gold = Hand::EMPTY.add(HandPiece::Gold);
        let entry = TTEntry::<u32>::proven(10, gold, Some(1), 3, 5);

        assert!(entry.matches(10, gold));
        assert!(entry.matches(10, gold.add(HandPiece::Pawn)));
        assert!(!entry.matches(10, Hand::EMPTY));
        assert!(!entry.matches(11, gold));
    }

    #[test]
    fn test_disproven_entry_matches_inferior_hands() {
        let gold = Hand::EMPTY.add(HandPiece::Gold);
        let entry = TTEntry::<u32>::disproven(10, gold, None, 5);

        assert!(entry.matches(10, Hand::EMPTY));
        assert!(entry.matches(10, gold));
        assert!(!entry.matches(10, gold.add(HandPiece::Pawn)));
    }

    #[test]
    fn test_unknown_entry_matches_exact_hand_only() {
        let gold = Hand::EMPTY.add(HandPiece::Gold);
        let entry = TTEntry::<u32>::unknown(10, gold, 2, 3, 4);
        assert!(entry.matches(10, gold));
        assert!(!entry.matches(10, Hand::EMPTY));
        assert_eq!(entry.state(), NodeState::Unknown);
    }

    #[test]
    fn test_adjusted_amount_prefers_proven() {
        let proven = TTEntry::<u32>::proven(1, Hand::EMPTY, None, 1, 7);
        let disproven = TTEntry::<u32>::disproven(1, Hand::EMPTY, None, 7);
        assert_eq!(proven.adjusted_amount(), 70);
        assert_eq!(disproven.adjusted_amount(), 7);

        let huge = TTEntry::<u32>::proven(1, Hand::EMPTY, None, 1, u64::MAX / 2);
        assert_eq!(huge.adjusted_amount(), u64::MAX);
    }
}
