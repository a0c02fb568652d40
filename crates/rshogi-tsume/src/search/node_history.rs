//! 探索経路上の局面履歴
//!
//! 現在の再帰スタックに積まれている `(board_key, hand)` の組を管理し、
//! 同一局面（千日手）と優等・劣等局面を判定する。

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::types::Hand;

/// 経路上の類似局面の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    /// 類似局面なし
    First,
    /// 同一局面あり
    Repetition,
    /// 劣等局面（攻め方の持ち駒が少ない同一盤面）あり
    Superior,
    /// 優等局面（攻め方の持ち駒が多い同一盤面）あり
    Inferior,
}

/// 経路上の `(board_key, hand)` の多重集合
#[derive(Debug, Default, Clone)]
pub struct NodeHistory {
    visited: HashMap<u64, SmallVec<[Hand; 2]>>,
}

impl NodeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(board_key, hand)` を経路上の局面と比較する
    ///
    /// 同一局面を最優先する。優等局面と劣等局面の両方があるときは `Inferior` を返す。
    pub fn classify(&self, board_key: u64, hand: Hand) -> HistoryState {
        let Some(hands) = self.visited.get(&board_key) else {
            return HistoryState::First;
        };

        if hands.contains(&hand) {
            return HistoryState::Repetition;
        }
        if hands.iter().any(|&h| h.is_superior_or_equal(hand)) {
            return HistoryState::Inferior;
        }
        if hands.iter().any(|&h| hand.is_superior_or_equal(h)) {
            return HistoryState::Superior;
        }
        HistoryState::First
    }

    /// `(board_key, hand)` を経路に積む
    pub fn enter(&mut self, board_key: u64, hand: Hand) {
        debug_assert_ne!(self.classify(board_key, hand), HistoryState::Repetition);
        self.visited.entry(board_key).or_default().push(hand);
    }

    /// `enter` した `(board_key, hand)` を 1 つ取り除く
    pub fn leave(&mut self, board_key: u64, hand: Hand) {
        let Some(hands) = self.visited.get_mut(&board_key) else {
            debug_assert!(false, "leave() without enter(): board_key={board_key:#x}");
            return;
        };
        match hands.iter().rposition(|&h| h == hand) {
            Some(i) => {
                hands.swap_remove(i);
            }
            None => debug_assert!(false, "leave() without enter(): hand={hand}"),
        }
        if hands.is_empty() {
            self.visited.remove(&board_key);
        }
    }

    /// 経路上の局面数
    pub fn len(&self) -> usize {
        self.visited.values().map(|hands| hands.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HandPiece;

    #[test]
    fn test_enter_then_classify_is_repetition() {
        let mut history = NodeHistory::new();
        let hand = Hand::EMPTY.add(HandPiece::Gold);
        assert_eq!(history.classify(1, hand), HistoryState::First);

        history.enter(1, hand);
        assert_eq!(history.classify(1, hand), HistoryState::Repetition);

        history.leave(1, hand);
        assert_eq!(history.classify(1, hand), HistoryState::First);
        assert!(history.is_empty());
    }

    #[test]
    fn test_dominance_classification() {
        let mut history = NodeHistory::new();
        let gold = Hand::EMPTY.add(HandPiece::Gold);
        let gold_pawn = gold.add(HandPiece::Pawn);

        history.enter(7, gold);
        assert_eq!(history.classify(7, gold_pawn), HistoryState::Superior);
        assert_eq!(history.classify(7, Hand::EMPTY), HistoryState::Inferior);
        // 別盤面は無関係
        assert_eq!(history.classify(8, Hand::EMPTY), HistoryState::First);
        // 比較不能な持ち駒
        assert_eq!(history.classify(7, Hand::EMPTY.add(HandPiece::Rook)), HistoryState::First);
    }

    #[test]
    fn test_both_dominating_and_dominated_reports_inferior() {
        let mut history = NodeHistory::new();
        let pawn = Hand::EMPTY.add(HandPiece::Pawn);
        let pawn3 = pawn.add(HandPiece::Pawn).add(HandPiece::Pawn);
        history.enter(3, Hand::EMPTY);
        history.enter(3, pawn3);

        assert_eq!(history.classify(3, pawn), HistoryState::Inferior);
    }

    #[test]
    fn test_leave_is_multiplicity_aware() {
        let mut history = NodeHistory::new();
        history.enter(5, Hand::EMPTY);
        history.enter(6, Hand::EMPTY);
        history.enter(5, Hand::EMPTY.add(HandPiece::Silver));
        assert_eq!(history.len(), 3);

        history.leave(5, Hand::EMPTY.add(HandPiece::Silver));
        assert_eq!(history.classify(5, Hand::EMPTY), HistoryState::Repetition);
        assert_eq!(
            history.classify(5, Hand::EMPTY.add(HandPiece::Silver)),
            HistoryState::Superior
        );
        history.leave(5, Hand::EMPTY);
        assert_eq!(history.classify(5, Hand::EMPTY), HistoryState::First);
        assert_eq!(history.len(), 1);
    }
}
