//! 末端探索
//!
//! 初訪問の局面で、子局面を置換表と 1 手詰め判定だけで数手先まで調べ、
//! df-pn の本探索に入る前に結論が出るかを確かめる。

use super::node::Node;
use crate::position::MatePosition;
use crate::tt::TranspositionTable;
use crate::types::{Depth, Hand, NodeState, SearchResult};

/// OR node の 1 手詰め判定。詰む場合は詰ます手と証明駒を返す
pub(super) fn check_mate_1ply<P: MatePosition>(
    node: &mut Node<'_, P>,
) -> Option<(P::Move, Hand)> {
    if node.pos().in_check() {
        return None;
    }
    let mv = node.pos_mut().mate_1ply()?;
    let after_hand = {
        let child = node.apply(mv);
        child.pos().add_if_hand_gives_other_evasions(Hand::EMPTY)
    };
    // 証明駒は現在の持ち駒を越えない
    let proof_hand = node.pos().before_hand(mv, after_hand).meet(node.or_hand());
    Some((mv, proof_hand))
}

/// 残り `remain_depth` 手の末端探索
///
/// 詰み・不詰が確定した場合は置換表に書き込んだうえでその結果を返す。
/// 確定しなければ `pn = dn = 1` の未解決結果を返す。
pub(super) fn leaf_search<P: MatePosition>(
    tt: &mut TranspositionTable<P::Move>,
    node: &mut Node<'_, P>,
    remain_depth: Depth,
) -> SearchResult<P::Move> {
    let query = node.query();
    let or_node = node.is_or_node();

    if or_node {
        if let Some((mv, proof_hand)) = check_mate_1ply(node) {
            log::trace!("leaf: mate in 1 at depth {}", node.depth());
            tt.set_proven(&query, proof_hand, Some(mv), 1, 1);
            return SearchResult::proven(proof_hand, Some(mv), 1);
        }
    }

    let moves = node.generate_moves();
    if moves.is_empty() {
        return if or_node {
            let collected = node.pos().collect_hand(node.or_color());
            let disproof_hand = node.pos().remove_if_hand_gives_other_checks(collected);
            tt.set_disproven(&query, disproof_hand, None, 1);
            SearchResult::disproven(disproof_hand, None)
        } else {
            // 受け方に指し手がない -> 詰み
            let proof_hand = node.pos().add_if_hand_gives_other_evasions(Hand::EMPTY);
            tt.set_proven(&query, proof_hand, None, 0, 1);
            SearchResult::proven(proof_hand, None, 0)
        };
    }

    if remain_depth <= 1 {
        return SearchResult::unknown(1, 1, node.or_hand());
    }

    let mut unknown_flag = false;
    let mut lose_hand = if or_node { Hand::FULL } else { Hand::EMPTY };
    let mut longest: Option<(P::Move, Depth)> = None;
    for mv in moves {
        let child_query = node.child_query(mv);
        let looked_up = tt.look_up(&child_query, false);
        let child = if looked_up.is_first_visit {
            let mut child_node = node.apply(mv);
            leaf_search(tt, &mut *child_node, remain_depth - 1)
        } else {
            looked_up.result
        };

        match (or_node, child.state) {
            (true, NodeState::Proven) => {
                let proof_hand = node.pos().before_hand(mv, child.hand);
                let len = child.len.unwrap_or(0) + 1;
                tt.set_proven(&query, proof_hand, Some(mv), len, 1);
                return SearchResult::proven(proof_hand, Some(mv), len);
            }
            (false, NodeState::Disproven) => {
                tt.set_disproven(&query, child.hand, Some(mv), 1);
                return SearchResult::disproven(child.hand, Some(mv));
            }
            (true, NodeState::Disproven) => {
                if !unknown_flag {
                    lose_hand = lose_hand.meet(node.pos().before_hand(mv, child.hand));
                }
            }
            (false, NodeState::Proven) => {
                if !unknown_flag {
                    lose_hand = lose_hand.join(child.hand);
                    let len = child.len.unwrap_or(0);
                    if longest.is_none_or(|(_, l)| l < len) {
                        longest = Some((mv, len));
                    }
                }
            }
            _ => unknown_flag = true,
        }
    }

    if unknown_flag {
        return SearchResult::unknown(1, 1, node.or_hand());
    }

    log::trace!("leaf: settled all children at depth {}", node.depth());
    if or_node {
        let disproof_hand =
            node.pos().remove_if_hand_gives_other_checks(lose_hand.join(node.or_hand()));
        tt.set_disproven(&query, disproof_hand, None, 1);
        SearchResult::disproven(disproof_hand, None)
    } else {
        let proof_hand =
            node.pos().add_if_hand_gives_other_evasions(lose_hand.meet(node.or_hand()));
        let (best_move, len) = match longest {
            Some((mv, len)) => (Some(mv), len + 1),
            None => (None, 0),
        };
        tt.set_proven(&query, proof_hand, best_move, len, 1);
        SearchResult::proven(proof_hand, best_move, len)
    }
}
