//! 探索ノード
//!
//! `MatePosition` を包み、攻め方の手番・root からの深さ・経路ハッシュ・経路履歴を
//! 追跡する。指し手は `MoveGuard` 経由で進め、スコープを抜けると必ず戻る。

use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::node_history::{HistoryState, NodeHistory};
use crate::position::{MatePosition, MoveList};
use crate::tt::LookUpQuery;
use crate::types::{Color, Depth, Hand, MAX_NUM_MATE_MOVES};

/// 深さごとの経路ハッシュ用乱数
fn depth_salts() -> &'static [u64] {
    static SALTS: OnceLock<Vec<u64>> = OnceLock::new();
    SALTS.get_or_init(|| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x7473_756D_655F_6B65);
        (0..=MAX_NUM_MATE_MOVES).map(|_| rng.next_u64()).collect()
    })
}

/// 深さ `depth` で `mv` を指したときの経路ハッシュの差分
fn path_key_delta<M: Hash>(mv: M, depth: Depth) -> u64 {
    let salts = depth_salts();
    let mut hasher = DefaultHasher::new();
    mv.hash(&mut hasher);
    (hasher.finish() ^ salts[depth as usize % salts.len()]).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// 経路ハッシュ `path_key` の局面から深さ `depth` で `mv` を指した後の経路ハッシュ。
/// 同じ引数で再度呼ぶと元に戻る
pub fn path_key_after<M: Hash>(path_key: u64, mv: M, depth: Depth) -> u64 {
    path_key ^ path_key_delta(mv, depth)
}

/// 探索中の局面
pub struct Node<'a, P: MatePosition> {
    pos: &'a mut P,
    or_color: Color,
    depth: Depth,
    path_key: u64,
    history: NodeHistory,
}

impl<'a, P: MatePosition> Node<'a, P> {
    /// `pos` の手番を攻め方とする root ノードを作る
    pub fn new(pos: &'a mut P) -> Self {
        let or_color = pos.side_to_move();
        let path_key = pos.board_key();
        Self {
            pos,
            or_color,
            depth: 0,
            path_key,
            history: NodeHistory::new(),
        }
    }

    #[inline]
    pub fn pos(&self) -> &P {
        &*self.pos
    }

    #[inline]
    pub fn pos_mut(&mut self) -> &mut P {
        &mut *self.pos
    }

    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth
    }

    #[inline]
    pub fn path_key(&self) -> u64 {
        self.path_key
    }

    #[inline]
    pub fn or_color(&self) -> Color {
        self.or_color
    }

    #[inline]
    pub fn is_or_node(&self) -> bool {
        self.pos.side_to_move() == self.or_color
    }

    #[inline]
    pub fn board_key(&self) -> u64 {
        self.pos.board_key()
    }

    /// 攻め方の持ち駒
    #[inline]
    pub fn or_hand(&self) -> Hand {
        self.pos.hand_of(self.or_color)
    }

    /// `mv` を指した後の攻め方の持ち駒
    pub fn or_hand_after(&self, mv: P::Move) -> Hand {
        if self.is_or_node() {
            self.pos.after_hand(mv, self.or_hand())
        } else {
            self.or_hand()
        }
    }

    /// 現局面の置換表クエリ
    pub fn query(&self) -> LookUpQuery {
        LookUpQuery {
            board_key: self.board_key(),
            hand: self.or_hand(),
            depth: self.depth,
            path_key: self.path_key,
            estimate: (1, 1),
        }
    }

    /// `mv` を指した後の局面の置換表クエリ
    pub fn child_query(&self, mv: P::Move) -> LookUpQuery {
        LookUpQuery {
            board_key: self.pos.board_key_after(mv),
            hand: self.or_hand_after(mv),
            depth: self.depth + 1,
            path_key: path_key_after(self.path_key, mv, self.depth),
            estimate: self.pos.initial_pn_dn(mv),
        }
    }

    /// 現局面を経路上の局面と比較する
    pub fn history_state(&self) -> HistoryState {
        self.history.classify(self.board_key(), self.or_hand())
    }

    /// `mv` を指すと経路上の局面と同一になるか
    pub fn is_repetition_after(&self, mv: P::Move) -> bool {
        let board_key = self.pos.board_key_after(mv);
        self.history.classify(board_key, self.or_hand_after(mv)) == HistoryState::Repetition
    }

    /// 現局面を経路に積む
    pub fn enter_history(&mut self) {
        let (board_key, hand) = (self.board_key(), self.or_hand());
        self.history.enter(board_key, hand);
    }

    /// `enter_history` で積んだ現局面を取り除く
    pub fn leave_history(&mut self) {
        let (board_key, hand) = (self.board_key(), self.or_hand());
        self.history.leave(board_key, hand);
    }

    /// 手番側の合法手（OR node なら王手、AND node なら王手回避）
    pub fn generate_moves(&self) -> MoveList<P::Move> {
        let mut moves = MoveList::new();
        if self.is_or_node() {
            self.pos.generate_checks(&mut moves);
        } else {
            self.pos.generate_evasions(&mut moves);
        }
        moves
    }

    pub fn do_move(&mut self, mv: P::Move) {
        self.path_key = path_key_after(self.path_key, mv, self.depth);
        self.pos.do_move(mv);
        self.depth += 1;
    }

    pub fn undo_move(&mut self, mv: P::Move) {
        self.depth -= 1;
        self.pos.undo_move(mv);
        self.path_key = path_key_after(self.path_key, mv, self.depth);
    }

    /// `mv` を指し、スコープを抜けたときに戻すガードを返す
    pub fn apply(&mut self, mv: P::Move) -> MoveGuard<'_, 'a, P> {
        self.do_move(mv);
        MoveGuard { node: self, mv }
    }

    /// `moves` を後ろから順に戻す
    pub fn roll_back(&mut self, moves: &[P::Move]) {
        for &mv in moves.iter().rev() {
            self.undo_move(mv);
        }
    }
}

/// `Node::apply` の戻り値。drop 時に指し手を戻す
pub struct MoveGuard<'n, 'a, P: MatePosition> {
    node: &'n mut Node<'a, P>,
    mv: P::Move,
}

impl<'a, P: MatePosition> Deref for MoveGuard<'_, 'a, P> {
    type Target = Node<'a, P>;

    fn deref(&self) -> &Self::Target {
        &*self.node
    }
}

impl<P: MatePosition> DerefMut for MoveGuard<'_, '_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.node
    }
}

impl<P: MatePosition> Drop for MoveGuard<'_, '_, P> {
    fn drop(&mut self) {
        self.node.undo_move(self.mv);
    }
}
