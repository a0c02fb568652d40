//! 探索対象の局面が満たすべきインターフェース
//!
//! 盤面表現・合法手生成・1手詰め判定は探索部の外側にある。df-pn はこのトレイトを
//! 通してのみ局面に触れる。

use smallvec::SmallVec;
use std::fmt::Debug;
use std::hash::Hash;

use crate::types::{Color, Hand, PnDn};

/// 1 局面あたりの指し手リスト
pub type MoveList<M> = SmallVec<[M; 32]>;

/// 詰将棋探索用の局面
///
/// `do_move` / `undo_move` は再帰と完全に入れ子で呼ばれる。
pub trait MatePosition {
    /// 指し手。`Ord` は同値比較の最終キー（決定的な指し手順）として使う
    type Move: Copy + Eq + Ord + Hash + Debug;

    /// 手番
    fn side_to_move(&self) -> Color;

    /// 持ち駒を除いた局面のハッシュ
    fn board_key(&self) -> u64;

    /// `mv` を指した後の `board_key`
    fn board_key_after(&self, mv: Self::Move) -> u64;

    /// `color` 側の持ち駒
    fn hand_of(&self, color: Color) -> Hand;

    /// 手番側が王手されているか
    fn in_check(&self) -> bool;

    fn do_move(&mut self, mv: Self::Move);

    fn undo_move(&mut self, mv: Self::Move);

    /// 王手になる指し手を `out` に追加する
    fn generate_checks(&self, out: &mut MoveList<Self::Move>);

    /// 王手回避手を `out` に追加する
    fn generate_evasions(&self, out: &mut MoveList<Self::Move>);

    /// 1手詰めがあればその指し手を返す。手番側が王手されていないときだけ呼ばれる
    fn mate_1ply(&mut self) -> Option<Self::Move>;

    /// 攻め方が `mv` を指した後の持ち駒。`hand` は指す前の持ち駒
    fn after_hand(&self, _mv: Self::Move, hand: Hand) -> Hand {
        hand
    }

    /// `after_hand` の逆変換。`mv` を指した後に `hand` を持つために、指す前に必要な持ち駒
    fn before_hand(&self, _mv: Self::Move, hand: Hand) -> Hand {
        hand
    }

    /// 証明駒の補正。攻め方の持ち駒を受け方が合駒に使える場合などに駒を追加する
    fn add_if_hand_gives_other_evasions(&self, hand: Hand) -> Hand {
        hand
    }

    /// 反証駒の補正。持ち駒を追加すると新たな王手が生じる駒種を取り除く
    fn remove_if_hand_gives_other_checks(&self, hand: Hand) -> Hand {
        hand
    }

    /// `mv` を指した後の局面の (pn, dn) の初期値
    ///
    /// 置換表に値がない子局面の展開順を決める。駒の利きなどから有望な手ほど小さい pn
    /// （受け方なら小さい dn）を返す。
    fn initial_pn_dn(&self, _mv: Self::Move) -> (PnDn, PnDn) {
        (1, 1)
    }

    /// 攻め方の手番で王手がないときの反証駒の候補
    fn collect_hand(&self, or_color: Color) -> Hand {
        self.hand_of(or_color)
    }
}
