//! 持ち駒（Hand）
//!
//! 詰将棋探索では攻め方の持ち駒だけを扱う。証明駒・反証駒もこの型で表現し、
//! 駒種ごとの枚数比較（優等・劣等）と、駒種ごとの min / max による合成を提供する。

use std::fmt;

/// 持ち駒になり得る駒種
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HandPiece {
    Pawn = 0,
    Lance = 1,
    Knight = 2,
    Silver = 3,
    Gold = 4,
    Bishop = 5,
    Rook = 6,
}

impl HandPiece {
    /// 全駒種（ビット配置順）
    pub const ALL: [HandPiece; 7] = [
        HandPiece::Pawn,
        HandPiece::Lance,
        HandPiece::Knight,
        HandPiece::Silver,
        HandPiece::Gold,
        HandPiece::Bishop,
        HandPiece::Rook,
    ];

    /// 盤上に存在し得る最大枚数
    pub const fn max_count(self) -> u32 {
        match self {
            HandPiece::Pawn => 18,
            HandPiece::Lance | HandPiece::Knight | HandPiece::Silver | HandPiece::Gold => 4,
            HandPiece::Bishop | HandPiece::Rook => 2,
        }
    }

    /// SFEN の駒文字（先手表記）
    pub const fn sfen_char(self) -> char {
        match self {
            HandPiece::Pawn => 'P',
            HandPiece::Lance => 'L',
            HandPiece::Knight => 'N',
            HandPiece::Silver => 'S',
            HandPiece::Gold => 'G',
            HandPiece::Bishop => 'B',
            HandPiece::Rook => 'R',
        }
    }

    const fn shift_mask(self) -> (u32, u32) {
        match self {
            HandPiece::Pawn => (0, 0x1F),
            HandPiece::Lance => (5, 0x07),
            HandPiece::Knight => (8, 0x07),
            HandPiece::Silver => (11, 0x07),
            HandPiece::Gold => (14, 0x07),
            HandPiece::Bishop => (17, 0x03),
            HandPiece::Rook => (19, 0x03),
        }
    }
}

/// 手駒（32bit packed）
///
/// ビット配置:
/// - bit 0-4:   歩 (5bit, 最大18枚)
/// - bit 5-7:   香 (3bit, 最大4枚)
/// - bit 8-10:  桂 (3bit, 最大4枚)
/// - bit 11-13: 銀 (3bit, 最大4枚)
/// - bit 14-16: 金 (3bit, 最大4枚)
/// - bit 17-18: 角 (2bit, 最大2枚)
/// - bit 19-20: 飛 (2bit, 最大2枚)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Hand(u32);

impl Hand {
    /// 空の手駒
    pub const EMPTY: Hand = Hand(0);

    /// 全駒種を最大枚数持っている手駒。反証駒の初期値に使う
    pub const FULL: Hand = Hand::EMPTY
        .set(HandPiece::Pawn, HandPiece::Pawn.max_count())
        .set(HandPiece::Lance, HandPiece::Lance.max_count())
        .set(HandPiece::Knight, HandPiece::Knight.max_count())
        .set(HandPiece::Silver, HandPiece::Silver.max_count())
        .set(HandPiece::Gold, HandPiece::Gold.max_count())
        .set(HandPiece::Bishop, HandPiece::Bishop.max_count())
        .set(HandPiece::Rook, HandPiece::Rook.max_count());

    /// 指定駒種の枚数を取得
    #[inline]
    pub const fn count(self, pc: HandPiece) -> u32 {
        let (shift, mask) = pc.shift_mask();
        (self.0 >> shift) & mask
    }

    /// 1枚追加
    #[inline]
    pub const fn add(self, pc: HandPiece) -> Hand {
        debug_assert!(self.count(pc) < pc.max_count());
        let (shift, _) = pc.shift_mask();
        Hand(self.0 + (1 << shift))
    }

    /// 1枚減らす
    #[inline]
    pub const fn sub(self, pc: HandPiece) -> Hand {
        debug_assert!(self.count(pc) > 0);
        let (shift, _) = pc.shift_mask();
        Hand(self.0 - (1 << shift))
    }

    /// 指定枚数をセット。最大枚数を超える値は切り詰める
    #[inline]
    pub const fn set(self, pc: HandPiece, count: u32) -> Hand {
        let (shift, mask) = pc.shift_mask();
        let count = if count > pc.max_count() { pc.max_count() } else { count };
        Hand((self.0 & !(mask << shift)) | ((count & mask) << shift))
    }

    /// 優等局面判定: self >= other（全ての駒種で自分以上）
    pub fn is_superior_or_equal(self, other: Hand) -> bool {
        HandPiece::ALL.iter().all(|&pc| self.count(pc) >= other.count(pc))
    }

    /// 駒種ごとの最小値（積集合）
    pub fn meet(self, other: Hand) -> Hand {
        HandPiece::ALL
            .iter()
            .fold(Hand::EMPTY, |acc, &pc| acc.set(pc, self.count(pc).min(other.count(pc))))
    }

    /// 駒種ごとの最大値（和集合）
    pub fn join(self, other: Hand) -> Hand {
        HandPiece::ALL
            .iter()
            .fold(Hand::EMPTY, |acc, &pc| acc.set(pc, self.count(pc).max(other.count(pc))))
    }

    /// 持ち駒の総枚数
    pub fn total_count(self) -> u32 {
        HandPiece::ALL.iter().map(|&pc| self.count(pc)).sum()
    }

    /// 空かどうか
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// SFEN の持ち駒表記（飛角金銀桂香歩の順、空なら `-`）
impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for &pc in HandPiece::ALL.iter().rev() {
            match self.count(pc) {
                0 => {}
                1 => write!(f, "{}", pc.sfen_char())?,
                n => write!(f, "{n}{}", pc.sfen_char())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_add_sub() {
        let hand = Hand::EMPTY.add(HandPiece::Rook).add(HandPiece::Rook);
        assert_eq!(hand.count(HandPiece::Rook), 2);
        let hand = hand.sub(HandPiece::Rook);
        assert_eq!(hand.count(HandPiece::Rook), 1);
        assert_eq!(hand.count(HandPiece::Bishop), 0);
    }

    #[test]
    fn test_hand_full() {
        for pc in HandPiece::ALL {
            assert_eq!(Hand::FULL.count(pc), pc.max_count());
        }
        assert_eq!(Hand::FULL.total_count(), 38);
        assert!(Hand::FULL.is_superior_or_equal(Hand::EMPTY.set(HandPiece::Pawn, 18)));
    }

    #[test]
    fn test_hand_set_saturates() {
        let hand = Hand::EMPTY.set(HandPiece::Gold, 9);
        assert_eq!(hand.count(HandPiece::Gold), 4);
        assert_eq!(hand.count(HandPiece::Silver), 0);
    }

    #[test]
    fn test_hand_superior() {
        let two_pawns = Hand::EMPTY.add(HandPiece::Pawn).add(HandPiece::Pawn);
        let one_pawn = Hand::EMPTY.add(HandPiece::Pawn);
        let rook = Hand::EMPTY.add(HandPiece::Rook);

        assert!(two_pawns.is_superior_or_equal(one_pawn));
        assert!(!one_pawn.is_superior_or_equal(two_pawns));
        assert!(two_pawns.is_superior_or_equal(two_pawns));
        // 比較不能
        assert!(!two_pawns.is_superior_or_equal(rook));
        assert!(!rook.is_superior_or_equal(two_pawns));
    }

    #[test]
    fn test_hand_meet_join() {
        let a = Hand::EMPTY.set(HandPiece::Pawn, 3).set(HandPiece::Gold, 1);
        let b = Hand::EMPTY.set(HandPiece::Pawn, 1).set(HandPiece::Rook, 2);

        let meet = a.meet(b);
        assert_eq!(meet.count(HandPiece::Pawn), 1);
        assert_eq!(meet.count(HandPiece::Gold), 0);
        assert_eq!(meet.count(HandPiece::Rook), 0);

        let join = a.join(b);
        assert_eq!(join.count(HandPiece::Pawn), 3);
        assert_eq!(join.count(HandPiece::Gold), 1);
        assert_eq!(join.count(HandPiece::Rook), 2);

        assert!(join.is_superior_or_equal(a) && join.is_superior_or_equal(b));
        assert!(a.is_superior_or_equal(meet) && b.is_superior_or_equal(meet));
        assert_eq!(Hand::FULL.meet(a), a);
        assert_eq!(Hand::EMPTY.join(b), b);
    }

    #[test]
    fn test_hand_display() {
        assert_eq!(Hand::EMPTY.to_string(), "-");
        let hand = Hand::EMPTY.set(HandPiece::Pawn, 2).set(HandPiece::Rook, 1).add(HandPiece::Silver);
        assert_eq!(hand.to_string(), "RS2P");
    }
}
