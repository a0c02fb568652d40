//! 手番（Color）

use serde::Deserialize;

/// 手番（先手/後手）
///
/// 詰将棋では攻め方がどちらの手番かを問わないため、OR/AND の判定は
/// `Color` ではなく探索開始時に記録した攻め方の手番との比較で行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Color {
    Black = 0,
    White = 1,
}

impl Color {
    /// 相手番を返す
    #[inline]
    pub const fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// SFEN 表記での手番文字
    pub const fn to_sfen_char(self) -> char {
        match self {
            Color::Black => 'b',
            Color::White => 'w',
        }
    }
}

impl std::ops::Not for Color {
    type Output = Color;

    #[inline]
    fn not(self) -> Color {
        self.opponent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opponent() {
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(!Color::White, Color::Black);
    }

    #[test]
    fn test_color_deserialize_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            turn: Color,
        }
        let w: Wrapper = toml::from_str(r#"turn = "white""#).unwrap();
        assert_eq!(w.turn, Color::White);
        assert_eq!(w.turn.to_sfen_char(), 'w');
    }
}
