//! 証明数・反証数と探索深さ

/// 証明数・反証数
pub type PnDn = u64;

/// 証明数・反証数の無限大。加算でオーバーフローしないよう `u64::MAX` の半分にとどめる
pub const INFINITE_PNDN: PnDn = u64::MAX / 2;

/// root からの手数
pub type Depth = u32;

/// 詰み手順の最大手数。探索深さの上限にもなる
pub const MAX_NUM_MATE_MOVES: Depth = 3000;

/// 置換表エントリに記録する探索量
pub type SearchedAmount = u64;

/// 証明数・反証数を `[0, INFINITE_PNDN]` に収める
#[inline]
pub fn clamp_pndn(value: u128) -> PnDn {
    if value >= INFINITE_PNDN as u128 { INFINITE_PNDN } else { value as PnDn }
}

/// φ値（OR node なら pn、AND node なら dn）
#[inline]
pub const fn phi(pn: PnDn, dn: PnDn, or_node: bool) -> PnDn {
    if or_node { pn } else { dn }
}

/// δ値（OR node なら dn、AND node なら pn）
#[inline]
pub const fn delta(pn: PnDn, dn: PnDn, or_node: bool) -> PnDn {
    if or_node { dn } else { pn }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phi_delta_swap_roles() {
        assert_eq!(phi(3, 7, true), 3);
        assert_eq!(delta(3, 7, true), 7);
        assert_eq!(phi(3, 7, false), 7);
        assert_eq!(delta(3, 7, false), 3);
    }

    #[test]
    fn test_clamp_pndn() {
        assert_eq!(clamp_pndn(5), 5);
        assert_eq!(clamp_pndn(INFINITE_PNDN as u128 * 3), INFINITE_PNDN);
    }
}
