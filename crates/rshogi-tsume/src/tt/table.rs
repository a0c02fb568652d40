//! TranspositionTable本体
//!
//! - エントリは `Vec` 上の固定長レコード。ポインタでは繋がない
//! - 盤面ハッシュから決まる `CLUSTER_SIZE` 個の連続領域（クラスタ）に同一盤面のエントリを置く
//! - 持ち駒の優劣を使って、証明済み・反証済みエントリを別の持ち駒の局面にも流用する
//! - 千日手は経路ハッシュの集合で管理し、局面の性質としては記録しない

use std::collections::HashSet;
use std::ops::Range;

use super::CLUSTER_SIZE;
use super::entry::{EntryKind, TTEntry};
use crate::types::{
    Depth, Hand, INFINITE_PNDN, MAX_NUM_MATE_MOVES, NodeState, PnDn, SearchResult, SearchedAmount,
};

/// 置換表の検索キー
///
/// エントリのアドレスではなく論理キーとして扱い、GC や置換をまたいでも毎回引き直す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookUpQuery {
    /// 持ち駒を除いた局面のハッシュ
    pub board_key: u64,
    /// 攻め方の持ち駒
    pub hand: Hand,
    /// root からの深さ
    pub depth: Depth,
    /// root からの経路ハッシュ（千日手判定用）
    pub path_key: u64,
    /// 置換表に値がないときの (pn, dn) の推定値
    pub estimate: (PnDn, PnDn),
}

/// エントリの位置。GC や置換で無効になり得るので `refresh` で検証してから使う
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySlot(usize);

/// 検索結果
#[derive(Debug, Clone, Copy)]
pub struct LookUpResult<M> {
    pub result: SearchResult<M>,
    /// 一度も pn/dn を更新していない局面か
    pub is_first_visit: bool,
    /// 探索中エントリの最小到達深さ。確定済みなら `MAX_NUM_MATE_MOVES`
    pub min_depth: Depth,
    pub slot: Option<EntrySlot>,
}

/// 置換表の使用状況
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub capacity: usize,
    pub used: usize,
    pub proven: usize,
    pub disproven: usize,
    pub unknown: usize,
    pub maybe_repetition: usize,
    pub repetition_keys: usize,
}

/// 置換表
pub struct TranspositionTable<M> {
    entries: Vec<TTEntry<M>>,
    /// 使用中エントリ数
    used: usize,
    /// 千日手になった経路ハッシュ
    repetitions: HashSet<u64>,
    repetition_capacity: usize,
    /// deep df-pn の深さごとの pn/dn 初期値。範囲外の深さは 1
    deep_pndn: Vec<PnDn>,
}

impl<M: Copy> TranspositionTable<M> {
    /// 千日手経路ハッシュの保持数の既定値
    pub const DEFAULT_REPETITION_CAPACITY: usize = 1 << 16;

    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Self {
        Self::with_entries(Self::entries_for(mb_size))
    }

    /// エントリ数を指定して作成する。最小で 1 クラスタ分
    pub fn with_entries(num_entries: usize) -> Self {
        let num_entries = num_entries.max(CLUSTER_SIZE);
        Self {
            entries: vec![TTEntry::vacant(); num_entries],
            used: 0,
            repetitions: HashSet::new(),
            repetition_capacity: Self::DEFAULT_REPETITION_CAPACITY,
            deep_pndn: Vec::new(),
        }
    }

    fn entries_for(mb_size: usize) -> usize {
        mb_size * 1024 * 1024 / std::mem::size_of::<TTEntry<M>>()
    }

    /// deep df-pn の初期値を設定する
    ///
    /// 深さ `di < depth` の未探索局面の pn/dn を `base^(depth - di)` から始め、浅い局面ほど
    /// 後回しにする。`depth == 0` なら無効。
    pub fn set_deep_dfpn(&mut self, depth: Depth, base: f64) {
        self.deep_pndn = (0..depth)
            .map(|di| {
                let value = base.powi((depth - di) as i32);
                (value as PnDn).clamp(1, INFINITE_PNDN - 1)
            })
            .collect();
    }

    /// 深さ `depth` の未探索局面の pn/dn 初期値
    fn deep_initial(&self, depth: Depth) -> PnDn {
        self.deep_pndn.get(depth as usize).copied().unwrap_or(1)
    }

    /// 置換表に値がない局面の (pn, dn)
    fn initial_pn_dn(&self, query: &LookUpQuery) -> (PnDn, PnDn) {
        let deep = self.deep_initial(query.depth);
        let (pn, dn) = query.estimate;
        (pn.max(1).saturating_mul(deep), dn.max(1).saturating_mul(deep))
    }

    pub fn set_repetition_capacity(&mut self, capacity: usize) {
        self.repetition_capacity = capacity.max(1);
    }

    /// クリア
    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.clear();
        }
        self.used = 0;
        self.repetitions.clear();
    }

    /// エントリ数
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn window(&self, board_key: u64) -> Range<usize> {
        let num_heads = (self.entries.len() - CLUSTER_SIZE + 1) as u64;
        let start = (board_key % num_heads) as usize;
        start..start + CLUSTER_SIZE
    }

    fn final_result(&self, i: usize) -> LookUpResult<M> {
        let entry = &self.entries[i];
        let result = match entry.kind {
            EntryKind::Proven => {
                SearchResult::proven(entry.hand, entry.best_move, entry.len.unwrap_or(0))
            }
            _ => SearchResult::disproven(entry.hand, entry.best_move),
        };
        LookUpResult {
            result,
            is_first_visit: false,
            min_depth: MAX_NUM_MATE_MOVES,
            slot: Some(EntrySlot(i)),
        }
    }

    /// 局面を検索する
    ///
    /// 証明済み・反証済みエントリは持ち駒の優劣で一致を判定する。探索中エントリが無い場合、
    /// pn/dn は `query.estimate` と deep df-pn の初期値から始め、同一盤面の優等・劣等局面の値で
    /// 引き上げる。`create` なら新規エントリを作る。
    pub fn look_up(&mut self, query: &LookUpQuery, create: bool) -> LookUpResult<M> {
        let mut pn: PnDn = 1;
        let mut dn: PnDn = 1;
        let mut exact = None;

        for i in self.window(query.board_key) {
            let entry = &self.entries[i];
            if entry.is_vacant() || entry.board_key != query.board_key {
                continue;
            }

            match entry.kind {
                EntryKind::Proven | EntryKind::Disproven => {
                    if entry.matches(query.board_key, query.hand) {
                        return self.final_result(i);
                    }
                }
                EntryKind::Unknown if entry.hand == query.hand => exact = Some(i),
                EntryKind::Unknown if entry.min_depth >= query.depth => {
                    if entry.hand.is_superior_or_equal(query.hand) {
                        // 優等局面より詰ますのは難しい
                        pn = pn.max(entry.pn);
                    } else if query.hand.is_superior_or_equal(entry.hand) {
                        // 劣等局面より不詰を示すのは難しい
                        dn = dn.max(entry.dn);
                    }
                }
                _ => {}
            }
        }

        if let Some(i) = exact {
            let entry = &mut self.entries[i];
            entry.min_depth = entry.min_depth.min(query.depth);
            let result = if entry.maybe_repetition && self.repetitions.contains(&query.path_key) {
                SearchResult::repetition(query.hand)
            } else {
                SearchResult::unknown(entry.pn.max(pn), entry.dn.max(dn), query.hand)
            };
            return LookUpResult {
                result,
                is_first_visit: entry.amount == 0,
                min_depth: entry.min_depth,
                slot: Some(EntrySlot(i)),
            };
        }

        let (initial_pn, initial_dn) = self.initial_pn_dn(query);
        let (pn, dn) = (pn.max(initial_pn), dn.max(initial_dn));
        let slot = if create {
            let entry = TTEntry::unknown(query.board_key, query.hand, pn, dn, query.depth);
            Some(self.insert(entry))
        } else {
            None
        };
        LookUpResult {
            result: SearchResult::unknown(pn, dn, query.hand),
            is_first_visit: true,
            min_depth: query.depth,
            slot,
        }
    }

    /// `slot` が今も `query` の局面を指していればそのまま返し、そうでなければ引き直す
    pub fn refresh(&mut self, query: &LookUpQuery, slot: Option<EntrySlot>) -> EntrySlot {
        let still_valid = slot.filter(|&EntrySlot(i)| {
            i < self.entries.len() && self.entries[i].matches(query.board_key, query.hand)
        });
        if let Some(slot) = still_valid {
            return slot;
        }

        match self.look_up(query, true).slot {
            Some(slot) => slot,
            None => {
                let (pn, dn) = self.initial_pn_dn(query);
                let entry = TTEntry::unknown(query.board_key, query.hand, pn, dn, query.depth);
                self.insert(entry)
            }
        }
    }

    /// 探索中エントリの pn/dn を更新する。確定済みエントリは変更しない
    pub fn update_pn_dn(&mut self, slot: EntrySlot, pn: PnDn, dn: PnDn, amount: SearchedAmount) {
        let entry = &mut self.entries[slot.0];
        if entry.is_unknown() {
            entry.pn = pn;
            entry.dn = dn;
            entry.add_amount(amount);
        }
    }

    /// 詰みを記録する。既に同等以上の証明駒が記録されていれば何もしない
    pub fn set_proven(
        &mut self,
        query: &LookUpQuery,
        proof_hand: Hand,
        best_move: Option<M>,
        len: Depth,
        amount: SearchedAmount,
    ) -> EntrySlot {
        let window = self.window(query.board_key);
        for i in window.clone() {
            let entry = &mut self.entries[i];
            if entry.board_key == query.board_key
                && entry.kind == EntryKind::Proven
                && proof_hand.is_superior_or_equal(entry.hand)
            {
                entry.add_amount(amount);
                return EntrySlot(i);
            }
        }

        // proof_hand 以上の持ち駒の局面は全て詰み -> もういらない
        self.remove_where(window, |entry| {
            entry.board_key == query.board_key
                && matches!(entry.kind, EntryKind::Proven | EntryKind::Unknown)
                && entry.hand.is_superior_or_equal(proof_hand)
        });
        self.insert(TTEntry::proven(query.board_key, proof_hand, best_move, len, amount.max(1)))
    }

    /// 不詰を記録する。既に同等以上の反証駒が記録されていれば何もしない
    pub fn set_disproven(
        &mut self,
        query: &LookUpQuery,
        disproof_hand: Hand,
        best_move: Option<M>,
        amount: SearchedAmount,
    ) -> EntrySlot {
        let window = self.window(query.board_key);
        for i in window.clone() {
            let entry = &mut self.entries[i];
            if entry.board_key == query.board_key
                && entry.kind == EntryKind::Disproven
                && entry.hand.is_superior_or_equal(disproof_hand)
            {
                entry.add_amount(amount);
                return EntrySlot(i);
            }
        }

        // disproof_hand 以下の持ち駒の局面は全て不詰 -> もういらない
        self.remove_where(window, |entry| {
            entry.board_key == query.board_key
                && matches!(entry.kind, EntryKind::Disproven | EntryKind::Unknown)
                && disproof_hand.is_superior_or_equal(entry.hand)
        });
        self.insert(TTEntry::disproven(query.board_key, disproof_hand, best_move, amount.max(1)))
    }

    /// 経路 `query.path_key` で千日手になったことを記録する
    pub fn set_repetition(&mut self, query: &LookUpQuery, amount: SearchedAmount) {
        let slot = self.refresh(query, None);
        let entry = &mut self.entries[slot.0];
        if entry.is_unknown() {
            entry.maybe_repetition = true;
            entry.add_amount(amount);
        }

        if self.repetitions.len() >= self.repetition_capacity {
            log::debug!("repetition keys overflow: clear {} keys", self.repetitions.len());
            self.repetitions.clear();
        }
        self.repetitions.insert(query.path_key);
    }

    fn remove_where(&mut self, window: Range<usize>, pred: impl Fn(&TTEntry<M>) -> bool) {
        for i in window {
            if !self.entries[i].is_vacant() && pred(&self.entries[i]) {
                self.entries[i].clear();
                self.used -= 1;
            }
        }
    }

    /// クラスタ内の空きに書き込む。空きがなければ最も価値の低いエントリを上書きする
    fn insert(&mut self, new_entry: TTEntry<M>) -> EntrySlot {
        let window = self.window(new_entry.board_key);
        let mut victim = window.start;
        let mut victim_amount = SearchedAmount::MAX;

        for i in window {
            let entry = &self.entries[i];
            if entry.is_vacant() {
                self.entries[i] = new_entry;
                self.used += 1;
                return EntrySlot(i);
            }

            let amount = entry.adjusted_amount();
            if amount < victim_amount {
                victim_amount = amount;
                victim = i;
            }
        }

        self.entries[victim] = new_entry;
        EntrySlot(victim)
    }

    /// 使用率（千分率）
    pub fn hashfull(&self) -> u32 {
        (self.used * 1000 / self.entries.len()) as u32
    }

    /// 使用率（0.0〜1.0）。GC の判定に使う
    pub fn fill_ratio(&self) -> f64 {
        self.used as f64 / self.entries.len() as f64
    }

    /// 探索量の少ないエントリから、使用中エントリの `fraction` 割合を削除する
    ///
    /// 削除したエントリ数を返す。
    pub fn collect_garbage(&mut self, fraction: f64) -> usize {
        let target = (self.used as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize;
        if target == 0 {
            return 0;
        }

        let mut amounts: Vec<SearchedAmount> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_vacant())
            .map(|entry| entry.adjusted_amount())
            .collect();
        let threshold = if target >= amounts.len() {
            SearchedAmount::MAX
        } else {
            *amounts.select_nth_unstable(target - 1).1
        };

        let mut removed = 0;
        for entry in self.entries.iter_mut() {
            if !entry.is_vacant() && entry.adjusted_amount() < threshold {
                entry.clear();
                removed += 1;
            }
        }
        for entry in self.entries.iter_mut() {
            if removed >= target {
                break;
            }
            if !entry.is_vacant() && entry.adjusted_amount() == threshold {
                entry.clear();
                removed += 1;
            }
        }

        self.used -= removed;
        removed
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            capacity: self.entries.len(),
            used: self.used,
            repetition_keys: self.repetitions.len(),
            ..TableStats::default()
        };
        for entry in &self.entries {
            match entry.state() {
                _ if entry.is_vacant() => {}
                NodeState::Proven => stats.proven += 1,
                NodeState::Disproven => stats.disproven += 1,
                _ => {
                    stats.unknown += 1;
                    if entry.maybe_repetition {
                        stats.maybe_repetition += 1;
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HandPiece, INFINITE_PNDN};

    fn query(board_key: u64, hand: Hand, depth: Depth) -> LookUpQuery {
        LookUpQuery { board_key, hand, depth, path_key: board_key ^ 0xABCD, estimate: (1, 1) }
    }

    #[test]
    fn test_look_up_without_creation_does_not_store() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let q = query(5, Hand::EMPTY, 0);
        let r = tt.look_up(&q, false);
        assert!(r.is_first_visit);
        assert!(r.slot.is_none());
        assert_eq!((r.result.pn, r.result.dn), (1, 1));
        assert_eq!(tt.stats().used, 0);

        let r = tt.look_up(&q, true);
        assert!(r.slot.is_some());
        assert_eq!(tt.stats().used, 1);
    }

    #[test]
    fn test_update_pn_dn_marks_visited() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let q = query(5, Hand::EMPTY, 2);
        let slot = tt.refresh(&q, None);
        tt.update_pn_dn(slot, 4, 9, 3);

        let r = tt.look_up(&q, false);
        assert!(!r.is_first_visit);
        assert_eq!((r.result.pn, r.result.dn), (4, 9));
        assert_eq!(r.min_depth, 2);

        // 浅い深さで引くと最小深さが更新される
        let shallow = query(5, Hand::EMPTY, 1);
        assert_eq!(tt.look_up(&shallow, false).min_depth, 1);
    }

    #[test]
    fn test_proof_hand_covers_superior_hands() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let gold = Hand::EMPTY.add(HandPiece::Gold);
        tt.set_proven(&query(9, gold, 0), gold, Some(3), 1, 1);

        let r = tt.look_up(&query(9, gold.add(HandPiece::Pawn), 4), false);
        assert_eq!(r.result.state, NodeState::Proven);
        assert_eq!(r.result.best_move, Some(3));
        assert_eq!(r.result.len, Some(1));
        assert_eq!(r.result.hand, gold);

        let r = tt.look_up(&query(9, Hand::EMPTY, 4), false);
        assert_eq!(r.result.state, NodeState::Unknown);
    }

    #[test]
    fn test_disproof_hand_covers_inferior_hands() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let silver = Hand::EMPTY.add(HandPiece::Silver);
        tt.set_disproven(&query(9, silver, 0), silver, None, 1);

        let r = tt.look_up(&query(9, Hand::EMPTY, 0), false);
        assert_eq!(r.result.state, NodeState::Disproven);
        assert_eq!((r.result.pn, r.result.dn), (INFINITE_PNDN, 0));

        let r = tt.look_up(&query(9, silver.add(HandPiece::Rook), 0), false);
        assert_eq!(r.result.state, NodeState::Unknown);
    }

    #[test]
    fn test_set_proven_removes_subsumed_entries_and_is_idempotent() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let gold = Hand::EMPTY.add(HandPiece::Gold);
        let gold_pawn = gold.add(HandPiece::Pawn);

        tt.refresh(&query(9, gold_pawn, 0), None);
        tt.set_proven(&query(9, gold_pawn, 0), gold_pawn, None, 3, 1);
        assert_eq!(tt.stats().used, 1);

        // より弱い証明駒で上書きすると、古い証明済みエントリは消える
        tt.set_proven(&query(9, gold, 0), gold, None, 3, 1);
        assert_eq!(tt.stats().proven, 1);
        tt.set_proven(&query(9, gold_pawn, 0), gold_pawn, None, 3, 1);
        assert_eq!(tt.stats().proven, 1);
        assert_eq!(tt.look_up(&query(9, gold_pawn, 0), false).result.hand, gold);
    }

    #[test]
    fn test_initial_pn_dn_from_neighbours() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let pawn = Hand::EMPTY.add(HandPiece::Pawn);
        let pawn2 = pawn.add(HandPiece::Pawn);

        let slot = tt.refresh(&query(3, pawn2, 2), None);
        tt.update_pn_dn(slot, 5, 2, 1);
        let slot = tt.refresh(&query(3, Hand::EMPTY, 2), None);
        tt.update_pn_dn(slot, 2, 7, 1);

        let r = tt.look_up(&query(3, pawn, 2), false);
        assert_eq!((r.result.pn, r.result.dn), (5, 7));

        // より深い位置からの検索では近傍の値を使わない
        let r = tt.look_up(&query(3, pawn, 3), false);
        assert_eq!((r.result.pn, r.result.dn), (1, 1));
    }

    #[test]
    fn test_estimate_and_deep_dfpn_seed_unvisited_entries() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let estimated = LookUpQuery { estimate: (2, 3), ..query(4, Hand::EMPTY, 1) };
        let r = tt.look_up(&estimated, false);
        assert_eq!((r.result.pn, r.result.dn), (2, 3));

        // 深さ 0, 1 は 3^2, 3^1 倍。深さ 2 以降は推定値のまま
        tt.set_deep_dfpn(2, 3.0);
        assert_eq!(tt.look_up(&query(4, Hand::EMPTY, 0), false).result.pn, 9);
        let r = tt.look_up(&estimated, false);
        assert_eq!((r.result.pn, r.result.dn), (6, 9));
        let deep = LookUpQuery { depth: 2, ..estimated };
        assert_eq!(tt.look_up(&deep, false).result.dn, 3);

        // 作成したエントリは初期値を引き継ぎ、探索後は記録した値を返す
        let slot = tt.refresh(&estimated, None);
        assert_eq!(tt.look_up(&estimated, false).result.pn, 6);
        tt.update_pn_dn(slot, 1, 4, 1);
        let r = tt.look_up(&estimated, false);
        assert_eq!((r.result.pn, r.result.dn), (1, 4));
        assert!(!r.is_first_visit);
    }

    #[test]
    fn test_repetition_is_path_dependent() {
        let mut tt = TranspositionTable::<u32>::with_entries(64);
        let q = query(11, Hand::EMPTY, 4);
        tt.set_repetition(&q, 1);

        assert_eq!(tt.look_up(&q, false).result.state, NodeState::Repetition);
        let other_path = LookUpQuery { path_key: 777, ..q };
        assert_eq!(tt.look_up(&other_path, false).result.state, NodeState::Unknown);
        assert_eq!(tt.stats().maybe_repetition, 1);
    }

    #[test]
    fn test_refresh_detects_relocation() {
        let mut tt = TranspositionTable::<u32>::with_entries(16);
        let q = query(1, Hand::EMPTY, 0);
        let slot = tt.refresh(&q, None);
        assert_eq!(tt.refresh(&q, Some(slot)), slot);

        tt.clear();
        let other = query(2, Hand::EMPTY.add(HandPiece::Rook), 0);
        let other_slot = tt.refresh(&other, None);
        assert_eq!(other_slot, slot);
        // 同じ位置に別局面が入ったので引き直される
        let again = tt.refresh(&q, Some(slot));
        assert_ne!(again, other_slot);
    }

    #[test]
    fn test_eviction_prefers_low_amount() {
        let mut tt = TranspositionTable::<u32>::with_entries(CLUSTER_SIZE);
        for key in 0..CLUSTER_SIZE as u64 {
            let slot = tt.refresh(&query(key * 1000, Hand::EMPTY, 0), None);
            tt.update_pn_dn(slot, 1, 1, 100 + key);
        }
        assert_eq!(tt.hashfull(), 1000);

        tt.refresh(&query(424242, Hand::EMPTY, 0), None);
        // 探索量が最小だった board_key=0 が追い出される
        assert!(tt.look_up(&query(0, Hand::EMPTY, 0), false).is_first_visit);
        assert!(!tt.look_up(&query(1000, Hand::EMPTY, 0), false).is_first_visit);
    }

    #[test]
    fn test_collect_garbage_removes_requested_fraction() {
        let mut tt = TranspositionTable::<u32>::with_entries(CLUSTER_SIZE);
        for key in 0..10u64 {
            let slot = tt.refresh(&query(key, Hand::EMPTY, 0), None);
            tt.update_pn_dn(slot, 1, 1, key + 1);
        }
        tt.set_proven(&query(99, Hand::EMPTY, 0), Hand::EMPTY, None, 1, 1);
        assert_eq!(tt.stats().used, 11);

        let removed = tt.collect_garbage(0.5);
        assert_eq!(removed, 6);
        assert_eq!(tt.stats().used, 5);
        // 詰みのエントリは 10 倍扱いなので残る
        assert_eq!(tt.stats().proven, 1);
        assert!(!tt.look_up(&query(9, Hand::EMPTY, 0), false).is_first_visit);
        assert!(tt.look_up(&query(0, Hand::EMPTY, 0), false).is_first_visit);
    }
}
