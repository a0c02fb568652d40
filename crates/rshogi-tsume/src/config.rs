//! 探索設定

use serde::Deserialize;

use crate::types::{Depth, MAX_NUM_MATE_MOVES};

/// df-pn 探索の設定
///
/// 問題ファイルの `[config]` テーブルから読み込める。省略した項目は既定値になる。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// 置換表サイズ（MB）
    pub hash_mb: usize,
    /// 探索深さの上限
    pub max_depth: Depth,
    /// 探索局面数の上限
    pub nodes_limit: u64,
    /// 探索時間の上限（ミリ秒）。`None` なら無制限
    pub time_limit_ms: Option<u64>,
    /// GC を始める置換表使用率（0.0〜1.0）
    pub gc_fill_ratio: f64,
    /// 1 回の GC で削除する使用中エントリの割合
    pub gc_remove_ratio: f64,
    /// GC 判定の間隔（ミリ秒）
    pub gc_interval_ms: u64,
    /// 初訪問の OR node で行う末端探索の深さ
    pub first_search_or_depth: Depth,
    /// 初訪問の AND node で行う末端探索の深さ
    pub first_search_and_depth: Depth,
    /// 詰み手順の復元時、未証明の王手 1 つあたりに追加で探索する局面数
    pub post_search_nodes: u64,
    /// 置換表に保持する千日手経路の最大数
    pub repetition_capacity: usize,
    /// deep df-pn を適用する深さ。0 なら無効
    pub deep_dfpn_depth: Depth,
    /// deep df-pn の底。深さ `d` の局面の pn/dn は `base^(deep_dfpn_depth - d)` から始まる
    pub deep_dfpn_base: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hash_mb: 64,
            max_depth: MAX_NUM_MATE_MOVES,
            nodes_limit: u64::MAX,
            time_limit_ms: None,
            gc_fill_ratio: 0.9,
            gc_remove_ratio: 0.5,
            gc_interval_ms: 100,
            // 1 ではあまり効果がなく 3 では逆に遅くなる
            first_search_or_depth: 1,
            first_search_and_depth: 2,
            post_search_nodes: 2_000,
            repetition_capacity: 1 << 16,
            deep_dfpn_depth: 0,
            deep_dfpn_base: 1.5,
        }
    }
}

impl SearchConfig {
    /// TOML 文字列から読み込む
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
