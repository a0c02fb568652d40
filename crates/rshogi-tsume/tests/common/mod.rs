//! 結合テスト用の局面グラフ

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rshogi_tsume::graph::{GraphBuilder, MateGraph, NodeSpec};
use rshogi_tsume::{DfPnSearcher, SearchConfig};

pub fn no_stop() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

pub fn small_config() -> SearchConfig {
    SearchConfig { hash_mb: 1, ..SearchConfig::default() }
}

pub fn searcher<P: rshogi_tsume::MatePosition>() -> DfPnSearcher<P> {
    DfPnSearcher::new(small_config())
}

/// 1 手詰め
pub fn mate_in_one() -> MateGraph {
    GraphBuilder::new("root")
        .node(NodeSpec::attacker("root").to_labeled("mated", "G*5b"))
        .node(NodeSpec::defender("mated"))
        .build()
        .unwrap()
}

/// 5 手詰めの王手を先に、3 手詰めの王手を後に定義した局面
pub fn two_mating_lines() -> MateGraph {
    GraphBuilder::new("root")
        .node(NodeSpec::attacker("root").to_labeled("a1", "L1").to_labeled("s1", "S1"))
        .node(NodeSpec::defender("a1").to_labeled("b1", "L2"))
        .node(NodeSpec::attacker("b1").to_labeled("a2", "L3"))
        .node(NodeSpec::defender("a2").to_labeled("b2", "L4"))
        .node(NodeSpec::attacker("b2").to_labeled("m5", "L5"))
        .node(NodeSpec::defender("m5"))
        .node(NodeSpec::defender("s1").to_labeled("t1", "S2"))
        .node(NodeSpec::attacker("t1").to_labeled("m3", "S3"))
        .node(NodeSpec::defender("m3"))
        .build()
        .unwrap()
}

/// 一本道の 5 手詰め（a0 → d1 → a2 → d3 → a4 → d5）
pub fn mate_in_five() -> MateGraph {
    GraphBuilder::new("a0")
        .node(NodeSpec::attacker("a0").to("d1"))
        .node(NodeSpec::defender("d1").to("a2"))
        .node(NodeSpec::attacker("a2").to("d3"))
        .node(NodeSpec::defender("d3").to("a4"))
        .node(NodeSpec::attacker("a4").to("d5"))
        .node(NodeSpec::defender("d5"))
        .build()
        .unwrap()
}

/// 王手 1 つに対して受けが `branches` 通りあり、どの受けにも 3 手詰めがある局面
pub fn wide_defence(branches: usize) -> MateGraph {
    let mut defence = NodeSpec::defender("d");
    let mut builder = GraphBuilder::new("root").node(NodeSpec::attacker("root").to("d"));
    for i in 0..branches {
        defence = defence.to(&format!("a{i}"));
        builder = builder
            .node(NodeSpec::attacker(&format!("a{i}")).to(&format!("b{i}")))
            .node(NodeSpec::defender(&format!("b{i}")).to(&format!("c{i}")))
            .node(NodeSpec::attacker(&format!("c{i}")).to(&format!("m{i}")))
            .node(NodeSpec::defender(&format!("m{i}")));
    }
    builder.node(defence).build().unwrap()
}

pub fn labels(graph: &MateGraph, line: &[rshogi_tsume::graph::GraphMove]) -> Vec<String> {
    line.iter().map(|&mv| graph.move_label(mv).to_string()).collect()
}
