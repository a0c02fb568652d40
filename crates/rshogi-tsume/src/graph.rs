//! 局面グラフ
//!
//! 盤面を持たず、局面と指し手を明示的に列挙した有向グラフで `MatePosition` を実装する。
//! 問題ファイル（TOML）から読み込むほか、テストでは `GraphBuilder` で組み立てる。
//!
//! ```toml
//! root = "start"
//!
//! [config]
//! nodes_limit = 100000
//!
//! [[nodes]]
//! name = "start"
//! turn = "black"
//! hand = { gold = 1 }
//! moves = [{ to = "after_drop", label = "G*5b", estimate = [1, 2] }]
//!
//! [[nodes]]
//! name = "after_drop"
//! turn = "white"
//! in_check = true
//! ```
//!
//! - root の手番側が攻め方。`hand` は攻め方の持ち駒で、受け方の局面にも書く。
//!   受け方の指し手の前後で攻め方の持ち駒は変わらない
//! - `board` が同じ局面は持ち駒だけが違う同一盤面として扱う。省略時は `name`
//! - 王手されていて指し手がない受け方の局面が詰み
//! - 指し手の `estimate` は行き先の局面の (pn, dn) の初期値。省略時は `[1, 1]`

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::{TsumeError, TsumeResult};
use crate::position::{MatePosition, MoveList};
use crate::types::{Color, Hand, HandPiece, PnDn};

/// 駒種ごとの枚数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandCounts {
    pub rook: u32,
    pub bishop: u32,
    pub gold: u32,
    pub silver: u32,
    pub knight: u32,
    pub lance: u32,
    pub pawn: u32,
}

impl HandCounts {
    fn pairs(self) -> [(HandPiece, u32); 7] {
        [
            (HandPiece::Rook, self.rook),
            (HandPiece::Bishop, self.bishop),
            (HandPiece::Gold, self.gold),
            (HandPiece::Silver, self.silver),
            (HandPiece::Knight, self.knight),
            (HandPiece::Lance, self.lance),
            (HandPiece::Pawn, self.pawn),
        ]
    }

    pub fn to_hand(self) -> Hand {
        self.pairs().into_iter().fold(Hand::EMPTY, |hand, (pc, n)| hand.set(pc, n))
    }
}

impl From<Hand> for HandCounts {
    fn from(hand: Hand) -> Self {
        Self {
            rook: hand.count(HandPiece::Rook),
            bishop: hand.count(HandPiece::Bishop),
            gold: hand.count(HandPiece::Gold),
            silver: hand.count(HandPiece::Silver),
            knight: hand.count(HandPiece::Knight),
            lance: hand.count(HandPiece::Lance),
            pawn: hand.count(HandPiece::Pawn),
        }
    }
}

/// 指し手の定義
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub to: String,
    /// 表示用の指し手表記。省略時は行き先の局面名
    #[serde(default)]
    pub label: Option<String>,
    /// 行き先の局面の (pn, dn) の初期値
    #[serde(default)]
    pub estimate: Option<(PnDn, PnDn)>,
}

/// 局面の定義
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub board: Option<String>,
    pub turn: Color,
    #[serde(default)]
    pub in_check: bool,
    #[serde(default)]
    pub hand: HandCounts,
    #[serde(default)]
    pub moves: Vec<EdgeSpec>,
}

impl NodeSpec {
    pub fn new(name: &str, turn: Color) -> Self {
        Self {
            name: name.to_string(),
            board: None,
            turn,
            in_check: false,
            hand: HandCounts::default(),
            moves: Vec::new(),
        }
    }

    /// 先手（攻め方）の局面
    pub fn attacker(name: &str) -> Self {
        Self::new(name, Color::Black)
    }

    /// 王手されている後手（受け方）の局面
    pub fn defender(name: &str) -> Self {
        Self { in_check: true, ..Self::new(name, Color::White) }
    }

    pub fn board(mut self, board: &str) -> Self {
        self.board = Some(board.to_string());
        self
    }

    pub fn in_check(mut self, in_check: bool) -> Self {
        self.in_check = in_check;
        self
    }

    /// 攻め方の持ち駒
    pub fn hand(mut self, hand: Hand) -> Self {
        self.hand = hand.into();
        self
    }

    pub fn to(mut self, target: &str) -> Self {
        self.moves.push(EdgeSpec { to: target.to_string(), label: None, estimate: None });
        self
    }

    pub fn to_labeled(mut self, target: &str, label: &str) -> Self {
        self.moves.push(EdgeSpec {
            to: target.to_string(),
            label: Some(label.to_string()),
            estimate: None,
        });
        self
    }

    /// 行き先の (pn, dn) の初期値を指定した指し手
    pub fn to_estimated(mut self, target: &str, pn: PnDn, dn: PnDn) -> Self {
        self.moves.push(EdgeSpec { to: target.to_string(), label: None, estimate: Some((pn, dn)) });
        self
    }
}

/// 局面グラフを組み立てる
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    root: String,
    nodes: Vec<NodeSpec>,
}

impl GraphBuilder {
    pub fn new(root: &str) -> Self {
        Self { root: root.to_string(), nodes: Vec::new() }
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn build(self) -> TsumeResult<MateGraph> {
        MateGraph::from_specs(&self.root, self.nodes)
    }
}

/// 問題ファイル
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProblemFile {
    root: String,
    #[serde(default)]
    config: SearchConfig,
    #[serde(default)]
    nodes: Vec<NodeSpec>,
}

/// 読み込んだ問題
#[derive(Debug)]
pub struct Problem {
    pub graph: MateGraph,
    pub config: SearchConfig,
}

impl Problem {
    pub fn from_toml_str(s: &str) -> TsumeResult<Self> {
        let file: ProblemFile = toml::from_str(s)?;
        let graph = MateGraph::from_specs(&file.root, file.nodes)?;
        Ok(Self { graph, config: file.config })
    }

    pub fn load(path: &Path) -> TsumeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| TsumeError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug)]
struct GraphNode {
    name: String,
    turn: Color,
    in_check: bool,
    hand: Hand,
    board_key: u64,
    edges: Range<usize>,
}

#[derive(Debug)]
struct GraphEdge {
    from: usize,
    to: usize,
    label: String,
    estimate: (PnDn, PnDn),
}

/// 局面グラフの指し手。局面内では定義順に並ぶ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphMove(u32);

/// 局面グラフ
#[derive(Debug)]
pub struct MateGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    root: usize,
    attacker: Color,
}

impl MateGraph {
    fn from_specs(root: &str, specs: Vec<NodeSpec>) -> TsumeResult<Self> {
        let mut index = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.as_str(), i).is_some() {
                return Err(TsumeError::DuplicateNode(spec.name.clone()));
            }
        }
        let root = *index.get(root).ok_or_else(|| TsumeError::MissingRoot(root.to_string()))?;
        let attacker = specs[root].turn;

        // 盤面ハッシュは盤面名と手番ごとに乱数で振る
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x6772_6170_685f_6b65);
        let mut board_keys: HashMap<(&str, Color), u64> = HashMap::new();
        let mut positions: HashMap<(u64, Hand), &str> = HashMap::new();
        let mut nodes = Vec::with_capacity(specs.len());
        let mut edges = Vec::new();

        for (i, spec) in specs.iter().enumerate() {
            let board = spec.board.as_deref().unwrap_or(&spec.name);
            let board_key = *board_keys.entry((board, spec.turn)).or_insert_with(|| rng.next_u64());
            let hand = spec.hand.to_hand();
            if let Some(first) = positions.insert((board_key, hand), &spec.name) {
                return Err(TsumeError::AmbiguousPosition {
                    first: first.to_string(),
                    second: spec.name.clone(),
                });
            }

            let start = edges.len();
            for edge in &spec.moves {
                let to = *index.get(edge.to.as_str()).ok_or_else(|| TsumeError::UnknownNode {
                    name: edge.to.clone(),
                    from: spec.name.clone(),
                })?;
                if spec.turn != attacker && specs[to].hand != spec.hand {
                    return Err(TsumeError::HandChangedByDefender {
                        from: spec.name.clone(),
                        to: edge.to.clone(),
                    });
                }
                let label = edge.label.clone().unwrap_or_else(|| edge.to.clone());
                let estimate = edge.estimate.unwrap_or((1, 1));
                edges.push(GraphEdge { from: i, to, label, estimate });
            }

            nodes.push(GraphNode {
                name: spec.name.clone(),
                turn: spec.turn,
                in_check: spec.in_check,
                hand,
                board_key,
                edges: start..edges.len(),
            });
        }

        log::debug!("graph loaded: {} nodes, {} moves", nodes.len(), edges.len());
        Ok(Self { nodes, edges, root, attacker })
    }

    /// root 局面
    pub fn position(&self) -> GraphPosition<'_> {
        GraphPosition { graph: self, current: self.root, stack: Vec::new() }
    }

    /// 局面 `name` から始める。攻め方は root の手番側のまま
    pub fn position_at(&self, name: &str) -> Option<GraphPosition<'_>> {
        let current = self.nodes.iter().position(|node| node.name == name)?;
        Some(GraphPosition { graph: self, current, stack: Vec::new() })
    }

    pub fn attacker(&self) -> Color {
        self.attacker
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn move_label(&self, mv: GraphMove) -> &str {
        &self.edges[mv.0 as usize].label
    }

    /// 局面 `from` から `to` への指し手
    pub fn move_between(&self, from: &str, to: &str) -> Option<GraphMove> {
        let from = self.nodes.iter().position(|node| node.name == from)?;
        self.nodes[from]
            .edges
            .clone()
            .find(|&e| self.nodes[self.edges[e].to].name == to)
            .map(|e| GraphMove(e as u32))
    }

    fn edge(&self, mv: GraphMove) -> &GraphEdge {
        &self.edges[mv.0 as usize]
    }

    /// `mv` による攻め方の持ち駒の増減を `hand` に適用する。`forward` でなければ逆向き
    fn shift_hand(&self, mv: GraphMove, hand: Hand, forward: bool) -> Hand {
        let edge = self.edge(mv);
        let (before, after) = (self.nodes[edge.from].hand, self.nodes[edge.to].hand);
        HandPiece::ALL.into_iter().fold(hand, |acc, pc| {
            let (gain, loss) = if forward {
                (after.count(pc), before.count(pc))
            } else {
                (before.count(pc), after.count(pc))
            };
            let count = (acc.count(pc) + gain).saturating_sub(loss);
            acc.set(pc, count)
        })
    }
}

/// 局面グラフ上の現在局面
#[derive(Debug, Clone)]
pub struct GraphPosition<'g> {
    graph: &'g MateGraph,
    current: usize,
    stack: Vec<usize>,
}

impl GraphPosition<'_> {
    fn node(&self) -> &GraphNode {
        &self.graph.nodes[self.current]
    }

    /// 現在局面の名前
    pub fn name(&self) -> &str {
        &self.node().name
    }

    fn moves(&self) -> impl Iterator<Item = GraphMove> + '_ {
        self.node().edges.clone().map(|e| GraphMove(e as u32))
    }
}

impl MatePosition for GraphPosition<'_> {
    type Move = GraphMove;

    fn side_to_move(&self) -> Color {
        self.node().turn
    }

    fn board_key(&self) -> u64 {
        self.node().board_key
    }

    fn board_key_after(&self, mv: GraphMove) -> u64 {
        self.graph.nodes[self.graph.edge(mv).to].board_key
    }

    fn hand_of(&self, color: Color) -> Hand {
        if color == self.graph.attacker { self.node().hand } else { Hand::EMPTY }
    }

    fn in_check(&self) -> bool {
        self.node().in_check
    }

    fn do_move(&mut self, mv: GraphMove) {
        let edge = self.graph.edge(mv);
        debug_assert_eq!(edge.from, self.current);
        self.stack.push(self.current);
        self.current = edge.to;
    }

    fn undo_move(&mut self, mv: GraphMove) {
        debug_assert_eq!(self.graph.edge(mv).to, self.current);
        if let Some(prev) = self.stack.pop() {
            self.current = prev;
        }
    }

    fn generate_checks(&self, out: &mut MoveList<GraphMove>) {
        out.extend(self.moves());
    }

    fn generate_evasions(&self, out: &mut MoveList<GraphMove>) {
        out.extend(self.moves());
    }

    fn mate_1ply(&mut self) -> Option<GraphMove> {
        let graph = self.graph;
        self.moves().find(|&mv| {
            let target = &graph.nodes[graph.edge(mv).to];
            target.turn != graph.attacker && target.in_check && target.edges.is_empty()
        })
    }

    fn after_hand(&self, mv: GraphMove, hand: Hand) -> Hand {
        self.graph.shift_hand(mv, hand, true)
    }

    fn before_hand(&self, mv: GraphMove, hand: Hand) -> Hand {
        self.graph.shift_hand(mv, hand, false)
    }

    fn initial_pn_dn(&self, mv: GraphMove) -> (PnDn, PnDn) {
        self.graph.edge(mv).estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBLEM: &str = r#"
root = "start"

[config]
nodes_limit = 500
max_depth = 9

[[nodes]]
name = "start"
turn = "black"
hand = { gold = 1, pawn = 2 }
moves = [{ to = "dropped", label = "G*5b" }, { to = "quiet", estimate = [3, 1] }]

[[nodes]]
name = "dropped"
turn = "white"
in_check = true
hand = { pawn = 2 }

[[nodes]]
name = "quiet"
turn = "white"
hand = { gold = 1, pawn = 2 }
"#;

    #[test]
    fn test_load_problem_from_toml() {
        let problem = Problem::from_toml_str(PROBLEM).unwrap();
        assert_eq!(problem.config.nodes_limit, 500);
        assert_eq!(problem.config.max_depth, 9);
        assert_eq!(problem.graph.num_nodes(), 3);
        assert_eq!(problem.graph.attacker(), Color::Black);

        let mut pos = problem.graph.position();
        assert_eq!(pos.name(), "start");
        assert_eq!(pos.hand_of(Color::Black).count(HandPiece::Pawn), 2);
        assert_eq!(pos.hand_of(Color::White), Hand::EMPTY);

        let mv = pos.mate_1ply().unwrap();
        assert_eq!(problem.graph.move_label(mv), "G*5b");
        let quiet = problem.graph.move_between("start", "quiet").unwrap();
        assert_eq!(problem.graph.move_label(quiet), "quiet");
        assert!(mv < quiet);
        assert_eq!(pos.initial_pn_dn(mv), (1, 1));
        assert_eq!(pos.initial_pn_dn(quiet), (3, 1));
    }

    #[test]
    fn test_do_undo_and_hand_shift() {
        let problem = Problem::from_toml_str(PROBLEM).unwrap();
        let mut pos = problem.graph.position();
        let mv = problem.graph.move_between("start", "dropped").unwrap();
        let gold = Hand::EMPTY.add(HandPiece::Gold);

        assert_eq!(pos.after_hand(mv, pos.hand_of(Color::Black)).count(HandPiece::Gold), 0);
        assert_eq!(pos.before_hand(mv, Hand::EMPTY), gold);
        assert_eq!(pos.board_key_after(mv), {
            let mut probe = pos.clone();
            probe.do_move(mv);
            probe.board_key()
        });

        pos.do_move(mv);
        assert_eq!(pos.name(), "dropped");
        assert!(pos.in_check());
        assert_eq!(pos.side_to_move(), Color::White);
        pos.undo_move(mv);
        assert_eq!(pos.name(), "start");
    }

    #[test]
    fn test_same_board_shares_board_key() {
        let graph = GraphBuilder::new("a")
            .node(NodeSpec::attacker("a").board("b1").hand(Hand::EMPTY.add(HandPiece::Pawn)))
            .node(NodeSpec::attacker("b").board("b1"))
            .node(NodeSpec::defender("c").board("b1"))
            .build()
            .unwrap();
        let keys: Vec<u64> = graph.nodes.iter().map(|n| n.board_key).collect();
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
    }

    #[test]
    fn test_rejects_broken_graphs() {
        let unknown = GraphBuilder::new("a").node(NodeSpec::attacker("a").to("nowhere")).build();
        assert!(matches!(unknown, Err(TsumeError::UnknownNode { .. })));

        let duplicate = GraphBuilder::new("a")
            .node(NodeSpec::attacker("a"))
            .node(NodeSpec::attacker("a"))
            .build();
        assert!(matches!(duplicate, Err(TsumeError::DuplicateNode(_))));

        let missing = GraphBuilder::new("z").node(NodeSpec::attacker("a")).build();
        assert!(matches!(missing, Err(TsumeError::MissingRoot(_))));

        let ambiguous = GraphBuilder::new("a")
            .node(NodeSpec::attacker("a").board("x"))
            .node(NodeSpec::attacker("b").board("x"))
            .build();
        assert!(matches!(ambiguous, Err(TsumeError::AmbiguousPosition { .. })));

        let pawn = Hand::EMPTY.add(HandPiece::Pawn);
        let hand_change = GraphBuilder::new("a")
            .node(NodeSpec::attacker("a").to("d"))
            .node(NodeSpec::defender("d").to("e"))
            .node(NodeSpec::attacker("e").hand(pawn))
            .build();
        assert!(matches!(hand_change, Err(TsumeError::HandChangedByDefender { .. })));

        assert!(matches!(Problem::from_toml_str("root = 1"), Err(TsumeError::Parse(_))));
    }
}
