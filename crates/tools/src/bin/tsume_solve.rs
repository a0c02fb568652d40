//! 詰将棋ソルバ
//!
//! 局面グラフの問題ファイル（TOML）を読み込み、df-pn で詰みを探して詰み手順を出力する。
//!
//! 出力（USI の `checkmate` 応答と同じ形式）:
//! - 詰み: `checkmate <指し手> <指し手> ...`
//! - 不詰・千日手: `checkmate nomate`
//! - 局面数・時間の上限、Ctrl-C で打ち切り: `checkmate timeout`

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use rshogi_tsume::graph::Problem;
use rshogi_tsume::{DfPnSearcher, NodeState, SearchInfo};

#[derive(Parser, Debug)]
#[command(name = "tsume_solve")]
#[command(about = "局面グラフの詰将棋を df-pn で解く")]
struct Cli {
    /// 問題ファイル（TOML）
    problem: PathBuf,

    /// 探索局面数の上限（問題ファイルの設定より優先）
    #[arg(long)]
    nodes: Option<u64>,

    /// 探索深さの上限（問題ファイルの設定より優先）
    #[arg(long)]
    depth: Option<u32>,

    /// 探索時間の上限（ミリ秒）
    #[arg(long = "time-ms")]
    time_ms: Option<u64>,

    /// 置換表サイズ（MB）
    #[arg(long = "hash-mb")]
    hash_mb: Option<usize>,

    /// 結果を JSON で出力する
    #[arg(long)]
    json: bool,
}

/// JSON 出力
#[derive(Serialize)]
struct Report {
    result: &'static str,
    state: String,
    pn: u64,
    dn: u64,
    moves: Vec<String>,
    info: SearchInfo,
}

fn result_word(state: NodeState) -> &'static str {
    match state {
        NodeState::Proven => "mate",
        NodeState::Disproven | NodeState::Repetition => "nomate",
        NodeState::Unknown => "timeout",
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let problem = Problem::load(&cli.problem)
        .with_context(|| format!("failed to load problem {}", cli.problem.display()))?;

    let mut config = problem.config.clone();
    if let Some(nodes) = cli.nodes {
        config.nodes_limit = nodes;
    }
    if let Some(depth) = cli.depth {
        config.max_depth = depth;
    }
    if let Some(time_ms) = cli.time_ms {
        config.time_limit_ms = Some(time_ms);
    }
    if let Some(hash_mb) = cli.hash_mb {
        config.hash_mb = hash_mb;
    }
    log::info!(
        "problem {}: {} nodes, nodes_limit={}, time_limit={:?}ms, max_depth={}, hash={}MB",
        cli.problem.display(),
        problem.graph.num_nodes(),
        config.nodes_limit,
        config.time_limit_ms,
        config.max_depth,
        config.hash_mb
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nStopping search...");
            stop.store(true, Ordering::Relaxed);
        })
        .ok();
    }

    let mut searcher = DfPnSearcher::new(config);
    let mut pos = problem.graph.position();
    searcher.search(&mut pos, stop);
    let moves: Vec<String> = searcher
        .best_moves(&mut pos)
        .into_iter()
        .map(|mv| problem.graph.move_label(mv).to_string())
        .collect();

    let root = searcher.root_result().copied().context("search did not produce a result")?;
    let word = result_word(root.state);

    if cli.json {
        let report = Report {
            result: word,
            state: format!("{:?}", root.state),
            pn: root.pn,
            dn: root.dn,
            moves,
            info: searcher.info(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if root.state == NodeState::Proven {
        println!("checkmate {}", moves.join(" "));
    } else {
        println!("checkmate {word}");
    }
    Ok(())
}
