//! 問題ファイルの読み込みエラー

use std::path::PathBuf;

/// 問題ファイル・局面グラフのエラー
#[derive(thiserror::Error, Debug)]
pub enum TsumeError {
    /// ファイルを読めない
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML として解釈できない
    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    /// 存在しない局面への指し手
    #[error("Node '{from}' has a move to unknown node '{name}'")]
    UnknownNode { name: String, from: String },

    /// 同じ名前の局面が複数ある
    #[error("Node '{0}' is defined more than once")]
    DuplicateNode(String),

    /// root に指定した局面がない
    #[error("Root node '{0}' is not defined")]
    MissingRoot(String),

    /// 盤面・手番・持ち駒が同じ局面が複数ある
    #[error("Nodes '{first}' and '{second}' have the same board, turn and hand")]
    AmbiguousPosition { first: String, second: String },

    /// 受け方の指し手で攻め方の持ち駒が変わっている
    #[error("Defender move '{from}' -> '{to}' changes the attacker's hand")]
    HandChangedByDefender { from: String, to: String },
}

/// Result type for problem loading
pub type TsumeResult<T> = Result<T, TsumeError>;
