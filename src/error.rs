//! アプリケーション全体のエラー定義モジュール
//! 盤面、セッション、プレイヤー、スクリプトサンドボックスのエラーを統一管理。

use thiserror::Error;

use crate::config::ConfigError;
use crate::game::{PlayerInitial, PlayerTurn};

/// 盤面操作に関連するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Invalid placement at ({}, {}) by player '{}': {reason}", .turn.x, .turn.y, .turn.player)]
    InvalidPlacement { turn: PlayerTurn, reason: String },

    #[error("Invalid query at ({x}, {y}): slot is not a box or initial kind")]
    InvalidQuery { x: usize, y: usize },

    #[error("Invalid board dimensions: {columns} columns x {rows} rows (both must be at least 1)")]
    InvalidDimensions { columns: usize, rows: usize },
}

/// 着手候補の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("Illegal move ({x}, {y}): coordinates must be non-negative with opposite parities")]
    IllegalMove { x: i64, y: i64 },
}

/// プレイヤーの手の計算に関連するエラー
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Not implemented: {message}")]
    NotImplemented { message: String },

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// ゲームセッションの進行に関連するエラー
/// いずれもゲームループを終了させる
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No next player: the turn order queue is empty")]
    NoNextPlayer,

    #[error("Player '{player}' threw an error during compute: {source}")]
    PlayerComputeThrow {
        player: PlayerInitial,
        #[source]
        source: PlayerError,
    },

    #[error("Player '{player}' forfeited the game")]
    PlayerForfeited { player: PlayerInitial },

    #[error("Player '{player}' timed out during compute")]
    PlayerTimedOut { player: PlayerInitial },

    #[error("Duplicate player initial '{player}' in session roster")]
    DuplicatePlayer { player: PlayerInitial },

    #[error(transparent)]
    InvalidPlacement(#[from] BoardError),
}

impl SessionError {
    /// ゲームループが正常終了として扱うべきエラーかどうか
    /// それ以外の種類は想定外の不具合として呼び出し元へ伝播させる
    pub fn is_terminal_turn_error(&self) -> bool {
        matches!(
            self,
            SessionError::PlayerComputeThrow { .. }
                | SessionError::PlayerForfeited { .. }
                | SessionError::PlayerTimedOut { .. }
                | SessionError::InvalidPlacement(BoardError::InvalidPlacement { .. })
        )
    }

    /// エラーの原因となったプレイヤーを返す
    pub fn offending_player(&self) -> Option<PlayerInitial> {
        match self {
            SessionError::PlayerComputeThrow { player, .. }
            | SessionError::PlayerForfeited { player }
            | SessionError::PlayerTimedOut { player }
            | SessionError::DuplicatePlayer { player } => Some(*player),
            SessionError::InvalidPlacement(BoardError::InvalidPlacement { turn, .. }) => {
                Some(turn.player)
            }
            _ => None,
        }
    }
}

/// スクリプトサンドボックスに関連するエラー
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script runner was already initialized")]
    AlreadyInitialized,

    #[error("Script runner was not initialized")]
    Uninitialized,

    #[error("Failed to bundle player script {path}: {reason}")]
    Bundle { path: String, reason: String },

    #[error("Failed to read player script {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Script compile error: {message}")]
    Compile { message: String },

    #[error("Script runtime error: {message}")]
    Runtime { message: String },

    #[error("Script exceeded its execution timeout of {limit_ms}ms")]
    ExecutionTimeout { limit_ms: u64 },

    #[error("Script exceeded its operation limit")]
    OperationLimit,

    #[error("Script returned an invalid move value of type '{type_name}'")]
    InvalidReturn { type_name: String },

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error("Failed to spawn script worker: {message}")]
    Spawn { message: String },

    #[error("Script worker rejected a game update: {message}")]
    Mirror { message: String },

    #[error("Script worker disconnected")]
    WorkerDisconnected,

    #[error("Script worker panicked")]
    WorkerPanicked,
}

/// ゲームの実行全体に関連するエラー
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Board error: {source}")]
    Board {
        #[from]
        source: BoardError,
    },

    #[error("Session error: {source}")]
    Session {
        #[from]
        source: SessionError,
    },

    #[error("Player '{player}' failed to initialize: {source}")]
    PlayerInitialization {
        player: PlayerInitial,
        #[source]
        source: PlayerError,
    },

    #[error("Player '{player}' failed to shut down: {source}")]
    PlayerDestroy {
        player: PlayerInitial,
        #[source]
        source: PlayerError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Unknown player specification: {spec}")]
    UnknownPlayer { spec: String },
}

/// ゲームエラーをベースとした結果型
pub type Result<T> = std::result::Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn turn() -> PlayerTurn {
        PlayerTurn {
            player: PlayerInitial::new('A'),
            turn_index: 0,
            x: 1,
            y: 1,
        }
    }

    #[test]
    fn test_terminal_turn_errors() {
        let player = PlayerInitial::new('A');

        assert!(SessionError::PlayerForfeited { player }.is_terminal_turn_error());
        assert!(SessionError::PlayerTimedOut { player }.is_terminal_turn_error());
        assert!(SessionError::InvalidPlacement(BoardError::InvalidPlacement {
            turn: turn(),
            reason: "not a spacer".to_string(),
        })
        .is_terminal_turn_error());

        assert!(!SessionError::NoNextPlayer.is_terminal_turn_error());
        assert!(!SessionError::InvalidPlacement(BoardError::InvalidQuery { x: 0, y: 0 })
            .is_terminal_turn_error());
    }

    #[test]
    fn test_offending_player() {
        let error = SessionError::InvalidPlacement(BoardError::InvalidPlacement {
            turn: turn(),
            reason: "not a spacer".to_string(),
        });
        assert_eq!(error.offending_player(), Some(PlayerInitial::new('A')));
        assert_eq!(SessionError::NoNextPlayer.offending_player(), None);
    }

    #[test]
    fn test_error_messages() {
        let error = SessionError::PlayerTimedOut {
            player: PlayerInitial::new('B'),
        };
        assert_eq!(error.to_string(), "Player 'B' timed out during compute");

        let error = MoveError::IllegalMove { x: 1, y: 1 };
        assert!(error.to_string().contains("(1, 1)"));
    }
}
