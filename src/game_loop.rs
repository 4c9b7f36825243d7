//! ゲームループの実行モジュール
//! プレイヤーの生成と並行初期化、手番の計算と適用の繰り返し、
//! 終了理由の判定、結果の集計、プレイヤーの破棄までを1ゲーム分まとめて行う。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, OutputKind};
use crate::error::{GameError, Result, SessionError};
use crate::game::{GameBoard, GameResult, GameSession, PlayerInitial};
use crate::game_logger::GameLogger;
use crate::players::{Player, PlayerFactory, PlayerSpec};
use crate::worker::SandboxCapabilities;

/// 1ゲーム分の実行オプション
#[derive(Debug, Clone)]
pub struct GameLoopOptions {
    pub columns: usize,
    pub rows: usize,
    /// 引数順に `A`, `B`, ... のイニシャルが割り当てられる
    pub players: Vec<PlayerSpec>,
    pub seed: u64,
    /// 0でタイムアウトなし
    pub turn_timeout: Duration,
    pub capabilities: SandboxCapabilities,
    pub output_kind: OutputKind,
}

impl GameLoopOptions {
    /// 設定値とプレイヤー指定からオプションを作る
    pub fn from_config(config: &Config, players: Vec<PlayerSpec>) -> Self {
        Self {
            columns: config.game.columns,
            rows: config.game.rows,
            players,
            seed: config.game.resolve_seed(),
            turn_timeout: config.game.turn_timeout,
            capabilities: SandboxCapabilities::from(&config.sandbox),
            output_kind: config.logging.output_kind,
        }
    }
}

/// ゲームが終了した理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEndReason {
    /// 全てのボックスが獲得された
    Completed,
    Forfeit { player: PlayerInitial },
    Timeout { player: PlayerInitial },
    ComputeError { player: PlayerInitial, message: String },
    InvalidPlacement { player: PlayerInitial, message: String },
}

impl GameEndReason {
    /// 手番エラーから終了理由を判定する
    /// ゲームの終了として扱えないエラーはNoneを返す
    pub fn from_turn_error(error: &SessionError) -> Option<Self> {
        if !error.is_terminal_turn_error() {
            return None;
        }

        let player = error.offending_player()?;

        match error {
            SessionError::PlayerForfeited { .. } => Some(Self::Forfeit { player }),
            SessionError::PlayerTimedOut { .. } => Some(Self::Timeout { player }),
            SessionError::PlayerComputeThrow { .. } => Some(Self::ComputeError {
                player,
                message: error.to_string(),
            }),
            SessionError::InvalidPlacement(_) => Some(Self::InvalidPlacement {
                player,
                message: error.to_string(),
            }),
            _ => None,
        }
    }

    pub fn offending_player(&self) -> Option<PlayerInitial> {
        match self {
            Self::Completed => None,
            Self::Forfeit { player }
            | Self::Timeout { player }
            | Self::ComputeError { player, .. }
            | Self::InvalidPlacement { player, .. } => Some(*player),
        }
    }
}

impl fmt::Display for GameEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Forfeit { player } => write!(f, "player '{player}' forfeited"),
            Self::Timeout { player } => write!(f, "player '{player}' timed out"),
            Self::ComputeError { player, message } => {
                write!(f, "player '{player}' failed to compute: {message}")
            }
            Self::InvalidPlacement { player, message } => {
                write!(f, "player '{player}' made an invalid placement: {message}")
            }
        }
    }
}

/// 1ゲームの実行結果
#[derive(Debug, Clone, Serialize)]
pub struct GameOutcome {
    pub session_id: Uuid,
    pub result: GameResult,
    pub end_reason: GameEndReason,
    pub turns_played: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 最終盤面の描画
    pub final_board: String,
}

/// プレイヤー指定からプレイヤーを生成する
pub fn create_players(
    specs: &[PlayerSpec],
    seed: u64,
    capabilities: &SandboxCapabilities,
) -> Result<Vec<Arc<dyn Player>>> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let initial = PlayerInitial::from_index(index).ok_or_else(|| GameError::UnknownPlayer {
                spec: format!("{spec} (too many players)"),
            })?;

            Ok(PlayerFactory::create_player(spec, initial, seed, capabilities))
        })
        .collect()
}

/// 全プレイヤーを破棄する
/// 失敗しても残りのプレイヤーの破棄は続け、最初のエラーを返す
async fn destroy_players(players: &[Arc<dyn Player>]) -> Result<()> {
    let mut first_error = None;

    for player in players {
        if let Err(source) = player.destroy().await {
            warn!(player = %player.initial(), error = %source, "failed to destroy player");

            first_error.get_or_insert(GameError::PlayerDestroy {
                player: player.initial(),
                source,
            });
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// 生成済みのプレイヤーで1ゲームを実行する
pub async fn run_game(
    board: GameBoard,
    players: Vec<Arc<dyn Player>>,
    turn_timeout: Duration,
    seed: u64,
    output_kind: OutputKind,
) -> Result<GameOutcome> {
    let started_at = Utc::now();
    let mut session = GameSession::new(board, players.clone(), turn_timeout)?;
    let logger = GameLogger::attach(&session, output_kind);

    let initialized = try_join_all(players.iter().map(|player| {
        let session = &session;
        async move {
            player
                .initialize(session)
                .await
                .map_err(|source| GameError::PlayerInitialization {
                    player: player.initial(),
                    source,
                })
        }
    }))
    .await;

    if let Err(error) = initialized {
        // 初期化済みのプレイヤーだけでも後始末しておく
        if let Err(destroy_error) = destroy_players(&players).await {
            warn!(error = %destroy_error, "cleanup after initialization failure failed");
        }
        logger.detach();
        return Err(error);
    }

    logger.start_session(&session, seed);

    let end_reason = loop {
        if session.board().remaining_boxes() == 0 {
            break GameEndReason::Completed;
        }

        let applied = match session.compute_next_turn().await {
            Ok(turn) => session.apply_turn(turn),
            Err(error) => Err(error),
        };

        match applied {
            Ok(_) => logger.log_board(session.board()),
            Err(error) => match GameEndReason::from_turn_error(&error) {
                Some(reason) => break reason,
                None => {
                    if let Err(destroy_error) = destroy_players(&players).await {
                        warn!(error = %destroy_error, "cleanup after session failure failed");
                    }
                    logger.detach();
                    return Err(error.into());
                }
            },
        }
    };

    let result = GameResult::from_game(&session);
    let turns_played = session.player_turns().len();
    logger.end_session(&result, &end_reason, turns_played);

    let destroyed = destroy_players(&players).await;
    logger.detach();
    destroyed?;

    info!(session_id = %session.id(), end_reason = %end_reason, "game finished");

    Ok(GameOutcome {
        session_id: session.id(),
        result,
        end_reason,
        turns_played,
        started_at,
        finished_at: Utc::now(),
        final_board: session.board().to_string(),
    })
}

/// オプションに従って盤面とプレイヤーを用意し、1ゲームを実行する
pub async fn run_game_loop(options: GameLoopOptions) -> Result<GameOutcome> {
    let board = GameBoard::new(options.columns, options.rows)?;
    let players = create_players(&options.players, options.seed, &options.capabilities)?;

    run_game(
        board,
        players,
        options.turn_timeout,
        options.seed,
        options.output_kind,
    )
    .await
}
