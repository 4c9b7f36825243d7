//! プレイヤーの抽象化層モジュール
//! 組み込みプレイヤーやスクリプトプレイヤーなど異なる実装を
//! 統一したインターフェースで提供し、プレイヤーの生成を行う。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, PlayerError};
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove};
use crate::worker::SandboxCapabilities;

use super::{DummyPlayer, ForfeitPlayer, RandomPlayer, ScriptPlayer};

/// プレイヤーの統一インターフェース
/// セッションからは `Arc<dyn Player>` として共有されるため、状態は内部可変性で持つ
#[async_trait]
pub trait Player: Send + Sync {
    /// プレイヤーを識別するイニシャル
    fn initial(&self) -> PlayerInitial;

    /// 乱数シード
    fn seed(&self) -> u64;

    /// ログ表示用の名前
    fn name(&self) -> &'static str;

    /// ゲーム開始前の初期化処理
    /// デフォルト実装では何もしない
    async fn initialize(&self, _session: &GameSession) -> Result<(), PlayerError> {
        Ok(())
    }

    /// 現在の盤面から次の手を計算する
    /// `None` を返した場合は棄権として扱われる
    async fn compute_player_move(
        &self,
        session: &GameSession,
        board: &GameBoard,
    ) -> Result<Option<PlayerMove>, PlayerError>;

    /// ゲーム終了後の後始末
    /// 何度呼び出しても安全である必要がある
    async fn destroy(&self) -> Result<(), PlayerError> {
        Ok(())
    }
}

/// 組み込みプレイヤーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPlayer {
    Random,
    Forfeit,
    Dummy,
}

impl BuiltinPlayer {
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinPlayer::Random => "random",
            BuiltinPlayer::Forfeit => "forfeit",
            BuiltinPlayer::Dummy => "dummy",
        }
    }
}

impl FromStr for BuiltinPlayer {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(BuiltinPlayer::Random),
            "forfeit" => Ok(BuiltinPlayer::Forfeit),
            "dummy" => Ok(BuiltinPlayer::Dummy),
            _ => Err(GameError::UnknownPlayer {
                spec: s.to_string(),
            }),
        }
    }
}

/// ゲームに参加させるプレイヤーの指定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerSpec {
    /// プレイヤースクリプトのパス
    Script(PathBuf),
    Builtin(BuiltinPlayer),
}

impl PlayerSpec {
    const BUILTIN_PREFIX: &'static str = "builtin:";
}

impl FromStr for PlayerSpec {
    type Err = GameError;

    /// `builtin:<name>` は組み込みプレイヤー、それ以外はスクリプトのパスとして解釈する
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(GameError::UnknownPlayer {
                spec: s.to_string(),
            });
        }

        match trimmed.strip_prefix(Self::BUILTIN_PREFIX) {
            Some(name) => Ok(PlayerSpec::Builtin(name.parse()?)),
            None => Ok(PlayerSpec::Script(PathBuf::from(trimmed))),
        }
    }
}

impl fmt::Display for PlayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSpec::Script(path) => write!(f, "{}", path.display()),
            PlayerSpec::Builtin(builtin) => write!(f, "{}{}", Self::BUILTIN_PREFIX, builtin.as_str()),
        }
    }
}

/// プレイヤーを生成するファクトリ
/// 指定に応じて適切なプレイヤー実装を選択して生成する
pub struct PlayerFactory;

impl PlayerFactory {
    pub fn create_player(
        spec: &PlayerSpec,
        initial: PlayerInitial,
        seed: u64,
        capabilities: &SandboxCapabilities,
    ) -> Arc<dyn Player> {
        match spec {
            PlayerSpec::Script(path) => Arc::new(ScriptPlayer::new(
                initial,
                seed,
                path.clone(),
                capabilities.clone(),
            )),
            PlayerSpec::Builtin(BuiltinPlayer::Random) => Arc::new(RandomPlayer::new(initial, seed)),
            PlayerSpec::Builtin(BuiltinPlayer::Forfeit) => Arc::new(ForfeitPlayer::new(initial, seed)),
            PlayerSpec::Builtin(BuiltinPlayer::Dummy) => Arc::new(DummyPlayer::new(initial, seed)),
        }
    }
}
