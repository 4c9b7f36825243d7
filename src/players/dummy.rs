use async_trait::async_trait;

use crate::error::PlayerError;
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove};

use super::player::Player;

/// 手の計算を実装していないプレイヤー
/// ワーカー内のミラーセッションで参加者の枠として使う
#[derive(Debug, Clone)]
pub struct DummyPlayer {
    initial: PlayerInitial,
    seed: u64,
}

impl DummyPlayer {
    pub fn new(initial: PlayerInitial, seed: u64) -> Self {
        Self { initial, seed }
    }
}

#[async_trait]
impl Player for DummyPlayer {
    fn initial(&self) -> PlayerInitial {
        self.initial
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn name(&self) -> &'static str {
        "dummy_player"
    }

    async fn compute_player_move(
        &self,
        _session: &GameSession,
        _board: &GameBoard,
    ) -> Result<Option<PlayerMove>, PlayerError> {
        Err(PlayerError::NotImplemented {
            message: format!("dummy player '{}' cannot compute moves", self.initial),
        })
    }
}
