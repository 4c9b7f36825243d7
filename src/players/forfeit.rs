use async_trait::async_trait;

use crate::error::PlayerError;
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove};

use super::player::Player;

/// 最初の手番で必ず棄権するプレイヤー
#[derive(Debug, Clone)]
pub struct ForfeitPlayer {
    initial: PlayerInitial,
    seed: u64,
}

impl ForfeitPlayer {
    pub fn new(initial: PlayerInitial, seed: u64) -> Self {
        Self { initial, seed }
    }
}

#[async_trait]
impl Player for ForfeitPlayer {
    fn initial(&self) -> PlayerInitial {
        self.initial
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn name(&self) -> &'static str {
        "forfeit_player"
    }

    async fn compute_player_move(
        &self,
        _session: &GameSession,
        _board: &GameBoard,
    ) -> Result<Option<PlayerMove>, PlayerError> {
        Ok(None)
    }
}
