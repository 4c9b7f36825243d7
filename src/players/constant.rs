use async_trait::async_trait;

use crate::error::PlayerError;
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove};

use super::player::Player;

/// 常に同じ座標を返すプレイヤー
/// 座標の合法性は検証しないため、不正な配置のテストにも使える
#[derive(Debug, Clone)]
pub struct ConstantPlayer {
    initial: PlayerInitial,
    seed: u64,
    x: usize,
    y: usize,
}

impl ConstantPlayer {
    pub fn new(initial: PlayerInitial, seed: u64, x: usize, y: usize) -> Self {
        Self { initial, seed, x, y }
    }
}

#[async_trait]
impl Player for ConstantPlayer {
    fn initial(&self) -> PlayerInitial {
        self.initial
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn name(&self) -> &'static str {
        "constant_player"
    }

    async fn compute_player_move(
        &self,
        _session: &GameSession,
        _board: &GameBoard,
    ) -> Result<Option<PlayerMove>, PlayerError> {
        Ok(Some(PlayerMove {
            x: self.x,
            y: self.y,
        }))
    }
}
