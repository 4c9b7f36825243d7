//! ランダムに線を引くプレイヤー
//! シード付きの乱数生成器を使うため、同じシードなら同じ手順になる。

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::PlayerError;
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove, SlotKind};

use super::player::Player;

#[derive(Debug)]
pub struct RandomPlayer {
    initial: PlayerInitial,
    seed: u64,
    rng: Mutex<ChaCha8Rng>,
}

impl RandomPlayer {
    pub fn new(initial: PlayerInitial, seed: u64) -> Self {
        Self {
            initial,
            seed,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl Player for RandomPlayer {
    fn initial(&self) -> PlayerInitial {
        self.initial
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn name(&self) -> &'static str {
        "random_player"
    }

    /// 空いているスペーサーから一様に1つ選ぶ
    /// 空きがなければ棄権する
    async fn compute_player_move(
        &self,
        _session: &GameSession,
        board: &GameBoard,
    ) -> Result<Option<PlayerMove>, PlayerError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let chosen = board
            .walk_spacers()
            .filter(|slot| slot.kind == SlotKind::Spacer)
            .choose(&mut *rng);

        Ok(chosen.map(|slot| PlayerMove {
            x: slot.x,
            y: slot.y,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{is_legal_move, PlayerTurn};
    use std::time::Duration;

    fn empty_session() -> GameSession {
        GameSession::new(GameBoard::new(2, 2).unwrap(), Vec::new(), Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn test_random_player_picks_open_spacer() {
        let session = empty_session();
        let board = GameBoard::new(4, 3).unwrap();
        let player = RandomPlayer::new(PlayerInitial::new('A'), 42);

        for _ in 0..20 {
            let player_move = player
                .compute_player_move(&session, &board)
                .await
                .unwrap()
                .unwrap();

            assert!(is_legal_move(player_move.x, player_move.y));
            assert_eq!(
                board.slot(player_move.x, player_move.y).unwrap().kind,
                SlotKind::Spacer
            );
        }
    }

    #[tokio::test]
    async fn test_random_player_same_seed_same_moves() {
        let session = empty_session();
        let board = GameBoard::new(5, 5).unwrap();
        let first = RandomPlayer::new(PlayerInitial::new('A'), 1234);
        let second = RandomPlayer::new(PlayerInitial::new('B'), 1234);

        for _ in 0..10 {
            let a = first.compute_player_move(&session, &board).await.unwrap();
            let b = second.compute_player_move(&session, &board).await.unwrap();
            assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn test_random_player_forfeits_on_full_board() {
        let session = empty_session();
        let mut board = GameBoard::new(2, 2).unwrap();
        let spacers: Vec<(usize, usize)> = board.walk_spacers().map(|slot| (slot.x, slot.y)).collect();

        for (turn_index, (x, y)) in spacers.into_iter().enumerate() {
            board
                .place_line(PlayerTurn {
                    player: PlayerInitial::new('A'),
                    turn_index,
                    x,
                    y,
                })
                .unwrap();
        }

        let player = RandomPlayer::new(PlayerInitial::new('A'), 0);
        let result = player.compute_player_move(&session, &board).await.unwrap();
        assert_eq!(result, None);
    }
}
