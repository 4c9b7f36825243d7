//! ゲームセッション管理モジュール
//! プレイヤーの手番順序、ターン履歴、手の計算とタイムアウト、
//! 盤面へのターン適用とイベント配信を担当する。

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::board::GameBoard;
use super::types::{PlayerInitial, PlayerMove, PlayerTurn};
use crate::error::{BoardError, SessionError};
use crate::event::Event;
use crate::players::Player;

/// 手番開始イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnStartEvent {
    pub player: PlayerInitial,
    pub turn_index: usize,
}

/// 手が盤面に配置されたときのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnMoveEvent {
    pub player: PlayerInitial,
    pub player_move: PlayerMove,
    pub turn_index: usize,
}

/// 手番終了イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnEndEvent {
    pub player: PlayerInitial,
    pub turn_index: usize,
    /// このターンで獲得したボックス数
    pub captures_made: usize,
}

/// 手番エラーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnErrorKind {
    /// プレイヤーの計算がエラーを返した
    ComputeThrow,
    /// 盤面への配置が拒否された
    InvalidPlacement,
}

/// 手番エラーイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnErrorEvent {
    pub player: PlayerInitial,
    pub turn_index: usize,
    pub kind: TurnErrorKind,
    pub message: String,
}

/// プレイヤーが棄権したときのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerForfeitEvent {
    pub player: PlayerInitial,
    pub turn_index: usize,
}

/// プレイヤーが時間切れになったときのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTimeoutEvent {
    pub player: PlayerInitial,
    pub turn_index: usize,
}

/// セッションが所有するイベントチャネル
#[derive(Debug, Default)]
pub struct SessionEvents {
    pub turn_start: Event<TurnStartEvent>,
    pub turn_move: Event<TurnMoveEvent>,
    pub turn_end: Event<TurnEndEvent>,
    pub turn_error: Event<TurnErrorEvent>,
    pub player_forfeit: Event<PlayerForfeitEvent>,
    pub player_timeout: Event<PlayerTimeoutEvent>,
}

/// 1ゲーム分のセッション
/// 盤面を所有し、手番キューとターン履歴を管理する
pub struct GameSession {
    id: Uuid,
    board: GameBoard,
    /// イニシャル順（大文字小文字を区別しない）に並べた参加者
    players: Vec<Arc<dyn Player>>,
    /// 先頭が次に手を打つプレイヤー
    turn_order: VecDeque<Arc<dyn Player>>,
    player_turns: Vec<PlayerTurn>,
    turn_timeout: Option<Duration>,
    events: SessionEvents,
}

impl GameSession {
    /// 新しいセッションを作成する
    /// turn_timeout がゼロの場合はタイムアウトなしとして扱う
    pub fn new(
        board: GameBoard,
        players: Vec<Arc<dyn Player>>,
        turn_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let mut seen = HashSet::new();
        for player in &players {
            if !seen.insert(player.initial()) {
                return Err(SessionError::DuplicatePlayer {
                    player: player.initial(),
                });
            }
        }

        let turn_order: VecDeque<_> = players.iter().cloned().collect();

        let mut roster = players;
        roster.sort_by(|a, b| a.initial().cmp_ignore_case(&b.initial()));

        let turn_timeout = if turn_timeout.is_zero() {
            None
        } else {
            Some(turn_timeout)
        };

        Ok(Self {
            id: Uuid::new_v4(),
            board,
            players: roster,
            turn_order,
            player_turns: Vec::new(),
            turn_timeout,
            events: SessionEvents::default(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn board(&self) -> &GameBoard {
        &self.board
    }

    pub fn players(&self) -> &[Arc<dyn Player>] {
        &self.players
    }

    pub fn player(&self, initial: PlayerInitial) -> Option<&Arc<dyn Player>> {
        self.players.iter().find(|player| player.initial() == initial)
    }

    pub fn turn_order(&self) -> &VecDeque<Arc<dyn Player>> {
        &self.turn_order
    }

    pub fn next_player(&self) -> Option<&Arc<dyn Player>> {
        self.turn_order.front()
    }

    pub fn player_turns(&self) -> &[PlayerTurn] {
        &self.player_turns
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// 手番キュー先頭のプレイヤーに次の手を計算させる
    /// 時間切れ、エラー、棄権はそれぞれ対応するイベントを配信した上でエラーとして返す
    pub async fn compute_next_turn(&self) -> Result<PlayerTurn, SessionError> {
        let player = self
            .turn_order
            .front()
            .cloned()
            .ok_or(SessionError::NoNextPlayer)?;
        let initial = player.initial();
        let turn_index = self.player_turns.len();

        self.events.turn_start.dispatch(&TurnStartEvent {
            player: initial,
            turn_index,
        });

        let computation = player.compute_player_move(self, &self.board);
        let outcome = match self.turn_timeout {
            Some(limit) => match tokio::time::timeout(limit, computation).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(player = %initial, turn_index, "player timed out");

                    self.events.player_timeout.dispatch(&PlayerTimeoutEvent {
                        player: initial,
                        turn_index,
                    });

                    return Err(SessionError::PlayerTimedOut { player: initial });
                }
            },
            None => computation.await,
        };

        let player_move = match outcome {
            Ok(player_move) => player_move,
            Err(source) => {
                let error = SessionError::PlayerComputeThrow {
                    player: initial,
                    source,
                };

                self.events.turn_error.dispatch(&TurnErrorEvent {
                    player: initial,
                    turn_index,
                    kind: TurnErrorKind::ComputeThrow,
                    message: error.to_string(),
                });

                return Err(error);
            }
        };

        match player_move {
            Some(player_move) => Ok(PlayerTurn::from_move(player_move, initial, turn_index)),
            None => {
                self.events.player_forfeit.dispatch(&PlayerForfeitEvent {
                    player: initial,
                    turn_index,
                });

                Err(SessionError::PlayerForfeited { player: initial })
            }
        }
    }

    /// ターンを盤面に適用し、獲得したボックス数を返す
    /// 獲得がなければ手番のプレイヤーをキューの末尾へ回す
    pub fn apply_turn(&mut self, turn: PlayerTurn) -> Result<usize, SessionError> {
        if let Err(error) = self.board.place_line(turn) {
            if let BoardError::InvalidPlacement { .. } = &error {
                self.events.turn_error.dispatch(&TurnErrorEvent {
                    player: turn.player,
                    turn_index: turn.turn_index,
                    kind: TurnErrorKind::InvalidPlacement,
                    message: error.to_string(),
                });
            }

            return Err(error.into());
        }

        self.events.turn_move.dispatch(&TurnMoveEvent {
            player: turn.player,
            player_move: turn.player_move(),
            turn_index: turn.turn_index,
        });

        let captures_made = self.board.apply_captures()?;

        if captures_made == 0 {
            let position = self
                .turn_order
                .iter()
                .position(|player| player.initial() == turn.player);

            if let Some(player) = position.and_then(|index| self.turn_order.remove(index)) {
                self.turn_order.push_back(player);
            }
        }

        self.player_turns.push(turn);

        debug!(
            player = %turn.player,
            turn_index = turn.turn_index,
            captures_made,
            "turn applied"
        );

        self.events.turn_end.dispatch(&TurnEndEvent {
            player: turn.player,
            turn_index: turn.turn_index,
            captures_made,
        });

        Ok(captures_made)
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roster: Vec<PlayerInitial> = self.players.iter().map(|player| player.initial()).collect();
        let turn_order: Vec<PlayerInitial> =
            self.turn_order.iter().map(|player| player.initial()).collect();

        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("players", &roster)
            .field("turn_order", &turn_order)
            .field("turns", &self.player_turns.len())
            .field("turn_timeout", &self.turn_timeout)
            .finish()
    }
}
