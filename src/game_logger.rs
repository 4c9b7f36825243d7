//! ゲームの進行を構造化ログとして出力するモジュール
//! 盤面とセッションの全イベントを購読し、tracingのイベントに変換する。
//! プレイヤーごとの計算時間も集計し、セッション終了時に要約を出力する。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::OutputKind;
use crate::event::Subscription;
use crate::game::{
    CaptureAppliedEvent, GameBoard, GameResult, GameSession, LinePlacedEvent, PlayerForfeitEvent,
    PlayerInitial, PlayerTimeoutEvent, TurnEndEvent, TurnErrorEvent, TurnMoveEvent,
    TurnStartEvent,
};
use crate::game_loop::GameEndReason;

/// プレイヤーごとの計算時間の集計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerComputeStats {
    pub player: PlayerInitial,
    pub turns: usize,
    pub total_ms: u64,
    pub average_ms: u64,
}

#[derive(Debug, Default)]
struct LoggerState {
    turn_started_at: Option<Instant>,
    durations: BTreeMap<char, (PlayerInitial, Vec<Duration>)>,
}

impl LoggerState {
    fn record(&mut self, player: PlayerInitial) -> Option<Duration> {
        let elapsed = self.turn_started_at.take()?.elapsed();
        self.durations
            .entry(player.as_char())
            .or_insert_with(|| (player, Vec::new()))
            .1
            .push(elapsed);
        Some(elapsed)
    }
}

type SharedState = Arc<Mutex<LoggerState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, LoggerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// セッションに接続されたロガー
pub struct GameLogger {
    session_id: Uuid,
    output_kind: OutputKind,
    state: SharedState,
    subscriptions: Vec<Subscription>,
}

impl GameLogger {
    /// セッションと盤面のイベントを購読する
    pub fn attach(session: &GameSession, output_kind: OutputKind) -> Self {
        let session_id = session.id();
        let state = SharedState::default();
        let board_events = session.board().events();
        let session_events = session.events();

        let mut subscriptions = Vec::new();

        subscriptions.push(board_events.line_placed.subscribe(move |event: &LinePlacedEvent| {
            info!(
                target: "game",
                %session_id,
                player = %event.turn.player,
                turn_index = event.turn.turn_index,
                x = event.new_slot.x,
                y = event.new_slot.y,
                "placed line"
            );
        }));

        subscriptions.push(board_events.capture_applied.subscribe(
            move |event: &CaptureAppliedEvent| {
                let Some(owner) = event.new_slot.owner_turn else {
                    return;
                };

                info!(
                    target: "game",
                    %session_id,
                    player = %owner.player,
                    x = event.new_slot.x,
                    y = event.new_slot.y,
                    "applied capture"
                );
            },
        ));

        let turn_state = Arc::clone(&state);
        subscriptions.push(session_events.turn_start.subscribe(move |event: &TurnStartEvent| {
            lock(&turn_state).turn_started_at = Some(Instant::now());

            info!(
                target: "game",
                %session_id,
                player = %event.player,
                turn_index = event.turn_index,
                "turn start"
            );
        }));

        let move_state = Arc::clone(&state);
        subscriptions.push(session_events.turn_move.subscribe(move |event: &TurnMoveEvent| {
            let compute_ms = lock(&move_state)
                .record(event.player)
                .map(|elapsed| elapsed.as_millis() as u64);

            info!(
                target: "game",
                %session_id,
                player = %event.player,
                turn_index = event.turn_index,
                x = event.player_move.x,
                y = event.player_move.y,
                compute_ms,
                "turn move"
            );
        }));

        subscriptions.push(session_events.turn_end.subscribe(move |event: &TurnEndEvent| {
            info!(
                target: "game",
                %session_id,
                player = %event.player,
                turn_index = event.turn_index,
                captures_made = event.captures_made,
                "turn end"
            );
        }));

        subscriptions.push(session_events.turn_error.subscribe(move |event: &TurnErrorEvent| {
            error!(
                target: "game",
                %session_id,
                player = %event.player,
                turn_index = event.turn_index,
                kind = ?event.kind,
                message = %event.message,
                "turn error"
            );
        }));

        subscriptions.push(session_events.player_forfeit.subscribe(
            move |event: &PlayerForfeitEvent| {
                warn!(
                    target: "game",
                    %session_id,
                    player = %event.player,
                    turn_index = event.turn_index,
                    "player forfeit"
                );
            },
        ));

        subscriptions.push(session_events.player_timeout.subscribe(
            move |event: &PlayerTimeoutEvent| {
                warn!(
                    target: "game",
                    %session_id,
                    player = %event.player,
                    turn_index = event.turn_index,
                    "player timeout"
                );
            },
        ));

        Self {
            session_id,
            output_kind,
            state,
            subscriptions,
        }
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn start_session(&self, session: &GameSession, seed: u64) {
        let players: Vec<String> = session
            .players()
            .iter()
            .map(|player| format!("{}:{}", player.initial(), player.name()))
            .collect();

        info!(
            target: "game",
            session_id = %self.session_id,
            columns = session.board().columns(),
            rows = session.board().rows(),
            seed,
            players = ?players,
            "session start"
        );
    }

    /// 人が読む形式の場合のみ盤面を出力する
    pub fn log_board(&self, board: &GameBoard) {
        if self.output_kind == OutputKind::Human {
            info!(target: "game", "\n{}\n", board);
        }
    }

    /// プレイヤーごとの計算時間の集計を返す
    pub fn compute_stats(&self) -> Vec<PlayerComputeStats> {
        lock(&self.state)
            .durations
            .values()
            .map(|(player, durations)| {
                let total: Duration = durations.iter().sum();
                let turns = durations.len();
                let average = if turns == 0 {
                    Duration::ZERO
                } else {
                    total / turns as u32
                };

                PlayerComputeStats {
                    player: *player,
                    turns,
                    total_ms: total.as_millis() as u64,
                    average_ms: average.as_millis() as u64,
                }
            })
            .collect()
    }

    pub fn end_session(&self, result: &GameResult, end_reason: &GameEndReason, turns_played: usize) {
        for stats in self.compute_stats() {
            info!(
                target: "game",
                session_id = %self.session_id,
                player = %stats.player,
                turns = stats.turns,
                average_compute_ms = stats.average_ms,
                "player compute summary"
            );
        }

        let scores: Vec<String> = result
            .scores
            .iter()
            .map(|(player, score)| format!("{player}={score}"))
            .collect();
        let winners: Vec<String> = result
            .winning_players
            .iter()
            .map(ToString::to_string)
            .collect();

        info!(
            target: "game",
            session_id = %self.session_id,
            end_reason = %end_reason,
            turns_played,
            scores = ?scores,
            winners = ?winners,
            highest_score = result.highest_score,
            win_kind = ?result.win_kind,
            "session end"
        );
    }

    /// 全ての購読を解除する
    pub fn detach(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerTurn;
    use crate::players::{ConstantPlayer, Player};

    #[test]
    fn test_logger_records_compute_durations() {
        let players: Vec<Arc<dyn Player>> = vec![
            Arc::new(ConstantPlayer::new(PlayerInitial::new('A'), 0, 1, 0)),
            Arc::new(ConstantPlayer::new(PlayerInitial::new('B'), 0, 0, 1)),
        ];
        let mut session =
            GameSession::new(GameBoard::new(3, 3).unwrap(), players, Duration::ZERO).unwrap();
        let logger = GameLogger::attach(&session, OutputKind::Json);

        for (turn_index, (player, x, y)) in [('A', 1, 0), ('B', 0, 1)].into_iter().enumerate() {
            session.events().turn_start.dispatch(&TurnStartEvent {
                player: PlayerInitial::new(player),
                turn_index,
            });
            session
                .apply_turn(PlayerTurn {
                    player: PlayerInitial::new(player),
                    turn_index,
                    x,
                    y,
                })
                .unwrap();
        }

        let stats = logger.compute_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].player, PlayerInitial::new('A'));
        assert_eq!(stats[0].turns, 1);
        assert_eq!(stats[1].player, PlayerInitial::new('B'));

        logger.detach();
        assert_eq!(session.events().turn_move.subscriber_count(), 0);
        assert_eq!(session.board().events().line_placed.subscriber_count(), 0);
    }
}
