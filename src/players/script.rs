//! サンドボックス内でユーザースクリプトを実行するプレイヤー
//! 初期化時にスクリプトをバンドルして専用ワーカーを起動し、
//! セッションの手番開始・着手イベントをワーカーへ中継する。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{PlayerError, ScriptError};
use crate::event::Subscription;
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove, TurnMoveEvent, TurnStartEvent};
use crate::worker::{bundle_script, SandboxCapabilities, ScriptWorker, WorkerInit, WorkerRequest};

use super::player::Player;

struct ScriptPlayerState {
    worker: ScriptWorker,
    subscriptions: Vec<Subscription>,
}

pub struct ScriptPlayer {
    initial: PlayerInitial,
    seed: u64,
    script_path: PathBuf,
    capabilities: SandboxCapabilities,
    state: Mutex<Option<ScriptPlayerState>>,
}

impl ScriptPlayer {
    pub fn new(
        initial: PlayerInitial,
        seed: u64,
        script_path: PathBuf,
        capabilities: SandboxCapabilities,
    ) -> Self {
        Self {
            initial,
            seed,
            script_path,
            capabilities,
            state: Mutex::new(None),
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.is_some()
    }
}

/// セッションのイベントをワーカーへ中継する購読を作る
fn relay_session_events(session: &GameSession, worker: &ScriptWorker) -> Vec<Subscription> {
    let sender = worker.sender();
    let turn_start = session.events().turn_start.subscribe(move |event: &TurnStartEvent| {
        let _ = sender.send(WorkerRequest::TurnStart {
            player: event.player,
            turn_index: event.turn_index,
        });
    });

    let sender = worker.sender();
    let turn_move = session.events().turn_move.subscribe(move |event: &TurnMoveEvent| {
        let _ = sender.send(WorkerRequest::TurnMove {
            player: event.player,
            player_move: event.player_move,
            turn_index: event.turn_index,
        });
    });

    vec![turn_start, turn_move]
}

#[async_trait]
impl Player for ScriptPlayer {
    fn initial(&self) -> PlayerInitial {
        self.initial
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn name(&self) -> &'static str {
        "script_player"
    }

    async fn initialize(&self, session: &GameSession) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(ScriptError::AlreadyInitialized.into());
        }

        let bundle = bundle_script(&self.script_path)?;
        let init = WorkerInit::from_session(self.initial, self.seed, session);
        let worker = ScriptWorker::spawn(bundle, init, self.capabilities.clone()).await?;
        let subscriptions = relay_session_events(session, &worker);

        info!(
            player = %self.initial,
            script = %self.script_path.display(),
            "script player initialized"
        );

        *state = Some(ScriptPlayerState {
            worker,
            subscriptions,
        });

        Ok(())
    }

    async fn compute_player_move(
        &self,
        _session: &GameSession,
        _board: &GameBoard,
    ) -> Result<Option<PlayerMove>, PlayerError> {
        let state = self.state.lock().await;
        let state = state.as_ref().ok_or(ScriptError::Uninitialized)?;

        Ok(state.worker.compute_player_move().await?)
    }

    /// 初期化していない、または破棄済みの場合は何もしない
    async fn destroy(&self) -> Result<(), PlayerError> {
        let Some(state) = self.state.lock().await.take() else {
            return Ok(());
        };

        for subscription in state.subscriptions {
            subscription.unsubscribe();
        }

        state.worker.shutdown().await?;
        debug!(player = %self.initial, "script player destroyed");

        Ok(())
    }
}
