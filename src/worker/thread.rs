//! スクリプトプレイヤー専用のワーカースレッド
//! リクエストは非同期チャネルで送り、応答はワンショットチャネルで受け取る。
//! インタプリタはスレッド内で生成され、外へ出ることはない。

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::bundle::ScriptBundle;
use super::runtime::ScriptRuntime;
use super::sandbox::SandboxCapabilities;
use crate::error::ScriptError;
use crate::game::{GameSession, PlayerInitial, PlayerMove};

/// ワーカー内のミラーを作るための初期化情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInit {
    pub player: PlayerInitial,
    pub seed: u64,
    pub columns: usize,
    pub rows: usize,
    /// 初期化時点の手番順
    pub turn_order: Vec<PlayerInitial>,
    pub turn_timeout: Duration,
}

impl WorkerInit {
    pub fn from_session(player: PlayerInitial, seed: u64, session: &GameSession) -> Self {
        Self {
            player,
            seed,
            columns: session.board().columns(),
            rows: session.board().rows(),
            turn_order: session
                .turn_order()
                .iter()
                .map(|player| player.initial())
                .collect(),
            turn_timeout: session.turn_timeout().unwrap_or(Duration::ZERO),
        }
    }
}

pub type ComputeReply = oneshot::Sender<Result<Option<PlayerMove>, ScriptError>>;

/// ワーカースレッドへのリクエスト
#[derive(Debug)]
pub enum WorkerRequest {
    ComputePlayerMove { reply: ComputeReply },
    TurnStart {
        player: PlayerInitial,
        turn_index: usize,
    },
    TurnMove {
        player: PlayerInitial,
        player_move: PlayerMove,
        turn_index: usize,
    },
    Shutdown,
}

/// ワーカースレッドへの送信口
/// イベントの中継用に複製して使う
pub type WorkerSender = mpsc::UnboundedSender<WorkerRequest>;

/// 1つのスクリプトプレイヤーを実行するワーカー
#[derive(Debug)]
pub struct ScriptWorker {
    player: PlayerInitial,
    requests: WorkerSender,
    thread: Option<JoinHandle<()>>,
}

impl ScriptWorker {
    /// ワーカースレッドを起動し、スクリプトの初期化完了を待つ
    /// 初期化に失敗した場合はスレッドを回収してからエラーを返す
    pub async fn spawn(
        bundle: ScriptBundle,
        init: WorkerInit,
        capabilities: SandboxCapabilities,
    ) -> Result<Self, ScriptError> {
        let player = init.player;
        let (requests, receiver) = mpsc::unbounded_channel();
        let (ready, initialized) = oneshot::channel();

        let thread = thread::Builder::new()
            .name(format!("script-player-{}", player))
            .spawn(move || run_worker(bundle, init, capabilities, receiver, ready))
            .map_err(|error| ScriptError::Spawn {
                message: error.to_string(),
            })?;

        let mut worker = Self {
            player,
            requests,
            thread: Some(thread),
        };

        match initialized.await {
            Ok(Ok(())) => {
                debug!(player = %player, "script worker ready");
                Ok(worker)
            }
            Ok(Err(error)) => {
                worker.join().await?;
                Err(error)
            }
            Err(_) => {
                worker.join().await?;
                Err(ScriptError::WorkerPanicked)
            }
        }
    }

    pub fn player(&self) -> PlayerInitial {
        self.player
    }

    pub fn sender(&self) -> WorkerSender {
        self.requests.clone()
    }

    /// スクリプトに次の手を計算させる
    pub async fn compute_player_move(&self) -> Result<Option<PlayerMove>, ScriptError> {
        let (reply, response) = oneshot::channel();

        self.requests
            .send(WorkerRequest::ComputePlayerMove { reply })
            .map_err(|_| ScriptError::WorkerDisconnected)?;

        response.await.map_err(|_| ScriptError::WorkerDisconnected)?
    }

    /// ワーカーを停止し、スレッドの終了を待つ
    /// 計算中の場合はその計算が終わるまで待つ
    pub async fn shutdown(mut self) -> Result<(), ScriptError> {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        self.join().await
    }

    async fn join(&mut self) -> Result<(), ScriptError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|_| ScriptError::WorkerPanicked)?
            .map_err(|_| ScriptError::WorkerPanicked)?;

        debug!(player = %self.player, "script worker stopped");
        Ok(())
    }
}

impl Drop for ScriptWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.requests.send(WorkerRequest::Shutdown);
        }
    }
}

fn run_worker(
    bundle: ScriptBundle,
    init: WorkerInit,
    capabilities: SandboxCapabilities,
    mut receiver: mpsc::UnboundedReceiver<WorkerRequest>,
    ready: oneshot::Sender<Result<(), ScriptError>>,
) {
    let mut runtime = match ScriptRuntime::new(&bundle, &init, &capabilities) {
        Ok(runtime) => {
            let _ = ready.send(Ok(()));
            runtime
        }
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };

    while let Some(request) = receiver.blocking_recv() {
        match request {
            WorkerRequest::ComputePlayerMove { reply } => {
                let result = runtime.compute_player_move();

                if let Err(error) = &result {
                    debug!(player = %init.player, error = %error, "script compute failed");
                }

                // 呼び出し側が時間切れで諦めていれば受信側は既に破棄されている
                if reply.send(result).is_err() {
                    warn!(player = %init.player, "discarding script result after caller gave up");
                }
            }
            WorkerRequest::TurnStart { turn_index, .. } => runtime.on_turn_start(turn_index),
            WorkerRequest::TurnMove {
                player,
                player_move,
                turn_index,
            } => runtime.on_turn_move(player, player_move, turn_index),
            WorkerRequest::Shutdown => break,
        }
    }
}
