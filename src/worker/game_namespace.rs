//! スクリプトに公開する `Game` 名前空間
//! ワーカー内に保持するゲームのミラー（セッションと盤面）を読み取り専用で公開する。
//! ミラーはホスト側から中継された手番開始・着手イベントでのみ更新される。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use rhai::{Array, Dynamic, Engine, Module, INT};

use super::engine_namespace::{BoardHandle, RhaiResult};
use super::thread::WorkerInit;
use crate::error::{ScriptError, SessionError};
use crate::game::{GameBoard, GameSession, PlayerInitial, PlayerMove, PlayerTurn};
use crate::players::{DummyPlayer, Player};

/// ワーカー内のゲームのミラー
#[derive(Debug, Clone)]
pub struct GameMirror {
    session: Rc<RefCell<GameSession>>,
    player: PlayerInitial,
    turn_index: Rc<Cell<usize>>,
}

impl GameMirror {
    /// 初期化情報からミラーのセッションを作る
    /// 参加者は計算を行わないダミーで埋める
    pub fn new(init: &WorkerInit) -> Result<Self, ScriptError> {
        let board = GameBoard::new(init.columns, init.rows).map_err(|error| ScriptError::Mirror {
            message: error.to_string(),
        })?;

        let players: Vec<Arc<dyn Player>> = init
            .turn_order
            .iter()
            .map(|initial| Arc::new(DummyPlayer::new(*initial, init.seed)) as Arc<dyn Player>)
            .collect();

        let session = GameSession::new(board, players, init.turn_timeout).map_err(|error| {
            ScriptError::Mirror {
                message: error.to_string(),
            }
        })?;

        Ok(Self {
            session: Rc::new(RefCell::new(session)),
            player: init.player,
            turn_index: Rc::new(Cell::new(0)),
        })
    }

    pub fn player(&self) -> PlayerInitial {
        self.player
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index.get()
    }

    pub fn session(&self) -> &Rc<RefCell<GameSession>> {
        &self.session
    }

    pub fn start_turn(&self, turn_index: usize) {
        self.turn_index.set(turn_index);
    }

    /// 中継された着手をミラーに適用する
    pub fn apply_move(
        &self,
        player: PlayerInitial,
        player_move: PlayerMove,
        turn_index: usize,
    ) -> Result<usize, SessionError> {
        let turn = PlayerTurn::from_move(player_move, player, turn_index);
        self.session.borrow_mut().apply_turn(turn)
    }
}

/// スクリプトから見えるセッション
#[derive(Debug, Clone)]
pub struct SessionHandle(Rc<RefCell<GameSession>>);

fn initials_to_array<'a>(players: impl Iterator<Item = &'a Arc<dyn Player>>) -> Array {
    players
        .map(|player| Dynamic::from(player.initial().to_string()))
        .collect()
}

fn register_session_type(engine: &mut Engine) {
    engine.register_type_with_name::<SessionHandle>("GameSession");

    engine.register_get("players", |handle: &mut SessionHandle| {
        initials_to_array(handle.0.borrow().players().iter())
    });
    engine.register_get("turn_order", |handle: &mut SessionHandle| {
        initials_to_array(handle.0.borrow().turn_order().iter())
    });
    engine.register_get("turn_count", |handle: &mut SessionHandle| {
        handle.0.borrow().player_turns().len() as INT
    });
    engine.register_get("turns", |handle: &mut SessionHandle| {
        handle
            .0
            .borrow()
            .player_turns()
            .iter()
            .map(|turn| Dynamic::from(*turn))
            .collect::<Array>()
    });
    engine.register_get("next_player", |handle: &mut SessionHandle| {
        handle
            .0
            .borrow()
            .next_player()
            .map_or(Dynamic::UNIT, |player| Dynamic::from(player.initial().to_string()))
    });
}

/// `Game` 名前空間をインタプリタに登録する
pub fn register(engine: &mut Engine, mirror: &GameMirror) {
    register_session_type(engine);

    let mut module = Module::new();

    let session = Rc::clone(&mirror.session);
    module.set_native_fn("board", move || -> RhaiResult<BoardHandle> {
        Ok(BoardHandle::Live(Rc::clone(&session)))
    });

    let session = Rc::clone(&mirror.session);
    module.set_native_fn("session", move || -> RhaiResult<SessionHandle> {
        Ok(SessionHandle(Rc::clone(&session)))
    });

    let player = mirror.player;
    module.set_native_fn("player", move || -> RhaiResult<String> { Ok(player.to_string()) });

    let turn_index = Rc::clone(&mirror.turn_index);
    module.set_native_fn("turn_index", move || -> RhaiResult<INT> {
        Ok(turn_index.get() as INT)
    });

    engine.register_static_module("Game", module.into());
}
