//! スクリプトに公開する `Engine` 名前空間
//! 盤面・スロット・手の型をインタプリタに登録し、合法性判定やスロット分類、
//! シミュレーション用の作業盤面を提供する純粋な関数群をまとめる。

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, Module, INT};

use crate::game::{
    classify_claimed, classify_unclaimed, is_horizontal_spacer, is_legal_move,
    is_vertical_spacer, BoardSlot, GameBoard, GameSession, PlayerInitial, PlayerMove, PlayerTurn,
    SlotKind,
};

pub type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// スクリプトの整数を座標に変換する
pub fn to_index(value: INT, name: &str) -> RhaiResult<usize> {
    usize::try_from(value).map_err(|_| format!("{name} must be non-negative, got {value}").into())
}

/// スクリプトの文字列をプレイヤーのイニシャルに変換する
pub fn to_initial(value: &str) -> RhaiResult<PlayerInitial> {
    let mut chars = value.chars();

    match (chars.next(), chars.next()) {
        (Some(initial), None) => Ok(PlayerInitial::new(initial)),
        _ => Err(format!("player initial must be a single character, got '{value}'").into()),
    }
}

/// スクリプトから見える盤面
/// 実際のゲームを映した盤面は読み取り専用、作業盤面は書き込み可能
#[derive(Debug, Clone)]
pub enum BoardHandle {
    Live(Rc<RefCell<GameSession>>),
    Scratch(Rc<RefCell<GameBoard>>),
}

enum BoardRef<'a> {
    Live(Ref<'a, GameSession>),
    Scratch(Ref<'a, GameBoard>),
}

impl BoardHandle {
    pub fn scratch(board: GameBoard) -> Self {
        BoardHandle::Scratch(Rc::new(RefCell::new(board)))
    }

    fn borrow(&self) -> BoardRef<'_> {
        match self {
            BoardHandle::Live(session) => BoardRef::Live(session.borrow()),
            BoardHandle::Scratch(board) => BoardRef::Scratch(board.borrow()),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&GameBoard) -> R) -> R {
        match self.borrow() {
            BoardRef::Live(session) => f(session.board()),
            BoardRef::Scratch(board) => f(&board),
        }
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut GameBoard) -> R) -> RhaiResult<R> {
        match self {
            BoardHandle::Live(_) => Err("the live game board is read-only, use to_scratch() first".into()),
            BoardHandle::Scratch(board) => Ok(f(&mut board.borrow_mut())),
        }
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self, BoardHandle::Scratch(_))
    }
}

fn count(value: usize) -> INT {
    value as INT
}

fn slots_to_array<'a>(slots: impl Iterator<Item = &'a BoardSlot>) -> Array {
    slots.map(|slot| Dynamic::from(*slot)).collect()
}

fn register_board_type(engine: &mut Engine) {
    engine.register_type_with_name::<BoardHandle>("GameBoard");

    engine.register_get("columns", |board: &mut BoardHandle| board.read(|b| count(b.columns())));
    engine.register_get("rows", |board: &mut BoardHandle| board.read(|b| count(b.rows())));
    engine.register_get("expanded_columns", |board: &mut BoardHandle| {
        board.read(|b| count(b.expanded_columns()))
    });
    engine.register_get("expanded_rows", |board: &mut BoardHandle| {
        board.read(|b| count(b.expanded_rows()))
    });
    engine.register_get("total_boxes", |board: &mut BoardHandle| board.read(|b| count(b.total_boxes())));
    engine.register_get("total_spacers", |board: &mut BoardHandle| {
        board.read(|b| count(b.total_spacers()))
    });
    engine.register_get("boxes_claimed", |board: &mut BoardHandle| {
        board.read(|b| count(b.boxes_claimed()))
    });
    engine.register_get("spacers_claimed", |board: &mut BoardHandle| {
        board.read(|b| count(b.spacers_claimed()))
    });
    engine.register_get("remaining_boxes", |board: &mut BoardHandle| {
        board.read(|b| count(b.remaining_boxes()))
    });
    engine.register_get("remaining_spacers", |board: &mut BoardHandle| {
        board.read(|b| count(b.remaining_spacers()))
    });
    engine.register_get("is_scratch", |board: &mut BoardHandle| board.is_scratch());

    // 範囲外や負の座標は () を返す
    engine.register_fn("slot", |board: &mut BoardHandle, x: INT, y: INT| -> Dynamic {
        match (usize::try_from(x), usize::try_from(y)) {
            (Ok(x), Ok(y)) => board
                .read(|b| b.slot(x, y).copied())
                .map_or(Dynamic::UNIT, Dynamic::from),
            _ => Dynamic::UNIT,
        }
    });

    engine.register_fn("walk_boxes", |board: &mut BoardHandle| {
        board.read(|b| slots_to_array(b.walk_boxes()))
    });
    engine.register_fn("walk_dots", |board: &mut BoardHandle| {
        board.read(|b| slots_to_array(b.walk_dots()))
    });
    engine.register_fn("walk_spacers", |board: &mut BoardHandle| {
        board.read(|b| slots_to_array(b.walk_spacers()))
    });

    engine.register_fn(
        "count_surrounding_lines",
        |board: &mut BoardHandle, x: INT, y: INT| -> RhaiResult<INT> {
            let (x, y) = (to_index(x, "x")?, to_index(y, "y")?);
            board
                .read(|b| b.count_surrounding_lines(x, y))
                .map(INT::from)
                .map_err(|error| error.to_string().into())
        },
    );

    engine.register_fn(
        "determine_priority_owner",
        |board: &mut BoardHandle, x: INT, y: INT| -> RhaiResult<Dynamic> {
            let (x, y) = (to_index(x, "x")?, to_index(y, "y")?);
            board
                .read(|b| b.determine_priority_owner(x, y))
                .map(|owner| owner.map_or(Dynamic::UNIT, Dynamic::from))
                .map_err(|error| error.to_string().into())
        },
    );

    engine.register_fn("to_scratch", |board: &mut BoardHandle| {
        BoardHandle::scratch(board.read(GameBoard::snapshot))
    });

    engine.register_fn(
        "place_line",
        |board: &mut BoardHandle, player: &str, turn_index: INT, x: INT, y: INT| -> RhaiResult<()> {
            let turn = PlayerTurn {
                player: to_initial(player)?,
                turn_index: to_index(turn_index, "turn_index")?,
                x: to_index(x, "x")?,
                y: to_index(y, "y")?,
            };

            board
                .write(|b| b.place_line(turn))?
                .map_err(|error| error.to_string().into())
        },
    );

    engine.register_fn("apply_captures", |board: &mut BoardHandle| -> RhaiResult<INT> {
        board
            .write(|b| b.apply_captures())?
            .map(count)
            .map_err(|error| error.to_string().into())
    });

    engine.register_fn("to_string", |board: &mut BoardHandle| board.read(|b| b.to_string()));
}

fn register_slot_type(engine: &mut Engine) {
    engine.register_type_with_name::<BoardSlot>("BoardSlot");

    engine.register_get("x", |slot: &mut BoardSlot| count(slot.x));
    engine.register_get("y", |slot: &mut BoardSlot| count(slot.y));
    engine.register_get("kind", |slot: &mut BoardSlot| slot.kind.as_str().to_string());
    engine.register_get("owner", |slot: &mut BoardSlot| {
        slot.owner_turn
            .map_or(Dynamic::UNIT, |turn| Dynamic::from(turn.player.to_string()))
    });
    engine.register_get("owner_turn_index", |slot: &mut BoardSlot| {
        slot.owner_turn
            .map_or(Dynamic::UNIT, |turn| Dynamic::from(count(turn.turn_index)))
    });
    engine.register_get("is_horizontal_spacer", |slot: &mut BoardSlot| slot.is_horizontal_spacer());
    engine.register_get("is_vertical_spacer", |slot: &mut BoardSlot| slot.is_vertical_spacer());
    engine.register_fn("to_string", |slot: &mut BoardSlot| {
        format!("BoardSlot({}, {}, {})", slot.x, slot.y, slot.kind)
    });
}

fn register_move_types(engine: &mut Engine) {
    engine.register_type_with_name::<PlayerMove>("PlayerMove");
    engine.register_get("x", |player_move: &mut PlayerMove| count(player_move.x));
    engine.register_get("y", |player_move: &mut PlayerMove| count(player_move.y));
    engine.register_fn("to_string", |player_move: &mut PlayerMove| {
        format!("PlayerMove({}, {})", player_move.x, player_move.y)
    });

    engine.register_type_with_name::<PlayerTurn>("PlayerTurn");
    engine.register_get("player", |turn: &mut PlayerTurn| turn.player.to_string());
    engine.register_get("turn_index", |turn: &mut PlayerTurn| count(turn.turn_index));
    engine.register_get("x", |turn: &mut PlayerTurn| count(turn.x));
    engine.register_get("y", |turn: &mut PlayerTurn| count(turn.y));
    engine.register_fn("to_string", |turn: &mut PlayerTurn| {
        format!("PlayerTurn({}, {}, {}, {})", turn.player, turn.turn_index, turn.x, turn.y)
    });
}

/// 盤面関連の型と `Engine` 名前空間をインタプリタに登録する
pub fn register(engine: &mut Engine, max_board_dimension: usize) {
    register_board_type(engine);
    register_slot_type(engine);
    register_move_types(engine);

    engine.register_static_module("Engine", engine_module(max_board_dimension).into());
}

fn engine_module(max_board_dimension: usize) -> Module {
    let mut module = Module::new();

    for kind in [
        SlotKind::Dot,
        SlotKind::Box,
        SlotKind::Initial,
        SlotKind::Spacer,
        SlotKind::Line,
    ] {
        module.set_var(
            format!("SLOT_{}", kind.as_str().to_uppercase()),
            kind.as_str().to_string(),
        );
    }

    module.set_native_fn("is_legal_move", |x: INT, y: INT| -> RhaiResult<bool> {
        match (usize::try_from(x), usize::try_from(y)) {
            (Ok(x), Ok(y)) => Ok(is_legal_move(x, y)),
            _ => Ok(false),
        }
    });

    module.set_native_fn("make_player_move", |x: INT, y: INT| -> RhaiResult<PlayerMove> {
        PlayerMove::from_signed(x, y).map_err(|error| error.to_string().into())
    });

    module.set_native_fn("classify_unclaimed", |x: INT, y: INT| -> RhaiResult<String> {
        Ok(classify_unclaimed(to_index(x, "x")?, to_index(y, "y")?).as_str().to_string())
    });

    module.set_native_fn("classify_claimed", |x: INT, y: INT| -> RhaiResult<String> {
        Ok(classify_claimed(to_index(x, "x")?, to_index(y, "y")?).as_str().to_string())
    });

    module.set_native_fn("is_horizontal_spacer", |x: INT, y: INT| -> RhaiResult<bool> {
        Ok(is_horizontal_spacer(to_index(x, "x")?, to_index(y, "y")?))
    });

    module.set_native_fn("is_vertical_spacer", |x: INT, y: INT| -> RhaiResult<bool> {
        Ok(is_vertical_spacer(to_index(x, "x")?, to_index(y, "y")?))
    });

    // 盤面の確保は1回のネイティブ呼び出しで終わり、演算回数や期限の検査を経ない
    module.set_native_fn("make_board", move |columns: INT, rows: INT| -> RhaiResult<BoardHandle> {
        let columns = to_index(columns, "columns")?;
        let rows = to_index(rows, "rows")?;
        if columns > max_board_dimension || rows > max_board_dimension {
            return Err(format!(
                "board of {columns}x{rows} dots exceeds the limit of {max_board_dimension} per side"
            )
            .into());
        }

        let board = GameBoard::new(columns, rows)
            .map_err(|error| -> Box<EvalAltResult> { error.to_string().into() })?;

        Ok(BoardHandle::scratch(board))
    });

    module
}
