//! ドット&ボックスの盤面状態を管理するモジュール
//! 拡張グリッドの保持、線の配置、ボックス獲得の判定と適用、走査を担当する。

use std::fmt;

use tracing::debug;

use super::slot::{BoardSlot, SlotKind};
use super::types::{is_legal_move, PlayerTurn};
use crate::error::BoardError;
use crate::event::Event;

/// 線が配置されたときのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePlacedEvent {
    pub old_slot: BoardSlot,
    pub new_slot: BoardSlot,
    pub turn: PlayerTurn,
}

/// ボックスが獲得されたときのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureAppliedEvent {
    pub old_slot: BoardSlot,
    pub new_slot: BoardSlot,
}

/// 盤面が所有するイベントチャネル
#[derive(Debug, Default)]
pub struct BoardEvents {
    pub line_placed: Event<LinePlacedEvent>,
    pub capture_applied: Event<CaptureAppliedEvent>,
}

/// ドット&ボックスの盤面を表現する構造体
/// columns x rows 個のドットから (2*columns-1) x (2*rows-1) のグリッドを作る
#[derive(Debug)]
pub struct GameBoard {
    columns: usize,
    rows: usize,
    grid: Vec<Vec<BoardSlot>>,
    boxes_claimed: usize,
    spacers_claimed: usize,
    events: BoardEvents,
}

impl GameBoard {
    /// 新しい盤面を作成する
    /// 列数・行数はどちらも1以上で、拡張グリッドの大きさがusizeに収まる必要がある
    pub fn new(columns: usize, rows: usize) -> Result<Self, BoardError> {
        let invalid = || BoardError::InvalidDimensions { columns, rows };

        let expand = |dots: usize| dots.checked_mul(2).and_then(|n| n.checked_sub(1));
        let (expanded_columns, expanded_rows) = match (expand(columns), expand(rows)) {
            (Some(expanded_columns), Some(expanded_rows)) => (expanded_columns, expanded_rows),
            _ => return Err(invalid()),
        };

        expanded_columns
            .checked_mul(expanded_rows)
            .and_then(|slots| slots.checked_mul(std::mem::size_of::<BoardSlot>()))
            .filter(|bytes| *bytes <= isize::MAX as usize)
            .ok_or_else(invalid)?;

        let grid = (0..expanded_rows)
            .map(|y| {
                (0..expanded_columns)
                    .map(|x| BoardSlot::unclaimed(x, y))
                    .collect()
            })
            .collect();

        Ok(Self {
            columns,
            rows,
            grid,
            boxes_claimed: 0,
            spacers_claimed: 0,
            events: BoardEvents::default(),
        })
    }

    /// 現在のグリッドと集計値を写した盤面を作る
    /// イベントの購読者は引き継がない
    pub fn snapshot(&self) -> Self {
        Self {
            columns: self.columns,
            rows: self.rows,
            grid: self.grid.clone(),
            boxes_claimed: self.boxes_claimed,
            spacers_claimed: self.spacers_claimed,
            events: BoardEvents::default(),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_padding(&self) -> usize {
        self.columns - 1
    }

    pub fn row_padding(&self) -> usize {
        self.rows - 1
    }

    pub fn expanded_columns(&self) -> usize {
        self.columns + self.column_padding()
    }

    pub fn expanded_rows(&self) -> usize {
        self.rows + self.row_padding()
    }

    pub fn horizontal_spacers(&self) -> usize {
        self.rows * self.column_padding()
    }

    pub fn vertical_spacers(&self) -> usize {
        self.columns * self.row_padding()
    }

    pub fn total_boxes(&self) -> usize {
        self.column_padding() * self.row_padding()
    }

    pub fn total_spacers(&self) -> usize {
        self.horizontal_spacers() + self.vertical_spacers()
    }

    pub fn boxes_claimed(&self) -> usize {
        self.boxes_claimed
    }

    pub fn spacers_claimed(&self) -> usize {
        self.spacers_claimed
    }

    pub fn remaining_boxes(&self) -> usize {
        self.total_boxes() - self.boxes_claimed
    }

    pub fn remaining_spacers(&self) -> usize {
        self.total_spacers() - self.spacers_claimed
    }

    pub fn events(&self) -> &BoardEvents {
        &self.events
    }

    /// グリッド全体を行優先で返す（grid[y][x]）
    pub fn grid(&self) -> &[Vec<BoardSlot>] {
        &self.grid
    }

    /// 指定座標のスロットを取得する
    /// 範囲外の場合はNoneを返す
    pub fn slot(&self, x: usize, y: usize) -> Option<&BoardSlot> {
        self.grid.get(y).and_then(|row| row.get(x))
    }

    fn box_like_slot(&self, x: usize, y: usize) -> Result<&BoardSlot, BoardError> {
        match self.slot(x, y) {
            Some(slot) if slot.kind.is_box_like() => Ok(slot),
            _ => Err(BoardError::InvalidQuery { x, y }),
        }
    }

    /// ボックスの上下左右4方向の隣接スロット
    /// ボックスは外周に存在しないため、範囲外にはならない
    fn adjacent_slots(&self, x: usize, y: usize) -> [&BoardSlot; 4] {
        [
            &self.grid[y - 1][x],
            &self.grid[y][x - 1],
            &self.grid[y][x + 1],
            &self.grid[y + 1][x],
        ]
    }

    /// ターンの座標に線を配置する
    /// 対象がスペーサーでない場合は InvalidPlacement を返す
    pub fn place_line(&mut self, turn: PlayerTurn) -> Result<(), BoardError> {
        let PlayerTurn { x, y, .. } = turn;

        // サンドボックス越しに届いた手もあるため、偶奇をここでも再検証する
        if !is_legal_move(x, y) {
            return Err(BoardError::InvalidPlacement {
                turn,
                reason: "coordinates must have opposite parities".to_string(),
            });
        }

        let old_slot = match self.slot(x, y) {
            Some(slot) => *slot,
            None => {
                return Err(BoardError::InvalidPlacement {
                    turn,
                    reason: "coordinates are outside of the board".to_string(),
                })
            }
        };

        if old_slot.kind != SlotKind::Spacer {
            return Err(BoardError::InvalidPlacement {
                turn,
                reason: format!("slot is a {} kind, not a spacer kind", old_slot.kind),
            });
        }

        let new_slot = BoardSlot::claimed(x, y, turn);
        self.grid[y][x] = new_slot;
        self.spacers_claimed += 1;

        debug!(player = %turn.player, turn_index = turn.turn_index, x, y, "line placed");

        self.events.line_placed.dispatch(&LinePlacedEvent {
            old_slot,
            new_slot,
            turn,
        });

        Ok(())
    }

    /// ボックスを囲む線の本数（0〜4）を数える
    pub fn count_surrounding_lines(&self, x: usize, y: usize) -> Result<u8, BoardError> {
        self.box_like_slot(x, y)?;

        let lines = self
            .adjacent_slots(x, y)
            .iter()
            .filter(|slot| slot.kind == SlotKind::Line)
            .count();

        Ok(lines as u8)
    }

    /// ボックスの所有者を決めるターンを返す
    /// 隣接する線のうち最も新しい（turn_indexが最大の）ターンが優先される
    pub fn determine_priority_owner(
        &self,
        x: usize,
        y: usize,
    ) -> Result<Option<PlayerTurn>, BoardError> {
        self.box_like_slot(x, y)?;

        let priority_turn = self
            .adjacent_slots(x, y)
            .iter()
            .filter(|slot| slot.kind == SlotKind::Line)
            .filter_map(|slot| slot.owner_turn)
            .max_by_key(|turn| turn.turn_index);

        Ok(priority_turn)
    }

    /// 4辺を囲まれた未獲得ボックスを全て獲得済みにする
    /// 今回の呼び出しで獲得されたボックス数を返す
    pub fn apply_captures(&mut self) -> Result<usize, BoardError> {
        let mut captures = Vec::new();

        // 獲得はLineの数に影響しないため、先に走査してから置き換える
        for slot in self.walk_boxes() {
            if slot.kind != SlotKind::Box {
                continue;
            }

            if self.count_surrounding_lines(slot.x, slot.y)? < 4 {
                continue;
            }

            if let Some(owner_turn) = self.determine_priority_owner(slot.x, slot.y)? {
                captures.push((*slot, owner_turn));
            }
        }

        for (old_slot, owner_turn) in &captures {
            let new_slot = BoardSlot::claimed(old_slot.x, old_slot.y, *owner_turn);
            self.grid[old_slot.y][old_slot.x] = new_slot;

            debug!(
                player = %owner_turn.player,
                x = old_slot.x,
                y = old_slot.y,
                "capture applied"
            );

            self.events.capture_applied.dispatch(&CaptureAppliedEvent {
                old_slot: *old_slot,
                new_slot,
            });
        }

        self.boxes_claimed += captures.len();

        Ok(captures.len())
    }

    /// 全てのボックス（獲得済みを含む）を行優先で走査する
    pub fn walk_boxes(&self) -> impl Iterator<Item = &BoardSlot> + '_ {
        self.walk_parity(1, 1)
    }

    /// 全てのドットを行優先で走査する
    pub fn walk_dots(&self) -> impl Iterator<Item = &BoardSlot> + '_ {
        self.walk_parity(0, 0)
    }

    /// 全てのスペーサー（線を含む）を走査する
    /// 水平スペーサーを行優先で全て返した後、垂直スペーサーを行優先で返す
    pub fn walk_spacers(&self) -> impl Iterator<Item = &BoardSlot> + '_ {
        self.walk_parity(1, 0).chain(self.walk_parity(0, 1))
    }

    fn walk_parity(&self, x_start: usize, y_start: usize) -> impl Iterator<Item = &BoardSlot> + '_ {
        self.grid
            .iter()
            .skip(y_start)
            .step_by(2)
            .flat_map(move |row| row.iter().skip(x_start).step_by(2))
    }
}

impl fmt::Display for GameBoard {
    /// 列・行の目盛り付きで盤面を描画する
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expanded_columns = self.expanded_columns() as i64;
        let mut buffer = String::new();

        // 10の位の目盛り
        for x in 0..=expanded_columns {
            let column_legend = (x - 1) % 10;

            if column_legend == 0 {
                buffer.push_str(&(x / 10).to_string());
            } else if x == 0 {
                buffer.push_str("   ");
            } else {
                buffer.push(' ');
            }
        }
        buffer.push('\n');

        // 1の位の目盛り
        buffer.push_str("   ");
        for x in 1..=expanded_columns {
            buffer.push_str(&((x - 1) % 10).to_string());
        }
        buffer.push('\n');

        let expanded_rows = self.expanded_rows();
        for (y, row) in self.grid.iter().enumerate() {
            let row_legend = y % 10;

            if row_legend == 0 {
                buffer.push_str(&format!("{}{} ", y / 10, row_legend));
            } else {
                buffer.push_str(&format!(" {} ", row_legend));
            }

            buffer.extend(row.iter().map(BoardSlot::display_char));

            if y + 1 < expanded_rows {
                buffer.push('\n');
            }
        }

        f.write_str(&buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerInitial;
    use std::sync::{Arc, Mutex};

    fn turn(player: char, turn_index: usize, x: usize, y: usize) -> PlayerTurn {
        PlayerTurn {
            player: PlayerInitial::new(player),
            turn_index,
            x,
            y,
        }
    }

    fn surround_first_box(board: &mut GameBoard) {
        board.place_line(turn('A', 0, 1, 0)).unwrap();
        board.place_line(turn('B', 1, 0, 1)).unwrap();
        board.place_line(turn('A', 2, 2, 1)).unwrap();
        board.place_line(turn('B', 3, 1, 2)).unwrap();
    }

    #[test]
    fn test_board_new_geometry() {
        let board = GameBoard::new(5, 3).unwrap();

        assert_eq!(board.columns(), 5);
        assert_eq!(board.rows(), 3);
        assert_eq!(board.column_padding(), 4);
        assert_eq!(board.row_padding(), 2);
        assert_eq!(board.expanded_columns(), 9);
        assert_eq!(board.expanded_rows(), 5);
        assert_eq!(board.horizontal_spacers(), 12);
        assert_eq!(board.vertical_spacers(), 10);
        assert_eq!(board.total_boxes(), 8);
        assert_eq!(board.total_spacers(), 22);
        assert_eq!(board.remaining_boxes(), 8);
        assert_eq!(board.remaining_spacers(), 22);
        assert_eq!(board.boxes_claimed(), 0);
        assert_eq!(board.spacers_claimed(), 0);
    }

    #[test]
    fn test_board_new_rejects_overflowing_dimensions() {
        assert!(matches!(
            GameBoard::new(usize::MAX, 3),
            Err(BoardError::InvalidDimensions { columns: usize::MAX, rows: 3 })
        ));
        assert!(matches!(
            GameBoard::new(3, usize::MAX / 2 + 1),
            Err(BoardError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            GameBoard::new(usize::MAX / 4, usize::MAX / 4),
            Err(BoardError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            GameBoard::new(0, 3),
            Err(BoardError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_board_new_grid_kinds() {
        let board = GameBoard::new(5, 3).unwrap();

        assert_eq!(board.grid().len(), 5);
        assert!(board.grid().iter().all(|row| row.len() == 9));
        assert_eq!(board.slot(0, 0).unwrap().kind, SlotKind::Dot);
        assert_eq!(board.slot(1, 0).unwrap().kind, SlotKind::Spacer);
        assert_eq!(board.slot(0, 1).unwrap().kind, SlotKind::Spacer);
        assert_eq!(board.slot(1, 1).unwrap().kind, SlotKind::Box);
        assert_eq!(board.slot(8, 4).unwrap().kind, SlotKind::Dot);
        assert!(board.slot(9, 0).is_none());
        assert!(board.grid().iter().flatten().all(|slot| slot.owner_turn.is_none()));
    }

    #[test]
    fn test_board_new_invalid_dimensions() {
        assert_eq!(
            GameBoard::new(0, 3).unwrap_err(),
            BoardError::InvalidDimensions { columns: 0, rows: 3 }
        );
        assert!(GameBoard::new(4, 0).is_err());
    }

    #[test]
    fn test_single_dot_board() {
        let board = GameBoard::new(1, 1).unwrap();

        assert_eq!(board.total_boxes(), 0);
        assert_eq!(board.total_spacers(), 0);
        assert_eq!(board.walk_dots().count(), 1);
        assert_eq!(board.walk_spacers().count(), 0);
    }

    #[test]
    fn test_place_line_success() {
        let mut board = GameBoard::new(5, 3).unwrap();
        let placed = turn('A', 0, 1, 0);

        board.place_line(placed).unwrap();

        let slot = board.slot(1, 0).unwrap();
        assert_eq!(slot.kind, SlotKind::Line);
        assert_eq!(slot.owner_turn, Some(placed));
        assert_eq!(board.spacers_claimed(), 1);
        assert_eq!(board.remaining_spacers(), 21);
    }

    #[test]
    fn test_place_line_on_line_fails() {
        let mut board = GameBoard::new(5, 3).unwrap();
        board.place_line(turn('A', 0, 1, 0)).unwrap();

        let result = board.place_line(turn('B', 1, 1, 0));
        assert!(matches!(result, Err(BoardError::InvalidPlacement { .. })));
        assert_eq!(board.spacers_claimed(), 1);
    }

    #[test]
    fn test_place_line_on_dot_box_or_outside_fails() {
        let mut board = GameBoard::new(5, 3).unwrap();

        for (x, y) in [(0, 0), (1, 1), (9, 0), (0, 11)] {
            let result = board.place_line(turn('A', 0, x, y));
            assert!(matches!(result, Err(BoardError::InvalidPlacement { .. })));
        }

        assert_eq!(board.spacers_claimed(), 0);
    }

    #[test]
    fn test_count_surrounding_lines() {
        let mut board = GameBoard::new(5, 3).unwrap();
        assert_eq!(board.count_surrounding_lines(1, 1).unwrap(), 0);

        board.place_line(turn('A', 0, 1, 0)).unwrap();
        board.place_line(turn('B', 1, 0, 1)).unwrap();
        assert_eq!(board.count_surrounding_lines(1, 1).unwrap(), 2);
        assert_eq!(board.count_surrounding_lines(3, 1).unwrap(), 0);
    }

    #[test]
    fn test_count_surrounding_lines_invalid_query() {
        let board = GameBoard::new(5, 3).unwrap();

        assert_eq!(
            board.count_surrounding_lines(1, 0),
            Err(BoardError::InvalidQuery { x: 1, y: 0 })
        );
        assert!(board.count_surrounding_lines(0, 0).is_err());
        assert!(board.determine_priority_owner(2, 1).is_err());
    }

    #[test]
    fn test_determine_priority_owner() {
        let mut board = GameBoard::new(5, 3).unwrap();
        assert_eq!(board.determine_priority_owner(1, 1).unwrap(), None);

        board.place_line(turn('B', 5, 1, 2)).unwrap();
        board.place_line(turn('A', 9, 0, 1)).unwrap();
        board.place_line(turn('B', 7, 2, 1)).unwrap();

        let owner = board.determine_priority_owner(1, 1).unwrap().unwrap();
        assert_eq!(owner.turn_index, 9);
        assert_eq!(owner.player, PlayerInitial::new('A'));
    }

    #[test]
    fn test_apply_captures() {
        let mut board = GameBoard::new(5, 3).unwrap();
        surround_first_box(&mut board);

        assert_eq!(board.apply_captures().unwrap(), 1);
        assert_eq!(board.boxes_claimed(), 1);
        assert_eq!(board.remaining_boxes(), 7);

        let slot = board.slot(1, 1).unwrap();
        assert_eq!(slot.kind, SlotKind::Initial);
        assert_eq!(slot.owner_turn.unwrap().player, PlayerInitial::new('B'));
        assert_eq!(slot.owner_turn.unwrap().turn_index, 3);
    }

    #[test]
    fn test_apply_captures_idempotent() {
        let mut board = GameBoard::new(5, 3).unwrap();
        surround_first_box(&mut board);

        assert_eq!(board.apply_captures().unwrap(), 1);
        assert_eq!(board.apply_captures().unwrap(), 0);
        assert_eq!(board.boxes_claimed(), 1);
    }

    #[test]
    fn test_apply_captures_double_box() {
        let mut board = GameBoard::new(3, 2).unwrap();

        let lines = [(1, 0), (3, 0), (0, 1), (4, 1), (1, 2), (3, 2)];
        for (index, (x, y)) in lines.into_iter().enumerate() {
            board.place_line(turn('A', index, x, y)).unwrap();
        }
        assert_eq!(board.apply_captures().unwrap(), 0);

        board.place_line(turn('B', 6, 2, 1)).unwrap();
        assert_eq!(board.apply_captures().unwrap(), 2);
        assert_eq!(board.remaining_boxes(), 0);
        assert!(board
            .walk_boxes()
            .all(|slot| slot.owner_turn.unwrap().player == PlayerInitial::new('B')));
    }

    #[test]
    fn test_events_dispatched() {
        let mut board = GameBoard::new(5, 3).unwrap();
        let placed = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::new(Mutex::new(Vec::new()));

        let placed_sink = Arc::clone(&placed);
        let _line = board.events().line_placed.subscribe(move |event: &LinePlacedEvent| {
            placed_sink.lock().unwrap().push(event.clone());
        });
        let captured_sink = Arc::clone(&captured);
        let _capture = board
            .events()
            .capture_applied
            .subscribe(move |event: &CaptureAppliedEvent| {
                captured_sink.lock().unwrap().push(event.clone());
            });

        surround_first_box(&mut board);
        board.apply_captures().unwrap();

        let placed = placed.lock().unwrap();
        assert_eq!(placed.len(), 4);
        assert_eq!(placed[0].old_slot.kind, SlotKind::Spacer);
        assert_eq!(placed[0].new_slot.kind, SlotKind::Line);
        assert_eq!(placed[3].turn.turn_index, 3);

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].old_slot.kind, SlotKind::Box);
        assert_eq!(captured[0].new_slot.kind, SlotKind::Initial);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut board = GameBoard::new(3, 3).unwrap();
        board.place_line(turn('A', 0, 1, 0)).unwrap();

        let mut copy = board.snapshot();
        copy.place_line(turn('B', 1, 0, 1)).unwrap();

        assert_eq!(board.spacers_claimed(), 1);
        assert_eq!(copy.spacers_claimed(), 2);
        assert_eq!(copy.slot(1, 0).unwrap().kind, SlotKind::Line);
        assert_eq!(board.slot(0, 1).unwrap().kind, SlotKind::Spacer);
    }

    #[test]
    fn test_walk_counts() {
        let board = GameBoard::new(5, 3).unwrap();

        assert_eq!(board.walk_boxes().count(), board.total_boxes());
        assert_eq!(board.walk_spacers().count(), board.remaining_spacers());
        assert_eq!(board.walk_dots().count(), 15);
        assert!(board.walk_boxes().all(|slot| slot.kind == SlotKind::Box));
        assert!(board.walk_dots().all(|slot| slot.kind == SlotKind::Dot));
        assert!(board.walk_spacers().all(|slot| slot.kind == SlotKind::Spacer));
    }

    #[test]
    fn test_walk_spacers_order() {
        let board = GameBoard::new(3, 2).unwrap();
        let coordinates: Vec<(usize, usize)> =
            board.walk_spacers().map(|slot| (slot.x, slot.y)).collect();

        assert_eq!(
            coordinates,
            vec![(1, 0), (3, 0), (1, 2), (3, 2), (0, 1), (2, 1), (4, 1)]
        );
    }

    #[test]
    fn test_walk_boxes_is_restartable() {
        let board = GameBoard::new(4, 3).unwrap();
        let first: Vec<_> = board.walk_boxes().map(|slot| (slot.x, slot.y)).collect();
        let second: Vec<_> = board.walk_boxes().map(|slot| (slot.x, slot.y)).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec![(1, 1), (3, 1), (5, 1), (1, 3), (3, 3), (5, 3)]);
    }

    #[test]
    fn test_board_display() {
        let mut board = GameBoard::new(5, 3).unwrap();
        surround_first_box(&mut board);
        board.apply_captures().unwrap();

        let expected = [
            "   0        ",
            "   012345678",
            "00 .-. . . .",
            " 1 |B|      ",
            " 2 .-. . . .",
            " 3          ",
            " 4 . . . . .",
        ]
        .join("\n");

        assert_eq!(board.to_string(), expected);
    }
}
