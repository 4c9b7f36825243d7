//! 盤面スロットの分類モジュール
//! 拡張グリッド上の座標の偶奇からスロットの種類（ドット、ボックス、スペーサーなど）を決定する。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::PlayerTurn;

/// 盤面の各スロットの種類を表現するenum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// グリッドの角。所有されることはない
    Dot,
    /// まだ獲得されていない1x1のマス
    Box,
    /// 獲得済みのボックス（所有者のイニシャルを表示する）
    Initial,
    /// 線がまだ引かれていない辺
    Spacer,
    /// 線が引かれた辺
    Line,
}

impl SlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Dot => "dot",
            SlotKind::Box => "box",
            SlotKind::Initial => "initial",
            SlotKind::Spacer => "spacer",
            SlotKind::Line => "line",
        }
    }

    /// ボックスまたは獲得済みボックスかどうか
    pub fn is_box_like(self) -> bool {
        matches!(self, SlotKind::Box | SlotKind::Initial)
    }

    /// スペーサーまたは線かどうか
    pub fn is_spacer_like(self) -> bool {
        matches!(self, SlotKind::Spacer | SlotKind::Line)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 所有者がいない状態のスロット種別を座標から決定する
pub fn classify_unclaimed(x: usize, y: usize) -> SlotKind {
    match (x % 2, y % 2) {
        (0, 0) => SlotKind::Dot,
        (1, 1) => SlotKind::Box,
        _ => SlotKind::Spacer,
    }
}

/// 所有者がいる状態のスロット種別を座標から決定する
pub fn classify_claimed(x: usize, y: usize) -> SlotKind {
    match (x % 2, y % 2) {
        (0, 0) => SlotKind::Dot,
        (1, 1) => SlotKind::Initial,
        _ => SlotKind::Line,
    }
}

pub fn is_horizontal_spacer(x: usize, y: usize) -> bool {
    x % 2 == 1 && y % 2 == 0
}

pub fn is_vertical_spacer(x: usize, y: usize) -> bool {
    x % 2 == 0 && y % 2 == 1
}

/// 盤面上の1スロット
/// 値として扱うが、位置によって識別される。書き換えはボードが置き換えで行う
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSlot {
    pub x: usize,
    pub y: usize,
    pub kind: SlotKind,
    pub owner_turn: Option<PlayerTurn>,
}

impl BoardSlot {
    /// 所有者なしのスロットを作成する
    pub fn unclaimed(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            kind: classify_unclaimed(x, y),
            owner_turn: None,
        }
    }

    /// 所有者付きのスロットを作成する
    /// ドットは所有できないため、ドット座標では所有者が破棄される
    pub fn claimed(x: usize, y: usize, owner_turn: PlayerTurn) -> Self {
        let kind = classify_claimed(x, y);
        let owner_turn = if kind == SlotKind::Dot {
            None
        } else {
            Some(owner_turn)
        };

        Self {
            x,
            y,
            kind,
            owner_turn,
        }
    }

    pub fn is_horizontal_spacer(&self) -> bool {
        is_horizontal_spacer(self.x, self.y)
    }

    pub fn is_vertical_spacer(&self) -> bool {
        is_vertical_spacer(self.x, self.y)
    }

    /// 盤面描画で使う1文字
    pub fn display_char(&self) -> char {
        match self.kind {
            SlotKind::Dot => '.',
            SlotKind::Box | SlotKind::Spacer => ' ',
            SlotKind::Initial => self
                .owner_turn
                .map(|turn| turn.player.as_char())
                .unwrap_or(' '),
            SlotKind::Line => {
                if self.is_horizontal_spacer() {
                    '-'
                } else {
                    '|'
                }
            }
        }
    }
}

impl fmt::Display for BoardSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerInitial;

    fn turn(x: usize, y: usize) -> PlayerTurn {
        PlayerTurn {
            player: PlayerInitial::new('A'),
            turn_index: 0,
            x,
            y,
        }
    }

    #[test]
    fn test_classify_unclaimed() {
        assert_eq!(classify_unclaimed(0, 0), SlotKind::Dot);
        assert_eq!(classify_unclaimed(1, 1), SlotKind::Box);
        assert_eq!(classify_unclaimed(1, 0), SlotKind::Spacer);
        assert_eq!(classify_unclaimed(0, 1), SlotKind::Spacer);
        assert_eq!(classify_unclaimed(4, 2), SlotKind::Dot);
    }

    #[test]
    fn test_classify_claimed() {
        assert_eq!(classify_claimed(0, 0), SlotKind::Dot);
        assert_eq!(classify_claimed(3, 1), SlotKind::Initial);
        assert_eq!(classify_claimed(3, 0), SlotKind::Line);
        assert_eq!(classify_claimed(2, 3), SlotKind::Line);
    }

    #[test]
    fn test_spacer_orientation() {
        assert!(is_horizontal_spacer(1, 0));
        assert!(!is_horizontal_spacer(0, 1));
        assert!(is_vertical_spacer(0, 1));
        assert!(!is_vertical_spacer(1, 0));
        assert!(!is_horizontal_spacer(1, 1));
        assert!(!is_vertical_spacer(0, 0));
    }

    #[test]
    fn test_claimed_dot_has_no_owner() {
        let slot = BoardSlot::claimed(2, 2, turn(2, 2));
        assert_eq!(slot.kind, SlotKind::Dot);
        assert!(slot.owner_turn.is_none());
    }

    #[test]
    fn test_display_char() {
        assert_eq!(BoardSlot::unclaimed(0, 0).display_char(), '.');
        assert_eq!(BoardSlot::unclaimed(1, 1).display_char(), ' ');
        assert_eq!(BoardSlot::unclaimed(1, 0).display_char(), ' ');
        assert_eq!(BoardSlot::claimed(1, 0, turn(1, 0)).display_char(), '-');
        assert_eq!(BoardSlot::claimed(0, 1, turn(0, 1)).display_char(), '|');
        assert_eq!(BoardSlot::claimed(1, 1, turn(1, 1)).display_char(), 'A');
    }

    #[test]
    fn test_slot_kind_serialization() {
        let serialized = serde_json::to_string(&SlotKind::Initial).unwrap();
        assert_eq!(serialized, "\"initial\"");
    }
}
