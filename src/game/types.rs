//! ゲームの基本型定義モジュール
//! プレイヤーのイニシャル、着手候補、確定したターンなどの値型を定義する。

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MoveError;

/// プレイヤーを識別する1文字のイニシャル
/// 表示やソートでは大文字小文字を区別しない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerInitial(char);

impl PlayerInitial {
    pub const fn new(initial: char) -> Self {
        Self(initial)
    }

    /// 0始まりの番号から `A`, `B`, ... のイニシャルを生成する
    pub fn from_index(index: usize) -> Option<Self> {
        let offset = u8::try_from(index).ok()?;
        let code = b'A'.checked_add(offset)?;

        if code.is_ascii_uppercase() {
            Some(Self(char::from(code)))
        } else {
            None
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// 大文字小文字を区別しない比較用のキー
    pub fn sort_key(self) -> char {
        self.0.to_lowercase().next().unwrap_or(self.0)
    }

    /// 大文字小文字を区別せずに比較する
    pub fn cmp_ignore_case(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for PlayerInitial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<char> for PlayerInitial {
    fn from(initial: char) -> Self {
        Self(initial)
    }
}

/// 指定した座標がスペーサー（線を引ける位置）を指しているかチェックする
/// x と y のどちらか一方だけが奇数である必要がある
pub fn is_legal_move(x: usize, y: usize) -> bool {
    (x % 2 == 0 && y % 2 == 1) || (x % 2 == 1 && y % 2 == 0)
}

/// プレイヤーがまだ確定させていない着手候補
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerMove {
    pub x: usize,
    pub y: usize,
}

impl PlayerMove {
    /// 座標の偶奇を検証して着手候補を作成する
    pub fn new(x: usize, y: usize) -> Result<Self, MoveError> {
        if !is_legal_move(x, y) {
            return Err(MoveError::IllegalMove {
                x: x as i64,
                y: y as i64,
            });
        }

        Ok(Self { x, y })
    }

    /// スクリプトから渡された符号付き座標を検証して着手候補を作成する
    pub fn from_signed(x: i64, y: i64) -> Result<Self, MoveError> {
        match (usize::try_from(x), usize::try_from(y)) {
            (Ok(ux), Ok(uy)) => Self::new(ux, uy),
            _ => Err(MoveError::IllegalMove { x, y }),
        }
    }
}

/// ボードに受け入れられた確定済みの1手
/// turn_index はセッション内で0から単調増加する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerTurn {
    pub player: PlayerInitial,
    pub turn_index: usize,
    pub x: usize,
    pub y: usize,
}

impl PlayerTurn {
    /// 着手候補とプレイヤー情報からターンを組み立てる
    /// 合法性は着手候補の作成時、またはボードへの配置時に検証される
    pub fn from_move(player_move: PlayerMove, player: PlayerInitial, turn_index: usize) -> Self {
        Self {
            player,
            turn_index,
            x: player_move.x,
            y: player_move.y,
        }
    }

    pub fn player_move(&self) -> PlayerMove {
        PlayerMove {
            x: self.x,
            y: self.y,
        }
    }
}
