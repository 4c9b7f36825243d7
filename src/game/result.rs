//! ゲーム結果の集計モジュール
//! 盤面上の獲得済みボックスからスコアを集計し、勝者と勝利の種類を判定する。

use serde::{Deserialize, Serialize};

use super::session::GameSession;
use super::slot::SlotKind;
use super::types::PlayerInitial;

/// 勝利の種類を表すenum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinKind {
    /// 誰もボックスを獲得していない
    NoContest,
    /// 単独勝利
    Singular,
    /// 同点による複数勝利
    Multiple,
}

/// ゲームの最終結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// イニシャル順（大文字小文字を区別しない）のスコア
    pub scores: Vec<(PlayerInitial, u32)>,
    pub highest_score: u32,
    /// 最高得点のプレイヤー。最高得点が0の場合は空
    pub winning_players: Vec<PlayerInitial>,
    pub win_kind: WinKind,
}

impl GameResult {
    /// スコア一覧から結果を判定する
    pub fn compute(mut scores: Vec<(PlayerInitial, u32)>) -> Self {
        scores.sort_by(|(a, _), (b, _)| a.cmp_ignore_case(b));

        let highest_score = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);

        let winning_players: Vec<PlayerInitial> = if highest_score > 0 {
            scores
                .iter()
                .filter(|(_, score)| *score == highest_score)
                .map(|(player, _)| *player)
                .collect()
        } else {
            Vec::new()
        };

        let win_kind = match winning_players.len() {
            0 => WinKind::NoContest,
            1 => WinKind::Singular,
            _ => WinKind::Multiple,
        };

        Self {
            scores,
            highest_score,
            winning_players,
            win_kind,
        }
    }

    /// セッションの盤面から獲得済みボックスを数えて結果を判定する
    /// 参加者は全員0点から数え始める
    pub fn from_game(session: &GameSession) -> Self {
        let mut scores: Vec<(PlayerInitial, u32)> = session
            .players()
            .iter()
            .map(|player| (player.initial(), 0))
            .collect();

        let owners = session
            .board()
            .walk_boxes()
            .filter(|slot| slot.kind == SlotKind::Initial)
            .filter_map(|slot| slot.owner_turn);

        for owner_turn in owners {
            if let Some((_, score)) = scores
                .iter_mut()
                .find(|(player, _)| *player == owner_turn.player)
            {
                *score += 1;
            }
        }

        Self::compute(scores)
    }

    pub fn score_of(&self, player: PlayerInitial) -> Option<u32> {
        self.scores
            .iter()
            .find(|(initial, _)| *initial == player)
            .map(|(_, score)| *score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial(c: char) -> PlayerInitial {
        PlayerInitial::new(c)
    }

    #[test]
    fn test_compute_no_contest() {
        let result = GameResult::compute(vec![(initial('A'), 0), (initial('B'), 0)]);

        assert_eq!(result.highest_score, 0);
        assert!(result.winning_players.is_empty());
        assert_eq!(result.win_kind, WinKind::NoContest);
    }

    #[test]
    fn test_compute_singular() {
        let result = GameResult::compute(vec![(initial('B'), 3), (initial('A'), 1)]);

        assert_eq!(result.highest_score, 3);
        assert_eq!(result.winning_players, vec![initial('B')]);
        assert_eq!(result.win_kind, WinKind::Singular);
        assert_eq!(result.scores, vec![(initial('A'), 1), (initial('B'), 3)]);
    }

    #[test]
    fn test_compute_multiple() {
        let result = GameResult::compute(vec![
            (initial('c'), 2),
            (initial('A'), 2),
            (initial('b'), 1),
        ]);

        assert_eq!(result.win_kind, WinKind::Multiple);
        assert_eq!(result.winning_players, vec![initial('A'), initial('c')]);
        assert_eq!(result.score_of(initial('b')), Some(1));
        assert_eq!(result.score_of(initial('Z')), None);
    }

    #[test]
    fn test_compute_nine_beats_six() {
        let result = GameResult::compute(vec![(initial('A'), 6), (initial('B'), 9)]);

        assert_eq!(result.highest_score, 9);
        assert_eq!(result.win_kind, WinKind::Singular);
        assert_eq!(result.winning_players, vec![initial('B')]);
    }

    #[test]
    fn test_compute_shared_nine() {
        let result = GameResult::compute(vec![
            (initial('A'), 6),
            (initial('B'), 9),
            (initial('C'), 9),
        ]);

        assert_eq!(result.highest_score, 9);
        assert_eq!(result.win_kind, WinKind::Multiple);
        assert_eq!(result.winning_players, vec![initial('B'), initial('C')]);
    }

    #[test]
    fn test_compute_empty() {
        let result = GameResult::compute(Vec::new());

        assert_eq!(result.highest_score, 0);
        assert_eq!(result.win_kind, WinKind::NoContest);
    }

    #[test]
    fn test_win_kind_serialization() {
        let serialized = serde_json::to_string(&WinKind::NoContest).unwrap();
        assert_eq!(serialized, "\"no_contest\"");
    }
}
