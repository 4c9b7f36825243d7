//! ゲームループ統合テスト
//! 組み込みプレイヤーとスクリプトプレイヤーで1ゲームを通しで実行し、
//! 終了理由と結果の集計を検証する。

use std::path::{Path, PathBuf};
use std::time::Duration;

use dots_and_boxes::{
    config::OutputKind,
    error::GameError,
    game::{PlayerInitial, WinKind},
    game_loop::{run_game_loop, GameEndReason, GameLoopOptions},
    players::{BuiltinPlayer, PlayerSpec},
    worker::SandboxCapabilities,
};

fn options(columns: usize, rows: usize, players: Vec<PlayerSpec>) -> GameLoopOptions {
    GameLoopOptions {
        columns,
        rows,
        players,
        seed: 2024,
        turn_timeout: Duration::from_secs(5),
        capabilities: SandboxCapabilities::default(),
        output_kind: OutputKind::Json,
    }
}

fn builtin(player: BuiltinPlayer) -> PlayerSpec {
    PlayerSpec::Builtin(player)
}

fn bundled_player(name: &str) -> PlayerSpec {
    let path: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("players").join(name);
    PlayerSpec::Script(path)
}

#[tokio::test]
async fn test_random_players_complete_game() {
    let outcome = run_game_loop(options(
        5,
        3,
        vec![builtin(BuiltinPlayer::Random), builtin(BuiltinPlayer::Random)],
    ))
    .await
    .unwrap();

    assert_eq!(outcome.end_reason, GameEndReason::Completed);
    assert_eq!(outcome.turns_played, 22);
    assert!(outcome.finished_at >= outcome.started_at);

    let total: u32 = outcome.result.scores.iter().map(|(_, score)| score).sum();
    assert_eq!(total, 8);
    assert!(outcome.result.highest_score >= 4);
    assert_ne!(outcome.result.win_kind, WinKind::NoContest);
}

#[tokio::test]
async fn test_same_seed_replays_same_game() {
    let players = vec![builtin(BuiltinPlayer::Random), builtin(BuiltinPlayer::Random)];

    let first = run_game_loop(options(4, 4, players.clone())).await.unwrap();
    let second = run_game_loop(options(4, 4, players)).await.unwrap();

    assert_eq!(first.final_board, second.final_board);
    assert_eq!(first.result, second.result);
}

#[tokio::test]
async fn test_forfeit_ends_game() {
    let outcome = run_game_loop(options(
        3,
        3,
        vec![builtin(BuiltinPlayer::Random), builtin(BuiltinPlayer::Forfeit)],
    ))
    .await
    .unwrap();

    assert_eq!(
        outcome.end_reason,
        GameEndReason::Forfeit {
            player: PlayerInitial::new('B')
        }
    );
    assert_eq!(outcome.turns_played, 1);
    assert_eq!(outcome.result.win_kind, WinKind::NoContest);
}

#[tokio::test]
async fn test_dummy_player_compute_error_ends_game() {
    let outcome = run_game_loop(options(3, 3, vec![builtin(BuiltinPlayer::Dummy)]))
        .await
        .unwrap();

    assert!(matches!(
        outcome.end_reason,
        GameEndReason::ComputeError { player, .. } if player == PlayerInitial::new('A')
    ));
    assert_eq!(outcome.turns_played, 0);
}

#[tokio::test]
async fn test_single_dot_board_completes_immediately() {
    let outcome = run_game_loop(options(1, 1, vec![builtin(BuiltinPlayer::Dummy)]))
        .await
        .unwrap();

    assert_eq!(outcome.end_reason, GameEndReason::Completed);
    assert_eq!(outcome.turns_played, 0);
    assert_eq!(outcome.result.win_kind, WinKind::NoContest);
}

#[tokio::test]
async fn test_invalid_dimensions_rejected() {
    let result = run_game_loop(options(0, 3, vec![builtin(BuiltinPlayer::Random)])).await;

    assert!(matches!(result, Err(GameError::Board { .. })));
}

#[tokio::test]
async fn test_missing_script_fails_setup() {
    let result = run_game_loop(options(
        3,
        3,
        vec![
            builtin(BuiltinPlayer::Random),
            PlayerSpec::Script(PathBuf::from("does/not/exist.rhai")),
        ],
    ))
    .await;

    assert!(matches!(
        result,
        Err(GameError::PlayerInitialization { player, .. }) if player == PlayerInitial::new('B')
    ));
}

#[tokio::test]
async fn test_script_players_against_builtin() {
    let outcome = run_game_loop(options(
        4,
        3,
        vec![
            bundled_player("strategic_player.rhai"),
            builtin(BuiltinPlayer::Random),
        ],
    ))
    .await
    .unwrap();

    assert_eq!(outcome.end_reason, GameEndReason::Completed);
    assert_eq!(outcome.turns_played, 17);

    let total: u32 = outcome.result.scores.iter().map(|(_, score)| score).sum();
    assert_eq!(total, 6);
}

#[tokio::test]
async fn test_outcome_serializes_to_json() {
    let outcome = run_game_loop(options(
        2,
        2,
        vec![bundled_player("first_opening_player.rhai")],
    ))
    .await
    .unwrap();

    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["end_reason"]["kind"], "completed");
    assert_eq!(json["turns_played"], 4);
    assert_eq!(json["result"]["win_kind"], "singular");
    assert_eq!(json["result"]["highest_score"], 1);
}
