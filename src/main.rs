//! dots-and-boxes コマンドのエントリポイント
//! 設定読み込み、ログ出力の初期化、ゲームの実行と結果の出力を行う。

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use dots_and_boxes::{
    cli::{Cli, Command, SimulateArgs},
    config::{LoggingConfig, OutputKind},
    game_loop::{run_game_loop, GameLoopOptions, GameOutcome},
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => simulate(args).await,
    }
}

/// ログ出力を初期化する
/// フィルタが不正な場合はinfoレベルにフォールバックする
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match logging.output_kind {
        OutputKind::Human => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        OutputKind::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn print_outcome(outcome: &GameOutcome, output_kind: OutputKind) {
    match output_kind {
        OutputKind::Human => {
            println!("{}", outcome.final_board);
            println!();
            println!("終了理由: {}", outcome.end_reason);
            println!("手数: {}", outcome.turns_played);
            for (player, score) in &outcome.result.scores {
                println!("  {}: {}", player, score);
            }
            println!("勝利: {:?}", outcome.result.win_kind);
        }
        OutputKind::Json => match serde_json::to_string(outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => error!(error = %e, "failed to serialize game outcome"),
        },
    }
}

async fn simulate(args: SimulateArgs) {
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("設定エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("設定エラー: {}", e);
        std::process::exit(1);
    }

    init_tracing(&config.logging);

    let players = match args.player_specs() {
        Ok(players) => players,
        Err(e) => {
            eprintln!("プレイヤー指定エラー: {}", e);
            std::process::exit(1);
        }
    };

    let output_kind = config.logging.output_kind;
    let options = GameLoopOptions::from_config(&config, players);

    match run_game_loop(options).await {
        Ok(outcome) => print_outcome(&outcome, output_kind),
        Err(e) => {
            error!(error = %e, "game failed to run");
            eprintln!("ゲーム実行エラー: {}", e);
            std::process::exit(1);
        }
    }
}
