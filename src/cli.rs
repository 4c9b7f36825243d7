//! コマンドライン引数の定義モジュール
//! `simulate` サブコマンドの引数を設定値に反映し、プレイヤー指定を解釈する。

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, ConfigError, OutputKind};
use crate::error::Result;
use crate::players::PlayerSpec;

/// Dots and Boxes engine with sandboxed script players
#[derive(Parser, Debug)]
#[command(name = "dots-and-boxes")]
#[command(about = "Run Dots and Boxes games between sandboxed player scripts", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate a single game between the given players
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of dot columns
    #[arg(long)]
    pub grid_columns: Option<usize>,

    /// Number of dot rows
    #[arg(long)]
    pub grid_rows: Option<usize>,

    /// Seed handed to every player (0 derives one from the clock)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Per-turn compute timeout in milliseconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Wall-clock limit for each script entry in milliseconds
    #[arg(long)]
    pub script_timeout: Option<u64>,

    /// Log output format
    #[arg(long, value_enum)]
    pub output_kind: Option<OutputKind>,

    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Player script paths or builtin:random, builtin:forfeit, builtin:dummy
    #[arg(required = true, num_args = 1..)]
    pub players: Vec<String>,
}

impl SimulateArgs {
    /// 設定ファイル（指定があれば）と環境変数から設定を読み込み、引数で上書きする
    pub fn load_config(&self) -> std::result::Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = Config::from_file(path)?;
                config.apply_env_overrides()?;
                config
            }
            None => Config::load()?,
        };

        self.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_to(&self, config: &mut Config) {
        if let Some(columns) = self.grid_columns {
            config.game.columns = columns;
        }

        if let Some(rows) = self.grid_rows {
            config.game.rows = rows;
        }

        if let Some(seed) = self.seed {
            config.game.seed = seed;
        }

        if let Some(timeout) = self.timeout {
            config.game.turn_timeout = Duration::from_millis(timeout);
        }

        if let Some(timeout) = self.script_timeout {
            config.sandbox.execution_timeout = Duration::from_millis(timeout);
        }

        if let Some(output_kind) = self.output_kind {
            config.logging.output_kind = output_kind;
        }
    }

    pub fn player_specs(&self) -> Result<Vec<PlayerSpec>> {
        self.players.iter().map(|player| player.parse()).collect()
    }
}
