//! アプリケーション設定管理モジュール
//! 盤面サイズ、手番タイムアウト、スクリプトサンドボックスの制限値、ログ出力などの設定を
//! 設定ファイルと環境変数から読み込んで管理する。

use serde::{Deserialize, Serialize};
use std::{env, fmt, fs, path::Path, str::FromStr, time::Duration};

/// Durationをミリ秒の整数としてJSONに読み書きするためのモジュール
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// ゲーム本体の設定
/// 盤面サイズ、乱数シード、手番ごとのタイムアウトを含む
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// 横方向のドット数
    pub columns: usize,
    /// 縦方向のドット数
    pub rows: usize,
    /// 乱数シード。0の場合は現在時刻から決める
    pub seed: u64,
    /// 1手あたりの計算時間の上限。0でタイムアウトなし
    #[serde(with = "duration_ms")]
    pub turn_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            columns: 5,
            rows: 3,
            seed: 0,
            turn_timeout: Duration::from_millis(1000),
        }
    }
}

impl GameConfig {
    /// シードが0なら現在時刻からシードを決める
    pub fn resolve_seed(&self) -> u64 {
        if self.seed != 0 {
            return self.seed;
        }

        let now = chrono::Utc::now();
        now.timestamp_nanos_opt()
            .map(|nanos| nanos as u64)
            .unwrap_or_else(|| now.timestamp_millis() as u64)
    }
}

/// スクリプトサンドボックスの制限値
/// インタプリタの実行時間、演算回数、データサイズの上限を管理
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// スクリプトへの1回の呼び出しにかけられる実時間の上限
    #[serde(with = "duration_ms")]
    pub execution_timeout: Duration,
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    pub max_modules: usize,
    /// スクリプトが作る作業盤面の列数・行数の上限
    pub max_board_dimension: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_millis(1000),
            max_operations: 50_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_string_size: 1024 * 1024,
            max_array_size: 65_536,
            max_map_size: 65_536,
            max_modules: 32,
            max_board_dimension: 64,
        }
    }
}

/// ログの出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// 人が読むためのテキスト形式
    Human,
    /// 1行1イベントのJSON形式
    Json,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Human => f.write_str("human"),
            OutputKind::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputKind::Human),
            "json" => Ok(OutputKind::Json),
            _ => Err(ConfigError::InvalidValue {
                field: "logging.output_kind".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// ログ出力の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub output_kind: OutputKind,
    /// tracing-subscriberのEnvFilter構文
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            output_kind: OutputKind::Human,
            filter: "info".to_string(),
        }
    }
}

/// アプリケーションの全設定を統合するメイン設定構造体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub game: GameConfig,
    pub sandbox: SandboxConfig,
    pub logging: LoggingConfig,
}

/// 設定関連のエラーを表すenum
/// ファイル読み込み、パース、検証エラーなどを含む
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("設定ファイル読み込みエラー: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("設定ファイル解析エラー: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("環境変数エラー: {name} = {value}")]
    EnvVarError { name: String, value: String },

    #[error("設定値が無効です: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

/// 環境変数を読み、設定されていればパースして返す
fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// 指定したファイルパスから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 環境変数から設定を読み込む
    /// デフォルト値をベースに環境変数で上書きする
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// 設定されている環境変数の値で上書きする
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(columns) = parse_env("DOTS_GRID_COLUMNS")? {
            self.game.columns = columns;
        }

        if let Some(rows) = parse_env("DOTS_GRID_ROWS")? {
            self.game.rows = rows;
        }

        if let Some(seed) = parse_env("DOTS_SEED")? {
            self.game.seed = seed;
        }

        if let Some(timeout_ms) = parse_env("DOTS_TURN_TIMEOUT_MS")? {
            self.game.turn_timeout = Duration::from_millis(timeout_ms);
        }

        if let Some(timeout_ms) = parse_env("DOTS_SCRIPT_TIMEOUT_MS")? {
            self.sandbox.execution_timeout = Duration::from_millis(timeout_ms);
        }

        if let Ok(output_kind) = env::var("DOTS_OUTPUT_KIND") {
            self.logging.output_kind =
                output_kind.parse().map_err(|_| ConfigError::EnvVarError {
                    name: "DOTS_OUTPUT_KIND".to_string(),
                    value: output_kind,
                })?;
        }

        if let Ok(filter) = env::var("DOTS_LOG_FILTER") {
            self.logging.filter = filter;
        }

        Ok(())
    }

    /// 設定ファイルと環境変数を結合して設定を読み込む
    /// 設定ファイルがなくてもデフォルト値で動作する
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = ["dots_and_boxes.json", "config/dots_and_boxes.json"]
            .iter()
            .find_map(|path| Self::from_file(path).ok())
            .unwrap_or_default();

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// 現在の設定を指定したファイルに保存する
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定値の妥当性をチェックする
    /// 不正な値がある場合はConfigErrorを返す
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.columns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "game.columns".to_string(),
                value: self.game.columns.to_string(),
            });
        }

        if self.game.rows == 0 {
            return Err(ConfigError::InvalidValue {
                field: "game.rows".to_string(),
                value: self.game.rows.to_string(),
            });
        }

        if self.sandbox.execution_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sandbox.execution_timeout".to_string(),
                value: format!("{:?}", self.sandbox.execution_timeout),
            });
        }

        if self.sandbox.max_operations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sandbox.max_operations".to_string(),
                value: self.sandbox.max_operations.to_string(),
            });
        }

        if self.sandbox.max_board_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sandbox.max_board_dimension".to_string(),
                value: self.sandbox.max_board_dimension.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.game.columns, 5);
        assert_eq!(config.game.rows, 3);
        assert_eq!(config.game.turn_timeout, Duration::from_millis(1000));
        assert_eq!(config.sandbox.max_operations, 50_000_000);
        assert_eq!(config.sandbox.max_board_dimension, 64);
        assert_eq!(config.logging.output_kind, OutputKind::Human);
    }

    #[test]
    fn test_validate_rejects_zero_columns() {
        let mut config = Config::default();
        config.game.columns = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "game.columns"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_board_dimension() {
        let mut config = Config::default();
        config.sandbox.max_board_dimension = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "sandbox.max_board_dimension"
        ));
    }

    #[test]
    fn test_resolve_seed() {
        let mut game = GameConfig::default();
        game.seed = 42;
        assert_eq!(game.resolve_seed(), 42);

        game.seed = 0;
        assert_ne!(game.resolve_seed(), 0);
    }

    #[test]
    fn test_output_kind_from_str() {
        assert_eq!("JSON".parse::<OutputKind>().unwrap(), OutputKind::Json);
        assert_eq!("human".parse::<OutputKind>().unwrap(), OutputKind::Human);
        assert!("xml".parse::<OutputKind>().is_err());
    }
}
