//! スクリプトサンドボックスの構築モジュール
//! 許可する組み込みパッケージと資源制限を記述した `SandboxCapabilities` から、
//! 空の状態のインタプリタを組み立てる。ファイル、プロセス、ネットワークには一切触れられない。

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicFnPackage, BasicIteratorPackage, BasicMapPackage,
    BasicMathPackage, BasicStringPackage, BasicTimePackage, LanguageCorePackage, LogicPackage,
    MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, EvalAltResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SandboxConfig;
use crate::error::ScriptError;

/// 演算がこの回数に達するごとに実行期限を確認する
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// スクリプトに公開する組み込みパッケージ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPackage {
    LanguageCore,
    Arithmetic,
    Logic,
    BasicString,
    MoreString,
    BasicIterator,
    BasicArray,
    BasicMap,
    BasicMath,
    BasicFn,
    BasicTime,
}

impl BuiltinPackage {
    pub const ALL: [BuiltinPackage; 11] = [
        BuiltinPackage::LanguageCore,
        BuiltinPackage::Arithmetic,
        BuiltinPackage::Logic,
        BuiltinPackage::BasicString,
        BuiltinPackage::MoreString,
        BuiltinPackage::BasicIterator,
        BuiltinPackage::BasicArray,
        BuiltinPackage::BasicMap,
        BuiltinPackage::BasicMath,
        BuiltinPackage::BasicFn,
        BuiltinPackage::BasicTime,
    ];

    fn register(self, engine: &mut Engine) {
        let module = match self {
            BuiltinPackage::LanguageCore => LanguageCorePackage::new().as_shared_module(),
            BuiltinPackage::Arithmetic => ArithmeticPackage::new().as_shared_module(),
            BuiltinPackage::Logic => LogicPackage::new().as_shared_module(),
            BuiltinPackage::BasicString => BasicStringPackage::new().as_shared_module(),
            BuiltinPackage::MoreString => MoreStringPackage::new().as_shared_module(),
            BuiltinPackage::BasicIterator => BasicIteratorPackage::new().as_shared_module(),
            BuiltinPackage::BasicArray => BasicArrayPackage::new().as_shared_module(),
            BuiltinPackage::BasicMap => BasicMapPackage::new().as_shared_module(),
            BuiltinPackage::BasicMath => BasicMathPackage::new().as_shared_module(),
            BuiltinPackage::BasicFn => BasicFnPackage::new().as_shared_module(),
            BuiltinPackage::BasicTime => BasicTimePackage::new().as_shared_module(),
        };

        engine.register_global_module(module);
    }
}

/// インタプリタの資源制限
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLimits {
    pub execution_timeout: Duration,
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    pub max_modules: usize,
    pub max_board_dimension: usize,
}

impl From<&SandboxConfig> for SandboxLimits {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            execution_timeout: config.execution_timeout,
            max_operations: config.max_operations,
            max_call_levels: config.max_call_levels,
            max_expr_depth: config.max_expr_depth,
            max_string_size: config.max_string_size,
            max_array_size: config.max_array_size,
            max_map_size: config.max_map_size,
            max_modules: config.max_modules,
            max_board_dimension: config.max_board_dimension,
        }
    }
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self::from(&SandboxConfig::default())
    }
}

/// サンドボックスに与える能力の記述
/// ここに列挙されたもの以外はスクリプトから到達できない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxCapabilities {
    pub builtins: Vec<BuiltinPackage>,
    pub limits: SandboxLimits,
}

impl Default for SandboxCapabilities {
    fn default() -> Self {
        Self {
            builtins: BuiltinPackage::ALL.to_vec(),
            limits: SandboxLimits::default(),
        }
    }
}

impl From<&SandboxConfig> for SandboxCapabilities {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            builtins: BuiltinPackage::ALL.to_vec(),
            limits: SandboxLimits::from(config),
        }
    }
}

impl SandboxCapabilities {
    pub fn with_execution_timeout(mut self, execution_timeout: Duration) -> Self {
        self.limits.execution_timeout = execution_timeout;
        self
    }
}

/// スクリプト実行の期限
/// ワーカースレッド内でのみ共有する
#[derive(Debug, Clone, Default)]
pub struct ExecutionDeadline(Rc<Cell<Option<Instant>>>);

impl ExecutionDeadline {
    pub fn arm(&self, limit: Duration) {
        self.0.set(Instant::now().checked_add(limit));
    }

    pub fn disarm(&self) {
        self.0.set(None);
    }

    pub fn is_expired(&self) -> bool {
        self.0.get().map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// 期限を設定して処理を実行し、終了後に解除する
    pub fn run<R>(&self, limit: Duration, f: impl FnOnce() -> R) -> R {
        self.arm(limit);
        let result = f();
        self.disarm();
        result
    }
}

/// 能力記述からインタプリタを組み立てる
/// モジュールリゾルバは設定しないため、ディスク上のファイルはimportできない
pub fn build_engine(capabilities: &SandboxCapabilities, deadline: ExecutionDeadline) -> Engine {
    let mut engine = Engine::new_raw();

    for package in &capabilities.builtins {
        package.register(&mut engine);
    }

    engine.disable_symbol("eval");

    engine.on_print(|text| info!(target: "sandbox", "{}", text));
    engine.on_debug(|text, source, position| {
        debug!(target: "sandbox", source = source.unwrap_or(""), %position, "{}", text);
    });

    let limits = &capabilities.limits;
    engine
        .set_max_operations(limits.max_operations)
        .set_max_call_levels(limits.max_call_levels)
        .set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth)
        .set_max_string_size(limits.max_string_size)
        .set_max_array_size(limits.max_array_size)
        .set_max_map_size(limits.max_map_size)
        .set_max_modules(limits.max_modules);

    engine.on_progress(move |operations| {
        if operations % DEADLINE_CHECK_INTERVAL == 0 && deadline.is_expired() {
            Some(Dynamic::from("execution deadline exceeded".to_string()))
        } else {
            None
        }
    });

    engine
}

/// 関数呼び出しやモジュールで包まれたエラーの根本原因を取り出す
fn root_cause(error: &EvalAltResult) -> &EvalAltResult {
    match error {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => root_cause(inner),
        other => other,
    }
}

/// インタプリタのエラーをScriptErrorに変換する
pub fn map_eval_error(error: &EvalAltResult, limits: &SandboxLimits) -> ScriptError {
    match root_cause(error) {
        EvalAltResult::ErrorTerminated(..) => ScriptError::ExecutionTimeout {
            limit_ms: limits.execution_timeout.as_millis() as u64,
        },
        EvalAltResult::ErrorTooManyOperations(..) => ScriptError::OperationLimit,
        EvalAltResult::ErrorParsing(..) => ScriptError::Compile {
            message: error.to_string(),
        },
        EvalAltResult::ErrorModuleNotFound(name, _) => ScriptError::Bundle {
            path: name.clone(),
            reason: "module was not bundled; each import statement must start its own line"
                .to_string(),
        },
        _ => ScriptError::Runtime {
            message: error.to_string(),
        },
    }
}
