//! ワーカースレッド内で動くスクリプト実行環境
//! バンドルの評価、エントリーポイントの呼び出し、戻り値の変換、
//! ミラーへのイベント適用を担当する。スレッドをまたいで移動することはない。

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{CallFnOptions, Dynamic, Engine, Map, Module, Scope, AST};
use tracing::{debug, warn};

use super::bundle::{import_statements, ScriptBundle};
use super::game_namespace::GameMirror;
use super::sandbox::{build_engine, map_eval_error, ExecutionDeadline, SandboxCapabilities, SandboxLimits};
use super::thread::WorkerInit;
use super::{engine_namespace, game_namespace, math_namespace};
use crate::error::ScriptError;
use crate::game::{PlayerInitial, PlayerMove};

/// プレイヤースクリプトが定義するエントリーポイント
pub const ENTRY_POINT: &str = "compute_player_move";

pub struct ScriptRuntime {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    deadline: ExecutionDeadline,
    limits: SandboxLimits,
    mirror: GameMirror,
    has_entry_point: bool,
}

impl ScriptRuntime {
    /// インタプリタを組み立て、依存モジュールとエントリースクリプトを評価する
    /// トップレベルのコードはここで一度だけ実行される
    pub fn new(
        bundle: &ScriptBundle,
        init: &WorkerInit,
        capabilities: &SandboxCapabilities,
    ) -> Result<Self, ScriptError> {
        let deadline = ExecutionDeadline::default();
        let limits = capabilities.limits.clone();

        let mirror = GameMirror::new(init)?;
        let mut engine = build_engine(capabilities, deadline.clone());
        engine_namespace::register(&mut engine, limits.max_board_dimension);
        game_namespace::register(&mut engine, &mirror);
        math_namespace::register(&mut engine, init.seed);

        // 依存順に評価し、評価済みのモジュールだけが見えるリゾルバを都度差し替える
        let mut resolver = StaticModuleResolver::new();
        for module in &bundle.modules {
            engine.set_module_resolver(resolver.clone());

            let ast = engine.compile(&module.source).map_err(|error| ScriptError::Compile {
                message: format!("module '{}': {}", module.name, error),
            })?;

            let evaluated = deadline
                .run(limits.execution_timeout, || {
                    Module::eval_ast_as_new(Scope::new(), &ast, &engine)
                })
                .map_err(|error| map_eval_error(&error, &limits))?;

            resolver.insert(module.name.as_str(), evaluated);
        }
        engine.set_module_resolver(resolver);

        let ast = engine.compile(&bundle.entry).map_err(|error| ScriptError::Compile {
            message: format!("{}: {}", bundle.entry_path.display(), error),
        })?;

        let has_entry_point = ast
            .iter_functions()
            .any(|function| function.name == ENTRY_POINT && function.params.is_empty());

        let mut scope = Scope::new();
        deadline
            .run(limits.execution_timeout, || engine.run_ast_with_scope(&mut scope, &ast))
            .map_err(|error| map_eval_error(&error, &limits))?;

        // importの束縛は実行ごとに消えるため、呼び出し時はimport文と関数定義だけを評価する
        let imports = engine
            .compile(import_statements(&bundle.entry))
            .map_err(|error| ScriptError::Compile {
                message: format!("{}: {}", bundle.entry_path.display(), error),
            })?;
        let ast = imports.merge(&ast.clone_functions_only());

        debug!(
            player = %init.player,
            modules = bundle.modules.len(),
            has_entry_point,
            "script runtime initialized"
        );

        Ok(Self {
            engine,
            ast,
            scope,
            deadline,
            limits,
            mirror,
            has_entry_point,
        })
    }

    pub fn has_entry_point(&self) -> bool {
        self.has_entry_point
    }

    pub fn mirror(&self) -> &GameMirror {
        &self.mirror
    }

    /// エントリーポイントを呼び出して次の手を計算する
    /// エントリーポイントがない場合は棄権として扱う
    pub fn compute_player_move(&mut self) -> Result<Option<PlayerMove>, ScriptError> {
        if !self.has_entry_point {
            return Ok(None);
        }

        let options = CallFnOptions::new().eval_ast(true).rewind_scope(true);

        let Self {
            engine,
            ast,
            scope,
            deadline,
            limits,
            ..
        } = self;

        let value = deadline
            .run(limits.execution_timeout, || {
                engine.call_fn_with_options::<Dynamic>(options, scope, ast, ENTRY_POINT, ())
            })
            .map_err(|error| map_eval_error(&error, limits))?;

        convert_move(value)
    }

    pub fn on_turn_start(&self, turn_index: usize) {
        self.mirror.start_turn(turn_index);
    }

    pub fn on_turn_move(&self, player: PlayerInitial, player_move: PlayerMove, turn_index: usize) {
        if let Err(error) = self.mirror.apply_move(player, player_move, turn_index) {
            warn!(
                player = %player,
                turn_index,
                error = %error,
                "script mirror rejected relayed move"
            );
        }
    }
}

/// エントリーポイントの戻り値を着手候補に変換する
/// `()` は棄権、`PlayerMove` または `#{ x, y }` は着手として扱う
pub fn convert_move(value: Dynamic) -> Result<Option<PlayerMove>, ScriptError> {
    if value.is_unit() {
        return Ok(None);
    }

    let type_name = value.type_name().to_string();

    if value.is::<PlayerMove>() {
        return value
            .try_cast::<PlayerMove>()
            .map(Some)
            .ok_or(ScriptError::InvalidReturn { type_name });
    }

    if let Some(map) = value.try_cast::<Map>() {
        let coordinate = |key: &str| map.get(key).and_then(|value| value.as_int().ok());

        return match (coordinate("x"), coordinate("y")) {
            (Some(x), Some(y)) => Ok(Some(PlayerMove::from_signed(x, y)?)),
            _ => Err(ScriptError::InvalidReturn { type_name }),
        };
    }

    Err(ScriptError::InvalidReturn { type_name })
}
