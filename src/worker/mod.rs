//! 信頼できないプレイヤースクリプトを隔離して実行するためのモジュール群
//! スクリプトごとに専用スレッドと制限付きインタプリタを持ち、
//! ゲームとは非同期チャネル越しにのみやり取りする。

pub mod bundle;
pub mod sandbox;
pub mod engine_namespace;
pub mod game_namespace;
pub mod math_namespace;
pub mod runtime;
pub mod thread;

pub use bundle::{bundle_script, BundledModule, ScriptBundle};
pub use sandbox::{BuiltinPackage, SandboxCapabilities, SandboxLimits};
pub use thread::{ScriptWorker, WorkerInit, WorkerRequest, WorkerSender};
