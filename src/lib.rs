pub mod game;
pub mod players;
pub mod worker;
pub mod event;
pub mod error;
pub mod config;
pub mod cli;
pub mod game_logger;
pub mod game_loop;

pub use error::{BoardError, GameError, MoveError, PlayerError, ScriptError, SessionError, Result};
pub use config::Config;
pub use game_loop::{run_game_loop, GameEndReason, GameLoopOptions, GameOutcome};
