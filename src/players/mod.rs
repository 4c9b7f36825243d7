pub mod player;
pub mod constant;
pub mod dummy;
pub mod forfeit;
pub mod random;
pub mod script;

pub use player::{BuiltinPlayer, Player, PlayerFactory, PlayerSpec};
pub use constant::ConstantPlayer;
pub use dummy::DummyPlayer;
pub use forfeit::ForfeitPlayer;
pub use random::RandomPlayer;
pub use script::ScriptPlayer;
