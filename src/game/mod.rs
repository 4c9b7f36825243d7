pub mod types;
pub mod slot;
pub mod board;
pub mod session;
pub mod result;

pub use types::*;
pub use slot::*;
pub use board::*;
pub use session::*;
pub use result::*;
