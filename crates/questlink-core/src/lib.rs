pub mod constants;
pub mod error;
pub mod quest;
pub mod types;
pub mod window;

pub use constants::*;
pub use error::{ErrorClass, QuestError};
pub use quest::*;
pub use types::*;
pub use window::{check_window, clamp, is_within, WindowCheck};
