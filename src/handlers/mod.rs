pub mod chat;
pub mod health;
pub mod rebuild;
pub mod search;

pub use chat::chat_handler;
pub use health::{health_handler, ready_handler};
pub use rebuild::rebuild_handler;
pub use search::search_handler;
