pub mod chat;
pub mod history;
pub mod verify;

pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use verify::VerifyCommand;
