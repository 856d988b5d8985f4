pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, DbPool};
pub use repositories::{
    ChatHistoryRepository, HistoryQuery, InMemoryChatHistoryRepository, RepositoryError,
    SqliteChatHistoryRepository,
};
