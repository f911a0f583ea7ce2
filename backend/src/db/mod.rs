pub mod connection;
pub mod messages;
pub mod migrations;
pub mod skills;
pub mod tokens;
pub mod users;

pub use connection::{DatabaseConfig, get_db_pool};
