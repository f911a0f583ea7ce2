pub mod config;
pub mod conversation;
pub mod logging;
pub mod validation;

pub use config::Config;
pub use logging::init_logging;
