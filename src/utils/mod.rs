pub mod catalog_toml;
pub mod config;
pub mod logger;
pub mod tempfiles;

pub use config::*;
pub use logger::{Colors, setup_logging};
