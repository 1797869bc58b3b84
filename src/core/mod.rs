pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use types::JsonMap;
