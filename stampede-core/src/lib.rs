mod config;
mod constants;
mod data;
mod duration;
mod error;
mod stats;
mod threshold;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use duration::HumanDuration;
pub use error::ConfigError;
pub use stats::*;
pub use threshold::*;
