pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{Config, SourceLimits};
pub use error::FactCheckError;
pub use events::PipelineEvent;
pub use types::*;
