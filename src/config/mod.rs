// Configuration module for the search engine
// Loaded from JSON, YAML or TOML; learning parameters can be reloaded at runtime

#[allow(clippy::module_inception)]
pub mod config;

pub use config::{
    EngineConfig, LearningConfig, MctsConfig, RescanPolicy, StorageBackend, StorageConfig,
    WalkConfig,
};
