//! Configuration storage.

pub mod config;
pub mod paths;

pub use config::{
    AppConfig, Config, ConfigSource, ConfigSources, ENV_BIND, ENV_CONFIG, ENV_FORGE_BUCKET,
    ENV_FORGE_CLIENT_ID, ENV_FORGE_CLIENT_SECRET, ENV_OPENAI_API_KEY, ENV_XAI_API_KEY,
};
pub use paths::AppPaths;
