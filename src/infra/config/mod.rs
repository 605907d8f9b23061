mod app_config;
mod file_config;
mod loader;

pub use app_config::{
    AppConfig, ChatConfig, LogConfig, NetworkConfig, RealtimeConfig, ServerConfig,
};
pub use loader::load;
