use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{
    AppConfig, ChatConfig, LogConfig, NetworkConfig, RealtimeConfig, ServerConfig,
};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub server: Option<FileServerConfig>,
    pub network: Option<FileNetworkConfig>,
    pub realtime: Option<FileRealtimeConfig>,
    pub chat: Option<FileChatConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(server) = self.server {
            server.merge_into(&mut config.server);
        }

        if let Some(network) = self.network {
            network.merge_into(&mut config.network);
        }

        if let Some(realtime) = self.realtime {
            realtime.merge_into(&mut config.realtime);
        }

        if let Some(chat) = self.chat {
            chat.merge_into(&mut config.chat);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileServerConfig {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
}

impl FileServerConfig {
    fn merge_into(self, config: &mut ServerConfig) {
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }

        if let Some(ws_url) = self.ws_url {
            config.ws_url = ws_url;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileNetworkConfig {
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

impl FileNetworkConfig {
    fn merge_into(self, config: &mut NetworkConfig) {
        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }

        if let Some(timeout_ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRealtimeConfig {
    pub reconnect_initial_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
}

impl FileRealtimeConfig {
    fn merge_into(self, config: &mut RealtimeConfig) {
        if let Some(initial_ms) = self.reconnect_initial_ms {
            config.reconnect_initial_ms = initial_ms;
        }

        if let Some(max_ms) = self.reconnect_max_ms {
            config.reconnect_max_ms = max_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileChatConfig {
    pub typing_ttl_ms: Option<u64>,
}

impl FileChatConfig {
    fn merge_into(self, config: &mut ChatConfig) {
        if let Some(ttl_ms) = self.typing_ttl_ms {
            config.typing_ttl_ms = ttl_ms;
        }
    }
}
