use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    infra::{config::AppConfig, kv_store::FileKeyValueStore},
    remote::{realtime::WsRealtimeClient, rest::RestClient},
    usecases::{contracts::RealtimeChannel, session::SessionStore},
};

/// Everything a command needs for one process run.
///
/// The runtime is shared by the REST client and the realtime task; the log
/// guard lives here so buffered log lines are flushed when the context drops.
pub struct AppContext {
    pub config: AppConfig,
    pub runtime: Arc<Runtime>,
    pub rest: RestClient,
    pub realtime: WsRealtimeClient,
    pub session: SessionStore<FileKeyValueStore>,
    _log_guard: Option<WorkerGuard>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        runtime: Arc<Runtime>,
        rest: RestClient,
        realtime: WsRealtimeClient,
        session: SessionStore<FileKeyValueStore>,
        log_guard: Option<WorkerGuard>,
    ) -> Self {
        Self {
            config,
            runtime,
            rest,
            realtime,
            session,
            _log_guard: log_guard,
        }
    }

    /// Opens the socket for a restored session. Returns false when there is
    /// no session or the endpoint is unusable.
    pub fn connect_realtime(&self) -> bool {
        let Some(session) = self.session.current() else {
            return false;
        };

        match self.realtime.connect(&session.token) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    code = "REALTIME_CONNECT_FAILED",
                    error = %error,
                    "realtime channel unavailable"
                );
                false
            }
        }
    }
}
