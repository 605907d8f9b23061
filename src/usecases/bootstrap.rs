use std::{path::Path, sync::Arc};

use tokio::runtime::{Builder, Runtime};
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    infra::{
        self, config::AppConfig, error::AppError, kv_store::FileKeyValueStore,
        storage_layout::StorageLayout,
    },
    remote::{realtime::WsRealtimeClient, rest::RestClient},
    usecases::{context::AppContext, session::SessionStore},
};

const RUNTIME_WORKER_THREADS: usize = 2;

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;
    let log_guard = infra::logging::init(&config.logging)?;

    build_context(config, log_guard)
}

fn build_context(
    config: AppConfig,
    log_guard: Option<WorkerGuard>,
) -> Result<AppContext, AppError> {
    let layout = StorageLayout::resolve()?;
    layout.ensure_dirs()?;

    let runtime = build_runtime()?;
    let rest = RestClient::new(Arc::clone(&runtime), &config.server, &config.network)?;
    let realtime = WsRealtimeClient::new(
        Arc::clone(&runtime),
        &config.server,
        &config.network,
        &config.realtime,
    );

    let mut session = SessionStore::new(FileKeyValueStore::from_layout(&layout));
    session.restore(&rest);

    tracing::debug!(
        api_url = %config.server.api_url,
        ws_url = %config.server.ws_url,
        signed_in = session.current().is_some(),
        "application context ready"
    );

    Ok(AppContext::new(
        config, runtime, rest, realtime, session, log_guard,
    ))
}

fn build_runtime() -> Result<Arc<Runtime>, AppError> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(RUNTIME_WORKER_THREADS)
        .thread_name("parley-io")
        .enable_all()
        .build()
        .map_err(AppError::RuntimeInit)?;

    Ok(Arc::new(runtime))
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::{
        infra::contracts::KeyValueStore,
        test_support::env_lock,
        usecases::session::{TOKEN_KEY, USER_KEY},
    };

    struct XdgOverride {
        previous: Option<std::ffi::OsString>,
    }

    impl XdgOverride {
        fn set(path: &Path) -> Self {
            let previous = env::var_os("XDG_CONFIG_HOME");
            // SAFETY: env is guarded by process-wide test mutex.
            unsafe { env::set_var("XDG_CONFIG_HOME", path) };
            Self { previous }
        }
    }

    impl Drop for XdgOverride {
        fn drop(&mut self) {
            match self.previous.take() {
                // SAFETY: restoring env while guard is held.
                Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
                // SAFETY: restoring env while guard is held.
                None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
            }
        }
    }

    #[test]
    fn builds_signed_out_context_with_default_config() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().expect("temp dir");
        let _xdg = XdgOverride::set(dir.path());

        let context =
            build_context(AppConfig::default(), None).expect("context should build from defaults");

        assert_eq!(context.config, AppConfig::default());
        assert!(context.session.current().is_none());
        assert!(!context.connect_realtime());
        assert!(dir.path().join("parley").join("session").is_dir());
    }

    #[test]
    fn discards_malformed_stored_session() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().expect("temp dir");
        let _xdg = XdgOverride::set(dir.path());

        let layout = StorageLayout::resolve().expect("layout");
        layout.ensure_dirs().expect("dirs");
        let store = FileKeyValueStore::from_layout(&layout);
        store.set(TOKEN_KEY, "t0k").expect("set");
        store.set(USER_KEY, "[1, 2").expect("set");

        let context = build_context(AppConfig::default(), None).expect("context");

        assert!(context.session.current().is_none());
        assert_eq!(store.get(TOKEN_KEY).expect("get"), None);
    }
}
