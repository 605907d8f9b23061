use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::infra::error::AppError;

const APP_DIR_NAME: &str = "parley";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub config_dir: PathBuf,
    pub session_dir: PathBuf,
}

impl StorageLayout {
    pub fn resolve() -> Result<Self, AppError> {
        let config_base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .ok_or_else(|| AppError::StoragePathResolution {
                details: "unable to resolve config base directory (XDG_CONFIG_HOME/HOME)".into(),
            })?;

        Ok(Self::under(&config_base))
    }

    pub fn under(config_base: &Path) -> Self {
        let config_dir = config_base.join(APP_DIR_NAME);
        let session_dir = config_dir.join("session");

        Self {
            config_dir,
            session_dir,
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        for dir in [&self.config_dir, &self.session_dir] {
            fs::create_dir_all(dir).map_err(|source| AppError::StorageDirCreate {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(())
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_dir.join("session.json")
    }

    pub fn session_lock_file(&self) -> PathBuf {
        self.session_dir.join("session.lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn session_dir_is_under_config_dir() {
        let layout = StorageLayout::under(Path::new("/tmp/xdg"));

        assert_eq!(layout.config_dir, PathBuf::from("/tmp/xdg/parley"));
        assert!(layout.session_dir.starts_with(&layout.config_dir));
        assert!(layout.session_file().starts_with(&layout.session_dir));
    }

    #[test]
    fn resolve_prefers_xdg_config_home() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().expect("temp dir");
        let old_xdg = env::var_os("XDG_CONFIG_HOME");
        env::set_var("XDG_CONFIG_HOME", dir.path());

        let layout = StorageLayout::resolve().expect("layout should resolve");

        match old_xdg {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(layout.config_dir, dir.path().join("parley"));
    }

    #[test]
    fn ensure_dirs_creates_session_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = StorageLayout::under(dir.path());

        layout.ensure_dirs().expect("dirs should be created");

        assert!(layout.session_dir.is_dir());
    }
}
