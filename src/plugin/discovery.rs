//! Locating plugin binaries.

use std::env;
use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};

use super::{BINARY_PREFIX, PluginError};

/// File name of the plugin serving `driver` on this platform.
#[must_use]
pub fn binary_name(driver: &str) -> String {
    format!("{BINARY_PREFIX}{driver}{}", env::consts::EXE_SUFFIX)
}

/// Ordered list of directories searched for plugin binaries: an explicit
/// plugin directory, then the directory of the running executable, then
/// every `PATH` entry.
#[derive(Clone, Debug, Default)]
pub struct PluginSearch {
    dirs: Vec<Utf8PathBuf>,
}

impl PluginSearch {
    /// Search path used by the CLI.
    #[must_use]
    pub fn standard(plugin_dir: Option<&Utf8Path>) -> Self {
        let mut dirs = Vec::new();
        dirs.extend(plugin_dir.map(Utf8Path::to_path_buf));
        if let Some(exe_dir) = current_exe_dir() {
            dirs.push(exe_dir);
        }
        dirs.extend(path_dirs(env::var_os("PATH")));
        Self { dirs }
    }

    /// Search path made only of `dirs`.
    #[must_use]
    pub const fn from_dirs(dirs: Vec<Utf8PathBuf>) -> Self {
        Self { dirs }
    }

    /// Directories in search order.
    #[must_use]
    pub fn dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    /// Returns the first existing binary for `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] when no directory holds it.
    pub fn find(&self, driver: &str) -> Result<Utf8PathBuf, PluginError> {
        let name = binary_name(driver);
        self.dirs
            .iter()
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| PluginError::NotFound {
                driver: driver.to_owned(),
            })
    }
}

fn current_exe_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let utf8 = Utf8PathBuf::from_path_buf(exe).ok()?;
    utf8.parent().map(Utf8Path::to_path_buf)
}

fn path_dirs(path: Option<OsString>) -> Vec<Utf8PathBuf> {
    path.map(|raw| {
        env::split_paths(&raw)
            .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .filter(|dir| !dir.as_str().is_empty())
            .collect()
    })
    .unwrap_or_default()
}
