//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\cough-screen\
//!   macOS:   ~/Library/Application Support/cough-screen/
//!   Linux:   ~/.config/cough-screen/
//!
//! Data dir (model artifacts):
//!   Windows: %LOCALAPPDATA%\cough-screen\
//!   macOS:   ~/Library/Application Support/cough-screen/
//!   Linux:   ~/.local/share/cough-screen/

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding scaler and model artifacts.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "cough-screen";

    /// Platform locations from `dirs`, or the current directory where the
    /// platform has none.
    pub fn new() -> Self {
        let here = || PathBuf::from(".");
        Self::resolve(
            &dirs::config_dir().unwrap_or_else(here),
            &dirs::data_local_dir().unwrap_or_else(here),
        )
    }

    /// Same layout rooted at `root`, for hosts that ship settings and model
    /// artifacts together.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::resolve(root, root)
    }

    fn resolve(config_base: &Path, data_base: &Path) -> Self {
        let config_dir = config_base.join(Self::APP_NAME);
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_base.join(Self::APP_NAME).join("models"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
