//! `env_logger` bootstrap for hosts embedding the crate.
//!
//! `RUST_LOG` wins when set; otherwise `default_filter` applies, e.g.
//! `"info"` or `"cough_screen=debug"`.

use env_logger::{Builder, Env};

/// Install the global logger. Panics if a logger is already installed,
/// so call it once from `main`.
pub fn init(default_filter: &str) {
    Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    log::info!("cough-screen {} logging initialised", env!("CARGO_PKG_VERSION"));
}

/// Like [`init`], but returns `false` instead of panicking when a logger is
/// already installed. Safe to call from every test.
pub fn try_init(default_filter: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .is_test(cfg!(test))
        .try_init()
        .is_ok()
}
