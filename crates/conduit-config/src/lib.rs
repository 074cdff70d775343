//! Configuration for conduit.
//!
//! TOML files layered as user config (`~/.config/conduit/config.toml`, or
//! `$CONDUIT_CONFIG_DIR/config.toml`) then project-local `./conduit.toml`.
//! Every section is optional; accessors on [`ConduitConfig`] fill in defaults.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, config_dir, load_config, load_config_file, load_config_with_options,
    save_config,
};
pub use error::{ConfigError, Result};
pub use types::*;
