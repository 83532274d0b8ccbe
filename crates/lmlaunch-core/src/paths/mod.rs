//! Path resolution and settings persistence.

mod config;
mod error;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{
    CONFIG_ENV_VAR, MODEL_DIR_ENV_VAR, config_path, load_settings, resolve_model_dir,
    save_settings,
};
pub use error::PathError;
