//! Configuration module for dtspec.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, GenerationSettings, LoggingSettings, PathSettings, SelectionSettings,
    Settings, SettingsError,
};
