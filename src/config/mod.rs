//! Configuration management for vmsg.
//!
//! Loads and saves the TOML configuration file holding the widget's recording
//! limit and format preferences, the input device, and the playback command.

pub mod file;

pub use file::{get_config_path, AudioConfig, PlaybackConfig, VmsgConfig, WidgetConfig};
