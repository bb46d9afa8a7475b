//! Settings for the application, read from `settings.toml`.

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level for the tracing env filter (`trace` .. `error`).
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub database: Database,
}

/// The group the process operates on. Created on startup if missing.
#[derive(Debug, Deserialize)]
pub struct Group {
    pub user: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub store: Store,
    pub group: Group,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .build()?;

        settings.try_deserialize()
    }
}
