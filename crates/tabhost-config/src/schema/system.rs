//! Logging configuration types.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `tracing_subscriber::EnvFilter` directive scoped to the tabhost crates.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "tabhost=trace",
            LogLevel::Debug => "tabhost=debug",
            LogLevel::Info => "tabhost=info",
            LogLevel::Warn => "tabhost=warn",
            LogLevel::Error => "tabhost=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
