//! Full configuration validation.
//!
//! Validates numeric ranges and color formats, collecting every problem
//! into a single error.

use crate::schema::TabhostConfig;
use tabhost_common::{Color, ConfigError};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TabhostConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "lifecycle.destroy_debounce_ms",
        config.lifecycle.destroy_debounce_ms,
        0,
        10_000,
    );

    validate_range(
        &mut errors,
        "freeze.capture_timeout_ms",
        config.freeze.capture_timeout_ms,
        1,
        10_000,
    );
    validate_range(
        &mut errors,
        "freeze.hidden_grace_ms",
        config.freeze.hidden_grace_ms,
        0,
        86_400_000,
    );
    validate_range(
        &mut errors,
        "freeze.placeholder_width",
        u64::from(config.freeze.placeholder_width),
        1,
        4096,
    );
    validate_range(
        &mut errors,
        "freeze.placeholder_height",
        u64::from(config.freeze.placeholder_height),
        1,
        4096,
    );
    if Color::from_hex(&config.freeze.placeholder_color).is_none() {
        errors.push(format!(
            "freeze.placeholder_color = {:?} is not a hex color",
            config.freeze.placeholder_color
        ));
    }

    validate_range(
        &mut errors,
        "headless.load_latency_ms",
        config.headless.load_latency_ms,
        0,
        60_000,
    );
    let mut seen = std::collections::HashSet::new();
    for id in &config.headless.windows {
        if !seen.insert(id) {
            errors.push(format!("headless.windows lists window {id} twice"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}
