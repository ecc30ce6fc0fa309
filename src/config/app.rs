use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReminderError, Result};

/// Process configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Clan document (settings + members)
    pub data_path: PathBuf,

    /// Port of the key helper endpoint
    pub http_port: u16,

    /// Period of the reminder tick
    pub reminder_interval: Duration,

    /// Zone the clan schedules are written in
    pub timezone: Tz,

    /// Upper bound on a single webhook call
    pub webhook_timeout: Duration,

    /// Sender name shown on webhook messages
    pub webhook_username: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/clan.json"),
            http_port: 8080,
            reminder_interval: Duration::from_secs(15 * 60),
            timezone: chrono_tz::Europe::Berlin,
            webhook_timeout: Duration::from_secs(10),
            webhook_username: "Boss Key Reminder".to_string(),
        }
    }
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let timezone = match lookup("REMINDER_TIMEZONE") {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|e| ReminderError::ConfigValidation {
                    message: format!("REMINDER_TIMEZONE '{}': {}", name, e),
                })?,
            None => defaults.timezone,
        };

        let interval_secs = parse_or(&lookup, "REMINDER_INTERVAL_SECS", 15 * 60)?;
        if interval_secs == 0 {
            return Err(ReminderError::ConfigValidation {
                message: "REMINDER_INTERVAL_SECS must be greater than zero".to_string(),
            });
        }

        let timeout_secs = parse_or(&lookup, "WEBHOOK_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ReminderError::ConfigValidation {
                message: "WEBHOOK_TIMEOUT_SECS must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            data_path: lookup("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            http_port: parse_or(&lookup, "HTTP_PORT", defaults.http_port)?,
            reminder_interval: Duration::from_secs(interval_secs),
            timezone,
            webhook_timeout: Duration::from_secs(timeout_secs),
            webhook_username: lookup("WEBHOOK_USERNAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.webhook_username),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ReminderError::ConfigValidation {
                message: format!("{} '{}': {}", key, raw, e),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.reminder_interval, Duration::from_secs(900));
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.webhook_username, "Boss Key Reminder");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATA_PATH", "/srv/clan.json"),
            ("HTTP_PORT", "9000"),
            ("REMINDER_TIMEZONE", "America/New_York"),
            ("REMINDER_INTERVAL_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.data_path, PathBuf::from("/srv/clan.json"));
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.reminder_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("REMINDER_TIMEZONE", "Mars/Olympus")]),
            Err(ReminderError::ConfigValidation { .. })
        ));
        assert!(matches!(
            config_from(&[("REMINDER_INTERVAL_SECS", "0")]),
            Err(ReminderError::ConfigValidation { .. })
        ));
        assert!(matches!(
            config_from(&[("HTTP_PORT", "eighty")]),
            Err(ReminderError::ConfigValidation { .. })
        ));
    }
}
