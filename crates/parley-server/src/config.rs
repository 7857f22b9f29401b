use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use parley_api::Settings;
use parley_api::state::ChatHours;

/// Secrets that ship in samples and must never guard a real deployment.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Unset and empty values
    /// fall back to defaults; malformed ones are errors naming the variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let rate_limit: usize = parse_or(&get, "PARLEY_RATE_LIMIT", defaults.rate_limit)?;
        if rate_limit == 0 {
            anyhow::bail!("PARLEY_RATE_LIMIT must be at least 1");
        }
        let rate_window_secs: u64 = parse_or(&get, "PARLEY_RATE_WINDOW_SECS", 60)?;
        if rate_window_secs == 0 {
            anyhow::bail!("PARLEY_RATE_WINDOW_SECS must be at least 1");
        }

        let chat_hours = get("PARLEY_CHAT_HOURS")
            .map(|v| v.parse::<ChatHours>().with_context(|| format!("invalid PARLEY_CHAT_HOURS '{}'", v)))
            .transpose()?;

        let admin_emails = get("PARLEY_ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PARLEY_PORT", 3000)?,
            db_path: get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()).into(),
            settings: Settings {
                jwt_secret: get("PARLEY_JWT_SECRET").unwrap_or(defaults.jwt_secret),
                rate_limit,
                rate_window: Duration::from_secs(rate_window_secs),
                chat_hours,
                request_log: get("PARLEY_REQUEST_LOG").map(PathBuf::from),
                admin_emails,
            },
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.settings.jwt_secret.as_str())
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(v) => v.parse().with_context(|| format!("invalid {} '{}'", key, v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("parley.db"));
        assert_eq!(cfg.settings.rate_limit, 5);
        assert_eq!(cfg.settings.rate_window, Duration::from_secs(60));
        assert!(cfg.settings.chat_hours.is_none());
        assert!(cfg.settings.request_log.is_none());
        assert!(cfg.uses_placeholder_secret());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("PARLEY_HOST", "127.0.0.1"),
            ("PARLEY_PORT", "8080"),
            ("PARLEY_DB_PATH", "/var/lib/parley.db"),
            ("PARLEY_JWT_SECRET", "s3cret"),
            ("PARLEY_RATE_LIMIT", "10"),
            ("PARLEY_RATE_WINDOW_SECS", "30"),
            ("PARLEY_CHAT_HOURS", "18-21"),
            ("PARLEY_REQUEST_LOG", "requests.log"),
            ("PARLEY_ADMIN_EMAILS", " Root@Example.com, ,ops@example.com"),
        ])
        .unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.settings.rate_limit, 10);
        assert_eq!(cfg.settings.rate_window, Duration::from_secs(30));
        assert_eq!(cfg.settings.chat_hours, Some(ChatHours { start: 18, end: 21 }));
        assert_eq!(cfg.settings.request_log, Some(PathBuf::from("requests.log")));
        assert_eq!(cfg.settings.admin_emails, vec!["root@example.com", "ops@example.com"]);
        assert!(!cfg.uses_placeholder_secret());
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = config(&[("PARLEY_PORT", "eighty")]).unwrap_err();
        assert!(format!("{:#}", err).contains("PARLEY_PORT"));

        let err = config(&[("PARLEY_CHAT_HOURS", "evening")]).unwrap_err();
        assert!(format!("{:#}", err).contains("PARLEY_CHAT_HOURS"));

        let err = config(&[("PARLEY_RATE_WINDOW_SECS", "0")]).unwrap_err();
        assert!(format!("{:#}", err).contains("PARLEY_RATE_WINDOW_SECS"));

        let err = config(&[("PARLEY_RATE_LIMIT", "0")]).unwrap_err();
        assert!(format!("{:#}", err).contains("PARLEY_RATE_LIMIT"));
    }
}
