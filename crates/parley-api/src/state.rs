use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parley_db::Database;

use crate::error::ApiError;
use crate::rate_limit::SlidingWindowLimiter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
    pub limiter: SlidingWindowLimiter,
}

impl AppStateInner {
    pub fn new(db: Database, settings: Settings) -> AppState {
        let limiter = SlidingWindowLimiter::new(settings.rate_limit, settings.rate_window);
        Arc::new(Self { db, settings, limiter })
    }
}

/// Runtime knobs shared by handlers and middleware.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    /// Accepted POST requests per client within `rate_window`.
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub chat_hours: Option<ChatHours>,
    pub request_log: Option<PathBuf>,
    /// Lowercased emails that register with the admin role.
    pub admin_emails: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".into(),
            rate_limit: 5,
            rate_window: Duration::from_secs(60),
            chat_hours: None,
            request_log: None,
            admin_emails: Vec::new(),
        }
    }
}

/// Hours of the day, `[start, end)` in local time, during which chat routes
/// are open. A range with `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatHours {
    pub start: u32,
    pub end: u32,
}

impl ChatHours {
    pub fn is_open_at(&self, hour: u32) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            (self.start..self.end).contains(&hour)
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

impl FromStr for ChatHours {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("expected START-END, got '{}'", s))?;
        let start: u32 = start.trim().parse()?;
        let end: u32 = end.trim().parse()?;
        if start > 23 || end > 24 {
            anyhow::bail!("hours out of range in '{}'", s);
        }
        Ok(Self { start, end: end % 24 })
    }
}

/// Runs a blocking database call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let value = tokio::task::spawn_blocking(move || f(&state.db)).await??;
    Ok(value)
}
