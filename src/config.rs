use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub sheet_url: Option<String>,
    pub sheet_timeout_secs: u64,
    pub status_message: String,
    pub dev_guild_id: Option<u64>,

    // Demand report loop
    pub report_interval_minutes: u64,

    // Mission cleanup sweep
    pub mission_sweep_interval_secs: u64,
    pub mission_grace_hours: i64,
}

pub const DEFAULT_REPORT_INTERVAL_MINUTES: u64 = 30;
pub const DEFAULT_MISSION_GRACE_HOURS: i64 = 4;

/// A grace window must be positive and representable as a time delta.
pub fn valid_grace_hours(hours: i64) -> bool {
    hours > 0 && chrono::TimeDelta::try_hours(hours).is_some()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/mentat.db".to_string()),
            sheet_url: env::var("GOOGLE_SHEET_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            sheet_timeout_secs: env::var("SHEET_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Calculating demand…".to_string()),
            dev_guild_id: env::var("DEV_GUILD_ID").ok().and_then(|id| id.parse().ok()),
            report_interval_minutes: env::var("REPORT_INTERVAL_MINUTES")
                .unwrap_or_else(|_| DEFAULT_REPORT_INTERVAL_MINUTES.to_string())
                .parse()
                .ok()
                .filter(|minutes| *minutes > 0)
                .unwrap_or(DEFAULT_REPORT_INTERVAL_MINUTES),
            mission_sweep_interval_secs: env::var("MISSION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            mission_grace_hours: env::var("MISSION_GRACE_HOURS")
                .ok()
                .and_then(|hours| hours.parse().ok())
                .filter(|hours| valid_grace_hours(*hours))
                .unwrap_or(DEFAULT_MISSION_GRACE_HOURS),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("sheet_url", &self.sheet_url.as_ref().map(|_| "[REDACTED]"))
            .field("sheet_timeout_secs", &self.sheet_timeout_secs)
            .field("status_message", &self.status_message)
            .field("dev_guild_id", &self.dev_guild_id)
            .field("report_interval_minutes", &self.report_interval_minutes)
            .field(
                "mission_sweep_interval_secs",
                &self.mission_sweep_interval_secs,
            )
            .field("mission_grace_hours", &self.mission_grace_hours)
            .finish()
    }
}

/// Discord allows at most 25 autocomplete suggestions
pub const AUTOCOMPLETE_LIMIT: usize = 25;

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        discord_token: "test".to_string(),
        database_url: ":memory:".to_string(),
        sheet_url: None,
        sheet_timeout_secs: 15,
        status_message: "test".to_string(),
        dev_guild_id: None,
        report_interval_minutes: DEFAULT_REPORT_INTERVAL_MINUTES,
        mission_sweep_interval_secs: 3600,
        mission_grace_hours: DEFAULT_MISSION_GRACE_HOURS,
    }
}
