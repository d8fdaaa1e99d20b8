pub mod channel;
pub mod commands;
pub mod config;
pub mod db;
pub mod interactions;
pub mod mission;
pub mod overrides;
pub mod render;
pub mod report;
pub mod scheduler;
pub mod sheet;

use std::time::Duration;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub http_client: reqwest::Client,
    pub db: db::Database,
}

impl Data {
    pub fn sheet_importer(&self) -> sheet::SheetImporter {
        sheet::SheetImporter::new(
            self.http_client.clone(),
            self.config.sheet_url.clone(),
            Duration::from_secs(self.config.sheet_timeout_secs),
        )
    }
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type ApplicationContext<'a> = poise::ApplicationContext<'a, Data, Error>;
