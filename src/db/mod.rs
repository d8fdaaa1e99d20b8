use crate::config::Config;
use anyhow::Context as _;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

mod missions;
mod models;
mod resources;
mod settings;

pub use models::{DemandLevel, Mission, Resource, ResourceRecord};
pub use missions::RosterUpdate;
pub use resources::ReplaceSummary;
pub use settings::{REPORT_CHANNEL_KEY, REPORT_INTERVAL_KEY};

const SCHEMA: &str = include_str!("schema.sql");

/// Shared handle to the SQLite store.
///
/// All four logical tables (resources, settings and report bindings, missions,
/// user settings) live behind the same connection. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let url = config.database_url.as_str();
        if url != ":memory:" {
            if let Some(parent) = Path::new(url).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }
        let conn = Connection::open(url)
            .with_context(|| format!("Failed to open database at {}", url))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Run a synchronous store operation on the blocking pool.
    pub async fn run_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .context("Database task panicked")?
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection mutex poisoned"))
    }
}

/// Discord snowflakes are stored as TEXT, like every other id column.
fn parse_id(raw: &str) -> rusqlite::Result<u64> {
    raw.parse::<u64>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
pub(crate) use missions::mission;
#[cfg(test)]
pub(crate) use resources::record;

#[cfg(test)]
pub(crate) fn test_db() -> Database {
    let config = crate::config::test_config();
    let db = Database::new(&config).unwrap();
    db.execute_init().unwrap();
    db
}
