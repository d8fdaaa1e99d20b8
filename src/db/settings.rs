use super::{parse_id, Database};
use rusqlite::OptionalExtension;
use tracing::debug;

pub const REPORT_CHANNEL_KEY: &str = "report_channel_id";
pub const REPORT_INTERVAL_KEY: &str = "report_interval_minutes";

impl Database {
    // --- Global settings ---

    pub fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            (key, value),
        )?;
        Ok(())
    }

    pub fn report_channel(&self) -> anyhow::Result<Option<u64>> {
        Ok(self
            .get_setting(REPORT_CHANNEL_KEY)?
            .and_then(|raw| raw.parse().ok()))
    }

    pub fn set_report_channel(&self, channel_id: u64) -> anyhow::Result<()> {
        self.set_setting(REPORT_CHANNEL_KEY, &channel_id.to_string())
    }

    pub fn report_interval_minutes(&self) -> anyhow::Result<Option<u64>> {
        Ok(self
            .get_setting(REPORT_INTERVAL_KEY)?
            .and_then(|raw| raw.parse().ok())
            .filter(|minutes: &u64| *minutes > 0))
    }

    pub fn set_report_interval_minutes(&self, minutes: u64) -> anyhow::Result<()> {
        self.set_setting(REPORT_INTERVAL_KEY, &minutes.to_string())
    }

    // --- Report bindings ---

    pub fn get_binding(&self, resource_id: &str) -> anyhow::Result<Option<u64>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT message_id FROM report_bindings WHERE resource_id = ?1",
                [resource_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|id| parse_id(&id)).transpose()?)
    }

    pub fn set_binding(&self, resource_id: &str, message_id: u64) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO report_bindings (resource_id, message_id, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(resource_id) DO UPDATE SET message_id = ?2, updated_at = CURRENT_TIMESTAMP",
            (resource_id, message_id.to_string()),
        )?;
        debug!("Database: bound {} to message {}", resource_id, message_id);
        Ok(())
    }

    /// Returns `true` when a binding existed.
    pub fn remove_binding(&self, resource_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM report_bindings WHERE resource_id = ?1",
            [resource_id],
        )?;
        Ok(removed > 0)
    }

    /// Every binding, whichever resource it names.
    pub fn list_bindings(&self) -> anyhow::Result<Vec<(String, u64)>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT resource_id, message_id FROM report_bindings ORDER BY resource_id")?;
        let rows = stmt.query_map([], |row| {
            let message_id: String = row.get(1)?;
            Ok((row.get(0)?, parse_id(&message_id)?))
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // --- User settings ---

    pub fn set_user_timezone(&self, user_id: u64, timezone: &str) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_settings (user_id, timezone, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id) DO UPDATE SET timezone = ?2, updated_at = CURRENT_TIMESTAMP",
            (user_id.to_string(), timezone),
        )?;
        Ok(())
    }

    pub fn get_user_timezone(&self, user_id: u64) -> anyhow::Result<Option<String>> {
        let conn = self.conn()?;
        let timezone = conn
            .query_row(
                "SELECT timezone FROM user_settings WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(timezone)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;

    #[test]
    fn test_settings_upsert() {
        let db = test_db();
        assert_eq!(db.get_setting("missing").unwrap(), None);

        db.set_setting("color", "orange").unwrap();
        db.set_setting("color", "dark_orange").unwrap();
        assert_eq!(db.get_setting("color").unwrap().as_deref(), Some("dark_orange"));
    }

    #[test]
    fn test_report_settings() {
        let db = test_db();
        assert_eq!(db.report_channel().unwrap(), None);
        assert_eq!(db.report_interval_minutes().unwrap(), None);

        db.set_report_channel(1234567890123).unwrap();
        db.set_report_interval_minutes(45).unwrap();
        assert_eq!(db.report_channel().unwrap(), Some(1234567890123));
        assert_eq!(db.report_interval_minutes().unwrap(), Some(45));

        db.set_setting(super::REPORT_INTERVAL_KEY, "0").unwrap();
        assert_eq!(db.report_interval_minutes().unwrap(), None);
    }

    #[test]
    fn test_bindings() {
        let db = test_db();
        assert_eq!(db.get_binding("spice").unwrap(), None);

        db.set_binding("spice", 111).unwrap();
        db.set_binding("water", 222).unwrap();
        db.set_binding("spice", 333).unwrap();

        assert_eq!(db.get_binding("spice").unwrap(), Some(333));
        assert_eq!(
            db.list_bindings().unwrap(),
            vec![("spice".to_string(), 333), ("water".to_string(), 222)]
        );

        assert!(db.remove_binding("spice").unwrap());
        assert!(!db.remove_binding("spice").unwrap());
        assert_eq!(db.list_bindings().unwrap().len(), 1);
    }

    #[test]
    fn test_user_timezone() {
        let db = test_db();
        assert_eq!(db.get_user_timezone(42).unwrap(), None);
        db.set_user_timezone(42, "Europe/Berlin").unwrap();
        db.set_user_timezone(42, "America/New_York").unwrap();
        assert_eq!(
            db.get_user_timezone(42).unwrap().as_deref(),
            Some("America/New_York")
        );
    }
}
