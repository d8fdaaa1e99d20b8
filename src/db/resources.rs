use super::{Database, DemandLevel, Resource, ResourceRecord};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const RESOURCE_COLUMNS: &str = "id, name, kind, tier, details, image_url, link, demand";

/// Outcome of a bulk resource replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    /// Distinct resources in the store after the import.
    pub total: usize,
    /// Resources that kept a demand level from before the import.
    pub preserved: usize,
    pub added: usize,
    pub removed: usize,
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    let demand: String = row.get(7)?;
    Ok(Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        tier: row.get(3)?,
        details: row.get(4)?,
        image_url: row.get(5)?,
        link: row.get(6)?,
        // Unknown values can only come from manual edits; treat them as not displayed.
        demand: demand.parse().unwrap_or(DemandLevel::Low),
    })
}

impl Database {
    /// Returns `false` when no resource has this id.
    pub fn set_demand(&self, resource_id: &str, level: DemandLevel) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE resources SET demand = ?1 WHERE id = ?2",
            (level.as_str(), resource_id),
        )?;
        debug!("Database: demand for {} set to {} ({} rows)", resource_id, level, updated);
        Ok(updated > 0)
    }

    pub fn get_resource(&self, resource_id: &str) -> anyhow::Result<Option<Resource>> {
        let conn = self.conn()?;
        let resource = conn
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"),
                [resource_id],
                resource_from_row,
            )
            .optional()?;
        Ok(resource)
    }

    /// Display-name lookup (case-insensitive), as offered by the autocomplete.
    pub fn get_resource_by_name(&self, name: &str) -> anyhow::Result<Option<Resource>> {
        let conn = self.conn()?;
        let resource = conn
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE name = ?1 COLLATE NOCASE LIMIT 1"),
                [name],
                resource_from_row,
            )
            .optional()?;
        Ok(resource)
    }

    /// Resources whose demand is one of `levels`. Order is unspecified.
    pub fn get_by_demand(&self, levels: &[DemandLevel]) -> anyhow::Result<Vec<Resource>> {
        if levels.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let placeholders = vec!["?"; levels.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE demand IN ({placeholders})"
        ))?;
        let names: Vec<&str> = levels.iter().map(|l| l.as_str()).collect();
        let rows = stmt.query_map(rusqlite::params_from_iter(names), resource_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn get_all_resources(&self) -> anyhow::Result<Vec<Resource>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {RESOURCE_COLUMNS} FROM resources"))?;
        let rows = stmt.query_map([], resource_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Replace the whole resource table with `records` in one transaction.
    ///
    /// Demand survives for every id that existed before; new ids start at
    /// `low`. When an id repeats within `records` the later row's content wins.
    /// An empty `records` leaves the table untouched.
    pub fn replace_resources(&self, records: &[ResourceRecord]) -> anyhow::Result<ReplaceSummary> {
        if records.is_empty() {
            return Ok(ReplaceSummary {
                total: self.get_all_resources()?.len(),
                ..Default::default()
            });
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: HashMap<String, DemandLevel> = {
            let mut stmt = tx.prepare("SELECT id, demand FROM resources")?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                let demand: String = row.get(1)?;
                Ok((id, demand.parse().unwrap_or(DemandLevel::Low)))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (id, demand) = row?;
                map.insert(id, demand);
            }
            map
        };

        tx.execute("DELETE FROM resources", [])?;

        let mut seen = HashSet::new();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO resources (id, name, kind, tier, details, image_url, link, demand)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    kind = excluded.kind,
                    tier = excluded.tier,
                    details = excluded.details,
                    image_url = excluded.image_url,
                    link = excluded.link",
            )?;
            for record in records {
                let demand = existing
                    .get(&record.id)
                    .copied()
                    .unwrap_or(DemandLevel::Low);
                stmt.execute(params![
                    record.id,
                    record.name,
                    record.kind,
                    record.tier,
                    record.details,
                    record.image_url,
                    record.link,
                    demand.as_str(),
                ])?;
                seen.insert(record.id.as_str());
            }
        }

        tx.commit()?;

        let preserved = seen.iter().filter(|id| existing.contains_key(**id)).count();
        let summary = ReplaceSummary {
            total: seen.len(),
            preserved,
            added: seen.len() - preserved,
            removed: existing.keys().filter(|id| !seen.contains(id.as_str())).count(),
        };
        info!(
            "Database: replaced resources ({} total, {} preserved, {} added, {} removed)",
            summary.total, summary.preserved, summary.added, summary.removed
        );
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) fn record(name: &str, tier: i64) -> ResourceRecord {
    ResourceRecord {
        id: ResourceRecord::id_for_name(name),
        name: name.to_string(),
        kind: "Resources".to_string(),
        tier,
        details: format!("{} details", name),
        image_url: String::new(),
        link: "https://example.com".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn test_set_demand_unknown_id() {
        let db = test_db();
        assert!(!db.set_demand("ghost", DemandLevel::High).unwrap());
        assert!(db.get_resource("ghost").unwrap().is_none());
    }

    #[test]
    fn test_replace_defaults_to_low_and_filters_by_demand() {
        let db = test_db();
        db.replace_resources(&[record("Spice", 1), record("Water", 2), record("Sand", 0)])
            .unwrap();

        assert!(db.get_by_demand(&DemandLevel::DISPLAYED).unwrap().is_empty());

        assert!(db.set_demand("spice", DemandLevel::High).unwrap());
        assert!(db.set_demand("water", DemandLevel::Medium).unwrap());

        let mut ids: Vec<String> = db
            .get_by_demand(&DemandLevel::DISPLAYED)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["spice", "water"]);
        assert_eq!(db.get_by_demand(&[DemandLevel::Low]).unwrap().len(), 1);
        assert!(db.get_by_demand(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_reimport_preserves_demand() {
        let db = test_db();
        db.replace_resources(&[record("Spice", 1), record("Water", 2)]).unwrap();
        db.set_demand("spice", DemandLevel::High).unwrap();

        let mut updated = record("Spice", 3);
        updated.details = "Refreshed".to_string();
        let summary = db
            .replace_resources(&[updated, record("Plastanium", 4)])
            .unwrap();

        assert_eq!(
            summary,
            ReplaceSummary {
                total: 2,
                preserved: 1,
                added: 1,
                removed: 1
            }
        );

        let spice = db.get_resource("spice").unwrap().unwrap();
        assert_eq!(spice.demand, DemandLevel::High);
        assert_eq!(spice.tier, 3);
        assert_eq!(spice.details, "Refreshed");
        assert_eq!(
            db.get_resource("plastanium").unwrap().unwrap().demand,
            DemandLevel::Low
        );
        assert!(db.get_resource("water").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_ids_later_content_wins_demand_kept() {
        let db = test_db();
        db.replace_resources(&[record("Spice", 1)]).unwrap();
        db.set_demand("spice", DemandLevel::Medium).unwrap();

        let mut first = record("Spice", 1);
        first.details = "first".to_string();
        let mut second = record("Spice", 5);
        second.details = "second".to_string();
        let summary = db.replace_resources(&[first, second]).unwrap();
        assert_eq!(summary.total, 1);

        let spice = db.get_resource("spice").unwrap().unwrap();
        assert_eq!(spice.details, "second");
        assert_eq!(spice.tier, 5);
        assert_eq!(spice.demand, DemandLevel::Medium);
        assert_eq!(db.get_all_resources().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_import_leaves_store_untouched() {
        let db = test_db();
        db.replace_resources(&[record("Spice", 1), record("Water", 2)]).unwrap();
        db.set_demand("water", DemandLevel::High).unwrap();
        let before = db.get_all_resources().unwrap();

        let summary = db.replace_resources(&[]).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.added + summary.removed + summary.preserved, 0);

        let after = db.get_all_resources().unwrap();
        assert_eq!(before.len(), after.len());
        for resource in before {
            assert!(after.contains(&resource));
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let db = test_db();
        db.replace_resources(&[record("Jasmium Crystal", 5)]).unwrap();
        let found = db.get_resource_by_name("Jasmium Crystal").unwrap().unwrap();
        assert_eq!(found.id, "jasmium_crystal");
        assert!(db.get_resource_by_name("jasmium").unwrap().is_none());
    }
}
