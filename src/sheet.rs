//! Pulls the resource catalogue from a published spreadsheet (CSV export).
//!
//! A failed or empty pull never touches the local store.

use crate::db::{Database, ReplaceSummary, ResourceRecord};
use anyhow::Context as _;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Tier", default)]
    tier: String,
    #[serde(rename = "Details", default)]
    details: String,
    #[serde(rename = "ImageURL", default)]
    image_url: String,
    #[serde(rename = "dgtSlug", default)]
    link: String,
}

impl SheetRow {
    fn into_record(self) -> Option<ResourceRecord> {
        let id = ResourceRecord::id_for_name(&self.name);
        if id.is_empty() {
            return None;
        }
        let tier = if !self.tier.is_empty() && self.tier.chars().all(|c| c.is_ascii_digit()) {
            self.tier.parse().unwrap_or(0)
        } else {
            0
        };
        Some(ResourceRecord {
            id,
            name: self.name,
            kind: self.kind,
            tier,
            details: self.details,
            image_url: self.image_url,
            link: self.link,
        })
    }
}

/// Parse a CSV export into resource records. Rows without a name are skipped.
pub fn parse_rows(csv_text: &str) -> anyhow::Result<Vec<ResourceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut records = Vec::new();
    for row in reader.deserialize::<SheetRow>() {
        let row = row.context("Malformed sheet row")?;
        if let Some(record) = row.into_record() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Result of an import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No sheet URL configured.
    Skipped,
    /// The sheet could not be fetched or parsed; local data kept.
    Failed,
    /// The sheet had no usable rows; local data kept.
    Empty,
    Synced(ReplaceSummary),
}

#[derive(Clone)]
pub struct SheetImporter {
    http_client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl SheetImporter {
    pub fn new(http_client: reqwest::Client, url: Option<String>, timeout: Duration) -> Self {
        Self {
            http_client,
            url,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Fetch and parse every row of the sheet.
    pub async fn fetch_rows(&self) -> anyhow::Result<Vec<ResourceRecord>> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No sheet URL configured"))?;

        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("Sheet request failed")?
            .error_for_status()
            .context("Sheet returned an error status")?;
        let body = response.text().await.context("Failed to read sheet body")?;

        parse_rows(&body)
    }

    /// Pull the sheet and replace the local catalogue, keeping demand levels.
    /// Never returns an error: every failure leaves the store untouched.
    pub async fn sync(&self, db: &Database) -> SyncOutcome {
        if !self.is_configured() {
            warn!("Sheet sync skipped: GOOGLE_SHEET_URL is not set");
            return SyncOutcome::Skipped;
        }

        info!("Syncing resources from sheet...");
        let records = match self.fetch_rows().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Sheet sync failed: {:#}. Using local data.", e);
                return SyncOutcome::Failed;
            }
        };

        if records.is_empty() {
            warn!("Sheet returned no usable rows. Local data unchanged.");
            return SyncOutcome::Empty;
        }

        info!("Fetched {} rows from sheet", records.len());
        match db.run_blocking(move |db| db.replace_resources(&records)).await {
            Ok(summary) => SyncOutcome::Synced(summary),
            Err(e) => {
                warn!("Failed to store sheet rows: {:#}. Using local data.", e);
                SyncOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{record, test_db, DemandLevel};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SHEET: &str = "Name,Type,Tier,Details,ImageURL,dgtSlug\n\
Spice,Commodity,1,\"Melange, the spice\",http://img/spice.png,https://db/spice\n\
Jasmium Crystal,Resources,five,Sparkling.,,\n\
,Resources,2,Nameless row,,\n\
Water: Purified,Resources,3,,,\n";

    fn importer(server: &MockServer, timeout: Duration) -> SheetImporter {
        SheetImporter::new(
            reqwest::Client::new(),
            Some(format!("{}/sheet.csv", server.uri())),
            timeout,
        )
    }

    #[test]
    fn test_parse_rows() {
        let records = parse_rows(SHEET).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["spice", "jasmium_crystal", "water_purified"]);

        assert_eq!(records[0].details, "Melange, the spice");
        assert_eq!(records[0].tier, 1);
        assert_eq!(records[0].link, "https://db/spice");
        assert_eq!(records[1].tier, 0);
        assert_eq!(records[2].name, "Water: Purified");
    }

    #[test]
    fn test_parse_rows_missing_columns() {
        let records = parse_rows("Name\nSpice\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tier, 0);
        assert_eq!(records[0].kind, "");
    }

    #[tokio::test]
    async fn test_sync_preserves_demand() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SHEET))
            .mount(&server)
            .await;

        let db = test_db();
        db.replace_resources(&[record("Spice", 1)])?;
        db.set_demand("spice", DemandLevel::High)?;

        let outcome = importer(&server, Duration::from_secs(5)).sync(&db).await;
        let SyncOutcome::Synced(summary) = outcome else {
            panic!("expected a sync, got {:?}", outcome);
        };
        assert_eq!(summary.total, 3);
        assert_eq!(summary.preserved, 1);

        assert_eq!(db.get_resource("spice")?.unwrap().demand, DemandLevel::High);
        assert_eq!(
            db.get_resource("jasmium_crystal")?.unwrap().demand,
            DemandLevel::Low
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_error_status_keeps_store() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.csv"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let db = test_db();
        db.replace_resources(&[record("Spice", 1), record("Water", 2)])?;

        let outcome = importer(&server, Duration::from_secs(5)).sync(&db).await;
        assert_eq!(outcome, SyncOutcome::Failed);
        assert_eq!(db.get_all_resources()?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_empty_sheet_keeps_store() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.csv"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("Name,Type,Tier\n,Resources,1\n"),
            )
            .mount(&server)
            .await;

        let db = test_db();
        db.replace_resources(&[record("Spice", 1)])?;
        let before = db.get_all_resources()?;

        let outcome = importer(&server, Duration::from_secs(5)).sync(&db).await;
        assert_eq!(outcome, SyncOutcome::Empty);
        assert_eq!(db.get_all_resources()?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_timeout_keeps_store() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SHEET)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let db = test_db();
        db.replace_resources(&[record("Spice", 1)])?;

        let outcome = importer(&server, Duration::from_millis(200)).sync(&db).await;
        assert_eq!(outcome, SyncOutcome::Failed);
        assert_eq!(db.get_all_resources()?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_without_url_is_skipped() {
        let importer = SheetImporter::new(reqwest::Client::new(), None, Duration::from_secs(1));
        assert_eq!(importer.sync(&test_db()).await, SyncOutcome::Skipped);
    }
}
