use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Tri-state demand classification of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, poise::ChoiceParameter)]
pub enum DemandLevel {
    #[name = "high"]
    High,
    #[name = "medium"]
    Medium,
    #[name = "low"]
    Low,
}

impl DemandLevel {
    /// Levels that earn a live report message.
    pub const DISPLAYED: [DemandLevel; 2] = [DemandLevel::High, DemandLevel::Medium];

    pub fn as_str(&self) -> &'static str {
        match self {
            DemandLevel::High => "high",
            DemandLevel::Medium => "medium",
            DemandLevel::Low => "low",
        }
    }

    /// Capitalised form used in rendered reports ("High").
    pub fn label(&self) -> &'static str {
        match self {
            DemandLevel::High => "High",
            DemandLevel::Medium => "Medium",
            DemandLevel::Low => "Low",
        }
    }

    pub fn is_displayed(&self) -> bool {
        !matches!(self, DemandLevel::Low)
    }
}

impl fmt::Display for DemandLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemandLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(DemandLevel::High),
            "medium" => Ok(DemandLevel::Medium),
            "low" => Ok(DemandLevel::Low),
            other => Err(anyhow::anyhow!("Unknown demand level '{}'", other)),
        }
    }
}

/// A tracked resource as stored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub tier: i64,
    pub details: String,
    pub image_url: String,
    pub link: String,
    pub demand: DemandLevel,
}

/// Content fields of a resource as produced by the sheet importer.
/// Demand is decided by the store, never by the import.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub tier: i64,
    pub details: String,
    pub image_url: String,
    pub link: String,
}

/// Longest resource id; the id must fit inside a select menu custom id.
pub const MAX_RESOURCE_ID_CHARS: usize = 90;

impl ResourceRecord {
    /// Stable identifier derived from a display name: lowercase, spaces to
    /// underscores, colons dropped, capped at [`MAX_RESOURCE_ID_CHARS`].
    pub fn id_for_name(name: &str) -> String {
        name.to_lowercase()
            .replace(' ', "_")
            .replace(':', "")
            .chars()
            .take(MAX_RESOURCE_ID_CHARS)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    pub id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub creator_id: u64,
    pub details: String,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    pub participants: Vec<u64>,
}

impl Mission {
    pub fn has_participant(&self, user_id: u64) -> bool {
        self.participants.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_level_parse() {
        assert_eq!("High".parse::<DemandLevel>().unwrap(), DemandLevel::High);
        assert_eq!(" medium ".parse::<DemandLevel>().unwrap(), DemandLevel::Medium);
        assert_eq!("low".parse::<DemandLevel>().unwrap(), DemandLevel::Low);
        assert!("urgent".parse::<DemandLevel>().is_err());
        assert_eq!(DemandLevel::High.label(), "High");
        assert!(!DemandLevel::Low.is_displayed());
    }

    #[test]
    fn test_id_for_name() {
        assert_eq!(ResourceRecord::id_for_name("Jasmium Crystal"), "jasmium_crystal");
        assert_eq!(ResourceRecord::id_for_name("Spice: Refined"), "spice_refined");
        assert_eq!(ResourceRecord::id_for_name(""), "");
    }

    #[test]
    fn test_id_for_long_name_is_capped() {
        let name = "Ancient Ixian Navigation Module ".repeat(6);
        let id = ResourceRecord::id_for_name(&name);
        assert_eq!(id.chars().count(), MAX_RESOURCE_ID_CHARS);
        assert!(id.starts_with("ancient_ixian_navigation_module_"));
        assert_eq!(id, ResourceRecord::id_for_name(&name));
    }
}
