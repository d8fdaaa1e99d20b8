pub mod demand;
pub mod mission;
pub mod report;
pub mod resources;
pub mod user;

use crate::config::AUTOCOMPLETE_LIMIT;

/// Candidates containing `partial` (case-insensitive), sorted, capped at the
/// autocomplete limit.
pub(crate) fn matching_choices<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    partial: &str,
) -> Vec<String> {
    let needle = partial.trim().to_lowercase();
    let mut matches: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .map(str::to_string)
        .collect();
    matches.sort_by_key(|candidate| candidate.to_lowercase());
    matches.truncate(AUTOCOMPLETE_LIMIT);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_choices() {
        let names = ["Water", "Spice", "Plastanium", "Spice Melange", "Stravidium"];
        assert_eq!(
            matching_choices(names, "SPI"),
            vec!["Spice".to_string(), "Spice Melange".to_string()]
        );
        assert_eq!(matching_choices(names, "").len(), names.len());
        assert_eq!(matching_choices(names, "")[0], "Plastanium");
        assert!(matching_choices(names, "xyz").is_empty());
    }

    #[test]
    fn test_matching_choices_limit() {
        let names: Vec<String> = (0..40).map(|i| format!("Item {:02}", i)).collect();
        let matches = matching_choices(names.iter().map(String::as_str), "item");
        assert_eq!(matches.len(), AUTOCOMPLETE_LIMIT);
        assert_eq!(matches[0], "Item 00");
    }
}
