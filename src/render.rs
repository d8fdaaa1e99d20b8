//! Pure rendering of store state into transport-agnostic report cards.
//!
//! Nothing here talks to Discord; `channel` converts a [`ReportCard`] into
//! embeds and select menus.

use crate::db::{DemandLevel, Resource};
use rand::seq::SliceRandom;

/// Prefix of the demand selector custom id; the resource id follows it.
pub const DEMAND_SELECT_PREFIX: &str = "demand:";

pub const DETAIL_WIDTH: usize = 350;
const DETAIL_PLACEHOLDER: &str = " …";
const EMPTY_DETAIL: &str = "—";

/// Discord component and embed limits, in characters.
pub const CUSTOM_ID_LIMIT: usize = 100;
pub const PLACEHOLDER_LIMIT: usize = 150;
pub const TITLE_LIMIT: usize = 256;

pub const COLOUR_HIGH: u32 = 0xA84300;
pub const COLOUR_MEDIUM: u32 = 0xE67E22;
pub const COLOUR_LOW: u32 = 0x1F8B4C;
pub const COLOUR_MISSION: u32 = 0x992D22;

const REPORT_QUIPS: &[&str] = &[
    "“Plans within plans, Baron.”",
    "“The spice must flow — and so must the supplies.”",
    "“Echoes of the Dune hears the whispers of Arrakis.”",
    "“Efficiency is the best form of terror.”",
    "“Harkonnen profits favour the prepared.”",
    "“Statistics predict victory when stockpiles endure.”",
    "“Calculations confirm: fear sharpens loyalty.”",
    "“Fear delivers results the ledger can respect.”",
    "“A single mis-count is a silent betrayal.”",
    "“Logistics is the whip; demand is the scream.”",
    "“Deserts keep no secrets from a patient mind.”",
    "“Our figures walk ahead of us, scouting profit.”",
    "“Echo patterns confirm: rivals drown in their own audits.”",
    "“Precision today prevents bloodshed tomorrow… theirs, preferably.”",
    "“Spice intoxicates; mathematics sobers. Combine both.”",
    "“Where hope falters, quotas prevail.”",
    "“Mentat prognosis: opportunists perish, strategists inherit.”",
    "“An empty silo is an invitation to rebellion.”",
    "“Baron, the court obeys whomever commands the caravans.”",
    "“Data without brutality is merely trivia.”",
    "“Sand and numbers shift, but we steer both.”",
    "“Excess melange is inelegant—sell it, weaponise scarcity.”",
    "“My calculations thirst for their desperation.”",
    "“Echoes whisper the market’s fear; we shout its price.”",
    "“We tally corpses as readily as credits.”",
    "“Probability kneels before meticulous cruelty.”",
    "“A mentat remembers: profit is the Baron’s mercy.”",
    "“Opponents misplace crates; we misplace opponents.”",
    "“Scarcity is the slowest yet surest assassin.”",
    "“Strength lies in stockpiles, not slogans.”",
    "“An audit can slice deeper than a crysknife.”",
    "“Spreadsheets reveal what spies conceal.”",
    "“Our silence is worth more than their screams.”",
    "“House Harkonnen: where data is sharpened into dread.”",
    "“The desert punishes the sloppy; we merely expedite.”",
    "“Balance sheets foretell sieges better than oracles.”",
    "“In chaos we calculate; in order we collect.”",
    "“Waste is treason against the Baron’s coffers.”",
    "“Fortunes are fermented in well-guarded warehouses.”",
    "“Failures are just numbers waiting to be rounded down.”",
    "“Echoes report: hope depreciates faster than spice.”",
    "“A full depot sings louder than any bard.”",
    "“Mercy was omitted from the quarterly forecast.”",
    "“Audit complete: fear index within profitable range.”",
    "“Every ration withheld is leverage gained.”",
    "“Consensus is inefficient; precision is absolute.”",
    "“Mentats calculate — sandworms corroborate.”",
    "“House Atreides counts dreams; we count dividends.”",
    "“A shortage for them is an advantage for us.”",
    "“Baron, excess pity devalues the share price.”",
    "“The dune is indifferent; we are not.”",
    "“Extrapolation confirms: victory by attrition and arithmetic.”",
    "“Spice, statistics, supremacy — the triple sibilant of success.”",
    "“Disloyalty is a rounding error we refuse to carry.”",
];

const MISSION_QUIPS: &[&str] = &[
    "The slow blade penetrates the shield.",
    "He who controls the spice controls the universe.",
    "The sleeper must awaken.",
    "Fear is the mind-killer.",
    "A plan is only as good as its execution.",
    "The spice must flow.",
];

pub fn report_quip() -> &'static str {
    REPORT_QUIPS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(REPORT_QUIPS[0])
}

pub fn mission_quip() -> &'static str {
    MISSION_QUIPS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(MISSION_QUIPS[0])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: &'static str,
    pub value: &'static str,
}

/// Demand selector scoped to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandSelector {
    pub custom_id: String,
    pub placeholder: String,
    pub options: Vec<SelectOption>,
}

impl DemandSelector {
    pub fn for_resource(resource: &Resource) -> Self {
        Self {
            custom_id: format!("{}{}", DEMAND_SELECT_PREFIX, resource.id),
            placeholder: placeholder(resource),
            options: vec![
                SelectOption {
                    label: "🔥 High",
                    value: "high",
                },
                SelectOption {
                    label: "🟠 Medium",
                    value: "medium",
                },
                SelectOption {
                    label: "🟢 Low",
                    value: "low",
                },
            ],
        }
    }
}

/// Everything a report message displays for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCard {
    pub resource_id: String,
    pub title: String,
    pub url: Option<String>,
    pub description: String,
    pub colour: u32,
    pub thumbnail: Option<String>,
    pub footer: String,
    pub selector: DemandSelector,
}

impl ReportCard {
    pub fn for_resource(resource: &Resource) -> Self {
        Self {
            resource_id: resource.id.clone(),
            title: fit(&resource.name, TITLE_LIMIT),
            url: non_empty(&resource.link),
            description: describe(resource),
            colour: demand_colour(resource.demand),
            thumbnail: non_empty(&resource.image_url),
            footer: report_quip().to_string(),
            selector: DemandSelector::for_resource(resource),
        }
    }
}

pub fn demand_colour(level: DemandLevel) -> u32 {
    match level {
        DemandLevel::High => COLOUR_HIGH,
        DemandLevel::Medium => COLOUR_MEDIUM,
        DemandLevel::Low => COLOUR_LOW,
    }
}

fn describe(resource: &Resource) -> String {
    let detail = shorten(&resource.details, DETAIL_WIDTH, DETAIL_PLACEHOLDER);
    let detail = if detail.is_empty() {
        EMPTY_DETAIL.to_string()
    } else {
        detail
    };
    format!(
        "**Demand:** {}\n*{} • Tier {}*\n\n{}",
        resource.demand.label(),
        resource.kind,
        resource.tier,
        detail
    )
}

fn placeholder(resource: &Resource) -> String {
    let suffix = format!(" (T{}) • {}", resource.tier, resource.demand.label());
    let room = PLACEHOLDER_LIMIT.saturating_sub(suffix.chars().count());
    format!("{}{}", fit(&resource.name, room), suffix)
}

/// Shorten on word boundaries; a single overlong word is cut mid-word.
fn fit(text: &str, width: usize) -> String {
    let shortened = shorten(text, width, DETAIL_PLACEHOLDER);
    if shortened != DETAIL_PLACEHOLDER.trim_start() {
        return shortened;
    }
    let mut clipped: String = text.trim().chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Collapse whitespace and cut on word boundaries so the result, placeholder
/// included, fits in `width` characters.
pub fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(placeholder.chars().count());
    let mut out = String::new();
    let mut used = 0usize;
    for word in words {
        let extra = word.chars().count() + usize::from(!out.is_empty());
        if used + extra > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        used += extra;
    }

    if out.is_empty() {
        return placeholder.trim_start().to_string();
    }
    out.push_str(placeholder);
    out
}

/// Acknowledgement shown to whoever changed a demand level.
pub fn override_acknowledgement(name: &str, level: DemandLevel) -> String {
    format!("**{}** demand set to **{}**.", name, level)
}
