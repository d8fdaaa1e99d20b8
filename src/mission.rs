//! Scheduled group missions: posting, RSVP, cancellation and expiry.

use crate::channel::ChannelError;
use crate::config::{valid_grace_hours, DEFAULT_MISSION_GRACE_HOURS};
use crate::db::{Database, Mission, RosterUpdate};
use crate::render::{mission_quip, COLOUR_MISSION};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MISSION_JOIN_ID: &str = "mission_join";
pub const MISSION_LEAVE_ID: &str = "mission_leave";
pub const MISSION_CANCEL_ID: &str = "mission_cancel";

/// Why a creator's date and time could not be turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissionInputError {
    #[error("Unknown timezone `{0}`. Set a valid one with `/user set_timezone`.")]
    UnknownTimezone(String),
    #[error("Invalid date or time format. Please use YYYY-MM-DD and HH:MM.")]
    InvalidFormat,
    #[error("That time does not exist in {0} (clocks skip it). Pick another time.")]
    NonexistentTime(String),
}

pub fn parse_timezone(name: &str) -> Result<Tz, MissionInputError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| MissionInputError::UnknownTimezone(name.trim().to_string()))
}

/// Resolve a wall-clock date and time in `timezone` to a UTC instant.
///
/// Ambiguous local times (clocks going back) resolve to the earliest instant.
pub fn resolve_local_time(
    timezone: &str,
    date: &str,
    time: &str,
) -> Result<DateTime<Utc>, MissionInputError> {
    let tz = parse_timezone(timezone)?;
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| MissionInputError::InvalidFormat)?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| MissionInputError::InvalidFormat)?;

    tz.from_local_datetime(&NaiveDateTime::new(date, time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| MissionInputError::NonexistentTime(tz.name().to_string()))
}

/// Current local date and time in `timezone`, as `(YYYY-MM-DD, HH:MM)`.
pub fn local_now(timezone: &str) -> Result<(String, String), MissionInputError> {
    let tz = parse_timezone(timezone)?;
    let now = Utc::now().with_timezone(&tz);
    Ok((
        now.format("%Y-%m-%d").to_string(),
        now.format("%H:%M").to_string(),
    ))
}

/// Everything a mission message displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionCard {
    pub details: String,
    pub participants: Vec<u64>,
    pub scheduled_at: DateTime<Utc>,
    pub footer: String,
}

impl MissionCard {
    pub fn new(details: &str, participants: &[u64], scheduled_at: DateTime<Utc>) -> Self {
        Self {
            details: details.to_string(),
            participants: participants.to_vec(),
            scheduled_at,
            footer: mission_quip().to_string(),
        }
    }

    pub fn for_mission(mission: &Mission) -> Self {
        Self::new(&mission.details, &mission.participants, mission.scheduled_at)
    }

    pub fn participants_field(&self) -> String {
        if self.participants.is_empty() {
            return "—".to_string();
        }
        self.participants
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn time_field(&self) -> String {
        format!("<t:{}:F>", self.scheduled_at.timestamp())
    }

    pub fn embed(&self) -> serenity::CreateEmbed {
        serenity::CreateEmbed::new()
            .title("Mission Briefing")
            .description(&self.details)
            .colour(COLOUR_MISSION)
            .field("Participants", self.participants_field(), false)
            .field("Time", self.time_field(), false)
            .footer(serenity::CreateEmbedFooter::new(&self.footer))
    }
}

pub fn mission_buttons() -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(MISSION_JOIN_ID)
            .label("Join")
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new(MISSION_LEAVE_ID)
            .label("Leave")
            .style(serenity::ButtonStyle::Secondary),
        serenity::CreateButton::new(MISSION_CANCEL_ID)
            .label("Cancel")
            .style(serenity::ButtonStyle::Danger),
    ])]
}

/// Where mission messages live.
#[async_trait]
pub trait MissionBoard: Send + Sync {
    async fn post(&self, channel_id: u64, card: &MissionCard) -> Result<u64, ChannelError>;
    async fn update(
        &self,
        channel_id: u64,
        message_id: u64,
        card: &MissionCard,
    ) -> Result<(), ChannelError>;
    async fn remove(&self, channel_id: u64, message_id: u64) -> Result<(), ChannelError>;
}

/// Mission messages over the REST API.
#[derive(Clone)]
pub struct HttpMissionBoard {
    http: Arc<serenity::Http>,
}

impl HttpMissionBoard {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MissionBoard for HttpMissionBoard {
    async fn post(&self, channel_id: u64, card: &MissionCard) -> Result<u64, ChannelError> {
        let builder = serenity::CreateMessage::new()
            .embed(card.embed())
            .components(mission_buttons());
        let message = serenity::ChannelId::new(channel_id)
            .send_message(&self.http, builder)
            .await?;
        Ok(message.id.get())
    }

    async fn update(
        &self,
        channel_id: u64,
        message_id: u64,
        card: &MissionCard,
    ) -> Result<(), ChannelError> {
        serenity::ChannelId::new(channel_id)
            .edit_message(
                &self.http,
                serenity::MessageId::new(message_id),
                serenity::EditMessage::new().embed(card.embed()),
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, channel_id: u64, message_id: u64) -> Result<(), ChannelError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&self.http, serenity::MessageId::new(message_id))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    Missing,
}

impl JoinOutcome {
    pub fn reply(&self) -> &'static str {
        match self {
            JoinOutcome::Joined => "You have joined the mission.",
            JoinOutcome::AlreadyJoined => "You have already joined this mission.",
            JoinOutcome::Missing => "This mission no longer exists.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotParticipant,
    Missing,
}

impl LeaveOutcome {
    pub fn reply(&self) -> &'static str {
        match self {
            LeaveOutcome::Left => "You have left the mission.",
            LeaveOutcome::NotParticipant => "You are not part of this mission.",
            LeaveOutcome::Missing => "This mission no longer exists.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotCreator,
    Missing,
}

impl CancelOutcome {
    pub fn reply(&self) -> &'static str {
        match self {
            CancelOutcome::Cancelled => "Mission cancelled.",
            CancelOutcome::NotCreator => "Only the mission creator can cancel it.",
            CancelOutcome::Missing => "This mission no longer exists.",
        }
    }
}

/// A mission the creator has filled in but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionDraft {
    pub channel_id: u64,
    pub creator_id: u64,
    pub details: String,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
}

impl MissionDraft {
    pub fn preview(&self) -> MissionCard {
        MissionCard::new(&self.details, &[self.creator_id], self.scheduled_at)
    }
}

#[derive(Clone)]
pub struct MissionService {
    db: Database,
    board: Arc<dyn MissionBoard>,
    grace: Duration,
}

impl MissionService {
    pub fn new(db: Database, board: Arc<dyn MissionBoard>, grace_hours: i64) -> Self {
        Self {
            db,
            board,
            grace: Duration::try_hours(grace_hours)
                .filter(|_| valid_grace_hours(grace_hours))
                .unwrap_or_else(|| Duration::hours(DEFAULT_MISSION_GRACE_HOURS)),
        }
    }

    /// Post a confirmed draft and persist it under the new message id.
    pub async fn post(&self, draft: MissionDraft) -> anyhow::Result<Mission> {
        let card = draft.preview();
        let message_id = self
            .board
            .post(draft.channel_id, &card)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to post mission: {}", e))?;

        let mission = Mission {
            id: message_id,
            channel_id: draft.channel_id,
            message_id,
            creator_id: draft.creator_id,
            details: draft.details,
            scheduled_at: draft.scheduled_at,
            timezone: draft.timezone,
            participants: vec![draft.creator_id],
        };

        let record = mission.clone();
        if let Err(e) = self
            .db
            .run_blocking(move |db| db.create_mission(&record))
            .await
        {
            if let Err(remove_err) = self.board.remove(mission.channel_id, message_id).await {
                warn!(
                    "Could not withdraw unsaved mission message {}: {}",
                    message_id, remove_err
                );
            }
            return Err(e.context("Failed to save mission"));
        }

        info!(
            "Mission {} posted by {} in channel {} for {}",
            mission.id, mission.creator_id, mission.channel_id, mission.scheduled_at
        );
        Ok(mission)
    }

    pub async fn join(&self, message_id: u64, user_id: u64) -> anyhow::Result<JoinOutcome> {
        let update = self
            .db
            .run_blocking(move |db| db.add_participant(message_id, user_id))
            .await?;
        Ok(match update {
            RosterUpdate::Changed(_) => {
                debug!("User {} joined mission {}", user_id, message_id);
                self.redraw(message_id).await;
                JoinOutcome::Joined
            }
            RosterUpdate::Unchanged => JoinOutcome::AlreadyJoined,
            RosterUpdate::Missing => JoinOutcome::Missing,
        })
    }

    pub async fn leave(&self, message_id: u64, user_id: u64) -> anyhow::Result<LeaveOutcome> {
        let update = self
            .db
            .run_blocking(move |db| db.remove_participant(message_id, user_id))
            .await?;
        Ok(match update {
            RosterUpdate::Changed(_) => {
                debug!("User {} left mission {}", user_id, message_id);
                self.redraw(message_id).await;
                LeaveOutcome::Left
            }
            RosterUpdate::Unchanged => LeaveOutcome::NotParticipant,
            RosterUpdate::Missing => LeaveOutcome::Missing,
        })
    }

    pub async fn cancel(&self, message_id: u64, user_id: u64) -> anyhow::Result<CancelOutcome> {
        let Some(mission) = self.load(message_id).await? else {
            return Ok(CancelOutcome::Missing);
        };
        if mission.creator_id != user_id {
            return Ok(CancelOutcome::NotCreator);
        }

        self.clean_up(&mission).await?;
        info!("Mission {} cancelled by its creator", message_id);
        Ok(CancelOutcome::Cancelled)
    }

    /// Remove every mission whose scheduled time plus the grace window has
    /// passed. Returns how many were cleaned up.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let missions = self.db.run_blocking(|db| db.get_all_missions()).await?;
        let mut removed = 0;
        for mission in missions {
            match mission.scheduled_at.checked_add_signed(self.grace) {
                Some(expires_at) if now > expires_at => {}
                _ => continue,
            }
            match self.clean_up(&mission).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to clean up mission {}: {:#}", mission.id, e),
            }
        }
        if removed > 0 {
            info!("Mission sweep removed {} expired mission(s)", removed);
        }
        Ok(removed)
    }

    async fn load(&self, message_id: u64) -> anyhow::Result<Option<Mission>> {
        self.db
            .run_blocking(move |db| db.get_mission(message_id))
            .await
    }

    /// Re-render from the roster as currently stored.
    async fn redraw(&self, message_id: u64) {
        let mission = match self.load(message_id).await {
            Ok(Some(mission)) => mission,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not reload mission {}: {:#}", message_id, e);
                return;
            }
        };
        let card = MissionCard::for_mission(&mission);
        if let Err(e) = self
            .board
            .update(mission.channel_id, mission.message_id, &card)
            .await
        {
            warn!("Could not redraw mission {}: {}", mission.message_id, e);
        }
    }

    /// Delete the message (a vanished one counts as deleted) and the record.
    async fn clean_up(&self, mission: &Mission) -> anyhow::Result<()> {
        match self.board.remove(mission.channel_id, mission.message_id).await {
            Ok(()) => {}
            Err(e) if e.is_absent() => {
                debug!("Mission message {} already gone ({})", mission.message_id, e);
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to delete mission message: {}", e)),
        }
        let message_id = mission.message_id;
        self.db
            .run_blocking(move |db| db.delete_mission(message_id))
            .await?;
        Ok(())
    }
}
