use super::{parse_id, Database, Mission};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, TransactionBehavior};

/// Result of a roster change.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterUpdate {
    /// The roster changed; carries the mission as stored afterwards.
    Changed(Mission),
    /// The user was already in (or already out of) the roster.
    Unchanged,
    Missing,
}

const MISSION_COLUMNS: &str =
    "id, channel_id, message_id, creator_id, details, scheduled_at, timezone, participants";

fn mission_from_row(row: &Row<'_>) -> rusqlite::Result<Mission> {
    let text = |idx: usize| -> rusqlite::Result<String> { row.get(idx) };
    let conversion = |idx: usize, e: Box<dyn std::error::Error + Send + Sync>| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e)
    };

    let scheduled_at = DateTime::parse_from_rfc3339(&text(5)?)
        .map_err(|e| conversion(5, Box::new(e)))?
        .with_timezone(&Utc);
    let participants: Vec<u64> =
        serde_json::from_str(&text(7)?).map_err(|e| conversion(7, Box::new(e)))?;

    Ok(Mission {
        id: parse_id(&text(0)?)?,
        channel_id: parse_id(&text(1)?)?,
        message_id: parse_id(&text(2)?)?,
        creator_id: parse_id(&text(3)?)?,
        details: text(4)?,
        scheduled_at,
        timezone: text(6)?,
        participants,
    })
}

impl Database {
    /// Persist a posted mission. The creator is always the first participant.
    pub fn create_mission(&self, mission: &Mission) -> anyhow::Result<()> {
        let mut participants = vec![mission.creator_id];
        for user_id in &mission.participants {
            if !participants.contains(user_id) {
                participants.push(*user_id);
            }
        }

        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO missions ({MISSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            (
                mission.id.to_string(),
                mission.channel_id.to_string(),
                mission.message_id.to_string(),
                mission.creator_id.to_string(),
                &mission.details,
                mission.scheduled_at.to_rfc3339(),
                &mission.timezone,
                serde_json::to_string(&participants)?,
            ),
        )?;
        Ok(())
    }

    pub fn get_mission(&self, message_id: u64) -> anyhow::Result<Option<Mission>> {
        let conn = self.conn()?;
        let mission = conn
            .query_row(
                &format!("SELECT {MISSION_COLUMNS} FROM missions WHERE message_id = ?1"),
                [message_id.to_string()],
                mission_from_row,
            )
            .optional()?;
        Ok(mission)
    }

    pub fn get_all_missions(&self) -> anyhow::Result<Vec<Mission>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions ORDER BY scheduled_at"
        ))?;
        let rows = stmt.query_map([], mission_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Add `user_id` to a mission's roster. Read, check and write happen in
    /// one transaction under the connection lock.
    pub fn add_participant(&self, message_id: u64, user_id: u64) -> anyhow::Result<RosterUpdate> {
        self.update_roster(message_id, |participants| {
            if participants.contains(&user_id) {
                return false;
            }
            participants.push(user_id);
            true
        })
    }

    /// Remove `user_id` from a mission's roster, atomically like [`Self::add_participant`].
    pub fn remove_participant(
        &self,
        message_id: u64,
        user_id: u64,
    ) -> anyhow::Result<RosterUpdate> {
        self.update_roster(message_id, |participants| {
            let before = participants.len();
            participants.retain(|id| *id != user_id);
            participants.len() != before
        })
    }

    fn update_roster(
        &self,
        message_id: u64,
        change: impl FnOnce(&mut Vec<u64>) -> bool,
    ) -> anyhow::Result<RosterUpdate> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mission = tx
            .query_row(
                &format!("SELECT {MISSION_COLUMNS} FROM missions WHERE message_id = ?1"),
                [message_id.to_string()],
                mission_from_row,
            )
            .optional()?;
        let Some(mut mission) = mission else {
            return Ok(RosterUpdate::Missing);
        };
        if !change(&mut mission.participants) {
            return Ok(RosterUpdate::Unchanged);
        }

        tx.execute(
            "UPDATE missions SET participants = ?1 WHERE message_id = ?2",
            (serde_json::to_string(&mission.participants)?, message_id.to_string()),
        )?;
        tx.commit()?;
        Ok(RosterUpdate::Changed(mission))
    }

    pub fn delete_mission(&self, message_id: u64) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM missions WHERE message_id = ?1",
            [message_id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
pub(crate) fn mission(message_id: u64, creator_id: u64, scheduled_at: DateTime<Utc>) -> Mission {
    Mission {
        id: message_id,
        channel_id: 10,
        message_id,
        creator_id,
        details: "Escort the harvester".to_string(),
        scheduled_at,
        timezone: "UTC".to_string(),
        participants: vec![creator_id],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use chrono::TimeZone;

    #[test]
    fn test_mission_lifecycle() {
        let db = test_db();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap();
        db.create_mission(&mission(900, 7, at)).unwrap();

        let stored = db.get_mission(900).unwrap().unwrap();
        assert_eq!(stored.scheduled_at, at);
        assert_eq!(stored.participants, vec![7]);

        let RosterUpdate::Changed(updated) = db.add_participant(900, 8).unwrap() else {
            panic!("expected the roster to change");
        };
        assert_eq!(updated.participants, vec![7, 8]);
        assert_eq!(db.add_participant(900, 8).unwrap(), RosterUpdate::Unchanged);
        assert_eq!(db.add_participant(901, 8).unwrap(), RosterUpdate::Missing);
        assert_eq!(db.get_mission(900).unwrap().unwrap().participants, vec![7, 8]);

        assert!(matches!(db.remove_participant(900, 7).unwrap(), RosterUpdate::Changed(_)));
        assert_eq!(db.remove_participant(900, 7).unwrap(), RosterUpdate::Unchanged);
        assert_eq!(db.remove_participant(901, 7).unwrap(), RosterUpdate::Missing);
        assert_eq!(db.get_mission(900).unwrap().unwrap().participants, vec![8]);

        assert!(db.delete_mission(900).unwrap());
        assert!(db.get_mission(900).unwrap().is_none());
        assert!(!db.delete_mission(900).unwrap());
    }

    #[test]
    fn test_creator_always_first_participant() {
        let db = test_db();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap();
        let mut m = mission(901, 7, at);
        m.participants = vec![3, 7];
        db.create_mission(&m).unwrap();
        assert_eq!(db.get_mission(901).unwrap().unwrap().participants, vec![7, 3]);
    }

    #[test]
    fn test_list_missions_ordered_by_time() {
        let db = test_db();
        let late = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        db.create_mission(&mission(1, 1, late)).unwrap();
        db.create_mission(&mission(2, 1, early)).unwrap();

        let ids: Vec<u64> = db.get_all_missions().unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
