// src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Boss encounters whose keys are tracked per member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BossType {
    Hydra,
    Chimera,
}

impl BossType {
    pub const ALL: [BossType; 2] = [BossType::Hydra, BossType::Chimera];

    /// Weekly key allowance
    pub fn max_keys(self) -> u32 {
        match self {
            BossType::Hydra => 3,
            BossType::Chimera => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BossType::Hydra => "Hydra",
            BossType::Chimera => "Chimera",
        }
    }

    /// Member document field holding the used key count
    pub fn keys_count_field(self) -> &'static str {
        match self {
            BossType::Hydra => "hydraKeysCount",
            BossType::Chimera => "chimeraKeysCount",
        }
    }

    /// Query parameter the key helper sends the remaining count in
    pub fn remaining_param(self) -> &'static str {
        match self {
            BossType::Hydra => "hydraKeysRemaining",
            BossType::Chimera => "chimeraKeysRemaining",
        }
    }
}

impl std::fmt::Display for BossType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One value per boss type, stored as `{ "hydra": .., "chimera": .. }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PerBoss<T> {
    #[serde(default)]
    pub hydra: T,
    #[serde(default)]
    pub chimera: T,
}

impl<T> PerBoss<T> {
    pub fn new(hydra: T, chimera: T) -> Self {
        Self { hydra, chimera }
    }

    pub fn get(&self, boss: BossType) -> &T {
        match boss {
            BossType::Hydra => &self.hydra,
            BossType::Chimera => &self.chimera,
        }
    }
}

/// Weekly reminder slot as configured by the clan leads.
///
/// Both fields are optional in storage; a schedule is only usable once both
/// are present and valid. Values of the wrong type decode as missing so one
/// bad schedule never hides the other boss's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct ReminderSchedule {
    /// 0 = Sunday .. 6 = Saturday
    pub day: Option<u32>,

    /// "HH:MM", 24h clock
    pub time: Option<String>,
}

impl From<serde_json::Value> for ReminderSchedule {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        let day = match value.get("day") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => raw.trim().parse::<u32>().ok(),
            Some(raw) => raw.as_u64().and_then(|d| u32::try_from(d).ok()),
        };
        if day.is_none() && !matches!(value.get("day"), None | Some(Value::Null)) {
            warn!("Ignoring invalid reminder day {}", value["day"]);
        }

        let time = match value.get("time") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(raw.clone()),
            Some(raw) => {
                warn!("Ignoring invalid reminder time {}", raw);
                None
            }
        };

        Self { day, time }
    }
}

/// A complete, validated reminder schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

impl ReminderSchedule {
    #[cfg(test)]
    pub fn new(day: u32, time: &str) -> Self {
        Self {
            day: Some(day),
            time: Some(time.to_string()),
        }
    }

    /// Resolve into a slot, or `None` if a field is missing or malformed
    pub fn slot(&self) -> Option<ScheduleSlot> {
        let weekday = match self.day? {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            _ => return None,
        };
        let time = NaiveTime::parse_from_str(self.time.as_deref()?.trim(), "%H:%M").ok()?;

        Some(ScheduleSlot {
            weekday,
            hour: time.hour(),
            minute: time.minute(),
        })
    }
}

/// Clan-wide settings document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClanSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub auto_reminders_enabled: bool,

    #[serde(default)]
    pub reminder_schedules: PerBoss<Option<ReminderSchedule>>,

    /// ISO week number of the last automatic reminder per boss
    #[serde(default)]
    pub last_reminder_sent_for_week: PerBoss<Option<u32>>,

    /// Member ids of the clan leads, in display order
    #[serde(default)]
    pub clan_leads: Vec<String>,
}

/// How a member's progress against one boss is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTracking {
    /// Reported by the key helper through the member's umid
    Counted { used: u32 },
    /// Ticked off by hand
    Manual { completed: bool },
}

impl KeyTracking {
    pub fn has_keys_left(self, boss: BossType) -> bool {
        match self {
            KeyTracking::Counted { used } => used < boss.max_keys(),
            KeyTracking::Manual { completed } => !completed,
        }
    }
}

/// Inclusive date range during which a member is not reminded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl VacationWindow {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A clan member as seen by the reminder engine
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "MemberDocument")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub discord_id: Option<String>,
    pub umid: Option<String>,
    pub vacation: Option<VacationWindow>,
    pub tracking: PerBoss<KeyTracking>,
}

impl Member {
    pub fn tracking(&self, boss: BossType) -> KeyTracking {
        *self.tracking.get(boss)
    }

    /// Name to show in messages, falling back to the document id
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn is_on_vacation(&self, date: NaiveDate) -> bool {
        self.vacation.map(|v| v.covers(date)).unwrap_or(false)
    }
}

/// Raw member document as stored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberDocument {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    discord_id: Option<String>,
    #[serde(default)]
    umid: Option<String>,
    #[serde(default)]
    hydra_keys_count: Option<u32>,
    #[serde(default)]
    chimera_keys_count: Option<u32>,
    #[serde(default)]
    hydra_manual_done: Option<bool>,
    #[serde(default)]
    chimera_manual_done: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    vacation_start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    vacation_end: Option<NaiveDate>,
}

impl From<MemberDocument> for Member {
    fn from(doc: MemberDocument) -> Self {
        let umid = doc.umid.filter(|u| !u.trim().is_empty());

        // The presence of an umid decides the tracking mode for every boss
        let tracking = if umid.is_some() {
            PerBoss::new(
                KeyTracking::Counted {
                    used: doc.hydra_keys_count.unwrap_or(0),
                },
                KeyTracking::Counted {
                    used: doc.chimera_keys_count.unwrap_or(0),
                },
            )
        } else {
            PerBoss::new(
                KeyTracking::Manual {
                    completed: doc.hydra_manual_done.unwrap_or(false),
                },
                KeyTracking::Manual {
                    completed: doc.chimera_manual_done.unwrap_or(false),
                },
            )
        };

        let vacation = match (doc.vacation_start, doc.vacation_end) {
            (Some(start), Some(end)) => Some(VacationWindow { start, end }),
            _ => None,
        };

        Member {
            id: doc.id,
            name: doc.name,
            discord_id: doc.discord_id.filter(|d| !d.trim().is_empty()),
            umid,
            vacation,
            tracking,
        }
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; the time of day is dropped
fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(timestamp.date_naive()));
    }

    warn!("Ignoring unparseable vacation date '{}'", raw);
    Ok(None)
}
