//! Weekly automatic reminders.
//!
//! Every tick looks at each boss type on its own: if the clan's schedule for
//! that boss matches the current time and no reminder went out this ISO week,
//! the members who still have keys are pinged through the webhook. The stored
//! `lastReminderSentForWeek` marker is the only thing preventing a second send,
//! so overlapping ticks (e.g. two instances during a deploy) stay safe.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::eligibility::missing_members;
use super::webhook::{DispatchOutcome, WebhookDispatcher};
use super::week::week_index;
use crate::error::Result;
use crate::messages::{clan_lead_names, reminder_message};
use crate::models::{BossType, ClanSettings, Member};
use crate::state::SharedClanStore;

/// Where a boss type stands at a given moment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// Schedule missing or incomplete, never due
    Unscheduled,
    /// Outside the scheduled window
    Idle,
    /// Inside the window and not yet sent this week
    Due { week: u32 },
    /// Inside the window but already sent this week
    Sent { week: u32 },
}

/// Decide the state of `boss` at `now`.
///
/// The window opens at the scheduled minute and stays open until the end of
/// that hour, so a coarse tick interval still lands inside it.
pub fn reminder_state(settings: &ClanSettings, boss: BossType, now: &DateTime<Tz>) -> ReminderState {
    let Some(slot) = settings
        .reminder_schedules
        .get(boss)
        .as_ref()
        .and_then(|schedule| schedule.slot())
    else {
        return ReminderState::Unscheduled;
    };

    if now.weekday() != slot.weekday || now.hour() != slot.hour || now.minute() < slot.minute {
        return ReminderState::Idle;
    }

    let week = week_index(now);
    if *settings.last_reminder_sent_for_week.get(boss) == Some(week) {
        ReminderState::Sent { week }
    } else {
        ReminderState::Due { week }
    }
}

/// Result of one boss type within a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BossOutcome {
    Unscheduled,
    Idle,
    AlreadySent { week: u32 },
    AllCaughtUp { week: u32 },
    Sent { week: u32, recipients: usize },
    NotConfigured { week: u32 },
    DispatchFailed { week: u32, reason: String },
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    NoSettings,
    Disabled,
    Evaluated(Vec<(BossType, BossOutcome)>),
}

impl TickReport {
    pub fn outcome(&self, boss: BossType) -> Option<&BossOutcome> {
        match self {
            TickReport::Evaluated(outcomes) => outcomes
                .iter()
                .find(|(b, _)| *b == boss)
                .map(|(_, outcome)| outcome),
            _ => None,
        }
    }
}

pub struct ReminderScheduler {
    store: SharedClanStore,
    dispatcher: WebhookDispatcher,
    timezone: Tz,
}

impl ReminderScheduler {
    pub fn new(store: SharedClanStore, dispatcher: WebhookDispatcher, timezone: Tz) -> Self {
        Self {
            store,
            dispatcher,
            timezone,
        }
    }

    /// Current wall clock in the clan's zone
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    /// Run one reminder pass at `now`
    pub async fn tick(&self, now: DateTime<Tz>) -> Result<TickReport> {
        let Some(settings) = self.store.settings().await? else {
            warn!("No clan settings found, skipping reminder tick");
            return Ok(TickReport::NoSettings);
        };

        if !settings.auto_reminders_enabled {
            info!("Automatic reminders are disabled, skipping reminder tick");
            return Ok(TickReport::Disabled);
        }

        // Members are only read once something is due
        let mut members: Option<Vec<Member>> = None;
        let mut outcomes = Vec::with_capacity(BossType::ALL.len());

        for boss in BossType::ALL {
            let outcome = match reminder_state(&settings, boss, &now) {
                ReminderState::Unscheduled => {
                    warn!("{} reminder schedule is missing or incomplete", boss);
                    BossOutcome::Unscheduled
                }
                ReminderState::Idle => BossOutcome::Idle,
                ReminderState::Sent { week } => {
                    debug!("{} reminder already sent for week {}", boss, week);
                    BossOutcome::AlreadySent { week }
                }
                ReminderState::Due { week } => {
                    if members.is_none() {
                        members = Some(self.store.members().await?);
                    }
                    let loaded = members.as_deref().unwrap_or_default();
                    self.send_reminder(&settings, loaded, boss, week, now.date_naive())
                        .await
                }
            };
            outcomes.push((boss, outcome));
        }

        Ok(TickReport::Evaluated(outcomes))
    }

    async fn send_reminder(
        &self,
        settings: &ClanSettings,
        members: &[Member],
        boss: BossType,
        week: u32,
        today: chrono::NaiveDate,
    ) -> BossOutcome {
        let missing = missing_members(members, boss, today);
        if missing.is_empty() {
            info!("All members are caught up on {} keys for week {}", boss, week);
            return BossOutcome::AllCaughtUp { week };
        }

        info!(
            "Sending {} reminder for week {} to {} members",
            boss,
            week,
            missing.len()
        );
        let leads = clan_lead_names(&settings.clan_leads, members);
        let message = reminder_message(&missing, boss, &leads);

        let outcome = match self
            .dispatcher
            .send(settings.webhook_url.as_deref(), &message)
            .await
        {
            Ok(DispatchOutcome::Sent) => BossOutcome::Sent {
                week,
                recipients: missing.len(),
            },
            Ok(DispatchOutcome::NotConfigured) => {
                warn!("No webhook URL configured, {} reminder not delivered", boss);
                BossOutcome::NotConfigured { week }
            }
            Err(e) => {
                error!("Failed to send {} reminder: {}", boss, e);
                BossOutcome::DispatchFailed {
                    week,
                    reason: e.to_string(),
                }
            }
        };

        // The marker advances whether or not delivery worked: at most one
        // automatic reminder per boss and week
        self.mark_sent(boss, week).await;
        outcome
    }

    async fn mark_sent(&self, boss: BossType, week: u32) {
        let mut weeks = Map::new();
        weeks.insert(boss_key(boss), json!(week));
        let mut patch = Map::new();
        patch.insert("lastReminderSentForWeek".to_string(), weeks.into());

        match self.store.merge_settings(patch).await {
            Ok(()) => info!("Marked {} reminder as sent for week {}", boss, week),
            Err(e) => error!("Failed to record {} reminder for week {}: {}", boss, week, e),
        }
    }

    /// Tick forever on a fixed interval
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Reminder scheduler running every {}s", period.as_secs());
        loop {
            interval.tick().await;
            let now = self.now();
            match self.tick(now).await {
                Ok(report) => debug!("Reminder tick at {}: {:?}", now, report),
                Err(e) => error!("Reminder tick failed: {}", e),
            }
        }
    }
}

/// Settings key of a boss, matching its serde name
fn boss_key(boss: BossType) -> String {
    match serde_json::to_value(boss) {
        Ok(serde_json::Value::String(key)) => key,
        _ => boss.display_name().to_lowercase(),
    }
}

pub type SharedReminderScheduler = Arc<ReminderScheduler>;

pub fn create_shared_reminder_scheduler(
    store: SharedClanStore,
    dispatcher: WebhookDispatcher,
    timezone: Tz,
) -> SharedReminderScheduler {
    Arc::new(ReminderScheduler::new(store, dispatcher, timezone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClanStore, JsonClanStore};
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use serde_json::Value;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Wednesday 2026-10-21 is in ISO week 43
    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        Berlin.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    fn document(webhook_url: &str) -> Value {
        json!({
            "settings": {
                "webhookUrl": webhook_url,
                "autoRemindersEnabled": true,
                "reminderSchedules": {
                    "hydra": { "day": 3, "time": "19:30" },
                    "chimera": { "day": 3, "time": "19:00" }
                },
                "clanLeads": ["lead"]
            },
            "members": [
                { "id": "lead", "name": "Ayla", "umid": "U-1", "hydraKeysCount": 3, "chimeraKeysCount": 2 },
                { "id": "b", "name": "Borin", "discordId": "123456789012345678", "umid": "U-2", "hydraKeysCount": 1 },
                { "id": "c", "name": "Cira", "hydraManualDone": false, "chimeraManualDone": true }
            ]
        })
    }

    fn scheduler(store: Arc<JsonClanStore>) -> ReminderScheduler {
        let dispatcher =
            WebhookDispatcher::new("Boss Key Reminder", Duration::from_millis(500)).unwrap();
        ReminderScheduler::new(store, dispatcher, Berlin)
    }

    async fn mock_webhook(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_window_runs_from_minute_to_end_of_hour() {
        let settings: ClanSettings =
            serde_json::from_value(document("")["settings"].clone()).unwrap();

        assert_eq!(reminder_state(&settings, BossType::Hydra, &at(21, 19, 29)), ReminderState::Idle);
        assert_eq!(
            reminder_state(&settings, BossType::Hydra, &at(21, 19, 30)),
            ReminderState::Due { week: 43 }
        );
        assert_eq!(
            reminder_state(&settings, BossType::Hydra, &at(21, 19, 59)),
            ReminderState::Due { week: 43 }
        );
        assert_eq!(reminder_state(&settings, BossType::Hydra, &at(21, 20, 0)), ReminderState::Idle);
        // Right time, wrong day
        assert_eq!(reminder_state(&settings, BossType::Hydra, &at(22, 19, 45)), ReminderState::Idle);
    }

    #[test]
    fn test_sent_marker_blocks_same_week() {
        let mut settings: ClanSettings =
            serde_json::from_value(document("")["settings"].clone()).unwrap();
        settings.last_reminder_sent_for_week.hydra = Some(43);

        assert_eq!(
            reminder_state(&settings, BossType::Hydra, &at(21, 19, 45)),
            ReminderState::Sent { week: 43 }
        );
        assert_eq!(
            reminder_state(&settings, BossType::Hydra, &at(28, 19, 45)),
            ReminderState::Due { week: 44 }
        );
    }

    #[tokio::test]
    async fn test_second_tick_in_same_window_does_not_resend() {
        let server = mock_webhook(204).await;
        let store = Arc::new(JsonClanStore::in_memory(document(&server.uri())));
        let scheduler = scheduler(store.clone());

        let first = scheduler.tick(at(21, 19, 35)).await.unwrap();
        assert_eq!(
            first.outcome(BossType::Hydra),
            Some(&BossOutcome::Sent { week: 43, recipients: 2 })
        );
        assert_eq!(
            first.outcome(BossType::Chimera),
            Some(&BossOutcome::Sent { week: 43, recipients: 1 })
        );

        let second = scheduler.tick(at(21, 19, 50)).await.unwrap();
        assert_eq!(second.outcome(BossType::Hydra), Some(&BossOutcome::AlreadySent { week: 43 }));
        assert_eq!(second.outcome(BossType::Chimera), Some(&BossOutcome::AlreadySent { week: 43 }));

        assert_eq!(server.received_requests().await.unwrap().len(), 2);

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.last_reminder_sent_for_week, crate::models::PerBoss::new(Some(43), Some(43)));
    }

    #[tokio::test]
    async fn test_next_week_sends_again() {
        let server = mock_webhook(204).await;
        let store = Arc::new(JsonClanStore::in_memory(document(&server.uri())));
        let scheduler = scheduler(store);

        scheduler.tick(at(21, 19, 40)).await.unwrap();
        let next_week = scheduler.tick(at(28, 19, 40)).await.unwrap();

        assert_eq!(
            next_week.outcome(BossType::Hydra),
            Some(&BossOutcome::Sent { week: 44, recipients: 2 })
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_message_content() {
        let server = mock_webhook(204).await;
        let store = Arc::new(JsonClanStore::in_memory(document(&server.uri())));
        let scheduler = scheduler(store);

        // Only chimera (19:00) is due at 19:10
        let report = scheduler.tick(at(21, 19, 10)).await.unwrap();
        assert_eq!(report.outcome(BossType::Hydra), Some(&BossOutcome::Idle));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let content = body["content"].as_str().unwrap();

        assert_eq!(body["username"], json!("Boss Key Reminder"));
        assert!(content.contains("Chimera reminder"));
        assert!(content.contains("<@123456789012345678>"));
        assert!(!content.contains("Cira"));
        assert!(content.ends_with("_Your clan leads, Ayla_"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_still_advances_marker() {
        let server = mock_webhook(500).await;
        let store = Arc::new(JsonClanStore::in_memory(document(&server.uri())));
        let scheduler = scheduler(store.clone());

        let report = scheduler.tick(at(21, 19, 45)).await.unwrap();
        assert!(matches!(
            report.outcome(BossType::Hydra),
            Some(BossOutcome::DispatchFailed { week: 43, .. })
        ));

        let retry = scheduler.tick(at(21, 19, 55)).await.unwrap();
        assert_eq!(retry.outcome(BossType::Hydra), Some(&BossOutcome::AlreadySent { week: 43 }));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_caught_up_sends_nothing() {
        let server = mock_webhook(204).await;
        let mut doc = document(&server.uri());
        doc["members"] = json!([
            { "id": "a", "umid": "U-1", "hydraKeysCount": 3, "chimeraKeysCount": 2 },
            { "id": "b", "hydraManualDone": true, "chimeraManualDone": true }
        ]);
        let store = Arc::new(JsonClanStore::in_memory(doc));
        let scheduler = scheduler(store.clone());

        let report = scheduler.tick(at(21, 19, 45)).await.unwrap();
        assert_eq!(report.outcome(BossType::Hydra), Some(&BossOutcome::AllCaughtUp { week: 43 }));
        assert_eq!(report.outcome(BossType::Chimera), Some(&BossOutcome::AllCaughtUp { week: 43 }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let server = mock_webhook(204).await;
        let mut doc = document(&server.uri());
        doc["settings"]["autoRemindersEnabled"] = json!(false);
        let store = Arc::new(JsonClanStore::in_memory(doc));
        let scheduler = scheduler(store.clone());

        let report = scheduler.tick(at(21, 19, 45)).await.unwrap();
        assert_eq!(report, TickReport::Disabled);
        assert!(server.received_requests().await.unwrap().is_empty());

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.last_reminder_sent_for_week.hydra, None);
    }

    #[tokio::test]
    async fn test_missing_settings_is_noop() {
        let store = Arc::new(JsonClanStore::in_memory(json!({ "members": [] })));
        let report = scheduler(store).tick(at(21, 19, 45)).await.unwrap();
        assert_eq!(report, TickReport::NoSettings);
    }

    #[tokio::test]
    async fn test_incomplete_schedule_does_not_block_other_boss() {
        let server = mock_webhook(204).await;
        let mut doc = document(&server.uri());
        doc["settings"]["reminderSchedules"]["hydra"] = json!({ "day": 3 });
        let store = Arc::new(JsonClanStore::in_memory(doc));
        let scheduler = scheduler(store.clone());

        let report = scheduler.tick(at(21, 19, 45)).await.unwrap();
        assert_eq!(report.outcome(BossType::Hydra), Some(&BossOutcome::Unscheduled));
        assert_eq!(
            report.outcome(BossType::Chimera),
            Some(&BossOutcome::Sent { week: 43, recipients: 1 })
        );

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.last_reminder_sent_for_week.hydra, None);
    }

    #[tokio::test]
    async fn test_malformed_schedule_does_not_block_other_boss() {
        let server = mock_webhook(204).await;
        let mut doc = document(&server.uri());
        doc["settings"]["reminderSchedules"]["hydra"] = json!({ "day": -1, "time": 1930 });
        let store = Arc::new(JsonClanStore::in_memory(doc));
        let scheduler = scheduler(store.clone());

        let report = scheduler.tick(at(21, 19, 45)).await.unwrap();
        assert_eq!(report.outcome(BossType::Hydra), Some(&BossOutcome::Unscheduled));
        assert_eq!(
            report.outcome(BossType::Chimera),
            Some(&BossOutcome::Sent { week: 43, recipients: 1 })
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.last_reminder_sent_for_week.chimera, Some(43));
        assert_eq!(settings.last_reminder_sent_for_week.hydra, None);
    }

    #[tokio::test]
    async fn test_missing_webhook_url_still_marks_week() {
        let store = Arc::new(JsonClanStore::in_memory(document("")));
        let scheduler = scheduler(store.clone());

        let report = scheduler.tick(at(21, 19, 45)).await.unwrap();
        assert_eq!(report.outcome(BossType::Hydra), Some(&BossOutcome::NotConfigured { week: 43 }));

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.last_reminder_sent_for_week.hydra, Some(43));
    }
}
