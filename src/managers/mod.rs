pub mod eligibility;
pub mod key_updates;
pub mod reminder_scheduler;
pub mod webhook;
pub mod week;

pub use key_updates::{apply_remaining_keys, KeyUpdateOutcome};
pub use reminder_scheduler::{create_shared_reminder_scheduler, TickReport};
pub use webhook::WebhookDispatcher;
