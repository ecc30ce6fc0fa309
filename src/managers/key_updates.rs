use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{ReminderError, Result};
use crate::models::{BossType, PerBoss};
use crate::state::ClanStore;

/// Result of applying a key helper report
#[derive(Debug, Clone, PartialEq)]
pub enum KeyUpdateOutcome {
    Updated {
        member_id: String,
        fields: Map<String, Value>,
    },
    NothingToUpdate {
        member_id: String,
    },
}

/// Used keys for a reported remaining count, or `None` when the report does
/// not start with an integer within `0..=max`
pub fn used_keys_from_remaining(boss: BossType, remaining: &str) -> Option<u32> {
    let remaining = leading_integer(remaining)?;
    let max = i64::from(boss.max_keys());
    if !(0..=max).contains(&remaining) {
        return None;
    }
    u32::try_from(max - remaining).ok()
}

/// Integer at the start of `raw` after leading whitespace, ignoring whatever
/// follows it: `"2abc"` and `"1.5"` read as 2 and 1
fn leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let sign_len = usize::from(raw.starts_with(['+', '-']));
    let digits_len = raw[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    raw[..sign_len + digits_len].parse().ok()
}

/// Store the used key counts reported by the key helper for one member
pub async fn apply_remaining_keys(
    store: &dyn ClanStore,
    umid: Option<&str>,
    remaining: &PerBoss<Option<String>>,
) -> Result<KeyUpdateOutcome> {
    // Blank check only; the lookup uses the umid exactly as sent
    let Some(umid) = umid.filter(|u| !u.trim().is_empty()) else {
        warn!("Missing umid parameter");
        return Err(ReminderError::Validation {
            message: "Missing 'umid' parameter.".to_string(),
        });
    };

    let mut fields = Map::new();
    for boss in BossType::ALL {
        let Some(raw) = remaining.get(boss) else {
            continue;
        };
        match used_keys_from_remaining(boss, raw) {
            Some(used) => {
                fields.insert(boss.keys_count_field().to_string(), json!(used));
            }
            None => warn!("Ignoring invalid {} value '{}'", boss.remaining_param(), raw),
        }
    }

    let member_id = store
        .update_member_by_external_id(umid, fields.clone())
        .await?;

    if fields.is_empty() {
        info!("No valid data to update for member: {}", member_id);
        Ok(KeyUpdateOutcome::NothingToUpdate { member_id })
    } else {
        info!("Successfully updated member {}: {:?}", member_id, fields);
        Ok(KeyUpdateOutcome::Updated { member_id, fields })
    }
}
