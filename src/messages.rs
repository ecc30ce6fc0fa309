// src/messages.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::model::id::UserId;
use serenity::model::mention::Mentionable;

use crate::models::{BossType, Member};

/// Discord snowflakes are 17 to 19 digits
static DISCORD_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{17,19}$").expect("valid regex"));

pub fn is_mentionable_id(discord_id: &str) -> bool {
    DISCORD_ID.is_match(discord_id)
}

fn mention_token(discord_id: &str) -> String {
    match discord_id.parse::<u64>() {
        Ok(id) if id != 0 => UserId::new(id).mention().to_string(),
        _ => format!("<@{}>", discord_id),
    }
}

/// Display names of the clan leads, in configured order. Ids without a
/// matching member are shown as-is.
pub fn clan_lead_names(lead_ids: &[String], members: &[Member]) -> Vec<String> {
    lead_ids
        .iter()
        .map(|lead_id| {
            members
                .iter()
                .find(|m| &m.id == lead_id)
                .map(|m| m.display_name().to_string())
                .unwrap_or_else(|| lead_id.clone())
        })
        .collect()
}

/// "A", "A & B", "A, B & C"
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} & {}", rest.join(", "), last),
    }
}

/// Reminder text for members who still have `boss` keys left
pub fn reminder_message(missing: &[&Member], boss: BossType, clan_leads: &[String]) -> String {
    let (mentionable, name_only): (Vec<&Member>, Vec<&Member>) = missing
        .iter()
        .copied()
        .partition(|m| m.discord_id.as_deref().map(is_mentionable_id).unwrap_or(false));

    let mut message = format!(
        "⚔️ **{} reminder!**\n\
        The following members still have {} keys to use this week:\n",
        boss, boss
    );

    if !mentionable.is_empty() {
        let mentions: Vec<String> = mentionable
            .iter()
            .filter_map(|m| m.discord_id.as_deref())
            .map(mention_token)
            .collect();
        message.push('\n');
        message.push_str(&mentions.join(" "));
        message.push('\n');
    }

    if !name_only.is_empty() {
        let names: Vec<&str> = name_only.iter().map(|m| m.display_name()).collect();
        message.push_str(&format!("\n**No ping:** {}\n", names.join(", ")));
    }

    if clan_leads.is_empty() {
        message.push_str("\n_Your clan leads_");
    } else {
        message.push_str(&format!("\n_Your clan leads, {}_", join_names(clan_leads)));
    }

    message
}
