use chrono::NaiveDate;
use tracing::debug;

use crate::models::{BossType, Member};

/// Members who still have `boss` keys left on `reference_date`.
///
/// Members on vacation that day are left out regardless of their keys. The
/// input order is kept.
pub fn missing_members<'a>(
    members: &'a [Member],
    boss: BossType,
    reference_date: NaiveDate,
) -> Vec<&'a Member> {
    members
        .iter()
        .filter(|member| !member.is_on_vacation(reference_date))
        .filter(|member| member.tracking(boss).has_keys_left(boss))
        .inspect(|member| match &member.umid {
            Some(umid) => debug!("{} ({}) has {} keys left", member.name, umid, boss),
            None => debug!("{} has not marked {} as done", member.name, boss),
        })
        .collect()
}
