pub mod clan_store;

pub use clan_store::{create_shared_clan_store, ClanStore, JsonClanStore, SharedClanStore};
