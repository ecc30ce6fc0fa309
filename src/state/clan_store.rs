use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ReminderError, Result};
use crate::models::{ClanSettings, Member};

/// Document store holding the clan settings and member documents
#[async_trait]
pub trait ClanStore: Send + Sync {
    /// Point lookup of the settings document
    async fn settings(&self) -> Result<Option<ClanSettings>>;

    /// Merge `patch` into the settings document. Nested objects merge key by
    /// key, so fields the patch does not name are left untouched.
    async fn merge_settings(&self, patch: Map<String, Value>) -> Result<()>;

    /// All member documents, in stored order
    async fn members(&self) -> Result<Vec<Member>>;

    /// Set `fields` on the member whose umid equals `external_id` and return
    /// the member's document id
    async fn update_member_by_external_id(
        &self,
        external_id: &str,
        fields: Map<String, Value>,
    ) -> Result<String>;
}

/// Shared store handle
pub type SharedClanStore = Arc<dyn ClanStore>;

/// JSON document store: `{ "settings": {..}, "members": [..] }`, optionally
/// persisted to a file after every write
pub struct JsonClanStore {
    document: RwLock<Value>,
    path: Option<PathBuf>,
}

impl JsonClanStore {
    /// Store that lives only in memory
    pub fn in_memory(document: Value) -> Self {
        Self {
            document: RwLock::new(document),
            path: None,
        }
    }

    /// Load from a JSON file, or start empty if it does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let document = match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ReminderError::StateParse {
                    path: path_str.clone(),
                    source: e,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No clan document at {}, starting empty", path_str);
                Value::Object(Map::new())
            }
            Err(e) => {
                return Err(ReminderError::StateLoad {
                    path: path_str,
                    source: e,
                })
            }
        };

        if !document.is_object() {
            return Err(ReminderError::Internal {
                message: format!("Clan document {} is not a JSON object", path_str),
            });
        }

        Ok(Self {
            document: RwLock::new(document),
            path: Some(path.to_path_buf()),
        })
    }

    /// Copy of the whole document
    #[cfg(test)]
    pub async fn snapshot(&self) -> Value {
        self.document.read().await.clone()
    }

    /// File path for error messages, or a marker for in-memory stores
    fn location(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    /// Write to a temp file first, then rename for atomicity
    async fn persist(&self, document: &Value) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let path_str = path.display().to_string();
        let content = serde_json::to_string_pretty(document)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReminderError::StateSave {
                    path: path_str.clone(),
                    source: e,
                })?;
        }

        let temp_path = format!("{}.tmp", path_str);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| ReminderError::StateSave {
                path: path_str.clone(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| ReminderError::StateSave {
                path: path_str,
                source: e,
            })?;

        Ok(())
    }
}

#[async_trait]
impl ClanStore for JsonClanStore {
    async fn settings(&self) -> Result<Option<ClanSettings>> {
        let document = self.document.read().await;
        match document.get("settings") {
            None | Some(Value::Null) => Ok(None),
            Some(settings) => serde_json::from_value(settings.clone())
                .map(Some)
                .map_err(|e| ReminderError::StateParse {
                    path: self.location(),
                    source: e,
                }),
        }
    }

    async fn merge_settings(&self, patch: Map<String, Value>) -> Result<()> {
        // The write lock spans read-modify-write, so concurrent patches never
        // lose each other's fields
        let mut document = self.document.write().await;
        let root = document
            .as_object_mut()
            .ok_or_else(|| ReminderError::Internal {
                message: "Clan document is not a JSON object".to_string(),
            })?;

        let settings = root
            .entry("settings")
            .or_insert_with(|| Value::Object(Map::new()));
        if !settings.is_object() {
            *settings = Value::Object(Map::new());
        }
        merge_value(settings, Value::Object(patch));

        self.persist(&document).await
    }

    async fn members(&self) -> Result<Vec<Member>> {
        let document = self.document.read().await;
        let Some(entries) = document.get("members").and_then(|m| m.as_array()) else {
            return Ok(Vec::new());
        };

        let members = entries
            .iter()
            .filter_map(|entry| match serde_json::from_value::<Member>(entry.clone()) {
                Ok(member) => Some(member),
                Err(e) => {
                    warn!("Skipping malformed member document {}: {}", entry, e);
                    None
                }
            })
            .collect();

        Ok(members)
    }

    async fn update_member_by_external_id(
        &self,
        external_id: &str,
        fields: Map<String, Value>,
    ) -> Result<String> {
        let mut document = self.document.write().await;

        let member = document
            .get_mut("members")
            .and_then(|m| m.as_array_mut())
            .and_then(|entries| {
                entries
                    .iter_mut()
                    .find(|entry| entry.get("umid").and_then(|u| u.as_str()) == Some(external_id))
            })
            .and_then(|entry| entry.as_object_mut())
            .ok_or_else(|| ReminderError::MemberNotFound {
                external_id: external_id.to_string(),
            })?;

        let member_id = member
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string();

        if fields.is_empty() {
            return Ok(member_id);
        }

        debug!("Setting {:?} on member {}", fields.keys().collect::<Vec<_>>(), member_id);
        for (key, value) in fields {
            member.insert(key, value);
        }

        self.persist(&document).await?;
        Ok(member_id)
    }
}

/// Recursive merge: objects merge per key, anything else replaces
fn merge_value(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_value(existing, value)
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

pub fn create_shared_clan_store(store: JsonClanStore) -> SharedClanStore {
    Arc::new(store)
}
