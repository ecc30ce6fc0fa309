use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    // Request errors
    #[error("Bad Request: {message}")]
    Validation { message: String },

    #[error("Not Found: No member found with umid {external_id}.")]
    MemberNotFound { external_id: String },

    // Upstream errors
    #[error("Upstream call failed: {message}")]
    Upstream { message: String },

    #[error("Webhook responded with status {status}: {body}")]
    WebhookStatus { status: u16, body: String },

    // State errors
    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Configuration errors
    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<reqwest::Error> for ReminderError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        ReminderError::Upstream { message }
    }
}

impl From<std::io::Error> for ReminderError {
    fn from(err: std::io::Error) -> Self {
        ReminderError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ReminderError {
    fn from(err: serde_json::Error) -> Self {
        ReminderError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
