use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error registrado contra un experimento, proceso o tarea.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default)]
    pub error_id: String,
    /// Id del registro dueño (asignado en cascada).
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_error_message: Option<String>,
    #[serde(default)]
    pub user_friendly_message: Option<String>,
    #[serde(default)]
    pub transient_or_persistent: bool,
    /// Errores causa raíz, en orden.
    #[serde(default)]
    pub root_cause_error_ids: Option<Vec<String>>,
}

impl ErrorRecord {
    pub fn new(actual_error_message: impl Into<String>) -> Self {
        Self { actual_error_message: Some(actual_error_message.into()),
               ..Self::default() }
    }
}
