use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LifecycleState, RecordKey};

/// Entrada inmutable del historial de estados de un registro.
///
/// `status_id` vacío (o el centinela por defecto) significa "aún sin
/// asignar"; el ledger lo completa al escribir. `owner` lo fija la
/// persistencia en cascada a partir del registro dueño.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord<S> {
    #[serde(default)]
    pub status_id: String,
    #[serde(default)]
    pub owner: Option<RecordKey>,
    pub state: S,
    #[serde(default)]
    pub time_of_state_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl<S: LifecycleState> StatusRecord<S> {
    pub fn new(state: S) -> Self {
        Self { status_id: String::new(),
               owner: None,
               state,
               time_of_state_change: None,
               reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time_of_state_change = Some(time);
        self
    }
}
