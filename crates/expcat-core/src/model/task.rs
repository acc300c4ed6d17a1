use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ErrorRecord, Job, StatusRecord, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    EnvSetup,
    DataStaging,
    #[default]
    JobSubmission,
    EnvCleanup,
    Monitoring,
    OutputFetching,
}

/// Paso individual dentro de un proceso.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub parent_process_id: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub task_detail: Option<String>,
    /// Payload específico del tipo de tarea, opaco para el catálogo.
    #[serde(default)]
    pub sub_task_model: Option<serde_json::Value>,
    #[serde(default)]
    pub task_status: Option<Vec<StatusRecord<TaskState>>>,
    #[serde(default)]
    pub task_errors: Option<Vec<ErrorRecord>>,
    #[serde(default)]
    pub jobs: Option<Vec<Job>>,
}

impl Task {
    pub fn new(task_type: TaskType) -> Self {
        Self { task_type, ..Self::default() }
    }
}
