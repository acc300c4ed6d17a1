use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobState, StatusRecord};

/// Identidad compuesta de un job: el id que asigna el gestor de recursos no
/// es único fuera de su tarea.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub task_id: String,
    pub job_id: String,
}

impl JobKey {
    pub fn new(task_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self { task_id: task_id.into(),
               job_id: job_id.into() }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task={} job={}", self.task_id, self.job_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub process_id: String,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compute_resource_consumed: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub std_out: Option<String>,
    #[serde(default)]
    pub std_err: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub job_status: Option<Vec<StatusRecord<JobState>>>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self { job_id: job_id.into(),
               task_id: task_id.into(),
               ..Self::default() }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.task_id.clone(), self.job_id.clone())
    }
}
