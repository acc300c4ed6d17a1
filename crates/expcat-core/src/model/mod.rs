//! Modelo de registros: Experiment → Process → Task → Job.
//!
//! Cada nivel posee en exclusiva a sus hijos y los hijos referencian al padre
//! sólo por identificador. Las colecciones anidadas son `Option<Vec<_>>`: el
//! valor ausente (no enviado por el cliente) se distingue de la lista vacía.

pub mod error_record;
pub mod experiment;
pub mod io;
pub mod job;
pub mod process;
pub mod state;
pub mod status;
pub mod summary;
pub mod task;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error_record::ErrorRecord;
pub use experiment::{ComputationalResourceScheduling, Experiment, ExperimentType, UserConfigurationData};
pub use io::{DataParam, DataType};
pub use job::{Job, JobKey};
pub use process::Process;
pub use state::{ExperimentState, JobState, LifecycleState, ProcessState, TaskState};
pub use status::StatusRecord;
pub use summary::{BucketTally, ExperimentStatistics, ExperimentSummary, StatusBucket};
pub use task::{Task, TaskType};

/// Nivel de la jerarquía al que pertenece un registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Experiment,
    Process,
    Task,
    Job,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Experiment => "EXPERIMENT",
            RecordKind::Process => "PROCESS",
            RecordKind::Task => "TASK",
            RecordKind::Job => "JOB",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EXPERIMENT" => Some(RecordKind::Experiment),
            "PROCESS" => Some(RecordKind::Process),
            "TASK" => Some(RecordKind::Task),
            "JOB" => Some(RecordKind::Job),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clave de búsqueda de cualquier registro. Los jobs conservan su identidad
/// compuesta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKey {
    Experiment(String),
    Process(String),
    Task(String),
    Job(JobKey),
}

impl RecordKey {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordKey::Experiment(_) => RecordKind::Experiment,
            RecordKey::Process(_) => RecordKind::Process,
            RecordKey::Task(_) => RecordKind::Task,
            RecordKey::Job(_) => RecordKind::Job,
        }
    }

    /// Identificador principal. Para un job es el `job_id`; la tarea dueña se
    /// obtiene de la propia `JobKey`.
    pub fn id(&self) -> &str {
        match self {
            RecordKey::Experiment(id) | RecordKey::Process(id) | RecordKey::Task(id) => id,
            RecordKey::Job(key) => &key.job_id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Job(key) => write!(f, "JOB({key})"),
            other => write!(f, "{}({})", other.kind(), other.id()),
        }
    }
}
