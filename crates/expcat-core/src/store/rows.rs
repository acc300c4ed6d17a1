//! Filas de almacenamiento: un registro sin sus hijos ni su historial.
//!
//! Las colecciones pequeñas (entradas, salidas, errores, configuración) viajan
//! dentro de la fila; los hijos y los estados se guardan aparte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::model::{ComputationalResourceScheduling, DataParam, ErrorRecord, ExperimentType, JobKey, RecordKey,
                   RecordKind, TaskType, UserConfigurationData};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRow {
    pub experiment_id: String,
    pub project_id: String,
    pub gateway_id: String,
    pub experiment_type: ExperimentType,
    pub user_name: String,
    pub experiment_name: String,
    pub creation_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub description: Option<String>,
    pub execution_id: Option<String>,
    pub gateway_execution_id: Option<String>,
    pub gateway_instance_id: Option<String>,
    pub enable_email_notification: bool,
    pub email_addresses: Option<Vec<String>>,
    pub user_configuration_data: Option<UserConfigurationData>,
    pub experiment_inputs: Option<Vec<DataParam>>,
    pub experiment_outputs: Option<Vec<DataParam>>,
    pub errors: Option<Vec<ErrorRecord>>,
}

impl ExperimentRow {
    pub fn resource_host_id(&self) -> Option<&str> {
        self.user_configuration_data
            .as_ref()?
            .computational_resource_scheduling
            .as_ref()?
            .resource_host_id
            .as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRow {
    pub process_id: String,
    pub experiment_id: String,
    pub creation_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub process_detail: Option<String>,
    pub application_interface_id: Option<String>,
    pub application_deployment_id: Option<String>,
    pub compute_resource_id: Option<String>,
    pub storage_resource_id: Option<String>,
    pub group_resource_profile_id: Option<String>,
    pub task_dag: Option<String>,
    pub gateway_execution_id: Option<String>,
    pub enable_email_notification: bool,
    pub email_addresses: Option<Vec<String>>,
    pub user_dn: Option<String>,
    pub generate_cert: bool,
    pub experiment_data_dir: Option<String>,
    pub user_name: Option<String>,
    pub use_user_cr_pref: bool,
    pub resource_schedule: Option<ComputationalResourceScheduling>,
    pub process_errors: Option<Vec<ErrorRecord>>,
    pub process_inputs: Option<Vec<DataParam>>,
    pub process_outputs: Option<Vec<DataParam>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub task_id: String,
    pub task_type: TaskType,
    pub parent_process_id: String,
    pub creation_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub task_detail: Option<String>,
    pub sub_task_model: Option<serde_json::Value>,
    pub task_errors: Option<Vec<ErrorRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub job_id: String,
    pub task_id: String,
    pub process_id: String,
    pub job_description: Option<String>,
    pub creation_time: DateTime<Utc>,
    pub compute_resource_consumed: Option<String>,
    pub job_name: Option<String>,
    pub working_dir: Option<String>,
    pub std_out: Option<String>,
    pub std_err: Option<String>,
    pub exit_code: Option<i32>,
}

impl JobRow {
    pub fn key(&self) -> JobKey {
        JobKey::new(self.task_id.clone(), self.job_id.clone())
    }
}

/// Fila de cualquier nivel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordRow {
    Experiment(ExperimentRow),
    Process(ProcessRow),
    Task(TaskRow),
    Job(JobRow),
}

impl RecordRow {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordRow::Experiment(_) => RecordKind::Experiment,
            RecordRow::Process(_) => RecordKind::Process,
            RecordRow::Task(_) => RecordKind::Task,
            RecordRow::Job(_) => RecordKind::Job,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            RecordRow::Experiment(r) => RecordKey::Experiment(r.experiment_id.clone()),
            RecordRow::Process(r) => RecordKey::Process(r.process_id.clone()),
            RecordRow::Task(r) => RecordKey::Task(r.task_id.clone()),
            RecordRow::Job(r) => RecordKey::Job(r.key()),
        }
    }

    /// Clave del padre directo; `None` para experimentos.
    pub fn parent_key(&self) -> Option<RecordKey> {
        match self {
            RecordRow::Experiment(_) => None,
            RecordRow::Process(r) => Some(RecordKey::Experiment(r.experiment_id.clone())),
            RecordRow::Task(r) => Some(RecordKey::Process(r.parent_process_id.clone())),
            RecordRow::Job(r) => Some(RecordKey::Task(r.task_id.clone())),
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        match self {
            RecordRow::Experiment(r) => r.creation_time,
            RecordRow::Process(r) => r.creation_time,
            RecordRow::Task(r) => r.creation_time,
            RecordRow::Job(r) => r.creation_time,
        }
    }
}

/// Acceso tipado a las variantes de `RecordRow`.
pub trait StoredRow: Sized {
    const KIND: RecordKind;
    fn into_record(self) -> RecordRow;
    fn from_record(row: RecordRow) -> Option<Self>;

    /// Como `from_record`, tratando una variante inesperada como dato corrupto.
    fn expect_from(row: RecordRow) -> Result<Self, StoreError> {
        let found = row.kind();
        Self::from_record(row).ok_or_else(|| StoreError::Corrupt(format!("expected {} row, found {found}", Self::KIND)))
    }
}

macro_rules! stored_row {
    ($row:ident, $variant:ident) => {
        impl StoredRow for $row {
            const KIND: RecordKind = RecordKind::$variant;

            fn into_record(self) -> RecordRow {
                RecordRow::$variant(self)
            }

            fn from_record(row: RecordRow) -> Option<Self> {
                match row {
                    RecordRow::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }
    };
}

stored_row!(ExperimentRow, Experiment);
stored_row!(ProcessRow, Process);
stored_row!(TaskRow, Task);
stored_row!(JobRow, Job);

/// Entrada de estado a insertar. El almacenamiento asigna `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStatusRow {
    pub status_id: String,
    pub owner: RecordKey,
    pub state: String,
    pub time_of_change: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Entrada de estado persistida. `seq` es monótono por almacenamiento y
/// desempata entradas con el mismo instante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub seq: u64,
    pub status_id: String,
    pub owner: RecordKey,
    pub state: String,
    pub time_of_change: DateTime<Utc>,
    pub reason: Option<String>,
}

impl StatusRow {
    pub fn from_new(seq: u64, new: NewStatusRow) -> Self {
        Self { seq,
               status_id: new.status_id,
               owner: new.owner,
               state: new.state,
               time_of_change: new.time_of_change,
               reason: new.reason }
    }
}

/// Orden "más reciente primero": instante de cambio y luego `seq`.
pub fn newest_first(a: &StatusRow, b: &StatusRow) -> std::cmp::Ordering {
    b.time_of_change.cmp(&a.time_of_change).then(b.seq.cmp(&a.seq))
}
