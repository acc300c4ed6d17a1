use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ComputationalResourceScheduling, DataParam, ErrorRecord, ProcessState, StatusRecord, Task};

/// Unidad de ejecución de un experimento sobre un recurso concreto.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Process {
    #[serde(default)]
    pub process_id: String,
    #[serde(default)]
    pub experiment_id: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub process_detail: Option<String>,
    #[serde(default)]
    pub application_interface_id: Option<String>,
    #[serde(default)]
    pub application_deployment_id: Option<String>,
    #[serde(default)]
    pub compute_resource_id: Option<String>,
    #[serde(default)]
    pub storage_resource_id: Option<String>,
    #[serde(default)]
    pub group_resource_profile_id: Option<String>,
    #[serde(default)]
    pub task_dag: Option<String>,
    #[serde(default)]
    pub gateway_execution_id: Option<String>,
    #[serde(default)]
    pub enable_email_notification: bool,
    #[serde(default)]
    pub email_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub user_dn: Option<String>,
    #[serde(default)]
    pub generate_cert: bool,
    #[serde(default)]
    pub experiment_data_dir: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub use_user_cr_pref: bool,
    #[serde(default)]
    pub resource_schedule: Option<ComputationalResourceScheduling>,
    #[serde(default)]
    pub process_status: Option<Vec<StatusRecord<ProcessState>>>,
    #[serde(default)]
    pub process_errors: Option<Vec<ErrorRecord>>,
    #[serde(default)]
    pub process_inputs: Option<Vec<DataParam>>,
    #[serde(default)]
    pub process_outputs: Option<Vec<DataParam>>,
    #[serde(default)]
    pub tasks: Option<Vec<Task>>,
}

impl Process {
    pub fn new(compute_resource_id: impl Into<String>) -> Self {
        Self { compute_resource_id: Some(compute_resource_id.into()),
               ..Self::default() }
    }
}
