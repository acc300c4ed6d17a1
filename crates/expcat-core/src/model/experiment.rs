use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DataParam, ErrorRecord, ExperimentState, Process, StatusRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentType {
    #[default]
    SingleApplication,
    Workflow,
}

/// Preferencias de planificación sobre un recurso de cómputo.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComputationalResourceScheduling {
    #[serde(default)]
    pub resource_host_id: Option<String>,
    #[serde(default)]
    pub total_cpu_count: Option<i32>,
    #[serde(default)]
    pub node_count: Option<i32>,
    #[serde(default)]
    pub number_of_threads: Option<i32>,
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub wall_time_limit: Option<i32>,
    #[serde(default)]
    pub total_physical_memory: Option<i32>,
    #[serde(default)]
    pub static_working_dir: Option<String>,
    #[serde(default)]
    pub override_login_user_name: Option<String>,
    #[serde(default)]
    pub override_scratch_location: Option<String>,
    #[serde(default)]
    pub override_allocation_project_number: Option<String>,
}

/// Configuración de usuario adjunta a un experimento.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserConfigurationData {
    #[serde(default)]
    pub airavata_auto_schedule: bool,
    #[serde(default)]
    pub override_manual_scheduled_params: bool,
    #[serde(default)]
    pub share_experiment_publicly: bool,
    #[serde(default)]
    pub throttle_resources: bool,
    #[serde(default)]
    pub user_dn: Option<String>,
    #[serde(default)]
    pub generate_cert: bool,
    #[serde(default)]
    pub computational_resource_scheduling: Option<ComputationalResourceScheduling>,
    #[serde(default)]
    pub input_storage_resource_id: Option<String>,
    #[serde(default)]
    pub output_storage_resource_id: Option<String>,
    #[serde(default)]
    pub experiment_data_dir: Option<String>,
    #[serde(default)]
    pub use_user_cr_pref: bool,
    #[serde(default)]
    pub group_resource_profile_id: Option<String>,
    #[serde(default)]
    pub auto_scheduled_comp_resource_scheduling_list: Option<Vec<ComputationalResourceScheduling>>,
}

/// Raíz de la jerarquía de registros.
///
/// `experiment_status` está ordenado del más reciente al más antiguo, igual
/// que el historial que devuelve el ledger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default)]
    pub experiment_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub gateway_id: String,
    #[serde(default)]
    pub experiment_type: ExperimentType,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub experiment_name: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub gateway_execution_id: Option<String>,
    #[serde(default)]
    pub gateway_instance_id: Option<String>,
    #[serde(default)]
    pub enable_email_notification: bool,
    #[serde(default)]
    pub email_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub user_configuration_data: Option<UserConfigurationData>,
    #[serde(default)]
    pub experiment_inputs: Option<Vec<DataParam>>,
    #[serde(default)]
    pub experiment_outputs: Option<Vec<DataParam>>,
    #[serde(default)]
    pub experiment_status: Option<Vec<StatusRecord<ExperimentState>>>,
    #[serde(default)]
    pub errors: Option<Vec<ErrorRecord>>,
    #[serde(default)]
    pub processes: Option<Vec<Process>>,
}

impl Experiment {
    pub fn new(project_id: impl Into<String>,
               gateway_id: impl Into<String>,
               user_name: impl Into<String>,
               experiment_name: impl Into<String>)
               -> Self {
        Self { project_id: project_id.into(),
               gateway_id: gateway_id.into(),
               user_name: user_name.into(),
               experiment_name: experiment_name.into(),
               ..Self::default() }
    }

    /// Estado actual según el historial embebido (primera entrada).
    pub fn current_state(&self) -> Option<ExperimentState> {
        self.experiment_status.as_ref()?.first().map(|s| s.state)
    }

    /// Host de recursos elegido en la configuración de usuario, si existe.
    pub fn resource_host_id(&self) -> Option<&str> {
        self.user_configuration_data
            .as_ref()?
            .computational_resource_scheduling
            .as_ref()?
            .resource_host_id
            .as_deref()
    }

    pub fn push_status(&mut self, state: ExperimentState) {
        self.experiment_status.get_or_insert_with(Vec::new).insert(0, StatusRecord::new(state));
    }
}
