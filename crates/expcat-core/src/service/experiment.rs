//! Operaciones de nivel experimento.

use chrono::Utc;
use indexmap::IndexMap;
use log::debug;

use crate::constants::EXPERIMENT_ERROR_SEED;
use crate::errors::{CatalogError, StoreResultExt};
use crate::mapper;
use crate::model::{DataParam, ErrorRecord, Experiment, ExperimentState, Job, JobKey, JobState, RecordKey, RecordKind,
                   StatusRecord, UserConfigurationData};
use crate::status::{is_valid_transition, StatusHistory};
use crate::store::{CatalogStore, ExperimentRow, JobRow, RecordRow, StoredRow, SummaryOrder, SummaryPredicate,
                   SummaryQuery, TextField};

use super::record::{prepare_error, upsert_params};
use super::Catalog;

fn key(experiment_id: &str) -> RecordKey {
    RecordKey::Experiment(experiment_id.to_string())
}

/// Campos admitidos por `get_experiment_list`.
fn list_field(field: &str) -> Result<TextField, CatalogError> {
    match field {
        "userName" => Ok(TextField::UserName),
        "gatewayId" => Ok(TextField::GatewayId),
        "projectId" => Ok(TextField::ProjectId),
        other => Err(CatalogError::UnsupportedFilter { field: other.to_string() }),
    }
}

impl<S: CatalogStore> Catalog<S> {
    /// Crea el experimento y todo su árbol. Devuelve el id asignado.
    pub fn add_experiment(&self, experiment: Experiment) -> Result<String, CatalogError> {
        let stored = self.add_record(experiment, "add_experiment")?;
        Ok(stored.experiment_id)
    }

    pub fn update_experiment(&self, experiment_id: &str, mut experiment: Experiment) -> Result<(), CatalogError> {
        experiment.experiment_id = experiment_id.to_string();
        self.update_record(&key(experiment_id), experiment, "update_experiment")?;
        Ok(())
    }

    pub fn get_experiment(&self, experiment_id: &str) -> Result<Option<Experiment>, CatalogError> {
        self.get_record(&key(experiment_id), "get_experiment")
    }

    pub fn is_experiment_exist(&self, experiment_id: &str) -> Result<bool, CatalogError> {
        self.exists(&key(experiment_id), "is_experiment_exist")
    }

    pub fn remove_experiment(&self, experiment_id: &str) -> Result<bool, CatalogError> {
        self.remove_record(&key(experiment_id), "remove_experiment")
    }

    /// Experimentos cuyo `field` es exactamente `value`, más recientes
    /// primero. `limit = 0` no limita.
    pub fn get_experiment_list(&self,
                               field: &str,
                               value: &str,
                               limit: usize,
                               offset: usize)
                               -> Result<Vec<Experiment>, CatalogError> {
        let field = list_field(field)?;
        debug!("get_experiment_list:start field={field:?} value={value}");
        let query = SummaryQuery { candidate_ids: None,
                                   predicates: vec![SummaryPredicate::Equals(field, value.to_string())],
                                   order: Some(SummaryOrder::newest_first()),
                                   offset,
                                   limit: (limit > 0).then_some(limit) };
        let summaries = self.dyn_store().select_summaries(&query).context("get_experiment_list", value)?;
        let mut experiments = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(experiment) = self.get_experiment(&summary.experiment_id)? {
                experiments.push(experiment);
            }
        }
        debug!("get_experiment_list:done count={}", experiments.len());
        Ok(experiments)
    }

    /// Añade una entrada al historial. Devuelve el id de la entrada escrita.
    pub fn add_experiment_status(&self,
                                 status: StatusRecord<ExperimentState>,
                                 experiment_id: &str)
                                 -> Result<String, CatalogError> {
        let written = self.append_status(&key(experiment_id), status, "add_experiment_status")?;
        Ok(written.status_id)
    }

    /// Como `add_experiment_status`, pero rechaza transiciones no admitidas
    /// desde el estado actual.
    pub fn add_experiment_status_checked(&self,
                                         status: StatusRecord<ExperimentState>,
                                         experiment_id: &str)
                                         -> Result<String, CatalogError> {
        if let Some(current) = self.get_experiment_status(experiment_id)? {
            if !is_valid_transition(current.state, status.state) {
                return Err(CatalogError::InvalidTransition { from: current.state.to_string(),
                                                             to: status.state.to_string() });
            }
        }
        self.add_experiment_status(status, experiment_id)
    }

    pub fn get_experiment_status(&self,
                                 experiment_id: &str)
                                 -> Result<Option<StatusRecord<ExperimentState>>, CatalogError> {
        self.ledger().current(&key(experiment_id))
    }

    pub fn get_experiment_statuses(&self,
                                   experiment_id: &str)
                                   -> Result<StatusHistory<ExperimentState>, CatalogError> {
        self.ledger().history(&key(experiment_id))
    }

    pub fn add_experiment_error(&self, error: ErrorRecord, experiment_id: &str) -> Result<String, CatalogError> {
        let error = prepare_error(error, experiment_id, EXPERIMENT_ERROR_SEED, self.ids());
        let error_id = error.error_id.clone();
        self.modify_row::<ExperimentRow, _>(&key(experiment_id), "add_experiment_error", |row| {
                row.errors.get_or_insert_with(Vec::new).push(error);
            })?;
        Ok(error_id)
    }

    pub fn get_experiment_errors(&self, experiment_id: &str) -> Result<Vec<ErrorRecord>, CatalogError> {
        let row = self.experiment_row(experiment_id, "get_experiment_errors")?;
        Ok(row.and_then(|r| r.errors).unwrap_or_default())
    }

    /// Añade o reemplaza salidas por nombre.
    pub fn add_experiment_outputs(&self, outputs: Vec<DataParam>, experiment_id: &str) -> Result<(), CatalogError> {
        self.modify_row::<ExperimentRow, _>(&key(experiment_id), "add_experiment_outputs", |row| {
                upsert_params(&mut row.experiment_outputs, outputs, experiment_id);
                row.last_update_time = Utc::now();
            })
    }

    pub fn get_experiment_outputs(&self, experiment_id: &str) -> Result<Option<Vec<DataParam>>, CatalogError> {
        let row = self.experiment_row(experiment_id, "get_experiment_outputs")?;
        Ok(row.and_then(|r| r.experiment_outputs))
    }

    pub fn get_experiment_inputs(&self, experiment_id: &str) -> Result<Option<Vec<DataParam>>, CatalogError> {
        let row = self.experiment_row(experiment_id, "get_experiment_inputs")?;
        Ok(row.and_then(|r| r.experiment_inputs))
    }

    /// Adjunta la configuración de usuario. Devuelve el id del experimento.
    pub fn add_user_configuration_data(&self,
                                       configuration: UserConfigurationData,
                                       experiment_id: &str)
                                       -> Result<String, CatalogError> {
        self.modify_row::<ExperimentRow, _>(&key(experiment_id), "add_user_configuration_data", |row| {
                row.user_configuration_data = Some(configuration);
                row.last_update_time = Utc::now();
            })?;
        Ok(experiment_id.to_string())
    }

    pub fn update_user_configuration_data(&self,
                                          configuration: UserConfigurationData,
                                          experiment_id: &str)
                                          -> Result<(), CatalogError> {
        self.add_user_configuration_data(configuration, experiment_id).map(|_| ())
    }

    pub fn get_user_configuration_data(&self,
                                       experiment_id: &str)
                                       -> Result<Option<UserConfigurationData>, CatalogError> {
        let row = self.experiment_row(experiment_id, "get_user_configuration_data")?;
        Ok(row.and_then(|r| r.user_configuration_data))
    }

    /// Todos los jobs del experimento, a cualquier profundidad.
    pub fn get_job_details(&self, experiment_id: &str) -> Result<Vec<Job>, CatalogError> {
        let Some(snapshot) = self.snapshot_of(&key(experiment_id), "get_job_details")? else {
            return Ok(Vec::new());
        };
        snapshot.descendants
                .iter()
                .filter(|row| row.kind() == RecordKind::Job)
                .cloned()
                .map(|row| JobRow::expect_from(row).map(|j| mapper::job_tree(j, &snapshot)))
                .collect::<Result<_, _>>()
                .context("get_job_details", experiment_id)
    }

    /// Estado actual de cada job del experimento.
    pub fn get_job_statuses(&self,
                            experiment_id: &str)
                            -> Result<IndexMap<JobKey, StatusRecord<JobState>>, CatalogError> {
        let mut statuses = IndexMap::new();
        for job in self.get_job_details(experiment_id)? {
            if let Some(current) = job.job_status.and_then(|h| h.into_iter().next()) {
                statuses.insert(JobKey::new(job.task_id, job.job_id), current);
            }
        }
        Ok(statuses)
    }

    fn experiment_row(&self, experiment_id: &str, operation: &'static str) -> Result<Option<ExperimentRow>, CatalogError> {
        let row: Option<RecordRow> = self.dyn_store().find_record(&key(experiment_id)).context(operation, experiment_id)?;
        row.map(ExperimentRow::expect_from).transpose().context(operation, experiment_id)
    }
}
