//! Operaciones de nivel proceso.

use chrono::Utc;
use indexmap::IndexSet;
use log::debug;

use crate::constants::PROCESS_ERROR_SEED;
use crate::errors::{CatalogError, StoreResultExt};
use crate::model::{DataParam, ErrorRecord, LifecycleState, Process, ProcessState, RecordKey, RecordKind, StatusRecord};
use crate::status::StatusHistory;
use crate::store::{load_children, load_row, CatalogStore, ProcessRow};

use super::record::{prepare_error, upsert_params};
use super::Catalog;

fn key(process_id: &str) -> RecordKey {
    RecordKey::Process(process_id.to_string())
}

impl<S: CatalogStore> Catalog<S> {
    /// Crea el proceso (y sus tareas y jobs) bajo `experiment_id`.
    pub fn add_process(&self, mut process: Process, experiment_id: &str) -> Result<String, CatalogError> {
        process.experiment_id = experiment_id.to_string();
        let stored = self.add_record(process, "add_process")?;
        Ok(stored.process_id)
    }

    pub fn update_process(&self, mut process: Process, process_id: &str) -> Result<(), CatalogError> {
        process.process_id = process_id.to_string();
        self.update_record(&key(process_id), process, "update_process")?;
        Ok(())
    }

    pub fn get_process(&self, process_id: &str) -> Result<Option<Process>, CatalogError> {
        self.get_record(&key(process_id), "get_process")
    }

    /// Procesos del experimento con su árbol completo, en orden de creación.
    pub fn get_process_list(&self, experiment_id: &str) -> Result<Vec<Process>, CatalogError> {
        let experiment = self.get_experiment(experiment_id)?;
        Ok(experiment.and_then(|e| e.processes).unwrap_or_default())
    }

    pub fn get_process_ids(&self, experiment_id: &str) -> Result<Vec<String>, CatalogError> {
        let rows = load_children::<ProcessRow>(self.dyn_store(), experiment_id).context("get_process_ids",
                                                                                        experiment_id)?;
        Ok(rows.into_iter().map(|r| r.process_id).collect())
    }

    pub fn is_process_exist(&self, process_id: &str) -> Result<bool, CatalogError> {
        self.exists(&key(process_id), "is_process_exist")
    }

    pub fn remove_process(&self, process_id: &str) -> Result<bool, CatalogError> {
        self.remove_record(&key(process_id), "remove_process")
    }

    pub fn add_process_status(&self, status: StatusRecord<ProcessState>, process_id: &str) -> Result<String, CatalogError> {
        let written = self.append_status(&key(process_id), status, "add_process_status")?;
        Ok(written.status_id)
    }

    pub fn get_process_status(&self, process_id: &str) -> Result<Option<StatusRecord<ProcessState>>, CatalogError> {
        self.ledger().current(&key(process_id))
    }

    pub fn get_process_statuses(&self, process_id: &str) -> Result<StatusHistory<ProcessState>, CatalogError> {
        self.ledger().history(&key(process_id))
    }

    pub fn add_process_error(&self, error: ErrorRecord, process_id: &str) -> Result<String, CatalogError> {
        let error = prepare_error(error, process_id, PROCESS_ERROR_SEED, self.ids());
        let error_id = error.error_id.clone();
        self.modify_row::<ProcessRow, _>(&key(process_id), "add_process_error", |row| {
                row.process_errors.get_or_insert_with(Vec::new).push(error);
            })?;
        Ok(error_id)
    }

    pub fn get_process_errors(&self, process_id: &str) -> Result<Vec<ErrorRecord>, CatalogError> {
        let row = load_row::<ProcessRow>(self.dyn_store(), &key(process_id)).context("get_process_errors", process_id)?;
        Ok(row.and_then(|r| r.process_errors).unwrap_or_default())
    }

    /// Añade o reemplaza salidas por nombre.
    pub fn add_process_outputs(&self, outputs: Vec<DataParam>, process_id: &str) -> Result<(), CatalogError> {
        self.modify_row::<ProcessRow, _>(&key(process_id), "add_process_outputs", |row| {
                upsert_params(&mut row.process_outputs, outputs, process_id);
                row.last_update_time = Utc::now();
            })
    }

    pub fn get_process_outputs(&self, process_id: &str) -> Result<Option<Vec<DataParam>>, CatalogError> {
        let row = load_row::<ProcessRow>(self.dyn_store(), &key(process_id)).context("get_process_outputs", process_id)?;
        Ok(row.and_then(|r| r.process_outputs))
    }

    /// Procesos cuyo estado actual es `state`.
    ///
    /// Recorre por páginas las entradas históricas con ese estado y conserva
    /// sólo los procesos en los que sigue siendo el más reciente.
    pub fn get_process_list_in_state(&self, state: ProcessState) -> Result<Vec<Process>, CatalogError> {
        let page = self.settings().state_scan_page.max(1);
        debug!("get_process_list_in_state:start state={state} page={page}");
        let mut seen = IndexSet::new();
        let mut offset = 0;
        loop {
            let entries = self.dyn_store()
                              .status_entries_in_state(RecordKind::Process, state.as_str(), offset, page)
                              .context("get_process_list_in_state", state.as_str())?;
            let fetched = entries.len();
            seen.extend(entries.into_iter().map(|e| e.owner));
            if fetched < page {
                break;
            }
            offset += page;
        }

        let mut processes = Vec::new();
        for owner in seen {
            let current = self.ledger().current::<ProcessState>(&owner)?;
            if current.is_some_and(|c| c.state == state) {
                if let Some(process) = self.get_record::<Process>(&owner, "get_process_list_in_state")? {
                    processes.push(process);
                }
            }
        }
        debug!("get_process_list_in_state:done state={state} count={}", processes.len());
        Ok(processes)
    }
}
