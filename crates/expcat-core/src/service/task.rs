//! Operaciones de nivel tarea.

use crate::constants::TASK_ERROR_SEED;
use crate::errors::{CatalogError, StoreResultExt};
use crate::model::{ErrorRecord, RecordKey, RecordKind, StatusRecord, Task, TaskState};
use crate::status::StatusHistory;
use crate::store::{load_row, CatalogStore, TaskRow};

use super::record::prepare_error;
use super::Catalog;

fn key(task_id: &str) -> RecordKey {
    RecordKey::Task(task_id.to_string())
}

impl<S: CatalogStore> Catalog<S> {
    pub fn add_task(&self, mut task: Task, process_id: &str) -> Result<String, CatalogError> {
        task.parent_process_id = process_id.to_string();
        let stored = self.add_record(task, "add_task")?;
        Ok(stored.task_id)
    }

    pub fn update_task(&self, mut task: Task, task_id: &str) -> Result<(), CatalogError> {
        task.task_id = task_id.to_string();
        self.update_record(&key(task_id), task, "update_task")?;
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>, CatalogError> {
        self.get_record(&key(task_id), "get_task")
    }

    /// Tareas del proceso con sus jobs, en orden de creación.
    pub fn get_task_list(&self, process_id: &str) -> Result<Vec<Task>, CatalogError> {
        let process = self.get_process(process_id)?;
        Ok(process.and_then(|p| p.tasks).unwrap_or_default())
    }

    pub fn is_task_exist(&self, task_id: &str) -> Result<bool, CatalogError> {
        self.exists(&key(task_id), "is_task_exist")
    }

    pub fn remove_task(&self, task_id: &str) -> Result<bool, CatalogError> {
        self.remove_record(&key(task_id), "remove_task")
    }

    /// Borra todas las tareas del proceso. Devuelve cuántas había.
    pub fn delete_tasks(&self, process_id: &str) -> Result<usize, CatalogError> {
        let rows = self.dyn_store()
                       .find_children(RecordKind::Task, process_id)
                       .context("delete_tasks", process_id)?;
        self.remove_many(rows.iter().map(|r| r.key()).collect(), "delete_tasks", process_id)
    }

    pub fn add_task_status(&self, status: StatusRecord<TaskState>, task_id: &str) -> Result<String, CatalogError> {
        let written = self.append_status(&key(task_id), status, "add_task_status")?;
        Ok(written.status_id)
    }

    pub fn get_task_status(&self, task_id: &str) -> Result<Option<StatusRecord<TaskState>>, CatalogError> {
        self.ledger().current(&key(task_id))
    }

    pub fn get_task_statuses(&self, task_id: &str) -> Result<StatusHistory<TaskState>, CatalogError> {
        self.ledger().history(&key(task_id))
    }

    pub fn add_task_error(&self, error: ErrorRecord, task_id: &str) -> Result<String, CatalogError> {
        let error = prepare_error(error, task_id, TASK_ERROR_SEED, self.ids());
        let error_id = error.error_id.clone();
        self.modify_row::<TaskRow, _>(&key(task_id), "add_task_error", |row| {
                row.task_errors.get_or_insert_with(Vec::new).push(error);
            })?;
        Ok(error_id)
    }

    pub fn get_task_errors(&self, task_id: &str) -> Result<Vec<ErrorRecord>, CatalogError> {
        let row = load_row::<TaskRow>(self.dyn_store(), &key(task_id)).context("get_task_errors", task_id)?;
        Ok(row.and_then(|r| r.task_errors).unwrap_or_default())
    }
}
