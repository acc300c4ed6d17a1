//! Filas Diesel y conversión desde/hacia las filas del catálogo.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use expcat_core::store::{ExperimentRow, JobRow, NewStatusRow, ProcessRow, StatusRow, TaskRow};
use expcat_core::{ExperimentState, ExperimentSummary, JobKey, LifecycleState, RecordKey, RecordKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::PersistenceError;
use crate::schema::{experiments, jobs, processes, status_entries, tasks};

pub(crate) fn encode<T: Serialize>(row: &T) -> Result<Value, PersistenceError> {
    serde_json::to_value(row).map_err(|e| PersistenceError::Payload(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, PersistenceError> {
    serde_json::from_value(payload).map_err(|e| PersistenceError::Payload(e.to_string()))
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = experiments, primary_key(experiment_id), treat_none_as_null = true)]
pub(crate) struct NewExperimentRow<'a> {
    pub experiment_id: &'a str,
    pub project_id: &'a str,
    pub gateway_id: &'a str,
    pub user_name: &'a str,
    pub experiment_name: &'a str,
    pub description: Option<&'a str>,
    pub execution_id: Option<&'a str>,
    pub resource_host_id: Option<&'a str>,
    pub creation_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub payload: Value,
}

impl<'a> NewExperimentRow<'a> {
    pub fn from_row(row: &'a ExperimentRow) -> Result<Self, PersistenceError> {
        Ok(Self { experiment_id: &row.experiment_id,
                  project_id: &row.project_id,
                  gateway_id: &row.gateway_id,
                  user_name: &row.user_name,
                  experiment_name: &row.experiment_name,
                  description: row.description.as_deref(),
                  execution_id: row.execution_id.as_deref(),
                  resource_host_id: row.resource_host_id(),
                  creation_time: row.creation_time,
                  last_update_time: row.last_update_time,
                  payload: encode(row)? })
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = processes, primary_key(process_id))]
pub(crate) struct NewProcessRow<'a> {
    pub process_id: &'a str,
    pub experiment_id: &'a str,
    pub creation_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub payload: Value,
}

impl<'a> NewProcessRow<'a> {
    pub fn from_row(row: &'a ProcessRow) -> Result<Self, PersistenceError> {
        Ok(Self { process_id: &row.process_id,
                  experiment_id: &row.experiment_id,
                  creation_time: row.creation_time,
                  last_update_time: row.last_update_time,
                  payload: encode(row)? })
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = tasks, primary_key(task_id))]
pub(crate) struct NewTaskRow<'a> {
    pub task_id: &'a str,
    pub parent_process_id: &'a str,
    pub creation_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub payload: Value,
}

impl<'a> NewTaskRow<'a> {
    pub fn from_row(row: &'a TaskRow) -> Result<Self, PersistenceError> {
        Ok(Self { task_id: &row.task_id,
                  parent_process_id: &row.parent_process_id,
                  creation_time: row.creation_time,
                  last_update_time: row.last_update_time,
                  payload: encode(row)? })
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = jobs, primary_key(task_id, job_id))]
pub(crate) struct NewJobRow<'a> {
    pub task_id: &'a str,
    pub job_id: &'a str,
    pub process_id: &'a str,
    pub creation_time: DateTime<Utc>,
    pub payload: Value,
}

impl<'a> NewJobRow<'a> {
    pub fn from_row(row: &'a JobRow) -> Result<Self, PersistenceError> {
        Ok(Self { task_id: &row.task_id,
                  job_id: &row.job_id,
                  process_id: &row.process_id,
                  creation_time: row.creation_time,
                  payload: encode(row)? })
    }
}

/// Columnas de dueño de una entrada de estado. Para jobs, `owner_id` lleva
/// la tarea y `owner_sub_id` el id del job.
pub(crate) fn owner_columns(key: &RecordKey) -> (&'static str, &str, &str) {
    match key {
        RecordKey::Job(job) => (RecordKind::Job.as_str(), &job.task_id, &job.job_id),
        other => (other.kind().as_str(), other.id(), ""),
    }
}

fn owner_key(kind: &str, id: String, sub_id: String) -> Result<RecordKey, PersistenceError> {
    match RecordKind::parse(kind) {
        Some(RecordKind::Experiment) => Ok(RecordKey::Experiment(id)),
        Some(RecordKind::Process) => Ok(RecordKey::Process(id)),
        Some(RecordKind::Task) => Ok(RecordKey::Task(id)),
        Some(RecordKind::Job) => Ok(RecordKey::Job(JobKey::new(id, sub_id))),
        None => Err(PersistenceError::Payload(format!("unknown owner kind '{kind}'"))),
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = status_entries)]
pub(crate) struct NewStatusEntry<'a> {
    pub owner_kind: &'a str,
    pub owner_id: &'a str,
    pub owner_sub_id: &'a str,
    pub status_id: &'a str,
    pub state: &'a str,
    pub time_of_change: DateTime<Utc>,
    pub reason: Option<&'a str>,
}

impl<'a> NewStatusEntry<'a> {
    pub fn from_row(row: &'a NewStatusRow) -> Self {
        let (owner_kind, owner_id, owner_sub_id) = owner_columns(&row.owner);
        Self { owner_kind,
               owner_id,
               owner_sub_id,
               status_id: &row.status_id,
               state: &row.state,
               time_of_change: row.time_of_change,
               reason: row.reason.as_deref() }
    }
}

#[derive(Queryable, Debug)]
pub(crate) struct StatusEntry {
    pub seq: i64,
    pub owner_kind: String,
    pub owner_id: String,
    pub owner_sub_id: String,
    pub status_id: String,
    pub state: String,
    pub time_of_change: DateTime<Utc>,
    pub reason: Option<String>,
}

impl StatusEntry {
    pub fn into_row(self) -> Result<StatusRow, PersistenceError> {
        Ok(StatusRow { seq: self.seq as u64,
                       status_id: self.status_id,
                       owner: owner_key(&self.owner_kind, self.owner_id, self.owner_sub_id)?,
                       state: self.state,
                       time_of_change: self.time_of_change,
                       reason: self.reason })
    }
}

#[derive(Queryable, Debug)]
pub(crate) struct SummaryEntry {
    pub experiment_id: String,
    pub project_id: String,
    pub gateway_id: String,
    pub user_name: String,
    pub name: String,
    pub description: String,
    pub execution_id: String,
    pub resource_host_id: String,
    pub creation_time: DateTime<Utc>,
    pub experiment_status: Option<String>,
    pub status_update_time: Option<DateTime<Utc>>,
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl From<SummaryEntry> for ExperimentSummary {
    fn from(entry: SummaryEntry) -> Self {
        ExperimentSummary { experiment_id: entry.experiment_id,
                            project_id: entry.project_id,
                            gateway_id: entry.gateway_id,
                            user_name: entry.user_name,
                            name: entry.name,
                            description: non_empty(entry.description),
                            execution_id: non_empty(entry.execution_id),
                            resource_host_id: non_empty(entry.resource_host_id),
                            creation_time: entry.creation_time,
                            experiment_status: entry.experiment_status.as_deref().and_then(ExperimentState::parse),
                            status_update_time: entry.status_update_time }
    }
}
