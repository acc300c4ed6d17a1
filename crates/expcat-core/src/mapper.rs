//! Conversiones puras entre el modelo y las filas de almacenamiento.
//!
//! Las funciones `*_row` requieren que los instantes ya estén sellados; si
//! faltan se usa `now`. La reconstrucción de árboles (`*_tree`) parte de un
//! `Snapshot` y adjunta el historial de estados de cada nivel, más reciente
//! primero.

use chrono::{DateTime, Utc};
use log::warn;

use crate::errors::StoreError;
use crate::model::{Experiment, Job, LifecycleState, Process, RecordKey, StatusRecord, Task};
use crate::store::{newest_first, ExperimentRow, JobRow, NewStatusRow, ProcessRow, Snapshot, StatusRow, StoredRow,
                   TaskRow};

pub fn experiment_row(e: &Experiment, now: DateTime<Utc>) -> ExperimentRow {
    ExperimentRow { experiment_id: e.experiment_id.clone(),
                    project_id: e.project_id.clone(),
                    gateway_id: e.gateway_id.clone(),
                    experiment_type: e.experiment_type,
                    user_name: e.user_name.clone(),
                    experiment_name: e.experiment_name.clone(),
                    creation_time: e.creation_time.unwrap_or(now),
                    last_update_time: e.last_update_time.unwrap_or(now),
                    description: e.description.clone(),
                    execution_id: e.execution_id.clone(),
                    gateway_execution_id: e.gateway_execution_id.clone(),
                    gateway_instance_id: e.gateway_instance_id.clone(),
                    enable_email_notification: e.enable_email_notification,
                    email_addresses: e.email_addresses.clone(),
                    user_configuration_data: e.user_configuration_data.clone(),
                    experiment_inputs: e.experiment_inputs.clone(),
                    experiment_outputs: e.experiment_outputs.clone(),
                    errors: e.errors.clone() }
}

pub fn experiment_from_row(row: ExperimentRow) -> Experiment {
    Experiment { experiment_id: row.experiment_id,
                 project_id: row.project_id,
                 gateway_id: row.gateway_id,
                 experiment_type: row.experiment_type,
                 user_name: row.user_name,
                 experiment_name: row.experiment_name,
                 creation_time: Some(row.creation_time),
                 last_update_time: Some(row.last_update_time),
                 description: row.description,
                 execution_id: row.execution_id,
                 gateway_execution_id: row.gateway_execution_id,
                 gateway_instance_id: row.gateway_instance_id,
                 enable_email_notification: row.enable_email_notification,
                 email_addresses: row.email_addresses,
                 user_configuration_data: row.user_configuration_data,
                 experiment_inputs: row.experiment_inputs,
                 experiment_outputs: row.experiment_outputs,
                 experiment_status: None,
                 errors: row.errors,
                 processes: None }
}

pub fn process_row(p: &Process, now: DateTime<Utc>) -> ProcessRow {
    ProcessRow { process_id: p.process_id.clone(),
                 experiment_id: p.experiment_id.clone(),
                 creation_time: p.creation_time.unwrap_or(now),
                 last_update_time: p.last_update_time.unwrap_or(now),
                 process_detail: p.process_detail.clone(),
                 application_interface_id: p.application_interface_id.clone(),
                 application_deployment_id: p.application_deployment_id.clone(),
                 compute_resource_id: p.compute_resource_id.clone(),
                 storage_resource_id: p.storage_resource_id.clone(),
                 group_resource_profile_id: p.group_resource_profile_id.clone(),
                 task_dag: p.task_dag.clone(),
                 gateway_execution_id: p.gateway_execution_id.clone(),
                 enable_email_notification: p.enable_email_notification,
                 email_addresses: p.email_addresses.clone(),
                 user_dn: p.user_dn.clone(),
                 generate_cert: p.generate_cert,
                 experiment_data_dir: p.experiment_data_dir.clone(),
                 user_name: p.user_name.clone(),
                 use_user_cr_pref: p.use_user_cr_pref,
                 resource_schedule: p.resource_schedule.clone(),
                 process_errors: p.process_errors.clone(),
                 process_inputs: p.process_inputs.clone(),
                 process_outputs: p.process_outputs.clone() }
}

pub fn process_from_row(row: ProcessRow) -> Process {
    Process { process_id: row.process_id,
              experiment_id: row.experiment_id,
              creation_time: Some(row.creation_time),
              last_update_time: Some(row.last_update_time),
              process_detail: row.process_detail,
              application_interface_id: row.application_interface_id,
              application_deployment_id: row.application_deployment_id,
              compute_resource_id: row.compute_resource_id,
              storage_resource_id: row.storage_resource_id,
              group_resource_profile_id: row.group_resource_profile_id,
              task_dag: row.task_dag,
              gateway_execution_id: row.gateway_execution_id,
              enable_email_notification: row.enable_email_notification,
              email_addresses: row.email_addresses,
              user_dn: row.user_dn,
              generate_cert: row.generate_cert,
              experiment_data_dir: row.experiment_data_dir,
              user_name: row.user_name,
              use_user_cr_pref: row.use_user_cr_pref,
              resource_schedule: row.resource_schedule,
              process_status: None,
              process_errors: row.process_errors,
              process_inputs: row.process_inputs,
              process_outputs: row.process_outputs,
              tasks: None }
}

pub fn task_row(t: &Task, now: DateTime<Utc>) -> TaskRow {
    TaskRow { task_id: t.task_id.clone(),
              task_type: t.task_type,
              parent_process_id: t.parent_process_id.clone(),
              creation_time: t.creation_time.unwrap_or(now),
              last_update_time: t.last_update_time.unwrap_or(now),
              task_detail: t.task_detail.clone(),
              sub_task_model: t.sub_task_model.clone(),
              task_errors: t.task_errors.clone() }
}

pub fn task_from_row(row: TaskRow) -> Task {
    Task { task_id: row.task_id,
           task_type: row.task_type,
           parent_process_id: row.parent_process_id,
           creation_time: Some(row.creation_time),
           last_update_time: Some(row.last_update_time),
           task_detail: row.task_detail,
           sub_task_model: row.sub_task_model,
           task_status: None,
           task_errors: row.task_errors,
           jobs: None }
}

pub fn job_row(j: &Job, now: DateTime<Utc>) -> JobRow {
    JobRow { job_id: j.job_id.clone(),
             task_id: j.task_id.clone(),
             process_id: j.process_id.clone(),
             job_description: j.job_description.clone(),
             creation_time: j.creation_time.unwrap_or(now),
             compute_resource_consumed: j.compute_resource_consumed.clone(),
             job_name: j.job_name.clone(),
             working_dir: j.working_dir.clone(),
             std_out: j.std_out.clone(),
             std_err: j.std_err.clone(),
             exit_code: j.exit_code }
}

pub fn job_from_row(row: JobRow) -> Job {
    Job { job_id: row.job_id,
          task_id: row.task_id,
          process_id: row.process_id,
          job_description: row.job_description,
          creation_time: Some(row.creation_time),
          compute_resource_consumed: row.compute_resource_consumed,
          job_name: row.job_name,
          working_dir: row.working_dir,
          std_out: row.std_out,
          std_err: row.std_err,
          exit_code: row.exit_code,
          job_status: None }
}

/// Fila a insertar para una entrada ya resuelta (id y dueño asignados).
pub fn status_row<S: LifecycleState>(status: &StatusRecord<S>, owner: &RecordKey, now: DateTime<Utc>) -> NewStatusRow {
    NewStatusRow { status_id: status.status_id.clone(),
                   owner: owner.clone(),
                   state: status.state.as_str().to_string(),
                   time_of_change: status.time_of_state_change.unwrap_or(now),
                   reason: status.reason.clone() }
}

pub fn status_from_row<S: LifecycleState>(row: StatusRow) -> Result<StatusRecord<S>, StoreError> {
    let state = S::parse(&row.state).ok_or_else(|| {
                                         StoreError::Corrupt(format!("unknown {} state '{}' in status {}",
                                                                     S::LEVEL,
                                                                     row.state,
                                                                     row.status_id))
                                     })?;
    Ok(StatusRecord { status_id: row.status_id,
                      owner: Some(row.owner),
                      state,
                      time_of_state_change: Some(row.time_of_change),
                      reason: row.reason })
}

/// Historial de un dueño dentro de un snapshot. Entradas ilegibles se
/// descartan con aviso.
fn history_in<S: LifecycleState>(snapshot: &Snapshot, owner: &RecordKey) -> Option<Vec<StatusRecord<S>>> {
    let mut rows: Vec<StatusRow> = snapshot.statuses.iter().filter(|s| &s.owner == owner).cloned().collect();
    if rows.is_empty() {
        return None;
    }
    rows.sort_by(newest_first);
    Some(rows.into_iter()
             .filter_map(|row| match status_from_row(row) {
                 Ok(s) => Some(s),
                 Err(e) => {
                     warn!("history:skip owner={owner} err={e}");
                     None
                 }
             })
             .collect())
}

fn children<R: StoredRow>(snapshot: &Snapshot, parent: &RecordKey) -> Result<Vec<R>, StoreError> {
    snapshot.children_of(parent).cloned().map(R::expect_from).collect()
}

pub fn job_tree(row: JobRow, snapshot: &Snapshot) -> Job {
    let key = RecordKey::Job(row.key());
    let mut job = job_from_row(row);
    job.job_status = history_in(snapshot, &key);
    job
}

pub fn task_tree(row: TaskRow, snapshot: &Snapshot) -> Result<Task, StoreError> {
    let key = RecordKey::Task(row.task_id.clone());
    let jobs = children::<JobRow>(snapshot, &key)?;
    let mut task = task_from_row(row);
    task.task_status = history_in(snapshot, &key);
    task.jobs = Some(jobs.into_iter().map(|j| job_tree(j, snapshot)).collect());
    Ok(task)
}

pub fn process_tree(row: ProcessRow, snapshot: &Snapshot) -> Result<Process, StoreError> {
    let key = RecordKey::Process(row.process_id.clone());
    let tasks = children::<TaskRow>(snapshot, &key)?;
    let mut process = process_from_row(row);
    process.process_status = history_in(snapshot, &key);
    process.tasks = Some(tasks.into_iter().map(|t| task_tree(t, snapshot)).collect::<Result<_, _>>()?);
    Ok(process)
}

pub fn experiment_tree(row: ExperimentRow, snapshot: &Snapshot) -> Result<Experiment, StoreError> {
    let key = RecordKey::Experiment(row.experiment_id.clone());
    let processes = children::<ProcessRow>(snapshot, &key)?;
    let mut experiment = experiment_from_row(row);
    experiment.experiment_status = history_in(snapshot, &key);
    experiment.processes = Some(processes.into_iter()
                                         .map(|p| process_tree(p, snapshot))
                                         .collect::<Result<_, _>>()?);
    Ok(experiment)
}

/// Reconstruye el árbol del nivel `R` a partir de la raíz del snapshot.
pub fn root_row<R: StoredRow>(snapshot: &Snapshot) -> Result<R, StoreError> {
    R::expect_from(snapshot.root.clone())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{ExperimentState, JobState};

    #[test]
    fn status_rows_carry_canonical_state_names() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let owner = RecordKey::Experiment("e".into());
        let mut s = StatusRecord::new(ExperimentState::Canceling).with_reason("user asked");
        s.status_id = "s1".into();
        let row = status_row(&s, &owner, now);
        assert_eq!(row.state, "CANCELING");
        assert_eq!(row.time_of_change, now);

        let back: StatusRecord<ExperimentState> = status_from_row(StatusRow::from_new(7, row)).unwrap();
        assert_eq!(back.state, ExperimentState::Canceling);
        assert_eq!(back.owner, Some(owner));
    }

    #[test]
    fn unknown_states_are_reported_as_corrupt() {
        let row = StatusRow { seq: 1,
                              status_id: "s".into(),
                              owner: RecordKey::Experiment("e".into()),
                              state: "EXPLODED".into(),
                              time_of_change: Utc::now(),
                              reason: None };
        let err = status_from_row::<JobState>(row).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
