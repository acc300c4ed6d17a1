//! `CatalogStore` sobre Postgres.

use std::collections::HashMap;

use diesel::dsl::exists;
use diesel::pg::Pg;
use diesel::prelude::*;
use expcat_core::store::{sort_siblings, CatalogStore, ExperimentRow, JobLookup, JobRow, Mutation, ProcessRow,
                         RecordRow, Snapshot, SortDirection, StatusRow, SummaryPredicate, SummaryQuery, TaskRow,
                         TextField, UnitOfWork};
use expcat_core::{ExperimentSummary, LifecycleState, RecordKey, RecordKind, StoreError};
use log::{debug, error};
use serde_json::Value;

use super::rows::{decode, owner_columns, NewExperimentRow, NewJobRow, NewProcessRow, NewStatusEntry, NewTaskRow,
                  StatusEntry, SummaryEntry};
use super::ConnectionProvider;
use crate::error::PersistenceError;
use crate::schema::{experiment_summary, experiments, jobs, processes, status_entries, tasks};

/// Implementación Postgres de `CatalogStore`.
pub struct PgCatalogStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgCatalogStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Ejecuta `f` en una transacción de sólo lectura con lectura repetible,
    /// para que todas sus consultas vean el mismo estado.
    fn read<T, F>(&self, operation: &str, f: F) -> Result<T, StoreError>
        where F: FnOnce(&mut PgConnection) -> Result<T, PersistenceError>
    {
        let mut conn = self.provider.connection().map_err(|e| log_failure(operation, e))?;
        conn.build_transaction()
            .repeatable_read()
            .read_only()
            .run(f)
            .map_err(|e| log_failure(operation, e))
    }
}

fn log_failure(operation: &str, e: PersistenceError) -> StoreError {
    error!("{operation}:error err={e}");
    StoreError::from(e)
}

type Conn = PgConnection;

fn load_payload(conn: &mut Conn, key: &RecordKey) -> Result<Option<Value>, PersistenceError> {
    let payload = match key {
        RecordKey::Experiment(id) => experiments::table.filter(experiments::experiment_id.eq(id))
                                                       .select(experiments::payload)
                                                       .first::<Value>(conn)
                                                       .optional()?,
        RecordKey::Process(id) => processes::table.filter(processes::process_id.eq(id))
                                                  .select(processes::payload)
                                                  .first::<Value>(conn)
                                                  .optional()?,
        RecordKey::Task(id) => tasks::table.filter(tasks::task_id.eq(id))
                                           .select(tasks::payload)
                                           .first::<Value>(conn)
                                           .optional()?,
        RecordKey::Job(job) => jobs::table.filter(jobs::task_id.eq(&job.task_id))
                                          .filter(jobs::job_id.eq(&job.job_id))
                                          .select(jobs::payload)
                                          .first::<Value>(conn)
                                          .optional()?,
    };
    Ok(payload)
}

fn decode_record(kind: RecordKind, payload: Value) -> Result<RecordRow, PersistenceError> {
    Ok(match kind {
        RecordKind::Experiment => RecordRow::Experiment(decode::<ExperimentRow>(payload)?),
        RecordKind::Process => RecordRow::Process(decode::<ProcessRow>(payload)?),
        RecordKind::Task => RecordRow::Task(decode::<TaskRow>(payload)?),
        RecordKind::Job => RecordRow::Job(decode::<JobRow>(payload)?),
    })
}

fn find_record(conn: &mut Conn, key: &RecordKey) -> Result<Option<RecordRow>, PersistenceError> {
    load_payload(conn, key)?.map(|p| decode_record(key.kind(), p)).transpose()
}

fn processes_of(conn: &mut Conn, experiment_ids: &[String]) -> Result<Vec<ProcessRow>, PersistenceError> {
    let payloads: Vec<Value> = processes::table.filter(processes::experiment_id.eq_any(experiment_ids))
                                               .order((processes::creation_time.asc(), processes::process_id.asc()))
                                               .select(processes::payload)
                                               .load(conn)?;
    payloads.into_iter().map(decode).collect()
}

fn tasks_of(conn: &mut Conn, process_ids: &[String]) -> Result<Vec<TaskRow>, PersistenceError> {
    let payloads: Vec<Value> = tasks::table.filter(tasks::parent_process_id.eq_any(process_ids))
                                           .order((tasks::creation_time.asc(), tasks::task_id.asc()))
                                           .select(tasks::payload)
                                           .load(conn)?;
    payloads.into_iter().map(decode).collect()
}

fn jobs_of(conn: &mut Conn, task_ids: &[String]) -> Result<Vec<JobRow>, PersistenceError> {
    let payloads: Vec<Value> = jobs::table.filter(jobs::task_id.eq_any(task_ids))
                                          .order((jobs::creation_time.asc(), jobs::task_id.asc(), jobs::job_id.asc()))
                                          .select(jobs::payload)
                                          .load(conn)?;
    payloads.into_iter().map(decode).collect()
}

fn statuses_of(conn: &mut Conn, kind: RecordKind, owner_ids: &[String]) -> Result<Vec<StatusRow>, PersistenceError> {
    if owner_ids.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<StatusEntry> = status_entries::table.filter(status_entries::owner_kind.eq(kind.as_str()))
                                                         .filter(status_entries::owner_id.eq_any(owner_ids))
                                                         .order(status_entries::seq.asc())
                                                         .load(conn)?;
    entries.into_iter().map(StatusEntry::into_row).collect()
}

fn owner_entries(conn: &mut Conn, owner: &RecordKey) -> Result<Vec<StatusRow>, PersistenceError> {
    let (kind, id, sub_id) = owner_columns(owner);
    let entries: Vec<StatusEntry> = status_entries::table.filter(status_entries::owner_kind.eq(kind))
                                                         .filter(status_entries::owner_id.eq(id))
                                                         .filter(status_entries::owner_sub_id.eq(sub_id))
                                                         .order((status_entries::time_of_change.desc(),
                                                                 status_entries::seq.desc()))
                                                         .load(conn)?;
    entries.into_iter().map(StatusEntry::into_row).collect()
}

fn snapshot(conn: &mut Conn, root: &RecordKey) -> Result<Option<Snapshot>, PersistenceError> {
    let Some(root_row) = find_record(conn, root)? else {
        return Ok(None);
    };
    let mut descendants = Vec::new();
    let mut statuses = owner_entries(conn, root)?;

    let (process_ids, task_ids) = match root {
        RecordKey::Experiment(id) => {
            let processes = processes_of(conn, std::slice::from_ref(id))?;
            let process_ids: Vec<String> = processes.iter().map(|p| p.process_id.clone()).collect();
            descendants.extend(processes.into_iter().map(RecordRow::Process));
            let tasks = tasks_of(conn, &process_ids)?;
            let task_ids: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();
            descendants.extend(tasks.into_iter().map(RecordRow::Task));
            (process_ids, task_ids)
        }
        RecordKey::Process(id) => {
            let tasks = tasks_of(conn, std::slice::from_ref(id))?;
            let task_ids: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();
            descendants.extend(tasks.into_iter().map(RecordRow::Task));
            (Vec::new(), task_ids)
        }
        RecordKey::Task(id) => (Vec::new(), vec![id.clone()]),
        RecordKey::Job(_) => (Vec::new(), Vec::new()),
    };
    // Los estados de la tarea raíz ya están en `statuses`.
    let task_status_ids: &[String] = if matches!(root, RecordKey::Task(_)) { &[] } else { &task_ids };
    descendants.extend(jobs_of(conn, &task_ids)?.into_iter().map(RecordRow::Job));

    statuses.extend(statuses_of(conn, RecordKind::Process, &process_ids)?);
    statuses.extend(statuses_of(conn, RecordKind::Task, task_status_ids)?);
    statuses.extend(statuses_of(conn, RecordKind::Job, &task_ids)?);

    sort_siblings(&mut descendants);
    Ok(Some(Snapshot { root: root_row,
                       descendants,
                       statuses }))
}

/// Escapa los comodines de LIKE para buscar la subcadena literal.
fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

type SummaryDsl = experiment_summary::BoxedQuery<'static, Pg>;

macro_rules! text_filter {
    ($query:expr, $field:expr, |$column:ident| $condition:expr) => {
        match $field {
            TextField::UserName => {
                let $column = experiment_summary::user_name;
                $query.filter($condition)
            }
            TextField::GatewayId => {
                let $column = experiment_summary::gateway_id;
                $query.filter($condition)
            }
            TextField::ProjectId => {
                let $column = experiment_summary::project_id;
                $query.filter($condition)
            }
            TextField::Name => {
                let $column = experiment_summary::name;
                $query.filter($condition)
            }
            TextField::Description => {
                let $column = experiment_summary::description;
                $query.filter($condition)
            }
            TextField::ExecutionId => {
                let $column = experiment_summary::execution_id;
                $query.filter($condition)
            }
            TextField::ResourceHostId => {
                let $column = experiment_summary::resource_host_id;
                $query.filter($condition)
            }
        }
    };
}

/// Experimentos que poseen cada job pedido en un predicado `HasJob`.
fn job_owners(conn: &mut Conn, query: &SummaryQuery) -> Result<HashMap<String, Vec<String>>, PersistenceError> {
    let mut owners = HashMap::new();
    for predicate in &query.predicates {
        if let SummaryPredicate::HasJob(job_id) = predicate {
            let process_ids: Vec<String> = jobs::table.filter(jobs::job_id.eq(job_id))
                                                      .select(jobs::process_id)
                                                      .load(conn)?;
            let experiment_ids: Vec<String> = processes::table.filter(processes::process_id.eq_any(process_ids))
                                                              .select(processes::experiment_id)
                                                              .distinct()
                                                              .load(conn)?;
            owners.insert(job_id.clone(), experiment_ids);
        }
    }
    Ok(owners)
}

fn filtered(query: &SummaryQuery, owners: &HashMap<String, Vec<String>>) -> SummaryDsl {
    let mut q = experiment_summary::table.into_boxed::<Pg>();
    if let Some(ids) = &query.candidate_ids {
        q = q.filter(experiment_summary::experiment_id.eq_any(ids.clone()));
    }
    for predicate in &query.predicates {
        q = match predicate {
            SummaryPredicate::Contains(field, needle) => {
                let pattern = like_pattern(needle);
                text_filter!(q, field, |column| column.like(pattern))
            }
            SummaryPredicate::Equals(field, value) => text_filter!(q, field, |column| column.eq(value.clone())),
            SummaryPredicate::StatusIn(states) => {
                let names: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
                q.filter(experiment_summary::experiment_status.eq_any(names))
            }
            SummaryPredicate::CreatedBetween { from, to } => {
                q.filter(experiment_summary::creation_time.between(*from, *to))
            }
            SummaryPredicate::HasJob(job_id) => {
                let ids = owners.get(job_id).cloned().unwrap_or_default();
                q.filter(experiment_summary::experiment_id.eq_any(ids))
            }
        };
    }
    q
}

fn apply(conn: &mut Conn, mutation: &Mutation) -> Result<(), PersistenceError> {
    match mutation {
        Mutation::Upsert(RecordRow::Experiment(row)) => {
            let new = NewExperimentRow::from_row(row)?;
            diesel::insert_into(experiments::table).values(&new)
                                                   .on_conflict(experiments::experiment_id)
                                                   .do_update()
                                                   .set(&new)
                                                   .execute(conn)?;
        }
        Mutation::Upsert(RecordRow::Process(row)) => {
            let new = NewProcessRow::from_row(row)?;
            diesel::insert_into(processes::table).values(&new)
                                                 .on_conflict(processes::process_id)
                                                 .do_update()
                                                 .set(&new)
                                                 .execute(conn)?;
        }
        Mutation::Upsert(RecordRow::Task(row)) => {
            let new = NewTaskRow::from_row(row)?;
            diesel::insert_into(tasks::table).values(&new)
                                             .on_conflict(tasks::task_id)
                                             .do_update()
                                             .set(&new)
                                             .execute(conn)?;
        }
        Mutation::Upsert(RecordRow::Job(row)) => {
            let new = NewJobRow::from_row(row)?;
            diesel::insert_into(jobs::table).values(&new)
                                            .on_conflict((jobs::task_id, jobs::job_id))
                                            .do_update()
                                            .set(&new)
                                            .execute(conn)?;
        }
        Mutation::Delete(key) => {
            match key {
                RecordKey::Experiment(id) => {
                    diesel::delete(experiments::table.filter(experiments::experiment_id.eq(id))).execute(conn)?
                }
                RecordKey::Process(id) => {
                    diesel::delete(processes::table.filter(processes::process_id.eq(id))).execute(conn)?
                }
                RecordKey::Task(id) => diesel::delete(tasks::table.filter(tasks::task_id.eq(id))).execute(conn)?,
                RecordKey::Job(job) => diesel::delete(jobs::table.filter(jobs::task_id.eq(&job.task_id))
                                                                 .filter(jobs::job_id.eq(&job.job_id))).execute(conn)?,
            };
        }
        Mutation::InsertStatus(status) => {
            diesel::insert_into(status_entries::table).values(&NewStatusEntry::from_row(status))
                                                      .on_conflict((status_entries::owner_kind,
                                                                    status_entries::owner_id,
                                                                    status_entries::owner_sub_id,
                                                                    status_entries::status_id))
                                                      .do_nothing()
                                                      .execute(conn)?;
        }
        Mutation::PurgeStatuses(owner) => {
            let (kind, id, sub_id) = owner_columns(owner);
            diesel::delete(status_entries::table.filter(status_entries::owner_kind.eq(kind))
                                                .filter(status_entries::owner_id.eq(id))
                                                .filter(status_entries::owner_sub_id.eq(sub_id))).execute(conn)?;
        }
    }
    Ok(())
}

impl<P: ConnectionProvider> CatalogStore for PgCatalogStore<P> {
    fn find_record(&self, key: &RecordKey) -> Result<Option<RecordRow>, StoreError> {
        debug!("find_record:start key={key}");
        let mut conn = self.provider.connection().map_err(|e| log_failure("find_record", e))?;
        find_record(&mut conn, key).map_err(|e| log_failure("find_record", e))
    }

    fn record_exists(&self, key: &RecordKey) -> Result<bool, StoreError> {
        let mut conn = self.provider.connection().map_err(|e| log_failure("record_exists", e))?;
        let found = match key {
            RecordKey::Experiment(id) => {
                diesel::select(exists(experiments::table.filter(experiments::experiment_id.eq(id))))
                    .get_result::<bool>(&mut conn)
            }
            RecordKey::Process(id) => {
                diesel::select(exists(processes::table.filter(processes::process_id.eq(id)))).get_result::<bool>(&mut conn)
            }
            RecordKey::Task(id) => {
                diesel::select(exists(tasks::table.filter(tasks::task_id.eq(id)))).get_result::<bool>(&mut conn)
            }
            RecordKey::Job(job) => {
                diesel::select(exists(jobs::table.filter(jobs::task_id.eq(&job.task_id))
                                                 .filter(jobs::job_id.eq(&job.job_id))))
                    .get_result::<bool>(&mut conn)
            }
        };
        found.map_err(|e| log_failure("record_exists", e.into()))
    }

    fn find_all(&self, kind: RecordKind) -> Result<Vec<RecordRow>, StoreError> {
        self.read("find_all", |conn| {
                let payloads: Vec<Value> = match kind {
                    RecordKind::Experiment => experiments::table.order((experiments::creation_time.asc(),
                                                                        experiments::experiment_id.asc()))
                                                                .select(experiments::payload)
                                                                .load(conn)?,
                    RecordKind::Process => processes::table.order((processes::creation_time.asc(),
                                                                   processes::process_id.asc()))
                                                           .select(processes::payload)
                                                           .load(conn)?,
                    RecordKind::Task => tasks::table.order((tasks::creation_time.asc(), tasks::task_id.asc()))
                                                    .select(tasks::payload)
                                                    .load(conn)?,
                    RecordKind::Job => jobs::table.order((jobs::creation_time.asc(),
                                                          jobs::task_id.asc(),
                                                          jobs::job_id.asc()))
                                                  .select(jobs::payload)
                                                  .load(conn)?,
                };
                payloads.into_iter().map(|p| decode_record(kind, p)).collect()
            })
    }

    fn find_children(&self, kind: RecordKind, parent_id: &str) -> Result<Vec<RecordRow>, StoreError> {
        let parent = [parent_id.to_string()];
        self.read("find_children", |conn| {
                Ok(match kind {
                    RecordKind::Experiment => Vec::new(),
                    RecordKind::Process => processes_of(conn, &parent)?.into_iter().map(RecordRow::Process).collect(),
                    RecordKind::Task => tasks_of(conn, &parent)?.into_iter().map(RecordRow::Task).collect(),
                    RecordKind::Job => jobs_of(conn, &parent)?.into_iter().map(RecordRow::Job).collect(),
                })
            })
    }

    fn find_jobs(&self, lookup: &JobLookup) -> Result<Vec<JobRow>, StoreError> {
        debug!("find_jobs:start lookup={lookup:?}");
        self.read("find_jobs", |conn| {
                let mut q = jobs::table.into_boxed::<Pg>();
                q = match lookup {
                    JobLookup::ByTask(id) => q.filter(jobs::task_id.eq(id.clone())),
                    JobLookup::ByProcess(id) => q.filter(jobs::process_id.eq(id.clone())),
                    JobLookup::ByJobId(id) => q.filter(jobs::job_id.eq(id.clone())),
                };
                let payloads: Vec<Value> = q.order((jobs::creation_time.asc(), jobs::task_id.asc(), jobs::job_id.asc()))
                                            .select(jobs::payload)
                                            .load(conn)?;
                payloads.into_iter().map(decode).collect()
            })
    }

    fn snapshot(&self, root: &RecordKey) -> Result<Option<Snapshot>, StoreError> {
        debug!("snapshot:start root={root}");
        let snap = self.read("snapshot", |conn| snapshot(conn, root))?;
        debug!("snapshot:done root={root} found={}", snap.is_some());
        Ok(snap)
    }

    fn status_entries(&self, owner: &RecordKey) -> Result<Vec<StatusRow>, StoreError> {
        let mut conn = self.provider.connection().map_err(|e| log_failure("status_entries", e))?;
        owner_entries(&mut conn, owner).map_err(|e| log_failure("status_entries", e))
    }

    fn latest_status(&self, owner: &RecordKey) -> Result<Option<StatusRow>, StoreError> {
        let (kind, id, sub_id) = owner_columns(owner);
        let mut conn = self.provider.connection().map_err(|e| log_failure("latest_status", e))?;
        let entry: Option<StatusEntry> =
            status_entries::table.filter(status_entries::owner_kind.eq(kind))
                                 .filter(status_entries::owner_id.eq(id))
                                 .filter(status_entries::owner_sub_id.eq(sub_id))
                                 .order((status_entries::time_of_change.desc(), status_entries::seq.desc()))
                                 .first(&mut conn)
                                 .optional()
                                 .map_err(|e| log_failure("latest_status", e.into()))?;
        entry.map(StatusEntry::into_row).transpose().map_err(|e| log_failure("latest_status", e))
    }

    fn status_entries_in_state(&self,
                               kind: RecordKind,
                               state: &str,
                               offset: usize,
                               limit: usize)
                               -> Result<Vec<StatusRow>, StoreError> {
        let mut conn = self.provider.connection().map_err(|e| log_failure("status_entries_in_state", e))?;
        let entries: Vec<StatusEntry> = status_entries::table.filter(status_entries::owner_kind.eq(kind.as_str()))
                                                             .filter(status_entries::state.eq(state))
                                                             .order(status_entries::seq.asc())
                                                             .offset(offset as i64)
                                                             .limit(limit as i64)
                                                             .load(&mut conn)
                                                             .map_err(|e| {
                                                                 log_failure("status_entries_in_state", e.into())
                                                             })?;
        entries.into_iter()
               .map(StatusEntry::into_row)
               .collect::<Result<_, _>>()
               .map_err(|e| log_failure("status_entries_in_state", e))
    }

    fn select_summaries(&self, query: &SummaryQuery) -> Result<Vec<ExperimentSummary>, StoreError> {
        if query.candidate_ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }
        self.read("select_summaries", |conn| {
                let owners = job_owners(conn, query)?;
                let mut q = filtered(query, &owners);
                if let Some(order) = query.order {
                    q = match order.direction {
                        SortDirection::Asc => {
                            q.order((experiment_summary::creation_time.asc(), experiment_summary::experiment_id.asc()))
                        }
                        SortDirection::Desc => {
                            q.order((experiment_summary::creation_time.desc(), experiment_summary::experiment_id.asc()))
                        }
                    };
                }
                q = q.offset(query.offset as i64);
                if let Some(limit) = query.limit {
                    q = q.limit(limit as i64);
                }
                let entries: Vec<SummaryEntry> = q.load(conn)?;
                Ok(entries.into_iter().map(ExperimentSummary::from).collect())
            })
    }

    fn count_summaries(&self, query: &SummaryQuery) -> Result<u64, StoreError> {
        if query.candidate_ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(0);
        }
        self.read("count_summaries", |conn| {
                let owners = job_owners(conn, query)?;
                let total: i64 = filtered(query, &owners).count().get_result(conn)?;
                Ok(total as u64)
            })
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        if unit.is_empty() {
            return Ok(());
        }
        debug!("commit:start mutations={}", unit.len());
        let mut conn = self.provider.connection().map_err(|e| log_failure("commit", e))?;
        conn.build_transaction()
            .read_write()
            .run(|tx| {
                for mutation in unit.mutations() {
                    apply(tx, mutation)?;
                }
                Ok::<(), PersistenceError>(())
            })
            .map_err(|e| log_failure("commit", e))?;
        debug!("commit:done mutations={}", unit.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("a%b_c"), "%a\\%b\\_c%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
