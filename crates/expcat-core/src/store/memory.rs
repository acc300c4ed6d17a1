//! Backend en memoria de `CatalogStore`.
//!
//! Todas las tablas viven bajo un único `RwLock`, de modo que una
//! `UnitOfWork` se aplica completa sin que ningún lector vea un estado
//! intermedio. Replica las restricciones de integridad del backend Postgres
//! (un hijo no puede referenciar a un padre inexistente).

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::query::{JobLookup, SummaryQuery};
use super::rows::{newest_first, ExperimentRow, JobRow, ProcessRow, RecordRow, StatusRow, TaskRow};
use super::{sort_siblings, CatalogStore, Mutation, Snapshot, UnitOfWork};
use crate::errors::StoreError;
use crate::model::{ExperimentState, ExperimentSummary, JobKey, LifecycleState, RecordKey, RecordKind};

#[derive(Debug, Default)]
struct Tables {
    experiments: IndexMap<String, ExperimentRow>,
    processes: IndexMap<String, ProcessRow>,
    tasks: IndexMap<String, TaskRow>,
    jobs: IndexMap<JobKey, JobRow>,
    statuses: IndexMap<RecordKey, Vec<StatusRow>>,
    next_seq: u64,
}

impl Tables {
    fn get(&self, key: &RecordKey) -> Option<RecordRow> {
        match key {
            RecordKey::Experiment(id) => self.experiments.get(id).cloned().map(RecordRow::Experiment),
            RecordKey::Process(id) => self.processes.get(id).cloned().map(RecordRow::Process),
            RecordKey::Task(id) => self.tasks.get(id).cloned().map(RecordRow::Task),
            RecordKey::Job(k) => self.jobs.get(k).cloned().map(RecordRow::Job),
        }
    }

    fn contains(&self, key: &RecordKey) -> bool {
        match key {
            RecordKey::Experiment(id) => self.experiments.contains_key(id),
            RecordKey::Process(id) => self.processes.contains_key(id),
            RecordKey::Task(id) => self.tasks.contains_key(id),
            RecordKey::Job(k) => self.jobs.contains_key(k),
        }
    }

    fn children(&self, kind: RecordKind, parent_id: &str) -> Vec<RecordRow> {
        let mut rows: Vec<RecordRow> = match kind {
            RecordKind::Experiment => Vec::new(),
            RecordKind::Process => self.processes
                                       .values()
                                       .filter(|p| p.experiment_id == parent_id)
                                       .cloned()
                                       .map(RecordRow::Process)
                                       .collect(),
            RecordKind::Task => self.tasks
                                    .values()
                                    .filter(|t| t.parent_process_id == parent_id)
                                    .cloned()
                                    .map(RecordRow::Task)
                                    .collect(),
            RecordKind::Job => self.jobs
                                   .values()
                                   .filter(|j| j.task_id == parent_id)
                                   .cloned()
                                   .map(RecordRow::Job)
                                   .collect(),
        };
        sort_siblings(&mut rows);
        rows
    }

    fn latest(&self, owner: &RecordKey) -> Option<&StatusRow> {
        self.statuses.get(owner)?.iter().min_by(|a, b| newest_first(a, b))
    }

    fn summary(&self, row: &ExperimentRow) -> ExperimentSummary {
        let latest = self.latest(&RecordKey::Experiment(row.experiment_id.clone()));
        ExperimentSummary { experiment_id: row.experiment_id.clone(),
                            project_id: row.project_id.clone(),
                            gateway_id: row.gateway_id.clone(),
                            user_name: row.user_name.clone(),
                            name: row.experiment_name.clone(),
                            description: row.description.clone(),
                            execution_id: row.execution_id.clone(),
                            resource_host_id: row.resource_host_id().map(str::to_string),
                            creation_time: row.creation_time,
                            experiment_status: latest.and_then(|s| ExperimentState::parse(&s.state)),
                            status_update_time: latest.map(|s| s.time_of_change) }
    }

    fn experiment_owns_job(&self, experiment_id: &str, job_id: &str) -> bool {
        self.jobs.values().any(|j| {
                              j.job_id == job_id
                              && self.processes
                                     .get(&j.process_id)
                                     .is_some_and(|p| p.experiment_id == experiment_id)
                          })
    }

    fn matching(&self, query: &SummaryQuery) -> Vec<ExperimentSummary> {
        let owns_job = |exp: &str, job: &str| self.experiment_owns_job(exp, job);
        let candidates: Box<dyn Iterator<Item = &ExperimentRow> + '_> = match &query.candidate_ids {
            Some(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                Box::new(self.experiments.values().filter(move |e| wanted.contains(e.experiment_id.as_str())))
            }
            None => Box::new(self.experiments.values()),
        };
        candidates.map(|row| self.summary(row))
                  .filter(|s| query.matches(s, &owns_job))
                  .collect()
    }

    /// Clave del padre presente en las tablas o en la propia unidad.
    fn check_parent(&self, row: &RecordRow, pending: &HashSet<RecordKey>) -> Result<(), StoreError> {
        match row.parent_key() {
            Some(parent) if !self.contains(&parent) && !pending.contains(&parent) => {
                Err(StoreError::Constraint(format!("{} references missing parent {parent}", row.key())))
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Upsert(RecordRow::Experiment(r)) => {
                self.experiments.insert(r.experiment_id.clone(), r);
            }
            Mutation::Upsert(RecordRow::Process(r)) => {
                self.processes.insert(r.process_id.clone(), r);
            }
            Mutation::Upsert(RecordRow::Task(r)) => {
                self.tasks.insert(r.task_id.clone(), r);
            }
            Mutation::Upsert(RecordRow::Job(r)) => {
                self.jobs.insert(r.key(), r);
            }
            Mutation::Delete(key) => match key {
                RecordKey::Experiment(id) => {
                    self.experiments.shift_remove(&id);
                }
                RecordKey::Process(id) => {
                    self.processes.shift_remove(&id);
                }
                RecordKey::Task(id) => {
                    self.tasks.shift_remove(&id);
                }
                RecordKey::Job(k) => {
                    self.jobs.shift_remove(&k);
                }
            },
            Mutation::InsertStatus(new) => {
                let entries = self.statuses.entry(new.owner.clone()).or_default();
                if entries.iter().any(|s| s.status_id == new.status_id) {
                    return;
                }
                self.next_seq += 1;
                entries.push(StatusRow::from_new(self.next_seq, new));
            }
            Mutation::PurgeStatuses(owner) => {
                self.statuses.shift_remove(&owner);
            }
        }
    }
}

/// Almacenamiento en memoria, seguro para uso concurrente.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    inner: RwLock<Tables>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn find_record(&self, key: &RecordKey) -> Result<Option<RecordRow>, StoreError> {
        Ok(self.read()?.get(key))
    }

    fn record_exists(&self, key: &RecordKey) -> Result<bool, StoreError> {
        Ok(self.read()?.contains(key))
    }

    fn find_all(&self, kind: RecordKind) -> Result<Vec<RecordRow>, StoreError> {
        let t = self.read()?;
        let rows = match kind {
            RecordKind::Experiment => t.experiments.values().cloned().map(RecordRow::Experiment).collect(),
            RecordKind::Process => t.processes.values().cloned().map(RecordRow::Process).collect(),
            RecordKind::Task => t.tasks.values().cloned().map(RecordRow::Task).collect(),
            RecordKind::Job => t.jobs.values().cloned().map(RecordRow::Job).collect(),
        };
        Ok(rows)
    }

    fn find_children(&self, kind: RecordKind, parent_id: &str) -> Result<Vec<RecordRow>, StoreError> {
        Ok(self.read()?.children(kind, parent_id))
    }

    fn find_jobs(&self, lookup: &JobLookup) -> Result<Vec<JobRow>, StoreError> {
        let t = self.read()?;
        let mut jobs: Vec<JobRow> = t.jobs
                                     .values()
                                     .filter(|j| match lookup {
                                         JobLookup::ByTask(id) => &j.task_id == id,
                                         JobLookup::ByProcess(id) => &j.process_id == id,
                                         JobLookup::ByJobId(id) => &j.job_id == id,
                                     })
                                     .cloned()
                                     .collect();
        jobs.sort_by(|a, b| a.creation_time.cmp(&b.creation_time).then_with(|| a.key().cmp(&b.key())));
        Ok(jobs)
    }

    fn snapshot(&self, root: &RecordKey) -> Result<Option<Snapshot>, StoreError> {
        let t = self.read()?;
        let Some(root_row) = t.get(root) else {
            return Ok(None);
        };
        let mut descendants = Vec::new();
        let mut frontier = vec![root_row.clone()];
        while let Some(parent) = frontier.pop() {
            let children = match &parent {
                RecordRow::Experiment(e) => t.children(RecordKind::Process, &e.experiment_id),
                RecordRow::Process(p) => t.children(RecordKind::Task, &p.process_id),
                RecordRow::Task(task) => t.children(RecordKind::Job, &task.task_id),
                RecordRow::Job(_) => Vec::new(),
            };
            frontier.extend(children.iter().cloned());
            descendants.extend(children);
        }
        sort_siblings(&mut descendants);
        let statuses = std::iter::once(&root_row).chain(descendants.iter())
                                                 .filter_map(|row| t.statuses.get(&row.key()))
                                                 .flatten()
                                                 .cloned()
                                                 .collect();
        Ok(Some(Snapshot { root: root_row,
                           descendants,
                           statuses }))
    }

    fn status_entries(&self, owner: &RecordKey) -> Result<Vec<StatusRow>, StoreError> {
        let t = self.read()?;
        let mut entries = t.statuses.get(owner).cloned().unwrap_or_default();
        entries.sort_by(newest_first);
        Ok(entries)
    }

    fn latest_status(&self, owner: &RecordKey) -> Result<Option<StatusRow>, StoreError> {
        Ok(self.read()?.latest(owner).cloned())
    }

    fn status_entries_in_state(&self,
                               kind: RecordKind,
                               state: &str,
                               offset: usize,
                               limit: usize)
                               -> Result<Vec<StatusRow>, StoreError> {
        let t = self.read()?;
        let mut entries: Vec<StatusRow> = t.statuses
                                           .iter()
                                           .filter(|(owner, _)| owner.kind() == kind)
                                           .flat_map(|(_, rows)| rows.iter())
                                           .filter(|s| s.state == state)
                                           .cloned()
                                           .collect();
        entries.sort_by_key(|s| s.seq);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    fn select_summaries(&self, query: &SummaryQuery) -> Result<Vec<ExperimentSummary>, StoreError> {
        let mut rows = self.read()?.matching(query);
        if let Some(order) = query.order {
            order.sort(&mut rows);
        }
        let page = rows.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }

    fn count_summaries(&self, query: &SummaryQuery) -> Result<u64, StoreError> {
        Ok(self.read()?.matching(query).len() as u64)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let pending: HashSet<RecordKey> = unit.mutations()
                                              .iter()
                                              .filter_map(|m| match m {
                                                  Mutation::Upsert(row) => Some(row.key()),
                                                  _ => None,
                                              })
                                              .collect();
        for m in unit.mutations() {
            if let Mutation::Upsert(row) = m {
                t.check_parent(row, &pending)?;
            }
        }
        for m in unit.into_mutations() {
            t.apply(m);
        }
        Ok(())
    }
}
