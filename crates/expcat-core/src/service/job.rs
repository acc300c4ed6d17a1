//! Operaciones de nivel job. Un job se identifica por (tarea, id de job).

use log::debug;

use crate::errors::{CatalogError, StoreResultExt};
use crate::mapper;
use crate::model::{Job, JobKey, JobState, RecordKey, StatusRecord};
use crate::status::StatusHistory;
use crate::store::{CatalogStore, JobLookup};

use super::Catalog;

impl<S: CatalogStore> Catalog<S> {
    /// Registra un job bajo `process_id`. La tarea viene en el propio job.
    pub fn add_job(&self, mut job: Job, process_id: &str) -> Result<JobKey, CatalogError> {
        job.process_id = process_id.to_string();
        let stored = self.add_record(job, "add_job")?;
        Ok(stored.key())
    }

    pub fn update_job(&self, mut job: Job, key: &JobKey) -> Result<(), CatalogError> {
        job.task_id = key.task_id.clone();
        job.job_id = key.job_id.clone();
        self.update_record(&RecordKey::Job(key.clone()), job, "update_job")?;
        Ok(())
    }

    pub fn get_job(&self, key: &JobKey) -> Result<Option<Job>, CatalogError> {
        self.get_record(&RecordKey::Job(key.clone()), "get_job")
    }

    /// Jobs que cumplen `lookup`, cada uno con su historial.
    pub fn get_job_list(&self, lookup: &JobLookup) -> Result<Vec<Job>, CatalogError> {
        debug!("get_job_list:start lookup={lookup:?}");
        let rows = self.dyn_store().find_jobs(lookup).context("get_job_list", lookup_id(lookup))?;
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let key = RecordKey::Job(row.key());
            let mut job = mapper::job_from_row(row);
            let history: Vec<_> = self.ledger().history::<JobState>(&key)?.collect();
            job.job_status = (!history.is_empty()).then_some(history);
            jobs.push(job);
        }
        debug!("get_job_list:done count={}", jobs.len());
        Ok(jobs)
    }

    pub fn is_job_exist(&self, key: &JobKey) -> Result<bool, CatalogError> {
        self.exists(&RecordKey::Job(key.clone()), "is_job_exist")
    }

    pub fn remove_job(&self, key: &JobKey) -> Result<bool, CatalogError> {
        self.remove_record(&RecordKey::Job(key.clone()), "remove_job")
    }

    /// Borra todos los jobs del proceso. Devuelve cuántos había.
    pub fn delete_jobs(&self, process_id: &str) -> Result<usize, CatalogError> {
        let lookup = JobLookup::ByProcess(process_id.to_string());
        let rows = self.dyn_store().find_jobs(&lookup).context("delete_jobs", process_id)?;
        self.remove_many(rows.iter().map(|r| RecordKey::Job(r.key())).collect(), "delete_jobs", process_id)
    }

    pub fn add_job_status(&self, status: StatusRecord<JobState>, key: &JobKey) -> Result<String, CatalogError> {
        let written = self.append_status(&RecordKey::Job(key.clone()), status, "add_job_status")?;
        Ok(written.status_id)
    }

    pub fn get_job_status(&self, key: &JobKey) -> Result<Option<StatusRecord<JobState>>, CatalogError> {
        self.ledger().current(&RecordKey::Job(key.clone()))
    }

    pub fn get_job_status_history(&self, key: &JobKey) -> Result<StatusHistory<JobState>, CatalogError> {
        self.ledger().history(&RecordKey::Job(key.clone()))
    }
}

fn lookup_id(lookup: &JobLookup) -> &str {
    match lookup {
        JobLookup::ByTask(id) | JobLookup::ByProcess(id) | JobLookup::ByJobId(id) => id,
    }
}
