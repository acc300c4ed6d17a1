//! Vistas de sólo lectura para búsqueda y estadísticas.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ExperimentState;

/// Fila resumida de un experimento con su estado actual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment_id: String,
    pub project_id: String,
    pub gateway_id: String,
    pub user_name: String,
    pub name: String,
    pub description: Option<String>,
    pub execution_id: Option<String>,
    pub resource_host_id: Option<String>,
    pub creation_time: DateTime<Utc>,
    pub experiment_status: Option<ExperimentState>,
    pub status_update_time: Option<DateTime<Utc>>,
}

/// Grupo de estados con nombre usado en estadísticas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    All,
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl StatusBucket {
    pub const ALL: [StatusBucket; 6] = [StatusBucket::All,
                                        StatusBucket::Created,
                                        StatusBucket::Running,
                                        StatusBucket::Completed,
                                        StatusBucket::Failed,
                                        StatusBucket::Cancelled];

    /// Estados que pertenecen al grupo. `None` significa "sin restricción".
    pub fn states(&self) -> Option<&'static [ExperimentState]> {
        use ExperimentState::*;
        match self {
            StatusBucket::All => None,
            StatusBucket::Created => Some(&[Created, Validated]),
            StatusBucket::Running => Some(&[Executing, Scheduled, Launched]),
            StatusBucket::Completed => Some(&[Completed]),
            StatusBucket::Failed => Some(&[Failed]),
            StatusBucket::Cancelled => Some(&[Canceled, Canceling]),
        }
    }
}

/// Conteo y página de un grupo. El conteo no depende de la página.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketTally {
    pub count: u64,
    pub experiments: Vec<ExperimentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExperimentStatistics {
    pub buckets: IndexMap<StatusBucket, BucketTally>,
}

impl ExperimentStatistics {
    pub fn tally(&self, bucket: StatusBucket) -> Option<&BucketTally> {
        self.buckets.get(&bucket)
    }

    fn count(&self, bucket: StatusBucket) -> u64 {
        self.tally(bucket).map(|t| t.count).unwrap_or(0)
    }

    fn list(&self, bucket: StatusBucket) -> &[ExperimentSummary] {
        self.tally(bucket).map(|t| t.experiments.as_slice()).unwrap_or(&[])
    }

    pub fn all_experiment_count(&self) -> u64 { self.count(StatusBucket::All) }
    pub fn created_experiment_count(&self) -> u64 { self.count(StatusBucket::Created) }
    pub fn running_experiment_count(&self) -> u64 { self.count(StatusBucket::Running) }
    pub fn completed_experiment_count(&self) -> u64 { self.count(StatusBucket::Completed) }
    pub fn failed_experiment_count(&self) -> u64 { self.count(StatusBucket::Failed) }
    pub fn cancelled_experiment_count(&self) -> u64 { self.count(StatusBucket::Cancelled) }

    pub fn all_experiments(&self) -> &[ExperimentSummary] { self.list(StatusBucket::All) }
    pub fn created_experiments(&self) -> &[ExperimentSummary] { self.list(StatusBucket::Created) }
    pub fn running_experiments(&self) -> &[ExperimentSummary] { self.list(StatusBucket::Running) }
    pub fn completed_experiments(&self) -> &[ExperimentSummary] { self.list(StatusBucket::Completed) }
    pub fn failed_experiments(&self) -> &[ExperimentSummary] { self.list(StatusBucket::Failed) }
    pub fn cancelled_experiments(&self) -> &[ExperimentSummary] { self.list(StatusBucket::Cancelled) }
}
