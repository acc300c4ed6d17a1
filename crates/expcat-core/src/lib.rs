//! Catálogo de experimentos: registro jerárquico Experiment → Process →
//! Task → Job con historial de estados sólo-append, reconciliación de listas
//! anidadas en actualizaciones y búsqueda por lotes sobre ids accesibles.
//!
//! El almacenamiento es un colaborador (`store::CatalogStore`); este crate
//! incluye un backend en memoria y `expcat-persistence` aporta Postgres.

pub mod cascade;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod mapper;
pub mod model;
pub mod reconcile;
pub mod search;
pub mod service;
pub mod status;
pub mod store;

pub use errors::{CatalogError, StoreError};
pub use ids::{IdGenerator, UuidIdGenerator};
pub use model::{BucketTally, ComputationalResourceScheduling, DataParam, DataType, ErrorRecord, Experiment,
                ExperimentState, ExperimentStatistics, ExperimentSummary, ExperimentType, Job, JobKey, JobState,
                LifecycleState, Process, ProcessState, RecordKey, RecordKind, StatusBucket, StatusRecord, Task,
                TaskState, TaskType, UserConfigurationData};
pub use search::{MatchMode, SearchFilters};
pub use service::{Catalog, CatalogRecord, CatalogSettings};
pub use status::{StatusHistory, StatusLedger};
pub use store::{CatalogStore, InMemoryCatalogStore, JobLookup, SummaryOrder, UnitOfWork};
