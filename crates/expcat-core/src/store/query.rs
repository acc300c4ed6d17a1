//! Consultas declarativas que el almacenamiento sabe ejecutar.

use chrono::{DateTime, Utc};

use crate::model::{ExperimentState, ExperimentSummary};

/// Campo de texto filtrable de un resumen de experimento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    UserName,
    GatewayId,
    ProjectId,
    Name,
    Description,
    ExecutionId,
    ResourceHostId,
}

impl TextField {
    /// Valor del campo en el resumen; ausente equivale a cadena vacía.
    pub fn value_of<'a>(&self, summary: &'a ExperimentSummary) -> &'a str {
        match self {
            TextField::UserName => &summary.user_name,
            TextField::GatewayId => &summary.gateway_id,
            TextField::ProjectId => &summary.project_id,
            TextField::Name => &summary.name,
            TextField::Description => summary.description.as_deref().unwrap_or(""),
            TextField::ExecutionId => summary.execution_id.as_deref().unwrap_or(""),
            TextField::ResourceHostId => summary.resource_host_id.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryPredicate {
    /// Coincidencia por subcadena (`LIKE %v%`).
    Contains(TextField, String),
    Equals(TextField, String),
    /// El estado actual pertenece al conjunto.
    StatusIn(Vec<ExperimentState>),
    /// Creación dentro del rango cerrado.
    CreatedBetween { from: DateTime<Utc>, to: DateTime<Utc> },
    /// El experimento posee un job con ese id.
    HasJob(String),
}

impl SummaryPredicate {
    /// Evalúa el predicado en memoria. `owns_job(experiment_id, job_id)`
    /// resuelve `HasJob`, que no se puede decidir sólo con el resumen.
    pub fn matches(&self, summary: &ExperimentSummary, owns_job: &dyn Fn(&str, &str) -> bool) -> bool {
        match self {
            SummaryPredicate::Contains(field, needle) => field.value_of(summary).contains(needle.as_str()),
            SummaryPredicate::Equals(field, value) => field.value_of(summary) == value,
            SummaryPredicate::StatusIn(states) => summary.experiment_status.is_some_and(|s| states.contains(&s)),
            SummaryPredicate::CreatedBetween { from, to } => summary.creation_time >= *from && summary.creation_time <= *to,
            SummaryPredicate::HasJob(job_id) => owns_job(&summary.experiment_id, job_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    CreationTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryOrder {
    pub by: OrderBy,
    pub direction: SortDirection,
}

impl SummaryOrder {
    pub fn newest_first() -> Self {
        Self { by: OrderBy::CreationTime,
               direction: SortDirection::Desc }
    }

    pub fn oldest_first() -> Self {
        Self { by: OrderBy::CreationTime,
               direction: SortDirection::Asc }
    }

    /// Ordena en memoria. El id del experimento desempata siempre en forma
    /// ascendente.
    pub fn sort(&self, rows: &mut [ExperimentSummary]) {
        rows.sort_by(|a, b| {
                let primary = match self.by {
                    OrderBy::CreationTime => a.creation_time.cmp(&b.creation_time),
                };
                let primary = match self.direction {
                    SortDirection::Asc => primary,
                    SortDirection::Desc => primary.reverse(),
                };
                primary.then_with(|| a.experiment_id.cmp(&b.experiment_id))
            });
    }
}

/// Consulta sobre resúmenes de experimentos.
///
/// `candidate_ids = None` no restringe por id; `Some(vec![])` no encuentra
/// nada. `limit = None` no limita.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryQuery {
    pub candidate_ids: Option<Vec<String>>,
    pub predicates: Vec<SummaryPredicate>,
    pub order: Option<SummaryOrder>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SummaryQuery {
    pub fn matches(&self, summary: &ExperimentSummary, owns_job: &dyn Fn(&str, &str) -> bool) -> bool {
        self.predicates.iter().all(|p| p.matches(summary, owns_job))
    }
}

/// Búsqueda de jobs por uno de sus campos de pertenencia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobLookup {
    ByTask(String),
    ByProcess(String),
    ByJobId(String),
}
