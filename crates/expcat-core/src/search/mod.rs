//! Búsqueda de experimentos sobre un conjunto de ids accesibles.
//!
//! Los filtros llegan como mapa nombre → valor. La búsqueda compara campos
//! de texto por subcadena; las estadísticas por igualdad exacta. El conjunto
//! de candidatos se consulta en lotes de `search_batch_size`; el `offset`
//! sólo se aplica al primer lote y el `limit` se descuenta entre lotes.

pub mod statistics;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;

use crate::errors::{CatalogError, StoreError, StoreResultExt};
use crate::model::{ExperimentState, ExperimentSummary, LifecycleState};
use crate::service::Catalog;
use crate::store::{CatalogStore, SummaryOrder, SummaryPredicate, SummaryQuery, TextField};

/// Nombres de campo admitidos en los filtros.
pub mod fields {
    pub const USER_NAME: &str = "userName";
    pub const GATEWAY_ID: &str = "gatewayId";
    pub const PROJECT_ID: &str = "projectId";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const EXECUTION_ID: &str = "executionId";
    pub const JOB_ID: &str = "jobId";
    pub const RESOURCE_HOST_ID: &str = "resourceHostId";
    pub const STATUS: &str = "status";
    pub const FROM_DATE: &str = "fromDate";
    pub const TO_DATE: &str = "toDate";
}

/// Cómo se comparan los campos de texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Substring,
    Exact,
}

/// Filtros tipados de una búsqueda.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub text: Vec<(TextField, String)>,
    pub job_id: Option<String>,
    pub status: Option<Vec<ExperimentState>>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl SearchFilters {
    /// Interpreta un mapa de filtros. Un campo desconocido falla con
    /// `UnsupportedFilter`; un valor ilegible con `InvalidFilterValue`.
    pub fn from_map(filters: &HashMap<String, String>) -> Result<Self, CatalogError> {
        let mut parsed = Self::default();
        let mut entries: Vec<_> = filters.iter().collect();
        entries.sort();
        for (field, value) in entries {
            match field.as_str() {
                fields::USER_NAME => parsed.text.push((TextField::UserName, value.clone())),
                fields::GATEWAY_ID => parsed.text.push((TextField::GatewayId, value.clone())),
                fields::PROJECT_ID => parsed.text.push((TextField::ProjectId, value.clone())),
                fields::NAME => parsed.text.push((TextField::Name, value.clone())),
                fields::DESCRIPTION => parsed.text.push((TextField::Description, value.clone())),
                fields::EXECUTION_ID => parsed.text.push((TextField::ExecutionId, value.clone())),
                fields::RESOURCE_HOST_ID => parsed.text.push((TextField::ResourceHostId, value.clone())),
                fields::JOB_ID => parsed.job_id = Some(value.clone()),
                fields::STATUS => parsed.status = Some(parse_states(field, value)?),
                fields::FROM_DATE => parsed.from_date = Some(parse_epoch_millis(field, value)?),
                fields::TO_DATE => parsed.to_date = Some(parse_epoch_millis(field, value)?),
                other => return Err(CatalogError::UnsupportedFilter { field: other.to_string() }),
            }
        }
        Ok(parsed)
    }

    /// Predicados equivalentes. El host de recursos se compara siempre por
    /// igualdad; el rango de fechas sólo aplica si ambos extremos existen y
    /// `to > from`.
    pub fn predicates(&self, mode: MatchMode) -> Vec<SummaryPredicate> {
        let mut predicates: Vec<SummaryPredicate> =
            self.text
                .iter()
                .map(|(field, value)| match (mode, field) {
                    (_, TextField::ResourceHostId) | (MatchMode::Exact, _) => {
                        SummaryPredicate::Equals(*field, value.clone())
                    }
                    (MatchMode::Substring, _) => SummaryPredicate::Contains(*field, value.clone()),
                })
                .collect();
        if let Some(job_id) = &self.job_id {
            predicates.push(SummaryPredicate::HasJob(job_id.clone()));
        }
        if let Some(states) = &self.status {
            predicates.push(SummaryPredicate::StatusIn(states.clone()));
        }
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if to > from {
                predicates.push(SummaryPredicate::CreatedBetween { from, to });
            }
        }
        predicates
    }
}

fn parse_states(field: &str, value: &str) -> Result<Vec<ExperimentState>, CatalogError> {
    value.split(',')
         .map(str::trim)
         .filter(|s| !s.is_empty())
         .map(|s| {
             ExperimentState::parse(&s.to_ascii_uppercase()).ok_or_else(|| CatalogError::InvalidFilterValue {
                 field: field.to_string(),
                 value: s.to_string(),
             })
         })
         .collect()
}

fn parse_epoch_millis(field: &str, value: &str) -> Result<DateTime<Utc>, CatalogError> {
    value.trim()
         .parse::<i64>()
         .ok()
         .and_then(DateTime::<Utc>::from_timestamp_millis)
         .ok_or_else(|| CatalogError::InvalidFilterValue { field: field.to_string(),
                                                           value: value.to_string() })
}

/// Ejecuta consultas de resúmenes en lotes de ids candidatos.
pub struct BatchedSearch<'a> {
    store: &'a dyn CatalogStore,
    batch_size: usize,
}

impl<'a> BatchedSearch<'a> {
    pub fn new(store: &'a dyn CatalogStore, batch_size: usize) -> Self {
        Self { store,
               batch_size: batch_size.max(1) }
    }

    /// Página de resúmenes. `limit = 0` no limita. Cada lote se ordena por
    /// separado; el orden global entre lotes sigue el de los candidatos.
    pub fn select(&self,
                  candidate_ids: &[String],
                  predicates: &[SummaryPredicate],
                  limit: usize,
                  offset: usize,
                  order: Option<SummaryOrder>)
                  -> Result<Vec<ExperimentSummary>, StoreError> {
        let mut results = Vec::new();
        for (i, chunk) in candidate_ids.chunks(self.batch_size).enumerate() {
            let remaining = match limit {
                0 => None,
                limit if results.len() >= limit => break,
                limit => Some(limit - results.len()),
            };
            let query = SummaryQuery { candidate_ids: Some(chunk.to_vec()),
                                       predicates: predicates.to_vec(),
                                       order,
                                       offset: if i == 0 { offset } else { 0 },
                                       limit: remaining };
            results.extend(self.store.select_summaries(&query)?);
        }
        Ok(results)
    }

    /// Total de coincidencias en todos los lotes.
    pub fn count(&self, candidate_ids: &[String], predicates: &[SummaryPredicate]) -> Result<u64, StoreError> {
        let mut total = 0;
        for chunk in candidate_ids.chunks(self.batch_size) {
            let query = SummaryQuery { candidate_ids: Some(chunk.to_vec()),
                                       predicates: predicates.to_vec(),
                                       ..SummaryQuery::default() };
            total += self.store.count_summaries(&query)?;
        }
        Ok(total)
    }
}

impl<S: CatalogStore> Catalog<S> {
    fn batched_search(&self) -> BatchedSearch<'_> {
        BatchedSearch::new(self.dyn_store(), self.settings().search_batch_size)
    }

    /// Busca entre `candidate_ids` los experimentos que cumplen `filters`.
    /// Un conjunto de candidatos vacío devuelve vacío sin consultar.
    pub fn search_experiments(&self,
                              candidate_ids: &[String],
                              filters: &HashMap<String, String>,
                              limit: usize,
                              offset: usize,
                              order: Option<SummaryOrder>)
                              -> Result<Vec<ExperimentSummary>, CatalogError> {
        let filters = SearchFilters::from_map(filters)?;
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("search_experiments:start candidates={} limit={limit} offset={offset}", candidate_ids.len());
        let predicates = filters.predicates(MatchMode::Substring);
        let found = self.batched_search()
                        .select(candidate_ids, &predicates, limit, offset, order)
                        .context("search_experiments", &format!("candidates={}", candidate_ids.len()))?;
        debug!("search_experiments:done count={}", found.len());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn status_accepts_a_comma_separated_set() {
        let filters = SearchFilters::from_map(&map(&[("status", "executing, Completed")])).unwrap();
        assert_eq!(filters.status, Some(vec![ExperimentState::Executing, ExperimentState::Completed]));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = SearchFilters::from_map(&map(&[("color", "red")])).unwrap_err();
        assert_eq!(err, CatalogError::UnsupportedFilter { field: "color".into() });
    }

    #[test]
    fn bad_dates_are_invalid_values() {
        let err = SearchFilters::from_map(&map(&[("fromDate", "yesterday")])).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidFilterValue { ref field, .. } if field == "fromDate"));
    }

    #[test]
    fn date_range_needs_both_ends_in_order() {
        let only_from = SearchFilters::from_map(&map(&[("fromDate", "1000")])).unwrap();
        assert!(only_from.predicates(MatchMode::Substring).is_empty());

        let reversed = SearchFilters::from_map(&map(&[("fromDate", "2000"), ("toDate", "1000")])).unwrap();
        assert!(reversed.predicates(MatchMode::Substring).is_empty());

        let ordered = SearchFilters::from_map(&map(&[("fromDate", "1000"), ("toDate", "2000")])).unwrap();
        assert_eq!(ordered.predicates(MatchMode::Substring).len(), 1);
    }

    #[test]
    fn match_mode_controls_text_comparison() {
        let filters = SearchFilters::from_map(&map(&[("userName", "ali"), ("resourceHostId", "host")])).unwrap();
        let loose = filters.predicates(MatchMode::Substring);
        assert!(loose.contains(&SummaryPredicate::Contains(TextField::UserName, "ali".into())));
        assert!(loose.contains(&SummaryPredicate::Equals(TextField::ResourceHostId, "host".into())));

        let strict = filters.predicates(MatchMode::Exact);
        assert!(strict.contains(&SummaryPredicate::Equals(TextField::UserName, "ali".into())));
    }
}
