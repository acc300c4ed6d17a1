//! Estadísticas de experimentos por grupo de estado.
//!
//! Cada grupo se calcula de forma independiente (en paralelo con rayon):
//! el conteo suma todos los lotes y la lista es una página ordenada de más
//! reciente a más antiguo.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;

use crate::errors::{CatalogError, StoreError, StoreResultExt};
use crate::model::{BucketTally, ExperimentStatistics, StatusBucket};
use crate::service::Catalog;
use crate::store::{CatalogStore, SummaryOrder, SummaryPredicate};

use super::{BatchedSearch, MatchMode, SearchFilters};

/// Calcula los seis grupos sobre `candidate_ids`.
pub fn compute(search: &BatchedSearch<'_>,
               candidate_ids: &[String],
               base: &[SummaryPredicate],
               limit: usize,
               offset: usize)
               -> Result<ExperimentStatistics, StoreError> {
    let tallies = StatusBucket::ALL.par_iter()
                                   .map(|bucket| {
                                       let mut predicates = base.to_vec();
                                       if let Some(states) = bucket.states() {
                                           predicates.push(SummaryPredicate::StatusIn(states.to_vec()));
                                       }
                                       let count = search.count(candidate_ids, &predicates)?;
                                       let experiments = search.select(candidate_ids,
                                                                       &predicates,
                                                                       limit,
                                                                       offset,
                                                                       Some(SummaryOrder::newest_first()))?;
                                       Ok((*bucket, BucketTally { count, experiments }))
                                   })
                                   .collect::<Result<Vec<_>, StoreError>>()?;
    Ok(ExperimentStatistics { buckets: tallies.into_iter().collect::<IndexMap<_, _>>() })
}

impl<S: CatalogStore> Catalog<S> {
    /// Conteos y páginas por grupo de estado. Los campos de texto se comparan
    /// por igualdad exacta.
    pub fn get_experiment_statistics(&self,
                                     candidate_ids: &[String],
                                     filters: &HashMap<String, String>,
                                     limit: usize,
                                     offset: usize)
                                     -> Result<ExperimentStatistics, CatalogError> {
        let filters = SearchFilters::from_map(filters)?;
        debug!("get_experiment_statistics:start candidates={}", candidate_ids.len());
        let stats = compute(&self.batched_search(), candidate_ids, &filters.predicates(MatchMode::Exact), limit, offset)
            .context("get_experiment_statistics", &format!("candidates={}", candidate_ids.len()))?;
        debug!("get_experiment_statistics:done all={}", stats.all_experiment_count());
        Ok(stats)
    }
}
