//! Servicios de registro por nivel.
//!
//! `Catalog` orquesta el ciclo de vida de los registros sobre un
//! `CatalogStore`: asignación de ids, cascada de padres, reconciliación de
//! listas y escritura atómica. Las operaciones de cada nivel viven en su
//! propio módulo; la mecánica común está en `record`.

mod experiment;
mod job;
mod process;
mod record;
mod task;

use crate::constants::{SEARCH_BATCH_SIZE, STATE_SCAN_PAGE};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::status::StatusLedger;
use crate::store::CatalogStore;

pub use record::CatalogRecord;

/// Parámetros de ejecución del catálogo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSettings {
    /// Máximo de ids candidatos por consulta de búsqueda.
    pub search_batch_size: usize,
    /// Página al recorrer entradas de estado por valor.
    pub state_scan_page: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self { search_batch_size: SEARCH_BATCH_SIZE,
               state_scan_page: STATE_SCAN_PAGE }
    }
}

/// Catálogo de experimentos sobre un almacenamiento concreto.
pub struct Catalog<S: CatalogStore> {
    store: S,
    ids: Box<dyn IdGenerator>,
    settings: CatalogSettings,
}

impl<S: CatalogStore> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store,
               ids: Box::new(UuidIdGenerator),
               settings: CatalogSettings::default() }
    }

    pub fn with_id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_settings(mut self, settings: CatalogSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> CatalogSettings {
        self.settings
    }

    pub fn ledger(&self) -> StatusLedger<'_> {
        StatusLedger::new(&self.store, self.ids.as_ref())
    }

    pub(crate) fn dyn_store(&self) -> &dyn CatalogStore {
        &self.store
    }

    pub(crate) fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }
}
