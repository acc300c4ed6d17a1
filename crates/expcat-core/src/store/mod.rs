//! Colaborador de almacenamiento.
//!
//! `CatalogStore` es la frontera entre el motor del catálogo y el backend
//! (memoria o Postgres). Las lecturas devuelven filas; las escrituras llegan
//! agrupadas en una `UnitOfWork` que el backend aplica de forma atómica.

pub mod memory;
pub mod query;
pub mod rows;

use crate::errors::StoreError;
use crate::model::{ExperimentSummary, RecordKey, RecordKind};

pub use memory::InMemoryCatalogStore;
pub use query::{JobLookup, OrderBy, SortDirection, SummaryOrder, SummaryPredicate, SummaryQuery, TextField};
pub use rows::{newest_first, ExperimentRow, JobRow, NewStatusRow, ProcessRow, RecordRow, StatusRow, StoredRow, TaskRow};

/// Operación individual dentro de una unidad de trabajo.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Inserta o reemplaza la fila con la misma clave.
    Upsert(RecordRow),
    /// Borra la fila (sus hijos deben borrarse antes, en la misma unidad).
    Delete(RecordKey),
    /// Inserta la entrada salvo que ya exista una con el mismo dueño e id.
    InsertStatus(NewStatusRow),
    /// Elimina el historial completo de un registro borrado.
    PurgeStatuses(RecordKey),
}

/// Conjunto de mutaciones que se confirman todas o ninguna.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    mutations: Vec<Mutation>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, row: RecordRow) -> &mut Self {
        self.mutations.push(Mutation::Upsert(row));
        self
    }

    pub fn delete(&mut self, key: RecordKey) -> &mut Self {
        self.mutations.push(Mutation::Delete(key));
        self
    }

    pub fn insert_status(&mut self, status: NewStatusRow) -> &mut Self {
        self.mutations.push(Mutation::InsertStatus(status));
        self
    }

    pub fn purge_statuses(&mut self, owner: RecordKey) -> &mut Self {
        self.mutations.push(Mutation::PurgeStatuses(owner));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Lectura consistente de un registro y todos sus descendientes.
///
/// `descendants` está ordenado por instante de creación y luego por clave;
/// `statuses` contiene el historial de todos los registros incluidos, sin
/// orden garantizado.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub root: RecordRow,
    pub descendants: Vec<RecordRow>,
    pub statuses: Vec<StatusRow>,
}

impl Snapshot {
    /// Hijos directos de `parent` dentro de la instantánea.
    pub fn children_of<'a>(&'a self, parent: &'a RecordKey) -> impl Iterator<Item = &'a RecordRow> + 'a {
        self.descendants.iter().filter(move |row| row.parent_key().as_ref() == Some(parent))
    }

    /// Todas las claves (raíz incluida).
    pub fn keys(&self) -> Vec<RecordKey> {
        std::iter::once(self.root.key()).chain(self.descendants.iter().map(RecordRow::key)).collect()
    }
}

/// Ordena filas hermanas por instante de creación y clave.
pub fn sort_siblings(rows: &mut [RecordRow]) {
    rows.sort_by(|a, b| a.creation_time().cmp(&b.creation_time()).then_with(|| a.key().cmp(&b.key())));
}

/// Operaciones que el catálogo consume del almacenamiento.
///
/// Contratos:
/// - Ningún método reintenta; los errores se propagan tal cual.
/// - `status_entries` devuelve el historial más reciente primero
///   (`newest_first`).
/// - `commit` es atómico: o se aplican todas las mutaciones o ninguna.
pub trait CatalogStore: Send + Sync {
    fn find_record(&self, key: &RecordKey) -> Result<Option<RecordRow>, StoreError>;
    fn record_exists(&self, key: &RecordKey) -> Result<bool, StoreError>;
    fn find_all(&self, kind: RecordKind) -> Result<Vec<RecordRow>, StoreError>;
    /// Hijos directos de `parent_id` del nivel `kind`, en orden de creación.
    fn find_children(&self, kind: RecordKind, parent_id: &str) -> Result<Vec<RecordRow>, StoreError>;
    fn find_jobs(&self, lookup: &JobLookup) -> Result<Vec<JobRow>, StoreError>;
    fn snapshot(&self, root: &RecordKey) -> Result<Option<Snapshot>, StoreError>;

    fn status_entries(&self, owner: &RecordKey) -> Result<Vec<StatusRow>, StoreError>;
    fn latest_status(&self, owner: &RecordKey) -> Result<Option<StatusRow>, StoreError>;
    /// Entradas de un nivel con el estado dado, en orden de inserción.
    fn status_entries_in_state(&self,
                               kind: RecordKind,
                               state: &str,
                               offset: usize,
                               limit: usize)
                               -> Result<Vec<StatusRow>, StoreError>;

    fn select_summaries(&self, query: &SummaryQuery) -> Result<Vec<ExperimentSummary>, StoreError>;
    fn count_summaries(&self, query: &SummaryQuery) -> Result<u64, StoreError>;

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;
}

/// Permite elegir el backend en tiempo de ejecución (`Catalog<Box<dyn CatalogStore>>`).
impl<S: CatalogStore + ?Sized> CatalogStore for Box<S> {
    fn find_record(&self, key: &RecordKey) -> Result<Option<RecordRow>, StoreError> {
        (**self).find_record(key)
    }

    fn record_exists(&self, key: &RecordKey) -> Result<bool, StoreError> {
        (**self).record_exists(key)
    }

    fn find_all(&self, kind: RecordKind) -> Result<Vec<RecordRow>, StoreError> {
        (**self).find_all(kind)
    }

    fn find_children(&self, kind: RecordKind, parent_id: &str) -> Result<Vec<RecordRow>, StoreError> {
        (**self).find_children(kind, parent_id)
    }

    fn find_jobs(&self, lookup: &JobLookup) -> Result<Vec<JobRow>, StoreError> {
        (**self).find_jobs(lookup)
    }

    fn snapshot(&self, root: &RecordKey) -> Result<Option<Snapshot>, StoreError> {
        (**self).snapshot(root)
    }

    fn status_entries(&self, owner: &RecordKey) -> Result<Vec<StatusRow>, StoreError> {
        (**self).status_entries(owner)
    }

    fn latest_status(&self, owner: &RecordKey) -> Result<Option<StatusRow>, StoreError> {
        (**self).latest_status(owner)
    }

    fn status_entries_in_state(&self,
                               kind: RecordKind,
                               state: &str,
                               offset: usize,
                               limit: usize)
                               -> Result<Vec<StatusRow>, StoreError> {
        (**self).status_entries_in_state(kind, state, offset, limit)
    }

    fn select_summaries(&self, query: &SummaryQuery) -> Result<Vec<ExperimentSummary>, StoreError> {
        (**self).select_summaries(query)
    }

    fn count_summaries(&self, query: &SummaryQuery) -> Result<u64, StoreError> {
        (**self).count_summaries(query)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        (**self).commit(unit)
    }
}

/// Lectura tipada de una fila.
pub fn load_row<R: StoredRow>(store: &dyn CatalogStore, key: &RecordKey) -> Result<Option<R>, StoreError> {
    store.find_record(key)?.map(R::expect_from).transpose()
}

/// Hijos tipados de un padre.
pub fn load_children<R: StoredRow>(store: &dyn CatalogStore, parent_id: &str) -> Result<Vec<R>, StoreError> {
    store.find_children(R::KIND, parent_id)?.into_iter().map(R::expect_from).collect()
}
