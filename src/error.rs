use expcat_core::{CatalogError, ExperimentState};
use expcat_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("experiment '{id}' is not editable in state {state}")]
    NotEditable { id: String, state: ExperimentState },
    #[error("configuration error: {0}")]
    Config(String),
}
