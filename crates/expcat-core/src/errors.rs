//! Errores del catálogo.
//!
//! `StoreError` es lo que reporta el colaborador de almacenamiento;
//! `CatalogError` es lo que ven los servicios que llaman al catálogo. Un
//! `StoreError` se envuelve exactamente una vez con la operación y el
//! identificador afectados, y nunca se reintenta aquí.

use thiserror::Error;

use crate::model::RecordKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend failure: {0}")] Backend(String),
    #[error("constraint violation: {0}")] Constraint(String),
    #[error("corrupt stored value: {0}")] Corrupt(String),
    #[error("store lock poisoned")] Poisoned,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unsupported filter field '{field}'")]
    UnsupportedFilter { field: String },
    #[error("invalid value '{value}' for filter field '{field}'")]
    InvalidFilterValue { field: String, value: String },
    #[error("{kind} parent '{id}' does not exist")]
    InconsistentParent { kind: RecordKind, id: String },
    #[error("{kind} '{id}' does not exist")]
    NotFound { kind: RecordKind, id: String },
    #[error("invalid record: {0}")]
    Validation(String),
    #[error("transition {from} -> {to} is not admitted")]
    InvalidTransition { from: String, to: String },
    #[error("storage failure during {operation} (id={id}): {source}")]
    Storage {
        operation: &'static str,
        id: String,
        #[source]
        source: StoreError,
    },
}

impl CatalogError {
    /// Envuelve un fallo de almacenamiento con su contexto.
    pub fn storage(operation: &'static str, id: impl Into<String>, source: StoreError) -> Self {
        let id = id.into();
        log::error!("{operation}:storage_failure id={id} err={source}");
        Self::Storage { operation, id, source }
    }
}

/// Extensión para anotar resultados del almacenamiento con contexto.
pub(crate) trait StoreResultExt<T> {
    fn context(self, operation: &'static str, id: &str) -> Result<T, CatalogError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn context(self, operation: &'static str, id: &str) -> Result<T, CatalogError> {
        self.map_err(|e| CatalogError::storage(operation, id, e))
    }
}
