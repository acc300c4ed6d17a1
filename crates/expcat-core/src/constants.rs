//! Constantes compartidas del catálogo.

/// Valor centinela que los clientes envían cuando el identificador aún no fue
/// asignado. Se trata igual que un identificador vacío.
pub const DEFAULT_ID: &str = "DO_NOT_SET_AT_CLIENTS";

/// Máximo de caracteres del nombre que se conservan al derivar el id de un
/// experimento.
pub const EXPERIMENT_ID_SEED_LEN: usize = 50;

/// Tamaño de lote para consultas restringidas a un conjunto de ids
/// accesibles.
pub const SEARCH_BATCH_SIZE: usize = 10_000;

/// Tamaño de página al recorrer entradas de estado por valor.
pub const STATE_SCAN_PAGE: usize = 100;

pub const PROCESS_SEED: &str = "PROCESS";
pub const TASK_SEED: &str = "TASK";

pub const EXPERIMENT_ERROR_SEED: &str = "EXPERIMENT_ERROR";
pub const PROCESS_ERROR_SEED: &str = "PROCESS_ERROR";
pub const TASK_ERROR_SEED: &str = "TASK_ERROR";
