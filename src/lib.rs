//! expcatalog
//!
//! Punto de entrada del catálogo para el gateway:
//! - `config` lee la configuración del entorno (`.env` incluido).
//! - `registry` elige el backend y añade las validaciones de gateway
//!   (nombre obligatorio al crear, estados editables al actualizar).
//! - `error` agrupa los errores de catálogo, persistencia y configuración.
//!
//! El motor vive en `expcat-core`; Postgres en `expcat-persistence`.

pub mod config;
pub mod error;
pub mod registry;

pub use config::{Backend, CatalogConfig};
pub use error::RegistryError;
pub use registry::{DynRegistry, Registry};
