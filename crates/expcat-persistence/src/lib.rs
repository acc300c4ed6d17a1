//! expcat-persistence
//!
//! Backend Postgres (Diesel) del catálogo de experimentos. Implementa
//! `expcat_core::CatalogStore` con paridad respecto al backend en memoria:
//! mismas claves, mismo orden de historial y la misma atomicidad por
//! `UnitOfWork`.
//!
//! Módulos:
//! - `pg`: pool r2d2, proveedor de conexiones y `PgCatalogStore`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas y vista declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgCatalogStore, PgPool, PoolProvider};
