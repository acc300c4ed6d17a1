//! Implementación Postgres (Diesel) del almacenamiento del catálogo.
//!
//! - Pool r2d2 con migraciones aplicadas al construirlo.
//! - `ConnectionProvider` desacopla el origen de las conexiones.
//! - `PgCatalogStore` aplica cada `UnitOfWork` en una única transacción
//!   read-write y lee snapshots en transacciones repeatable-read.
//! - Ningún fallo se reintenta aquí; se propaga como `StoreError`.

mod catalog;
mod rows;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

pub use catalog::PgCatalogStore;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// El pool se construye con `min_idle` y `max_size`, y al construirlo se
/// corre el set de migraciones pendientes (una sola vez).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o
/// `PersistenceError::TransientIo` si el pool no puede entregarla.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// - Ajusta tamaños nulos a 1 y, si `min_size > max_size`, usa
///   `min_size = max_size`.
/// - Ejecuta migraciones inmediatamente con la primera conexión.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("build_pool: min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    debug!("build_pool:done min={final_min} max={validated_max}");
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
