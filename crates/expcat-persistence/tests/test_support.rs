#![allow(dead_code)]

use expcat_core::Catalog;
use expcat_persistence::{build_pool, DbConfig, PgCatalogStore, PgPool, PoolProvider};
use once_cell::sync::Lazy;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 4) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    TEST_POOL.as_ref().map(f)
}

pub fn pg_catalog(pool: &PgPool) -> Catalog<PgCatalogStore<PoolProvider>> {
    Catalog::new(PgCatalogStore::new(PoolProvider { pool: pool.clone() }))
}
