//! Configuración del catálogo.
//!
//! Lee `.env` una sola vez (vía `expcat_persistence::init_dotenv`) y expone
//! `CatalogConfig`, que el `Registry` usa para elegir backend y ajustes.

use std::env;

use expcat_core::CatalogSettings;

use crate::error::RegistryError;

/// Backend de almacenamiento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres,
}

impl Backend {
    fn parse(value: &str) -> Result<Self, RegistryError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "postgres" => Ok(Backend::Postgres),
            other => Err(RegistryError::Config(format!("EXPCAT_BACKEND desconocido: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub backend: Backend,
    pub settings: CatalogSettings,
}

impl CatalogConfig {
    /// Variables:
    /// - `EXPCAT_SEARCH_BATCH_SIZE` (10000 por defecto)
    /// - `EXPCAT_STATE_SCAN_PAGE` (100 por defecto)
    /// - `EXPCAT_BACKEND` (`memory` | `postgres`; `postgres` si hay
    ///   `DATABASE_URL`)
    pub fn from_env() -> Result<Self, RegistryError> {
        expcat_persistence::init_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, RegistryError>
        where F: Fn(&str) -> Option<String>
    {
        let defaults = CatalogSettings::default();
        let search_batch_size = positive(&lookup, "EXPCAT_SEARCH_BATCH_SIZE", defaults.search_batch_size)?;
        let state_scan_page = positive(&lookup, "EXPCAT_STATE_SCAN_PAGE", defaults.state_scan_page)?;
        let backend = match lookup("EXPCAT_BACKEND") {
            Some(value) => Backend::parse(&value)?,
            None if lookup("DATABASE_URL").is_some() => Backend::Postgres,
            None => Backend::Memory,
        };
        Ok(Self { backend,
                  settings: CatalogSettings { search_batch_size,
                                              state_scan_page } })
    }
}

fn positive<F>(lookup: &F, key: &str, default: usize) -> Result<usize, RegistryError>
    where F: Fn(&str) -> Option<String>
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(RegistryError::Config(format!("{key} debe ser un entero positivo: {raw}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<CatalogConfig, RegistryError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        CatalogConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.backend, Backend::Memory);
        assert_eq!(cfg.settings.search_batch_size, 10_000);
        assert_eq!(cfg.settings.state_scan_page, 100);
    }

    #[test]
    fn database_url_selects_postgres() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/x")]).unwrap();
        assert_eq!(cfg.backend, Backend::Postgres);
        let forced = config(&[("DATABASE_URL", "postgres://localhost/x"), ("EXPCAT_BACKEND", "Memory")]).unwrap();
        assert_eq!(forced.backend, Backend::Memory);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(config(&[("EXPCAT_SEARCH_BATCH_SIZE", "0")]), Err(RegistryError::Config(_))));
        assert!(matches!(config(&[("EXPCAT_STATE_SCAN_PAGE", "many")]), Err(RegistryError::Config(_))));
        assert!(matches!(config(&[("EXPCAT_BACKEND", "sqlite")]), Err(RegistryError::Config(_))));
    }
}
