//! Fachada de gateway sobre el catálogo.

use expcat_core::{Catalog, CatalogStore, Experiment, ExperimentState, InMemoryCatalogStore};
use expcat_persistence::{build_pool, DbConfig, PgCatalogStore, PoolProvider};
use log::{debug, info};

use crate::config::{Backend, CatalogConfig};
use crate::error::RegistryError;

/// Estados en los que un experimento todavía admite cambios.
const EDITABLE_STATES: [ExperimentState; 3] =
    [ExperimentState::Created, ExperimentState::Validated, ExperimentState::Scheduled];

/// Registro con el backend elegido en tiempo de ejecución.
pub type DynRegistry = Registry<Box<dyn CatalogStore>>;

pub struct Registry<S: CatalogStore> {
    catalog: Catalog<S>,
}

impl Registry<InMemoryCatalogStore> {
    pub fn in_memory() -> Self {
        Self::new(Catalog::new(InMemoryCatalogStore::new()))
    }
}

impl DynRegistry {
    /// Construye el registro indicado por `config`. Con Postgres, el pool
    /// sale de `DbConfig::from_env` y ya tiene las migraciones aplicadas.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, RegistryError> {
        let store: Box<dyn CatalogStore> = match config.backend {
            Backend::Memory => Box::new(InMemoryCatalogStore::new()),
            Backend::Postgres => {
                let db = DbConfig::from_env()?;
                let pool = build_pool(&db.url, db.min_connections, db.max_connections)?;
                Box::new(PgCatalogStore::new(PoolProvider { pool }))
            }
        };
        info!("registry:open backend={:?}", config.backend);
        Ok(Self::new(Catalog::new(store).with_settings(config.settings)))
    }

    pub fn from_env() -> Result<Self, RegistryError> {
        Self::from_config(&CatalogConfig::from_env()?)
    }
}

impl<S: CatalogStore> Registry<S> {
    pub fn new(catalog: Catalog<S>) -> Self {
        Self { catalog }
    }

    /// Acceso al catálogo para el resto de operaciones.
    pub fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    /// Registra un experimento para `gateway_id`. El nombre es obligatorio.
    pub fn create_experiment(&self, gateway_id: &str, mut experiment: Experiment) -> Result<String, RegistryError> {
        debug!("create_experiment:start gateway={gateway_id}");
        if experiment.experiment_name.trim().is_empty() {
            return Err(expcat_core::CatalogError::Validation("experiment name is required".into()).into());
        }
        experiment.gateway_id = gateway_id.to_string();
        let id = self.catalog.add_experiment(experiment)?;
        debug!("create_experiment:done id={id}");
        Ok(id)
    }

    /// Actualiza un experimento que aún no ha empezado a ejecutarse.
    pub fn update_experiment(&self, experiment_id: &str, experiment: Experiment) -> Result<(), RegistryError> {
        if let Some(current) = self.catalog.get_experiment_status(experiment_id)? {
            if !EDITABLE_STATES.contains(&current.state) {
                return Err(RegistryError::NotEditable { id: experiment_id.to_string(),
                                                        state: current.state });
            }
        }
        self.catalog.update_experiment(experiment_id, experiment)?;
        Ok(())
    }
}
