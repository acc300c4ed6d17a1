use expcat_core::{Experiment, Process};
use expcatalog::{Backend, CatalogConfig, DynRegistry};

fn exercise(registry: &DynRegistry) {
    let mut exp = Experiment::new("proj", "gw", "parity", "backend parity");
    exp.processes = Some(vec![Process::new("host-a"), Process::new("host-b")]);
    let id = registry.create_experiment("gw", exp).unwrap();
    let catalog = registry.catalog();
    assert_eq!(catalog.get_process_ids(&id).unwrap().len(), 2);
    let listed = catalog.get_experiment_list("userName", "parity", 0, 0).unwrap();
    assert!(listed.iter().any(|e| e.experiment_id == id));
    assert!(catalog.remove_experiment(&id).unwrap());
    assert!(catalog.get_experiment(&id).unwrap().is_none());
}

#[test]
fn memory_backend_from_config() {
    let config = CatalogConfig { backend: Backend::Memory,
                                 settings: Default::default() };
    exercise(&DynRegistry::from_config(&config).unwrap());
}

#[test]
fn postgres_backend_from_config() {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skip postgres_backend_from_config (no DATABASE_URL)");
        return;
    }
    let config = CatalogConfig { backend: Backend::Postgres,
                                 settings: Default::default() };
    exercise(&DynRegistry::from_config(&config).expect("postgres registry"));
}
