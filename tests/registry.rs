use expcat_core::{CatalogError, Experiment, ExperimentState, StatusRecord};
use expcatalog::{Registry, RegistryError};

#[test]
fn create_requires_a_name_and_stamps_the_gateway() {
    let registry = Registry::in_memory();
    let err = registry.create_experiment("gw-1", Experiment::new("proj", "", "alice", "  ")).unwrap_err();
    assert!(matches!(err, RegistryError::Catalog(CatalogError::Validation(_))));

    let id = registry.create_experiment("gw-1", Experiment::new("proj", "", "alice", "ok")).unwrap();
    let stored = registry.catalog().get_experiment(&id).unwrap().unwrap();
    assert_eq!(stored.gateway_id, "gw-1");
}

#[test]
fn updates_stop_once_the_experiment_launches() {
    let registry = Registry::in_memory();
    let id = registry.create_experiment("gw", Experiment::new("proj", "gw", "alice", "draft")).unwrap();
    registry.update_experiment(&id, Experiment::new("proj", "gw", "alice", "draft v2")).unwrap();

    registry.catalog().add_experiment_status(StatusRecord::new(ExperimentState::Scheduled), &id).unwrap();
    registry.update_experiment(&id, Experiment::new("proj", "gw", "alice", "draft v3")).unwrap();

    registry.catalog().add_experiment_status(StatusRecord::new(ExperimentState::Launched), &id).unwrap();
    let err = registry.update_experiment(&id, Experiment::new("proj", "gw", "alice", "too late")).unwrap_err();
    assert!(matches!(err, RegistryError::NotEditable { state: ExperimentState::Launched, .. }));
    assert_eq!(registry.catalog().get_experiment(&id).unwrap().unwrap().experiment_name, "draft v3");
}

#[test]
fn updating_an_unknown_experiment_is_not_found() {
    let registry = Registry::in_memory();
    let err = registry.update_experiment("nope", Experiment::new("proj", "gw", "alice", "x")).unwrap_err();
    assert!(matches!(err, RegistryError::Catalog(CatalogError::NotFound { .. })));
}
