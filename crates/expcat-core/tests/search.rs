use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use expcat_core::store::SummaryOrder;
use expcat_core::{Catalog, CatalogSettings, Experiment, ExperimentState, InMemoryCatalogStore, Job,
                  Process, StatusRecord, Task, TaskType};

fn filters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn experiment(i: usize, user: &str) -> Experiment {
    Experiment { experiment_id: format!("exp-{i:05}"),
                 ..Experiment::new("proj", "gw", user, format!("run {i}")) }
}

#[test]
fn offset_and_limit_span_batches() {
    let catalog = Catalog::new(InMemoryCatalogStore::new());
    let ids: Vec<String> = (0..25_000).map(|i| catalog.add_experiment(experiment(i, "alice")).unwrap()).collect();
    assert_eq!(catalog.settings().search_batch_size, 10_000);

    let found = catalog.search_experiments(&ids, &HashMap::new(), 10, 15, Some(SummaryOrder::oldest_first()))
                       .unwrap();
    let found: Vec<_> = found.into_iter().map(|s| s.experiment_id).collect();
    let expected: Vec<_> = (15..25).map(|i| format!("exp-{i:05}")).collect();
    assert_eq!(found, expected);
}

#[test]
fn offset_applies_only_to_the_first_batch() {
    let catalog = Catalog::new(InMemoryCatalogStore::new()).with_settings(CatalogSettings { search_batch_size: 100,
                                                                                          ..CatalogSettings::default() });
    let ids: Vec<String> =
        (0..250).map(|i| {
                     let user = if i < 12 || (100..120).contains(&i) { "target" } else { "other" };
                     catalog.add_experiment(experiment(i, user)).unwrap()
                 })
                 .collect();

    let found = catalog.search_experiments(&ids,
                                           &filters(&[("userName", "target")]),
                                           10,
                                           15,
                                           Some(SummaryOrder::oldest_first()))
                       .unwrap();
    let found: Vec<_> = found.into_iter().map(|s| s.experiment_id).collect();
    let expected: Vec<_> = (100..110).map(|i| format!("exp-{i:05}")).collect();
    assert_eq!(found, expected);
}

#[test]
fn empty_candidates_find_nothing() {
    let catalog = Catalog::new(InMemoryCatalogStore::new());
    catalog.add_experiment(experiment(1, "alice")).unwrap();
    assert!(catalog.search_experiments(&[], &HashMap::new(), 0, 0, None).unwrap().is_empty());
    let stats = catalog.get_experiment_statistics(&[], &HashMap::new(), 10, 0).unwrap();
    assert_eq!(stats.all_experiment_count(), 0);
}

#[test]
fn search_matches_substrings_and_jobs() {
    let catalog = Catalog::new(InMemoryCatalogStore::new());
    let mut with_job = experiment(1, "alice");
    let mut task = Task::new(TaskType::JobSubmission);
    task.jobs = Some(vec![Job { job_id: "slurm-42".into(),
                                ..Job::default() }]);
    with_job.processes = Some(vec![Process { tasks: Some(vec![task]),
                                             ..Process::new("host") }]);
    let ids = vec![catalog.add_experiment(with_job).unwrap(), catalog.add_experiment(experiment(2, "bob")).unwrap()];

    let by_user = catalog.search_experiments(&ids, &filters(&[("userName", "lic")]), 0, 0, None).unwrap();
    assert_eq!(by_user.len(), 1);
    let by_job = catalog.search_experiments(&ids, &filters(&[("jobId", "slurm-42")]), 0, 0, None).unwrap();
    assert_eq!(by_job[0].experiment_id, "exp-00001");
    let by_status = catalog.search_experiments(&ids, &filters(&[("status", "CREATED")]), 0, 0, None).unwrap();
    assert_eq!(by_status.len(), 2);
}

#[test]
fn statistics_group_current_states() {
    let catalog = Catalog::new(InMemoryCatalogStore::new());
    let moves = [None,
                 None,
                 Some(ExperimentState::Executing),
                 Some(ExperimentState::Completed),
                 Some(ExperimentState::Failed),
                 Some(ExperimentState::Canceled)];
    let mut ids = Vec::new();
    for (i, state) in moves.iter().enumerate() {
        let id = catalog.add_experiment(experiment(i, "alice")).unwrap();
        if let Some(state) = state {
            catalog.add_experiment_status(StatusRecord::new(*state), &id).unwrap();
        }
        ids.push(id);
    }

    let stats = catalog.get_experiment_statistics(&ids, &HashMap::new(), 1, 0).unwrap();
    assert_eq!(stats.all_experiment_count(), 6);
    assert_eq!(stats.created_experiment_count(), 2);
    assert_eq!(stats.running_experiment_count(), 1);
    assert_eq!(stats.completed_experiment_count(), 1);
    assert_eq!(stats.failed_experiment_count(), 1);
    assert_eq!(stats.cancelled_experiment_count(), 1);
    assert_eq!(stats.all_experiments().len(), 1);
    assert_eq!(stats.failed_experiments()[0].experiment_id, "exp-00004");

    // Las estadísticas comparan texto por igualdad exacta.
    let partial = catalog.get_experiment_statistics(&ids, &filters(&[("userName", "ali")]), 10, 0).unwrap();
    assert_eq!(partial.all_experiment_count(), 0);
}

#[test]
fn statistics_lists_are_newest_first() {
    let catalog = Catalog::new(InMemoryCatalogStore::new());
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(catalog.add_experiment(experiment(i, "alice")).unwrap());
        thread::sleep(Duration::from_millis(2));
    }
    let stats = catalog.get_experiment_statistics(&ids, &HashMap::new(), 0, 0).unwrap();
    let listed: Vec<_> = stats.all_experiments().iter().map(|s| s.experiment_id.clone()).collect();
    assert_eq!(listed, vec!["exp-00002", "exp-00001", "exp-00000"]);
}
