use chrono::{TimeZone, Utc};
use expcat_core::{Catalog, CatalogError, CatalogSettings, DataParam, ErrorRecord, Experiment, ExperimentState,
                  InMemoryCatalogStore, Job, JobKey, JobLookup, JobState, Process, ProcessState, RecordKind,
                  StatusRecord, Task, TaskState, TaskType, UserConfigurationData};

fn catalog() -> Catalog<InMemoryCatalogStore> {
    Catalog::new(InMemoryCatalogStore::new())
}

fn process(id: &str) -> Process {
    Process { process_id: id.into(),
              ..Process::new("host-a") }
}

fn full_tree() -> Experiment {
    let mut task = Task::new(TaskType::JobSubmission);
    task.jobs = Some(vec![Job { job_id: "job-1".into(),
                                ..Job::default() }]);
    let mut p = Process::new("host-a");
    p.tasks = Some(vec![task]);
    let mut exp = Experiment::new("proj", "gw", "alice", "My Exp/1");
    exp.processes = Some(vec![p]);
    exp
}

#[test]
fn add_experiment_assigns_ids_and_links_every_level() {
    let catalog = catalog();
    let id = catalog.add_experiment(full_tree()).unwrap();
    assert!(id.starts_with("My_Exp_1_"), "unexpected id {id}");

    let stored = catalog.get_experiment(&id).unwrap().expect("experiment");
    let p = &stored.processes.as_ref().unwrap()[0];
    assert_eq!(p.experiment_id, id);
    assert!(p.process_id.starts_with("PROCESS_"));
    let t = &p.tasks.as_ref().unwrap()[0];
    assert_eq!(t.parent_process_id, p.process_id);
    assert!(t.task_id.starts_with("TASK_"));
    let j = &t.jobs.as_ref().unwrap()[0];
    assert_eq!(j.task_id, t.task_id);
    assert_eq!(j.process_id, p.process_id);

    assert_eq!(stored.current_state(), Some(ExperimentState::Created));
    assert_eq!(catalog.get_process_status(&p.process_id).unwrap().unwrap().state, ProcessState::Created);
    assert_eq!(catalog.get_task_status(&t.task_id).unwrap().unwrap().state, TaskState::Created);
    assert!(catalog.get_job_status(&j.key()).unwrap().is_none());
    assert!(stored.creation_time.is_some());
}

#[test]
fn update_reconciles_processes_by_id() {
    let catalog = catalog();
    let mut exp = Experiment::new("proj", "gw", "alice", "reconcile");
    exp.processes = Some(vec![process("p-a"), process("p-b")]);
    let id = catalog.add_experiment(exp).unwrap();
    let before = catalog.get_process("p-b").unwrap().unwrap();

    let mut b = process("p-b");
    b.process_detail = Some("updated".into());
    let mut incoming = Experiment::new("proj", "gw", "alice", "renamed");
    incoming.processes = Some(vec![b, process("p-c")]);
    catalog.update_experiment(&id, incoming).unwrap();

    let after = catalog.get_experiment(&id).unwrap().unwrap();
    assert_eq!(after.experiment_name, "renamed");
    let mut ids: Vec<_> = after.processes.unwrap().into_iter().map(|p| p.process_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["p-b", "p-c"]);
    assert!(!catalog.is_process_exist("p-a").unwrap());
    assert!(catalog.get_process_status("p-a").unwrap().is_none());

    let merged = catalog.get_process("p-b").unwrap().unwrap();
    assert_eq!(merged.process_detail.as_deref(), Some("updated"));
    assert_eq!(merged.creation_time, before.creation_time);
    assert_eq!(catalog.get_process_status("p-c").unwrap().unwrap().state, ProcessState::Created);
}

#[test]
fn absent_lists_leave_children_untouched() {
    let catalog = catalog();
    let id = catalog.add_experiment(full_tree()).unwrap();
    let mut incoming = Experiment::new("proj", "gw", "alice", "same");
    incoming.processes = None;
    catalog.update_experiment(&id, incoming).unwrap();
    assert_eq!(catalog.get_process_ids(&id).unwrap().len(), 1);

    let mut emptied = Experiment::new("proj", "gw", "alice", "same");
    emptied.processes = Some(Vec::new());
    catalog.update_experiment(&id, emptied).unwrap();
    assert!(catalog.get_process_ids(&id).unwrap().is_empty());
    assert!(catalog.get_job_details(&id).unwrap().is_empty());
}

#[test]
fn updating_a_missing_experiment_is_not_found() {
    let err = catalog().update_experiment("ghost", Experiment::default()).unwrap_err();
    assert_eq!(err, CatalogError::NotFound { kind: RecordKind::Experiment, id: "ghost".into() });
}

#[test]
fn children_need_an_existing_parent() {
    let catalog = catalog();
    let err = catalog.add_process(Process::new("h"), "nope").unwrap_err();
    assert_eq!(err, CatalogError::InconsistentParent { kind: RecordKind::Experiment, id: "nope".into() });

    let err = catalog.add_task_status(StatusRecord::new(TaskState::Executing), "no-task").unwrap_err();
    assert!(matches!(err, CatalogError::InconsistentParent { kind: RecordKind::Task, .. }));
}

#[test]
fn removing_an_experiment_removes_its_tree() {
    let catalog = catalog();
    let id = catalog.add_experiment(full_tree()).unwrap();
    let jobs = catalog.get_job_details(&id).unwrap();
    assert_eq!(jobs.len(), 1);
    let process_id = jobs[0].process_id.clone();

    assert!(catalog.remove_experiment(&id).unwrap());
    assert!(!catalog.remove_experiment(&id).unwrap());
    assert!(!catalog.is_experiment_exist(&id).unwrap());
    assert!(!catalog.is_process_exist(&process_id).unwrap());
    assert!(!catalog.is_job_exist(&jobs[0].key()).unwrap());
    assert_eq!(catalog.get_experiment_statuses(&id).unwrap().count(), 0);
}

#[test]
fn jobs_require_an_id_and_are_listed_by_owner() {
    let catalog = catalog();
    let id = catalog.add_experiment(full_tree()).unwrap();
    let process = catalog.get_process_list(&id).unwrap().remove(0);
    let task_id = process.tasks.as_ref().unwrap()[0].task_id.clone();

    let err = catalog.add_job(Job::new("", task_id.clone()), &process.process_id).unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    let key = catalog.add_job(Job::new("job-2", task_id.clone()), &process.process_id).unwrap();
    assert_eq!(key.job_id, "job-2");
    assert_eq!(catalog.get_job_list(&JobLookup::ByTask(task_id)).unwrap().len(), 2);
    assert_eq!(catalog.get_job_list(&JobLookup::ByJobId("job-2".into())).unwrap().len(), 1);

    assert_eq!(catalog.delete_jobs(&process.process_id).unwrap(), 2);
    assert!(catalog.get_job_list(&JobLookup::ByProcess(process.process_id)).unwrap().is_empty());
}

#[test]
fn delete_tasks_clears_a_process() {
    let catalog = catalog();
    let id = catalog.add_experiment(full_tree()).unwrap();
    let process_id = catalog.get_process_ids(&id).unwrap().remove(0);
    catalog.add_task(Task::new(TaskType::EnvSetup), &process_id).unwrap();
    assert_eq!(catalog.get_task_list(&process_id).unwrap().len(), 2);

    assert_eq!(catalog.delete_tasks(&process_id).unwrap(), 2);
    assert!(catalog.get_task_list(&process_id).unwrap().is_empty());
    assert!(catalog.get_job_details(&id).unwrap().is_empty());
}

#[test]
fn outputs_are_replaced_by_name() {
    let catalog = catalog();
    let id = catalog.add_experiment(Experiment::new("proj", "gw", "alice", "outputs")).unwrap();
    catalog.add_experiment_outputs(vec![DataParam::new("a", "1")], &id).unwrap();
    catalog.add_experiment_outputs(vec![DataParam::new("a", "2"), DataParam::new("b", "3")], &id).unwrap();

    let outputs = catalog.get_experiment_outputs(&id).unwrap().unwrap();
    let pairs: Vec<_> = outputs.iter().map(|p| (p.name.as_str(), p.value.as_deref().unwrap_or(""))).collect();
    assert_eq!(pairs, vec![("a", "2"), ("b", "3")]);
    assert!(outputs.iter().all(|p| p.owner_id == id));
}

#[test]
fn errors_get_ids_and_owner() {
    let catalog = catalog();
    let id = catalog.add_experiment(Experiment::new("proj", "gw", "alice", "errors")).unwrap();
    let error_id = catalog.add_experiment_error(ErrorRecord::new("disk full"), &id).unwrap();
    assert!(error_id.starts_with("EXPERIMENT_ERROR_"));
    let errors = catalog.get_experiment_errors(&id).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].owner_id, id);
    assert!(errors[0].creation_time.is_some());
}

#[test]
fn user_configuration_survives_updates_without_one() {
    let catalog = catalog();
    let id = catalog.add_experiment(Experiment::new("proj", "gw", "alice", "config")).unwrap();
    let config = UserConfigurationData { airavata_auto_schedule: true,
                                         ..UserConfigurationData::default() };
    catalog.add_user_configuration_data(config.clone(), &id).unwrap();
    catalog.update_experiment(&id, Experiment::new("proj", "gw", "alice", "config")).unwrap();
    assert_eq!(catalog.get_user_configuration_data(&id).unwrap(), Some(config));
}

#[test]
fn experiment_list_filters_by_exact_field() {
    let catalog = catalog();
    catalog.add_experiment(Experiment::new("proj", "gw", "alice", "one")).unwrap();
    catalog.add_experiment(Experiment::new("proj", "gw", "alice", "two")).unwrap();
    catalog.add_experiment(Experiment::new("proj", "gw", "alicia", "three")).unwrap();

    assert_eq!(catalog.get_experiment_list("userName", "alice", 0, 0).unwrap().len(), 2);
    assert_eq!(catalog.get_experiment_list("userName", "alice", 1, 0).unwrap().len(), 1);
    assert_eq!(catalog.get_experiment_list("projectId", "proj", 0, 2).unwrap().len(), 1);
    let err = catalog.get_experiment_list("color", "red", 0, 0).unwrap_err();
    assert_eq!(err, CatalogError::UnsupportedFilter { field: "color".into() });
}

#[test]
fn processes_in_state_only_counts_the_current_state() {
    let catalog = catalog().with_settings(CatalogSettings { state_scan_page: 2,
                                                            ..CatalogSettings::default() });
    let mut exp = Experiment::new("proj", "gw", "alice", "states");
    exp.processes = Some((0..5).map(|i| process(&format!("p-{i}"))).collect());
    catalog.add_experiment(exp).unwrap();

    for i in 0..3 {
        catalog.add_process_status(StatusRecord::new(ProcessState::Executing), &format!("p-{i}")).unwrap();
    }
    catalog.add_process_status(StatusRecord::new(ProcessState::Completed), "p-0").unwrap();

    let mut executing: Vec<_> = catalog.get_process_list_in_state(ProcessState::Executing)
                                       .unwrap()
                                       .into_iter()
                                       .map(|p| p.process_id)
                                       .collect();
    executing.sort();
    assert_eq!(executing, vec!["p-1", "p-2"]);
    assert_eq!(catalog.get_process_list_in_state(ProcessState::Created).unwrap().len(), 2);
}

#[test]
fn repeating_an_update_with_several_statuses_adds_nothing() {
    let catalog = catalog();
    let id = catalog.add_experiment(Experiment::new("proj", "gw", "alice", "twice")).unwrap();
    let mut incoming = Experiment::new("proj", "gw", "alice", "twice");
    incoming.experiment_status = Some(vec![StatusRecord::new(ExperimentState::Executing),
                                           StatusRecord::new(ExperimentState::Created)]);

    catalog.update_experiment(&id, incoming.clone()).unwrap();
    let first: Vec<_> = catalog.get_experiment_statuses(&id).unwrap().map(|s| s.state).collect();
    assert_eq!(first, vec![ExperimentState::Executing, ExperimentState::Created]);

    catalog.update_experiment(&id, incoming).unwrap();
    let second: Vec<_> = catalog.get_experiment_statuses(&id).unwrap().map(|s| s.state).collect();
    assert_eq!(second, first);
    assert_eq!(catalog.get_experiment_status(&id).unwrap().unwrap().state, ExperimentState::Executing);
}

fn tree_with_histories() -> Experiment {
    let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 9, 5, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 2, 1, 9, 10, 0).unwrap();

    let mut job = Job::new("job-1", "t-1");
    job.job_status = Some(vec![StatusRecord::new(JobState::Active),
                               StatusRecord::new(JobState::Queued).at(t1),
                               StatusRecord::new(JobState::Submitted).at(t0)]);
    let mut task = Task { task_id: "t-1".into(),
                          ..Task::new(TaskType::JobSubmission) };
    task.task_status = Some(vec![StatusRecord::new(TaskState::Executing), StatusRecord::new(TaskState::Created)]);
    task.jobs = Some(vec![job]);
    let mut p = process("p-1");
    p.process_status = Some(vec![StatusRecord::new(ProcessState::Executing),
                                 StatusRecord::new(ProcessState::Started).at(t1)]);
    p.tasks = Some(vec![task]);
    let mut exp = Experiment::new("proj", "gw", "alice", "nested");
    exp.experiment_status = Some(vec![StatusRecord::new(ExperimentState::Executing),
                                      StatusRecord::new(ExperimentState::Launched).at(t2),
                                      StatusRecord::new(ExperimentState::Created).at(t0)]);
    exp.processes = Some(vec![p]);
    exp
}

fn histories(catalog: &Catalog<InMemoryCatalogStore>, id: &str) -> (Vec<String>, Vec<String>, Vec<String>, Vec<String>) {
    let job = JobKey::new("t-1", "job-1");
    (catalog.get_experiment_statuses(id).unwrap().map(|s| s.status_id).collect(),
     catalog.get_process_statuses("p-1").unwrap().map(|s| s.status_id).collect(),
     catalog.get_task_statuses("t-1").unwrap().map(|s| s.status_id).collect(),
     catalog.get_job_status_history(&job).unwrap().map(|s| s.status_id).collect())
}

#[test]
fn resending_a_nested_tree_with_histories_changes_nothing() {
    let catalog = catalog();
    let mut base = tree_with_histories();
    base.experiment_status = None;
    for p in base.processes.iter_mut().flatten() {
        p.process_status = None;
        for t in p.tasks.iter_mut().flatten() {
            t.task_status = None;
            for j in t.jobs.iter_mut().flatten() {
                j.job_status = None;
            }
        }
    }
    let id = catalog.add_experiment(base).unwrap();

    catalog.update_experiment(&id, tree_with_histories()).unwrap();
    let first = histories(&catalog, &id);
    assert_eq!(first.0.len(), 4);
    assert_eq!(first.1.len(), 3);
    assert_eq!(first.2.len(), 2);
    assert_eq!(first.3.len(), 3);

    catalog.update_experiment(&id, tree_with_histories()).unwrap();
    assert_eq!(histories(&catalog, &id), first);
    assert_eq!(catalog.get_experiment_status(&id).unwrap().unwrap().state, ExperimentState::Executing);
    assert_eq!(catalog.get_process_status("p-1").unwrap().unwrap().state, ProcessState::Executing);
    assert_eq!(catalog.get_task_status("t-1").unwrap().unwrap().state, TaskState::Executing);
    assert_eq!(catalog.get_job_status(&JobKey::new("t-1", "job-1")).unwrap().unwrap().state, JobState::Active);
}

#[test]
fn a_child_id_owned_by_another_parent_is_rejected() {
    let catalog = catalog();
    let mut a = Experiment::new("proj", "gw", "alice", "owner a");
    a.processes = Some(vec![process("p-shared")]);
    let a_id = catalog.add_experiment(a).unwrap();
    let before = catalog.get_process("p-shared").unwrap().unwrap();

    let mut b = Experiment::new("proj", "gw", "alice", "owner b");
    b.processes = Some(vec![process("p-shared")]);
    let err = catalog.add_experiment(b).unwrap_err();
    assert_eq!(err, CatalogError::InconsistentParent { kind: RecordKind::Process, id: "p-shared".into() });

    let b_id = catalog.add_experiment(Experiment::new("proj", "gw", "alice", "owner b")).unwrap();
    let mut moved = Experiment::new("proj", "gw", "alice", "owner b");
    moved.processes = Some(vec![process("p-shared")]);
    let err = catalog.update_experiment(&b_id, moved).unwrap_err();
    assert!(matches!(err, CatalogError::InconsistentParent { kind: RecordKind::Process, .. }));

    let after = catalog.get_process("p-shared").unwrap().unwrap();
    assert_eq!(after.experiment_id, a_id);
    assert_eq!(after.creation_time, before.creation_time);
}

#[test]
fn re_adding_a_child_under_its_parent_keeps_its_creation_time() {
    let catalog = catalog();
    let mut exp = Experiment::new("proj", "gw", "alice", "readd");
    exp.processes = Some(vec![process("p-again")]);
    let id = catalog.add_experiment(exp).unwrap();
    let before = catalog.get_process("p-again").unwrap().unwrap();

    catalog.add_process(process("p-again"), &id).unwrap();
    let after = catalog.get_process("p-again").unwrap().unwrap();
    assert_eq!(after.creation_time, before.creation_time);
    assert_eq!(catalog.get_process_statuses("p-again").unwrap().count(), 1);
}
