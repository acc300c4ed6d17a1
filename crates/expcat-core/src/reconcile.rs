//! Reconciliación de listas anidadas en actualizaciones.
//!
//! La lista entrante es un reemplazo completo: los elementos que coinciden por
//! clave con uno persistido se fusionan sobre él, los nuevos se insertan y los
//! persistidos que no aparecen se descartan. El resultado conserva el orden de
//! la lista entrante.
//!
//! Lista ausente (`None`) y lista vacía no son lo mismo: una entrada ausente
//! deja lo persistido intacto, una vacía lo borra todo.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::model::{DataParam, ErrorRecord, Experiment, Job, Process, Task};

/// Elemento de una colección reconciliable.
pub trait Reconcile {
    type Key: Eq + Hash;

    fn reconcile_key(&self) -> Self::Key;

    /// Sustituye los campos propios por los entrantes, conservando los que
    /// mantiene el servidor (instante de creación, dueño...).
    fn merge_from(&mut self, incoming: Self);
}

/// Calcula la colección a persistir.
///
/// - `incoming = None`: se devuelve `current` sin cambios.
/// - `current = None`: no hay nada con qué fusionar; se devuelve `incoming`.
/// - Ambas presentes: reemplazo completo con fusión por clave.
pub fn reconcile<T: Reconcile>(current: Option<Vec<T>>, incoming: Option<Vec<T>>) -> Option<Vec<T>> {
    let (current, incoming) = match (current, incoming) {
        (current, None) => return current,
        (None, incoming) => return incoming,
        (Some(c), Some(i)) => (c, i),
    };
    let mut by_key: IndexMap<T::Key, T> = current.into_iter().map(|item| (item.reconcile_key(), item)).collect();
    incoming.into_iter()
            .map(|item| match by_key.swap_remove(&item.reconcile_key()) {
                Some(mut existing) => {
                    existing.merge_from(item);
                    existing
                }
                None => item,
            })
            .collect::<Vec<_>>()
            .into()
}

impl Reconcile for DataParam {
    type Key = String;

    fn reconcile_key(&self) -> String {
        self.name.clone()
    }

    fn merge_from(&mut self, incoming: Self) {
        let owner_id = std::mem::take(&mut self.owner_id);
        *self = incoming;
        if self.owner_id.is_empty() {
            self.owner_id = owner_id;
        }
    }
}

impl Reconcile for ErrorRecord {
    type Key = String;

    fn reconcile_key(&self) -> String {
        self.error_id.clone()
    }

    fn merge_from(&mut self, mut incoming: Self) {
        incoming.creation_time = self.creation_time.or(incoming.creation_time);
        if incoming.owner_id.is_empty() {
            incoming.owner_id = std::mem::take(&mut self.owner_id);
        }
        *self = incoming;
    }
}

impl Reconcile for Job {
    type Key = String;

    fn reconcile_key(&self) -> String {
        self.job_id.clone()
    }

    fn merge_from(&mut self, mut incoming: Self) {
        incoming.creation_time = self.creation_time.or(incoming.creation_time);
        *self = incoming;
    }
}

impl Reconcile for Task {
    type Key = String;

    fn reconcile_key(&self) -> String {
        self.task_id.clone()
    }

    fn merge_from(&mut self, mut incoming: Self) {
        incoming.creation_time = self.creation_time.or(incoming.creation_time);
        incoming.task_errors = reconcile(self.task_errors.take(), incoming.task_errors);
        incoming.jobs = reconcile(self.jobs.take(), incoming.jobs);
        *self = incoming;
    }
}

impl Reconcile for Process {
    type Key = String;

    fn reconcile_key(&self) -> String {
        self.process_id.clone()
    }

    fn merge_from(&mut self, mut incoming: Self) {
        incoming.creation_time = self.creation_time.or(incoming.creation_time);
        incoming.process_errors = reconcile(self.process_errors.take(), incoming.process_errors);
        incoming.process_inputs = reconcile(self.process_inputs.take(), incoming.process_inputs);
        incoming.process_outputs = reconcile(self.process_outputs.take(), incoming.process_outputs);
        incoming.tasks = reconcile(self.tasks.take(), incoming.tasks);
        *self = incoming;
    }
}

impl Reconcile for Experiment {
    type Key = String;

    fn reconcile_key(&self) -> String {
        self.experiment_id.clone()
    }

    fn merge_from(&mut self, mut incoming: Self) {
        incoming.creation_time = self.creation_time.or(incoming.creation_time);
        incoming.experiment_inputs = reconcile(self.experiment_inputs.take(), incoming.experiment_inputs);
        incoming.experiment_outputs = reconcile(self.experiment_outputs.take(), incoming.experiment_outputs);
        incoming.errors = reconcile(self.errors.take(), incoming.errors);
        incoming.processes = reconcile(self.processes.take(), incoming.processes);
        if incoming.user_configuration_data.is_none() {
            incoming.user_configuration_data = self.user_configuration_data.take();
        }
        if incoming.email_addresses.is_none() {
            incoming.email_addresses = self.email_addresses.take();
        }
        *self = incoming;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        key: &'static str,
        v: i32,
        server_stamp: Option<u32>,
    }

    impl Item {
        fn new(key: &'static str, v: i32) -> Self {
            Self { key, v, server_stamp: None }
        }
    }

    impl Reconcile for Item {
        type Key = &'static str;

        fn reconcile_key(&self) -> &'static str {
            self.key
        }

        fn merge_from(&mut self, incoming: Self) {
            self.v = incoming.v;
        }
    }

    #[test]
    fn full_replace_with_merge() {
        let current = vec![Item::new("a", 1), Item { server_stamp: Some(7), ..Item::new("b", 2) }];
        let incoming = vec![Item::new("b", 99), Item::new("c", 3)];
        let out = reconcile(Some(current), Some(incoming)).unwrap();
        assert_eq!(out, vec![Item { server_stamp: Some(7), ..Item::new("b", 99) }, Item::new("c", 3)]);
    }

    #[test]
    fn absent_incoming_keeps_current() {
        let current = vec![Item::new("a", 1)];
        assert_eq!(reconcile(Some(current.clone()), None), Some(current));
    }

    #[test]
    fn empty_incoming_drops_everything() {
        let current = vec![Item::new("a", 1), Item::new("b", 2)];
        assert_eq!(reconcile(Some(current), Some(Vec::new())), Some(Vec::new()));
    }

    #[test]
    fn absent_current_takes_incoming_as_is() {
        let incoming = vec![Item::new("x", 5)];
        assert_eq!(reconcile(None, Some(incoming.clone())), Some(incoming));
        assert_eq!(reconcile::<Item>(None, None), None);
    }

    #[test]
    fn nested_children_are_reconciled_recursively() {
        let mut current = Process { process_id: "p".into(), ..Process::default() };
        let created = chrono::Utc::now();
        current.creation_time = Some(created);
        current.tasks = Some(vec![Task { task_id: "t1".into(), task_detail: Some("old".into()), ..Task::default() },
                                  Task { task_id: "t2".into(), ..Task::default() }]);
        let incoming = Process { process_id: "p".into(),
                                 tasks: Some(vec![Task { task_id: "t1".into(),
                                                         task_detail: Some("new".into()),
                                                         ..Task::default() }]),
                                 ..Process::default() };
        current.merge_from(incoming);
        assert_eq!(current.creation_time, Some(created));
        let tasks = current.tasks.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_detail.as_deref(), Some("new"));
    }

    #[test]
    fn params_keep_their_owner() {
        let mut current = DataParam { owner_id: "exp-1".into(), ..DataParam::new("x", "1") };
        current.merge_from(DataParam::new("x", "2"));
        assert_eq!(current.owner_id, "exp-1");
        assert_eq!(current.value.as_deref(), Some("2"));
    }
}
