//! Ledger de historial de estados.
//!
//! Cada registro tiene un historial sólo-append. `current` es la entrada más
//! reciente por instante de cambio (empates: la última insertada) y `history`
//! las devuelve todas, más reciente primero. Nada aquí borra entradas.

pub mod validator;

use std::marker::PhantomData;

use chrono::Utc;
use log::{debug, warn};

use crate::errors::{CatalogError, StoreResultExt};
use crate::ids::{is_unset, IdGenerator};
use crate::mapper::{status_from_row, status_row};
use crate::model::{LifecycleState, RecordKey, StatusRecord};
use crate::store::{CatalogStore, StatusRow, UnitOfWork};

pub use validator::{experiment_transition_admitted, is_valid_transition, TransitionRules};

/// Semilla para ids de entradas de estado de un nivel.
pub fn status_seed<S: LifecycleState>() -> String {
    format!("{}_STATUS", S::LEVEL)
}

/// Secuencia perezosa del historial, más reciente primero. Se consume una
/// vez; entradas con estado ilegible se omiten con aviso.
pub struct StatusHistory<S> {
    rows: std::vec::IntoIter<StatusRow>,
    _state: PhantomData<S>,
}

impl<S> StatusHistory<S> {
    fn new(rows: Vec<StatusRow>) -> Self {
        Self { rows: rows.into_iter(),
               _state: PhantomData }
    }
}

impl<S: LifecycleState> Iterator for StatusHistory<S> {
    type Item = StatusRecord<S>;

    fn next(&mut self) -> Option<Self::Item> {
        for row in self.rows.by_ref() {
            match status_from_row(row) {
                Ok(status) => return Some(status),
                Err(e) => warn!("status_history:skip err={e}"),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.rows.size_hint().1)
    }
}

/// Acceso al historial de estados sobre un almacenamiento.
pub struct StatusLedger<'a> {
    store: &'a dyn CatalogStore,
    ids: &'a dyn IdGenerator,
}

impl<'a> StatusLedger<'a> {
    pub fn new(store: &'a dyn CatalogStore, ids: &'a dyn IdGenerator) -> Self {
        Self { store, ids }
    }

    /// Inserta una entrada nueva para `owner`.
    ///
    /// Se respeta el id del cliente salvo que falte o ya esté registrado para
    /// ese dueño; entonces se genera uno nuevo, así cada llamada añade una
    /// entrada. El instante de cambio se fija a "ahora" si falta. Devuelve la
    /// entrada tal como quedó escrita.
    pub fn append<S: LifecycleState>(&self,
                                     owner: &RecordKey,
                                     mut status: StatusRecord<S>)
                                     -> Result<StatusRecord<S>, CatalogError> {
        debug!("append_status:start owner={owner} state={}", status.state);
        if is_unset(&status.status_id) || self.is_recorded(owner, &status.status_id)? {
            status.status_id = self.ids.new_id(&status_seed::<S>());
        }
        let now = Utc::now();
        status.time_of_state_change.get_or_insert(now);
        status.owner = Some(owner.clone());

        let mut unit = UnitOfWork::new();
        unit.insert_status(status_row(&status, owner, now));
        self.store.commit(unit).context("append_status", owner.id())?;
        debug!("append_status:done owner={owner} status_id={}", status.status_id);
        Ok(status)
    }

    fn is_recorded(&self, owner: &RecordKey, status_id: &str) -> Result<bool, CatalogError> {
        let rows = self.store.status_entries(owner).context("append_status", owner.id())?;
        Ok(rows.iter().any(|r| r.status_id == status_id))
    }

    pub fn current<S: LifecycleState>(&self, owner: &RecordKey) -> Result<Option<StatusRecord<S>>, CatalogError> {
        let row = self.store.latest_status(owner).context("get_current_status", owner.id())?;
        row.map(status_from_row).transpose().context("get_current_status", owner.id())
    }

    pub fn history<S: LifecycleState>(&self, owner: &RecordKey) -> Result<StatusHistory<S>, CatalogError> {
        let rows = self.store.status_entries(owner).context("get_status_history", owner.id())?;
        Ok(StatusHistory::new(rows))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::ids::UuidIdGenerator;
    use crate::model::{ExperimentState, JobKey, JobState};
    use crate::store::{ExperimentRow, InMemoryCatalogStore, RecordRow};

    fn store_with_experiment(id: &str) -> InMemoryCatalogStore {
        let store = InMemoryCatalogStore::new();
        let now = Utc::now();
        let mut unit = UnitOfWork::new();
        unit.upsert(RecordRow::Experiment(ExperimentRow { experiment_id: id.into(),
                                                          project_id: String::new(),
                                                          gateway_id: String::new(),
                                                          experiment_type: Default::default(),
                                                          user_name: String::new(),
                                                          experiment_name: id.into(),
                                                          creation_time: now,
                                                          last_update_time: now,
                                                          description: None,
                                                          execution_id: None,
                                                          gateway_execution_id: None,
                                                          gateway_instance_id: None,
                                                          enable_email_notification: false,
                                                          email_addresses: None,
                                                          user_configuration_data: None,
                                                          experiment_inputs: None,
                                                          experiment_outputs: None,
                                                          errors: None }));
        store.commit(unit).unwrap();
        store
    }

    #[test]
    fn history_is_newest_first_and_current_is_last_change() {
        let store = store_with_experiment("e1");
        let ledger = StatusLedger::new(&store, &UuidIdGenerator);
        let owner = RecordKey::Experiment("e1".into());
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let states = [ExperimentState::Created, ExperimentState::Executing, ExperimentState::Completed];
        for (i, state) in states.into_iter().enumerate() {
            ledger.append(&owner, StatusRecord::new(state).at(t0 + Duration::minutes(i as i64))).unwrap();
        }
        let current = ledger.current::<ExperimentState>(&owner).unwrap().unwrap();
        assert_eq!(current.state, ExperimentState::Completed);
        let states: Vec<ExperimentState> = ledger.history::<ExperimentState>(&owner).unwrap().map(|s| s.state).collect();
        assert_eq!(states,
                   vec![ExperimentState::Completed, ExperimentState::Executing, ExperimentState::Created]);
    }

    #[test]
    fn time_of_change_wins_over_insertion_order() {
        let store = store_with_experiment("e1");
        let ledger = StatusLedger::new(&store, &UuidIdGenerator);
        let owner = RecordKey::Experiment("e1".into());
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        ledger.append(&owner, StatusRecord::new(ExperimentState::Executing).at(t0 + Duration::hours(1))).unwrap();
        ledger.append(&owner, StatusRecord::new(ExperimentState::Created).at(t0)).unwrap();
        let current = ledger.current::<ExperimentState>(&owner).unwrap().unwrap();
        assert_eq!(current.state, ExperimentState::Executing);
    }

    #[test]
    fn state_change_gets_a_fresh_id() {
        let store = store_with_experiment("e1");
        let ledger = StatusLedger::new(&store, &UuidIdGenerator);
        let owner = RecordKey::Experiment("e1".into());
        let first = ledger.append(&owner, StatusRecord::new(ExperimentState::Created)).unwrap();
        assert!(first.status_id.starts_with("EXPERIMENT_STATUS_"));
        let mut reuse = StatusRecord::new(ExperimentState::Launched);
        reuse.status_id = first.status_id.clone();
        let second = ledger.append(&owner, reuse).unwrap();
        assert_ne!(second.status_id, first.status_id);
        assert_eq!(ledger.history::<ExperimentState>(&owner).unwrap().count(), 2);
        assert!(second.time_of_state_change.is_some());
    }

    #[test]
    fn recorded_id_with_the_same_state_still_appends() {
        let store = store_with_experiment("e1");
        let ledger = StatusLedger::new(&store, &UuidIdGenerator);
        let owner = RecordKey::Experiment("e1".into());
        let first = ledger.append(&owner, StatusRecord::new(ExperimentState::Executing).with_reason("first"))
                          .unwrap();
        let mut again = StatusRecord::new(ExperimentState::Executing).with_reason("second");
        again.status_id = first.status_id.clone();
        let second = ledger.append(&owner, again).unwrap();

        assert_ne!(second.status_id, first.status_id);
        assert_eq!(ledger.history::<ExperimentState>(&owner).unwrap().count(), 2);
        let current = ledger.current::<ExperimentState>(&owner).unwrap().unwrap();
        assert_eq!(current.status_id, second.status_id);
        assert_eq!(current.reason.as_deref(), Some("second"));
    }

    #[test]
    fn new_client_id_is_kept() {
        let store = store_with_experiment("e1");
        let ledger = StatusLedger::new(&store, &UuidIdGenerator);
        let owner = RecordKey::Experiment("e1".into());
        let mut status = StatusRecord::new(ExperimentState::Validated);
        status.status_id = "client-status-1".into();
        let written = ledger.append(&owner, status).unwrap();
        assert_eq!(written.status_id, "client-status-1");
        assert_eq!(ledger.current::<ExperimentState>(&owner).unwrap().unwrap().status_id, "client-status-1");
    }

    #[test]
    fn unknown_owner_has_no_status() {
        let store = InMemoryCatalogStore::new();
        let ledger = StatusLedger::new(&store, &UuidIdGenerator);
        let owner = RecordKey::Job(JobKey::new("t", "j"));
        assert!(ledger.current::<JobState>(&owner).unwrap().is_none());
        assert_eq!(ledger.history::<JobState>(&owner).unwrap().count(), 0);
    }
}
