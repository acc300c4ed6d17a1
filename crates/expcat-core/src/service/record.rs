//! Mecánica común de escritura y lectura de registros.
//!
//! Alta: asignar ids → cascada de padres → validar → sellar tiempos →
//! planificar estados → una `UnitOfWork`. Actualización: igual, pero el árbol
//! entrante se reconcilia antes con el árbol persistido y los descendientes
//! que desaparecen se borran de abajo hacia arriba en la misma unidad.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::debug;

use crate::cascade::{assign_ids, cascade, read_tree, validate_tree, walk, Lineage, RecordNode, TreeReader,
                     TreeVisitor};
use crate::errors::{CatalogError, StoreError, StoreResultExt};
use crate::ids::{is_unset, IdGenerator};
use crate::mapper::{self, status_row};
use crate::model::{Experiment, Job, LifecycleState, Process, RecordKey, StatusRecord, Task};
use crate::reconcile::Reconcile;
use crate::status::status_seed;
use crate::store::{load_row, CatalogStore, ExperimentRow, JobRow, NewStatusRow, ProcessRow, Snapshot, StoredRow,
                   TaskRow, UnitOfWork};

use super::Catalog;

/// Registro que puede escribirse como raíz de una operación.
pub trait CatalogRecord: RecordNode + Reconcile + Clone + Sized {
    /// Clave del padre directo, si el nivel tiene uno.
    fn parent_key(&self) -> Option<RecordKey>;
    /// Completa las referencias al padre que el cliente dejó vacías.
    fn inherit_parent(&mut self, current: &Self);
    /// Linaje implícito en los campos de padre del propio registro.
    fn lineage(&self) -> Lineage;
    /// Reconstruye el árbol completo desde un snapshot con raíz en este nivel.
    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError>;
}

impl CatalogRecord for Experiment {
    fn parent_key(&self) -> Option<RecordKey> {
        None
    }

    fn inherit_parent(&mut self, _current: &Self) {}

    fn lineage(&self) -> Lineage {
        Lineage::root()
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError> {
        mapper::experiment_tree(mapper::root_row::<ExperimentRow>(snapshot)?, snapshot)
    }
}

impl CatalogRecord for Process {
    fn parent_key(&self) -> Option<RecordKey> {
        Some(RecordKey::Experiment(self.experiment_id.clone()))
    }

    fn inherit_parent(&mut self, current: &Self) {
        if self.experiment_id.is_empty() {
            self.experiment_id = current.experiment_id.clone();
        }
    }

    fn lineage(&self) -> Lineage {
        Lineage::under_experiment(self.experiment_id.clone())
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError> {
        mapper::process_tree(mapper::root_row::<ProcessRow>(snapshot)?, snapshot)
    }
}

impl CatalogRecord for Task {
    fn parent_key(&self) -> Option<RecordKey> {
        Some(RecordKey::Process(self.parent_process_id.clone()))
    }

    fn inherit_parent(&mut self, current: &Self) {
        if self.parent_process_id.is_empty() {
            self.parent_process_id = current.parent_process_id.clone();
        }
    }

    fn lineage(&self) -> Lineage {
        Lineage::under_process(self.parent_process_id.clone())
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError> {
        mapper::task_tree(mapper::root_row::<TaskRow>(snapshot)?, snapshot)
    }
}

impl CatalogRecord for Job {
    fn parent_key(&self) -> Option<RecordKey> {
        Some(RecordKey::Task(self.task_id.clone()))
    }

    fn inherit_parent(&mut self, current: &Self) {
        if self.process_id.is_empty() {
            self.process_id = current.process_id.clone();
        }
    }

    fn lineage(&self) -> Lineage {
        Lineage { experiment_id: None,
                  process_id: Some(self.process_id.clone()).filter(|p| !p.is_empty()),
                  task_id: Some(self.task_id.clone()).filter(|t| !t.is_empty()) }
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError> {
        Ok(mapper::job_tree(mapper::root_row::<JobRow>(snapshot)?, snapshot))
    }
}

/// Fija instantes de creación y actualización. Un nodo nuevo sin historial
/// recibe el estado inicial de su nivel.
struct Stamper<'a> {
    now: DateTime<Utc>,
    existing: &'a HashMap<RecordKey, DateTime<Utc>>,
}

impl TreeVisitor for Stamper<'_> {
    type Error = std::convert::Infallible;

    fn visit<N: RecordNode>(&mut self, node: &mut N, _lineage: &Lineage) -> Result<(), Self::Error> {
        let key = node.key();
        match self.existing.get(&key) {
            Some(created) => *node.creation_time_mut() = Some(*created),
            None => {
                *node.creation_time_mut() = Some(self.now);
                if node.statuses().map_or(true, <[_]>::is_empty) {
                    if let Some(initial) = N::State::initial() {
                        let mut status = StatusRecord::new(initial).at(self.now);
                        status.owner = Some(key);
                        *node.statuses_mut() = Some(vec![status]);
                    }
                }
            }
        }
        if let Some(updated) = node.last_update_time_mut() {
            *updated = Some(self.now);
        }
        Ok(())
    }
}

/// Emite las filas de arriba hacia abajo y las entradas de estado a insertar.
///
/// Reenviar la misma lista no añade nada al historial:
/// - una entrada con id ya registrado para el dueño no se reinserta;
/// - una entrada sin id y con instante se reconoce por estado e instante;
/// - sin id ni instante, sólo la más reciente de la lista puede añadirse, y
///   sólo si su estado difiere del actual. Un dueño sin historial las recibe
///   todas.
struct WritePlanner<'a> {
    store: &'a dyn CatalogStore,
    ids: &'a dyn IdGenerator,
    operation: &'static str,
    now: DateTime<Utc>,
    unit: UnitOfWork,
    statuses: Vec<NewStatusRow>,
}

/// Igualdad de instantes a la precisión que guarda el almacenamiento.
fn same_instant(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp_micros() == b.timestamp_micros()
}

impl WritePlanner<'_> {
    fn plan_statuses<S: LifecycleState>(&mut self,
                                        owner: &RecordKey,
                                        list: &mut Option<Vec<StatusRecord<S>>>)
                                        -> Result<(), CatalogError> {
        let Some(entries) = list.as_mut() else {
            return Ok(());
        };
        if entries.is_empty() {
            return Ok(());
        }
        let recorded = self.store.status_entries(owner).context(self.operation, owner.id())?;
        let latest_state = recorded.first().map(|r| r.state.as_str());
        // (entrada, hay que insertarla)
        let mut kept: Vec<(StatusRecord<S>, bool)> = Vec::with_capacity(entries.len());
        for (position, mut status) in entries.drain(..).enumerate() {
            status.owner = Some(owner.clone());
            if !is_unset(&status.status_id) {
                let known = recorded.iter().any(|r| r.status_id == status.status_id)
                            || kept.iter().any(|(k, _)| k.status_id == status.status_id);
                status.time_of_state_change.get_or_insert(self.now);
                kept.push((status, !known));
                continue;
            }
            match status.time_of_state_change {
                Some(at) => {
                    let state = status.state.as_str();
                    if let Some(row) =
                        recorded.iter().find(|r| r.state == state && same_instant(r.time_of_change, at))
                    {
                        status.status_id = row.status_id.clone();
                        kept.push((status, false));
                        continue;
                    }
                    if kept.iter().any(|(k, _)| {
                                      k.state == status.state
                                      && k.time_of_state_change.is_some_and(|t| same_instant(t, at))
                                  })
                    {
                        continue;
                    }
                }
                None if !recorded.is_empty() => {
                    if position > 0 || latest_state == Some(status.state.as_str()) {
                        debug!("{}:skip_status owner={owner} state={}", self.operation, status.state);
                        continue;
                    }
                }
                None => {}
            }
            status.status_id = self.ids.new_id(&status_seed::<S>());
            status.time_of_state_change.get_or_insert(self.now);
            kept.push((status, true));
        }
        // La lista va de más reciente a más antigua; se inserta al revés para
        // que los empates de instante respeten el orden del cliente.
        for (status, _) in kept.iter().rev().filter(|(_, insert)| *insert) {
            self.statuses.push(status_row(status, owner, self.now));
        }
        *entries = kept.into_iter().map(|(status, _)| status).collect();
        Ok(())
    }

    fn finish(self) -> UnitOfWork {
        let mut unit = self.unit;
        for status in self.statuses {
            unit.insert_status(status);
        }
        unit
    }
}

impl TreeVisitor for WritePlanner<'_> {
    type Error = CatalogError;

    fn visit<N: RecordNode>(&mut self, node: &mut N, _lineage: &Lineage) -> Result<(), CatalogError> {
        self.unit.upsert(node.to_row(self.now));
        let owner = node.key();
        let mut list = node.statuses_mut().take();
        let planned = self.plan_statuses(&owner, &mut list);
        *node.statuses_mut() = list;
        planned
    }
}

struct KeyCollector(HashSet<RecordKey>);

impl TreeReader for KeyCollector {
    fn read<N: RecordNode>(&mut self, node: &N) {
        self.0.insert(node.key());
    }
}

/// Clave y padre de cada nodo del árbol.
struct NodeParents {
    now: DateTime<Utc>,
    nodes: Vec<(RecordKey, Option<RecordKey>)>,
}

impl TreeReader for NodeParents {
    fn read<N: RecordNode>(&mut self, node: &N) {
        let row = node.to_row(self.now);
        self.nodes.push((row.key(), row.parent_key()));
    }
}

fn creation_times(snapshot: &Snapshot) -> HashMap<RecordKey, DateTime<Utc>> {
    std::iter::once(&snapshot.root).chain(snapshot.descendants.iter())
                                   .map(|row| (row.key(), row.creation_time()))
                                   .collect()
}

/// Borra claves de abajo hacia arriba junto con su historial.
pub(crate) fn delete_bottom_up(unit: &mut UnitOfWork, mut keys: Vec<RecordKey>) {
    keys.sort_by(|a, b| b.kind().cmp(&a.kind()).then_with(|| a.cmp(b)));
    for key in keys {
        unit.delete(key.clone()).purge_statuses(key);
    }
}

impl<S: CatalogStore> Catalog<S> {
    pub(crate) fn ensure_parent<R: CatalogRecord>(&self, record: &R, operation: &'static str) -> Result<(), CatalogError> {
        let Some(parent) = record.parent_key() else {
            return Ok(());
        };
        self.ensure_exists(&parent, operation)
    }

    /// Falla con `InconsistentParent` si `key` no existe.
    pub(crate) fn ensure_exists(&self, key: &RecordKey, operation: &'static str) -> Result<(), CatalogError> {
        if key.id().is_empty() || !self.dyn_store().record_exists(key).context(operation, key.id())? {
            return Err(CatalogError::InconsistentParent { kind: key.kind(),
                                                          id: key.id().to_string() });
        }
        Ok(())
    }

    pub(crate) fn snapshot_of(&self, key: &RecordKey, operation: &'static str) -> Result<Option<Snapshot>, CatalogError> {
        self.dyn_store().snapshot(key).context(operation, key.id())
    }

    /// Alta de un árbol completo con raíz en `record`.
    pub(crate) fn add_record<R: CatalogRecord>(&self,
                                               mut record: R,
                                               operation: &'static str)
                                               -> Result<R, CatalogError> {
        let lineage = record.lineage();
        assign_ids(&mut record, &lineage, self.ids());
        cascade(&mut record, &lineage);
        validate_tree(&record).map_err(CatalogError::Validation)?;
        self.ensure_parent(&record, operation)?;

        let key = record.key();
        debug!("{operation}:start key={key}");
        let existing = self.persisted_creation_times(&record, HashMap::new(), operation)?;
        let record = self.write_tree(record, &lineage, &existing, None, operation)?;
        debug!("{operation}:done key={key}");
        Ok(record)
    }

    /// Actualiza el registro `key` reconciliando `incoming` con lo persistido.
    /// El llamador ya ha fijado la identidad de `incoming` a `key`.
    pub(crate) fn update_record<R: CatalogRecord>(&self,
                                                  key: &RecordKey,
                                                  mut incoming: R,
                                                  operation: &'static str)
                                                  -> Result<R, CatalogError> {
        debug!("{operation}:start key={key}");
        let snapshot = self.snapshot_of(key, operation)?
                           .ok_or_else(|| CatalogError::NotFound { kind: key.kind(),
                                                                   id: key.id().to_string() })?;
        let current = R::from_snapshot(&snapshot).context(operation, key.id())?;
        incoming.inherit_parent(&current);
        let lineage = incoming.lineage();
        assign_ids(&mut incoming, &lineage, self.ids());
        cascade(&mut incoming, &lineage);
        validate_tree(&incoming).map_err(CatalogError::Validation)?;
        self.ensure_parent(&incoming, operation)?;

        let mut merged = current;
        merged.merge_from(incoming);
        cascade(&mut merged, &lineage);

        let mut known = creation_times(&snapshot);
        known.remove(key);
        let existing = self.persisted_creation_times(&merged, known, operation)?;
        let merged = self.write_tree(merged, &lineage, &existing, Some(&snapshot), operation)?;
        debug!("{operation}:done key={key}");
        Ok(merged)
    }

    /// Instantes de creación persistidos de los nodos de `record`.
    ///
    /// `known` trae los nodos ya leídos bajo la raíz; el resto se consulta uno
    /// a uno. Un nodo que ya existe bajo otro padre falla con
    /// `InconsistentParent` en lugar de moverse.
    fn persisted_creation_times<R: CatalogRecord>(&self,
                                                  record: &R,
                                                  known: HashMap<RecordKey, DateTime<Utc>>,
                                                  operation: &'static str)
                                                  -> Result<HashMap<RecordKey, DateTime<Utc>>, CatalogError> {
        let mut nodes = NodeParents { now: Utc::now(),
                                      nodes: Vec::new() };
        read_tree(record, &mut nodes);
        let mut times = known;
        for (key, parent) in nodes.nodes {
            if times.contains_key(&key) {
                continue;
            }
            let Some(row) = self.dyn_store().find_record(&key).context(operation, key.id())? else {
                continue;
            };
            if row.parent_key() != parent {
                debug!("{operation}:parent_conflict key={key}");
                return Err(CatalogError::InconsistentParent { kind: key.kind(),
                                                              id: key.id().to_string() });
            }
            times.insert(key, row.creation_time());
        }
        Ok(times)
    }

    fn write_tree<R: CatalogRecord>(&self,
                                    mut record: R,
                                    lineage: &Lineage,
                                    existing: &HashMap<RecordKey, DateTime<Utc>>,
                                    previous: Option<&Snapshot>,
                                    operation: &'static str)
                                    -> Result<R, CatalogError> {
        let now = Utc::now();
        match walk(&mut record, lineage, &mut Stamper { now, existing }) {
            Ok(()) => {}
            Err(never) => match never {},
        }

        let mut unit = UnitOfWork::new();
        if let Some(previous) = previous {
            let mut kept = KeyCollector(HashSet::new());
            read_tree(&record, &mut kept);
            let dropped: Vec<RecordKey> = previous.keys().into_iter().filter(|k| !kept.0.contains(k)).collect();
            if !dropped.is_empty() {
                debug!("{operation}:drop_descendants count={}", dropped.len());
            }
            delete_bottom_up(&mut unit, dropped);
        }

        let mut planner = WritePlanner { store: self.dyn_store(),
                                         ids: self.ids(),
                                         operation,
                                         now,
                                         unit,
                                         statuses: Vec::new() };
        walk(&mut record, lineage, &mut planner)?;
        let unit = planner.finish();

        let key = record.key();
        self.dyn_store().commit(unit).context(operation, key.id())?;
        Ok(record)
    }

    pub(crate) fn get_record<R: CatalogRecord>(&self,
                                               key: &RecordKey,
                                               operation: &'static str)
                                               -> Result<Option<R>, CatalogError> {
        let Some(snapshot) = self.snapshot_of(key, operation)? else {
            return Ok(None);
        };
        R::from_snapshot(&snapshot).map(Some).context(operation, key.id())
    }

    /// Borra `key` y todo lo que cuelga de él. `false` si no existía.
    pub(crate) fn remove_record(&self, key: &RecordKey, operation: &'static str) -> Result<bool, CatalogError> {
        debug!("{operation}:start key={key}");
        let Some(snapshot) = self.snapshot_of(key, operation)? else {
            debug!("{operation}:absent key={key}");
            return Ok(false);
        };
        let mut unit = UnitOfWork::new();
        delete_bottom_up(&mut unit, snapshot.keys());
        self.dyn_store().commit(unit).context(operation, key.id())?;
        debug!("{operation}:done key={key}");
        Ok(true)
    }

    /// Borra varios subárboles en una sola unidad.
    pub(crate) fn remove_many(&self, roots: Vec<RecordKey>, operation: &'static str, id: &str) -> Result<usize, CatalogError> {
        let mut unit = UnitOfWork::new();
        let mut keys = Vec::new();
        let mut removed = 0;
        for root in roots {
            if let Some(snapshot) = self.snapshot_of(&root, operation)? {
                keys.extend(snapshot.keys());
                removed += 1;
            }
        }
        if removed == 0 {
            return Ok(0);
        }
        delete_bottom_up(&mut unit, keys);
        self.dyn_store().commit(unit).context(operation, id)?;
        Ok(removed)
    }

    pub(crate) fn exists(&self, key: &RecordKey, operation: &'static str) -> Result<bool, CatalogError> {
        self.dyn_store().record_exists(key).context(operation, key.id())
    }

    /// Lee una fila, la modifica y la vuelve a escribir. El registro debe
    /// existir; si no, `InconsistentParent`.
    pub(crate) fn modify_row<R, F>(&self, key: &RecordKey, operation: &'static str, change: F) -> Result<(), CatalogError>
        where R: StoredRow,
              F: FnOnce(&mut R)
    {
        debug!("{operation}:start key={key}");
        let mut row = load_row::<R>(self.dyn_store(), key).context(operation, key.id())?
                                                         .ok_or_else(|| CatalogError::InconsistentParent {
                                                             kind: key.kind(),
                                                             id: key.id().to_string(),
                                                         })?;
        change(&mut row);
        let mut unit = UnitOfWork::new();
        unit.upsert(row.into_record());
        self.dyn_store().commit(unit).context(operation, key.id())?;
        debug!("{operation}:done key={key}");
        Ok(())
    }

    /// Añade una entrada de estado tras comprobar que el dueño existe.
    pub(crate) fn append_status<T: LifecycleState>(&self,
                                                   owner: &RecordKey,
                                                   status: StatusRecord<T>,
                                                   operation: &'static str)
                                                   -> Result<StatusRecord<T>, CatalogError> {
        self.ensure_exists(owner, operation)?;
        self.ledger().append(owner, status)
    }
}

/// Inserta o reemplaza parámetros por nombre.
pub(crate) fn upsert_params(list: &mut Option<Vec<crate::model::DataParam>>,
                            incoming: Vec<crate::model::DataParam>,
                            owner_id: &str) {
    let params = list.get_or_insert_with(Vec::new);
    for mut param in incoming {
        param.owner_id = owner_id.to_string();
        match params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => existing.merge_from(param),
            None => params.push(param),
        }
    }
}

/// Completa id, dueño e instante de un error antes de añadirlo.
pub(crate) fn prepare_error(mut error: crate::model::ErrorRecord,
                            owner_id: &str,
                            seed: &str,
                            ids: &dyn IdGenerator)
                            -> crate::model::ErrorRecord {
    error.error_id = crate::ids::resolve_id(&error.error_id, seed, ids);
    error.owner_id = owner_id.to_string();
    error.creation_time.get_or_insert_with(Utc::now);
    error
}
