//! Persistencia en cascada.
//!
//! Un único recorrido recursivo (`walk`) baja por la jerarquía
//! Experiment → Process → Task → Job de arriba hacia abajo. Cada nivel
//! describe, vía `RecordNode`, cómo obtener a sus hijos y qué campos de
//! referencia al padre debe rellenar. Los visitantes (`TreeVisitor`) deciden
//! qué hacer en cada nodo: asignar ids, propagar padres, sellar tiempos...
//!
//! Invariante tras `cascade`: el campo de padre de cada descendiente coincide
//! con el id de su padre directo, a cualquier profundidad, antes de emitir
//! una sola escritura.

use std::convert::Infallible;

use chrono::{DateTime, Utc};

use crate::constants::{EXPERIMENT_ERROR_SEED, PROCESS_ERROR_SEED, PROCESS_SEED, TASK_ERROR_SEED, TASK_SEED};
use crate::ids::{experiment_seed, is_unset, resolve_id, IdGenerator};
use crate::mapper;
use crate::model::{ErrorRecord, Experiment, ExperimentState, Job, JobState, LifecycleState, Process,
                   ProcessState, RecordKey, RecordKind, StatusRecord, Task, TaskState};
use crate::store::RecordRow;

/// Ids de los ancestros conocidos al llegar a un nodo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    pub experiment_id: Option<String>,
    pub process_id: Option<String>,
    pub task_id: Option<String>,
}

impl Lineage {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn under_experiment(experiment_id: impl Into<String>) -> Self {
        Self { experiment_id: Some(experiment_id.into()),
               ..Self::default() }
    }

    pub fn under_process(process_id: impl Into<String>) -> Self {
        Self { process_id: Some(process_id.into()),
               ..Self::default() }
    }
}

/// Accesores por nivel que usa el recorrido genérico.
pub trait RecordNode {
    type Child: RecordNode;
    type State: LifecycleState;

    fn kind(&self) -> RecordKind;
    fn key(&self) -> RecordKey;
    fn children(&self) -> &[Self::Child];
    fn children_mut(&mut self) -> &mut [Self::Child];

    /// Resuelve el id propio y el de los errores embebidos.
    fn assign_id(&mut self, ids: &dyn IdGenerator);
    /// Copia las referencias a ancestros desde el linaje.
    fn adopt(&mut self, lineage: &Lineage);
    /// Propaga el id propio a estados, errores y entradas/salidas.
    fn link_owned(&mut self);
    /// Linaje que verán los hijos.
    fn lineage_below(&self, lineage: &Lineage) -> Lineage;

    fn statuses_mut(&mut self) -> &mut Option<Vec<StatusRecord<Self::State>>>;
    fn statuses(&self) -> Option<&[StatusRecord<Self::State>]>;
    fn creation_time_mut(&mut self) -> &mut Option<DateTime<Utc>>;
    /// Los jobs no llevan instante de actualización.
    fn last_update_time_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>>;

    fn to_row(&self, now: DateTime<Utc>) -> RecordRow;

    /// Comprobaciones previas a cualquier escritura.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Acción a ejecutar en cada nodo durante `walk`.
pub trait TreeVisitor {
    type Error;
    fn visit<N: RecordNode>(&mut self, node: &mut N, lineage: &Lineage) -> Result<(), Self::Error>;
}

/// Lectura de cada nodo durante `read_tree`.
pub trait TreeReader {
    fn read<N: RecordNode>(&mut self, node: &N);
}

/// Recorre el árbol de arriba hacia abajo. El nodo se visita antes de
/// calcular el linaje de sus hijos, así un id recién asignado ya está
/// disponible para ellos.
pub fn walk<N: RecordNode, V: TreeVisitor>(node: &mut N, lineage: &Lineage, visitor: &mut V) -> Result<(), V::Error> {
    visitor.visit(node, lineage)?;
    let below = node.lineage_below(lineage);
    for child in node.children_mut() {
        walk(child, &below, visitor)?;
    }
    Ok(())
}

pub fn read_tree<N: RecordNode, R: TreeReader>(node: &N, reader: &mut R) {
    reader.read(node);
    for child in node.children() {
        read_tree(child, reader);
    }
}

struct IdAssigner<'a> {
    ids: &'a dyn IdGenerator,
}

impl TreeVisitor for IdAssigner<'_> {
    type Error = Infallible;
    fn visit<N: RecordNode>(&mut self, node: &mut N, _lineage: &Lineage) -> Result<(), Infallible> {
        node.assign_id(self.ids);
        Ok(())
    }
}

struct ParentLinker;

impl TreeVisitor for ParentLinker {
    type Error = Infallible;
    fn visit<N: RecordNode>(&mut self, node: &mut N, lineage: &Lineage) -> Result<(), Infallible> {
        node.adopt(lineage);
        node.link_owned();
        Ok(())
    }
}

/// Asigna ids a todo nodo (y error embebido) que no lo tenga.
pub fn assign_ids<N: RecordNode>(root: &mut N, lineage: &Lineage, ids: &dyn IdGenerator) {
    match walk(root, lineage, &mut IdAssigner { ids }) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Propaga ids de padre en todo el árbol partiendo de `lineage`.
pub fn cascade<N: RecordNode>(root: &mut N, lineage: &Lineage) {
    match walk(root, lineage, &mut ParentLinker) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Primer error de validación encontrado en el árbol.
pub fn validate_tree<N: RecordNode>(root: &N) -> Result<(), String> {
    struct Check(Option<String>);
    impl TreeReader for Check {
        fn read<M: RecordNode>(&mut self, node: &M) {
            if self.0.is_none() {
                self.0 = node.validate().err();
            }
        }
    }
    let mut check = Check(None);
    read_tree(root, &mut check);
    check.0.map_or(Ok(()), Err)
}

fn assign_error_ids(errors: &mut Option<Vec<ErrorRecord>>, seed: &str, ids: &dyn IdGenerator) {
    for e in errors.iter_mut().flatten() {
        e.error_id = resolve_id(&e.error_id, seed, ids);
    }
}

fn link_statuses<S>(statuses: &mut Option<Vec<StatusRecord<S>>>, owner: &RecordKey) {
    for s in statuses.iter_mut().flatten() {
        s.owner = Some(owner.clone());
    }
}

fn link_errors(errors: &mut Option<Vec<ErrorRecord>>, owner_id: &str) {
    for e in errors.iter_mut().flatten() {
        e.owner_id = owner_id.to_string();
    }
}

fn link_params(params: &mut Option<Vec<crate::model::DataParam>>, owner_id: &str) {
    for p in params.iter_mut().flatten() {
        p.owner_id = owner_id.to_string();
    }
}

impl RecordNode for Experiment {
    type Child = Process;
    type State = ExperimentState;

    fn kind(&self) -> RecordKind {
        RecordKind::Experiment
    }

    fn key(&self) -> RecordKey {
        RecordKey::Experiment(self.experiment_id.clone())
    }

    fn children(&self) -> &[Process] {
        self.processes.as_deref().unwrap_or(&[])
    }

    fn children_mut(&mut self) -> &mut [Process] {
        self.processes.as_deref_mut().unwrap_or(&mut [])
    }

    fn assign_id(&mut self, ids: &dyn IdGenerator) {
        self.experiment_id = resolve_id(&self.experiment_id, &experiment_seed(&self.experiment_name), ids);
        assign_error_ids(&mut self.errors, EXPERIMENT_ERROR_SEED, ids);
    }

    fn adopt(&mut self, _lineage: &Lineage) {}

    fn link_owned(&mut self) {
        let key = self.key();
        link_statuses(&mut self.experiment_status, &key);
        link_errors(&mut self.errors, &self.experiment_id);
        link_params(&mut self.experiment_inputs, &self.experiment_id);
        link_params(&mut self.experiment_outputs, &self.experiment_id);
    }

    fn lineage_below(&self, _lineage: &Lineage) -> Lineage {
        Lineage::under_experiment(self.experiment_id.clone())
    }

    fn statuses_mut(&mut self) -> &mut Option<Vec<StatusRecord<ExperimentState>>> {
        &mut self.experiment_status
    }

    fn statuses(&self) -> Option<&[StatusRecord<ExperimentState>]> {
        self.experiment_status.as_deref()
    }

    fn creation_time_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.creation_time
    }

    fn last_update_time_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        Some(&mut self.last_update_time)
    }

    fn to_row(&self, now: DateTime<Utc>) -> RecordRow {
        RecordRow::Experiment(mapper::experiment_row(self, now))
    }

    fn validate(&self) -> Result<(), String> {
        if is_unset(&self.experiment_id) {
            return Err("experiment id is unset".into());
        }
        Ok(())
    }
}

impl RecordNode for Process {
    type Child = Task;
    type State = ProcessState;

    fn kind(&self) -> RecordKind {
        RecordKind::Process
    }

    fn key(&self) -> RecordKey {
        RecordKey::Process(self.process_id.clone())
    }

    fn children(&self) -> &[Task] {
        self.tasks.as_deref().unwrap_or(&[])
    }

    fn children_mut(&mut self) -> &mut [Task] {
        self.tasks.as_deref_mut().unwrap_or(&mut [])
    }

    fn assign_id(&mut self, ids: &dyn IdGenerator) {
        self.process_id = resolve_id(&self.process_id, PROCESS_SEED, ids);
        assign_error_ids(&mut self.process_errors, PROCESS_ERROR_SEED, ids);
    }

    fn adopt(&mut self, lineage: &Lineage) {
        if let Some(experiment_id) = &lineage.experiment_id {
            self.experiment_id = experiment_id.clone();
        }
    }

    fn link_owned(&mut self) {
        let key = self.key();
        link_statuses(&mut self.process_status, &key);
        link_errors(&mut self.process_errors, &self.process_id);
        link_params(&mut self.process_inputs, &self.process_id);
        link_params(&mut self.process_outputs, &self.process_id);
    }

    fn lineage_below(&self, lineage: &Lineage) -> Lineage {
        Lineage { experiment_id: lineage.experiment_id.clone().or_else(|| Some(self.experiment_id.clone())),
                  process_id: Some(self.process_id.clone()),
                  task_id: None }
    }

    fn statuses_mut(&mut self) -> &mut Option<Vec<StatusRecord<ProcessState>>> {
        &mut self.process_status
    }

    fn statuses(&self) -> Option<&[StatusRecord<ProcessState>]> {
        self.process_status.as_deref()
    }

    fn creation_time_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.creation_time
    }

    fn last_update_time_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        Some(&mut self.last_update_time)
    }

    fn to_row(&self, now: DateTime<Utc>) -> RecordRow {
        RecordRow::Process(mapper::process_row(self, now))
    }

    fn validate(&self) -> Result<(), String> {
        if self.experiment_id.is_empty() {
            return Err(format!("process {} has no experiment id", self.process_id));
        }
        Ok(())
    }
}

impl RecordNode for Task {
    type Child = Job;
    type State = TaskState;

    fn kind(&self) -> RecordKind {
        RecordKind::Task
    }

    fn key(&self) -> RecordKey {
        RecordKey::Task(self.task_id.clone())
    }

    fn children(&self) -> &[Job] {
        self.jobs.as_deref().unwrap_or(&[])
    }

    fn children_mut(&mut self) -> &mut [Job] {
        self.jobs.as_deref_mut().unwrap_or(&mut [])
    }

    fn assign_id(&mut self, ids: &dyn IdGenerator) {
        self.task_id = resolve_id(&self.task_id, TASK_SEED, ids);
        assign_error_ids(&mut self.task_errors, TASK_ERROR_SEED, ids);
    }

    fn adopt(&mut self, lineage: &Lineage) {
        if let Some(process_id) = &lineage.process_id {
            self.parent_process_id = process_id.clone();
        }
    }

    fn link_owned(&mut self) {
        let key = self.key();
        link_statuses(&mut self.task_status, &key);
        link_errors(&mut self.task_errors, &self.task_id);
    }

    fn lineage_below(&self, lineage: &Lineage) -> Lineage {
        Lineage { experiment_id: lineage.experiment_id.clone(),
                  process_id: Some(self.parent_process_id.clone()),
                  task_id: Some(self.task_id.clone()) }
    }

    fn statuses_mut(&mut self) -> &mut Option<Vec<StatusRecord<TaskState>>> {
        &mut self.task_status
    }

    fn statuses(&self) -> Option<&[StatusRecord<TaskState>]> {
        self.task_status.as_deref()
    }

    fn creation_time_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.creation_time
    }

    fn last_update_time_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        Some(&mut self.last_update_time)
    }

    fn to_row(&self, now: DateTime<Utc>) -> RecordRow {
        RecordRow::Task(mapper::task_row(self, now))
    }

    fn validate(&self) -> Result<(), String> {
        if self.parent_process_id.is_empty() {
            return Err(format!("task {} has no parent process id", self.task_id));
        }
        Ok(())
    }
}

impl RecordNode for Job {
    type Child = NoChildren;
    type State = JobState;

    fn kind(&self) -> RecordKind {
        RecordKind::Job
    }

    fn key(&self) -> RecordKey {
        RecordKey::Job(Job::key(self))
    }

    fn children(&self) -> &[NoChildren] {
        &[]
    }

    fn children_mut(&mut self) -> &mut [NoChildren] {
        &mut []
    }

    // El id de un job lo asigna el gestor de recursos remoto.
    fn assign_id(&mut self, _ids: &dyn IdGenerator) {}

    fn adopt(&mut self, lineage: &Lineage) {
        if let Some(task_id) = &lineage.task_id {
            self.task_id = task_id.clone();
        }
        if let Some(process_id) = &lineage.process_id {
            self.process_id = process_id.clone();
        }
    }

    fn link_owned(&mut self) {
        let key = RecordNode::key(self);
        link_statuses(&mut self.job_status, &key);
    }

    fn lineage_below(&self, lineage: &Lineage) -> Lineage {
        lineage.clone()
    }

    fn statuses_mut(&mut self) -> &mut Option<Vec<StatusRecord<JobState>>> {
        &mut self.job_status
    }

    fn statuses(&self) -> Option<&[StatusRecord<JobState>]> {
        self.job_status.as_deref()
    }

    fn creation_time_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.creation_time
    }

    fn last_update_time_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        None
    }

    fn to_row(&self, now: DateTime<Utc>) -> RecordRow {
        RecordRow::Job(mapper::job_row(self, now))
    }

    fn validate(&self) -> Result<(), String> {
        if is_unset(&self.job_id) {
            return Err("job id is required".into());
        }
        if self.task_id.is_empty() {
            return Err(format!("job {} has no task id", self.job_id));
        }
        if self.process_id.is_empty() {
            return Err(format!("job {} has no process id", self.job_id));
        }
        Ok(())
    }
}

/// Hijo de un nivel hoja; no tiene valores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoChildren {}

impl RecordNode for NoChildren {
    type Child = NoChildren;
    type State = JobState;

    fn kind(&self) -> RecordKind {
        match *self {}
    }

    fn key(&self) -> RecordKey {
        match *self {}
    }

    fn children(&self) -> &[NoChildren] {
        match *self {}
    }

    fn children_mut(&mut self) -> &mut [NoChildren] {
        match *self {}
    }

    fn assign_id(&mut self, _ids: &dyn IdGenerator) {
        match *self {}
    }

    fn adopt(&mut self, _lineage: &Lineage) {
        match *self {}
    }

    fn link_owned(&mut self) {
        match *self {}
    }

    fn lineage_below(&self, _lineage: &Lineage) -> Lineage {
        match *self {}
    }

    fn statuses_mut(&mut self) -> &mut Option<Vec<StatusRecord<JobState>>> {
        match *self {}
    }

    fn statuses(&self) -> Option<&[StatusRecord<JobState>]> {
        match *self {}
    }

    fn creation_time_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        match *self {}
    }

    fn last_update_time_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        match *self {}
    }

    fn to_row(&self, _now: DateTime<Utc>) -> RecordRow {
        match *self {}
    }
}
