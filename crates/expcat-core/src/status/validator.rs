//! Reglas de transición de estado.
//!
//! El validador es consultivo: la ruta de persistencia nunca lo invoca por su
//! cuenta. Quien quiera imponerlo llama a `is_valid_transition` (o usa
//! `Catalog::add_experiment_status_checked`).

use crate::model::{ExperimentState, JobState, LifecycleState, ProcessState, TaskState};

/// Reglas de transición de un tipo de estado.
pub trait TransitionRules: LifecycleState {
    fn is_valid_transition(self, proposed: Self) -> bool;
}

/// Máquina de estados observada para experimentos.
///
/// VALIDATED, SCHEDULED, LAUNCHED y EXECUTING admiten cualquier destino: las
/// reglas de origen combinan sus prohibiciones con una disyunción que siempre
/// es verdadera. Se reproduce tal cual; una máquina corregida sólo tiene que
/// reemplazar esta función.
pub fn experiment_transition_admitted(current: ExperimentState, proposed: ExperimentState) -> bool {
    use ExperimentState::*;
    match current {
        Created => true,
        Validated | Scheduled | Launched | Executing => true,
        Canceling => matches!(proposed, Canceling | Canceled | Completed | Failed),
        Canceled | Completed | Failed => proposed == current,
    }
}

impl TransitionRules for ExperimentState {
    fn is_valid_transition(self, proposed: Self) -> bool {
        experiment_transition_admitted(self, proposed)
    }
}

// Procesos, tareas y jobs no tienen máquina de estados propia.
macro_rules! admit_all {
    ($($state:ty),+) => {
        $(impl TransitionRules for $state {
            fn is_valid_transition(self, _proposed: Self) -> bool {
                true
            }
        })+
    };
}

admit_all!(ProcessState, TaskState, JobState);

/// Atajo genérico.
pub fn is_valid_transition<S: TransitionRules>(current: S, proposed: S) -> bool {
    current.is_valid_transition(proposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExperimentState::*;

    #[test]
    fn created_admits_everything() {
        for s in ExperimentState::ALL {
            assert!(is_valid_transition(Created, *s));
        }
    }

    #[test]
    fn canceling_only_moves_towards_an_end() {
        assert!(is_valid_transition(Canceling, Canceled));
        assert!(is_valid_transition(Canceling, Canceling));
        assert!(is_valid_transition(Canceling, Completed));
        assert!(is_valid_transition(Canceling, Failed));
        assert!(!is_valid_transition(Canceling, Executing));
        assert!(!is_valid_transition(Canceling, Created));
    }

    #[test]
    fn terminal_states_only_repeat() {
        for terminal in [Canceled, Completed, Failed] {
            for s in ExperimentState::ALL {
                assert_eq!(is_valid_transition(terminal, *s), *s == terminal, "{terminal} -> {s}");
            }
        }
    }

    #[test]
    fn intermediate_states_admit_backward_moves() {
        assert!(is_valid_transition(Executing, Created));
        assert!(is_valid_transition(Launched, Validated));
        assert!(is_valid_transition(Scheduled, Failed));
    }

    #[test]
    fn lower_levels_admit_everything() {
        assert!(is_valid_transition(ProcessState::Completed, ProcessState::Created));
        assert!(is_valid_transition(JobState::Failed, JobState::Active));
    }
}
