//! Estados de ciclo de vida por nivel.
//!
//! Los cuatro enums se generan con `lifecycle_states!` para compartir la
//! representación textual estable (la que se guarda en el ledger).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RecordKind;

/// Contrato común de un estado almacenable en el ledger.
pub trait LifecycleState: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Nivel al que pertenecen las entradas con este tipo de estado.
    const LEVEL: RecordKind;
    /// Nombre canónico (SCREAMING_SNAKE_CASE).
    fn as_str(&self) -> &'static str;
    fn parse(value: &str) -> Option<Self>;
    /// Estado con el que nace un registro nuevo sin historial, si aplica.
    fn initial() -> Option<Self>;
}

macro_rules! lifecycle_states {
    (
        $(#[$meta:meta])*
        $name:ident for $level:ident, initial: $initial:expr, {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl LifecycleState for $name {
            const LEVEL: RecordKind = RecordKind::$level;

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn initial() -> Option<Self> {
                $initial
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lifecycle_states! {
    /// Estados de un experimento.
    ExperimentState for Experiment, initial: Some(ExperimentState::Created), {
        Created => "CREATED",
        Validated => "VALIDATED",
        Scheduled => "SCHEDULED",
        Launched => "LAUNCHED",
        Executing => "EXECUTING",
        Canceling => "CANCELING",
        Canceled => "CANCELED",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

lifecycle_states! {
    /// Estados de un proceso.
    ProcessState for Process, initial: Some(ProcessState::Created), {
        Created => "CREATED",
        Validated => "VALIDATED",
        Started => "STARTED",
        PreProcessing => "PRE_PROCESSING",
        ConfiguringWorkspace => "CONFIGURING_WORKSPACE",
        InputDataStaging => "INPUT_DATA_STAGING",
        Executing => "EXECUTING",
        Monitoring => "MONITORING",
        OutputDataStaging => "OUTPUT_DATA_STAGING",
        PostProcessing => "POST_PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Cancelling => "CANCELLING",
        Canceled => "CANCELED",
        Queued => "QUEUED",
        Dequeuing => "DEQUEUING",
        Requeued => "REQUEUED",
    }
}

lifecycle_states! {
    /// Estados de una tarea.
    TaskState for Task, initial: Some(TaskState::Created), {
        Created => "CREATED",
        Executing => "EXECUTING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Canceled => "CANCELED",
    }
}

lifecycle_states! {
    /// Estados de un job según los reporta el gestor de recursos remoto. Un
    /// job no nace con estado propio.
    JobState for Job, initial: None, {
        Submitted => "SUBMITTED",
        Queued => "QUEUED",
        Active => "ACTIVE",
        Complete => "COMPLETE",
        Canceled => "CANCELED",
        Failed => "FAILED",
        Suspended => "SUSPENDED",
        Unknown => "UNKNOWN",
        NonCriticalFail => "NON_CRITICAL_FAIL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_parse_back() {
        for s in ExperimentState::ALL {
            assert_eq!(ExperimentState::parse(s.as_str()), Some(*s));
        }
        assert_eq!(ProcessState::parse("OUTPUT_DATA_STAGING"), Some(ProcessState::OutputDataStaging));
        assert_eq!(JobState::parse("NON_CRITICAL_FAIL"), Some(JobState::NonCriticalFail));
        assert_eq!(TaskState::parse("created"), None);
    }

    #[test]
    fn serde_uses_canonical_names() {
        let v = serde_json::to_value(ExperimentState::Canceling).unwrap();
        assert_eq!(v, serde_json::json!("CANCELING"));
        let back: ProcessState = serde_json::from_value(serde_json::json!("PRE_PROCESSING")).unwrap();
        assert_eq!(back, ProcessState::PreProcessing);
    }

    #[test]
    fn only_jobs_start_without_state() {
        assert_eq!(ExperimentState::initial(), Some(ExperimentState::Created));
        assert_eq!(TaskState::initial(), Some(TaskState::Created));
        assert_eq!(JobState::initial(), None);
        assert_eq!(JobState::LEVEL, RecordKind::Job);
    }
}
