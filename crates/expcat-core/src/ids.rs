//! Política de identificadores.
//!
//! Un identificador enviado por el cliente se respeta salvo que esté vacío o
//! sea `DEFAULT_ID`; en ese caso se genera uno nuevo a partir de una semilla
//! legible más un sufijo único.

use uuid::Uuid;

use crate::constants::{DEFAULT_ID, EXPERIMENT_ID_SEED_LEN};

/// Colaborador que produce identificadores opacos y únicos.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self, seed: &str) -> String;
}

/// Generador por defecto: `<seed>_<uuid v4>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self, seed: &str) -> String {
        format!("{seed}_{}", Uuid::new_v4())
    }
}

/// true si el id debe generarse.
pub fn is_unset(id: &str) -> bool {
    id.is_empty() || id == DEFAULT_ID
}

/// Devuelve el id del cliente o uno nuevo si no está asignado.
pub fn resolve_id(supplied: &str, seed: &str, ids: &dyn IdGenerator) -> String {
    if is_unset(supplied) {
        ids.new_id(seed)
    } else {
        supplied.to_string()
    }
}

/// Semilla para el id de un experimento a partir de su nombre.
///
/// Espacios, puntos y barras se sustituyen por `_` y se conservan como mucho
/// `EXPERIMENT_ID_SEED_LEN` caracteres.
pub fn experiment_seed(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() || matches!(c, '.' | '/' | '\\') { '_' } else { c })
        .take(EXPERIMENT_ID_SEED_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashes_are_replaced_in_experiment_seed() {
        let id = resolve_id("", &experiment_seed("name/forward-slash//a"), &UuidIdGenerator);
        assert!(id.starts_with("name_forward-slash__a_"), "got {id}");
        let id = resolve_id(DEFAULT_ID, &experiment_seed("name\\backward-slash\\\\a"), &UuidIdGenerator);
        assert!(id.starts_with("name_backward-slash__a_"), "got {id}");
    }

    #[test]
    fn long_names_are_truncated() {
        let seed = experiment_seed(&"x".repeat(80));
        assert_eq!(seed.chars().count(), EXPERIMENT_ID_SEED_LEN);
    }

    #[test]
    fn supplied_ids_are_preserved() {
        assert_eq!(resolve_id("exp-1", "ignored", &UuidIdGenerator), "exp-1");
        assert!(is_unset(DEFAULT_ID));
        assert!(!is_unset("PROCESS_1"));
    }
}
