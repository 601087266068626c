//! # Ledger de Assertions
//!
//! Guarda o resultado (`true`/`false`) de cada assertion nomeada, na ordem
//! de registro.
//!
//! ## Para todos entenderem:
//!
//! Registrar uma assertion NÃO falha o teste. O predicado é avaliado na
//! hora e o resultado fica anotado. A falha só aparece quando alguém
//! pergunta: `assert("nome")` ou `assert_all()`.
//!
//! Regras:
//!
//! 1. **Nome único**: registrar o mesmo nome duas vezes é erro de
//!    configuração, imediato.
//! 2. **Predicado nunca explode**: se o predicado entrar em pânico
//!    (ex: `unwrap()` num campo que não existe), retornar `None` ou `Err`,
//!    o resultado anotado é `false`.

use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

use crate::errors::ConfigError;

/// Anything a predicate may return. `None`, `Err` and panics all count as
/// a failed assertion.
pub trait Verdict {
    fn passed(self) -> bool;
}

impl Verdict for bool {
    fn passed(self) -> bool {
        self
    }
}

impl Verdict for Option<bool> {
    fn passed(self) -> bool {
        self.unwrap_or(false)
    }
}

impl<E> Verdict for Result<bool, E> {
    fn passed(self) -> bool {
        self.unwrap_or(false)
    }
}

/// Runs `check`, turning a panic into `false`.
pub(crate) fn evaluate<V, F>(check: F) -> bool
where
    V: Verdict,
    F: FnOnce() -> V,
{
    panic::catch_unwind(AssertUnwindSafe(|| check().passed())).unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct AssertionLedger {
    entries: Vec<(String, bool)>,
}

impl AssertionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates `check` and records the outcome under `name`.
    pub fn record<V, F>(&mut self, name: &str, check: F) -> Result<bool, ConfigError>
    where
        V: Verdict,
        F: FnOnce() -> V,
    {
        if self.contains(name) {
            return Err(ConfigError::DuplicateAssertion {
                name: name.to_string(),
            });
        }

        let passed = evaluate(check);
        debug!(rule = name, passed, "assertion recorded");
        self.entries.push((name.to_string(), passed));
        Ok(passed)
    }

    /// `None` when `name` was never registered.
    pub fn get(&self, name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, passed)| *passed)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// First failed assertion in registration order.
    pub fn first_failure(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, passed)| !passed)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(name, passed)| (name.as_str(), *passed))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
