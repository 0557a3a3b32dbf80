use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const FIRST_COUNTER_VALUE: u64 = 1;

fn first_value() -> u64 {
    FIRST_COUNTER_VALUE
}

/// Monotonic sequence counters. Each field holds the next value to hand out.
///
/// Operations never mutate in place: they return the issued value together
/// with the successor state, which the caller persists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    #[serde(default = "first_value")]
    pub global: u64,
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
}

impl Default for CounterState {
    fn default() -> Self {
        Self { global: FIRST_COUNTER_VALUE, categories: BTreeMap::new() }
    }
}

impl CounterState {
    pub fn peek_global(&self) -> u64 {
        self.global.max(FIRST_COUNTER_VALUE)
    }

    pub fn peek_category(&self, sigla: &str) -> u64 {
        self.categories.get(sigla).copied().unwrap_or(FIRST_COUNTER_VALUE).max(FIRST_COUNTER_VALUE)
    }

    pub fn next_global_counter(&self) -> (u64, CounterState) {
        let value = self.peek_global();
        let mut next = self.clone();
        next.global = value + 1;
        (value, next)
    }

    pub fn next_category_counter(&self, sigla: &str) -> (u64, CounterState) {
        let value = self.peek_category(sigla);
        let mut next = self.clone();
        next.categories.insert(sigla.to_string(), value + 1);
        (value, next)
    }

    /// Puts a single counter back to its first value; other counters are untouched.
    pub fn reset(&self, scope: &CounterScope) -> CounterState {
        let mut next = self.clone();
        match scope {
            CounterScope::Global => next.global = FIRST_COUNTER_VALUE,
            CounterScope::Category(sigla) => {
                next.categories.insert(sigla.clone(), FIRST_COUNTER_VALUE);
            }
        }
        next
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CounterScope {
    Global,
    Category(String),
}

impl CounterScope {
    /// Builds a scope from the operator-facing `global` / `category` names.
    pub fn parse(scope: &str, sigla: Option<&str>) -> Result<Self, DomainError> {
        match scope.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "category" => {
                let sigla = sigla.map(str::trim).filter(|sigla| !sigla.is_empty()).ok_or_else(
                    || DomainError::Input("category counter reset requires a sigla".to_string()),
                )?;
                Ok(Self::Category(sigla.to_uppercase()))
            }
            other => Err(DomainError::Input(format!(
                "unknown counter scope `{other}`; expected global or category"
            ))),
        }
    }
}

impl FromStr for CounterScope {
    type Err = DomainError;

    /// Accepts `global` or `category:SIGLA`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(':') {
            Some((scope, sigla)) => Self::parse(scope, Some(sigla)),
            None => Self::parse(value, None),
        }
    }
}

impl fmt::Display for CounterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Category(sigla) => write!(f, "category:{sigla}"),
        }
    }
}
