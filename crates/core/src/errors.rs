use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("sub-id validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("invalid input: {0}")]
    Input(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Lookup(_) => "lookup",
            Self::Input(_) => "input",
            Self::InvariantViolation(_) => "invariant",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

impl ApplicationError {
    /// Short machine-readable label recorded on failed batch entries.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(domain) => domain.class(),
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
        }
    }
}
