use ulid::Ulid;

use crate::admission::{MalformedInput, Violation};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Business rules said no. Carries every violation found.
    Rejected(Vec<Violation>),
    Malformed(MalformedInput),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            EngineError::Rejected(v) => v,
            _ => &[],
        }
    }
}

impl From<MalformedInput> for EngineError {
    fn from(e: MalformedInput) -> Self {
        EngineError::Malformed(e)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Rejected(violations) => {
                write!(f, "rejected:")?;
                for (i, v) in violations.iter().enumerate() {
                    let sep = if i == 0 { " " } else { "; " };
                    write!(f, "{sep}{v}")?;
                }
                Ok(())
            }
            EngineError::Malformed(e) => write!(f, "malformed input: {e}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
