use thiserror::Error;

/// Unique identifier of a discrete variable.
pub type VarId = u32;

/// Unique identifier of a factor node in a factor graph.
pub type FactorId = u32;

/// Index into the domain of a variable, or a linear index into a value table.
pub type ValIndex = usize;

/// Scalar value type of functions and messages.
pub type ValType = f64;

/// Default tolerance for value comparisons.
pub const DEFAULT_VALUE_TOLERANCE: ValType = 1e-6;

// Errors surfaced by registry lookups, domain operations, and index math
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaxSumError {
    #[error("Variable {0} is not registered.")]
    UnknownVariable(VarId),

    #[error("Variable {var} is already registered with domain size {registered}, not {requested}.")]
    DomainSizeConflict {
        var: VarId,
        registered: ValIndex,
        requested: ValIndex,
    },

    #[error("Domain of {found} is not a subset of the domain of {expected}.")]
    BadDomain {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Index {index} is out of range for size {size}.")]
    OutOfRange { index: ValIndex, size: ValIndex },
}

pub type Result<T> = std::result::Result<T, MaxSumError>;
