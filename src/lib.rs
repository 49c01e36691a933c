//! Max-sum optimization over factor graphs.
//!
//! Factors are dense tabular functions over registered discrete variables
//! ([`DiscreteFunction`]); a [`MaxSumController`] exchanges messages between
//! factor and variable nodes until they stabilize, then reads off an
//! assignment that approximately maximizes the sum of all factors. The
//! algorithm is exact on acyclic factor graphs and a heuristic on loopy ones.

pub mod data_structures {
    pub mod indexing;
}

pub mod function {
    pub mod discrete_function;
    pub mod domain_iterator;
    pub mod marginal;
}

pub mod graph {
    pub mod controller;
    pub mod factor_graph;
}

pub mod capi;
pub mod registry;
pub mod types;

pub use data_structures::indexing::{ind2sub, sub2ind};
pub use function::discrete_function::{
    equal_within_tolerance, pow, same_domain, strictly_equal_within_tolerance, zip_with,
    DiscreteFunction,
};
pub use function::domain_iterator::DomainIterator;
pub use function::marginal::{condition_into, marginal, max_marginal, mean_marginal, min_marginal};
pub use graph::controller::{MaxSumController, DEFAULT_MAX_ITERATIONS, DEFAULT_MAXNORM_TOLERANCE};
pub use registry::{domain_size, is_registered, num_registered, register_variable, register_variables};
pub use types::{
    FactorId, MaxSumError, Result, ValIndex, ValType, VarId, DEFAULT_VALUE_TOLERANCE,
};
