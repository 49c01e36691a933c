//! Process-wide register of variables and their domain sizes.
//!
//! Every [`DiscreteFunction`](crate::DiscreteFunction) caches domain sizes
//! from this register at construction time. A variable may be registered any
//! number of times, but its domain size must never change.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use log::debug;

use crate::types::{MaxSumError, Result, ValIndex, VarId};

static REGISTRY: OnceLock<RwLock<HashMap<VarId, ValIndex>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<VarId, ValIndex>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

// The registry lock is never poisoned: no code path panics while holding it.
fn read_registry() -> std::sync::RwLockReadGuard<'static, HashMap<VarId, ValIndex>> {
    registry().read().unwrap_or_else(|e| e.into_inner())
}

fn write_registry() -> std::sync::RwLockWriteGuard<'static, HashMap<VarId, ValIndex>> {
    registry().write().unwrap_or_else(|e| e.into_inner())
}

/// Registers a variable with the given domain size.
///
/// Registering the same variable again with the same size succeeds and leaves
/// the register unchanged. Registering it with a different size fails without
/// mutation.
pub fn register_variable(var: VarId, size: ValIndex) -> Result<()> {
    if size < 1 {
        return Err(MaxSumError::OutOfRange { index: size, size: 1 });
    }

    let mut map = write_registry();
    match map.get(&var) {
        Some(&registered) if registered == size => Ok(()),
        Some(&registered) => Err(MaxSumError::DomainSizeConflict {
            var,
            registered,
            requested: size,
        }),
        None => {
            debug!("Registering variable {} with domain size {}", var, size);
            map.insert(var, size);
            Ok(())
        }
    }
}

/// Registers a list of `(variable, domain size)` pairs.
///
/// Stops at the first conflicting pair; pairs before it remain registered.
pub fn register_variables<I>(vars: I) -> Result<()>
where
    I: IntoIterator<Item = (VarId, ValIndex)>,
{
    for (var, size) in vars {
        register_variable(var, size)?;
    }
    Ok(())
}

/// Returns the registered domain size of a variable.
pub fn domain_size(var: VarId) -> Result<ValIndex> {
    read_registry()
        .get(&var)
        .copied()
        .ok_or(MaxSumError::UnknownVariable(var))
}

/// Returns true if the variable has been registered.
pub fn is_registered(var: VarId) -> bool {
    read_registry().contains_key(&var)
}

/// Returns the number of currently registered variables.
pub fn num_registered() -> usize {
    read_registry().len()
}
