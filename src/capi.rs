//! C-compatible interface over the registry, index math, and controller.
//!
//! Function names mirror the `maxsum_c.h` header: every entry point carries
//! the `_ms` suffix, integer-returning functions report errors as `-1`, and
//! the controller constructor returns null on failure. The factor payload is
//! `(nVars, VarID*, ValType*)` with the value array laid out column-major
//! over the ascending variable order, exactly like the native type.

#![allow(non_snake_case)]

use std::os::raw::{c_int, c_void};
use std::slice;

use crate::data_structures::indexing::{ind2sub, sub2ind};
use crate::function::discrete_function::DiscreteFunction;
use crate::graph::controller::MaxSumController;
use crate::registry;
use crate::types::{FactorId, ValIndex, ValType, VarId};

/// Returns 1 if the variable is registered, 0 otherwise.
#[no_mangle]
pub extern "C" fn isRegistered_ms(var: VarId) -> c_int {
    registry::is_registered(var) as c_int
}

/// Returns the registered domain size of a variable, or -1 if unknown.
#[no_mangle]
pub extern "C" fn getDomainSize_ms(var: VarId) -> c_int {
    match registry::domain_size(var) {
        Ok(size) => size as c_int,
        Err(_) => -1,
    }
}

/// Returns the number of currently registered variables.
#[no_mangle]
pub extern "C" fn getNumOfRegisteredVariables_ms() -> c_int {
    registry::num_registered() as c_int
}

/// Registers a variable with the given domain size. Returns -1 if the
/// variable is already registered with a different size, 0 otherwise.
#[no_mangle]
pub extern "C" fn registerVariable_ms(var: VarId, siz: c_int) -> c_int {
    if siz < 1 {
        return -1;
    }
    match registry::register_variable(var, siz as ValIndex) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Converts a linear index to subindices over the given dimension sizes.
/// Writes `nDims` entries to `pSub`. Returns -1 on error, 0 otherwise.
///
/// # Safety
/// `pSiz` and `pSub` must point to at least `nDims` readable (respectively
/// writable) ints.
#[no_mangle]
pub unsafe extern "C" fn ind2sub_ms(
    idx: c_int,
    n_dims: c_int,
    p_siz: *const c_int,
    p_sub: *mut c_int,
) -> c_int {
    if idx < 0 || n_dims < 0 || p_siz.is_null() || p_sub.is_null() {
        return -1;
    }
    let n = n_dims as usize;
    let raw_sizes = slice::from_raw_parts(p_siz, n);
    if raw_sizes.iter().any(|&s| s < 1) {
        return -1;
    }

    let sizes: Vec<ValIndex> = raw_sizes.iter().map(|&s| s as ValIndex).collect();
    let mut sub = vec![0; n];
    match ind2sub(&sizes, idx as ValIndex, &mut sub) {
        Ok(()) => {
            let out = slice::from_raw_parts_mut(p_sub, n);
            for (slot, coord) in out.iter_mut().zip(&sub) {
                *slot = *coord as c_int;
            }
            0
        }
        Err(_) => -1,
    }
}

/// Converts subindices over the given dimension sizes to a linear index.
/// Returns -1 on error, the linear index otherwise.
///
/// # Safety
/// `pSiz` and `pSub` must point to at least `nDims` readable ints.
#[no_mangle]
pub unsafe extern "C" fn sub2ind_ms(
    n_dims: c_int,
    p_siz: *const c_int,
    p_sub: *const c_int,
) -> c_int {
    if n_dims < 0 || p_siz.is_null() || p_sub.is_null() {
        return -1;
    }
    let n = n_dims as usize;
    let raw_sizes = slice::from_raw_parts(p_siz, n);
    let raw_sub = slice::from_raw_parts(p_sub, n);
    if raw_sizes.iter().any(|&s| s < 1) || raw_sub.iter().any(|&s| s < 0) {
        return -1;
    }

    let sizes: Vec<ValIndex> = raw_sizes.iter().map(|&s| s as ValIndex).collect();
    let sub: Vec<ValIndex> = raw_sub.iter().map(|&s| s as ValIndex).collect();
    match sub2ind(&sizes, &sub) {
        Ok(index) => index as c_int,
        Err(_) => -1,
    }
}

/// Creates a new controller with the given iteration cap and maxnorm
/// tolerance. Returns null on invalid arguments. The result must be released
/// with [`deleteMaxSumController_ms`].
#[no_mangle]
pub extern "C" fn newMaxSumController_ms(max_iterations: c_int, maxnorm: ValType) -> *mut c_void {
    if max_iterations < 0 || !maxnorm.is_finite() || maxnorm < 0.0 {
        return std::ptr::null_mut();
    }
    let controller = Box::new(MaxSumController::new(max_iterations as usize, maxnorm));
    Box::into_raw(controller) as *mut c_void
}

/// Releases a controller created by [`newMaxSumController_ms`].
///
/// # Safety
/// `p_controller` must be null or a pointer previously returned by
/// [`newMaxSumController_ms`] that has not been released.
#[no_mangle]
pub unsafe extern "C" fn deleteMaxSumController_ms(p_controller: *mut c_void) {
    if !p_controller.is_null() {
        drop(Box::from_raw(p_controller as *mut MaxSumController));
    }
}

unsafe fn controller<'a>(p_controller: *mut c_void) -> Option<&'a mut MaxSumController> {
    (p_controller as *mut MaxSumController).as_mut()
}

/// Inserts or replaces a factor. `pDomain` lists the factor's variables in
/// strictly ascending order and `pData` holds `prod(domain sizes)` values in
/// column-major layout. Returns -1 on error, 0 otherwise.
///
/// # Safety
/// `p_controller` must be a live controller pointer; `p_domain` must point to
/// `n_vars` readable ids and `p_data` to the full value table.
#[no_mangle]
pub unsafe extern "C" fn setFactor_ms(
    p_controller: *mut c_void,
    id: FactorId,
    n_vars: c_int,
    p_domain: *const VarId,
    p_data: *const ValType,
) -> c_int {
    let Some(controller) = controller(p_controller) else {
        return -1;
    };
    if n_vars < 0 || (n_vars > 0 && p_domain.is_null()) || p_data.is_null() {
        return -1;
    }

    let vars: &[VarId] = if n_vars == 0 {
        &[]
    } else {
        slice::from_raw_parts(p_domain, n_vars as usize)
    };
    let mut total = 1;
    for &var in vars {
        match registry::domain_size(var) {
            Ok(size) => total *= size,
            Err(_) => return -1,
        }
    }
    let values = slice::from_raw_parts(p_data, total).to_vec();

    match DiscreteFunction::with_values(vars, values) {
        Ok(function) => {
            controller.set_factor(id, function);
            0
        }
        Err(_) => -1,
    }
}

/// Removes a factor from the graph.
///
/// # Safety
/// `p_controller` must be null or a live controller pointer.
#[no_mangle]
pub unsafe extern "C" fn removeFactor_ms(p_controller: *mut c_void, id: FactorId) {
    if let Some(controller) = controller(p_controller) {
        controller.remove_factor(id);
    }
}

/// Removes all factors.
///
/// # Safety
/// `p_controller` must be null or a live controller pointer.
#[no_mangle]
pub unsafe extern "C" fn clearAll_ms(p_controller: *mut c_void) {
    if let Some(controller) = controller(p_controller) {
        controller.clear_all();
    }
}

/// Returns the number of factors in the graph, or -1 on a null controller.
///
/// # Safety
/// `p_controller` must be null or a live controller pointer.
#[no_mangle]
pub unsafe extern "C" fn noFactors_ms(p_controller: *mut c_void) -> c_int {
    match controller(p_controller) {
        Some(controller) => controller.num_factors() as c_int,
        None => -1,
    }
}

/// Returns the number of variables in the graph, or -1 on a null controller.
///
/// # Safety
/// `p_controller` must be null or a live controller pointer.
#[no_mangle]
pub unsafe extern "C" fn noVars_ms(p_controller: *mut c_void) -> c_int {
    match controller(p_controller) {
        Some(controller) => controller.num_vars() as c_int,
        None => -1,
    }
}

/// Runs the max-sum algorithm. Returns the number of iterations performed,
/// or -1 on a null controller.
///
/// # Safety
/// `p_controller` must be null or a live controller pointer.
#[no_mangle]
pub unsafe extern "C" fn optimise_ms(p_controller: *mut c_void) -> c_int {
    match controller(p_controller) {
        Some(controller) => controller.optimise() as c_int,
        None => -1,
    }
}

/// Writes the optimized assignment: variable ids in ascending order to
/// `pVars` and the matching value indices to `pVals`. Returns the number of
/// entries written, or -1 on error.
///
/// # Safety
/// `p_controller` must be a live controller pointer; `p_vars` and `p_vals`
/// must have room for [`noVars_ms`] entries.
#[no_mangle]
pub unsafe extern "C" fn getValues_ms(
    p_controller: *mut c_void,
    p_vars: *mut VarId,
    p_vals: *mut c_int,
) -> c_int {
    let Some(controller) = controller(p_controller) else {
        return -1;
    };
    if p_vars.is_null() || p_vals.is_null() {
        return -1;
    }

    let assignment = controller.values();
    let vars_out = slice::from_raw_parts_mut(p_vars, assignment.len());
    let vals_out = slice::from_raw_parts_mut(p_vals, assignment.len());
    for (k, &(var, val)) in assignment.iter().enumerate() {
        vars_out[k] = var;
        vals_out[k] = val as c_int;
    }
    assignment.len() as c_int
}
