//! Dense tabular functions over subsets of registered discrete variables.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::mem;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

use itertools::izip;
use log::debug;
use ndarray::Array1;

use crate::function::domain_iterator::DomainIterator;
use crate::registry;
use crate::types::{MaxSumError, Result, ValIndex, ValType, VarId};

/// A real-valued function over a sorted set of discrete variables, stored as
/// a dense value table.
///
/// The table is column-major over the variable order: the first variable
/// varies fastest. A function over no variables is a constant with a single
/// cell. Domain sizes are cached from the [registry](crate::registry) at
/// construction time.
#[derive(Clone)]
pub struct DiscreteFunction {
    vars: Vec<VarId>,
    sizes: Vec<ValIndex>,
    values: Array1<ValType>,
}

// Merges two sorted (vars, sizes) domains into their sorted union.
fn merge_domains(
    a_vars: &[VarId],
    a_sizes: &[ValIndex],
    b_vars: &[VarId],
    b_sizes: &[ValIndex],
) -> (Vec<VarId>, Vec<ValIndex>) {
    let mut vars = Vec::with_capacity(a_vars.len() + b_vars.len());
    let mut sizes = Vec::with_capacity(a_vars.len() + b_vars.len());
    let (mut i, mut j) = (0, 0);
    while i < a_vars.len() || j < b_vars.len() {
        if j == b_vars.len() || (i < a_vars.len() && a_vars[i] < b_vars[j]) {
            vars.push(a_vars[i]);
            sizes.push(a_sizes[i]);
            i += 1;
        } else if i == a_vars.len() || b_vars[j] < a_vars[i] {
            vars.push(b_vars[j]);
            sizes.push(b_sizes[j]);
            j += 1;
        } else {
            debug_assert_eq!(a_sizes[i], b_sizes[j]);
            vars.push(a_vars[i]);
            sizes.push(a_sizes[i]);
            i += 1;
            j += 1;
        }
    }
    (vars, sizes)
}

impl DiscreteFunction {
    /// Creates a constant function that depends on no variables.
    pub fn constant(val: ValType) -> Self {
        DiscreteFunction {
            vars: Vec::new(),
            sizes: Vec::new(),
            values: Array1::from_elem(1, val),
        }
    }

    /// Creates a function over the given variables with every cell set to
    /// `val`. The variable list may be unsorted and contain duplicates.
    pub fn new(vars: &[VarId], val: ValType) -> Result<Self> {
        let mut vars = vars.to_vec();
        vars.sort_unstable();
        vars.dedup();

        let mut sizes = Vec::with_capacity(vars.len());
        let mut total = 1;
        for &var in &vars {
            let size = registry::domain_size(var)?;
            sizes.push(size);
            total *= size;
        }

        Ok(DiscreteFunction {
            vars,
            sizes,
            values: Array1::from_elem(total, val),
        })
    }

    /// Creates a function over a single variable.
    pub fn singleton(var: VarId, val: ValType) -> Result<Self> {
        let size = registry::domain_size(var)?;
        Ok(DiscreteFunction {
            vars: vec![var],
            sizes: vec![size],
            values: Array1::from_elem(size, val),
        })
    }

    // Zero function over a single variable with a known domain size, used
    // for message storage where the size is already cached.
    pub(crate) fn zero_singleton(var: VarId, size: ValIndex) -> Self {
        DiscreteFunction {
            vars: vec![var],
            sizes: vec![size],
            values: Array1::zeros(size),
        }
    }

    /// Creates a function over the given variables from an explicit value
    /// table laid out column-major over the variable order.
    ///
    /// `vars` must be strictly ascending and `values` must have exactly
    /// `prod(domain sizes)` entries.
    pub fn with_values(vars: &[VarId], values: Vec<ValType>) -> Result<Self> {
        if !vars.windows(2).all(|w| w[0] < w[1]) {
            return Err(MaxSumError::BadDomain {
                expected: "strictly ascending variable list",
                found: "unsorted or duplicate variables",
            });
        }

        let mut sizes = Vec::with_capacity(vars.len());
        let mut total = 1;
        for &var in vars {
            let size = registry::domain_size(var)?;
            sizes.push(size);
            total *= size;
        }
        if values.len() != total {
            return Err(MaxSumError::OutOfRange {
                index: values.len(),
                size: total,
            });
        }

        Ok(DiscreteFunction {
            vars: vars.to_vec(),
            sizes,
            values: Array1::from_vec(values),
        })
    }

    /// Total size of this function's domain (the length of its value table).
    pub fn domain_size(&self) -> ValIndex {
        self.values.len()
    }

    /// Number of variables this function depends on.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// The sorted variable list.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Cached domain sizes, parallel to [`DiscreteFunction::vars`].
    pub fn sizes(&self) -> &[ValIndex] {
        &self.sizes
    }

    /// Returns true if this function depends on the given variable.
    pub fn depends_on(&self, var: VarId) -> bool {
        self.vars.binary_search(&var).is_ok()
    }

    // Linear index of an own-domain subindex tuple.
    fn own_index(&self, sub: &[ValIndex]) -> ValIndex {
        debug_assert_eq!(sub.len(), self.vars.len());
        let mut index = 0;
        let mut stride = 1;
        for (&coord, &size) in izip!(sub, &self.sizes) {
            debug_assert!(coord < size);
            index += coord * stride;
            stride *= size;
        }
        index
    }

    /// Value at an own-domain subindex tuple (one entry per variable).
    pub fn at(&self, sub: &[ValIndex]) -> ValType {
        self.values[self.own_index(sub)]
    }

    /// Mutable value at an own-domain subindex tuple.
    pub fn at_mut(&mut self, sub: &[ValIndex]) -> &mut ValType {
        let index = self.own_index(sub);
        &mut self.values[index]
    }

    /// Linear index into this function for a subindex tuple over a sorted
    /// superset of its domain. Coordinates of variables outside the domain
    /// are skipped.
    ///
    /// This is the hot path of message computation: both lists are walked in
    /// step, so no filtered subindex vector is ever materialized.
    pub fn super_index(&self, outer_vars: &[VarId], outer_sub: &[ValIndex]) -> ValIndex {
        debug_assert_eq!(outer_vars.len(), outer_sub.len());
        debug_assert!(outer_vars.len() >= self.vars.len());

        let mut index = 0;
        let mut stride = 1;
        let mut k = 0;
        for (&var, &coord) in izip!(outer_vars, outer_sub) {
            if k == self.vars.len() {
                break;
            }
            if self.vars[k] != var {
                continue;
            }
            debug_assert!(coord < self.sizes[k]);
            index += coord * stride;
            stride *= self.sizes[k];
            k += 1;
        }
        debug_assert_eq!(k, self.vars.len(), "outer domain must be a superset");
        index
    }

    /// Value at a subindex tuple over a sorted superset of the domain.
    pub fn at_super(&self, outer_vars: &[VarId], outer_sub: &[ValIndex]) -> ValType {
        self.values[self.super_index(outer_vars, outer_sub)]
    }

    /// Mutable value at a subindex tuple over a sorted superset of the domain.
    pub fn at_super_mut(&mut self, outer_vars: &[VarId], outer_sub: &[ValIndex]) -> &mut ValType {
        let index = self.super_index(outer_vars, outer_sub);
        &mut self.values[index]
    }

    /// Linear index for a `variable -> value` mapping covering at least this
    /// function's domain.
    pub fn map_index(&self, vals: &BTreeMap<VarId, ValIndex>) -> ValIndex {
        debug_assert!(vals.len() >= self.vars.len());

        let mut index = 0;
        let mut stride = 1;
        let mut k = 0;
        for (&var, &coord) in vals {
            if k == self.vars.len() {
                break;
            }
            if self.vars[k] != var {
                continue;
            }
            debug_assert!(coord < self.sizes[k]);
            index += coord * stride;
            stride *= self.sizes[k];
            k += 1;
        }
        debug_assert_eq!(k, self.vars.len(), "mapping must cover the domain");
        index
    }

    /// Value at a `variable -> value` mapping covering the domain.
    pub fn at_map(&self, vals: &BTreeMap<VarId, ValIndex>) -> ValType {
        self.values[self.map_index(vals)]
    }

    /// Mutable value at a `variable -> value` mapping covering the domain.
    pub fn at_map_mut(&mut self, vals: &BTreeMap<VarId, ValIndex>) -> &mut ValType {
        let index = self.map_index(vals);
        &mut self.values[index]
    }

    /// Sets every cell to `val`, keeping the domain unchanged.
    pub fn assign_constant(&mut self, val: ValType) {
        self.values.fill(val);
    }

    /// Swaps domain and values with another function in O(1).
    pub fn swap(&mut self, other: &mut DiscreteFunction) {
        mem::swap(self, other);
    }

    // Expands this function's domain to its union with (other_vars,
    // other_sizes), replicating values over the new coordinates. Returns
    // without copying when the domain is already a superset.
    fn expand_merged(&mut self, other_vars: &[VarId], other_sizes: &[ValIndex]) {
        let (vars, sizes) = merge_domains(&self.vars, &self.sizes, other_vars, other_sizes);
        if vars.len() == self.vars.len() {
            return;
        }

        debug!(
            "Expanding domain {:?} to {:?}",
            self.vars, vars
        );

        let total: usize = sizes.iter().product();
        let mut result = DiscreteFunction {
            vars,
            sizes,
            values: Array1::zeros(total),
        };

        let mut it = DomainIterator::new(&result);
        while it.has_next() {
            result.values[it.ind()] = self.at_super(it.vars(), it.sub_ind());
            it.advance();
        }

        self.swap(&mut result);
    }

    /// Makes this function depend on at least the given variables. The list
    /// may be unsorted and contain duplicates; values are replicated over any
    /// new coordinates.
    pub fn expand(&mut self, vars: &[VarId]) -> Result<()> {
        let mut extra = vars.to_vec();
        extra.sort_unstable();
        extra.dedup();

        let mut extra_sizes = Vec::with_capacity(extra.len());
        for &var in &extra {
            extra_sizes.push(registry::domain_size(var)?);
        }

        self.expand_merged(&extra, &extra_sizes);
        Ok(())
    }

    /// Expands this function's domain to include the domain of another.
    pub fn expand_over(&mut self, other: &DiscreteFunction) {
        self.expand_merged(&other.vars, &other.sizes);
    }

    /// Fixes the listed variables to the given values, leaving a function
    /// over the remaining variables. Variables absent from the domain are
    /// ignored; if none of the listed variables are in the domain, the
    /// function is unchanged.
    ///
    /// Assumption: `vars` is sorted and parallel to `vals`.
    pub fn condition(&mut self, vars: &[VarId], vals: &[ValIndex]) {
        let mut it = DomainIterator::new(self);
        it.condition(vars, vals);
        if it.fixed_count() == 0 {
            return;
        }

        let mut free_vars = Vec::with_capacity(self.vars.len());
        let mut free_sizes = Vec::with_capacity(self.vars.len());
        for (&var, &size) in izip!(&self.vars, &self.sizes) {
            if !it.is_fixed(var) {
                free_vars.push(var);
                free_sizes.push(size);
            }
        }

        debug!(
            "Conditioning domain {:?} down to {:?}",
            self.vars, free_vars
        );

        let total: usize = free_sizes.iter().product();
        let mut result = DiscreteFunction {
            vars: free_vars,
            sizes: free_sizes,
            values: Array1::zeros(total),
        };

        while it.has_next() {
            let index = result.super_index(it.vars(), it.sub_ind());
            result.values[index] = self.values[it.ind()];
            it.advance();
        }

        self.swap(&mut result);
    }

    // Pointwise combination with another function over the union of both
    // domains. Expands this function's domain first when needed.
    fn combine_assign(&mut self, rhs: &DiscreteFunction, op: fn(ValType, ValType) -> ValType) {
        self.expand_merged(&rhs.vars, &rhs.sizes);

        let mut it = DomainIterator::new(self);
        while it.has_next() {
            let r = rhs.at_super(it.vars(), it.sub_ind());
            let v = &mut self.values[it.ind()];
            *v = op(*v, r);
            it.advance();
        }
    }

    /// Smallest value over the entire domain.
    pub fn min(&self) -> ValType {
        self.values.iter().copied().min_by(ValType::total_cmp).unwrap()
    }

    /// Largest value over the entire domain.
    pub fn max(&self) -> ValType {
        self.values.iter().copied().max_by(ValType::total_cmp).unwrap()
    }

    /// Linear index of the largest value; ties go to the smallest index.
    pub fn argmax(&self) -> ValIndex {
        let mut best = 0;
        for (k, &val) in self.values.iter().enumerate() {
            if val > self.values[best] {
                best = k;
            }
        }
        best
    }

    /// Linear index of the largest value other than the cell at `exclude`.
    /// For a one-cell function this returns 0, the only index.
    pub fn argmax2(&self, exclude: ValIndex) -> ValIndex {
        let mut best = None;
        for (k, &val) in self.values.iter().enumerate() {
            if k == exclude {
                continue;
            }
            match best {
                Some(b) if val <= self.values[b] => {}
                _ => best = Some(k),
            }
        }
        best.unwrap_or(0)
    }

    /// Largest absolute value over the entire domain.
    pub fn maxnorm(&self) -> ValType {
        self.values
            .iter()
            .map(|v| v.abs())
            .fold(0.0, ValType::max)
    }

    /// Mean value over the entire domain.
    pub fn mean(&self) -> ValType {
        self.values.sum() / self.values.len() as ValType
    }

    /// Returns true if every cell is strictly less than `val`.
    pub fn all_lt(&self, val: ValType) -> bool {
        self.values.iter().all(|&v| v < val)
    }

    /// Returns true if every cell is at most `val`.
    pub fn all_le(&self, val: ValType) -> bool {
        self.values.iter().all(|&v| v <= val)
    }

    /// Returns true if every cell is strictly greater than `val`.
    pub fn all_gt(&self, val: ValType) -> bool {
        self.values.iter().all(|&v| v > val)
    }

    /// Returns true if every cell is at least `val`.
    pub fn all_ge(&self, val: ValType) -> bool {
        self.values.iter().all(|&v| v >= val)
    }

    /// Applies a unary operation cell-wise, yielding a new function over the
    /// same domain.
    pub fn map(&self, op: impl FnMut(ValType) -> ValType) -> DiscreteFunction {
        DiscreteFunction {
            vars: self.vars.clone(),
            sizes: self.sizes.clone(),
            values: self.values.mapv(op),
        }
    }

    /// Elementwise natural logarithm.
    pub fn log(&self) -> DiscreteFunction {
        self.map(ValType::ln)
    }

    /// Elementwise exponential.
    pub fn exp(&self) -> DiscreteFunction {
        self.map(ValType::exp)
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> DiscreteFunction {
        self.map(ValType::sqrt)
    }

    /// Elementwise sine.
    pub fn sin(&self) -> DiscreteFunction {
        self.map(ValType::sin)
    }

    /// Elementwise cosine.
    pub fn cos(&self) -> DiscreteFunction {
        self.map(ValType::cos)
    }

    /// Elementwise tangent.
    pub fn tan(&self) -> DiscreteFunction {
        self.map(ValType::tan)
    }

    /// Elementwise absolute value.
    pub fn abs(&self) -> DiscreteFunction {
        self.map(ValType::abs)
    }

    /// Elementwise ceiling.
    pub fn ceil(&self) -> DiscreteFunction {
        self.map(ValType::ceil)
    }

    /// Elementwise floor.
    pub fn floor(&self) -> DiscreteFunction {
        self.map(ValType::floor)
    }

    /// Elementwise maximum against a scalar.
    pub fn max_scalar(&self, val: ValType) -> DiscreteFunction {
        self.map(|v| v.max(val))
    }
}

/// Applies a binary operation pointwise over the union of both domains,
/// yielding a new function.
pub fn zip_with(
    f1: &DiscreteFunction,
    f2: &DiscreteFunction,
    mut op: impl FnMut(ValType, ValType) -> ValType,
) -> DiscreteFunction {
    let (vars, sizes) = merge_domains(&f1.vars, &f1.sizes, &f2.vars, &f2.sizes);
    let total: usize = sizes.iter().product();
    let mut result = DiscreteFunction {
        vars,
        sizes,
        values: Array1::zeros(total),
    };

    let mut it = DomainIterator::new(&result);
    while it.has_next() {
        let a = f1.at_super(it.vars(), it.sub_ind());
        let b = f2.at_super(it.vars(), it.sub_ind());
        result.values[it.ind()] = op(a, b);
        it.advance();
    }
    result
}

/// Raises `base` to the power `exp` cell-wise over the union domain.
pub fn pow(base: &DiscreteFunction, exp: &DiscreteFunction) -> DiscreteFunction {
    zip_with(base, exp, ValType::powf)
}

/// Returns true if both functions depend on exactly the same variables.
pub fn same_domain(f1: &DiscreteFunction, f2: &DiscreteFunction) -> bool {
    f1.vars == f2.vars
}

/// Compares two functions cell-wise over the union of their domains.
///
/// The test is relative: values agree when `|1 - f1/f2| < tol`. When the
/// denominator is zero the absolute fallback `|f1 - f2| <= tol` is used, and
/// `tol == 0` means exact equality.
pub fn equal_within_tolerance(
    f1: &DiscreteFunction,
    f2: &DiscreteFunction,
    tol: ValType,
) -> bool {
    let (vars, sizes) = merge_domains(&f1.vars, &f1.sizes, &f2.vars, &f2.sizes);
    let mut it = DomainIterator::from_domain(vars, sizes);
    while it.has_next() {
        let a = f1.at_super(it.vars(), it.sub_ind());
        let b = f2.at_super(it.vars(), it.sub_ind());
        let close = if tol == 0.0 {
            a == b
        } else if b != 0.0 {
            (1.0 - a / b).abs() < tol
        } else {
            (a - b).abs() <= tol
        };
        if !close {
            return false;
        }
        it.advance();
    }
    true
}

/// Compares two functions cell-wise and requires identical domains.
pub fn strictly_equal_within_tolerance(
    f1: &DiscreteFunction,
    f2: &DiscreteFunction,
    tol: ValType,
) -> bool {
    same_domain(f1, f2) && equal_within_tolerance(f1, f2, tol)
}

impl PartialEq for DiscreteFunction {
    fn eq(&self, other: &Self) -> bool {
        equal_within_tolerance(self, other, 0.0)
    }
}

impl Index<ValIndex> for DiscreteFunction {
    type Output = ValType;

    fn index(&self, index: ValIndex) -> &Self::Output {
        &self.values[index]
    }
}

impl IndexMut<ValIndex> for DiscreteFunction {
    fn index_mut(&mut self, index: ValIndex) -> &mut Self::Output {
        &mut self.values[index]
    }
}

impl AddAssign<ValType> for DiscreteFunction {
    fn add_assign(&mut self, rhs: ValType) {
        self.values += rhs;
    }
}

impl SubAssign<ValType> for DiscreteFunction {
    fn sub_assign(&mut self, rhs: ValType) {
        self.values -= rhs;
    }
}

impl MulAssign<ValType> for DiscreteFunction {
    fn mul_assign(&mut self, rhs: ValType) {
        self.values *= rhs;
    }
}

impl DivAssign<ValType> for DiscreteFunction {
    fn div_assign(&mut self, rhs: ValType) {
        self.values /= rhs;
    }
}

impl AddAssign<&DiscreteFunction> for DiscreteFunction {
    fn add_assign(&mut self, rhs: &DiscreteFunction) {
        self.combine_assign(rhs, |a, b| a + b);
    }
}

impl SubAssign<&DiscreteFunction> for DiscreteFunction {
    fn sub_assign(&mut self, rhs: &DiscreteFunction) {
        self.combine_assign(rhs, |a, b| a - b);
    }
}

impl MulAssign<&DiscreteFunction> for DiscreteFunction {
    fn mul_assign(&mut self, rhs: &DiscreteFunction) {
        self.combine_assign(rhs, |a, b| a * b);
    }
}

impl DivAssign<&DiscreteFunction> for DiscreteFunction {
    fn div_assign(&mut self, rhs: &DiscreteFunction) {
        self.combine_assign(rhs, |a, b| a / b);
    }
}

impl Add<ValType> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn add(mut self, rhs: ValType) -> DiscreteFunction {
        self += rhs;
        self
    }
}

impl Sub<ValType> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn sub(mut self, rhs: ValType) -> DiscreteFunction {
        self -= rhs;
        self
    }
}

impl Mul<ValType> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn mul(mut self, rhs: ValType) -> DiscreteFunction {
        self *= rhs;
        self
    }
}

impl Div<ValType> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn div(mut self, rhs: ValType) -> DiscreteFunction {
        self /= rhs;
        self
    }
}

impl Add<&DiscreteFunction> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn add(mut self, rhs: &DiscreteFunction) -> DiscreteFunction {
        self += rhs;
        self
    }
}

impl Sub<&DiscreteFunction> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn sub(mut self, rhs: &DiscreteFunction) -> DiscreteFunction {
        self -= rhs;
        self
    }
}

impl Mul<&DiscreteFunction> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn mul(mut self, rhs: &DiscreteFunction) -> DiscreteFunction {
        self *= rhs;
        self
    }
}

impl Div<&DiscreteFunction> for DiscreteFunction {
    type Output = DiscreteFunction;

    fn div(mut self, rhs: &DiscreteFunction) -> DiscreteFunction {
        self /= rhs;
        self
    }
}

impl Neg for &DiscreteFunction {
    type Output = DiscreteFunction;

    fn neg(self) -> DiscreteFunction {
        self.clone() * -1.0
    }
}

impl Neg for DiscreteFunction {
    type Output = DiscreteFunction;

    fn neg(self) -> DiscreteFunction {
        self * -1.0
    }
}

impl std::fmt::Debug for DiscreteFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiscreteFunction({:?}: {})", self.vars, self)
    }
}

impl Display for DiscreteFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<String>>()
                .join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::register_variables;

    // Variable ids 9100-9199 are reserved for this module's tests.

    #[test]
    fn construction_sorts_and_dedups() {
        register_variables([(9100, 2), (9101, 3)]).unwrap();
        let f = DiscreteFunction::new(&[9101, 9100, 9101], 1.5).unwrap();
        assert_eq!(f.vars(), &[9100, 9101]);
        assert_eq!(f.sizes(), &[2, 3]);
        assert_eq!(f.domain_size(), 6);
        assert!(f.depends_on(9101));
        assert!((0..6).all(|k| f[k] == 1.5));
    }

    #[test]
    fn construction_fails_on_unknown_variable() {
        assert_eq!(
            DiscreteFunction::new(&[9199], 0.0).unwrap_err(),
            MaxSumError::UnknownVariable(9199)
        );
    }

    #[test]
    fn constant_function_has_one_cell() {
        let f = DiscreteFunction::constant(4.0);
        assert_eq!(f.domain_size(), 1);
        assert_eq!(f.num_vars(), 0);
        assert_eq!(f[0], 4.0);
        assert_eq!(f.argmax(), 0);
        assert_eq!(f.max(), 4.0);
        assert_eq!(f.min(), 4.0);
        assert_eq!(f.mean(), 4.0);
    }

    #[test]
    fn with_values_checks_order_and_length() {
        register_variables([(9102, 2), (9103, 2)]).unwrap();
        let f = DiscreteFunction::with_values(&[9102, 9103], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(f.at(&[1, 1]), 3.0);

        assert!(DiscreteFunction::with_values(&[9103, 9102], vec![0.0; 4]).is_err());
        assert!(DiscreteFunction::with_values(&[9102, 9103], vec![0.0; 3]).is_err());
    }

    #[test]
    fn access_modes_agree() {
        register_variables([(9104, 2), (9105, 3)]).unwrap();
        let mut f = DiscreteFunction::new(&[9104, 9105], 0.0).unwrap();
        for k in 0..6 {
            f[k] = k as ValType;
        }

        // Own-domain subindices compose with the column-major layout.
        assert_eq!(f.at(&[1, 2]), 5.0);
        *f.at_mut(&[0, 1]) = 20.0;
        assert_eq!(f[2], 20.0);

        // Supervariable access skips coordinates outside the domain.
        register_variables([(9106, 4)]).unwrap();
        let outer_vars = [9104, 9105, 9106];
        assert_eq!(f.at_super(&outer_vars, &[1, 2, 3]), 5.0);

        // Map access has the same semantics.
        let map = BTreeMap::from([(9104, 1), (9105, 2), (9106, 3)]);
        assert_eq!(f.at_map(&map), 5.0);
    }

    #[test]
    fn scalar_arithmetic_is_elementwise() {
        register_variables([(9107, 2)]).unwrap();
        let mut f = DiscreteFunction::new(&[9107], 2.0).unwrap();
        f += 3.0;
        f *= 2.0;
        f -= 4.0;
        f /= 3.0;
        assert_eq!(f[0], 2.0);
        assert_eq!(f[1], 2.0);

        let g = -&f;
        assert_eq!(g[0], -2.0);
        assert_eq!(f[0], 2.0);
    }

    #[test]
    fn function_addition_broadcasts_over_union() {
        register_variables([(9108, 2), (9109, 2)]).unwrap();
        let mut f = DiscreteFunction::with_values(&[9108], vec![1.0, 2.0]).unwrap();
        let g = DiscreteFunction::with_values(&[9109], vec![10.0, 20.0]).unwrap();

        f += &g;
        assert_eq!(f.vars(), &[9108, 9109]);
        assert_eq!(f.at(&[0, 0]), 11.0);
        assert_eq!(f.at(&[1, 0]), 12.0);
        assert_eq!(f.at(&[0, 1]), 21.0);
        assert_eq!(f.at(&[1, 1]), 22.0);
    }

    #[test]
    fn function_arithmetic_subset_keeps_domain() {
        register_variables([(9110, 2), (9111, 2)]).unwrap();
        let mut f = DiscreteFunction::new(&[9110, 9111], 10.0).unwrap();
        let g = DiscreteFunction::with_values(&[9111], vec![1.0, 2.0]).unwrap();

        f -= &g;
        assert_eq!(f.vars(), &[9110, 9111]);
        assert_eq!(f.at(&[0, 0]), 9.0);
        assert_eq!(f.at(&[0, 1]), 8.0);
    }

    #[test]
    fn expand_preserves_values() {
        register_variables([(9112, 2), (9113, 2)]).unwrap();
        let mut f = DiscreteFunction::with_values(&[9112], vec![10.0, 20.0]).unwrap();

        f.expand(&[9113]).unwrap();
        assert_eq!(f.vars(), &[9112, 9113]);
        assert_eq!(f.at(&[0, 0]), 10.0);
        assert_eq!(f.at(&[1, 0]), 20.0);
        assert_eq!(f.at(&[0, 1]), 10.0);
        assert_eq!(f.at(&[1, 1]), 20.0);
    }

    #[test]
    fn expand_is_idempotent_on_supersets() {
        register_variables([(9114, 2), (9115, 3)]).unwrap();
        let mut f = DiscreteFunction::new(&[9114, 9115], 0.0).unwrap();
        f[3] = 7.0;

        f.expand(&[9114]).unwrap();
        assert_eq!(f.vars(), &[9114, 9115]);
        assert_eq!(f[3], 7.0);
    }

    #[test]
    fn condition_projects_out_fixed_variables() {
        register_variables([(9116, 2), (9117, 3)]).unwrap();
        let mut g = DiscreteFunction::new(&[9116, 9117], 0.0).unwrap();
        let mut it = DomainIterator::new(&g);
        while it.has_next() {
            g[it.ind()] = it.sub_ind()[0] as ValType + 10.0 * it.sub_ind()[1] as ValType;
            it.advance();
        }

        g.condition(&[9117], &[1]);
        assert_eq!(g.vars(), &[9116]);
        assert_eq!(g[0], 10.0);
        assert_eq!(g[1], 11.0);
    }

    #[test]
    fn condition_ignores_absent_variables() {
        register_variables([(9118, 2), (9119, 2)]).unwrap();
        let mut f = DiscreteFunction::with_values(&[9118], vec![1.0, 2.0]).unwrap();
        f.condition(&[9119], &[0]);
        assert_eq!(f.vars(), &[9118]);
        assert_eq!(f[1], 2.0);
    }

    #[test]
    fn reductions() {
        register_variables([(9120, 2), (9121, 2)]).unwrap();
        let f =
            DiscreteFunction::with_values(&[9120, 9121], vec![-1.0, 3.0, 3.0, 0.5]).unwrap();

        assert_eq!(f.min(), -1.0);
        assert_eq!(f.max(), 3.0);
        assert_eq!(f.argmax(), 1); // tie between cells 1 and 2 goes to 1
        assert_eq!(f.argmax2(1), 2);
        assert_eq!(f.maxnorm(), 3.0);
        assert_eq!(f.mean(), 1.375);
    }

    #[test]
    fn argmax2_on_one_cell_returns_zero() {
        let f = DiscreteFunction::constant(5.0);
        assert_eq!(f.argmax2(0), 0);
    }

    #[test]
    fn scalar_relations_hold_per_cell() {
        register_variables([(9122, 3)]).unwrap();
        let f = DiscreteFunction::with_values(&[9122], vec![1.0, 2.0, 3.0]).unwrap();

        assert!(f.all_lt(4.0));
        assert!(!f.all_lt(3.0));
        assert!(f.all_le(3.0));
        assert!(f.all_gt(0.0));
        assert!(f.all_ge(1.0));
        assert!(!f.all_ge(2.0));
    }

    #[test]
    fn tolerance_comparison_with_zero_denominator_falls_back_to_absolute() {
        register_variables([(9123, 2)]).unwrap();
        let f = DiscreteFunction::with_values(&[9123], vec![0.0, 1.0]).unwrap();
        let g = DiscreteFunction::with_values(&[9123], vec![1e-9, 1.0]).unwrap();

        // g(0) != 0, so the relative test applies to f(0)=0 vs g(0): |1-0/1e-9| = 1.
        assert!(!equal_within_tolerance(&f, &g, 1e-6));
        // Reversed, the denominator f(0) is zero and the absolute fallback passes.
        assert!(equal_within_tolerance(&g, &f, 1e-6));
        // Exact comparison.
        assert!(!equal_within_tolerance(&f, &g, 0.0));
        assert!(equal_within_tolerance(&f, &f, 0.0));
    }

    #[test]
    fn equality_broadcasts_over_union_domain() {
        register_variables([(9124, 2), (9125, 2)]).unwrap();
        let f = DiscreteFunction::with_values(&[9124], vec![3.0, 3.0]).unwrap();
        let g = DiscreteFunction::new(&[9124, 9125], 3.0).unwrap();

        assert!(equal_within_tolerance(&f, &g, 0.0));
        assert!(f == g);
        assert!(!same_domain(&f, &g));
        assert!(!strictly_equal_within_tolerance(&f, &g, 0.0));
        assert!(strictly_equal_within_tolerance(&f, &f, 0.0));
    }

    #[test]
    fn elementwise_maps() {
        register_variables([(9126, 2)]).unwrap();
        let f = DiscreteFunction::with_values(&[9126], vec![1.0, 4.0]).unwrap();

        assert_eq!(f.sqrt()[1], 2.0);
        assert!((f.exp().log()[1] - 4.0).abs() < 1e-12);
        assert_eq!((-&f).abs()[1], 4.0);
        assert_eq!(f.map(|v| v + 0.4).floor()[0], 1.0);
        assert_eq!(f.map(|v| v + 0.4).ceil()[0], 2.0);
        assert_eq!(f.max_scalar(2.0)[0], 2.0);
    }

    #[test]
    fn pow_broadcasts_over_union() {
        register_variables([(9127, 2), (9128, 2)]).unwrap();
        let base = DiscreteFunction::with_values(&[9127], vec![2.0, 3.0]).unwrap();
        let exp = DiscreteFunction::with_values(&[9128], vec![1.0, 2.0]).unwrap();

        let p = pow(&base, &exp);
        assert_eq!(p.vars(), &[9127, 9128]);
        assert_eq!(p.at(&[0, 0]), 2.0);
        assert_eq!(p.at(&[1, 0]), 3.0);
        assert_eq!(p.at(&[0, 1]), 4.0);
        assert_eq!(p.at(&[1, 1]), 9.0);
    }

    #[test]
    fn swap_exchanges_storage() {
        register_variables([(9129, 2)]).unwrap();
        let mut f = DiscreteFunction::with_values(&[9129], vec![1.0, 2.0]).unwrap();
        let mut g = DiscreteFunction::constant(9.0);

        f.swap(&mut g);
        assert_eq!(f.num_vars(), 0);
        assert_eq!(f[0], 9.0);
        assert_eq!(g.vars(), &[9129]);
        assert_eq!(g[1], 2.0);
    }

    #[test]
    fn assign_constant_keeps_domain() {
        register_variables([(9130, 3)]).unwrap();
        let mut f = DiscreteFunction::with_values(&[9130], vec![1.0, 2.0, 3.0]).unwrap();
        f.assign_constant(0.5);
        assert_eq!(f.vars(), &[9130]);
        assert!((0..3).all(|k| f[k] == 0.5));
    }

    #[test]
    fn clone_is_deep() {
        register_variables([(9131, 2)]).unwrap();
        let f = DiscreteFunction::with_values(&[9131], vec![1.0, 2.0]).unwrap();
        let mut g = f.clone();
        g[0] = 100.0;
        assert_eq!(f[0], 1.0);
    }
}
