//! Lazy enumeration of index tuples over a function's domain.

use bitvec::prelude::LocalBits;
use bitvec::vec::BitVec;

use crate::function::discrete_function::DiscreteFunction;
use crate::types::{ValIndex, VarId};

/// Enumerates all subindex tuples over a domain in storage order: the first
/// (lowest) variable varies fastest, so [`DomainIterator::ind`] is always a
/// valid slot in the target function's value array.
///
/// A subset of the coordinates can be pinned with [`DomainIterator::condition`];
/// pinned coordinates never change while the free ones are counted through.
/// A constant (empty-domain) function, or an iterator with every coordinate
/// pinned, yields exactly one tuple.
pub struct DomainIterator {
    vars: Vec<VarId>,
    sizes: Vec<ValIndex>,
    strides: Vec<ValIndex>,
    sub: Vec<ValIndex>,
    ind: ValIndex,
    fixed: BitVec<usize, LocalBits>,
    finished: bool,
}

impl DomainIterator {
    /// Creates an iterator over the domain of the given function.
    pub fn new(function: &DiscreteFunction) -> Self {
        Self::from_domain(function.vars().to_vec(), function.sizes().to_vec())
    }

    /// Creates an iterator over an explicit `(vars, sizes)` domain.
    /// Assumption: `vars` is sorted and parallel to `sizes`.
    pub(crate) fn from_domain(vars: Vec<VarId>, sizes: Vec<ValIndex>) -> Self {
        let mut strides = vec![1; sizes.len()];
        for k in 1..sizes.len() {
            strides[k] = strides[k - 1] * sizes[k - 1];
        }

        let num_vars = vars.len();
        DomainIterator {
            vars,
            sub: vec![0; num_vars],
            ind: 0,
            fixed: BitVec::repeat(false, num_vars),
            finished: false,
            sizes,
            strides,
        }
    }

    /// Returns true while the iterator still points at a valid tuple.
    pub fn has_next(&self) -> bool {
        !self.finished
    }

    /// Steps to the next tuple by incrementing the free coordinates as a
    /// mixed-radix counter. Fixed coordinates never change.
    pub fn advance(&mut self) {
        for k in 0..self.sub.len() {
            if self.fixed[k] {
                continue;
            }
            if self.sub[k] + 1 < self.sizes[k] {
                // Advance this coordinate
                self.sub[k] += 1;
                self.ind += self.strides[k];
                return;
            }
            // Carry over to the next free coordinate
            self.ind -= self.sub[k] * self.strides[k];
            self.sub[k] = 0;
        }
        self.finished = true;
    }

    /// Current linear index into the target's value array.
    pub fn ind(&self) -> ValIndex {
        self.ind
    }

    /// Current subindex tuple.
    pub fn sub_ind(&self) -> &[ValIndex] {
        &self.sub
    }

    /// The target's variable list.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Pins the listed variables to the given values and marks them fixed.
    /// Variables absent from the target's domain are silently ignored.
    /// Assumption: `vars` is sorted and parallel to `vals`.
    pub fn condition(&mut self, vars: &[VarId], vals: &[ValIndex]) {
        debug_assert_eq!(vars.len(), vals.len());

        let mut k = 0;
        for (&var, &val) in vars.iter().zip(vals) {
            while k < self.vars.len() && self.vars[k] < var {
                k += 1;
            }
            if k == self.vars.len() {
                break;
            }
            if self.vars[k] == var {
                debug_assert!(val < self.sizes[k]);
                self.ind += val * self.strides[k];
                self.ind -= self.sub[k] * self.strides[k];
                self.sub[k] = val;
                self.fixed.set(k, true);
                k += 1;
            }
        }
    }

    /// Pins variables shared with another iterator to that iterator's current
    /// tuple.
    pub fn condition_on(&mut self, other: &DomainIterator) {
        self.condition(other.vars(), other.sub_ind());
    }

    /// Returns true if the given variable is pinned. Variables outside the
    /// domain are never pinned.
    pub fn is_fixed(&self, var: VarId) -> bool {
        match self.vars.binary_search(&var) {
            Ok(k) => self.fixed[k],
            Err(_) => false,
        }
    }

    /// Number of pinned coordinates.
    pub fn fixed_count(&self) -> usize {
        self.fixed.count_ones()
    }

    /// Rewinds the free coordinates to zero, retaining pinned ones.
    pub fn reset(&mut self) {
        for k in 0..self.sub.len() {
            if !self.fixed[k] {
                self.ind -= self.sub[k] * self.strides[k];
                self.sub[k] = 0;
            }
        }
        self.finished = false;
    }
}
