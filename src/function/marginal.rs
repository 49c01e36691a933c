//! Marginalization and out-of-place conditioning of discrete functions.

use log::debug;

use crate::function::discrete_function::DiscreteFunction;
use crate::function::domain_iterator::DomainIterator;
use crate::types::{MaxSumError, Result, ValIndex, ValType, VarId};

// Checks that every variable of `inner` appears in `outer`.
fn is_subset(inner: &[VarId], outer: &[VarId]) -> bool {
    let mut k = 0;
    for &var in outer {
        if k == inner.len() {
            break;
        }
        if inner[k] == var {
            k += 1;
        }
    }
    k == inner.len()
}

/// Reduces `in_fun` onto the domain of `out_fun` by folding `aggregate` over
/// every coordinate of `dom(in_fun) \ dom(out_fun)`.
///
/// For each tuple of `out_fun`, the fold is seeded with the first matching
/// cell of `in_fun`, so order-sensitive aggregates like max and min work
/// without a neutral element. The previous contents of `out_fun` are
/// overwritten; both domains are left unchanged. When the domains are equal,
/// `out_fun` becomes a copy of `in_fun`.
pub fn marginal(
    in_fun: &DiscreteFunction,
    mut aggregate: impl FnMut(ValType, ValType) -> ValType,
    out_fun: &mut DiscreteFunction,
) -> Result<()> {
    if !is_subset(out_fun.vars(), in_fun.vars()) {
        return Err(MaxSumError::BadDomain {
            expected: "a subset of the input domain",
            found: "the output domain",
        });
    }

    let mut out_it = DomainIterator::new(out_fun);
    while out_it.has_next() {
        let mut in_it = DomainIterator::new(in_fun);
        in_it.condition_on(&out_it);

        let mut acc = in_fun[in_it.ind()];
        in_it.advance();
        while in_it.has_next() {
            acc = aggregate(acc, in_fun[in_it.ind()]);
            in_it.advance();
        }

        out_fun[out_it.ind()] = acc;
        out_it.advance();
    }
    Ok(())
}

/// Marginalizes by maximization: `out(y) = max over {x : x|dom(out) = y} of in(x)`.
pub fn max_marginal(in_fun: &DiscreteFunction, out_fun: &mut DiscreteFunction) -> Result<()> {
    marginal(in_fun, ValType::max, out_fun)
}

/// Marginalizes by minimization.
pub fn min_marginal(in_fun: &DiscreteFunction, out_fun: &mut DiscreteFunction) -> Result<()> {
    marginal(in_fun, ValType::min, out_fun)
}

/// Marginalizes by averaging over the folded-out coordinates.
pub fn mean_marginal(in_fun: &DiscreteFunction, out_fun: &mut DiscreteFunction) -> Result<()> {
    marginal(in_fun, |acc, next| acc + next, out_fun)?;
    let folded = (in_fun.domain_size() / out_fun.domain_size()) as ValType;
    *out_fun /= folded;
    Ok(())
}

/// Conditions `in_fun` on the given variable values, storing the result over
/// the remaining variables in `out_fun`. The previous contents of `out_fun`
/// are replaced entirely. Variables absent from `in_fun`'s domain are
/// ignored; if none apply, `out_fun` becomes a plain copy.
///
/// Assumption: `vars` is sorted and parallel to `vals`.
pub fn condition_into(
    in_fun: &DiscreteFunction,
    out_fun: &mut DiscreteFunction,
    vars: &[VarId],
    vals: &[ValIndex],
) {
    debug!("Conditioning {:?} on variables {:?}", in_fun.vars(), vars);
    let mut result = in_fun.clone();
    result.condition(vars, vals);
    out_fun.swap(&mut result);
}
