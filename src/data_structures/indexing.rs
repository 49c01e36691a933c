//! Index math shared by all tabular storage in this crate.
//!
//! Value tables are laid out column-major over the (sorted) variable order:
//! the first variable varies fastest, so the linear index of a subindex tuple
//! is `sum_k sub[k] * prod_{j<k} sizes[j]`.

use itertools::izip;

use crate::types::{MaxSumError, Result, ValIndex};

/// Converts a subindex tuple to the corresponding linear index.
///
/// `sub` must be parallel to `sizes`, with each entry in range.
pub fn sub2ind(sizes: &[ValIndex], sub: &[ValIndex]) -> Result<ValIndex> {
    if sub.len() != sizes.len() {
        return Err(MaxSumError::OutOfRange {
            index: sub.len(),
            size: sizes.len(),
        });
    }

    let mut index = 0;
    let mut stride = 1;
    for (&size, &coord) in izip!(sizes, sub) {
        if coord >= size {
            return Err(MaxSumError::OutOfRange {
                index: coord,
                size,
            });
        }
        index += coord * stride;
        stride *= size;
    }
    Ok(index)
}

/// Converts a linear index to the corresponding subindex tuple.
///
/// `sub` must have the same length as `sizes`; it is overwritten in place.
pub fn ind2sub(sizes: &[ValIndex], ind: ValIndex, sub: &mut [ValIndex]) -> Result<()> {
    if sub.len() != sizes.len() {
        return Err(MaxSumError::OutOfRange {
            index: sub.len(),
            size: sizes.len(),
        });
    }

    let total: ValIndex = sizes.iter().product();
    if ind >= total {
        return Err(MaxSumError::OutOfRange {
            index: ind,
            size: total,
        });
    }

    let mut remainder = ind;
    for (coord, &size) in izip!(sub.iter_mut(), sizes) {
        *coord = remainder % size;
        remainder /= size;
    }
    Ok(())
}
