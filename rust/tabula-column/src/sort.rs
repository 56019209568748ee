//! Stable sort permutations over logical column values.
//!
//! Missing values compare greater than every present value, so they come last in
//! ascending order and first in descending order.

use std::cmp::Ordering;

use tabula_common::{Result, verify_arg};

use crate::{mapping::Mapping, types::Order, value::Value};

/// Returns the permutation `p` such that `values[p[0]], values[p[1]], ..` is ordered.
///
/// Ties keep their original relative order in both directions.
pub(crate) fn sort_permutation<V>(
    values: &[V],
    order: Order,
    compare: impl Fn(&V, &V) -> Ordering,
    is_missing: impl Fn(&V) -> bool,
) -> Result<Mapping> {
    verify_arg!(values, values.len() <= i32::MAX as usize);
    let compare_present = |a: &V, b: &V| match (is_missing(a), is_missing(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b),
    };
    let mut permutation: Vec<i32> = (0..values.len() as i32).collect();
    match order {
        Order::Ascending => permutation
            .sort_by(|&a, &b| compare_present(&values[a as usize], &values[b as usize])),
        Order::Descending => permutation
            .sort_by(|&a, &b| compare_present(&values[b as usize], &values[a as usize])),
    }
    Ok(Mapping::new(permutation))
}

#[inline]
pub(crate) fn compare_numbers(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Orders sortable object values of the same kind.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Time(a), Value::Time(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
