//! Physical value stores shared by the column layouts.
//!
//! A [`Backing`] is an immutable, cheaply cloneable array of one value kind. Layouts
//! never mutate a backing; deriving a column either shares it (views) or builds a
//! new one (materialization).

use std::sync::Arc;

use tabula_bits::{PackedFormat, PackedIndices};
use tabula_common::{Result, error::Error, verify_arg};

use crate::{
    mapping::resolve,
    value::{Instant, NANOS_PER_SECOND, TimeOfDay, Value},
};

pub trait Backing: Clone + Send + Sync + std::fmt::Debug + 'static {
    type Value: Clone + Send + Sync + std::fmt::Debug;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `position`. The position must be in bounds.
    fn get(&self, position: usize) -> Self::Value;

    /// The value read for positions that resolve to nothing.
    fn missing(&self) -> Self::Value;

    /// Value equality as seen by the column: missing equals missing.
    fn same(a: &Self::Value, b: &Self::Value) -> bool;

    /// Materializes `result[i] = self[mapping[i]]`; unresolvable entries read as missing.
    fn gather(&self, mapping: &[i32]) -> Self;

    /// Builds a backing of the same kind (and, for packed indices, the same format)
    /// holding `len` values from `values`.
    fn collect(&self, len: usize, values: impl Iterator<Item = Self::Value>) -> Result<Self>;

    /// Storage cost of one dense value in bytes.
    fn value_bytes(&self) -> f64;
}

/// Double precision values; `NaN` is missing.
#[derive(Debug, Clone)]
pub struct NumericBacking(Arc<[f64]>);

impl NumericBacking {
    pub fn new(values: Vec<f64>) -> NumericBacking {
        NumericBacking(values.into())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Backing for NumericBacking {
    type Value = f64;

    #[inline]
    fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn get(&self, position: usize) -> f64 {
        self.0[position]
    }

    #[inline]
    fn missing(&self) -> f64 {
        f64::NAN
    }

    #[inline]
    fn same(a: &f64, b: &f64) -> bool {
        a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
    }

    fn gather(&self, mapping: &[i32]) -> Self {
        let len = self.0.len();
        NumericBacking::new(
            mapping
                .iter()
                .map(|&index| resolve(index, len).map_or(f64::NAN, |p| self.0[p]))
                .collect(),
        )
    }

    fn collect(&self, len: usize, values: impl Iterator<Item = f64>) -> Result<Self> {
        let mut data = Vec::with_capacity(len);
        data.extend(values.take(len));
        data.resize(len, f64::NAN);
        Ok(NumericBacking::new(data))
    }

    fn value_bytes(&self) -> f64 {
        8.0
    }
}

/// Nanoseconds of day; [`TimeOfDay::MISSING_NANOS`] is missing.
#[derive(Debug, Clone)]
pub struct TimeBacking(Arc<[i64]>);

impl TimeBacking {
    /// Wraps raw nanosecond-of-day values, rejecting anything outside a day.
    pub fn new(nanos: Vec<i64>) -> Result<TimeBacking> {
        if let Some(&bad) = nanos
            .iter()
            .find(|&&n| n != TimeOfDay::MISSING_NANOS && TimeOfDay::from_nanos(n).is_err())
        {
            return Err(Error::invalid_arg(
                "nanos",
                format!("{bad} is not a nanosecond of day"),
            ));
        }
        Ok(TimeBacking(nanos.into()))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl Backing for TimeBacking {
    type Value = i64;

    #[inline]
    fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn get(&self, position: usize) -> i64 {
        self.0[position]
    }

    #[inline]
    fn missing(&self) -> i64 {
        TimeOfDay::MISSING_NANOS
    }

    #[inline]
    fn same(a: &i64, b: &i64) -> bool {
        a == b
    }

    fn gather(&self, mapping: &[i32]) -> Self {
        let len = self.0.len();
        TimeBacking(
            mapping
                .iter()
                .map(|&index| resolve(index, len).map_or(TimeOfDay::MISSING_NANOS, |p| self.0[p]))
                .collect(),
        )
    }

    fn collect(&self, len: usize, values: impl Iterator<Item = i64>) -> Result<Self> {
        let mut data = Vec::with_capacity(len);
        data.extend(values.take(len));
        data.resize(len, TimeOfDay::MISSING_NANOS);
        Ok(TimeBacking(data.into()))
    }

    fn value_bytes(&self) -> f64 {
        8.0
    }
}

/// Epoch seconds with optional nanosecond parts.
///
/// The nanosecond array is only present in high-precision mode, i.e. when at least
/// one value has a non-zero nanosecond part.
#[derive(Debug, Clone)]
pub struct DateTimeBacking {
    seconds: Arc<[i64]>,
    nanos: Option<Arc<[u32]>>,
}

impl DateTimeBacking {
    pub fn new(seconds: Vec<i64>, nanos: Option<Vec<u32>>) -> Result<DateTimeBacking> {
        if let Some(nanos) = &nanos {
            verify_arg!(nanos, nanos.len() == seconds.len());
            if let Some(&bad) = nanos.iter().find(|&&n| n >= NANOS_PER_SECOND) {
                return Err(Error::invalid_arg("nanos", format!("{bad} >= 1e9")));
            }
        }
        Ok(DateTimeBacking {
            seconds: seconds.into(),
            nanos: nanos.map(Into::into),
        })
    }

    /// Builds a backing from instants, choosing high precision only when needed.
    pub fn from_instants(len: usize, values: impl Iterator<Item = Option<Instant>>) -> Self {
        let mut seconds = Vec::with_capacity(len);
        let mut nanos = Vec::with_capacity(len);
        let mut high_precision = false;
        for value in values.take(len) {
            match value {
                Some(instant) => {
                    seconds.push(instant.seconds());
                    nanos.push(instant.nanos());
                    high_precision |= instant.nanos() != 0;
                }
                None => {
                    seconds.push(Instant::MISSING_SECONDS);
                    nanos.push(0);
                }
            }
        }
        seconds.resize(len, Instant::MISSING_SECONDS);
        nanos.resize(len, 0);
        DateTimeBacking {
            seconds: seconds.into(),
            nanos: high_precision.then(|| nanos.into()),
        }
    }

    /// Returns `true` if nanosecond parts are stored.
    pub fn is_high_precision(&self) -> bool {
        self.nanos.is_some()
    }
}

impl Backing for DateTimeBacking {
    type Value = Option<Instant>;

    #[inline]
    fn len(&self) -> usize {
        self.seconds.len()
    }

    #[inline]
    fn get(&self, position: usize) -> Option<Instant> {
        let seconds = self.seconds[position];
        if seconds == Instant::MISSING_SECONDS {
            return None;
        }
        let nanos = self.nanos.as_ref().map_or(0, |nanos| nanos[position]);
        Instant::new(seconds, nanos).ok()
    }

    #[inline]
    fn missing(&self) -> Option<Instant> {
        None
    }

    #[inline]
    fn same(a: &Option<Instant>, b: &Option<Instant>) -> bool {
        a == b
    }

    fn gather(&self, mapping: &[i32]) -> Self {
        let len = self.len();
        DateTimeBacking::from_instants(
            mapping.len(),
            mapping
                .iter()
                .map(|&index| resolve(index, len).and_then(|p| self.get(p))),
        )
    }

    fn collect(&self, len: usize, values: impl Iterator<Item = Option<Instant>>) -> Result<Self> {
        Ok(DateTimeBacking::from_instants(len, values))
    }

    fn value_bytes(&self) -> f64 {
        if self.nanos.is_some() { 12.0 } else { 8.0 }
    }
}

/// Categorical indices; index `0` is missing.
impl Backing for PackedIndices {
    type Value = u32;

    #[inline]
    fn len(&self) -> usize {
        PackedIndices::len(self)
    }

    #[inline]
    fn get(&self, position: usize) -> u32 {
        PackedIndices::get(self, position)
    }

    #[inline]
    fn missing(&self) -> u32 {
        0
    }

    #[inline]
    fn same(a: &u32, b: &u32) -> bool {
        a == b
    }

    fn gather(&self, mapping: &[i32]) -> Self {
        PackedIndices::gather(self, mapping)
    }

    fn collect(&self, len: usize, values: impl Iterator<Item = u32>) -> Result<Self> {
        PackedIndices::collect(self.format(), len, values.take(len))
    }

    fn value_bytes(&self) -> f64 {
        self.format().value_bytes()
    }
}

/// Boxed object values.
#[derive(Debug, Clone)]
pub struct ObjectBacking(Arc<[Value]>);

impl ObjectBacking {
    pub fn new(values: Vec<Value>) -> ObjectBacking {
        ObjectBacking(values.into())
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl Backing for ObjectBacking {
    type Value = Value;

    #[inline]
    fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn get(&self, position: usize) -> Value {
        self.0[position].clone()
    }

    #[inline]
    fn missing(&self) -> Value {
        Value::Missing
    }

    #[inline]
    fn same(a: &Value, b: &Value) -> bool {
        a == b
    }

    fn gather(&self, mapping: &[i32]) -> Self {
        let len = self.0.len();
        ObjectBacking(
            mapping
                .iter()
                .map(|&index| resolve(index, len).map_or(Value::Missing, |p| self.0[p].clone()))
                .collect(),
        )
    }

    fn collect(&self, len: usize, values: impl Iterator<Item = Value>) -> Result<Self> {
        let mut data = Vec::with_capacity(len);
        data.extend(values.take(len));
        data.resize(len, Value::Missing);
        Ok(ObjectBacking::new(data))
    }

    fn value_bytes(&self) -> f64 {
        std::mem::size_of::<usize>() as f64
    }
}

/// Packed format needed for a dictionary of `size` entries.
pub(crate) fn format_for_dictionary(size: usize) -> Result<PackedFormat> {
    PackedFormat::for_dictionary_size(size).ok_or_else(|| {
        Error::format_overflow(
            PackedFormat::I32.to_string(),
            size as u64 - 1,
            PackedFormat::I32.max_value() as u64,
        )
    })
}
