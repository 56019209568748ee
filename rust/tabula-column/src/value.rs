//! Logical values as seen by object reads and row writers.

use std::{any::Any, collections::BTreeSet, fmt, sync::Arc};

use tabula_common::{Result, error::Error};

use crate::types::ColumnTypeId;

pub const NANOS_PER_SECOND: u32 = 1_000_000_000;
pub const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SECOND as i64;

/// A time of day with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(i64);

impl TimeOfDay {
    /// Storage sentinel for a missing time of day.
    pub const MISSING_NANOS: i64 = i64::MAX;

    pub fn from_nanos(nanos: i64) -> Result<TimeOfDay> {
        if !(0..NANOS_PER_DAY).contains(&nanos) {
            return Err(Error::invalid_arg(
                "nanos",
                format!("{nanos} is not a nanosecond of day"),
            ));
        }
        Ok(TimeOfDay(nanos))
    }

    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Result<TimeOfDay> {
        Self::from_nanos(
            (hour as i64 * 3600 + minute as i64 * 60 + second as i64) * NANOS_PER_SECOND as i64,
        )
    }

    #[inline]
    pub fn nanos(self) -> i64 {
        self.0
    }
}

/// A point on the UTC time line: seconds since the epoch plus a nanosecond adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    seconds: i64,
    nanos: u32,
}

impl Instant {
    /// Storage sentinel for a missing instant.
    pub const MISSING_SECONDS: i64 = i64::MIN;

    pub fn new(seconds: i64, nanos: u32) -> Result<Instant> {
        if seconds == Self::MISSING_SECONDS {
            return Err(Error::invalid_arg("seconds", "reserved missing marker"));
        }
        if nanos >= NANOS_PER_SECOND {
            return Err(Error::invalid_arg("nanos", format!("{nanos} >= 1e9")));
        }
        Ok(Instant { seconds, nanos })
    }

    pub fn from_seconds(seconds: i64) -> Result<Instant> {
        Self::new(seconds, 0)
    }

    #[inline]
    pub fn seconds(self) -> i64 {
        self.seconds
    }

    #[inline]
    pub fn nanos(self) -> u32 {
        self.nanos
    }
}

/// An ordered set of distinct strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextSet(Arc<BTreeSet<String>>);

impl TextSet {
    pub fn new<I, S>(items: I) -> TextSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TextSet(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.contains(item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// An opaque user value. Two custom values are equal only if they are the same
/// allocation.
#[derive(Clone)]
pub struct CustomValue(Arc<dyn Any + Send + Sync>);

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> CustomValue {
        CustomValue(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValue({:p})", Arc::as_ptr(&self.0))
    }
}

/// A single logical cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(Arc<str>),
    TextSet(TextSet),
    Time(TimeOfDay),
    DateTime(Instant),
    Custom(CustomValue),
}

impl Value {
    pub fn text(text: impl AsRef<str>) -> Value {
        Value::Text(Arc::from(text.as_ref()))
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Missing => "missing",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::TextSet(_) => "text set",
            Value::Time(_) => "time",
            Value::DateTime(_) => "date-time",
            Value::Custom(_) => "custom",
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Value::Missing
        } else {
            Value::Number(value)
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value.into())
    }
}

impl From<TimeOfDay> for Value {
    fn from(value: TimeOfDay) -> Self {
        Value::Time(value)
    }
}

impl From<Instant> for Value {
    fn from(value: Instant) -> Self {
        Value::DateTime(value)
    }
}

impl From<TextSet> for Value {
    fn from(value: TextSet) -> Self {
        Value::TextSet(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Missing, Into::into)
    }
}

impl ColumnTypeId {
    /// Returns `true` if a cell of this type can hold `value`. Missing fits everywhere.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Missing)
                | (ColumnTypeId::Real | ColumnTypeId::Integer, Value::Number(_))
                | (ColumnTypeId::Nominal | ColumnTypeId::Text, Value::Text(_))
                | (ColumnTypeId::Time, Value::Time(_))
                | (ColumnTypeId::DateTime, Value::DateTime(_))
                | (ColumnTypeId::TextSet, Value::TextSet(_))
                | (ColumnTypeId::Custom, Value::Custom(_))
        )
    }
}

/// Rounds half away from zero; infinities and `NaN` pass through.
#[inline]
pub fn round_integer(value: f64) -> f64 {
    if value.is_finite() { value.round() } else { value }
}
