//! The immutable, typed column.

use std::sync::Arc;

use tabula_bits::{PackedFormat, PackedIndices};
use tabula_common::{Result, error::Error, verify_arg};

use crate::{
    backing::{
        Backing, DateTimeBacking, NumericBacking, ObjectBacking, TimeBacking,
        format_for_dictionary,
    },
    dictionary::{CategoryDictionary, IndexTranslation},
    layout::{Layout, fill_count},
    mapping::{Mapping, MappingCache},
    sort::{compare_numbers, compare_values, sort_permutation},
    types::{Capabilities, Category, ColumnTypeId, LayoutKind, Order},
    value::{TimeOfDay, Value, round_integer},
};

/// Numeric columns only honour a view request when the mapping covers at least
/// `1 / NUMERIC_VIEW_MIN_COVERAGE_DIVISOR` of the backing; smaller selections are
/// gathered so that a few rows do not pin a large backing.
pub const NUMERIC_VIEW_MIN_COVERAGE_DIVISOR: usize = 10;

/// Storage of a column, one variant per value kind.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Numeric(Layout<NumericBacking>),
    Time(Layout<TimeBacking>),
    DateTime(Layout<DateTimeBacking>),
    Categorical {
        layout: Layout<PackedIndices>,
        dictionary: Arc<CategoryDictionary>,
    },
    Object(Layout<ObjectBacking>),
}

/// Evaluates `$body` with `$layout` bound to the layout of any variant.
macro_rules! with_layout {
    ($data:expr, $layout:ident => $body:expr) => {
        match $data {
            ColumnData::Numeric($layout) => $body,
            ColumnData::Time($layout) => $body,
            ColumnData::DateTime($layout) => $body,
            ColumnData::Categorical {
                layout: $layout, ..
            } => $body,
            ColumnData::Object($layout) => $body,
        }
    };
}

/// Builds a `ColumnData` of the same variant from `$body`, evaluated with `$layout`
/// bound to the current layout. Categorical data keeps its dictionary.
macro_rules! transform_layout {
    ($data:expr, $layout:ident => $body:expr) => {
        match $data {
            ColumnData::Numeric($layout) => ColumnData::Numeric($body),
            ColumnData::Time($layout) => ColumnData::Time($body),
            ColumnData::DateTime($layout) => ColumnData::DateTime($body),
            ColumnData::Categorical {
                layout: $layout,
                dictionary,
            } => ColumnData::Categorical {
                layout: $body,
                dictionary: Arc::clone(dictionary),
            },
            ColumnData::Object($layout) => ColumnData::Object($body),
        }
    };
}

impl ColumnData {
    fn kind_name(&self) -> &'static str {
        match self {
            ColumnData::Numeric(_) => "numeric",
            ColumnData::Time(_) => "time",
            ColumnData::DateTime(_) => "date-time",
            ColumnData::Categorical { .. } => "categorical",
            ColumnData::Object(_) => "object",
        }
    }

    fn holds(&self, type_id: ColumnTypeId) -> bool {
        matches!(
            (self, type_id),
            (
                ColumnData::Numeric(_),
                ColumnTypeId::Real | ColumnTypeId::Integer
            ) | (ColumnData::Time(_), ColumnTypeId::Time)
                | (ColumnData::DateTime(_), ColumnTypeId::DateTime)
                | (ColumnData::Categorical { .. }, ColumnTypeId::Nominal)
                | (
                    ColumnData::Object(_),
                    ColumnTypeId::Text | ColumnTypeId::TextSet | ColumnTypeId::Custom
                )
        )
    }
}

/// An immutable, fixed-size sequence of values of one [`ColumnTypeId`].
///
/// Columns are cheap to clone: storage is shared. Every transform (`map`, `sort`,
/// `strip_data`, `with_dictionary`) returns a new column and leaves the receiver
/// untouched, so a column can be read from many threads at once.
///
/// Operations outside the type's [`Capabilities`] fail with an unsupported-operation
/// error before any storage is read.
#[derive(Debug, Clone)]
pub struct Column {
    type_id: ColumnTypeId,
    data: ColumnData,
}

impl Column {
    /// Wraps prepared storage, validating it against `type_id`.
    ///
    /// Categorical storage must use a packed format wide enough for the whole
    /// dictionary and must not reference indices past its end. Object storage may
    /// only hold values of the column type, and INTEGER storage only integral values
    /// (`NaN` and infinities included).
    pub fn new(type_id: ColumnTypeId, data: ColumnData) -> Result<Column> {
        if !data.holds(type_id) {
            return Err(Error::invalid_arg(
                "data",
                format!("{} storage cannot hold a {type_id} column", data.kind_name()),
            ));
        }
        match &data {
            ColumnData::Categorical { layout, dictionary } => {
                validate_categorical(layout, dictionary)?
            }
            ColumnData::Object(layout) => validate_objects(type_id, layout)?,
            ColumnData::Numeric(layout) if type_id == ColumnTypeId::Integer => {
                validate_integers(layout)?
            }
            _ => (),
        }
        Ok(Column { type_id, data })
    }

    pub fn real(values: Vec<f64>) -> Column {
        Column {
            type_id: ColumnTypeId::Real,
            data: ColumnData::Numeric(Layout::Dense(NumericBacking::new(values))),
        }
    }

    /// Creates an INTEGER column, rounding every finite value half away from zero.
    pub fn integer(mut values: Vec<f64>) -> Column {
        values.iter_mut().for_each(|value| *value = round_integer(*value));
        Column {
            type_id: ColumnTypeId::Integer,
            data: ColumnData::Numeric(Layout::Dense(NumericBacking::new(values))),
        }
    }

    /// Creates a TIME column from nanoseconds of day, [`TimeOfDay::MISSING_NANOS`]
    /// marking missing cells.
    pub fn time(nanos: Vec<i64>) -> Result<Column> {
        Ok(Column {
            type_id: ColumnTypeId::Time,
            data: ColumnData::Time(Layout::Dense(TimeBacking::new(nanos)?)),
        })
    }

    /// Creates a DATE_TIME column from epoch seconds and optional nanosecond parts.
    /// [`crate::value::Instant::MISSING_SECONDS`] marks missing cells.
    pub fn date_time(seconds: Vec<i64>, nanos: Option<Vec<u32>>) -> Result<Column> {
        Ok(Column {
            type_id: ColumnTypeId::DateTime,
            data: ColumnData::DateTime(Layout::Dense(DateTimeBacking::new(seconds, nanos)?)),
        })
    }

    /// Creates a NOMINAL column from packed indices into `dictionary`.
    ///
    /// Fails with a format-overflow error when the dictionary's largest index does
    /// not fit the packed format, and with an argument error when an index points
    /// past the dictionary.
    pub fn categorical(
        indices: PackedIndices,
        dictionary: Arc<CategoryDictionary>,
    ) -> Result<Column> {
        Column::new(
            ColumnTypeId::Nominal,
            ColumnData::Categorical {
                layout: Layout::Dense(indices),
                dictionary,
            },
        )
    }

    /// Creates a dense column of any type from logical values.
    ///
    /// NOMINAL columns get a dictionary of their distinct texts in order of first
    /// appearance.
    pub fn from_values(type_id: ColumnTypeId, values: Vec<Value>) -> Result<Column> {
        if let Some((row, value)) = values
            .iter()
            .enumerate()
            .find(|(_, value)| !type_id.accepts(value))
        {
            return Err(Error::invalid_arg(
                "values",
                format!(
                    "row {row} holds a {} value, not {type_id}",
                    value.kind_name()
                ),
            ));
        }
        let len = values.len();
        let data = match type_id {
            ColumnTypeId::Real => return Ok(Column::real(numbers(&values))),
            ColumnTypeId::Integer => return Ok(Column::integer(numbers(&values))),
            ColumnTypeId::Nominal => {
                let mut dictionary = CategoryDictionary::empty();
                let mut indices = Vec::with_capacity(len);
                for value in &values {
                    let index = match value {
                        Value::Text(text) => dictionary.intern(Arc::clone(text))?,
                        _ => 0,
                    };
                    indices.push(index);
                }
                let format = format_for_dictionary(dictionary.size())?;
                return Column::categorical(
                    PackedIndices::collect(format, len, indices.into_iter())?,
                    Arc::new(dictionary),
                );
            }
            ColumnTypeId::Time => {
                let nanos = values
                    .iter()
                    .map(|value| match value {
                        Value::Time(time) => time.nanos(),
                        _ => TimeOfDay::MISSING_NANOS,
                    })
                    .collect();
                ColumnData::Time(Layout::Dense(TimeBacking::new(nanos)?))
            }
            ColumnTypeId::DateTime => ColumnData::DateTime(Layout::Dense(
                DateTimeBacking::from_instants(
                    len,
                    values.iter().map(|value| match value {
                        Value::DateTime(instant) => Some(*instant),
                        _ => None,
                    }),
                ),
            )),
            ColumnTypeId::Text | ColumnTypeId::TextSet | ColumnTypeId::Custom => {
                ColumnData::Object(Layout::Dense(ObjectBacking::new(values)))
            }
        };
        Ok(Column { type_id, data })
    }

    #[inline]
    pub fn type_id(&self) -> ColumnTypeId {
        self.type_id
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.type_id.category()
    }

    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.type_id.capabilities()
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        with_layout!(&self.data, layout => layout.len())
    }

    /// Physical arrangement currently used by this column.
    pub fn layout(&self) -> LayoutKind {
        with_layout!(&self.data, layout => layout.kind())
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Dictionary of a NOMINAL column.
    pub fn dictionary(&self) -> Option<&Arc<CategoryDictionary>> {
        match &self.data {
            ColumnData::Categorical { dictionary, .. } => Some(dictionary),
            _ => None,
        }
    }

    /// Writes rows `start_row..` as numbers into `buffer`, returning the number of rows
    /// written.
    ///
    /// Missing values read as `NaN`. NOMINAL columns read their category index and
    /// TIME columns their nanosecond of day.
    pub fn fill_numeric(&self, buffer: &mut [f64], start_row: usize) -> Result<usize> {
        self.fill_numeric_strided(buffer, start_row, 0, 1)
    }

    /// Writes row `start_row + k` to `buffer[offset + k * step]`, stopping at the end of
    /// the column or of the buffer. Returns the number of rows written.
    pub fn fill_numeric_strided(
        &self,
        buffer: &mut [f64],
        start_row: usize,
        offset: usize,
        step: usize,
    ) -> Result<usize> {
        self.require(Capabilities::NUMERIC_READABLE, "fill_numeric")?;
        let count = self.check_fill(buffer.len(), start_row, offset, step)?;
        match &self.data {
            ColumnData::Numeric(layout) => {
                layout.fill_with(buffer, start_row, offset, step, |value| value)
            }
            ColumnData::Time(layout) => {
                layout.fill_with(buffer, start_row, offset, step, |nanos| {
                    if nanos == TimeOfDay::MISSING_NANOS {
                        f64::NAN
                    } else {
                        nanos as f64
                    }
                })
            }
            ColumnData::Categorical { layout, .. } => {
                layout.fill_with(buffer, start_row, offset, step, |index| {
                    if index == 0 { f64::NAN } else { index as f64 }
                })
            }
            ColumnData::DateTime(_) | ColumnData::Object(_) => {
                return Err(self.unsupported("fill_numeric"));
            }
        }
        Ok(count)
    }

    /// Writes rows `start_row..` as [`Value`]s into `buffer`, returning the number of
    /// rows written.
    pub fn fill_objects(&self, buffer: &mut [Value], start_row: usize) -> Result<usize> {
        self.fill_objects_strided(buffer, start_row, 0, 1)
    }

    /// Strided variant of [`Column::fill_objects`]; see
    /// [`Column::fill_numeric_strided`].
    pub fn fill_objects_strided(
        &self,
        buffer: &mut [Value],
        start_row: usize,
        offset: usize,
        step: usize,
    ) -> Result<usize> {
        self.require(Capabilities::OBJECT_READABLE, "fill_objects")?;
        let count = self.check_fill(buffer.len(), start_row, offset, step)?;
        match &self.data {
            ColumnData::Time(layout) => {
                layout.fill_with(buffer, start_row, offset, step, time_value)
            }
            ColumnData::DateTime(layout) => {
                layout.fill_with(buffer, start_row, offset, step, Value::from)
            }
            ColumnData::Categorical { layout, dictionary } => {
                layout.fill_with(buffer, start_row, offset, step, |index| {
                    category_value(dictionary, index)
                })
            }
            ColumnData::Object(layout) => {
                layout.fill_with(buffer, start_row, offset, step, |value| value)
            }
            ColumnData::Numeric(_) => return Err(self.unsupported("fill_objects")),
        }
        Ok(count)
    }

    /// Writes the raw category indices of rows `start_row..` into `buffer`; `0` is
    /// missing. Only NOMINAL columns support this.
    pub fn fill_indices(&self, buffer: &mut [u32], start_row: usize) -> Result<usize> {
        let ColumnData::Categorical { layout, .. } = &self.data else {
            return Err(self.unsupported("fill_indices"));
        };
        let count = self.check_fill(buffer.len(), start_row, 0, 1)?;
        layout.fill_with(buffer, start_row, 0, 1, |index| index);
        Ok(count)
    }

    /// The logical value at `row`.
    pub fn get(&self, row: usize) -> Result<Value> {
        if row >= self.size() {
            return Err(Error::out_of_bounds(row, self.size()));
        }
        Ok(match &self.data {
            ColumnData::Numeric(layout) => Value::from(layout.get(row)),
            ColumnData::Time(layout) => time_value(layout.get(row)),
            ColumnData::DateTime(layout) => Value::from(layout.get(row)),
            ColumnData::Categorical { layout, dictionary } => {
                category_value(dictionary, layout.get(row))
            }
            ColumnData::Object(layout) => layout.get(row),
        })
    }

    /// Derives the column whose row `i` holds this column's value at `mapping[i]`.
    ///
    /// Negative and out-of-range entries read as missing. `prefer_view` asks for a
    /// view sharing this column's storage instead of a copy; categorical and object
    /// columns always honour it, numeric columns only for mappings covering enough of
    /// the backing, and sparse columns never (they are re-derived sparse or dense).
    pub fn map(&self, mapping: &Mapping, prefer_view: bool) -> Result<Column> {
        let view = prefer_view && self.view_pays_off(mapping);
        let data = transform_layout!(&self.data, layout => layout.map(mapping, view)?);
        Ok(Column {
            type_id: self.type_id,
            data,
        })
    }

    /// Same as [`Column::map`], but views compose their mapping through `cache`:
    /// mapping a view with the same mapping array twice reuses the first composition.
    pub fn map_with_cache(
        &self,
        mapping: &Mapping,
        prefer_view: bool,
        cache: &mut MappingCache,
    ) -> Result<Column> {
        let view = prefer_view && self.view_pays_off(mapping);
        let data = transform_layout!(
            &self.data,
            layout => layout.map_with_cache(mapping, view, cache)?
        );
        Ok(Column {
            type_id: self.type_id,
            data,
        })
    }

    /// Returns the stable permutation ordering this column's values; missing values
    /// come last ascending and first descending. NOMINAL columns order by category
    /// text.
    pub fn sort(&self, order: Order) -> Result<Mapping> {
        self.require(Capabilities::SORTABLE, "sort")?;
        match &self.data {
            ColumnData::Numeric(layout) => sort_permutation(
                &layout.to_vec(),
                order,
                compare_numbers,
                |value| value.is_nan(),
            ),
            ColumnData::Time(layout) => sort_permutation(
                &layout.to_vec(),
                order,
                |a, b| a.cmp(b),
                |&nanos| nanos == TimeOfDay::MISSING_NANOS,
            ),
            ColumnData::DateTime(layout) => sort_permutation(
                &layout.to_vec(),
                order,
                |a, b| a.cmp(b),
                Option::is_none,
            ),
            ColumnData::Categorical { layout, dictionary } => sort_permutation(
                &layout.to_vec(),
                order,
                |&a, &b| dictionary.get(a).cmp(&dictionary.get(b)),
                |&index| index == 0,
            ),
            ColumnData::Object(layout) => sort_permutation(
                &layout.to_vec(),
                order,
                compare_values,
                Value::is_missing,
            ),
        }
    }

    /// An empty column of the same type. NOMINAL columns keep their dictionary.
    pub fn strip_data(&self) -> Result<Column> {
        let data = transform_layout!(&self.data, layout => layout.stripped()?);
        Ok(Column {
            type_id: self.type_id,
            data,
        })
    }

    /// Number of occurrences of every dictionary index, missing (`0`) included.
    pub fn category_usage(&self) -> Result<Vec<usize>> {
        let ColumnData::Categorical { layout, dictionary } = &self.data else {
            return Err(self.unsupported("category_usage"));
        };
        let mut usage = vec![0usize; dictionary.size()];
        match layout {
            Layout::Sparse(sparse) => {
                usage[*sparse.default_value() as usize] +=
                    sparse.len() - sparse.exception_count();
                for position in 0..sparse.exception_count() {
                    usage[sparse.exceptions().get(position) as usize] += 1;
                }
            }
            _ => {
                for index in layout.to_vec() {
                    usage[index as usize] += 1;
                }
            }
        }
        Ok(usage)
    }

    /// Rewrites a NOMINAL column against `dictionary`, translating every stored index
    /// through `translation` (as produced by [`CategoryDictionary::remap`],
    /// [`CategoryDictionary::merge`] or [`CategoryDictionary::compact`]).
    ///
    /// The indices are repacked in the narrowest format holding the new dictionary, so
    /// the format widens after a merge and narrows after a compaction.
    pub fn with_dictionary(
        &self,
        dictionary: Arc<CategoryDictionary>,
        translation: &IndexTranslation,
    ) -> Result<Column> {
        let ColumnData::Categorical {
            layout,
            dictionary: current,
        } = &self.data
        else {
            return Err(self.unsupported("with_dictionary"));
        };
        verify_arg!(translation, translation.len() >= current.size());
        verify_arg!(
            translation,
            (translation.max_target() as usize) < dictionary.size()
        );

        let format = format_for_dictionary(dictionary.size())?;
        let layout = layout.try_map_backing(
            |indices| indices.translate(translation.as_slice(), format),
            |&index| {
                translation.get(index).ok_or_else(|| {
                    Error::invalid_arg("translation", format!("no entry for index {index}"))
                })
            },
        )?;
        Column::new(
            self.type_id,
            ColumnData::Categorical { layout, dictionary },
        )
    }

    fn view_pays_off(&self, mapping: &Mapping) -> bool {
        match &self.data {
            ColumnData::Numeric(layout) => {
                mapping.len() * NUMERIC_VIEW_MIN_COVERAGE_DIVISOR >= layout.prototype().len()
            }
            _ => true,
        }
    }

    fn check_fill(
        &self,
        buffer_len: usize,
        start_row: usize,
        offset: usize,
        step: usize,
    ) -> Result<usize> {
        verify_arg!(step, step > 0);
        let size = self.size();
        if start_row > size {
            return Err(Error::out_of_bounds(start_row, size));
        }
        Ok(fill_count(size, start_row, buffer_len, offset, step))
    }

    fn require(&self, capability: Capabilities, operation: &str) -> Result<()> {
        if self.capabilities().contains(capability) {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::unsupported(operation, self.type_id.name())
    }
}

fn numbers(values: &[Value]) -> Vec<f64> {
    values
        .iter()
        .map(|value| value.as_number().unwrap_or(f64::NAN))
        .collect()
}

#[inline]
fn time_value(nanos: i64) -> Value {
    TimeOfDay::from_nanos(nanos).map_or(Value::Missing, Value::Time)
}

#[inline]
fn category_value(dictionary: &CategoryDictionary, index: u32) -> Value {
    dictionary
        .get(index)
        .map_or(Value::Missing, |text| Value::Text(Arc::clone(text)))
}

fn validate_categorical(
    layout: &Layout<PackedIndices>,
    dictionary: &CategoryDictionary,
) -> Result<()> {
    let format: PackedFormat = layout.prototype().format();
    let max_entry = dictionary.max_index();
    if !format.fits(max_entry) {
        return Err(Error::format_overflow(
            format.to_string(),
            max_entry as u64,
            format.max_value() as u64,
        ));
    }
    let max_index = match layout {
        Layout::Dense(indices) => indices.max_index(),
        Layout::Mapped(view) => view.backing().max_index(),
        Layout::Sparse(sparse) => sparse
            .exceptions()
            .max_index()
            .max(*sparse.default_value()),
    };
    if max_index > max_entry {
        return Err(Error::invalid_arg(
            "indices",
            format!(
                "category index {max_index} outside a dictionary of {} entries",
                dictionary.size()
            ),
        ));
    }
    Ok(())
}

fn validate_integers(layout: &Layout<NumericBacking>) -> Result<()> {
    let integral = |value: &&f64| !value.is_finite() || value.fract() == 0.0;
    let mut values = layout.prototype().as_slice().iter();
    let bad = match layout {
        Layout::Sparse(sparse) => std::iter::once(sparse.default_value())
            .chain(values)
            .find(|value| !integral(value)),
        _ => values.find(|value| !integral(value)),
    };
    match bad {
        Some(value) => Err(Error::invalid_arg(
            "data",
            format!("INTEGER column cannot hold {value}"),
        )),
        None => Ok(()),
    }
}

fn validate_objects(type_id: ColumnTypeId, layout: &Layout<ObjectBacking>) -> Result<()> {
    let mut values = layout.prototype().as_slice().iter();
    let bad = match layout {
        Layout::Sparse(sparse) => std::iter::once(sparse.default_value())
            .chain(values)
            .find(|value| !type_id.accepts(value)),
        _ => values.find(|value| !type_id.accepts(value)),
    };
    match bad {
        Some(value) => Err(Error::invalid_arg(
            "values",
            format!("a {type_id} column cannot hold a {} value", value.kind_name()),
        )),
        None => Ok(()),
    }
}
