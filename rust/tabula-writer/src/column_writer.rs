//! Typed writers accumulating the values of one column.

use std::sync::Arc;

use tabula_bits::{PackedBuffer, PackedFormat, PackedIndices};
use tabula_column::{
    CategoryDictionary, Column, ColumnData, ColumnTypeId, Instant, TimeOfDay, Value,
    backing::{Backing, DateTimeBacking, NumericBacking, ObjectBacking, TimeBacking},
    layout::{Layout, SparseStore},
    value::round_integer,
};
use tabula_common::{Result, error::Error};

use crate::{
    config::{FinalizeMode, SparsityConfig},
    sparsity::{Accumulator, Cell, Finished, SparsityState},
};

/// Accumulates the values of one column and turns them into an immutable [`Column`].
///
/// The writer variant follows the column type: NOMINAL columns build their own
/// dictionary, DATE_TIME columns pick their precision from the data, and TEXT,
/// TEXT_SET and CUSTOM columns buffer objects with no sparse encoding.
#[derive(Debug)]
pub enum ColumnWriter {
    Numeric(NumericWriter),
    Time(TimeWriter),
    DateTime(DateTimeWriter),
    Nominal(NominalWriter),
    Object(ObjectWriter),
}

impl ColumnWriter {
    pub fn new(
        type_id: ColumnTypeId,
        config: SparsityConfig,
        expected_rows: Option<usize>,
    ) -> ColumnWriter {
        match type_id {
            ColumnTypeId::Real | ColumnTypeId::Integer => ColumnWriter::Numeric(NumericWriter {
                type_id,
                values: Accumulator::new(config, expected_rows),
            }),
            ColumnTypeId::Time => ColumnWriter::Time(TimeWriter {
                values: Accumulator::new(config, expected_rows),
            }),
            ColumnTypeId::DateTime => ColumnWriter::DateTime(DateTimeWriter {
                values: Accumulator::new(config, expected_rows),
                high_precision: false,
            }),
            ColumnTypeId::Nominal => ColumnWriter::Nominal(NominalWriter {
                dictionary: CategoryDictionary::empty(),
                indices: Accumulator::new(config, expected_rows),
            }),
            ColumnTypeId::Text | ColumnTypeId::TextSet | ColumnTypeId::Custom => {
                ColumnWriter::Object(ObjectWriter {
                    type_id,
                    values: Vec::with_capacity(expected_rows.unwrap_or(0)),
                })
            }
        }
    }

    pub fn type_id(&self) -> ColumnTypeId {
        match self {
            ColumnWriter::Numeric(writer) => writer.type_id,
            ColumnWriter::Time(_) => ColumnTypeId::Time,
            ColumnWriter::DateTime(_) => ColumnTypeId::DateTime,
            ColumnWriter::Nominal(_) => ColumnTypeId::Nominal,
            ColumnWriter::Object(writer) => writer.type_id,
        }
    }

    /// Number of values written.
    pub fn len(&self) -> usize {
        match self {
            ColumnWriter::Numeric(writer) => writer.values.len(),
            ColumnWriter::Time(writer) => writer.values.len(),
            ColumnWriter::DateTime(writer) => writer.values.len(),
            ColumnWriter::Nominal(writer) => writer.indices.len(),
            ColumnWriter::Object(writer) => writer.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current storage strategy. Object writers are always dense.
    pub fn state(&self) -> SparsityState {
        match self {
            ColumnWriter::Numeric(writer) => writer.values.state(),
            ColumnWriter::Time(writer) => writer.values.state(),
            ColumnWriter::DateTime(writer) => writer.values.state(),
            ColumnWriter::Nominal(writer) => writer.indices.state(),
            ColumnWriter::Object(_) => SparsityState::Dense,
        }
    }

    /// Appends `value`, which must be missing or of the column's type.
    pub fn push(&mut self, value: Value) -> Result<()> {
        let type_id = self.type_id();
        if !type_id.accepts(&value) {
            return Err(Error::invalid_arg(
                "value",
                format!(
                    "a {type_id} column cannot hold a {} value",
                    value.kind_name()
                ),
            ));
        }
        match self {
            ColumnWriter::Numeric(writer) => writer.push(value),
            ColumnWriter::Time(writer) => writer.push(value),
            ColumnWriter::DateTime(writer) => writer.push(value),
            ColumnWriter::Nominal(writer) => writer.push(value),
            ColumnWriter::Object(writer) => {
                writer.values.push(value);
                Ok(())
            }
        }
    }

    /// Builds the column. `mode` forces or leaves open the layout; object columns
    /// are dense whatever the mode.
    pub fn finish(self, mode: FinalizeMode) -> Result<Column> {
        match self {
            ColumnWriter::Numeric(writer) => writer.finish(mode),
            ColumnWriter::Time(writer) => writer.finish(mode),
            ColumnWriter::DateTime(writer) => writer.finish(mode),
            ColumnWriter::Nominal(writer) => writer.finish(mode),
            ColumnWriter::Object(writer) => Column::new(
                writer.type_id,
                ColumnData::Object(Layout::Dense(ObjectBacking::new(writer.values))),
            ),
        }
    }
}

/// REAL and INTEGER values; INTEGER values are rounded on the way in.
#[derive(Debug)]
pub struct NumericWriter {
    type_id: ColumnTypeId,
    values: Accumulator<f64>,
}

impl NumericWriter {
    const VALUE_BYTES: f64 = 8.0;

    fn push(&mut self, value: Value) -> Result<()> {
        let number = match value {
            Value::Number(number) if self.type_id == ColumnTypeId::Integer => {
                round_integer(number)
            }
            Value::Number(number) => number,
            _ => f64::NAN,
        };
        self.values.push(number, Self::VALUE_BYTES)
    }

    fn finish(self, mode: FinalizeMode) -> Result<Column> {
        let finished = self.values.finish(mode, Self::VALUE_BYTES)?;
        let layout = build_layout(&NumericBacking::new(Vec::new()), finished, |values| {
            Ok(NumericBacking::new(values))
        })?;
        Column::new(self.type_id, ColumnData::Numeric(layout))
    }
}

/// Nanoseconds of day.
#[derive(Debug)]
pub struct TimeWriter {
    values: Accumulator<i64>,
}

impl TimeWriter {
    const VALUE_BYTES: f64 = 8.0;

    fn push(&mut self, value: Value) -> Result<()> {
        let nanos = match value {
            Value::Time(time) => time.nanos(),
            _ => TimeOfDay::MISSING_NANOS,
        };
        self.values.push(nanos, Self::VALUE_BYTES)
    }

    fn finish(self, mode: FinalizeMode) -> Result<Column> {
        let finished = self.values.finish(mode, Self::VALUE_BYTES)?;
        let layout = build_layout(&TimeBacking::new(Vec::new())?, finished, TimeBacking::new)?;
        Column::new(ColumnTypeId::Time, ColumnData::Time(layout))
    }
}

/// Instants stored as seconds plus, once any value needs them, nanoseconds.
#[derive(Debug)]
pub struct DateTimeWriter {
    values: Accumulator<Option<Instant>>,
    high_precision: bool,
}

impl DateTimeWriter {
    fn value_bytes(&self) -> f64 {
        if self.high_precision { 12.0 } else { 8.0 }
    }

    fn push(&mut self, value: Value) -> Result<()> {
        let instant = match value {
            Value::DateTime(instant) => Some(instant),
            _ => None,
        };
        self.high_precision |= instant.is_some_and(|instant| instant.nanos() != 0);
        let value_bytes = self.value_bytes();
        self.values.push(instant, value_bytes)
    }

    fn finish(self, mode: FinalizeMode) -> Result<Column> {
        let value_bytes = self.value_bytes();
        let finished = self.values.finish(mode, value_bytes)?;
        let prototype = DateTimeBacking::from_instants(0, std::iter::empty());
        let layout = build_layout(&prototype, finished, |values| {
            Ok(DateTimeBacking::from_instants(values.len(), values.into_iter()))
        })?;
        Column::new(ColumnTypeId::DateTime, ColumnData::DateTime(layout))
    }
}

/// Category indices into a dictionary grown in order of first appearance. Dense
/// indices are buffered packed, in the narrowest format the dictionary allows.
#[derive(Debug)]
pub struct NominalWriter {
    dictionary: CategoryDictionary,
    indices: Accumulator<u32>,
}

impl NominalWriter {
    /// Dictionary size so far, the missing entry included.
    pub fn dictionary_size(&self) -> usize {
        self.dictionary.size()
    }

    /// Packed format the current dictionary needs.
    pub fn format(&self) -> Result<PackedFormat> {
        PackedFormat::for_dictionary_size(self.dictionary.size()).ok_or_else(|| {
            Error::format_overflow(
                PackedFormat::I32.to_string(),
                self.dictionary.max_index() as u64,
                PackedFormat::I32.max_value() as u64,
            )
        })
    }

    fn push(&mut self, value: Value) -> Result<()> {
        let index = match value {
            Value::Text(text) => self.dictionary.intern(text)?,
            _ => 0,
        };
        let value_bytes = self.format()?.value_bytes();
        self.indices.push(index, value_bytes)
    }

    fn finish(self, mode: FinalizeMode) -> Result<Column> {
        let format = self.format()?;
        let finished = self.indices.finish(mode, format.value_bytes())?;
        let layout = build_layout(
            &PackedIndices::empty(format),
            finished,
            |mut buffer: PackedBuffer| {
                buffer.widen(format)?;
                Ok(buffer.freeze())
            },
        )?;
        let dictionary = Arc::new(self.dictionary);
        Column::new(
            ColumnTypeId::Nominal,
            ColumnData::Categorical { layout, dictionary },
        )
    }
}

/// Boxed values of the object types.
#[derive(Debug)]
pub struct ObjectWriter {
    type_id: ColumnTypeId,
    values: Vec<Value>,
}

/// Turns finished values into a layout: dense buffers through `dense`, sparse
/// exceptions through `prototype`.
fn build_layout<V, B>(
    prototype: &B,
    finished: Finished<V>,
    dense: impl FnOnce(V::Buffer) -> Result<B>,
) -> Result<Layout<B>>
where
    V: Cell,
    B: Backing<Value = V>,
{
    match finished {
        Finished::Dense(values) => Ok(Layout::Dense(dense(values)?)),
        Finished::Sparse {
            default,
            len,
            positions,
            values,
        } => {
            let exceptions = prototype.collect(values.len(), values.into_iter())?;
            Ok(Layout::Sparse(SparseStore::new(
                default, len, positions, exceptions,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_column::LayoutKind;

    fn write(type_id: ColumnTypeId, values: &[Value]) -> ColumnWriter {
        let config = SparsityConfig::default().with_check_rows(16);
        let mut writer = ColumnWriter::new(type_id, config, None);
        for value in values {
            writer.push(value.clone()).unwrap();
        }
        writer
    }

    #[test]
    fn test_rejects_wrong_type() {
        let mut writer = ColumnWriter::new(ColumnTypeId::Time, SparsityConfig::default(), None);
        assert!(writer.push(Value::text("noon")).unwrap_err().is_invalid_arg());
        assert!(writer.push(Value::Missing).is_ok());
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_integer_writer_rounds() {
        let writer = write(
            ColumnTypeId::Integer,
            &[Value::from(2.5), Value::Missing, Value::from(-0.4)],
        );
        let column = writer.finish(FinalizeMode::Dense).unwrap();
        let mut buffer = [0.0; 3];
        column.fill_numeric(&mut buffer, 0).unwrap();
        assert_eq!(buffer[0], 3.0);
        assert!(buffer[1].is_nan());
        assert_eq!(buffer[2], 0.0);
    }

    #[test]
    fn test_date_time_precision_follows_data() {
        let seconds: Vec<Value> = (0..4)
            .map(|i| Value::from(Instant::from_seconds(i * 60).unwrap()))
            .collect();
        let column = write(ColumnTypeId::DateTime, &seconds)
            .finish(FinalizeMode::Dense)
            .unwrap();
        let ColumnData::DateTime(Layout::Dense(backing)) = column.data() else {
            panic!("expected dense date-times");
        };
        assert!(!backing.is_high_precision());

        let mut precise = seconds.clone();
        precise.push(Value::from(Instant::new(5, 250).unwrap()));
        let column = write(ColumnTypeId::DateTime, &precise)
            .finish(FinalizeMode::Dense)
            .unwrap();
        let ColumnData::DateTime(Layout::Dense(backing)) = column.data() else {
            panic!("expected dense date-times");
        };
        assert!(backing.is_high_precision());
        assert_eq!(column.get(4).unwrap(), precise[4]);
    }

    #[test]
    fn test_object_writer_never_sparse() {
        let values = vec![Value::text("same"); 200];
        let writer = write(ColumnTypeId::Text, &values);
        assert_eq!(writer.state(), SparsityState::Dense);
        let column = writer.finish(FinalizeMode::Sparse).unwrap();
        assert_eq!(column.layout(), LayoutKind::Dense);
        assert_eq!(column.size(), 200);
    }

    #[test]
    fn test_nominal_writer_dictionary() {
        let values: Vec<Value> = ["b", "a", "b", "c"].into_iter().map(Value::from).collect();
        let mut writer = write(ColumnTypeId::Nominal, &values);
        writer.push(Value::Missing).unwrap();
        if let ColumnWriter::Nominal(nominal) = &writer {
            assert_eq!(nominal.dictionary_size(), 4);
        }
        let column = writer.finish(FinalizeMode::Auto).unwrap();
        let dictionary = column.dictionary().unwrap();
        assert_eq!(dictionary.get(1).map(|text| &**text), Some("b"));
        assert_eq!(dictionary.get(3).map(|text| &**text), Some("c"));
        assert_eq!(column.get(4).unwrap(), Value::Missing);
    }

    #[test]
    fn test_nominal_writer_packs_indices() {
        let values: Vec<Value> = (0..40).map(|i| Value::text(format!("c{}", i % 20))).collect();
        let mut writer = write(ColumnTypeId::Nominal, &values);
        if let ColumnWriter::Nominal(nominal) = &writer {
            assert_eq!(nominal.format().unwrap(), PackedFormat::U8);
        }
        writer.push(Value::Missing).unwrap();
        assert_eq!(writer.state(), SparsityState::Dense);

        let column = writer.finish(FinalizeMode::Dense).unwrap();
        let ColumnData::Categorical {
            layout: Layout::Dense(indices),
            dictionary,
        } = column.data()
        else {
            panic!("expected dense categories");
        };
        assert_eq!(indices.format(), PackedFormat::U8);
        assert_eq!(dictionary.size(), 21);
        assert_eq!(indices.get(25), 6);
        assert_eq!(indices.get(40), 0);
        assert_eq!(column.get(39).unwrap(), Value::text("c19"));
    }
}
