use std::{cmp::Ordering, sync::Arc};

use tabula_bits::{PackedFormat, PackedIndices};
use tabula_column::{
    Column, ColumnData, ColumnTypeId, Dictionary, Instant, LayoutKind, Mapping, MappingCache,
    Order, TextSet, TimeOfDay, Value,
    layout::{Layout, SparseStore},
};

fn values(column: &Column) -> Vec<Value> {
    (0..column.size()).map(|row| column.get(row).unwrap()).collect()
}

fn dictionary(texts: &[&str]) -> Arc<Dictionary<Arc<str>>> {
    Arc::new(Dictionary::new(texts.iter().map(|&text| Arc::from(text)).collect()).unwrap())
}

fn sample_indices(len: usize) -> Vec<u32> {
    fastrand::seed(4417);
    (0..len)
        .map(|_| {
            if fastrand::u8(0..10) < 8 {
                1
            } else {
                fastrand::u32(0..4)
            }
        })
        .collect()
}

fn dense_and_sparse_nominal(len: usize) -> (Column, Column) {
    let dictionary = dictionary(&["x", "y", "z"]);
    let indices = sample_indices(len);
    let dense = Column::categorical(
        PackedIndices::from_values(PackedFormat::U2, &indices).unwrap(),
        dictionary.clone(),
    )
    .unwrap();
    let store = SparseStore::from_values(
        &PackedIndices::empty(PackedFormat::U2),
        1,
        len,
        indices.iter().copied(),
    )
    .unwrap();
    let sparse = Column::new(
        ColumnTypeId::Nominal,
        ColumnData::Categorical {
            layout: Layout::Sparse(store),
            dictionary,
        },
    )
    .unwrap();
    (dense, sparse)
}

fn sample_mappings(source_len: usize) -> Vec<Mapping> {
    fastrand::seed(120_559);
    let n = source_len as i32;
    vec![
        Mapping::new(vec![]),
        Mapping::new(vec![3; 17]),
        Mapping::new((0..n).rev().collect()),
        Mapping::new((-3..n + 5).collect()),
        Mapping::new(vec![-1, -7, 0, -1]),
        Mapping::new((0..2 * n).map(|_| fastrand::i32(-2..n + 2)).collect()),
    ]
}

fn all_columns() -> Vec<Column> {
    let (dense, sparse) = dense_and_sparse_nominal(120);
    let real = Column::real(
        (0..120)
            .map(|i| if i % 7 == 0 { f64::NAN } else { i as f64 })
            .collect(),
    );
    let texts = Column::from_values(
        ColumnTypeId::Text,
        (0..120)
            .map(|i| if i % 5 == 0 { Value::Missing } else { Value::text(format!("t{}", i % 9)) })
            .collect(),
    )
    .unwrap();
    let times = Column::from_values(
        ColumnTypeId::Time,
        (0..120)
            .map(|i| Value::from(TimeOfDay::from_hms(i % 24, 0, 0).ok()))
            .collect(),
    )
    .unwrap();
    let view = real.map(&Mapping::new((0..120).rev().collect()), true).unwrap();
    assert_eq!(view.layout(), LayoutKind::Mapped);
    vec![dense, sparse, real, texts, times, view]
}

#[test]
fn test_round_trip() {
    let input = vec![
        Value::from(Instant::new(1_700_000_000, 5).unwrap()),
        Value::Missing,
        Value::from(Instant::from_seconds(-86_400).unwrap()),
    ];
    let column = Column::from_values(ColumnTypeId::DateTime, input.clone()).unwrap();
    let mut buffer = vec![Value::Missing; 3];
    assert_eq!(column.fill_objects(&mut buffer, 0).unwrap(), 3);
    assert_eq!(buffer, input);

    let sets = vec![Value::from(TextSet::new(["a", "b"])), Value::Missing];
    let column = Column::from_values(ColumnTypeId::TextSet, sets.clone()).unwrap();
    assert_eq!(values(&column), sets);

    for column in all_columns() {
        let identity = column.map(&Mapping::identity(column.size()).unwrap(), false).unwrap();
        assert_eq!(values(&identity), values(&column));
    }
}

#[test]
fn test_mapping_composition() {
    for column in all_columns() {
        for first in sample_mappings(column.size()) {
            for second in sample_mappings(first.len()) {
                for prefer_view in [false, true] {
                    let chained = column
                        .map(&first, prefer_view)
                        .unwrap()
                        .map(&second, prefer_view)
                        .unwrap();
                    let direct = column.map(&first.compose(&second), prefer_view).unwrap();
                    assert_eq!(chained.size(), second.len());
                    assert_eq!(values(&chained), values(&direct), "{:?}", column.type_id());
                }
            }
        }
    }
}

#[test]
fn test_cache_identity_reuse() {
    let column = Column::from_values(
        ColumnTypeId::Text,
        (0..50).map(|i| Value::text(i.to_string())).collect(),
    )
    .unwrap()
    .map(&Mapping::new((0..50).rev().collect()), true)
    .unwrap();

    let mut cache = MappingCache::new();
    let mapping = Mapping::new(vec![0, 49, 7, -1, 60]);
    let first = column.map_with_cache(&mapping, true, &mut cache).unwrap();
    assert_eq!(cache.len(), 1);
    let second = column.map_with_cache(&mapping, true, &mut cache).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.hits(), 1);
    assert_eq!(values(&first), values(&second));
    assert_eq!(first.get(0).unwrap(), Value::text("49"));
    assert_eq!(first.get(3).unwrap(), Value::Missing);

    // Equal contents in a different array are a different key.
    let copy = Mapping::new(mapping.to_vec());
    let third = column.map_with_cache(&copy, true, &mut cache).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(values(&third), values(&first));

    // Caching never changes what plain mapping returns.
    assert_eq!(values(&column.map(&mapping, true).unwrap()), values(&first));
}

#[test]
fn test_sparse_dense_equivalence() {
    let (dense, sparse) = dense_and_sparse_nominal(500);
    assert_eq!(sparse.layout(), LayoutKind::Sparse);
    assert_eq!(values(&dense), values(&sparse));

    let mut from_dense = vec![0u32; 500];
    let mut from_sparse = vec![7u32; 500];
    dense.fill_indices(&mut from_dense, 0).unwrap();
    sparse.fill_indices(&mut from_sparse, 0).unwrap();
    assert_eq!(from_dense, from_sparse);

    assert_eq!(
        dense.category_usage().unwrap(),
        sparse.category_usage().unwrap()
    );
    assert_eq!(
        dense.sort(Order::Descending).unwrap(),
        sparse.sort(Order::Descending).unwrap()
    );
}

#[test]
fn test_index_zero_reads_missing() {
    let (dense, sparse) = dense_and_sparse_nominal(300);
    let view = dense.map(&Mapping::identity(300).unwrap(), true).unwrap();
    for column in [dense, sparse, view] {
        let mut indices = vec![0u32; 300];
        column.fill_indices(&mut indices, 0).unwrap();
        for (row, index) in indices.into_iter().enumerate() {
            let value = column.get(row).unwrap();
            assert_eq!(index == 0, value.is_missing());
        }
        assert!(column.dictionary().unwrap().get(0).is_none());
    }
}

#[test]
fn test_strided_fill_interleaves_columns() {
    let left = Column::real(vec![1.0, 2.0, 3.0]);
    let (dense, _) = dense_and_sparse_nominal(3);
    let right = dense.map(&Mapping::new(vec![2, -1, 0]), true).unwrap();

    let mut rows = vec![0.0; 6];
    assert_eq!(left.fill_numeric_strided(&mut rows, 0, 0, 2).unwrap(), 3);
    assert_eq!(right.fill_numeric_strided(&mut rows, 0, 1, 2).unwrap(), 3);

    let indices = sample_indices(3);
    let expect = |index: u32| if index == 0 { f64::NAN } else { index as f64 };
    let expected = [1.0, expect(indices[2]), 2.0, f64::NAN, 3.0, expect(indices[0])];
    for (actual, expected) in rows.iter().zip(expected) {
        assert!(actual == &expected || (actual.is_nan() && expected.is_nan()));
    }

    // A buffer too short for every row stops at its end.
    let mut short = vec![0.0; 4];
    assert_eq!(left.fill_numeric_strided(&mut short, 1, 1, 2).unwrap(), 2);
    assert_eq!(short, [0.0, 2.0, 0.0, 3.0]);
}

#[test]
fn test_with_dictionary_merge_and_compact() {
    let column = Column::from_values(
        ColumnTypeId::Nominal,
        ["a", "b", "a", "c"].into_iter().map(Value::from).collect(),
    )
    .unwrap();
    let current = column.dictionary().unwrap().clone();

    let other = dictionary(&["z", "c", "y", "x", "w", "v", "u", "t", "s", "r", "q", "p"]);
    let (merged, translation) = other.merge(&current);
    let merged = Arc::new(merged);
    let rewritten = column.with_dictionary(merged.clone(), &translation).unwrap();
    assert_eq!(values(&rewritten), values(&column));
    assert_eq!(rewritten.dictionary().unwrap().size(), 15);
    match rewritten.data() {
        ColumnData::Categorical {
            layout: Layout::Dense(indices),
            ..
        } => assert_eq!(indices.format(), PackedFormat::U4),
        other => panic!("unexpected storage {other:?}"),
    }

    let usage = rewritten.category_usage().unwrap();
    let (compacted, translation) = merged.compact(&usage).unwrap();
    assert_eq!(compacted.size(), 4);
    let compacted = rewritten.with_dictionary(compacted, &translation).unwrap();
    assert_eq!(values(&compacted), values(&column));
    match compacted.data() {
        ColumnData::Categorical {
            layout: Layout::Dense(indices),
            ..
        } => assert_eq!(indices.format(), PackedFormat::U2),
        other => panic!("unexpected storage {other:?}"),
    }

    let usage = compacted.category_usage().unwrap();
    let dictionary = compacted.dictionary().unwrap().clone();
    let (same, _) = dictionary.compact(&usage).unwrap();
    assert!(Arc::ptr_eq(&same, &dictionary));
}

#[test]
fn test_remapped_dictionary_keeps_values() {
    let (dense, sparse) = dense_and_sparse_nominal(200);
    let current = dense.dictionary().unwrap();
    let (remapped, translation) = current.remap(&[0, 3, 1, 2]).unwrap();
    assert_eq!(remapped.get(3).map(|text| &**text), Some("x"));
    let remapped = Arc::new(remapped);

    for column in [dense, sparse] {
        let rewritten = column.with_dictionary(remapped.clone(), &translation).unwrap();
        assert_eq!(rewritten.layout(), column.layout());
        assert_eq!(values(&rewritten), values(&column));
        assert!(Arc::ptr_eq(rewritten.dictionary().unwrap(), &remapped));
        if let ColumnData::Categorical {
            layout: Layout::Sparse(store),
            ..
        } = rewritten.data()
        {
            assert_eq!(*store.default_value(), 3);
        }
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Time(a), Value::Time(b)) => a.nanos().cmp(&b.nanos()),
        (Value::DateTime(a), Value::DateTime(b)) => {
            (a.seconds(), a.nanos()).cmp(&(b.seconds(), b.nanos()))
        }
        other => panic!("values of different kinds {other:?}"),
    }
}

#[test]
fn test_sorted_mapping_orders_values() {
    fastrand::seed(77_023);
    let date_times = Column::from_values(
        ColumnTypeId::DateTime,
        (0..150)
            .map(|_| match fastrand::u8(0..6) {
                0 => Value::Missing,
                _ => Value::from(
                    Instant::new(fastrand::i64(0..20), fastrand::u32(0..3) * 1000).unwrap(),
                ),
            })
            .collect(),
    )
    .unwrap();

    let mut columns = all_columns();
    columns.push(date_times);
    for column in columns {
        for order in [Order::Ascending, Order::Descending] {
            let permutation = column.sort(order).unwrap();
            let sorted = values(&column.map(&permutation, false).unwrap());
            assert_eq!(sorted.len(), column.size());

            let missing = sorted.iter().filter(|value| value.is_missing()).count();
            let (first_missing, last_missing) = match order {
                Order::Ascending => (column.size() - missing, column.size()),
                Order::Descending => (0, missing),
            };
            for (row, value) in sorted.iter().enumerate() {
                let in_missing_block = (first_missing..last_missing).contains(&row);
                assert_eq!(value.is_missing(), in_missing_block, "{}", column.type_id());
            }

            let rows = permutation.as_slice();
            for row in 1..sorted.len() {
                let (previous, current) = (&sorted[row - 1], &sorted[row]);
                let ordering = match (previous.is_missing(), current.is_missing()) {
                    (true, true) => Ordering::Equal,
                    (false, false) => compare(previous, current),
                    _ => continue,
                };
                match (order, ordering) {
                    (_, Ordering::Equal) => assert!(rows[row - 1] < rows[row], "unstable tie"),
                    (Order::Ascending, ordering) => assert_eq!(ordering, Ordering::Less),
                    (Order::Descending, ordering) => assert_eq!(ordering, Ordering::Greater),
                }
            }
        }
    }
}
