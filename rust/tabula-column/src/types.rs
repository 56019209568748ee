use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnTypeId {
    Real,
    Integer,
    Nominal,
    Time,
    DateTime,
    Text,
    TextSet,
    Custom,
}

/// Coarse storage category of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Numeric,
    Categorical,
    Object,
}

bitflags! {
    /// Read and transform operations a column supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const NUMERIC_READABLE = 1;
        const OBJECT_READABLE = 2;
        const SORTABLE = 4;
    }
}

impl ColumnTypeId {
    pub fn category(self) -> Category {
        match self {
            ColumnTypeId::Real | ColumnTypeId::Integer => Category::Numeric,
            ColumnTypeId::Nominal => Category::Categorical,
            ColumnTypeId::Time
            | ColumnTypeId::DateTime
            | ColumnTypeId::Text
            | ColumnTypeId::TextSet
            | ColumnTypeId::Custom => Category::Object,
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            ColumnTypeId::Real | ColumnTypeId::Integer => {
                Capabilities::NUMERIC_READABLE | Capabilities::SORTABLE
            }
            ColumnTypeId::Nominal | ColumnTypeId::Time => {
                Capabilities::NUMERIC_READABLE
                    | Capabilities::OBJECT_READABLE
                    | Capabilities::SORTABLE
            }
            ColumnTypeId::DateTime | ColumnTypeId::Text => {
                Capabilities::OBJECT_READABLE | Capabilities::SORTABLE
            }
            ColumnTypeId::TextSet | ColumnTypeId::Custom => Capabilities::OBJECT_READABLE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnTypeId::Real => "REAL",
            ColumnTypeId::Integer => "INTEGER",
            ColumnTypeId::Nominal => "NOMINAL",
            ColumnTypeId::Time => "TIME",
            ColumnTypeId::DateTime => "DATE_TIME",
            ColumnTypeId::Text => "TEXT",
            ColumnTypeId::TextSet => "TEXT_SET",
            ColumnTypeId::Custom => "CUSTOM",
        }
    }
}

impl std::fmt::Display for ColumnTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Ascending,
    Descending,
}

/// Physical arrangement of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Logical position `i` is physical position `i`.
    Dense,
    /// A mapping array over a shared backing store.
    Mapped,
    /// A default value plus an exception list.
    Sparse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(ColumnTypeId::Integer.category(), Category::Numeric);
        assert_eq!(ColumnTypeId::Nominal.category(), Category::Categorical);
        assert_eq!(ColumnTypeId::DateTime.category(), Category::Object);
    }

    #[test]
    fn test_capabilities() {
        assert!(
            ColumnTypeId::Real
                .capabilities()
                .contains(Capabilities::SORTABLE)
        );
        assert!(
            !ColumnTypeId::Real
                .capabilities()
                .contains(Capabilities::OBJECT_READABLE)
        );
        assert!(
            !ColumnTypeId::TextSet
                .capabilities()
                .contains(Capabilities::SORTABLE)
        );
        assert!(
            !ColumnTypeId::DateTime
                .capabilities()
                .contains(Capabilities::NUMERIC_READABLE)
        );
    }
}
