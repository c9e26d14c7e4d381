//! Data types, operational types and the promotion lattice used when two
//! typed values meet in a comparison or an arithmetic operation.

use serde::{Deserialize, Serialize};

/// Declared storage type of a field or expression result.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum DataType {
    Integer,
    Float,
    Double,
    Boolean,
    String,
    Date,
    Time,
    DateTime,
    DateDaysSince1970,
    TimeSeconds,
    DateTimeSecondsSince1970,
}

/// How a value takes part in a model.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum OpType {
    #[default]
    Continuous,
    Categorical,
    Ordinal,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        self.numeric_rank().is_some()
    }

    /// Position in the `integer < float < double` chain. Day and second
    /// counts are integers.
    fn numeric_rank(self) -> Option<u8> {
        match self {
            DataType::Integer
            | DataType::DateDaysSince1970
            | DataType::TimeSeconds
            | DataType::DateTimeSecondsSince1970 => Some(0),
            DataType::Float => Some(1),
            DataType::Double => Some(2),
            _ => None,
        }
    }

    /// The arithmetic type a numeric value computes in.
    pub fn numeric_type(self) -> Option<DataType> {
        match self.numeric_rank()? {
            0 => Some(DataType::Integer),
            1 => Some(DataType::Float),
            _ => Some(DataType::Double),
        }
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            DataType::Date
                | DataType::Time
                | DataType::DateTime
                | DataType::DateDaysSince1970
                | DataType::TimeSeconds
                | DataType::DateTimeSecondsSince1970
        )
    }

    /// The type two operands are brought to before they are compared.
    ///
    /// Numeric types widen along `integer < float < double`; two distinct
    /// integer-valued types meet as `integer`. A string meets
    /// any other type on that type's terms: the string operand is parsed.
    /// Returns `None` for pairs with no common type.
    pub fn promote(self, other: DataType) -> Option<DataType> {
        if self == other {
            return Some(self);
        }
        match (self.numeric_rank(), other.numeric_rank()) {
            (Some(left), Some(right)) if left == right => self.numeric_type(),
            (Some(left), Some(right)) => Some(if left > right { self } else { other }),
            _ => match (self, other) {
                (DataType::String, other) | (other, DataType::String) => Some(other),
                _ => None,
            },
        }
    }

    /// Default operational type for a data type.
    pub fn default_op_type(self) -> OpType {
        match self {
            DataType::String | DataType::Boolean => OpType::Categorical,
            _ => OpType::Continuous,
        }
    }
}
