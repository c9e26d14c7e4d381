use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{numeric_result, Arguments, Arity, Function, FunctionTable};
use crate::types::DataType;
use crate::value::{FieldValue, TypedValue, Value};
use crate::{EvalResult, NumericError};

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
pub enum AggregateKind {
    Min,
    Max,
    Sum,
    Avg,
    Median,
    Product,
    Count,
}

/// What an aggregate does when every entry is missing.
///
/// `count` is unaffected; it yields 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllMissing {
    ReturnMissing,
    RaiseInvalid,
}

/// Variadic aggregate that skips missing entries.
#[derive(Debug, Clone, Copy)]
pub struct AggregateFunction {
    kind: AggregateKind,
    on_all_missing: AllMissing,
}

impl AggregateFunction {
    pub fn new(kind: AggregateKind, on_all_missing: AllMissing) -> Self {
        Self {
            kind,
            on_all_missing,
        }
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    /// Aggregates `values`, reporting type errors against `function`.
    pub fn aggregate(&self, function: &str, values: &[FieldValue]) -> EvalResult<FieldValue> {
        let arguments = Arguments::new(function, values);
        let mut present: Vec<(&TypedValue, f64)> = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            if let Some(typed) = value.as_typed() {
                arguments.check_numeric(index, typed)?;
                present.push((typed, typed.as_f64()?));
            }
        }

        if self.kind == AggregateKind::Count {
            return Ok(FieldValue::integer(present.len() as i64));
        }
        if present.is_empty() {
            return match self.on_all_missing {
                AllMissing::ReturnMissing => Ok(FieldValue::Missing),
                AllMissing::RaiseInvalid => Err(NumericError::InvalidResult {
                    operation: function.to_string(),
                    message: "all entries are missing".to_string(),
                }
                .into()),
            };
        }

        let data_type = present
            .iter()
            .map(|(typed, _)| typed.data_type())
            .reduce(|left, right| left.promote(right).unwrap_or(DataType::Double))
            .and_then(DataType::numeric_type)
            .unwrap_or(DataType::Double);
        let numbers = present.iter().map(|(_, number)| *number);

        Ok(match self.kind {
            AggregateKind::Min | AggregateKind::Max => {
                let wanted = if self.kind == AggregateKind::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best = present[0];
                for candidate in &present[1..] {
                    if candidate.1.total_cmp(&best.1) == wanted {
                        best = *candidate;
                    }
                }
                FieldValue::Present(best.0.clone())
            }
            AggregateKind::Sum | AggregateKind::Product if data_type == DataType::Integer => {
                self.integer(function, &present)?
            }
            AggregateKind::Sum => numeric_result(data_type, numbers.sum()),
            AggregateKind::Product => numeric_result(data_type, numbers.product()),
            AggregateKind::Avg => {
                numeric_result(data_type, numbers.sum::<f64>() / present.len() as f64)
            }
            AggregateKind::Median => {
                let mut sorted: Vec<f64> = numbers.collect();
                sorted.sort_by(f64::total_cmp);
                let middle = sorted.len() / 2;
                let median = if sorted.len() % 2 == 0 {
                    (sorted[middle - 1] + sorted[middle]) / 2.0
                } else {
                    sorted[middle]
                };
                numeric_result(data_type, median)
            }
            AggregateKind::Count => FieldValue::integer(present.len() as i64),
        })
    }

    fn integer(&self, function: &str, present: &[(&TypedValue, f64)]) -> EvalResult<FieldValue> {
        let mut accumulator: i64 = if self.kind == AggregateKind::Sum { 0 } else { 1 };
        for (typed, number) in present {
            let value = match typed.parsed() {
                Value::Integer(i) => *i,
                _ => *number as i64,
            };
            let next = if self.kind == AggregateKind::Sum {
                accumulator.checked_add(value)
            } else {
                accumulator.checked_mul(value)
            };
            accumulator = next.ok_or_else(|| NumericError::InvalidResult {
                operation: function.to_string(),
                message: "integer overflow".to_string(),
            })?;
        }
        Ok(FieldValue::integer(accumulator))
    }
}

impl Function for AggregateFunction {
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn missing_tolerant(&self) -> bool {
        true
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        self.aggregate(arguments.function(), arguments.values())
    }
}

pub(super) fn register(table: &mut FunctionTable) {
    use strum::IntoEnumIterator;

    for kind in AggregateKind::iter() {
        let name: &'static str = match kind {
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Sum => "sum",
            AggregateKind::Avg => "avg",
            AggregateKind::Median => "median",
            AggregateKind::Product => "product",
            AggregateKind::Count => "count",
        };
        table.insert(
            name,
            Arc::new(AggregateFunction::new(kind, AllMissing::ReturnMissing)),
        );
    }
}
