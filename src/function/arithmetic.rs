use std::sync::Arc;

use strum_macros::IntoStaticStr;

use super::{numeric_result, Arguments, Arity, Function, FunctionTable};
use crate::types::DataType;
use crate::value::{FieldValue, Value};
use crate::{EvalResult, NumericError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter, IntoStaticStr)]
pub enum ArithmeticOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
}

/// Binary `+ - * /`.
///
/// A missing operand makes the result missing. Integer operands stay
/// integers except under division, which always yields a floating result.
#[derive(Debug, Clone, Copy)]
pub struct ArithmeticFunction {
    operator: ArithmeticOperator,
}

impl ArithmeticFunction {
    pub fn new(operator: ArithmeticOperator) -> Self {
        Self { operator }
    }

    fn integer(&self, left: i64, right: i64) -> EvalResult<FieldValue> {
        let checked: fn(i64, i64) -> Option<i64> = match self.operator {
            ArithmeticOperator::Add => i64::checked_add,
            ArithmeticOperator::Subtract => i64::checked_sub,
            _ => i64::checked_mul,
        };
        checked(left, right).map(FieldValue::integer).ok_or_else(|| {
            NumericError::InvalidResult {
                operation: format!("{} {} {}", left, self.operator, right),
                message: "integer overflow".to_string(),
            }
            .into()
        })
    }

    fn divide(&self, data_type: DataType, dividend_type: DataType, left: f64, right: f64) -> EvalResult<FieldValue> {
        let operation = || format!("{} / {}", left, right);
        if right == 0.0 {
            if dividend_type.numeric_type() == Some(DataType::Integer) {
                return Err(NumericError::UndefinedResult {
                    operation: operation(),
                }
                .into());
            }
            if left == 0.0 || left.is_nan() {
                return Err(NumericError::NaNResult {
                    operation: operation(),
                }
                .into());
            }
        }
        Ok(match data_type {
            DataType::Float => FieldValue::float(left as f32 / right as f32),
            _ => FieldValue::double(left / right),
        })
    }
}

impl Function for ArithmeticFunction {
    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn missing_tolerant(&self) -> bool {
        true
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let (Some(left), Some(right)) = (arguments.optional(0), arguments.optional(1)) else {
            return Ok(FieldValue::Missing);
        };
        arguments.check_numeric(0, left)?;
        arguments.check_numeric(1, right)?;

        let data_type = left
            .data_type()
            .promote(right.data_type())
            .and_then(DataType::numeric_type)
            .unwrap_or(DataType::Double);
        let (l, r) = (left.as_f64()?, right.as_f64()?);

        match (self.operator, data_type) {
            (ArithmeticOperator::Divide, DataType::Integer) => {
                self.divide(DataType::Double, left.data_type(), l, r)
            }
            (ArithmeticOperator::Divide, _) => self.divide(data_type, left.data_type(), l, r),
            (_, DataType::Integer) => match (left.parsed(), right.parsed()) {
                (Value::Integer(l), Value::Integer(r)) => self.integer(*l, *r),
                _ => self.integer(l as i64, r as i64),
            },
            (operator, DataType::Float) => {
                let (l, r) = (l as f32, r as f32);
                Ok(FieldValue::float(match operator {
                    ArithmeticOperator::Add => l + r,
                    ArithmeticOperator::Subtract => l - r,
                    _ => l * r,
                }))
            }
            (operator, _) => Ok(numeric_result(
                DataType::Double,
                match operator {
                    ArithmeticOperator::Add => l + r,
                    ArithmeticOperator::Subtract => l - r,
                    _ => l * r,
                },
            )),
        }
    }
}

pub(super) fn register(table: &mut FunctionTable) {
    use strum::IntoEnumIterator;

    for operator in ArithmeticOperator::iter() {
        let name: &'static str = operator.into();
        table.insert(name, Arc::new(ArithmeticFunction::new(operator)));
    }
}
