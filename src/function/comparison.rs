use std::cmp::Ordering;
use std::sync::Arc;

use strum_macros::IntoStaticStr;

use super::{Arguments, Arity, Function, FunctionTable};
use crate::value::FieldValue;
use crate::EvalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl ComparisonOperator {
    fn test(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::LessOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            ComparisonOperator::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

/// Two-argument comparison through the promotion lattice.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonFunction {
    operator: ComparisonOperator,
}

impl ComparisonFunction {
    pub fn new(operator: ComparisonOperator) -> Self {
        Self { operator }
    }
}

impl Function for ComparisonFunction {
    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let left = arguments.required(0, Some("x"))?;
        let right = arguments.required(1, Some("y"))?;
        let ordering = left.compare_to(right)?;
        Ok(FieldValue::boolean(self.operator.test(ordering)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

struct BooleanFunction {
    connective: Connective,
}

impl Function for BooleanFunction {
    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let mut result = self.connective == Connective::And;
        for index in 0..arguments.len() {
            let value = arguments.required(index, None)?.as_bool()?;
            result = match self.connective {
                Connective::And => result && value,
                Connective::Or => result || value,
            };
        }
        Ok(FieldValue::boolean(result))
    }
}

struct Not;

impl Function for Not {
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        Ok(FieldValue::boolean(!arguments.required(0, None)?.as_bool()?))
    }
}

/// `isIn(x, v1, v2, ...)` and its negation.
struct Membership {
    negated: bool,
}

impl Function for Membership {
    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let value = arguments.required(0, Some("x"))?;
        let mut found = false;
        for index in 1..arguments.len() {
            let candidate = arguments.required(index, None)?;
            if value.compare_to(candidate)? == Ordering::Equal {
                found = true;
                break;
            }
        }
        Ok(FieldValue::boolean(found != self.negated))
    }
}

pub(super) fn register(table: &mut FunctionTable) {
    use strum::IntoEnumIterator;

    for operator in ComparisonOperator::iter() {
        let name: &'static str = operator.into();
        table.insert(name, Arc::new(ComparisonFunction::new(operator)));
    }
    table.insert(
        "and",
        Arc::new(BooleanFunction {
            connective: Connective::And,
        }),
    );
    table.insert(
        "or",
        Arc::new(BooleanFunction {
            connective: Connective::Or,
        }),
    );
    table.insert("not", Arc::new(Not));
    table.insert("isIn", Arc::new(Membership { negated: false }));
    table.insert("isNotIn", Arc::new(Membership { negated: true }));
}
