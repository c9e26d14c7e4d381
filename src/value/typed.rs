//! Typed field values and the missing sentinel.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::scalar::{Value, DATE_FORMAT, DATE_TIME_FORMAT, TIME_FORMAT};
use crate::config::ParseMode;
use crate::types::{DataType, OpType};
use crate::{EvalResult, FieldError};

/// A value together with the types it was coerced to.
///
/// `parsed` is fixed at construction; equality and ordering are defined on
/// it, never on `raw`.
#[derive(Debug, Clone)]
pub struct TypedValue {
    data_type: DataType,
    op_type: OpType,
    raw: Value,
    parsed: Value,
    ordering: Option<Arc<[Value]>>,
}

/// A resolved field: either a typed value or the missing sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Present(TypedValue),
}

/// Coerces a raw value to `data_type`.
///
/// A raw null becomes [`FieldValue::Missing`]; a value that cannot be parsed
/// is a [`FieldError::ValueCheck`] naming the raw value and the target type.
pub fn coerce(
    data_type: DataType,
    op_type: OpType,
    raw: &Value,
    mode: ParseMode,
) -> EvalResult<FieldValue> {
    if raw.is_null() {
        return Ok(FieldValue::Missing);
    }
    let parsed = parse(data_type, raw, mode)?;
    Ok(FieldValue::Present(TypedValue {
        data_type,
        op_type,
        raw: raw.clone(),
        parsed,
        ordering: None,
    }))
}

pub(crate) fn parse(data_type: DataType, raw: &Value, mode: ParseMode) -> Result<Value, FieldError> {
    let check = || FieldError::ValueCheck {
        value: raw.to_string(),
        data_type,
    };
    let lenient = mode == ParseMode::Lenient;
    let text = |s: &str| -> String {
        if lenient {
            s.trim().to_string()
        } else {
            s.to_string()
        }
    };

    let parsed = match data_type {
        DataType::Integer => match raw {
            Value::Integer(i) => Some(Value::Integer(*i)),
            Value::Float(_) | Value::Double(_) => raw.as_f64().and_then(integral).map(Value::Integer),
            Value::Boolean(b) if lenient => Some(Value::Integer(*b as i64)),
            Value::String(s) => {
                let s = text(s);
                s.parse::<i64>()
                    .ok()
                    .or_else(|| {
                        if lenient {
                            s.parse::<f64>().ok().and_then(integral)
                        } else {
                            None
                        }
                    })
                    .map(Value::Integer)
            }
            _ => None,
        },
        DataType::Float => match raw {
            Value::String(s) => text(s).parse::<f32>().ok().map(Value::Float),
            Value::Boolean(_) if !lenient => None,
            other => other.as_f64().map(|v| Value::Float(v as f32)),
        },
        DataType::Double => match raw {
            Value::String(s) => text(s).parse::<f64>().ok().map(Value::Double),
            Value::Boolean(_) if !lenient => None,
            other => other.as_f64().map(Value::Double),
        },
        DataType::Boolean => match raw {
            Value::Boolean(b) => Some(Value::Boolean(*b)),
            Value::Integer(0) => Some(Value::Boolean(false)),
            Value::Integer(1) => Some(Value::Boolean(true)),
            Value::String(s) => {
                let s = text(s);
                if s.eq_ignore_ascii_case("true") || (lenient && s == "1") {
                    Some(Value::Boolean(true))
                } else if s.eq_ignore_ascii_case("false") || (lenient && s == "0") {
                    Some(Value::Boolean(false))
                } else {
                    None
                }
            }
            other => other
                .as_f64()
                .filter(|v| *v == 0.0 || *v == 1.0)
                .map(|v| Value::Boolean(v == 1.0)),
        },
        DataType::String => Some(Value::String(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        DataType::Date => to_date(raw, &text).map(Value::Date),
        DataType::Time => to_time(raw, &text).map(Value::Time),
        DataType::DateTime => to_date_time(raw, &text).map(Value::DateTime),
        DataType::DateDaysSince1970 => match raw {
            Value::Integer(i) => Some(Value::Integer(*i)),
            other => to_date(other, &text)
                .map(|d| Value::Integer((d - NaiveDate::default()).num_days())),
        },
        DataType::TimeSeconds => match raw {
            Value::Integer(i) => Some(Value::Integer(*i)),
            other => to_time(other, &text)
                .map(|t| Value::Integer(t.num_seconds_from_midnight() as i64)),
        },
        DataType::DateTimeSecondsSince1970 => match raw {
            Value::Integer(i) => Some(Value::Integer(*i)),
            other => to_date_time(other, &text).map(|dt| Value::Integer(dt.and_utc().timestamp())),
        },
    };
    parsed.ok_or_else(check)
}

fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn to_date(raw: &Value, text: &dyn Fn(&str) -> String) -> Option<NaiveDate> {
    match raw {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(dt.date()),
        Value::String(s) => NaiveDate::parse_from_str(&text(s), DATE_FORMAT).ok(),
        _ => None,
    }
}

fn to_time(raw: &Value, text: &dyn Fn(&str) -> String) -> Option<NaiveTime> {
    match raw {
        Value::Time(t) => Some(*t),
        Value::DateTime(dt) => Some(dt.time()),
        Value::String(s) => NaiveTime::parse_from_str(&text(s), TIME_FORMAT).ok(),
        _ => None,
    }
}

fn to_date_time(raw: &Value, text: &dyn Fn(&str) -> String) -> Option<NaiveDateTime> {
    match raw {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::String(s) => NaiveDateTime::parse_from_str(&text(s), DATE_TIME_FORMAT).ok(),
        _ => None,
    }
}

/// Order of two values already brought to the same data type.
fn natural_order(left: &Value, right: &Value) -> Option<Ordering> {
    Some(match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l.cmp(r),
        (Value::Float(l), Value::Float(r)) => l.total_cmp(r),
        (Value::Double(l), Value::Double(r)) => l.total_cmp(r),
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Date(l), Value::Date(r)) => l.cmp(r),
        (Value::Time(l), Value::Time(r)) => l.cmp(r),
        (Value::DateTime(l), Value::DateTime(r)) => l.cmp(r),
        _ => return None,
    })
}

impl TypedValue {
    /// Wraps an already parsed value; `raw` is the parsed value itself.
    pub fn new(data_type: DataType, op_type: OpType, parsed: Value) -> Self {
        Self {
            data_type,
            op_type,
            raw: parsed.clone(),
            parsed,
            ordering: None,
        }
    }

    pub fn with_ordering(mut self, ordering: Arc<[Value]>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn op_type(&self) -> OpType {
        self.op_type
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn parsed(&self) -> &Value {
        &self.parsed
    }

    pub fn ordering(&self) -> Option<&Arc<[Value]>> {
        self.ordering.as_ref()
    }

    pub fn as_f64(&self) -> EvalResult<f64> {
        self.parsed.as_f64().ok_or_else(|| {
            FieldError::NotNumeric {
                value: self.parsed.to_string(),
                data_type: self.data_type,
            }
            .into()
        })
    }

    pub fn as_bool(&self) -> EvalResult<bool> {
        match parse(DataType::Boolean, &self.parsed, ParseMode::Strict)? {
            Value::Boolean(b) => Ok(b),
            other => Err(FieldError::ValueCheck {
                value: other.to_string(),
                data_type: DataType::Boolean,
            }
            .into()),
        }
    }

    pub fn as_string(&self) -> String {
        self.parsed.to_string()
    }

    /// Compares two typed values through the promotion lattice.
    ///
    /// When either side is ordinal and carries an ordering list, both values
    /// are ranked by their position in it; values absent from the list fall
    /// back to natural order.
    pub fn compare_to(&self, other: &TypedValue) -> EvalResult<Ordering> {
        let incomparable = || FieldError::Incomparable {
            left: self.data_type,
            right: other.data_type,
        };
        let common = self
            .data_type
            .promote(other.data_type)
            .ok_or_else(incomparable)?;
        let left = parse(common, &self.parsed, ParseMode::Lenient)?;
        let right = parse(common, &other.parsed, ParseMode::Lenient)?;

        let ordinal = self.op_type == OpType::Ordinal || other.op_type == OpType::Ordinal;
        if ordinal {
            if let Some(ordering) = self.ordering.as_ref().or(other.ordering.as_ref()) {
                if let (Some(l), Some(r)) = (
                    position(ordering, common, &left),
                    position(ordering, common, &right),
                ) {
                    return Ok(l.cmp(&r));
                }
            }
        }
        natural_order(&left, &right).ok_or_else(|| incomparable().into())
    }

    /// Compares against a model literal, parsed on this value's terms.
    pub fn compare_value(&self, value: &Value) -> EvalResult<Ordering> {
        let data_type = value.natural_data_type().ok_or_else(|| FieldError::ValueCheck {
            value: value.to_string(),
            data_type: self.data_type,
        })?;
        let other = TypedValue::new(data_type, self.op_type, value.clone());
        self.compare_to(&other)
    }

    pub fn equals_value(&self, value: &Value) -> EvalResult<bool> {
        Ok(self.compare_value(value)? == Ordering::Equal)
    }

    /// Index of the first literal in `values` equal to this value.
    pub fn index_in(&self, values: &[Value]) -> EvalResult<Option<usize>> {
        for (index, value) in values.iter().enumerate() {
            if self.equals_value(value)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Re-coerces the parsed value to another type.
    pub fn cast(&self, data_type: DataType, op_type: OpType, mode: ParseMode) -> EvalResult<TypedValue> {
        if data_type == self.data_type && op_type == self.op_type {
            return Ok(self.clone());
        }
        let parsed = parse(data_type, &self.parsed, mode)?;
        Ok(TypedValue {
            data_type,
            op_type,
            raw: self.raw.clone(),
            parsed,
            ordering: self.ordering.clone(),
        })
    }
}

fn position(ordering: &[Value], data_type: DataType, value: &Value) -> Option<usize> {
    ordering.iter().position(|candidate| {
        parse(data_type, candidate, ParseMode::Lenient)
            .map(|parsed| natural_order(&parsed, value) == Some(Ordering::Equal))
            .unwrap_or(false)
    })
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.compare_to(other), Ok(Ordering::Equal))
    }
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_typed(&self) -> Option<&TypedValue> {
        match self {
            FieldValue::Present(value) => Some(value),
            FieldValue::Missing => None,
        }
    }

    pub fn into_typed(self) -> Option<TypedValue> {
        match self {
            FieldValue::Present(value) => Some(value),
            FieldValue::Missing => None,
        }
    }

    pub fn integer(value: i64) -> Self {
        TypedValue::new(DataType::Integer, OpType::Continuous, Value::Integer(value)).into()
    }

    pub fn float(value: f32) -> Self {
        TypedValue::new(DataType::Float, OpType::Continuous, Value::Float(value)).into()
    }

    pub fn double(value: f64) -> Self {
        TypedValue::new(DataType::Double, OpType::Continuous, Value::Double(value)).into()
    }

    pub fn boolean(value: bool) -> Self {
        TypedValue::new(DataType::Boolean, OpType::Categorical, Value::Boolean(value)).into()
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        TypedValue::new(DataType::String, OpType::Categorical, Value::String(value.into())).into()
    }
}

impl From<TypedValue> for FieldValue {
    fn from(value: TypedValue) -> Self {
        FieldValue::Present(value)
    }
}
