use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::{Arguments, Arity, Function, FunctionTable};
use crate::config::ParseMode;
use crate::types::DataType;
use crate::value::{typed::parse, FieldValue, TypedValue, Value};
use crate::EvalResult;

fn date_time(arguments: &Arguments<'_>, index: usize, value: &TypedValue) -> EvalResult<NaiveDateTime> {
    match parse(DataType::DateTime, value.parsed(), ParseMode::Lenient) {
        Ok(Value::DateTime(dt)) => Ok(dt),
        _ => Err(arguments.invalid_type(index, "date or dateTime", value)),
    }
}

fn reference_year(arguments: &Arguments<'_>) -> EvalResult<NaiveDateTime> {
    let year = arguments.number(1, Some("referenceYear"))?;
    NaiveDate::from_ymd_opt(year as i32, 1, 1)
        .filter(|_| year.fract() == 0.0)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| arguments.invalid_value(1, format!("{} is not a valid year", year)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinceYear {
    Days,
    Seconds,
}

/// `dateDaysSinceYear(date, year)` and `dateSecondsSinceYear(dateTime, year)`.
struct ElapsedSinceYear {
    unit: SinceYear,
}

impl Function for ElapsedSinceYear {
    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let value = arguments.required(0, Some("input"))?;
        let instant = date_time(&arguments, 0, value)?;
        let origin = reference_year(&arguments)?;
        let elapsed = match self.unit {
            SinceYear::Days => (instant.date() - origin.date()).num_days(),
            SinceYear::Seconds => (instant - origin).num_seconds(),
        };
        Ok(FieldValue::integer(elapsed))
    }
}

struct SecondsSinceMidnight;

impl Function for SecondsSinceMidnight {
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let value = arguments.required(0, Some("input"))?;
        let time: NaiveTime = match parse(DataType::Time, value.parsed(), ParseMode::Lenient) {
            Ok(Value::Time(time)) => time,
            _ => return Err(arguments.invalid_type(0, "time or dateTime", value)),
        };
        Ok(FieldValue::integer(time.num_seconds_from_midnight() as i64))
    }
}

pub(super) fn register(table: &mut FunctionTable) {
    table.insert(
        "dateDaysSinceYear",
        Arc::new(ElapsedSinceYear {
            unit: SinceYear::Days,
        }),
    );
    table.insert(
        "dateSecondsSinceYear",
        Arc::new(ElapsedSinceYear {
            unit: SinceYear::Seconds,
        }),
    );
    table.insert("dateSecondsSinceMidnight", Arc::new(SecondsSinceMidnight));
}
