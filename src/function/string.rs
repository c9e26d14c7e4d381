use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use super::{Arguments, Arity, Function, FunctionTable};
use crate::value::{FieldValue, Value};
use crate::EvalResult;

lazy_static! {
    static ref PATTERNS: DashMap<String, Regex> = DashMap::new();
}

/// Most compiled patterns kept at once. Patterns may come from record data,
/// so the cache starts over when full.
const PATTERN_CACHE_LIMIT: usize = 256;

fn pattern(arguments: &Arguments<'_>, index: usize, pattern: &str) -> EvalResult<Regex> {
    if let Some(regex) = PATTERNS.get(pattern) {
        return Ok(regex.value().clone());
    }
    let regex = Regex::new(pattern)
        .map_err(|e| arguments.invalid_value(index, format!("invalid pattern: {}", e)))?;
    if PATTERNS.len() >= PATTERN_CACHE_LIMIT {
        trace!("Pattern cache full, clearing {} entries", PATTERNS.len());
        PATTERNS.clear();
    }
    PATTERNS.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn text(arguments: &Arguments<'_>, index: usize, alias: Option<&'static str>) -> EvalResult<String> {
    Ok(arguments.required(index, alias)?.as_string())
}

fn integer(arguments: &Arguments<'_>, index: usize, alias: Option<&'static str>) -> EvalResult<i64> {
    let value = arguments.required(index, alias)?;
    match value.parsed() {
        Value::Integer(i) => Ok(*i),
        _ => {
            let number = arguments.number(index, alias)?;
            if number.fract() == 0.0 {
                Ok(number as i64)
            } else {
                Err(arguments.invalid_type(index, "integer", value))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Uppercase,
    Lowercase,
    TrimBlanks,
}

struct StringTransform {
    transform: Transform,
}

impl Function for StringTransform {
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let input = text(&arguments, 0, None)?;
        Ok(FieldValue::string(match self.transform {
            Transform::Uppercase => input.to_uppercase(),
            Transform::Lowercase => input.to_lowercase(),
            Transform::TrimBlanks => input.trim().to_string(),
        }))
    }
}

struct StringLength;

impl Function for StringLength {
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let input = text(&arguments, 0, None)?;
        Ok(FieldValue::integer(input.chars().count() as i64))
    }
}

/// `substring(input, startPos, length)` with a 1-based start position.
struct Substring;

impl Function for Substring {
    fn arity(&self) -> Arity {
        Arity::Fixed(3)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let input = text(&arguments, 0, Some("input"))?;
        let start = integer(&arguments, 1, Some("startPos"))?;
        let length = integer(&arguments, 2, Some("length"))?;
        if start < 1 {
            return Err(arguments.invalid_value(1, format!("start position {} is below 1", start)));
        }
        if length < 0 {
            return Err(arguments.invalid_value(2, format!("length {} is negative", length)));
        }
        let result: String = input
            .chars()
            .skip(start as usize - 1)
            .take(length as usize)
            .collect();
        Ok(FieldValue::string(result))
    }
}

struct Concat;

impl Function for Concat {
    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let mut result = String::new();
        for index in 0..arguments.len() {
            result.push_str(&text(&arguments, index, None)?);
        }
        Ok(FieldValue::string(result))
    }
}

struct Replace;

impl Function for Replace {
    fn arity(&self) -> Arity {
        Arity::Fixed(3)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let input = text(&arguments, 0, Some("input"))?;
        let regex = pattern(&arguments, 1, &text(&arguments, 1, Some("pattern"))?)?;
        let replacement = text(&arguments, 2, Some("replacement"))?;
        Ok(FieldValue::string(
            regex.replace_all(&input, replacement.as_str()).into_owned(),
        ))
    }
}

struct Matches;

impl Function for Matches {
    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let input = text(&arguments, 0, Some("input"))?;
        let regex = pattern(&arguments, 1, &text(&arguments, 1, Some("pattern"))?)?;
        Ok(FieldValue::boolean(regex.is_match(&input)))
    }
}

pub(super) fn register(table: &mut FunctionTable) {
    for (name, transform) in [
        ("uppercase", Transform::Uppercase),
        ("lowercase", Transform::Lowercase),
        ("trimBlanks", Transform::TrimBlanks),
    ] {
        table.insert(name, Arc::new(StringTransform { transform }));
    }
    table.insert("stringLength", Arc::new(StringLength));
    table.insert("substring", Arc::new(Substring));
    table.insert("concat", Arc::new(Concat));
    table.insert("replace", Arc::new(Replace));
    table.insert("matches", Arc::new(Matches));
}
