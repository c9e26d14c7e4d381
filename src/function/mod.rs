//! Named, arity-checked operations over typed field values.
//!
//! Built-in functions live in a process-wide table keyed by their
//! modeling-language name. Extensions are deny-by-default: a fully
//! qualified identifier resolves only after the host registered an
//! implementation for it on the [`FunctionRegistry`].

pub mod aggregate;
pub mod arithmetic;
pub mod comparison;
pub mod math;
pub mod string;
pub mod temporal;

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use tracing::debug;

use crate::types::DataType;
use crate::value::{FieldValue, TypedValue};
use crate::{Error, EvalResult, FunctionError};

pub use aggregate::{AggregateFunction, AggregateKind, AllMissing};
pub use arithmetic::{ArithmeticFunction, ArithmeticOperator};
pub use comparison::{ComparisonFunction, ComparisonOperator};

/// Number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Range { min: usize, max: usize },
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Fixed(n) => count == n,
            Arity::Range { min, max } => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Range { min, max } => write!(f, "{} to {}", min, max),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}

pub trait Function: Send + Sync {
    fn arity(&self) -> Arity;

    /// Whether the function wants to see missing arguments.
    ///
    /// An `Apply` of a function that is not missing-tolerant yields missing
    /// as soon as one argument is missing, without calling [`evaluate`].
    ///
    /// [`evaluate`]: Function::evaluate
    fn missing_tolerant(&self) -> bool {
        false
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue>;
}

/// Positional view over the arguments of one call.
///
/// Positions in errors are 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    function: &'a str,
    values: &'a [FieldValue],
}

impl<'a> Arguments<'a> {
    pub fn new(function: &'a str, values: &'a [FieldValue]) -> Self {
        Self { function, values }
    }

    pub fn function(&self) -> &'a str {
        self.function
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'a [FieldValue] {
        self.values
    }

    /// The argument at `index`, or `None` when it is missing or absent.
    pub fn optional(&self, index: usize) -> Option<&'a TypedValue> {
        self.values.get(index).and_then(FieldValue::as_typed)
    }

    pub fn required(&self, index: usize, alias: Option<&'static str>) -> EvalResult<&'a TypedValue> {
        self.optional(index).ok_or_else(|| {
            FunctionError::RequiredArgumentMissing {
                function: self.function.to_string(),
                position: index + 1,
                alias,
            }
            .into()
        })
    }

    /// A required argument of a numeric data type.
    pub fn number(&self, index: usize, alias: Option<&'static str>) -> EvalResult<f64> {
        let value = self.required(index, alias)?;
        self.check_numeric(index, value)?;
        value.as_f64()
    }

    pub fn check_numeric(&self, index: usize, value: &TypedValue) -> EvalResult<()> {
        if value.data_type().is_numeric() {
            Ok(())
        } else {
            Err(self.invalid_type(index, "number", value))
        }
    }

    pub fn invalid_type(&self, index: usize, expected: &'static str, found: &TypedValue) -> Error {
        FunctionError::InvalidArgumentType {
            function: self.function.to_string(),
            position: index + 1,
            expected,
            found: format!("{} {:?}", found.data_type(), found.as_string()),
        }
        .into()
    }

    pub fn invalid_value<S: Into<String>>(&self, index: usize, message: S) -> Error {
        FunctionError::InvalidArgumentValue {
            function: self.function.to_string(),
            position: index + 1,
            message: message.into(),
        }
        .into()
    }
}

/// Checks the arity of `function` and runs it.
///
/// The body is never entered when the argument count is wrong.
pub fn invoke(name: &str, function: &dyn Function, values: &[FieldValue]) -> EvalResult<FieldValue> {
    let arity = function.arity();
    if !arity.accepts(values.len()) {
        return Err(FunctionError::Arity {
            function: name.to_string(),
            expected: arity,
            actual: values.len(),
        }
        .into());
    }
    function.evaluate(Arguments::new(name, values))
}

/// Numeric result typed after the widest operand; `float` stays `float`.
pub(crate) fn numeric_result(data_type: DataType, value: f64) -> FieldValue {
    match data_type {
        DataType::Float => FieldValue::float(value as f32),
        _ => FieldValue::double(value),
    }
}

type FunctionTable = HashMap<&'static str, Arc<dyn Function>>;

lazy_static! {
    static ref BUILT_INS: FunctionTable = {
        let mut table = FunctionTable::new();
        arithmetic::register(&mut table);
        aggregate::register(&mut table);
        comparison::register(&mut table);
        math::register(&mut table);
        string::register(&mut table);
        temporal::register(&mut table);
        table
    };
}

/// Resolves function names to implementations.
///
/// Cheap to clone; clones share the extension table.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    extensions: Arc<DashMap<String, Arc<dyn Function>>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("extensions", &self.extension_ids())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_builtin(name: &str) -> bool {
        BUILT_INS.contains_key(name)
    }

    /// Allows `id` to be used from `Apply` expressions.
    ///
    /// The identifier must be fully qualified (`com.example.myFunction`) and
    /// must not collide with a built-in name or an earlier registration.
    pub fn register_extension<S: Into<String>>(
        &self,
        id: S,
        function: Arc<dyn Function>,
    ) -> EvalResult<()> {
        let id = id.into();
        if !is_qualified(&id) || Self::is_builtin(&id) {
            return Err(FunctionError::InvalidExtensionName(id).into());
        }
        match self.extensions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(FunctionError::DuplicateExtension(entry.key().clone()).into())
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!("Registered extension function {}", entry.key());
                entry.insert(function);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, name: &str) -> EvalResult<Arc<dyn Function>> {
        if let Some(function) = BUILT_INS.get(name) {
            return Ok(function.clone());
        }
        if let Some(function) = self.extensions.get(name) {
            return Ok(function.value().clone());
        }
        if is_qualified(name) {
            Err(FunctionError::ExtensionNotRegistered(name.to_string()).into())
        } else {
            Err(FunctionError::UnknownFunction(name.to_string()).into())
        }
    }

    pub fn extension_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .extensions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

fn is_qualified(id: &str) -> bool {
    let mut segments = id.split('.');
    id.contains('.')
        && segments.all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}
