use thiserror::Error;

use crate::function::Arity;
use crate::types::DataType;

/// Errors in the static model structure.
///
/// These are raised while an evaluator is being constructed (or the first
/// time a model's tables are built), never once per record, with the
/// exception of [`ModelError::UnknownCategory`] and
/// [`ModelError::MatrixElement`] which surface when a record exposes a hole
/// in a contrast matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Missing attribute {element}@{attribute}")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Missing element {element} in {parent}")]
    MissingElement {
        parent: &'static str,
        element: &'static str,
    },

    #[error("Invalid value {value:?} for attribute {element}@{attribute}")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("Unsupported {element}: {message}")]
    Unsupported {
        element: &'static str,
        message: String,
    },

    #[error("{element} references unknown {kind} {name:?}")]
    UnknownReference {
        element: &'static str,
        kind: &'static str,
        name: String,
    },

    #[error("Value {value:?} of field {field:?} is not one of the declared categories")]
    UnknownCategory { field: String, value: String },

    #[error("Matrix of predictor {predictor:?} has no element at ({row}, {column})")]
    MatrixElement {
        predictor: String,
        row: usize,
        column: usize,
    },
}

/// Errors raised by a single function call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Function {function} expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: Arity,
        actual: usize,
    },

    #[error(
        "Function {function}: required argument #{position}{} is missing",
        .alias.map(|alias| format!(" ({alias})")).unwrap_or_default()
    )]
    RequiredArgumentMissing {
        function: String,
        position: usize,
        alias: Option<&'static str>,
    },

    #[error("Function {function}: argument #{position} expected {expected}, found {found}")]
    InvalidArgumentType {
        function: String,
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Function {function}: argument #{position} is invalid: {message}")]
    InvalidArgumentValue {
        function: String,
        position: usize,
        message: String,
    },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Extension function {0} is not registered")]
    ExtensionNotRegistered(String),

    #[error("Extension function {0} is already registered")]
    DuplicateExtension(String),

    #[error("Extension identifier {0:?} must be fully qualified and must not shadow a built-in")]
    InvalidExtensionName(String),
}

/// Errors in the numeric result of an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("Undefined result of {operation}")]
    UndefinedResult { operation: String },

    #[error("Invalid result of {operation}: {message}")]
    InvalidResult { operation: String, message: String },

    #[error("{operation} produced NaN")]
    NaNResult { operation: String },
}

/// Errors while resolving or checking field values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("Missing value for field {0}")]
    MissingFieldValue(String),

    #[error("Unknown field {0}")]
    UnknownField(String),

    #[error("Field {field} is required but has a missing value")]
    MissingRequiredValue { field: String },

    #[error("Field {0} depends on itself")]
    CyclicReference(String),

    #[error("Field {0} already has a value")]
    AlreadyDeclared(String),

    #[error("Value {value:?} cannot be parsed as {data_type}")]
    ValueCheck { value: String, data_type: DataType },

    #[error("Value {value:?} is not valid for field {field}")]
    InvalidValue { field: String, value: String },

    #[error("Values of type {left} and {right} cannot be compared")]
    Incomparable { left: DataType, right: DataType },

    #[error("Value {value:?} of type {data_type} is not numeric")]
    NotNumeric { value: String, data_type: DataType },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    #[error("Numeric error: {0}")]
    Numeric(#[from] NumericError),

    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type EvalResult<T> = Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    /// True for errors describing a bad value rather than a broken model.
    ///
    /// Apply expressions with `invalidValueTreatment = asMissing` turn these
    /// into a missing result.
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            Error::Numeric(_)
                | Error::Field(FieldError::ValueCheck { .. })
                | Error::Field(FieldError::InvalidValue { .. })
                | Error::Field(FieldError::NotNumeric { .. })
                | Error::Function(FunctionError::InvalidArgumentValue { .. })
        )
    }
}
