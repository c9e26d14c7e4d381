use serde::{Deserialize, Serialize};

use super::InvalidValueTreatment;
use crate::function::AggregateKind;
use crate::types::DataType;
use crate::value::Value;

/// Expression tree of a derived field or a user-defined function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Expression {
    Constant {
        value: Value,
        #[serde(default)]
        data_type: Option<DataType>,
        /// A constant flagged missing evaluates to the missing sentinel.
        #[serde(default)]
        missing: bool,
    },
    FieldRef {
        field: String,
        #[serde(default)]
        map_missing_to: Option<Value>,
    },
    Apply {
        function: String,
        #[serde(default)]
        arguments: Vec<Expression>,
        #[serde(default)]
        map_missing_to: Option<Value>,
        #[serde(default)]
        default_value: Option<Value>,
        #[serde(default)]
        invalid_value_treatment: InvalidValueTreatment,
    },
    /// Strict aggregate: raises when every entry is missing.
    Aggregate {
        function: AggregateKind,
        arguments: Vec<Expression>,
    },
    NormDiscrete {
        field: String,
        value: Value,
        #[serde(default)]
        map_missing_to: Option<f64>,
    },
    NormContinuous {
        field: String,
        norms: Vec<LinearNorm>,
        #[serde(default)]
        outliers: OutlierTreatment,
        #[serde(default)]
        map_missing_to: Option<f64>,
    },
}

/// One knot of a piecewise-linear normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearNorm {
    pub orig: f64,
    pub norm: f64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum OutlierTreatment {
    #[default]
    AsIs,
    AsMissingValues,
    AsExtremeValues,
}

impl Expression {
    pub fn constant<V: Into<Value>>(value: V) -> Self {
        Expression::Constant {
            value: value.into(),
            data_type: None,
            missing: false,
        }
    }

    pub fn field<S: Into<String>>(name: S) -> Self {
        Expression::FieldRef {
            field: name.into(),
            map_missing_to: None,
        }
    }

    pub fn apply<S: Into<String>>(function: S, arguments: Vec<Expression>) -> Self {
        Expression::Apply {
            function: function.into(),
            arguments,
            map_missing_to: None,
            default_value: None,
            invalid_value_treatment: InvalidValueTreatment::default(),
        }
    }
}
