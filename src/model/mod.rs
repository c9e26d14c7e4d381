//! The already-resolved model graph handed over by the loading stage.
//!
//! Field declarations, derived fields and user-defined functions are shared
//! by every model type through [`ModelSchema`]; model-specific tables live in
//! submodules.

pub mod expression;
pub mod general_regression;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{DataType, OpType};
use crate::value::{TypedValue, Value};
use crate::{EvalResult, ModelError};

pub use expression::{Expression, LinearNorm, OutlierTreatment};
pub use general_regression::GeneralRegressionModel;

/// Floating-point precision a model is evaluated at.
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
pub enum MathContext {
    Float,
    #[default]
    Double,
}

/// What happens to a value outside its declared domain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum InvalidValueTreatment {
    #[default]
    ReturnInvalid,
    AsIs,
    AsMissing,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum UsageType {
    #[default]
    Active,
    Target,
    Supplementary,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Closure {
    OpenOpen,
    OpenClosed,
    ClosedOpen,
    #[default]
    ClosedClosed,
}

/// Valid range of a continuous field. An absent margin is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    #[serde(default)]
    pub closure: Closure,
    #[serde(default)]
    pub left_margin: Option<f64>,
    #[serde(default)]
    pub right_margin: Option<f64>,
}

impl Interval {
    pub fn contains(&self, x: f64) -> bool {
        let left_closed = matches!(self.closure, Closure::ClosedOpen | Closure::ClosedClosed);
        let right_closed = matches!(self.closure, Closure::OpenClosed | Closure::ClosedClosed);
        let above_left = self
            .left_margin
            .map_or(true, |left| if left_closed { x >= left } else { x > left });
        let below_right = self
            .right_margin
            .map_or(true, |right| if right_closed { x <= right } else { x < right });
        above_left && below_right
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataField {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub op_type: Option<OpType>,
    /// Valid categories; for ordinal fields their order is the ordering.
    #[serde(default)]
    pub values: Vec<Value>,
    /// Raw tokens that stand for a missing value.
    #[serde(default)]
    pub missing_values: Vec<Value>,
    #[serde(default)]
    pub intervals: Vec<Interval>,
}

impl DataField {
    pub fn new<S: Into<String>>(name: S, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            op_type: None,
            values: Vec::new(),
            missing_values: Vec::new(),
            intervals: Vec::new(),
        }
    }

    pub fn with_op_type(mut self, op_type: OpType) -> Self {
        self.op_type = Some(op_type);
        self
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn op_type(&self) -> OpType {
        self.op_type
            .unwrap_or_else(|| self.data_type.default_op_type())
    }

    pub fn ordering(&self) -> Option<Arc<[Value]>> {
        if self.op_type() == OpType::Ordinal && !self.values.is_empty() {
            Some(self.values.clone().into())
        } else {
            None
        }
    }

    pub fn is_missing_token(&self, raw: &Value) -> bool {
        let text = raw.to_string();
        self.missing_values
            .iter()
            .any(|token| token == raw || token.to_string() == text)
    }

    /// Checks a coerced value against the declared categories or intervals.
    pub fn is_valid(&self, value: &TypedValue) -> EvalResult<bool> {
        match self.op_type() {
            OpType::Categorical | OpType::Ordinal if !self.values.is_empty() => {
                Ok(value.index_in(&self.values)?.is_some())
            }
            OpType::Continuous if !self.intervals.is_empty() => {
                let x = value.as_f64()?;
                Ok(self.intervals.iter().any(|interval| interval.contains(x)))
            }
            _ => Ok(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningField {
    pub name: String,
    #[serde(default)]
    pub usage_type: UsageType,
    #[serde(default)]
    pub missing_value_replacement: Option<Value>,
    #[serde(default)]
    pub invalid_value_treatment: InvalidValueTreatment,
}

impl MiningField {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn target<S: Into<String>>(name: S) -> Self {
        Self {
            usage_type: UsageType::Target,
            ..Self::new(name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedField {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub op_type: Option<OpType>,
    pub expression: Expression,
}

impl DerivedField {
    pub fn new<S: Into<String>>(name: S, data_type: DataType, expression: Expression) -> Self {
        Self {
            name: name.into(),
            data_type,
            op_type: None,
            expression,
        }
    }

    pub fn op_type(&self) -> OpType {
        self.op_type
            .unwrap_or_else(|| self.data_type.default_op_type())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterField {
    pub name: String,
    #[serde(default)]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub op_type: Option<OpType>,
}

/// A function declared in the model's transformation dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefineFunction {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub op_type: Option<OpType>,
    #[serde(default)]
    pub parameters: Vec<ParameterField>,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    #[serde(default)]
    pub data_fields: Vec<DataField>,
    #[serde(default)]
    pub mining_fields: Vec<MiningField>,
    #[serde(default)]
    pub derived_fields: Vec<DerivedField>,
    #[serde(default)]
    pub define_functions: Vec<DefineFunction>,
}

impl ModelSchema {
    pub fn data_field(&self, name: &str) -> Option<&DataField> {
        self.data_fields.iter().find(|field| field.name == name)
    }

    pub fn mining_field(&self, name: &str) -> Option<&MiningField> {
        self.mining_fields.iter().find(|field| field.name == name)
    }

    pub fn derived_field(&self, name: &str) -> Option<&DerivedField> {
        self.derived_fields.iter().find(|field| field.name == name)
    }

    pub fn define_function(&self, name: &str) -> Option<&DefineFunction> {
        self.define_functions.iter().find(|function| function.name == name)
    }

    /// Declared data type of a data or derived field.
    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.derived_field(name)
            .map(|field| field.data_type)
            .or_else(|| self.data_field(name).map(|field| field.data_type))
    }

    /// The mining field marked as target, if any.
    pub fn target_field(&self) -> Option<&MiningField> {
        self.mining_fields
            .iter()
            .find(|field| field.usage_type == UsageType::Target)
    }

    /// Cross-reference checks run once when an evaluator is built.
    pub fn validate(&self) -> Result<(), ModelError> {
        for mining_field in &self.mining_fields {
            if self.data_field(&mining_field.name).is_none()
                && self.derived_field(&mining_field.name).is_none()
            {
                return Err(ModelError::UnknownReference {
                    element: "MiningField",
                    kind: "field",
                    name: mining_field.name.clone(),
                });
            }
        }
        for derived_field in &self.derived_fields {
            if self.data_field(&derived_field.name).is_some() {
                return Err(ModelError::InvalidAttribute {
                    element: "DerivedField",
                    attribute: "name",
                    value: derived_field.name.clone(),
                });
            }
        }
        for function in &self.define_functions {
            if crate::function::FunctionRegistry::is_builtin(&function.name) {
                return Err(ModelError::InvalidAttribute {
                    element: "DefineFunction",
                    attribute: "name",
                    value: function.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CastInteger {
    Round,
    Ceiling,
    Floor,
}

/// Post-processing of a regression prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f64,
    #[serde(default)]
    pub rescale_constant: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub cast_integer: Option<CastInteger>,
    /// Substituted when the prediction is undetermined.
    #[serde(default)]
    pub default_value: Option<f64>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            field: None,
            rescale_factor: default_rescale_factor(),
            rescale_constant: 0.0,
            min: None,
            max: None,
            cast_integer: None,
            default_value: None,
        }
    }
}

fn default_rescale_factor() -> f64 {
    1.0
}

impl Target {
    /// Clamps, rescales and casts in that order.
    pub fn transform(&self, value: f64) -> f64 {
        let mut result = value;
        if let Some(min) = self.min {
            result = result.max(min);
        }
        if let Some(max) = self.max {
            result = result.min(max);
        }
        result = result * self.rescale_factor + self.rescale_constant;
        match self.cast_integer {
            Some(CastInteger::Round) => (result + 0.5).floor(),
            Some(CastInteger::Ceiling) => result.ceil(),
            Some(CastInteger::Floor) => result.floor(),
            None => result,
        }
    }
}
