use serde::{Deserialize, Serialize};

use super::{MathContext, ModelSchema, Target};
use crate::value::{CumulativeLink, LinkFunction};
use crate::ModelError;

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
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ModelType {
    Regression,
    GeneralLinear,
    MultinomialLogistic,
    GeneralizedLinear,
    OrdinalMultinomial,
    #[serde(rename = "CoxRegression")]
    #[strum(serialize = "CoxRegression")]
    CoxRegression,
}

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
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum MiningFunction {
    Regression,
    Classification,
}

impl ModelType {
    /// The mining function a model of this type must declare.
    pub fn mining_function(self) -> MiningFunction {
        match self {
            ModelType::MultinomialLogistic | ModelType::OrdinalMultinomial => {
                MiningFunction::Classification
            }
            _ => MiningFunction::Regression,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reference_point: f64,
}

/// Dense row-major matrix; rows may be ragged, absent cells are holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matrix {
    #[serde(default)]
    pub rows: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn element(&self, row: usize, column: usize) -> Option<f64> {
        self.rows.get(row).and_then(|cells| cells.get(column)).copied()
    }
}

/// A factor or covariate declared for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predictor {
    pub name: String,
    #[serde(default)]
    pub contrast_matrix_type: Option<String>,
    /// Category order of the contrast matrix rows.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub matrix: Option<Matrix>,
}

impl Predictor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            contrast_matrix_type: None,
            categories: Vec::new(),
            matrix: None,
        }
    }
}

/// Predictor-to-parameter correlation cell.
///
/// For a factor `value` is the matching category; for a covariate it is the
/// exponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PPCell {
    pub value: String,
    pub predictor_name: String,
    pub parameter_name: String,
    #[serde(default)]
    pub target_category: Option<String>,
}

/// Coefficient of one parameter for one target category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PCell {
    #[serde(default)]
    pub target_category: Option<String>,
    pub parameter_name: String,
    pub beta: f64,
    #[serde(default)]
    pub df: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineCell {
    pub time: f64,
    pub cum_hazard: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineStratum {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
    pub max_time: f64,
    #[serde(default)]
    pub baseline_cells: Vec<BaselineCell>,
}

/// Either one unstratified table (`maxTime` plus cells) or a list of strata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCumHazardTables {
    #[serde(default)]
    pub max_time: Option<f64>,
    #[serde(default)]
    pub baseline_cells: Vec<BaselineCell>,
    #[serde(default)]
    pub baseline_strata: Vec<BaselineStratum>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralRegressionModel {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub schema: ModelSchema,
    pub function_name: MiningFunction,
    pub model_type: ModelType,
    #[serde(default)]
    pub target_variable_name: Option<String>,
    #[serde(default)]
    pub target_reference_category: Option<String>,
    #[serde(default)]
    pub cumulative_link: Option<CumulativeLink>,
    #[serde(default)]
    pub link_function: Option<LinkFunction>,
    #[serde(default)]
    pub link_parameter: Option<f64>,
    #[serde(default)]
    pub dist_parameter: Option<f64>,
    #[serde(default)]
    pub trials_variable: Option<String>,
    #[serde(default)]
    pub trials_value: Option<f64>,
    #[serde(default)]
    pub offset_variable: Option<String>,
    #[serde(default)]
    pub offset_value: Option<f64>,
    #[serde(default)]
    pub start_time_variable: Option<String>,
    #[serde(default)]
    pub end_time_variable: Option<String>,
    #[serde(default)]
    pub status_variable: Option<String>,
    #[serde(default)]
    pub subject_id_variable: Option<String>,
    #[serde(default)]
    pub baseline_strata_variable: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub factors: Vec<Predictor>,
    #[serde(default)]
    pub covariates: Vec<Predictor>,
    #[serde(default)]
    pub pp_matrix: Vec<PPCell>,
    #[serde(default)]
    pub param_matrix: Vec<PCell>,
    #[serde(default)]
    pub base_cum_hazard_tables: Option<BaseCumHazardTables>,
    #[serde(default)]
    pub math_context: MathContext,
    #[serde(default)]
    pub target: Option<Target>,
}

impl GeneralRegressionModel {
    pub fn new(model_type: ModelType, schema: ModelSchema) -> Self {
        Self {
            model_name: None,
            schema,
            function_name: model_type.mining_function(),
            model_type,
            target_variable_name: None,
            target_reference_category: None,
            cumulative_link: None,
            link_function: None,
            link_parameter: None,
            dist_parameter: None,
            trials_variable: None,
            trials_value: None,
            offset_variable: None,
            offset_value: None,
            start_time_variable: None,
            end_time_variable: None,
            status_variable: None,
            subject_id_variable: None,
            baseline_strata_variable: None,
            parameters: Vec::new(),
            factors: Vec::new(),
            covariates: Vec::new(),
            pp_matrix: Vec::new(),
            param_matrix: Vec::new(),
            base_cum_hazard_tables: None,
            math_context: MathContext::default(),
            target: None,
        }
    }

    /// Name of the predicted field.
    ///
    /// The mining field marked as target wins over `targetVariableName`.
    pub fn target_field(&self) -> Result<&str, ModelError> {
        self.schema
            .target_field()
            .map(|field| field.name.as_str())
            .or(self.target_variable_name.as_deref())
            .ok_or(ModelError::MissingAttribute {
                element: "GeneralRegressionModel",
                attribute: "targetVariableName",
            })
    }

    /// Declared categories of the target field, in declaration order.
    pub fn target_categories(&self) -> Result<Vec<String>, ModelError> {
        let name = self.target_field()?;
        let field = self
            .schema
            .data_field(name)
            .ok_or_else(|| ModelError::UnknownReference {
                element: "GeneralRegressionModel",
                kind: "target field",
                name: name.to_string(),
            })?;
        if field.values.is_empty() {
            return Err(ModelError::MissingElement {
                parent: "DataField",
                element: "Value",
            });
        }
        Ok(field.values.iter().map(ToString::to_string).collect())
    }
}
