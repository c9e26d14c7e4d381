//! Static parameter and predictor tables of a general regression model.
//!
//! Built once per model from the PP-matrix and the param-matrix and shared
//! read-only by every evaluation of that model.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::baseline::BaselineHazardTable;
use crate::eval::EvaluationContext;
use crate::model::general_regression::{GeneralRegressionModel, Matrix, Predictor};
use crate::value::{FieldValue, NumericValue, Precision, Value};
use crate::{EvalResult, ModelError};

/// One coefficient of the param-matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCell {
    pub parameter: String,
    pub target_category: Option<String>,
    pub beta: f64,
}

/// Parameter cells grouped by target category.
///
/// Cells without a target category are shared by every category.
#[derive(Debug, Clone, Default)]
pub struct ParameterMatrix {
    cells: HashMap<Option<String>, Vec<ParameterCell>>,
}

impl ParameterMatrix {
    fn insert(&mut self, cell: ParameterCell) {
        self.cells
            .entry(cell.target_category.clone())
            .or_default()
            .push(cell);
    }

    /// Cells for `category` (when given) followed by the shared cells.
    pub fn cells<'m>(&'m self, category: Option<&str>) -> impl Iterator<Item = &'m ParameterCell> + 'm {
        let specific = category
            .and_then(|category| self.cells.get(&Some(category.to_string())))
            .into_iter()
            .flatten();
        let shared = self.cells.get(&None).into_iter().flatten();
        specific.chain(shared)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.cells.contains_key(&Some(category.to_string()))
    }
}

/// How a factor's value enters a row product.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorCoding {
    /// 1 when the value equals `category`, else 0.
    Indicator { category: String },
    /// Coefficient at (row of the observed category, `column`).
    Contrast {
        categories: Vec<Value>,
        matrix: Matrix,
        column: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorHandler {
    pub field: String,
    pub coding: FactorCoding,
}

impl FactorHandler {
    /// The factor's multiplier, or `None` when the field is missing.
    fn coefficient(&self, context: &mut EvaluationContext<'_>) -> EvalResult<Option<f64>> {
        let value = match context.evaluate(&self.field)? {
            FieldValue::Missing => return Ok(None),
            FieldValue::Present(value) => value,
        };
        match &self.coding {
            FactorCoding::Indicator { category } => {
                let matches = value.equals_value(&Value::String(category.clone()))?;
                Ok(Some(if matches { 1.0 } else { 0.0 }))
            }
            FactorCoding::Contrast {
                categories,
                matrix,
                column,
            } => {
                let row = value
                    .index_in(categories)?
                    .ok_or_else(|| ModelError::UnknownCategory {
                        field: self.field.clone(),
                        value: value.as_string(),
                    })?;
                let element = matrix
                    .element(row, *column)
                    .ok_or_else(|| ModelError::MatrixElement {
                        predictor: self.field.clone(),
                        row,
                        column: *column,
                    })?;
                Ok(Some(element))
            }
        }
    }
}

/// A covariate raised to an exponent.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateHandler {
    pub field: String,
    pub exponent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictorHandler {
    Factor(FactorHandler),
    Covariate(CovariateHandler),
}

/// Everything one parameter multiplies together for one target category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictorRow {
    pub handlers: Vec<PredictorHandler>,
}

impl PredictorRow {
    /// The row product, or `None` when a field it needs is missing.
    ///
    /// A factor coefficient of zero ends the row early.
    pub fn evaluate<P: Precision>(&self, context: &mut EvaluationContext<'_>) -> EvalResult<Option<P>> {
        let mut product = NumericValue::<P>::one();
        for handler in &self.handlers {
            match handler {
                PredictorHandler::Factor(factor) => match factor.coefficient(context)? {
                    None => return Ok(None),
                    Some(coefficient) if coefficient == 0.0 => return Ok(Some(P::zero())),
                    Some(coefficient) => {
                        product.multiply(P::from_double(coefficient));
                    }
                },
                PredictorHandler::Covariate(covariate) => {
                    let value = match context.evaluate(&covariate.field)? {
                        FieldValue::Missing => return Ok(None),
                        FieldValue::Present(value) => value,
                    };
                    let mut term = NumericValue::<P>::from_f64(value.as_f64()?);
                    term.pow(P::from_double(covariate.exponent));
                    product.multiply(term.value());
                }
            }
        }
        Ok(Some(product.value()))
    }
}

/// All static tables of one model.
#[derive(Debug, Clone)]
pub struct RegressionTables {
    parameters: Vec<String>,
    param_matrix: ParameterMatrix,
    rows: HashMap<(Option<String>, String), PredictorRow>,
    reference_point: f64,
    baseline: Option<BaselineHazardTable>,
}

impl RegressionTables {
    pub fn build(model: &GeneralRegressionModel) -> Result<Self, ModelError> {
        if model.parameters.is_empty() {
            return Err(ModelError::MissingElement {
                parent: "GeneralRegressionModel",
                element: "ParameterList",
            });
        }
        if model.param_matrix.is_empty() {
            return Err(ModelError::MissingElement {
                parent: "GeneralRegressionModel",
                element: "ParamMatrix",
            });
        }

        let parameters: Vec<String> = model.parameters.iter().map(|p| p.name.clone()).collect();
        let known: HashSet<&str> = parameters.iter().map(String::as_str).collect();
        let unknown_parameter = |element, name: &str| ModelError::UnknownReference {
            element,
            kind: "parameter",
            name: name.to_string(),
        };

        let mut param_matrix = ParameterMatrix::default();
        for cell in &model.param_matrix {
            if !known.contains(cell.parameter_name.as_str()) {
                return Err(unknown_parameter("PCell", &cell.parameter_name));
            }
            if !cell.beta.is_finite() {
                return Err(ModelError::InvalidAttribute {
                    element: "PCell",
                    attribute: "beta",
                    value: cell.beta.to_string(),
                });
            }
            param_matrix.insert(ParameterCell {
                parameter: cell.parameter_name.clone(),
                target_category: cell.target_category.clone(),
                beta: cell.beta,
            });
        }

        let mut rows: HashMap<(Option<String>, String), PredictorRow> = HashMap::new();
        for cell in &model.pp_matrix {
            if !known.contains(cell.parameter_name.as_str()) {
                return Err(unknown_parameter("PPCell", &cell.parameter_name));
            }
            let handler = if let Some(factor) = find(&model.factors, &cell.predictor_name) {
                PredictorHandler::Factor(factor_handler(factor, &cell.value)?)
            } else if find(&model.covariates, &cell.predictor_name).is_some() {
                let exponent = cell.value.trim().parse::<f64>().map_err(|_| ModelError::InvalidAttribute {
                    element: "PPCell",
                    attribute: "value",
                    value: cell.value.clone(),
                })?;
                PredictorHandler::Covariate(CovariateHandler {
                    field: cell.predictor_name.clone(),
                    exponent,
                })
            } else {
                return Err(ModelError::UnknownReference {
                    element: "PPCell",
                    kind: "predictor",
                    name: cell.predictor_name.clone(),
                });
            };
            rows.entry((cell.target_category.clone(), cell.parameter_name.clone()))
                .or_default()
                .handlers
                .push(handler);
        }

        let reference_points: HashMap<&str, f64> = model
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.reference_point))
            .collect();
        let reference_point = param_matrix
            .cells(None)
            .map(|cell| cell.beta * reference_points.get(cell.parameter.as_str()).copied().unwrap_or(0.0))
            .sum();

        let baseline = model
            .base_cum_hazard_tables
            .as_ref()
            .map(BaselineHazardTable::build)
            .transpose()?;

        debug!(
            "Built regression tables: {} parameters, {} predictor rows",
            parameters.len(),
            rows.len()
        );
        Ok(Self {
            parameters,
            param_matrix,
            rows,
            reference_point,
            baseline,
        })
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn param_matrix(&self) -> &ParameterMatrix {
        &self.param_matrix
    }

    /// `Σ beta × referencePoint` over the shared parameter cells.
    pub fn reference_point(&self) -> f64 {
        self.reference_point
    }

    pub fn baseline(&self) -> Option<&BaselineHazardTable> {
        self.baseline.as_ref()
    }

    /// The row for a parameter, preferring a category-specific one.
    pub fn row(&self, category: Option<&str>, parameter: &str) -> Option<&PredictorRow> {
        category
            .and_then(|category| {
                self.rows
                    .get(&(Some(category.to_string()), parameter.to_string()))
            })
            .or_else(|| self.rows.get(&(None, parameter.to_string())))
    }

    /// `Σ beta × row product` for one target category.
    ///
    /// `None` when any row is undetermined because a field is missing.
    pub fn linear_predictor<P: Precision>(
        &self,
        category: Option<&str>,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<Option<NumericValue<P>>> {
        let mut result = NumericValue::<P>::zero();
        for cell in self.param_matrix.cells(category) {
            let product = match self.row(category, &cell.parameter) {
                // A parameter without predictors is an intercept.
                None => P::one(),
                Some(row) => match row.evaluate::<P>(context)? {
                    None => return Ok(None),
                    Some(product) => product,
                },
            };
            result.add_product(P::from_double(cell.beta), product);
        }
        Ok(Some(result))
    }
}

fn find<'m>(predictors: &'m [Predictor], name: &str) -> Option<&'m Predictor> {
    predictors.iter().find(|predictor| predictor.name == name)
}

fn factor_handler(factor: &Predictor, category: &str) -> Result<FactorHandler, ModelError> {
    let coding = match &factor.matrix {
        None => FactorCoding::Indicator {
            category: category.to_string(),
        },
        Some(matrix) => {
            let column = factor
                .categories
                .iter()
                .position(|candidate| candidate == category)
                .ok_or_else(|| ModelError::UnknownCategory {
                    field: factor.name.clone(),
                    value: category.to_string(),
                })?;
            FactorCoding::Contrast {
                categories: factor.categories.iter().cloned().map(Value::String).collect(),
                matrix: matrix.clone(),
                column,
            }
        }
    };
    Ok(FactorHandler {
        field: factor.name.clone(),
        coding,
    })
}
