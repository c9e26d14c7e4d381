use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::baseline::HazardLookup;
use super::matrix::RegressionTables;
use crate::cache::{ModelArena, ModelHandle};
use crate::config::EvaluatorConfig;
use crate::eval::EvaluationContext;
use crate::function::FunctionRegistry;
use crate::model::general_regression::{GeneralRegressionModel, ModelType};
use crate::model::MathContext;
use crate::output::{Classification, OutputValue};
use crate::value::{LinkFunction, NumericValue, Precision, TypedValue, Value};
use crate::{EvalResult, FieldError, ModelError};

/// Evaluates one general regression model record by record.
///
/// Construction validates the model and resolves its static tables, so a
/// malformed model never yields an evaluator. Each call to
/// [`evaluate`](Self::evaluate) uses its own context; one evaluator may be
/// shared between threads.
#[derive(Debug, Clone)]
pub struct GeneralRegressionEvaluator {
    model: Arc<GeneralRegressionModel>,
    tables: Arc<RegressionTables>,
    functions: FunctionRegistry,
    config: EvaluatorConfig,
    target_field: String,
    /// Target categories in output order; the multinomial reference is last.
    categories: Vec<String>,
}

impl GeneralRegressionEvaluator {
    pub fn new(
        arena: &ModelArena,
        handle: ModelHandle,
        functions: FunctionRegistry,
        config: EvaluatorConfig,
    ) -> EvalResult<Self> {
        let model = arena.model(handle)?;
        model.schema.validate()?;

        let expected = model.model_type.mining_function();
        if model.function_name != expected {
            return Err(ModelError::InvalidAttribute {
                element: "GeneralRegressionModel",
                attribute: "functionName",
                value: model.function_name.to_string(),
            }
            .into());
        }
        let target_field = model.target_field()?.to_string();

        let tables = if config.cache_tables {
            arena.tables(handle)?
        } else {
            Arc::new(RegressionTables::build(&model)?)
        };

        let categories = match model.model_type {
            ModelType::Regression | ModelType::GeneralLinear => Vec::new(),
            ModelType::GeneralizedLinear => {
                validate_generalized(&model)?;
                Vec::new()
            }
            ModelType::MultinomialLogistic => multinomial_categories(&model, &tables)?,
            ModelType::OrdinalMultinomial => ordinal_categories(&model, &tables)?,
            ModelType::CoxRegression => {
                validate_cox(&model, &tables)?;
                Vec::new()
            }
        };

        debug!(
            "Created evaluator for {} model {:?} predicting {}",
            model.model_type, model.model_name, target_field
        );
        Ok(Self {
            model,
            tables,
            functions,
            config,
            target_field,
            categories,
        })
    }

    pub fn model(&self) -> &GeneralRegressionModel {
        &self.model
    }

    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Precision in effect: the configured override, else the model's.
    pub fn math_context(&self) -> MathContext {
        self.config.math_context.unwrap_or(self.model.math_context)
    }

    /// Evaluates one record of raw input values.
    #[tracing::instrument(skip(self, arguments), fields(model_type = %self.model.model_type))]
    pub fn evaluate(&self, arguments: &HashMap<String, Value>) -> EvalResult<HashMap<String, OutputValue>> {
        let mut context = EvaluationContext::new(&self.model.schema, &self.functions, self.config.parse_mode);
        context.borrow_arguments(arguments);
        self.evaluate_context(&mut context)
    }

    /// Evaluates against a caller-prepared context, e.g. one with declared
    /// inputs.
    pub fn evaluate_context(&self, context: &mut EvaluationContext<'_>) -> EvalResult<HashMap<String, OutputValue>> {
        let output = match self.math_context() {
            MathContext::Float => self.evaluate_with::<f32>(context)?,
            MathContext::Double => self.evaluate_with::<f64>(context)?,
        };
        let mut result = HashMap::with_capacity(1);
        result.insert(self.target_field.clone(), output);
        Ok(result)
    }

    fn evaluate_with<P: Precision>(&self, context: &mut EvaluationContext<'_>) -> EvalResult<OutputValue> {
        debug!(
            "Evaluating {} record at {} precision",
            self.model.model_type,
            P::DATA_TYPE
        );
        match self.model.model_type {
            ModelType::Regression | ModelType::GeneralLinear => {
                let prediction = self.tables.linear_predictor::<P>(None, context)?;
                Ok(self.regression_output(prediction))
            }
            ModelType::GeneralizedLinear => {
                let prediction = self.generalized_linear::<P>(context)?;
                Ok(self.regression_output(prediction))
            }
            ModelType::MultinomialLogistic => self.multinomial::<P>(context),
            ModelType::OrdinalMultinomial => self.ordinal::<P>(context),
            ModelType::CoxRegression => {
                let hazard = self.cox::<P>(context)?;
                Ok(self.regression_output(hazard))
            }
        }
    }

    fn generalized_linear<P: Precision>(
        &self,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<Option<NumericValue<P>>> {
        let model = &self.model;
        let Some(mut value) = self.tables.linear_predictor::<P>(None, context)? else {
            return Ok(None);
        };
        if let Some(offset) = required_number(context, model.offset_variable.as_deref(), model.offset_value)? {
            value.add(P::from_double(offset));
        }
        // Presence is checked at construction.
        let link = model.link_function.unwrap_or(LinkFunction::Identity);
        debug!("Applying {} link", link);
        value.apply_link(link, model.dist_parameter, model.link_parameter)?;
        if let Some(trials) = required_number(context, model.trials_variable.as_deref(), model.trials_value)? {
            value.multiply(P::from_double(trials));
        }
        Ok(Some(value))
    }

    fn multinomial<P: Precision>(&self, context: &mut EvaluationContext<'_>) -> EvalResult<OutputValue> {
        let Some((reference, others)) = self.categories.split_last() else {
            return Ok(OutputValue::Missing);
        };
        let mut scores = Vec::with_capacity(self.categories.len());
        for category in others {
            debug!("Scoring target category {}", category);
            match self.tables.linear_predictor::<P>(Some(category), context)? {
                Some(score) => scores.push(score.value()),
                None => return Ok(OutputValue::Missing),
            }
        }
        debug!("Reference category {} fixed at score 0", reference);
        scores.push(P::zero());

        let max = scores.iter().copied().fold(P::neg_infinity(), P::max);
        let exponentiated: Vec<P> = scores
            .into_iter()
            .map(|score| NumericValue::new(score).subtract(max).exp().value())
            .collect();
        let total = exponentiated.iter().copied().fold(P::zero(), |sum, v| sum + v);

        let probabilities = self
            .categories
            .iter()
            .zip(exponentiated)
            .map(|(category, value)| {
                let probability = NumericValue::new(value).divide(total).to_f64();
                (category.clone(), probability)
            })
            .collect();
        Ok(OutputValue::Classification(Classification::new(probabilities)))
    }

    fn ordinal<P: Precision>(&self, context: &mut EvaluationContext<'_>) -> EvalResult<OutputValue> {
        // Checked at construction.
        let Some(link) = self.model.cumulative_link else {
            return Ok(OutputValue::Missing);
        };
        let last = self.categories.len().saturating_sub(1);
        let mut probabilities = Vec::with_capacity(self.categories.len());
        let mut previous = P::zero();
        for (index, category) in self.categories.iter().enumerate() {
            let cumulative = if index == last {
                P::one()
            } else {
                match self.tables.linear_predictor::<P>(Some(category), context)? {
                    Some(mut score) => score.apply_cumulative_link(link)?.value(),
                    None => return Ok(OutputValue::Missing),
                }
            };
            let probability = NumericValue::new(cumulative).subtract(previous).to_f64();
            probabilities.push((category.clone(), probability));
            previous = cumulative;
        }
        Ok(OutputValue::Classification(Classification::new(probabilities)))
    }

    fn cox<P: Precision>(&self, context: &mut EvaluationContext<'_>) -> EvalResult<Option<NumericValue<P>>> {
        let model = &self.model;
        let Some(baseline) = self.tables.baseline() else {
            return Ok(None);
        };
        let stratum = match model.baseline_strata_variable.as_deref() {
            Some(variable) if baseline.is_stratified() => Some(required_value(context, variable)?),
            _ => None,
        };
        let Some(curve) = baseline.curve(stratum.as_ref())? else {
            debug!("No baseline stratum matches {:?}", stratum.as_ref().map(TypedValue::as_string));
            return Ok(None);
        };

        let end_time = match model.end_time_variable.as_deref() {
            Some(variable) => required_value(context, variable)?.as_f64()?,
            None => return Ok(None),
        };
        let hazard = match curve.cumulative_hazard(end_time) {
            HazardLookup::Before => return Ok(Some(NumericValue::zero())),
            HazardLookup::At(hazard) => hazard,
            HazardLookup::After => {
                debug!("Time {} is past the baseline table end {}", end_time, curve.max_time());
                return Ok(None);
            }
        };

        let Some(mut value) = self.tables.linear_predictor::<P>(None, context)? else {
            return Ok(None);
        };
        value
            .subtract(P::from_double(self.tables.reference_point()))
            .exp()
            .multiply(P::from_double(hazard));
        Ok(Some(value))
    }

    fn regression_output<P: Precision>(&self, prediction: Option<NumericValue<P>>) -> OutputValue {
        let target = self.model.target.as_ref();
        let value = match (prediction, target.and_then(|t| t.default_value)) {
            (Some(value), _) => value.value(),
            (None, Some(default)) => {
                warn!("Prediction for {} is undetermined, using default {}", self.target_field, default);
                return OutputValue::Value(P::from_double(default).into_typed());
            }
            (None, None) => return OutputValue::Missing,
        };
        let value = match target {
            Some(target) => P::from_double(target.transform(value.into_double())),
            None => value,
        };
        OutputValue::Value(value.into_typed())
    }
}

/// A variable's present value, or an error naming it.
fn required_value(context: &mut EvaluationContext<'_>, variable: &str) -> EvalResult<TypedValue> {
    context
        .evaluate(variable)?
        .into_typed()
        .ok_or_else(|| {
            FieldError::MissingRequiredValue {
                field: variable.to_string(),
            }
            .into()
        })
}

/// A numeric variable that takes precedence over a constant, if either is set.
fn required_number(
    context: &mut EvaluationContext<'_>,
    variable: Option<&str>,
    constant: Option<f64>,
) -> EvalResult<Option<f64>> {
    match variable {
        Some(variable) => Ok(Some(required_value(context, variable)?.as_f64()?)),
        None => Ok(constant),
    }
}

fn check_variable(model: &GeneralRegressionModel, variable: Option<&str>) -> Result<(), ModelError> {
    match variable {
        Some(name) if model.schema.data_type(name).is_none() => Err(ModelError::UnknownReference {
            element: "GeneralRegressionModel",
            kind: "field",
            name: name.to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_generalized(model: &GeneralRegressionModel) -> Result<(), ModelError> {
    let link = model.link_function.ok_or(ModelError::MissingAttribute {
        element: "GeneralRegressionModel",
        attribute: "linkFunction",
    })?;
    link.validate(model.dist_parameter, model.link_parameter)?;
    check_variable(model, model.offset_variable.as_deref())?;
    check_variable(model, model.trials_variable.as_deref())
}

/// Target categories with the reference category moved last.
fn multinomial_categories(
    model: &GeneralRegressionModel,
    tables: &RegressionTables,
) -> Result<Vec<String>, ModelError> {
    let mut categories = model.target_categories()?;
    let reference = match &model.target_reference_category {
        Some(reference) => {
            if !categories.contains(reference) {
                return Err(ModelError::UnknownCategory {
                    field: model.target_field()?.to_string(),
                    value: reference.clone(),
                });
            }
            reference.clone()
        }
        None => {
            let mut without_cells = categories
                .iter()
                .filter(|category| !tables.param_matrix().has_category(category));
            match (without_cells.next(), without_cells.next()) {
                (Some(reference), None) => reference.clone(),
                _ => {
                    return Err(ModelError::MissingAttribute {
                        element: "GeneralRegressionModel",
                        attribute: "targetReferenceCategory",
                    })
                }
            }
        }
    };
    categories.retain(|category| *category != reference);
    categories.push(reference);
    Ok(categories)
}

fn ordinal_categories(
    model: &GeneralRegressionModel,
    tables: &RegressionTables,
) -> Result<Vec<String>, ModelError> {
    if model.cumulative_link.is_none() {
        return Err(ModelError::MissingAttribute {
            element: "GeneralRegressionModel",
            attribute: "cumulativeLink",
        });
    }
    let categories = model.target_categories()?;
    if categories.len() < 2 {
        return Err(ModelError::Unsupported {
            element: "GeneralRegressionModel",
            message: "ordinal models need at least two target categories".to_string(),
        });
    }
    let last = categories.len() - 1;
    if let Some(category) = categories[..last]
        .iter()
        .find(|category| !tables.param_matrix().has_category(category))
    {
        return Err(ModelError::UnknownCategory {
            field: model.target_field()?.to_string(),
            value: category.clone(),
        });
    }
    Ok(categories)
}

fn validate_cox(model: &GeneralRegressionModel, tables: &RegressionTables) -> Result<(), ModelError> {
    let end_time = model.end_time_variable.as_deref().ok_or(ModelError::MissingAttribute {
        element: "GeneralRegressionModel",
        attribute: "endTimeVariable",
    })?;
    check_variable(model, Some(end_time))?;
    let baseline = tables.baseline().ok_or(ModelError::MissingElement {
        parent: "GeneralRegressionModel",
        element: "BaseCumHazardTables",
    })?;
    if baseline.is_stratified() {
        let strata = model
            .baseline_strata_variable
            .as_deref()
            .ok_or(ModelError::MissingAttribute {
                element: "GeneralRegressionModel",
                attribute: "baselineStrataVariable",
            })?;
        check_variable(model, Some(strata))?;
    }
    Ok(())
}
