use tracing::debug;

use super::context::{EvaluationContext, Scope};
use crate::function::{invoke, AggregateFunction, AggregateKind, AllMissing, Arity};
use crate::model::{
    DefineFunction, Expression, InvalidValueTreatment, LinearNorm, OutlierTreatment,
};
use crate::types::DataType;
use crate::value::{coerce, FieldValue, TypedValue, Value};
use crate::{EvalResult, FunctionError, ModelError};

/// Evaluates expressions against an [`EvaluationContext`].
pub struct ExpressionEvaluator;

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        expression: &Expression,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        match expression {
            Expression::Constant {
                value,
                data_type,
                missing,
            } => self.eval_constant(value, *data_type, *missing, context),
            Expression::FieldRef {
                field,
                map_missing_to,
            } => self.eval_field_ref(field, map_missing_to.as_ref(), context),
            Expression::Apply {
                function,
                arguments,
                map_missing_to,
                default_value,
                invalid_value_treatment,
            } => {
                let result = self.eval_apply(
                    function,
                    arguments,
                    map_missing_to.as_ref(),
                    *invalid_value_treatment,
                    context,
                )?;
                match (result, default_value) {
                    (FieldValue::Missing, Some(default_value)) => Ok(literal(default_value)),
                    (result, _) => Ok(result),
                }
            }
            Expression::Aggregate {
                function,
                arguments,
            } => self.eval_aggregate(*function, arguments, context),
            Expression::NormDiscrete {
                field,
                value,
                map_missing_to,
            } => self.eval_norm_discrete(field, value, *map_missing_to, context),
            Expression::NormContinuous {
                field,
                norms,
                outliers,
                map_missing_to,
            } => self.eval_norm_continuous(field, norms, *outliers, *map_missing_to, context),
        }
    }

    fn eval_arguments(
        &self,
        arguments: &[Expression],
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<Vec<FieldValue>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument, context)?);
        }
        Ok(values)
    }

    fn eval_constant(
        &self,
        value: &Value,
        data_type: Option<DataType>,
        missing: bool,
        context: &EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        if missing {
            return Ok(FieldValue::Missing);
        }
        match data_type {
            Some(data_type) => coerce(
                data_type,
                data_type.default_op_type(),
                value,
                context.parse_mode(),
            ),
            None => Ok(literal(value)),
        }
    }

    fn eval_field_ref(
        &self,
        field: &str,
        map_missing_to: Option<&Value>,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        match (context.evaluate(field)?, map_missing_to) {
            (FieldValue::Missing, Some(replacement)) => Ok(literal(replacement)),
            (value, _) => Ok(value),
        }
    }

    fn eval_apply(
        &self,
        function: &str,
        arguments: &[Expression],
        map_missing_to: Option<&Value>,
        treatment: InvalidValueTreatment,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        if let Some(result) = self.eval_special_form(function, arguments, context)? {
            return Ok(result);
        }

        let values = self.eval_arguments(arguments, context)?;
        let any_missing = values.iter().any(FieldValue::is_missing);
        if let (true, Some(replacement)) = (any_missing, map_missing_to) {
            return Ok(literal(replacement));
        }

        let result = if let Some(define) = context.schema().define_function(function) {
            self.eval_defined(define, values, context)
        } else {
            let implementation = context.functions().resolve(function)?;
            if any_missing && !implementation.missing_tolerant() {
                return Ok(FieldValue::Missing);
            }
            invoke(function, implementation.as_ref(), &values)
        };

        match result {
            Err(e) if treatment == InvalidValueTreatment::AsMissing && e.is_value_error() => {
                debug!("Apply {} yielded an invalid value, treated as missing: {}", function, e);
                Ok(FieldValue::Missing)
            }
            result => result,
        }
    }

    /// Forms whose arguments are not all evaluated up front.
    fn eval_special_form(
        &self,
        function: &str,
        arguments: &[Expression],
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<Option<FieldValue>> {
        let arity = match function {
            "if" => Arity::Range { min: 2, max: 3 },
            "isMissing" | "isNotMissing" => Arity::Fixed(1),
            _ => return Ok(None),
        };
        if !arity.accepts(arguments.len()) {
            return Err(FunctionError::Arity {
                function: function.to_string(),
                expected: arity,
                actual: arguments.len(),
            }
            .into());
        }

        if function == "if" {
            let condition = match self.evaluate(&arguments[0], context)? {
                FieldValue::Missing => return Ok(Some(FieldValue::Missing)),
                FieldValue::Present(condition) => condition.as_bool()?,
            };
            let branch = if condition {
                arguments.get(1)
            } else {
                arguments.get(2)
            };
            return match branch {
                Some(branch) => self.evaluate(branch, context).map(Some),
                None => Ok(Some(FieldValue::Missing)),
            };
        }

        let missing = self.evaluate(&arguments[0], context)?.is_missing();
        Ok(Some(FieldValue::boolean(missing == (function == "isMissing"))))
    }

    /// Binds arguments to parameters in a fresh scope and runs the body.
    fn eval_defined(
        &self,
        define: &DefineFunction,
        values: Vec<FieldValue>,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        if values.len() != define.parameters.len() {
            return Err(FunctionError::Arity {
                function: define.name.clone(),
                expected: Arity::Fixed(define.parameters.len()),
                actual: values.len(),
            }
            .into());
        }

        let mut scope = Scope::new();
        for (parameter, value) in define.parameters.iter().zip(values) {
            let value = match (value, parameter.data_type) {
                (FieldValue::Present(typed), Some(data_type)) => {
                    let op_type = parameter
                        .op_type
                        .unwrap_or_else(|| data_type.default_op_type());
                    FieldValue::Present(typed.cast(data_type, op_type, context.parse_mode())?)
                }
                (value, _) => value,
            };
            scope.insert(parameter.name.clone(), value);
        }

        context.push_scope(scope);
        let result = self.evaluate(&define.expression, context);
        context.pop_scope();

        match result? {
            FieldValue::Missing => Ok(FieldValue::Missing),
            FieldValue::Present(typed) => {
                let op_type = define
                    .op_type
                    .unwrap_or_else(|| define.data_type.default_op_type());
                Ok(FieldValue::Present(typed.cast(
                    define.data_type,
                    op_type,
                    context.parse_mode(),
                )?))
            }
        }
    }

    fn eval_aggregate(
        &self,
        kind: AggregateKind,
        arguments: &[Expression],
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        let values = self.eval_arguments(arguments, context)?;
        AggregateFunction::new(kind, AllMissing::RaiseInvalid).aggregate(&kind.to_string(), &values)
    }

    fn eval_norm_discrete(
        &self,
        field: &str,
        value: &Value,
        map_missing_to: Option<f64>,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        match context.evaluate(field)? {
            FieldValue::Missing => Ok(map_missing_to.map_or(FieldValue::Missing, FieldValue::double)),
            FieldValue::Present(typed) => Ok(FieldValue::double(if typed.equals_value(value)? {
                1.0
            } else {
                0.0
            })),
        }
    }

    fn eval_norm_continuous(
        &self,
        field: &str,
        norms: &[LinearNorm],
        outliers: OutlierTreatment,
        map_missing_to: Option<f64>,
        context: &mut EvaluationContext<'_>,
    ) -> EvalResult<FieldValue> {
        if norms.len() < 2 {
            return Err(ModelError::MissingElement {
                parent: "NormContinuous",
                element: "LinearNorm",
            }
            .into());
        }
        let typed: TypedValue = match context.evaluate(field)? {
            FieldValue::Missing => {
                return Ok(map_missing_to.map_or(FieldValue::Missing, FieldValue::double))
            }
            FieldValue::Present(typed) => typed,
        };
        let x = typed.as_f64()?;

        let first = norms[0];
        let last = norms[norms.len() - 1];
        let outside = x < first.orig || x > last.orig;
        if outside {
            match outliers {
                OutlierTreatment::AsMissingValues => return Ok(FieldValue::Missing),
                OutlierTreatment::AsExtremeValues => {
                    let extreme = if x < first.orig { first.norm } else { last.norm };
                    return Ok(FieldValue::double(extreme));
                }
                OutlierTreatment::AsIs => {}
            }
        }

        // Segment containing x; outside values extrapolate the end segment.
        let segment = norms
            .windows(2)
            .position(|pair| x <= pair[1].orig)
            .unwrap_or(norms.len() - 2);
        let (lower, upper) = (norms[segment], norms[segment + 1]);
        let slope = (upper.norm - lower.norm) / (upper.orig - lower.orig);
        Ok(FieldValue::double(lower.norm + (x - lower.orig) * slope))
    }
}

/// A model literal typed after its own shape.
pub(crate) fn literal(value: &Value) -> FieldValue {
    match value.natural_data_type() {
        Some(data_type) => FieldValue::Present(TypedValue::new(
            data_type,
            data_type.default_op_type(),
            value.clone(),
        )),
        None => FieldValue::Missing,
    }
}
