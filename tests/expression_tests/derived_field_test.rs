use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use yosoku::function::{Arguments, Arity, Function};
use yosoku::model::{DefineFunction, Expression, InvalidValueTreatment, ParameterField};
use yosoku::{
    DataType, Error, EvalResult, EvaluatorConfig, FieldValue, FunctionError, FunctionRegistry,
    GeneralRegressionEvaluator, ModelArena, Value,
};

use super::model_over;
use crate::{p, parameter, pp, record};

/// Doubles its argument and counts how often it ran.
#[derive(Default)]
struct CountingScale {
    calls: AtomicUsize,
}

impl Function for CountingScale {
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FieldValue::double(arguments.number(1, Some("x"))? * 2.0))
    }
}

fn evaluator(
    model: yosoku::model::GeneralRegressionModel,
    functions: FunctionRegistry,
) -> EvalResult<GeneralRegressionEvaluator> {
    let mut arena = ModelArena::new();
    let handle = arena.insert(model);
    GeneralRegressionEvaluator::new(&arena, handle, functions, EvaluatorConfig::default())
}

fn predict(evaluator: &GeneralRegressionEvaluator, x: Value) -> EvalResult<Option<f64>> {
    Ok(evaluator.evaluate(&record(&[("x", x)]))?["y"].as_f64())
}

#[test]
fn test_derived_covariate() {
    let expression = Expression::apply("*", vec![Expression::field("x"), Expression::constant(2.0)]);
    let evaluator = evaluator(model_over(expression), FunctionRegistry::new()).unwrap();
    assert_eq!(predict(&evaluator, Value::from(3.0)).unwrap(), Some(7.0));
    assert_eq!(predict(&evaluator, Value::Null).unwrap(), None);
}

#[test]
fn test_extension_runs_once_per_record() {
    let scale = Arc::new(CountingScale::default());
    let functions = FunctionRegistry::new();
    functions
        .register_extension("com.example.scale", scale.clone())
        .unwrap();

    // The derived field feeds two rows: feature and feature².
    let mut model = model_over(Expression::apply("com.example.scale", vec![Expression::field("x")]));
    model.parameters.push(parameter("p2"));
    model.pp_matrix.push(pp("feature", "p2", "2"));
    model.param_matrix.push(p("p2", 1.0));
    let evaluator = evaluator(model, functions).unwrap();

    assert_relative_eq!(predict(&evaluator, Value::from(1.0)).unwrap().unwrap(), 7.0);
    assert_relative_eq!(predict(&evaluator, Value::from(2.0)).unwrap().unwrap(), 21.0);
    assert_eq!(scale.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_extension_allow_list() {
    let functions = FunctionRegistry::new();
    let evaluator = evaluator(
        model_over(Expression::apply("com.example.scale", vec![Expression::field("x")])),
        functions.clone(),
    )
    .unwrap();
    assert_eq!(
        predict(&evaluator, Value::from(1.0)),
        Err(Error::Function(FunctionError::ExtensionNotRegistered(
            "com.example.scale".to_string()
        )))
    );

    // Registering afterwards is visible through the shared registry.
    functions
        .register_extension("com.example.scale", Arc::new(CountingScale::default()))
        .unwrap();
    assert_eq!(predict(&evaluator, Value::from(1.0)).unwrap(), Some(3.0));

    assert!(matches!(
        functions.register_extension("scale", Arc::new(CountingScale::default())),
        Err(Error::Function(FunctionError::InvalidExtensionName(_)))
    ));
    assert!(matches!(
        functions.register_extension("com.example.scale", Arc::new(CountingScale::default())),
        Err(Error::Function(FunctionError::DuplicateExtension(_)))
    ));
}

#[test]
fn test_define_function() {
    let mut model = model_over(Expression::apply("square", vec![Expression::field("x")]));
    model.schema.define_functions.push(DefineFunction {
        name: "square".to_string(),
        data_type: DataType::Double,
        op_type: None,
        parameters: vec![ParameterField {
            name: "v".to_string(),
            data_type: Some(DataType::Double),
            op_type: None,
        }],
        expression: Expression::apply("*", vec![Expression::field("v"), Expression::field("v")]),
    });
    let evaluator = evaluator(model, FunctionRegistry::new()).unwrap();
    assert_eq!(predict(&evaluator, Value::from(3.0)).unwrap(), Some(10.0));
}

#[test]
fn test_missing_handling_in_apply() {
    let guarded = Expression::apply(
        "if",
        vec![
            Expression::apply("isMissing", vec![Expression::field("x")]),
            Expression::constant(0.0),
            Expression::field("x"),
        ],
    );
    let evaluator = evaluator(model_over(guarded), FunctionRegistry::new()).unwrap();
    assert_eq!(predict(&evaluator, Value::Null).unwrap(), Some(1.0));
    assert_eq!(predict(&evaluator, Value::from(4.0)).unwrap(), Some(5.0));

    let mapped = Expression::Apply {
        function: "ln".to_string(),
        arguments: vec![Expression::field("x")],
        map_missing_to: Some(Value::Double(-1.0)),
        default_value: None,
        invalid_value_treatment: InvalidValueTreatment::AsMissing,
    };
    let evaluator = self::evaluator(model_over(mapped), FunctionRegistry::new()).unwrap();
    assert_eq!(predict(&evaluator, Value::Null).unwrap(), Some(0.0));
    // ln of a negative number is an invalid result, treated as missing
    assert_eq!(predict(&evaluator, Value::from(-1.0)).unwrap(), None);
}

#[test]
fn test_function_errors_abort_the_record() {
    let evaluator = evaluator(
        model_over(Expression::apply("ln", vec![Expression::field("x")])),
        FunctionRegistry::new(),
    )
    .unwrap();
    assert!(matches!(
        predict(&evaluator, Value::from(-1.0)),
        Err(Error::Numeric(_))
    ));
    assert_relative_eq!(predict(&evaluator, Value::from(1.0)).unwrap().unwrap(), 1.0);
}
