use yosoku::model::general_regression::Predictor;
use yosoku::model::{Closure, DataField, Expression, InvalidValueTreatment, Interval, MiningField};
use yosoku::{DataType, Error, EvalResult, EvaluatorConfig, FieldError, GeneralRegressionEvaluator, ModelArena, Value};

use super::model_over;
use crate::{p, parameter, pp, record, FUNCTIONS};

/// `y = 1 + x` with `x` restricted to [0, 10] and "NA" meaning missing.
fn model(mining_field: MiningField) -> yosoku::model::GeneralRegressionModel {
    let mut model = model_over(Expression::field("x"));
    model.schema.data_fields[0].missing_values = vec![Value::from("NA")];
    model.schema.data_fields[0].intervals = vec![Interval {
        closure: Closure::ClosedClosed,
        left_margin: Some(0.0),
        right_margin: Some(10.0),
    }];
    model.schema.mining_fields[0] = mining_field;
    model
}

fn predict(model: yosoku::model::GeneralRegressionModel, x: Value) -> EvalResult<Option<f64>> {
    let mut arena = ModelArena::new();
    let handle = arena.insert(model);
    let evaluator = GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), EvaluatorConfig::default())?;
    Ok(evaluator.evaluate(&record(&[("x", x)]))?["y"].as_f64())
}

#[test]
fn test_missing_tokens_and_replacement() {
    assert_eq!(predict(model(MiningField::new("x")), Value::from("NA")).unwrap(), None);

    let replaced = MiningField {
        missing_value_replacement: Some(Value::from(2.0)),
        ..MiningField::new("x")
    };
    assert_eq!(predict(model(replaced.clone()), Value::from("NA")).unwrap(), Some(3.0));
    assert_eq!(predict(model(replaced), Value::Null).unwrap(), Some(3.0));
}

#[test]
fn test_invalid_value_treatments() {
    let result = predict(model(MiningField::new("x")), Value::from(11.0));
    assert_eq!(
        result,
        Err(Error::Field(FieldError::InvalidValue {
            field: "x".to_string(),
            value: "11".to_string(),
        }))
    );

    let as_is = MiningField {
        invalid_value_treatment: InvalidValueTreatment::AsIs,
        ..MiningField::new("x")
    };
    assert_eq!(predict(model(as_is), Value::from(11.0)).unwrap(), Some(12.0));

    let as_missing = MiningField {
        invalid_value_treatment: InvalidValueTreatment::AsMissing,
        ..MiningField::new("x")
    };
    assert_eq!(predict(model(as_missing.clone()), Value::from(11.0)).unwrap(), None);
    assert_eq!(predict(model(as_missing), Value::from("eleven")).unwrap(), None);

    assert_eq!(predict(model(MiningField::new("x")), Value::from(10.0)).unwrap(), Some(11.0));
}

#[test]
fn test_integer_factor_matches_string_category() {
    let mut model = model_over(Expression::field("x"));
    model.schema.data_fields.push(DataField::new("level", DataType::Integer));
    model.parameters.push(parameter("p2"));
    model.factors = vec![Predictor::new("level")];
    model.pp_matrix.push(pp("level", "p2", "2"));
    model.param_matrix.push(p("p2", 10.0));

    let mut arena = ModelArena::new();
    let handle = arena.insert(model);
    let evaluator =
        GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), EvaluatorConfig::default()).unwrap();
    let score = |level: Value| {
        evaluator
            .evaluate(&record(&[("x", Value::from(0.0)), ("level", level)]))
            .unwrap()["y"]
            .as_f64()
    };
    assert_eq!(score(Value::Integer(2)), Some(11.0));
    assert_eq!(score(Value::Integer(3)), Some(1.0));
    assert_eq!(score(Value::from("2")), Some(11.0));
}
