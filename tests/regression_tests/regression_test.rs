use yosoku::model::general_regression::{Matrix, MiningFunction, ModelType, Predictor};
use yosoku::model::{CastInteger, DataField, MathContext, MiningField, ModelSchema, Target};
use yosoku::{
    DataType, Error, EvaluatorConfig, FieldError, GeneralRegressionEvaluator, ModelArena, ModelError, ParseMode,
    Value,
};

use super::{evaluator, evaluator_with};
use crate::{p, parameter, pp, record, FUNCTIONS};

/// `y = 3 + 2·x`
fn linear_model() -> yosoku::model::GeneralRegressionModel {
    let schema = ModelSchema {
        data_fields: vec![
            DataField::new("x", DataType::Double),
            DataField::new("y", DataType::Double),
        ],
        mining_fields: vec![MiningField::new("x"), MiningField::target("y")],
        ..ModelSchema::default()
    };
    let mut model = yosoku::model::GeneralRegressionModel::new(ModelType::Regression, schema);
    model.parameters = vec![parameter("p0"), parameter("p1")];
    model.covariates = vec![Predictor::new("x")];
    model.pp_matrix = vec![pp("x", "p1", "1")];
    model.param_matrix = vec![p("p0", 3.0), p("p1", 2.0)];
    model
}

#[test]
fn test_linear_prediction() {
    let evaluator = evaluator(linear_model()).unwrap();
    assert_eq!(evaluator.target_field(), "y");

    let output = evaluator.evaluate(&record(&[("x", Value::from(4.0))])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(11.0));

    let output = evaluator.evaluate(&record(&[("x", Value::Integer(4))])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(11.0));
}

#[test]
fn test_missing_input_is_missing_prediction() {
    let evaluator = evaluator(linear_model()).unwrap();
    let output = evaluator.evaluate(&record(&[])).unwrap();
    assert!(output["y"].is_missing());

    let output = evaluator.evaluate(&record(&[("x", Value::Null)])).unwrap();
    assert!(output["y"].is_missing());
}

#[test]
fn test_general_linear_matches_regression() {
    let mut model = linear_model();
    model.model_type = ModelType::GeneralLinear;
    let evaluator = evaluator(model).unwrap();
    let output = evaluator.evaluate(&record(&[("x", Value::from(-1.0))])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(1.0));
}

#[test]
fn test_target_post_processing() {
    let mut model = linear_model();
    model.target = Some(Target {
        rescale_factor: 0.5,
        max: Some(10.0),
        cast_integer: Some(CastInteger::Floor),
        default_value: Some(-1.0),
        ..Target::default()
    });
    let evaluator = evaluator(model).unwrap();

    // 11 is clamped to 10, halved to 5
    let output = evaluator.evaluate(&record(&[("x", Value::from(4.0))])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(5.0));

    // 3 + 2·0.3 = 3.6, halved to 1.8, floored to 1
    let output = evaluator.evaluate(&record(&[("x", Value::from(0.3))])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(1.0));

    let output = evaluator.evaluate(&record(&[])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(-1.0));
}

#[test]
fn test_float_precision() {
    let mut model = linear_model();
    model.math_context = MathContext::Float;
    let evaluator = evaluator(model.clone()).unwrap();
    let output = evaluator.evaluate(&record(&[("x", Value::from(4.0))])).unwrap();
    let value = output["y"].value().unwrap();
    assert_eq!(value.data_type(), DataType::Float);
    assert_eq!(value.as_f64().unwrap(), 11.0);

    let config = EvaluatorConfig {
        math_context: Some(MathContext::Double),
        ..EvaluatorConfig::default()
    };
    let evaluator = evaluator_with(model, config).unwrap();
    assert_eq!(evaluator.math_context(), MathContext::Double);
    let output = evaluator.evaluate(&record(&[("x", Value::from(4.0))])).unwrap();
    assert_eq!(output["y"].value().unwrap().data_type(), DataType::Double);
}

#[test]
fn test_parse_mode() {
    let padded = record(&[("x", Value::from(" 4 "))]);

    let strict = evaluator(linear_model()).unwrap();
    assert!(matches!(
        strict.evaluate(&padded),
        Err(Error::Field(FieldError::ValueCheck { .. }))
    ));

    let lenient = evaluator_with(linear_model(), EvaluatorConfig::lenient()).unwrap();
    let output = lenient.evaluate(&padded).unwrap();
    assert_eq!(output["y"].as_f64(), Some(11.0));
    assert_eq!(EvaluatorConfig::lenient().parse_mode, ParseMode::Lenient);
}

#[test]
fn test_uncached_tables() {
    let mut arena = ModelArena::new();
    let handle = arena.insert(linear_model());
    let config = EvaluatorConfig {
        cache_tables: false,
        ..EvaluatorConfig::default()
    };
    let evaluator = GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), config).unwrap();
    assert!(!arena.is_cached(handle));
    let output = evaluator.evaluate(&record(&[("x", Value::from(1.0))])).unwrap();
    assert_eq!(output["y"].as_f64(), Some(5.0));

    GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), EvaluatorConfig::default()).unwrap();
    assert!(arena.is_cached(handle));
}

#[test]
fn test_contrast_factor_rejects_unknown_category() {
    let mut model = linear_model();
    model.schema.data_fields.push(DataField::new("color", DataType::String));
    model.parameters.push(parameter("p2"));
    let mut factor = Predictor::new("color");
    factor.categories = vec!["red".to_string(), "blue".to_string()];
    factor.matrix = Some(Matrix {
        rows: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    });
    model.factors = vec![factor];
    model.pp_matrix.push(pp("color", "p2", "blue"));
    model.param_matrix.push(p("p2", 5.0));
    let evaluator = evaluator(model).unwrap();

    let output = evaluator
        .evaluate(&record(&[("x", Value::from(0.0)), ("color", Value::from("blue"))]))
        .unwrap();
    assert_eq!(output["y"].as_f64(), Some(8.0));
    let output = evaluator
        .evaluate(&record(&[("x", Value::from(0.0)), ("color", Value::from("red"))]))
        .unwrap();
    assert_eq!(output["y"].as_f64(), Some(3.0));

    let result = evaluator.evaluate(&record(&[("x", Value::from(0.0)), ("color", Value::from("green"))]));
    assert_eq!(
        result,
        Err(Error::Model(ModelError::UnknownCategory {
            field: "color".to_string(),
            value: "green".to_string(),
        }))
    );
}

#[test]
fn test_malformed_models_fail_construction() {
    let mut model = linear_model();
    model.function_name = MiningFunction::Classification;
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::InvalidAttribute {
            attribute: "functionName",
            ..
        }))
    ));

    let mut model = linear_model();
    model.schema.mining_fields.pop();
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingAttribute {
            attribute: "targetVariableName",
            ..
        }))
    ));

    let mut model = linear_model();
    model.pp_matrix.push(pp("z", "p1", "1"));
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::UnknownReference { kind: "predictor", .. }))
    ));

    let mut model = linear_model();
    model.param_matrix.clear();
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingElement {
            element: "ParamMatrix",
            ..
        }))
    ));
}

#[test]
fn test_model_from_json() {
    let json = r#"{
        "schema": {
            "dataFields": [
                {"name": "x", "dataType": "double"},
                {"name": "y", "dataType": "double"}
            ],
            "miningFields": [{"name": "x"}, {"name": "y", "usageType": "target"}]
        },
        "functionName": "regression",
        "modelType": "regression",
        "parameters": [{"name": "p0"}, {"name": "p1"}],
        "covariates": [{"name": "x"}],
        "ppMatrix": [{"value": "1", "predictorName": "x", "parameterName": "p1"}],
        "paramMatrix": [
            {"parameterName": "p0", "beta": 3.0},
            {"parameterName": "p1", "beta": 2.0}
        ]
    }"#;
    let model: yosoku::model::GeneralRegressionModel = serde_json::from_str(json).unwrap();
    pretty_assertions::assert_eq!(model, linear_model());
}
