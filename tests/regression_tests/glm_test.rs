use approx::assert_relative_eq;
use yosoku::model::general_regression::{ModelType, Predictor};
use yosoku::model::{DataField, GeneralRegressionModel, MiningField, ModelSchema};
use yosoku::value::LinkFunction;
use yosoku::{DataType, Error, FieldError, ModelError, Value};

use super::evaluator;
use crate::{p, parameter, pp, record};

/// `logit(μ) = x`, scaled by the trial count `n` when given.
fn logit_model() -> GeneralRegressionModel {
    let schema = ModelSchema {
        data_fields: vec![
            DataField::new("x", DataType::Double),
            DataField::new("n", DataType::Integer),
            DataField::new("rate", DataType::Double),
        ],
        mining_fields: vec![MiningField::new("x"), MiningField::new("n"), MiningField::target("rate")],
        ..ModelSchema::default()
    };
    let mut model = GeneralRegressionModel::new(ModelType::GeneralizedLinear, schema);
    model.link_function = Some(LinkFunction::Logit);
    model.parameters = vec![parameter("p0"), parameter("p1")];
    model.covariates = vec![Predictor::new("x")];
    model.pp_matrix = vec![pp("x", "p1", "1")];
    model.param_matrix = vec![p("p0", 0.0), p("p1", 1.0)];
    model
}

fn predict(model: GeneralRegressionModel, inputs: &[(&str, Value)]) -> Option<f64> {
    let evaluator = evaluator(model).unwrap();
    evaluator.evaluate(&record(inputs)).unwrap()["rate"].as_f64()
}

#[test]
fn test_logit_link() {
    assert_relative_eq!(
        predict(logit_model(), &[("x", Value::from(0.0))]).unwrap(),
        0.5
    );
    assert_relative_eq!(
        predict(logit_model(), &[("x", Value::from(3f64.ln()))]).unwrap(),
        0.75,
        epsilon = 1e-12
    );
}

#[test]
fn test_offset_and_trials() {
    let mut model = logit_model();
    model.offset_value = Some(1.0);
    model.trials_variable = Some("n".to_string());
    let result = predict(model, &[("x", Value::from(-1.0)), ("n", Value::Integer(10))]);
    assert_relative_eq!(result.unwrap(), 5.0);

    let mut model = logit_model();
    model.trials_value = Some(4.0);
    assert_relative_eq!(predict(model, &[("x", Value::from(0.0))]).unwrap(), 2.0);
}

#[test]
fn test_offset_variable_wins_over_value() {
    let mut model = logit_model();
    model.schema.data_fields.push(DataField::new("shift", DataType::Double));
    model.offset_variable = Some("shift".to_string());
    model.offset_value = Some(100.0);
    let result = predict(model, &[("x", Value::from(1.0)), ("shift", Value::from(-1.0))]);
    assert_relative_eq!(result.unwrap(), 0.5);
}

#[test]
fn test_missing_trials_value_is_an_error() {
    let mut model = logit_model();
    model.trials_variable = Some("n".to_string());
    let evaluator = evaluator(model).unwrap();
    let result = evaluator.evaluate(&record(&[("x", Value::from(0.0))]));
    assert_eq!(
        result,
        Err(Error::Field(FieldError::MissingRequiredValue {
            field: "n".to_string()
        }))
    );
}

#[test]
fn test_missing_covariate_skips_link() {
    assert_eq!(predict(logit_model(), &[]), None);
}

#[test]
fn test_link_configuration_errors() {
    let mut model = logit_model();
    model.link_function = None;
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingAttribute {
            attribute: "linkFunction",
            ..
        }))
    ));

    let mut model = logit_model();
    model.link_function = Some(LinkFunction::Power);
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingAttribute {
            attribute: "linkParameter",
            ..
        }))
    ));

    let mut model = logit_model();
    model.dist_parameter = Some(2.0);
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::InvalidAttribute {
            attribute: "distParameter",
            ..
        }))
    ));

    let mut model = logit_model();
    model.trials_variable = Some("trials".to_string());
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::UnknownReference { .. }))
    ));
}

#[test]
fn test_power_link() {
    let mut model = logit_model();
    model.link_function = Some(LinkFunction::Power);
    model.link_parameter = Some(0.5);
    // μ = x^(1/0.5)
    assert_relative_eq!(predict(model, &[("x", Value::from(3.0))]).unwrap(), 9.0, epsilon = 1e-12);
}
