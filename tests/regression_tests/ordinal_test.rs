use approx::assert_relative_eq;
use yosoku::model::general_regression::{ModelType, Predictor};
use yosoku::model::{DataField, GeneralRegressionModel, MiningField, ModelSchema};
use yosoku::value::CumulativeLink;
use yosoku::{DataType, Error, ModelError, OpType, Value};

use super::evaluator;
use crate::{p, p_for, parameter, pp, record};

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Thresholds -1 and 1 with a shared slope of 0.5 on `x`.
fn model() -> GeneralRegressionModel {
    let schema = ModelSchema {
        data_fields: vec![
            DataField::new("x", DataType::Double),
            DataField::new("rating", DataType::String)
                .with_op_type(OpType::Ordinal)
                .with_values(["low", "mid", "high"]),
        ],
        mining_fields: vec![MiningField::new("x"), MiningField::target("rating")],
        ..ModelSchema::default()
    };
    let mut model = GeneralRegressionModel::new(ModelType::OrdinalMultinomial, schema);
    model.cumulative_link = Some(CumulativeLink::Logit);
    model.parameters = vec![parameter("t1"), parameter("t2"), parameter("slope")];
    model.covariates = vec![Predictor::new("x")];
    model.pp_matrix = vec![pp("x", "slope", "1")];
    model.param_matrix = vec![
        p_for("low", "t1", -1.0),
        p_for("mid", "t2", 1.0),
        p("slope", 0.5),
    ];
    model
}

#[test]
fn test_cumulative_differences() {
    let evaluator = evaluator(model()).unwrap();

    let output = evaluator.evaluate(&record(&[("x", Value::from(0.0))])).unwrap();
    let classification = output["rating"].classification().unwrap();
    assert_relative_eq!(classification.probability("low").unwrap(), logistic(-1.0), epsilon = 1e-12);
    assert_relative_eq!(
        classification.probability("mid").unwrap(),
        logistic(1.0) - logistic(-1.0),
        epsilon = 1e-12
    );
    assert_relative_eq!(classification.probability("high").unwrap(), 1.0 - logistic(1.0), epsilon = 1e-12);
    assert_eq!(classification.most_probable(), Some("mid"));

    let output = evaluator.evaluate(&record(&[("x", Value::from(2.0))])).unwrap();
    let classification = output["rating"].classification().unwrap();
    assert_relative_eq!(classification.probability("low").unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(classification.probability("high").unwrap(), 1.0 - logistic(2.0), epsilon = 1e-12);
    let total: f64 = classification.probabilities().iter().map(|(_, p)| p).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-12);
}

#[test]
fn test_probit_link() {
    let mut model = model();
    model.cumulative_link = Some(CumulativeLink::Probit);
    let evaluator = evaluator(model).unwrap();
    let output = evaluator.evaluate(&record(&[("x", Value::from(2.0))])).unwrap();
    let classification = output["rating"].classification().unwrap();
    // Φ(0)
    assert_relative_eq!(classification.probability("low").unwrap(), 0.5, epsilon = 1e-9);
}

#[test]
fn test_missing_input() {
    let evaluator = evaluator(model()).unwrap();
    let output = evaluator.evaluate(&record(&[])).unwrap();
    assert!(output["rating"].is_missing());
}

#[test]
fn test_construction_errors() {
    let mut model = model();
    model.cumulative_link = None;
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingAttribute {
            attribute: "cumulativeLink",
            ..
        }))
    ));

    let mut model = self::model();
    model.param_matrix.remove(1);
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::UnknownCategory { .. }))
    ));
}
