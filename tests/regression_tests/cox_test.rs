use approx::assert_relative_eq;
use yosoku::model::general_regression::{
    BaseCumHazardTables, BaselineCell, BaselineStratum, ModelType, Predictor,
};
use yosoku::model::{DataField, GeneralRegressionModel, MiningField, ModelSchema};
use yosoku::{DataType, Error, FieldError, ModelError, Value};

use super::evaluator;
use crate::{p, parameter, pp, record};

fn cells(points: &[(f64, f64)]) -> Vec<BaselineCell> {
    points
        .iter()
        .map(|&(time, cum_hazard)| BaselineCell { time, cum_hazard })
        .collect()
}

/// Baseline `{1: 0.1, 5: 0.4, 10: 0.9}` up to time 10; `age` centred on 50.
fn model() -> GeneralRegressionModel {
    let schema = ModelSchema {
        data_fields: vec![
            DataField::new("age", DataType::Double),
            DataField::new("time", DataType::Double),
            DataField::new("group", DataType::String),
            DataField::new("hazard", DataType::Double),
        ],
        mining_fields: vec![
            MiningField::new("age"),
            MiningField::new("time"),
            MiningField::target("hazard"),
        ],
        ..ModelSchema::default()
    };
    let mut model = GeneralRegressionModel::new(ModelType::CoxRegression, schema);
    model.end_time_variable = Some("time".to_string());
    let mut age = parameter("age_p");
    age.reference_point = 50.0;
    model.parameters = vec![age];
    model.covariates = vec![Predictor::new("age")];
    model.pp_matrix = vec![pp("age", "age_p", "1")];
    model.param_matrix = vec![p("age_p", 0.1)];
    model.base_cum_hazard_tables = Some(BaseCumHazardTables {
        max_time: Some(10.0),
        baseline_cells: cells(&[(1.0, 0.1), (5.0, 0.4), (10.0, 0.9)]),
        baseline_strata: Vec::new(),
    });
    model
}

fn hazard(model: &GeneralRegressionModel, age: f64, time: f64) -> Option<f64> {
    let evaluator = evaluator(model.clone()).unwrap();
    let inputs = record(&[("age", Value::from(age)), ("time", Value::from(time))]);
    evaluator.evaluate(&inputs).unwrap()["hazard"].as_f64()
}

#[test]
fn test_baseline_boundaries() {
    let model = model();
    assert_eq!(hazard(&model, 50.0, 0.5), Some(0.0));
    assert_relative_eq!(hazard(&model, 50.0, 7.0).unwrap(), 0.4, epsilon = 1e-12);
    assert_relative_eq!(hazard(&model, 50.0, 10.0).unwrap(), 0.9, epsilon = 1e-12);
    assert_eq!(hazard(&model, 50.0, 11.0), None);
}

#[test]
fn test_relative_risk() {
    let model = model();
    assert_relative_eq!(hazard(&model, 60.0, 7.0).unwrap(), 0.4 * 1f64.exp(), epsilon = 1e-12);
    assert_relative_eq!(hazard(&model, 40.0, 1.0).unwrap(), 0.1 * (-1f64).exp(), epsilon = 1e-12);
}

#[test]
fn test_missing_values() {
    let evaluator = evaluator(model()).unwrap();
    let result = evaluator.evaluate(&record(&[("age", Value::from(50.0))]));
    assert_eq!(
        result,
        Err(Error::Field(FieldError::MissingRequiredValue {
            field: "time".to_string()
        }))
    );

    let output = evaluator.evaluate(&record(&[("time", Value::from(7.0))])).unwrap();
    assert!(output["hazard"].is_missing());
}

#[test]
fn test_zero_hazard_cell_still_needs_the_predictor() {
    let mut model = model();
    model.base_cum_hazard_tables = Some(BaseCumHazardTables {
        max_time: Some(10.0),
        baseline_cells: cells(&[(0.0, 0.0), (5.0, 0.4), (10.0, 0.9)]),
        baseline_strata: Vec::new(),
    });
    let evaluator = evaluator(model).unwrap();

    let output = evaluator.evaluate(&record(&[("time", Value::from(2.0))])).unwrap();
    assert!(output["hazard"].is_missing());

    let output = evaluator
        .evaluate(&record(&[("age", Value::from(60.0)), ("time", Value::from(2.0))]))
        .unwrap();
    assert_eq!(output["hazard"].as_f64(), Some(0.0));
}

#[test]
fn test_strata() {
    let mut model = model();
    model.baseline_strata_variable = Some("group".to_string());
    model.base_cum_hazard_tables = Some(BaseCumHazardTables {
        max_time: None,
        baseline_cells: Vec::new(),
        baseline_strata: vec![
            BaselineStratum {
                value: "a".to_string(),
                label: None,
                max_time: 10.0,
                baseline_cells: cells(&[(1.0, 0.1), (5.0, 0.4)]),
            },
            BaselineStratum {
                value: "b".to_string(),
                label: None,
                max_time: 3.0,
                baseline_cells: cells(&[(2.0, 0.8)]),
            },
        ],
    });
    let evaluator = evaluator(model).unwrap();
    let predict = |group: &str, time: f64| {
        let inputs = record(&[
            ("age", Value::from(50.0)),
            ("time", Value::from(time)),
            ("group", Value::from(group)),
        ]);
        evaluator.evaluate(&inputs).unwrap()["hazard"].as_f64()
    };

    assert_relative_eq!(predict("a", 6.0).unwrap(), 0.4, epsilon = 1e-12);
    assert_relative_eq!(predict("b", 2.5).unwrap(), 0.8, epsilon = 1e-12);
    assert_eq!(predict("b", 6.0), None);
    assert_eq!(predict("c", 2.0), None);

    let result = evaluator.evaluate(&record(&[("age", Value::from(50.0)), ("time", Value::from(2.0))]));
    assert!(matches!(
        result,
        Err(Error::Field(FieldError::MissingRequiredValue { .. }))
    ));
}

#[test]
fn test_construction_errors() {
    let mut model = model();
    model.end_time_variable = None;
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingAttribute {
            attribute: "endTimeVariable",
            ..
        }))
    ));

    let mut model = self::model();
    model.base_cum_hazard_tables = None;
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingElement {
            element: "BaseCumHazardTables",
            ..
        }))
    ));

    let mut model = self::model();
    if let Some(tables) = model.base_cum_hazard_tables.as_mut() {
        tables.max_time = None;
    }
    assert!(matches!(
        evaluator(model),
        Err(Error::Model(ModelError::MissingAttribute {
            attribute: "maxTime",
            ..
        }))
    ));
}
