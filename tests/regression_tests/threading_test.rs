use std::sync::Arc;
use std::thread;

use yosoku::model::general_regression::{ModelType, Predictor};
use yosoku::model::{DataField, GeneralRegressionModel, MiningField, ModelSchema};
use yosoku::{DataType, EvaluatorConfig, GeneralRegressionEvaluator, ModelArena, Value};

use crate::{p, parameter, pp, record, FUNCTIONS};

fn model(slope: f64) -> GeneralRegressionModel {
    let schema = ModelSchema {
        data_fields: vec![
            DataField::new("x", DataType::Double),
            DataField::new("y", DataType::Double),
        ],
        mining_fields: vec![MiningField::target("y")],
        ..ModelSchema::default()
    };
    let mut model = GeneralRegressionModel::new(ModelType::Regression, schema);
    model.parameters = vec![parameter("p1")];
    model.covariates = vec![Predictor::new("x")];
    model.pp_matrix = vec![pp("x", "p1", "1")];
    model.param_matrix = vec![p("p1", slope)];
    model
}

#[test]
fn test_shared_evaluator_across_threads() {
    let mut arena = ModelArena::new();
    let handle = arena.insert(model(2.0));
    let evaluator = Arc::new(
        GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), EvaluatorConfig::default()).unwrap(),
    );

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let evaluator = evaluator.clone();
            thread::spawn(move || {
                (0..100)
                    .map(|j| {
                        let x = (i * 100 + j) as f64;
                        let output = evaluator.evaluate(&record(&[("x", Value::from(x))])).unwrap();
                        (x, output["y"].as_f64().unwrap())
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for worker in workers {
        for (x, y) in worker.join().unwrap() {
            assert_eq!(y, 2.0 * x);
        }
    }
}

#[test]
fn test_distinct_models_get_distinct_tables() {
    let mut arena = ModelArena::new();
    // Structurally identical models still have their own entries.
    let first = arena.insert(model(1.0));
    let second = arena.insert(model(1.0));
    let third = arena.insert(model(3.0));
    let arena = Arc::new(arena);

    let workers: Vec<_> = [first, second, third, first, third]
        .into_iter()
        .map(|handle| {
            let arena = arena.clone();
            thread::spawn(move || {
                let evaluator =
                    GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), EvaluatorConfig::default())
                        .unwrap();
                let output = evaluator.evaluate(&record(&[("x", Value::from(2.0))])).unwrap();
                (handle, output["y"].as_f64().unwrap())
            })
        })
        .collect();

    for worker in workers {
        let (handle, y) = worker.join().unwrap();
        assert_eq!(y, if handle == third { 6.0 } else { 2.0 });
    }
    assert!(!Arc::ptr_eq(
        &arena.tables(first).unwrap(),
        &arena.tables(second).unwrap()
    ));
}
