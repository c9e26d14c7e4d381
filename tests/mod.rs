mod expression_tests;
mod regression_tests;

use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use yosoku::model::general_regression::{PCell, PPCell, Parameter};
use yosoku::{FunctionRegistry, Value};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

lazy_static! {
    pub static ref FUNCTIONS: FunctionRegistry = FunctionRegistry::new();
}

pub fn record(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn parameter(name: &str) -> Parameter {
    Parameter {
        name: name.to_string(),
        label: None,
        reference_point: 0.0,
    }
}

pub fn pp(predictor: &str, parameter: &str, value: &str) -> PPCell {
    PPCell {
        value: value.to_string(),
        predictor_name: predictor.to_string(),
        parameter_name: parameter.to_string(),
        target_category: None,
    }
}

pub fn p(parameter: &str, beta: f64) -> PCell {
    PCell {
        target_category: None,
        parameter_name: parameter.to_string(),
        beta,
        df: None,
    }
}

pub fn p_for(category: &str, parameter: &str, beta: f64) -> PCell {
    PCell {
        target_category: Some(category.to_string()),
        ..p(parameter, beta)
    }
}
