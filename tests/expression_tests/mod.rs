mod derived_field_test;
mod input_preparation_test;

use yosoku::model::general_regression::{ModelType, Predictor};
use yosoku::model::{DataField, DerivedField, Expression, GeneralRegressionModel, MiningField, ModelSchema};
use yosoku::DataType;

use crate::{p, parameter, pp};

/// `y = 1 + feature`, where `feature` is derived from `x` by `expression`.
pub fn model_over(expression: Expression) -> GeneralRegressionModel {
    let schema = ModelSchema {
        data_fields: vec![
            DataField::new("x", DataType::Double),
            DataField::new("y", DataType::Double),
        ],
        mining_fields: vec![MiningField::new("x"), MiningField::target("y")],
        derived_fields: vec![DerivedField::new("feature", DataType::Double, expression)],
        ..ModelSchema::default()
    };
    let mut model = GeneralRegressionModel::new(ModelType::Regression, schema);
    model.parameters = vec![parameter("p0"), parameter("p1")];
    model.covariates = vec![Predictor::new("feature")];
    model.pp_matrix = vec![pp("feature", "p1", "1")];
    model.param_matrix = vec![p("p0", 1.0), p("p1", 1.0)];
    model
}
