mod cox_test;
mod glm_test;
mod ordinal_test;
mod regression_test;
mod threading_test;

use yosoku::model::GeneralRegressionModel;
use yosoku::{EvalResult, EvaluatorConfig, GeneralRegressionEvaluator, ModelArena};

use crate::FUNCTIONS;

pub fn evaluator(model: GeneralRegressionModel) -> EvalResult<GeneralRegressionEvaluator> {
    evaluator_with(model, EvaluatorConfig::default())
}

pub fn evaluator_with(
    model: GeneralRegressionModel,
    config: EvaluatorConfig,
) -> EvalResult<GeneralRegressionEvaluator> {
    let mut arena = ModelArena::new();
    let handle = arena.insert(model);
    GeneralRegressionEvaluator::new(&arena, handle, FUNCTIONS.clone(), config)
}
