//! General regression models: static tables, baseline hazards and the
//! per-record evaluator.

pub mod baseline;
pub mod evaluator;
pub mod matrix;

pub use baseline::{BaselineHazardTable, HazardCurve, HazardLookup};
pub use evaluator::GeneralRegressionEvaluator;
pub use matrix::{
    CovariateHandler, FactorCoding, FactorHandler, ParameterCell, ParameterMatrix, PredictorHandler,
    PredictorRow, RegressionTables,
};
