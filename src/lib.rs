//! # yosoku: predictive model evaluation kernel
//!
//! Scores records against already-loaded statistical models. The loading
//! stage hands over a resolved model graph; this crate turns raw input
//! values into typed predictions.
//!
//! ## Layers
//!
//! ### 1. Values
//! - Data types and the promotion lattice ([`types`])
//! - Raw scalars, typed field values and the missing sentinel ([`value`])
//! - Precision-generic numeric kernel with link functions ([`value::numeric`])
//!
//! ### 2. Functions
//! Built-in function families and an allow-listed extension registry
//! ([`function`]). Extensions are registered explicitly by the host.
//!
//! ### 3. Evaluation
//! - Consumed model graph ([`model`])
//! - Per-record memoized field resolution ([`eval::context`])
//! - Expression evaluation ([`eval::expression`])
//!
//! ### 4. General regression
//! Parameter and predictor tables, baseline hazards and the per-model-type
//! evaluator ([`regression`]). Static tables are built once per model and
//! shared through a [`cache::ModelArena`].
//!
//! ## Pipeline
//!
//! ```text
//! raw record → EvaluationContext → derived fields → linear predictor → link → OutputValue
//! ```
//!
//! Nothing here installs a tracing subscriber; hosts choose their own.

pub mod cache;
pub mod config;
pub mod error;
pub mod eval;
pub mod function;
pub mod model;
pub mod output;
pub mod regression;
pub mod types;
pub mod value;

// Re-exports
pub use cache::{ModelArena, ModelHandle};
pub use config::{EvaluatorConfig, ParseMode};
pub use error::*;
pub use eval::{EvaluationContext, ExpressionEvaluator, Scope};
pub use function::{Function, FunctionRegistry};
pub use output::{Classification, OutputValue};
pub use regression::GeneralRegressionEvaluator;
pub use types::{DataType, OpType};
pub use value::{FieldValue, NumericValue, TypedValue, Value};
