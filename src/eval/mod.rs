pub mod context;
pub mod expression;

pub use context::{EvaluationContext, Scope};
pub use expression::ExpressionEvaluator;
