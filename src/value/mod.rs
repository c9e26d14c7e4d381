pub mod numeric;
pub mod scalar;
pub mod typed;

pub use numeric::{CumulativeLink, LinkFunction, LinkParameters, NumericValue, Precision};
pub use scalar::Value;
pub use typed::{coerce, FieldValue, TypedValue};
