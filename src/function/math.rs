//! Mathematical and statistical functions.
//!
//! Results are computed at the argument's precision: a `float` argument
//! gives a `float` result. A NaN produced from a non-NaN argument means the
//! argument was outside the function's domain and is reported as
//! [`NumericError::InvalidResult`].

use std::sync::Arc;

use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use statrs::function::erf;

use super::{Arguments, Arity, Function, FunctionTable};
use crate::types::DataType;
use crate::value::{FieldValue, Precision, Value};
use crate::{EvalResult, NumericError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum UnaryMath {
    Log10,
    Ln,
    Sqrt,
    Abs,
    Exp,
    Floor,
    Ceil,
    Round,
    Rint,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Expm1,
    Ln1p,
    Erf,
    #[strum(serialize = "stdNormalCDF")]
    StdNormalCdf,
    #[strum(serialize = "stdNormalPDF")]
    StdNormalPdf,
    #[strum(serialize = "stdNormalIDF")]
    StdNormalIdf,
}

impl UnaryMath {
    fn rounds(self) -> bool {
        matches!(
            self,
            UnaryMath::Floor | UnaryMath::Ceil | UnaryMath::Round | UnaryMath::Rint
        )
    }

    fn apply<P: Precision>(self, x: P) -> P {
        let half = P::from_double(0.5);
        match self {
            UnaryMath::Log10 => x.log10(),
            UnaryMath::Ln => x.ln(),
            UnaryMath::Sqrt => x.sqrt(),
            UnaryMath::Abs => x.abs(),
            UnaryMath::Exp => x.exp(),
            UnaryMath::Floor => x.floor(),
            UnaryMath::Ceil => x.ceil(),
            UnaryMath::Round => (x + half).floor(),
            UnaryMath::Rint => {
                let rounded = x.round();
                if (x - x.trunc()).abs() == half {
                    (x / P::from_double(2.0)).round() * P::from_double(2.0)
                } else {
                    rounded
                }
            }
            UnaryMath::Sin => x.sin(),
            UnaryMath::Cos => x.cos(),
            UnaryMath::Tan => x.tan(),
            UnaryMath::Asin => x.asin(),
            UnaryMath::Acos => x.acos(),
            UnaryMath::Atan => x.atan(),
            UnaryMath::Sinh => x.sinh(),
            UnaryMath::Cosh => x.cosh(),
            UnaryMath::Tanh => x.tanh(),
            UnaryMath::Expm1 => x.exp_m1(),
            UnaryMath::Ln1p => x.ln_1p(),
            UnaryMath::Erf => P::from_double(erf::erf(x.into_double())),
            UnaryMath::StdNormalCdf => P::from_double(standard().cdf(x.into_double())),
            UnaryMath::StdNormalPdf => P::from_double(standard().pdf(x.into_double())),
            UnaryMath::StdNormalIdf => P::from_double(quantile(&standard(), x.into_double())),
        }
    }
}

struct Unary {
    function: UnaryMath,
}

impl Function for Unary {
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let value = arguments.required(0, Some("x"))?;
        arguments.check_numeric(0, value)?;

        if let Value::Integer(i) = value.parsed() {
            if self.function.rounds() {
                return Ok(FieldValue::integer(*i));
            }
            if self.function == UnaryMath::Abs {
                return i.checked_abs().map(FieldValue::integer).ok_or_else(|| {
                    NumericError::InvalidResult {
                        operation: format!("abs({})", i),
                        message: "integer overflow".to_string(),
                    }
                    .into()
                });
            }
        }

        let operation = || format!("{}({})", self.function, value.as_string());
        if value.data_type() == DataType::Float {
            let x = value.as_f64()? as f32;
            let result = checked(self.function.apply(x), x, operation)?;
            return Ok(self.finish(result.into_double(), FieldValue::float(result)));
        }
        let x = value.as_f64()?;
        let result = checked(self.function.apply(x), x, operation)?;
        Ok(self.finish(result, FieldValue::double(result)))
    }
}

impl Unary {
    /// Rounding functions yield integers when the result fits.
    fn finish(&self, result: f64, otherwise: FieldValue) -> FieldValue {
        if self.function.rounds() && result.is_finite() && result.abs() < i64::MAX as f64 {
            FieldValue::integer(result as i64)
        } else {
            otherwise
        }
    }
}

fn checked<P: Precision, F: FnOnce() -> String>(result: P, input: P, operation: F) -> EvalResult<P> {
    if result.is_nan() && !input.is_nan() {
        return Err(NumericError::InvalidResult {
            operation: operation(),
            message: "argument outside of the function domain".to_string(),
        }
        .into());
    }
    Ok(result)
}

fn standard() -> Normal {
    Normal::standard()
}

/// Inverse CDF that never panics: 0 and 1 map to the infinities and
/// anything outside `[0, 1]` to NaN.
fn quantile(distribution: &Normal, p: f64) -> f64 {
    if p == 0.0 {
        f64::NEG_INFINITY
    } else if p == 1.0 {
        f64::INFINITY
    } else if p > 0.0 && p < 1.0 {
        distribution.inverse_cdf(p)
    } else {
        f64::NAN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryMath {
    Pow,
    Atan2,
    Threshold,
}

struct Binary {
    function: BinaryMath,
}

impl Function for Binary {
    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let x = arguments.number(0, Some("x"))?;
        let y = arguments.number(1, Some("y"))?;
        let float = [0, 1].iter().all(|&index| {
            arguments
                .optional(index)
                .map(|value| value.data_type() == DataType::Float)
                .unwrap_or(false)
        });

        match self.function {
            BinaryMath::Threshold => Ok(FieldValue::integer(if x > y { 1 } else { 0 })),
            BinaryMath::Pow => {
                let operation = || format!("pow({}, {})", x, y);
                if float {
                    let result = checked((x as f32).powf(y as f32), x as f32, operation)?;
                    Ok(FieldValue::float(result))
                } else {
                    Ok(FieldValue::double(checked(x.powf(y), x, operation)?))
                }
            }
            BinaryMath::Atan2 => {
                if float {
                    Ok(FieldValue::float((x as f32).atan2(y as f32)))
                } else {
                    Ok(FieldValue::double(x.atan2(y)))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NormalFunction {
    Cdf,
    Pdf,
    Idf,
}

/// `normalCDF(x, mu, sigma)` and friends.
struct ParameterizedNormal {
    function: NormalFunction,
}

impl Function for ParameterizedNormal {
    fn arity(&self) -> Arity {
        Arity::Fixed(3)
    }

    fn evaluate(&self, arguments: Arguments<'_>) -> EvalResult<FieldValue> {
        let x = arguments.number(0, Some("x"))?;
        let mu = arguments.number(1, Some("mu"))?;
        let sigma = arguments.number(2, Some("sigma"))?;

        let invalid = |message: String| NumericError::InvalidResult {
            operation: format!("{}({}, {}, {})", arguments.function(), x, mu, sigma),
            message,
        };
        if sigma.is_nan() || sigma <= 0.0 {
            return Err(invalid(format!("sigma must be positive, got {}", sigma)).into());
        }
        let distribution =
            Normal::new(mu, sigma).map_err(|e| invalid(e.to_string()))?;
        let result = match self.function {
            NormalFunction::Cdf => distribution.cdf(x),
            NormalFunction::Pdf => distribution.pdf(x),
            NormalFunction::Idf => quantile(&distribution, x),
        };
        if result.is_nan() {
            return Err(invalid("argument outside of the function domain".to_string()).into());
        }
        Ok(FieldValue::double(result))
    }
}

pub(super) fn register(table: &mut FunctionTable) {
    use strum::IntoEnumIterator;

    for function in UnaryMath::iter() {
        let name: &'static str = match function {
            UnaryMath::Log10 => "log10",
            UnaryMath::Ln => "ln",
            UnaryMath::Sqrt => "sqrt",
            UnaryMath::Abs => "abs",
            UnaryMath::Exp => "exp",
            UnaryMath::Floor => "floor",
            UnaryMath::Ceil => "ceil",
            UnaryMath::Round => "round",
            UnaryMath::Rint => "rint",
            UnaryMath::Sin => "sin",
            UnaryMath::Cos => "cos",
            UnaryMath::Tan => "tan",
            UnaryMath::Asin => "asin",
            UnaryMath::Acos => "acos",
            UnaryMath::Atan => "atan",
            UnaryMath::Sinh => "sinh",
            UnaryMath::Cosh => "cosh",
            UnaryMath::Tanh => "tanh",
            UnaryMath::Expm1 => "expm1",
            UnaryMath::Ln1p => "ln1p",
            UnaryMath::Erf => "erf",
            UnaryMath::StdNormalCdf => "stdNormalCDF",
            UnaryMath::StdNormalPdf => "stdNormalPDF",
            UnaryMath::StdNormalIdf => "stdNormalIDF",
        };
        table.insert(name, Arc::new(Unary { function }));
    }

    for (name, function) in [
        ("pow", BinaryMath::Pow),
        ("atan2", BinaryMath::Atan2),
        ("threshold", BinaryMath::Threshold),
    ] {
        table.insert(name, Arc::new(Binary { function }));
    }

    for (name, function) in [
        ("normalCDF", NormalFunction::Cdf),
        ("normalPDF", NormalFunction::Pdf),
        ("normalIDF", NormalFunction::Idf),
    ] {
        table.insert(name, Arc::new(ParameterizedNormal { function }));
    }
}
