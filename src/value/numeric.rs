//! Precision-generic numeric kernel and link functions.
//!
//! ## Design notes
//!
//! * Every operation runs at the value's own precision. A model evaluated
//!   in `float` context never widens its arithmetic to `f64`; the only
//!   exception is the normal CDF/quantile, which is computed by `statrs` in
//!   `f64` and narrowed back.
//! * Operations mutate in place and return `&mut Self` so a prediction reads
//!   as one chain: `value.subtract(reference).exp().multiply(hazard)`.

use core::fmt;

use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::types::{DataType, OpType};
use crate::value::{TypedValue, Value};
use crate::{EvalResult, ModelError, NumericError};

/// Floating-point precision a model is evaluated at.
pub trait Precision: Float + FloatConst + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn from_double(value: f64) -> Self;

    fn into_double(self) -> f64;

    fn into_typed(self) -> TypedValue;
}

impl Precision for f32 {
    const DATA_TYPE: DataType = DataType::Float;

    fn from_double(value: f64) -> Self {
        value as f32
    }

    fn into_double(self) -> f64 {
        self as f64
    }

    fn into_typed(self) -> TypedValue {
        TypedValue::new(DataType::Float, OpType::Continuous, Value::Float(self))
    }
}

impl Precision for f64 {
    const DATA_TYPE: DataType = DataType::Double;

    fn from_double(value: f64) -> Self {
        value
    }

    fn into_double(self) -> f64 {
        self
    }

    fn into_typed(self) -> TypedValue {
        TypedValue::new(DataType::Double, OpType::Continuous, Value::Double(self))
    }
}

/// Link function of a generalized linear model.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum LinkFunction {
    Cloglog,
    Identity,
    Log,
    Logc,
    Logit,
    Loglog,
    Negbin,
    Oddspower,
    Power,
    Probit,
    Cauchit,
}

/// Link applied to cumulative probabilities of an ordinal target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CumulativeLink {
    Logit,
    Probit,
    Cloglog,
    Loglog,
    Cauchit,
}

/// Link parameters that passed [`LinkFunction::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkParameters {
    pub dist_parameter: Option<f64>,
    pub link_parameter: Option<f64>,
}

impl LinkFunction {
    /// Checks the parameter requirements of this link.
    ///
    /// `negbin` needs a dispersion and takes no link parameter, `power` and
    /// `oddspower` need a link parameter and take no dispersion, every other
    /// link takes neither.
    pub fn validate(
        self,
        dist_parameter: Option<f64>,
        link_parameter: Option<f64>,
    ) -> Result<LinkParameters, ModelError> {
        let missing = |attribute| ModelError::MissingAttribute {
            element: "GeneralRegressionModel",
            attribute,
        };
        let forbidden = |attribute, value: f64| ModelError::InvalidAttribute {
            element: "GeneralRegressionModel",
            attribute,
            value: value.to_string(),
        };

        match self {
            LinkFunction::Negbin => {
                if dist_parameter.is_none() {
                    return Err(missing("distParameter"));
                }
                if let Some(value) = link_parameter {
                    return Err(forbidden("linkParameter", value));
                }
            }
            LinkFunction::Power | LinkFunction::Oddspower => {
                if let Some(value) = dist_parameter {
                    return Err(forbidden("distParameter", value));
                }
                if link_parameter.is_none() {
                    return Err(missing("linkParameter"));
                }
            }
            _ => {
                if let Some(value) = dist_parameter {
                    return Err(forbidden("distParameter", value));
                }
                if let Some(value) = link_parameter {
                    return Err(forbidden("linkParameter", value));
                }
            }
        }
        Ok(LinkParameters {
            dist_parameter,
            link_parameter,
        })
    }
}

impl From<CumulativeLink> for LinkFunction {
    fn from(link: CumulativeLink) -> Self {
        match link {
            CumulativeLink::Logit => LinkFunction::Logit,
            CumulativeLink::Probit => LinkFunction::Probit,
            CumulativeLink::Cloglog => LinkFunction::Cloglog,
            CumulativeLink::Loglog => LinkFunction::Loglog,
            CumulativeLink::Cauchit => LinkFunction::Cauchit,
        }
    }
}

/// A single scalar at precision `P`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct NumericValue<P: Precision> {
    value: P,
}

impl<P: Precision> fmt::Display for NumericValue<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<P: Precision> NumericValue<P> {
    pub fn new(value: P) -> Self {
        Self { value }
    }

    pub fn from_f64(value: f64) -> Self {
        Self::new(P::from_double(value))
    }

    pub fn zero() -> Self {
        Self::new(P::zero())
    }

    pub fn one() -> Self {
        Self::new(P::one())
    }

    pub fn value(&self) -> P {
        self.value
    }

    pub fn to_f64(&self) -> f64 {
        self.value.into_double()
    }

    pub fn is_nan(&self) -> bool {
        self.value.is_nan()
    }

    pub fn add(&mut self, other: P) -> &mut Self {
        self.value = self.value + other;
        self
    }

    pub fn subtract(&mut self, other: P) -> &mut Self {
        self.value = self.value - other;
        self
    }

    pub fn multiply(&mut self, other: P) -> &mut Self {
        self.value = self.value * other;
        self
    }

    pub fn divide(&mut self, other: P) -> &mut Self {
        self.value = self.value / other;
        self
    }

    /// `self += coefficient * factor`
    pub fn add_product(&mut self, coefficient: P, factor: P) -> &mut Self {
        self.value = self.value + coefficient * factor;
        self
    }

    pub fn exp(&mut self) -> &mut Self {
        self.value = self.value.exp();
        self
    }

    pub fn ln(&mut self) -> &mut Self {
        self.value = self.value.ln();
        self
    }

    pub fn pow(&mut self, exponent: P) -> &mut Self {
        self.value = self.value.powf(exponent);
        self
    }

    pub fn reciprocal(&mut self) -> &mut Self {
        self.value = self.value.recip();
        self
    }

    pub fn restrict(&mut self, min: P, max: P) -> &mut Self {
        self.value = self.value.max(min).min(max);
        self
    }

    /// Maps a linear predictor to the response scale (the inverse link).
    ///
    /// Parameter requirements are checked first; a result that becomes NaN
    /// from a non-NaN input is reported instead of returned.
    pub fn apply_link(
        &mut self,
        link: LinkFunction,
        dist_parameter: Option<f64>,
        link_parameter: Option<f64>,
    ) -> EvalResult<&mut Self> {
        let params = link.validate(dist_parameter, link_parameter)?;
        let x = self.value;
        let one = P::one();

        self.value = match link {
            LinkFunction::Identity => x,
            LinkFunction::Log => x.exp(),
            LinkFunction::Logit => one / (one + (-x).exp()),
            LinkFunction::Probit => standard_normal_cdf(x),
            LinkFunction::Cloglog => one - (-(x.exp())).exp(),
            LinkFunction::Loglog => (-((-x).exp())).exp(),
            LinkFunction::Logc => one - (-x).exp(),
            LinkFunction::Cauchit => P::from_double(0.5) + x.atan() / P::PI(),
            LinkFunction::Negbin => {
                let k = P::from_double(params.dist_parameter.unwrap_or_default());
                one / (k * ((-x).exp() - one))
            }
            LinkFunction::Power => {
                let p = P::from_double(params.link_parameter.unwrap_or_default());
                if p == P::zero() {
                    x.exp()
                } else {
                    x.powf(one / p)
                }
            }
            LinkFunction::Oddspower => {
                let p = P::from_double(params.link_parameter.unwrap_or_default());
                if p == P::zero() {
                    one / (one + (-x).exp())
                } else {
                    one / (one + (one + p * x).powf(-(one / p)))
                }
            }
        };
        self.check_not_nan(x, || format!("{} link", link))
    }

    /// Cumulative variant used by ordinal models; never takes parameters.
    pub fn apply_cumulative_link(&mut self, link: CumulativeLink) -> EvalResult<&mut Self> {
        self.apply_link(link.into(), None, None)
    }

    /// Maps a response-scale value back to the linear predictor scale.
    pub fn link(
        &mut self,
        link: LinkFunction,
        dist_parameter: Option<f64>,
        link_parameter: Option<f64>,
    ) -> EvalResult<&mut Self> {
        let params = link.validate(dist_parameter, link_parameter)?;
        let mu = self.value;
        let one = P::one();

        self.value = match link {
            LinkFunction::Identity => mu,
            LinkFunction::Log => mu.ln(),
            LinkFunction::Logit => (mu / (one - mu)).ln(),
            LinkFunction::Probit => standard_normal_quantile(mu),
            LinkFunction::Cloglog => (-((one - mu).ln())).ln(),
            LinkFunction::Loglog => -((-(mu.ln())).ln()),
            LinkFunction::Logc => -((one - mu).ln()),
            LinkFunction::Cauchit => (P::PI() * (mu - P::from_double(0.5))).tan(),
            LinkFunction::Negbin => {
                let k = P::from_double(params.dist_parameter.unwrap_or_default());
                (mu / (mu + one / k)).ln()
            }
            LinkFunction::Power => {
                let p = P::from_double(params.link_parameter.unwrap_or_default());
                if p == P::zero() {
                    mu.ln()
                } else {
                    mu.powf(p)
                }
            }
            LinkFunction::Oddspower => {
                let p = P::from_double(params.link_parameter.unwrap_or_default());
                let odds = mu / (one - mu);
                if p == P::zero() {
                    odds.ln()
                } else {
                    (odds.powf(p) - one) / p
                }
            }
        };
        self.check_not_nan(mu, || format!("{} link inverse", link))
    }

    fn check_not_nan<F: FnOnce() -> String>(&mut self, input: P, operation: F) -> EvalResult<&mut Self> {
        if self.value.is_nan() && !input.is_nan() {
            return Err(NumericError::NaNResult {
                operation: operation(),
            }
            .into());
        }
        Ok(self)
    }
}

fn standard_normal() -> Normal {
    Normal::standard()
}

fn standard_normal_cdf<P: Precision>(x: P) -> P {
    P::from_double(standard_normal().cdf(x.into_double()))
}

fn standard_normal_quantile<P: Precision>(p: P) -> P {
    let p = p.into_double();
    if !(p > 0.0 && p < 1.0) {
        return P::from_double(if p == 0.0 {
            f64::NEG_INFINITY
        } else if p == 1.0 {
            f64::INFINITY
        } else {
            f64::NAN
        });
    }
    P::from_double(standard_normal().inverse_cdf(p))
}
