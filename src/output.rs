use std::fmt;

use crate::value::TypedValue;

/// Probability distribution over target categories, in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    probabilities: Vec<(String, f64)>,
}

impl Classification {
    pub fn new(probabilities: Vec<(String, f64)>) -> Self {
        Self { probabilities }
    }

    pub fn probability(&self, category: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(candidate, _)| candidate == category)
            .map(|(_, probability)| *probability)
    }

    /// The category with the highest probability; the first one on ties.
    pub fn most_probable(&self) -> Option<&str> {
        let mut best: Option<&(String, f64)> = None;
        for entry in &self.probabilities {
            if best.map_or(true, |(_, p)| entry.1 > *p) {
                best = Some(entry);
            }
        }
        best.map(|(category, _)| category.as_str())
    }

    pub fn probabilities(&self) -> &[(String, f64)] {
        &self.probabilities
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.probabilities.iter().map(|(category, _)| category.as_str())
    }
}

/// Result of evaluating a model for one output field.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Missing,
    Value(TypedValue),
    Classification(Classification),
}

impl OutputValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, OutputValue::Missing)
    }

    pub fn value(&self) -> Option<&TypedValue> {
        match self {
            OutputValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(|value| value.as_f64().ok())
    }

    pub fn classification(&self) -> Option<&Classification> {
        match self {
            OutputValue::Classification(classification) => Some(classification),
            _ => None,
        }
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputValue::Missing => write!(f, "missing"),
            OutputValue::Value(value) => write!(f, "{}", value.parsed()),
            OutputValue::Classification(classification) => match classification.most_probable() {
                Some(category) => write!(f, "{}", category),
                None => write!(f, "missing"),
            },
        }
    }
}
