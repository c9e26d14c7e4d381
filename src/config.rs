use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{model::MathContext, Error, EvalResult};

/// How strictly raw input values are parsed into their declared types.
///
/// Threaded explicitly into every coercion instead of living in ambient
/// state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ParseMode {
    /// Exact textual forms only: no surrounding whitespace, no "1.0" for an
    /// integer.
    #[default]
    Strict,
    /// Trims whitespace and accepts integral decimals and 0/1 booleans.
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub parse_mode: ParseMode,

    /// Overrides the precision declared by the model.
    #[serde(default)]
    pub math_context: Option<MathContext>,

    /// Fetch static tables from the arena cache instead of rebuilding them
    /// for every evaluator.
    #[serde(default = "default_true")]
    pub cache_tables: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::default(),
            math_context: None,
            cache_tables: default_true(),
        }
    }
}

impl EvaluatorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EvalResult<Self> {
        from_file(path)
    }

    pub fn lenient() -> Self {
        Self {
            parse_mode: ParseMode::Lenient,
            ..Self::default()
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> EvalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> EvalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_true() -> bool {
    true
}
