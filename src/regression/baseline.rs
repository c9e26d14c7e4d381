use crate::model::general_regression::{BaseCumHazardTables, BaselineCell};
use crate::value::{TypedValue, Value};
use crate::{EvalResult, ModelError};

/// A step function of cumulative baseline hazard over time.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardCurve {
    max_time: f64,
    cells: Vec<BaselineCell>,
}

impl HazardCurve {
    pub fn new(max_time: f64, cells: &[BaselineCell]) -> Result<Self, ModelError> {
        if !max_time.is_finite() {
            return Err(ModelError::InvalidAttribute {
                element: "BaseCumHazardTables",
                attribute: "maxTime",
                value: max_time.to_string(),
            });
        }
        if let Some(cell) = cells.iter().find(|cell| cell.time.is_nan() || cell.cum_hazard.is_nan()) {
            return Err(ModelError::InvalidAttribute {
                element: "BaselineCell",
                attribute: "time",
                value: cell.time.to_string(),
            });
        }
        let mut cells = cells.to_vec();
        cells.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self { max_time, cells })
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    /// Where `time` falls on the curve.
    pub fn cumulative_hazard(&self, time: f64) -> HazardLookup {
        if time > self.max_time {
            return HazardLookup::After;
        }
        match self.cells.partition_point(|cell| cell.time <= time) {
            0 => HazardLookup::Before,
            index => HazardLookup::At(self.cells[index - 1].cum_hazard),
        }
    }
}

/// Result of a step lookup on a [`HazardCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HazardLookup {
    /// Earlier than the first cell; the cumulative hazard is zero.
    Before,
    /// Hazard of the last cell at or before the queried time.
    At(f64),
    /// Past `maxTime`; undetermined.
    After,
}

#[derive(Debug, Clone, PartialEq)]
enum Curves {
    Single(HazardCurve),
    Stratified(Vec<(Value, HazardCurve)>),
}

/// Baseline cumulative hazard of a Cox model, optionally per stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineHazardTable {
    curves: Curves,
}

impl BaselineHazardTable {
    pub fn build(tables: &BaseCumHazardTables) -> Result<Self, ModelError> {
        let curves = if tables.baseline_strata.is_empty() {
            let max_time = tables.max_time.ok_or(ModelError::MissingAttribute {
                element: "BaseCumHazardTables",
                attribute: "maxTime",
            })?;
            Curves::Single(HazardCurve::new(max_time, &tables.baseline_cells)?)
        } else {
            let strata = tables
                .baseline_strata
                .iter()
                .map(|stratum| {
                    let curve = HazardCurve::new(stratum.max_time, &stratum.baseline_cells)?;
                    Ok((Value::String(stratum.value.clone()), curve))
                })
                .collect::<Result<Vec<_>, ModelError>>()?;
            Curves::Stratified(strata)
        };
        Ok(Self { curves })
    }

    pub fn is_stratified(&self) -> bool {
        matches!(self.curves, Curves::Stratified(_))
    }

    /// The curve for a record; `None` when no stratum matches.
    ///
    /// `stratum` is ignored for unstratified tables.
    pub fn curve(&self, stratum: Option<&TypedValue>) -> EvalResult<Option<&HazardCurve>> {
        match (&self.curves, stratum) {
            (Curves::Single(curve), _) => Ok(Some(curve)),
            (Curves::Stratified(_), None) => Ok(None),
            (Curves::Stratified(strata), Some(value)) => {
                for (key, curve) in strata {
                    if value.equals_value(key)? {
                        return Ok(Some(curve));
                    }
                }
                Ok(None)
            }
        }
    }
}
