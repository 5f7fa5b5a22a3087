use serde::{Deserialize, Serialize};

use super::error::ModelError;

pub const DEFAULT_HORIZON_MONTHS: usize = 60;
pub const DEFAULT_DISCOUNT_RATE_ANNUAL: f64 = 0.10;
pub const DEFAULT_FIXED_OVERHEAD: f64 = 50_000.0;
/// Longest projection the model will allocate a cohort tensor for.
pub const MAX_HORIZON_MONTHS: usize = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    pub price: f64,
    pub gross_margin: f64,
    pub new_subs_start: f64,
    pub new_subs_end: f64,
    pub retention_scale: f64,
    pub cac: f64,
}

impl Scenario {
    pub fn conservative() -> Self {
        Self {
            name: "conservative".to_string(),
            price: 60.0,
            gross_margin: 0.60,
            new_subs_start: 50.0,
            new_subs_end: 500.0,
            retention_scale: 0.9,
            cac: 200.0,
        }
    }

    pub fn base() -> Self {
        Self {
            name: "base".to_string(),
            price: 70.0,
            gross_margin: 0.65,
            new_subs_start: 100.0,
            new_subs_end: 1500.0,
            retention_scale: 1.0,
            cac: 150.0,
        }
    }

    pub fn aggressive() -> Self {
        Self {
            name: "aggressive".to_string(),
            price: 80.0,
            gross_margin: 0.70,
            new_subs_start: 200.0,
            new_subs_end: 4000.0,
            retention_scale: 1.1,
            cac: 100.0,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::config("scenario name must not be empty"));
        }
        let non_negative = [
            ("price", self.price),
            ("newSubsStart", self.new_subs_start),
            ("newSubsEnd", self.new_subs_end),
            ("retentionScale", self.retention_scale),
            ("cac", self.cac),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::config(format!(
                    "scenario '{}': {field} must be a finite value >= 0",
                    self.name
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.gross_margin) {
            return Err(ModelError::config(format!(
                "scenario '{}': grossMargin must be between 0 and 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Immutable model configuration passed into every projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    pub horizon_months: usize,
    pub discount_rate_annual: f64,
    pub fixed_overhead: f64,
    pub scenarios: Vec<Scenario>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            horizon_months: DEFAULT_HORIZON_MONTHS,
            discount_rate_annual: DEFAULT_DISCOUNT_RATE_ANNUAL,
            fixed_overhead: DEFAULT_FIXED_OVERHEAD,
            scenarios: vec![
                Scenario::conservative(),
                Scenario::base(),
                Scenario::aggressive(),
            ],
        }
    }
}

impl ModelConfig {
    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !(2..=MAX_HORIZON_MONTHS).contains(&self.horizon_months) {
            return Err(ModelError::config(format!(
                "horizonMonths must be between 2 and {MAX_HORIZON_MONTHS}, got {}",
                self.horizon_months
            )));
        }
        if !self.discount_rate_annual.is_finite() || self.discount_rate_annual <= -1.0 {
            return Err(ModelError::config("discountRateAnnual must be > -1"));
        }
        if !self.fixed_overhead.is_finite() || self.fixed_overhead < 0.0 {
            return Err(ModelError::config("fixedOverhead must be >= 0"));
        }
        for (i, scenario) in self.scenarios.iter().enumerate() {
            scenario.validate()?;
            if self.scenarios[..i]
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(&scenario.name))
            {
                return Err(ModelError::config(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }
        Ok(())
    }
}

/// Fraction of a cohort still active, indexed by months since acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RetentionCurve(pub(crate) Vec<f64>);

impl RetentionCurve {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Curve truncated to the first `months` points.
    pub fn truncated(&self, months: usize) -> Self {
        Self(self.0.iter().copied().take(months).collect())
    }
}

/// New subscribers acquired in each month of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AcquisitionProfile(pub(crate) Vec<f64>);

impl AcquisitionProfile {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Active subscribers per `[observation month][cohort month]`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortTensor {
    pub(crate) horizon: usize,
    pub(crate) cells: Vec<f64>,
}

impl CohortTensor {
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn get(&self, month: usize, cohort: usize) -> f64 {
        self.cells[month * self.horizon + cohort]
    }

    pub fn row(&self, month: usize) -> &[f64] {
        let start = month * self.horizon;
        &self.cells[start..start + self.horizon]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.cells.chunks(self.horizon)
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAggregate {
    pub month: u32,
    pub new_subscribers: f64,
    pub active_subscribers: f64,
    pub mrr: f64,
    pub total_revenue: f64,
    pub cumulative_revenue: f64,
    pub cumulative_subscribers: f64,
}

#[derive(Debug, Clone)]
pub struct ScenarioProjection {
    pub scenario: Scenario,
    pub retention: RetentionCurve,
    pub acquisition: AcquisitionProfile,
    pub cohorts: CohortTensor,
    pub months: Vec<MonthlyAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitEconomics {
    pub scenario: String,
    pub price: f64,
    pub gross_margin: f64,
    pub cac: f64,
    pub ltv: f64,
    pub ltv_to_cac: f64,
    /// 1-based month; `None` when CAC is not recovered within the horizon.
    pub payback_month: Option<u32>,
    pub subs_to_break_even: f64,
}

/// LTV/CAC values indexed by `[retention multiplier][cac multiplier]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityGrid {
    pub retention_scales: Vec<f64>,
    pub cac_multipliers: Vec<f64>,
    pub ltv_to_cac: Vec<Vec<f64>>,
}

impl SensitivityGrid {
    pub fn value(&self, retention_scale: f64, cac_multiplier: f64) -> Option<f64> {
        let r = self
            .retention_scales
            .iter()
            .position(|v| (v - retention_scale).abs() <= 1e-12)?;
        let c = self
            .cac_multipliers
            .iter()
            .position(|v| (v - cac_multiplier).abs() <= 1e-12)?;
        Some(self.ltv_to_cac[r][c])
    }
}
