mod cohorts;
mod economics;
mod engine;
mod error;
mod market;
mod types;

pub use cohorts::{
    CohortLtv, CohortRetentionPoint, MAX_SYNTHETIC_COHORTS, SyntheticCohortOptions, SyntheticCohorts,
    synthetic_cohorts,
};
pub use economics::{
    DEFAULT_CAC_MULTIPLIERS, DEFAULT_RETENTION_SCALES, SensitivityInputs, break_even_subscribers,
    lifetime_value, ltv_sensitivity, ltv_to_cac, monthly_discount_rate, payback_month,
    scenario_sensitivity, unit_economics, unit_economics_summary,
};
pub use engine::{
    acquisition_profile, aggregate_months, base_retention_curve, project_all, project_scenario,
    retention_curve, simulate_cohorts,
};
pub use error::ModelError;
pub use market::{MarketAssumptions, MarketFunnel, PenetrationRow, market_funnel};
pub use types::{
    AcquisitionProfile, CohortTensor, DEFAULT_DISCOUNT_RATE_ANNUAL, DEFAULT_FIXED_OVERHEAD,
    DEFAULT_HORIZON_MONTHS, MAX_HORIZON_MONTHS, ModelConfig, MonthlyAggregate, RetentionCurve, Scenario,
    ScenarioProjection, SensitivityGrid, UnitEconomics,
};
