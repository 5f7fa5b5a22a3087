use tracing::debug;

use super::error::ModelError;
use super::types::{
    AcquisitionProfile, CohortTensor, MAX_HORIZON_MONTHS, ModelConfig, MonthlyAggregate,
    RetentionCurve, Scenario, ScenarioProjection,
};

/// Retention waypoints as (months since signup, fraction retained).
const RETENTION_WAYPOINTS: [(f64, f64); 6] = [
    (0.0, 1.00),
    (1.0, 0.75),
    (3.0, 0.60),
    (6.0, 0.50),
    (12.0, 0.40),
    (60.0, 0.20),
];

pub fn base_retention_curve(horizon: usize) -> RetentionCurve {
    let values = (0..horizon)
        .map(|month| interpolate_waypoints(month as f64).clamp(0.0, 1.0))
        .collect();
    RetentionCurve(values)
}

pub fn retention_curve(horizon: usize, scale: f64) -> Result<RetentionCurve, ModelError> {
    check_horizon_cap(horizon)?;
    if !scale.is_finite() || scale < 0.0 {
        return Err(ModelError::config("retention scale must be a finite value >= 0"));
    }
    Ok(scale_retention(&base_retention_curve(horizon), scale))
}

pub(crate) fn scale_retention(curve: &RetentionCurve, scale: f64) -> RetentionCurve {
    RetentionCurve(
        curve
            .values()
            .iter()
            .map(|v| (v * scale).clamp(0.0, 1.0))
            .collect(),
    )
}

fn check_horizon_cap(horizon: usize) -> Result<(), ModelError> {
    if horizon > MAX_HORIZON_MONTHS {
        return Err(ModelError::config(format!(
            "horizon of {horizon} months exceeds the maximum of {MAX_HORIZON_MONTHS}"
        )));
    }
    Ok(())
}

fn interpolate_waypoints(month: f64) -> f64 {
    let (first_x, first_y) = RETENTION_WAYPOINTS[0];
    if month <= first_x {
        return first_y;
    }
    for pair in RETENTION_WAYPOINTS.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if month <= x1 {
            let w = (month - x0) / (x1 - x0);
            return y0 + (y1 - y0) * w;
        }
    }
    RETENTION_WAYPOINTS[RETENTION_WAYPOINTS.len() - 1].1
}

pub fn acquisition_profile(
    start: f64,
    end: f64,
    horizon: usize,
) -> Result<AcquisitionProfile, ModelError> {
    if horizon < 2 {
        return Err(ModelError::config(format!(
            "acquisition ramp needs a horizon of at least 2 months, got {horizon}"
        )));
    }
    check_horizon_cap(horizon)?;
    if !start.is_finite() || !end.is_finite() || start < 0.0 || end < 0.0 {
        return Err(ModelError::config(
            "acquisition counts must be finite values >= 0",
        ));
    }

    let last = horizon - 1;
    let step = (end - start) / last as f64;
    let values = (0..horizon)
        .map(|i| if i == last { end } else { start + step * i as f64 })
        .collect();
    Ok(AcquisitionProfile(values))
}

pub fn simulate_cohorts(
    retention: &RetentionCurve,
    acquisition: &AcquisitionProfile,
) -> Result<CohortTensor, ModelError> {
    let horizon = acquisition.len();
    if retention.len() != horizon {
        return Err(ModelError::config(format!(
            "retention curve has {} months but acquisition profile has {horizon}",
            retention.len()
        )));
    }

    let curve = retention.values();
    let mut cells = vec![0.0; horizon * horizon];
    for (cohort, &size) in acquisition.values().iter().enumerate() {
        for month in cohort..horizon {
            cells[month * horizon + cohort] = size * curve[month - cohort];
        }
    }
    Ok(CohortTensor { horizon, cells })
}

pub fn aggregate_months(
    cohorts: &CohortTensor,
    acquisition: &AcquisitionProfile,
    price: f64,
) -> Vec<MonthlyAggregate> {
    let mut cumulative_revenue = 0.0;
    let mut cumulative_subscribers = 0.0;

    cohorts
        .rows()
        .zip(acquisition.values())
        .enumerate()
        .map(|(idx, (row, &new_subscribers))| {
            let active_subscribers: f64 = row.iter().sum();
            let mrr = active_subscribers * price;
            cumulative_revenue += mrr;
            cumulative_subscribers += new_subscribers;
            MonthlyAggregate {
                month: idx as u32 + 1,
                new_subscribers,
                active_subscribers,
                mrr,
                total_revenue: mrr,
                cumulative_revenue,
                cumulative_subscribers,
            }
        })
        .collect()
}

pub fn project_scenario(
    scenario: &Scenario,
    horizon: usize,
) -> Result<ScenarioProjection, ModelError> {
    scenario.validate()?;
    let retention = retention_curve(horizon, scenario.retention_scale)?;
    let acquisition =
        acquisition_profile(scenario.new_subs_start, scenario.new_subs_end, horizon)?;
    let cohorts = simulate_cohorts(&retention, &acquisition)?;
    let months = aggregate_months(&cohorts, &acquisition, scenario.price);

    if let Some(last) = months.last() {
        debug!(
            scenario = %scenario.name,
            horizon,
            final_active = last.active_subscribers,
            cumulative_revenue = last.cumulative_revenue,
            "projected scenario"
        );
    }

    Ok(ScenarioProjection {
        scenario: scenario.clone(),
        retention,
        acquisition,
        cohorts,
        months,
    })
}

pub fn project_all(config: &ModelConfig) -> Result<Vec<ScenarioProjection>, ModelError> {
    config.validate()?;
    config
        .scenarios
        .iter()
        .map(|scenario| project_scenario(scenario, config.horizon_months))
        .collect()
}
