use super::engine::{retention_curve, scale_retention};
use super::error::ModelError;
use super::types::{ModelConfig, RetentionCurve, Scenario, SensitivityGrid, UnitEconomics};

pub const DEFAULT_CAC_MULTIPLIERS: [f64; 2] = [1.0, 1.5];
pub const DEFAULT_RETENTION_SCALES: [f64; 2] = [1.0, 0.95];

pub fn monthly_discount_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

fn non_negative(field: &str, value: f64) -> Result<f64, ModelError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::config(format!(
            "{field} must be a finite value >= 0, got {value}"
        )));
    }
    Ok(value)
}

/// Margin earned per active subscriber per month.
fn margin_per_month(price: f64, gross_margin: f64) -> Result<f64, ModelError> {
    let price = non_negative("price", price)?;
    if !(0.0..=1.0).contains(&gross_margin) {
        return Err(ModelError::config(format!(
            "grossMargin must be between 0 and 1, got {gross_margin}"
        )));
    }
    Ok(price * gross_margin)
}

/// Discounted margin stream of one acquired subscriber over the curve's horizon.
pub fn lifetime_value(
    price: f64,
    gross_margin: f64,
    retention: &RetentionCurve,
    monthly_rate: f64,
) -> Result<f64, ModelError> {
    let margin = margin_per_month(price, gross_margin)?;
    if !monthly_rate.is_finite() || monthly_rate <= -1.0 {
        return Err(ModelError::config(format!(
            "monthly discount rate must be > -1, got {monthly_rate}"
        )));
    }
    let growth = 1.0 + monthly_rate;
    Ok(retention
        .values()
        .iter()
        .enumerate()
        .map(|(t, r)| margin * r / growth.powi(t as i32))
        .sum())
}

/// First 1-based month where undiscounted cumulative margin covers `cac`.
pub fn payback_month(
    price: f64,
    gross_margin: f64,
    retention: &RetentionCurve,
    cac: f64,
) -> Result<Option<u32>, ModelError> {
    let margin = margin_per_month(price, gross_margin)?;
    let cac = non_negative("cac", cac)?;
    let mut cumulative = 0.0;
    for (t, r) in retention.values().iter().enumerate() {
        cumulative += margin * r;
        if cumulative >= cac {
            return Ok(Some(t as u32 + 1));
        }
    }
    Ok(None)
}

pub fn ltv_to_cac(ltv: f64, cac: f64) -> Result<f64, ModelError> {
    if !ltv.is_finite() {
        return Err(ModelError::config(format!("LTV must be finite, got {ltv}")));
    }
    if non_negative("cac", cac)? == 0.0 {
        return Err(ModelError::division("LTV/CAC is undefined for a zero CAC"));
    }
    Ok(ltv / cac)
}

pub fn break_even_subscribers(
    fixed_overhead: f64,
    price: f64,
    gross_margin: f64,
) -> Result<f64, ModelError> {
    let fixed_overhead = non_negative("fixedOverhead", fixed_overhead)?;
    let margin_per_sub = margin_per_month(price, gross_margin)?;
    if margin_per_sub == 0.0 {
        return Err(ModelError::division(
            "break-even is undefined when price x margin is zero",
        ));
    }
    Ok(fixed_overhead / margin_per_sub)
}

pub fn unit_economics(
    scenario: &Scenario,
    config: &ModelConfig,
) -> Result<UnitEconomics, ModelError> {
    scenario.validate()?;
    let retention = retention_curve(config.horizon_months, scenario.retention_scale)?;
    let monthly_rate = monthly_discount_rate(config.discount_rate_annual);

    let ltv = lifetime_value(
        scenario.price,
        scenario.gross_margin,
        &retention,
        monthly_rate,
    )?;
    Ok(UnitEconomics {
        scenario: scenario.name.clone(),
        price: scenario.price,
        gross_margin: scenario.gross_margin,
        cac: scenario.cac,
        ltv,
        ltv_to_cac: ltv_to_cac(ltv, scenario.cac)?,
        payback_month: payback_month(
            scenario.price,
            scenario.gross_margin,
            &retention,
            scenario.cac,
        )?,
        subs_to_break_even: break_even_subscribers(
            config.fixed_overhead,
            scenario.price,
            scenario.gross_margin,
        )?,
    })
}

pub fn unit_economics_summary(config: &ModelConfig) -> Result<Vec<UnitEconomics>, ModelError> {
    config.validate()?;
    config
        .scenarios
        .iter()
        .map(|scenario| unit_economics(scenario, config))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SensitivityInputs<'a> {
    pub price: f64,
    pub gross_margin: f64,
    pub retention: &'a RetentionCurve,
    pub cac: f64,
    pub monthly_rate: f64,
}

/// LTV/CAC for every (retention multiplier, CAC multiplier) pair.
pub fn ltv_sensitivity(
    inputs: SensitivityInputs<'_>,
    retention_scales: &[f64],
    cac_multipliers: &[f64],
) -> Result<SensitivityGrid, ModelError> {
    non_negative("cac", inputs.cac)?;
    if retention_scales.is_empty() || cac_multipliers.is_empty() {
        return Err(ModelError::config(
            "sensitivity needs at least one retention scale and one CAC multiplier",
        ));
    }
    if retention_scales
        .iter()
        .chain(cac_multipliers)
        .any(|m| !m.is_finite() || *m < 0.0)
    {
        return Err(ModelError::config(
            "sensitivity multipliers must be finite values >= 0",
        ));
    }

    let mut grid = Vec::with_capacity(retention_scales.len());
    for &scale in retention_scales {
        let curve = scale_retention(inputs.retention, scale);
        let ltv = lifetime_value(inputs.price, inputs.gross_margin, &curve, inputs.monthly_rate)?;
        let row = cac_multipliers
            .iter()
            .map(|&multiplier| ltv_to_cac(ltv, inputs.cac * multiplier))
            .collect::<Result<Vec<_>, _>>()?;
        grid.push(row);
    }

    Ok(SensitivityGrid {
        retention_scales: retention_scales.to_vec(),
        cac_multipliers: cac_multipliers.to_vec(),
        ltv_to_cac: grid,
    })
}

pub fn scenario_sensitivity(
    scenario: &Scenario,
    config: &ModelConfig,
) -> Result<SensitivityGrid, ModelError> {
    scenario.validate()?;
    let retention = retention_curve(config.horizon_months, scenario.retention_scale)?;
    ltv_sensitivity(
        SensitivityInputs {
            price: scenario.price,
            gross_margin: scenario.gross_margin,
            retention: &retention,
            cac: scenario.cac,
            monthly_rate: monthly_discount_rate(config.discount_rate_annual),
        },
        &DEFAULT_RETENTION_SCALES,
        &DEFAULT_CAC_MULTIPLIERS,
    )
}
