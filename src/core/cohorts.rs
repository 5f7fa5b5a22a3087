use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::economics::{lifetime_value, monthly_discount_rate};
use super::engine::retention_curve;
use super::error::ModelError;
use super::types::{ModelConfig, RetentionCurve, Scenario};

pub const MAX_SYNTHETIC_COHORTS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyntheticCohortOptions {
    pub num_cohorts: u32,
    pub observed_months: usize,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for SyntheticCohortOptions {
    fn default() -> Self {
        Self {
            num_cohorts: 12,
            observed_months: 12,
            noise_sd: 0.03,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRetentionPoint {
    pub cohort_month: u32,
    pub age_month: u32,
    pub retention: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortLtv {
    pub cohort_month: u32,
    pub ltv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticCohorts {
    pub scenario: String,
    pub observed_months: usize,
    pub retention: Vec<CohortRetentionPoint>,
    pub ltv: Vec<CohortLtv>,
}

/// Perturbs the scenario curve once per cohort with multiplicative normal noise.
pub fn synthetic_cohorts(
    scenario: &Scenario,
    config: &ModelConfig,
    options: SyntheticCohortOptions,
) -> Result<SyntheticCohorts, ModelError> {
    scenario.validate()?;
    if options.num_cohorts == 0 || options.num_cohorts > MAX_SYNTHETIC_COHORTS {
        return Err(ModelError::config(format!(
            "numCohorts must be between 1 and {MAX_SYNTHETIC_COHORTS}"
        )));
    }
    let noise = Normal::new(1.0, options.noise_sd)
        .ok()
        .filter(|_| options.noise_sd.is_finite())
        .ok_or_else(|| ModelError::config("noiseSd must be a finite value >= 0"))?;
    if options.observed_months == 0 || options.observed_months > config.horizon_months {
        return Err(ModelError::config(format!(
            "observedMonths must be between 1 and {}",
            config.horizon_months
        )));
    }

    let observed_base = retention_curve(config.horizon_months, scenario.retention_scale)?
        .truncated(options.observed_months);
    let monthly_rate = monthly_discount_rate(config.discount_rate_annual);

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut retention = Vec::with_capacity(options.num_cohorts as usize * options.observed_months);
    let mut ltv = Vec::with_capacity(options.num_cohorts as usize);
    for cohort_month in 1..=options.num_cohorts {
        let observed = RetentionCurve::from_values(
            observed_base
                .values()
                .iter()
                .map(|v| (v * noise.sample(&mut rng)).clamp(0.0, 1.0))
                .collect(),
        );

        retention.extend(
            observed
                .values()
                .iter()
                .enumerate()
                .map(|(age, &r)| CohortRetentionPoint {
                    cohort_month,
                    age_month: age as u32 + 1,
                    retention: r,
                }),
        );
        ltv.push(CohortLtv {
            cohort_month,
            ltv: lifetime_value(scenario.price, scenario.gross_margin, &observed, monthly_rate)?,
        });
    }

    Ok(SyntheticCohorts {
        scenario: scenario.name.clone(),
        observed_months: options.observed_months,
        retention,
        ltv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_cohorts() {
        let config = ModelConfig::default();
        let options = SyntheticCohortOptions::default();
        let a = synthetic_cohorts(&Scenario::base(), &config, options).expect("valid");
        let b = synthetic_cohorts(&Scenario::base(), &config, options).expect("valid");
        assert_eq!(a, b);
        assert_eq!(a.retention.len(), 12 * 12);
        assert_eq!(a.ltv.len(), 12);
    }

    #[test]
    fn zero_noise_reproduces_scenario_curve() {
        let config = ModelConfig::default();
        let options = SyntheticCohortOptions {
            num_cohorts: 2,
            noise_sd: 0.0,
            ..SyntheticCohortOptions::default()
        };
        let cohorts = synthetic_cohorts(&Scenario::base(), &config, options).expect("valid");
        let base = retention_curve(60, 1.0).expect("valid scale");
        for point in &cohorts.retention {
            let expected = base.values()[point.age_month as usize - 1];
            assert!((point.retention - expected).abs() <= 1e-12);
        }
        let expected_ltv = lifetime_value(
            70.0,
            0.65,
            &base.truncated(12),
            monthly_discount_rate(0.10),
        )
        .expect("valid inputs");
        for row in &cohorts.ltv {
            assert!((row.ltv - expected_ltv).abs() <= 1e-9);
        }
    }

    #[test]
    fn noisy_retention_stays_in_unit_interval() {
        let options = SyntheticCohortOptions {
            noise_sd: 0.5,
            ..SyntheticCohortOptions::default()
        };
        let cohorts =
            synthetic_cohorts(&Scenario::aggressive(), &ModelConfig::default(), options)
                .expect("valid");
        assert!(
            cohorts
                .retention
                .iter()
                .all(|p| (0.0..=1.0).contains(&p.retention))
        );
    }

    #[test]
    fn different_seeds_give_different_noise() {
        let config = ModelConfig::default();
        let a = synthetic_cohorts(&Scenario::base(), &config, SyntheticCohortOptions::default())
            .expect("valid");
        let b = synthetic_cohorts(
            &Scenario::base(),
            &config,
            SyntheticCohortOptions {
                seed: 7,
                ..SyntheticCohortOptions::default()
            },
        )
        .expect("valid");
        assert_ne!(a.retention, b.retention);
    }

    #[test]
    fn cohort_count_outside_bounds_is_rejected() {
        let config = ModelConfig::default();
        for num_cohorts in [0, MAX_SYNTHETIC_COHORTS + 1, u32::MAX] {
            let options = SyntheticCohortOptions {
                num_cohorts,
                observed_months: 60,
                ..SyntheticCohortOptions::default()
            };
            let err = synthetic_cohorts(&Scenario::base(), &config, options)
                .expect_err("must reject");
            assert!(matches!(err, ModelError::Configuration(_)));
        }
        let options = SyntheticCohortOptions {
            num_cohorts: MAX_SYNTHETIC_COHORTS,
            ..SyntheticCohortOptions::default()
        };
        let cohorts = synthetic_cohorts(&Scenario::base(), &config, options).expect("valid");
        assert_eq!(cohorts.ltv.len(), MAX_SYNTHETIC_COHORTS as usize);
    }

    #[test]
    fn negative_noise_is_rejected() {
        let options = SyntheticCohortOptions {
            noise_sd: -0.1,
            ..SyntheticCohortOptions::default()
        };
        let err = synthetic_cohorts(&Scenario::base(), &ModelConfig::default(), options)
            .expect_err("must reject");
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn observed_months_beyond_horizon_is_rejected() {
        let options = SyntheticCohortOptions {
            observed_months: 61,
            ..SyntheticCohortOptions::default()
        };
        let err = synthetic_cohorts(&Scenario::base(), &ModelConfig::default(), options)
            .expect_err("must reject");
        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
