use serde::{Deserialize, Serialize};

use super::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketAssumptions {
    /// Addressable population (ages 50-75 in the launch state).
    pub population: f64,
    pub interested_fraction: f64,
    pub pill_form_fraction: f64,
    pub capture_rates: Vec<f64>,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        Self {
            population: 4_000_000.0,
            interested_fraction: 0.30,
            pill_form_fraction: 0.50,
            capture_rates: vec![0.005, 0.01],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenetrationRow {
    pub capture_rate: f64,
    pub subscribers_year5: f64,
    pub annual_revenue_year5: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFunnel {
    pub population: f64,
    pub tam: f64,
    pub sam: f64,
    pub rows: Vec<PenetrationRow>,
}

pub fn market_funnel(assumptions: &MarketAssumptions, price: f64) -> Result<MarketFunnel, ModelError> {
    if !assumptions.population.is_finite() || assumptions.population < 0.0 {
        return Err(ModelError::config("population must be >= 0"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(ModelError::config("price must be >= 0"));
    }
    let fractions = [
        ("interestedFraction", assumptions.interested_fraction),
        ("pillFormFraction", assumptions.pill_form_fraction),
    ];
    for (field, value) in fractions {
        if !(0.0..=1.0).contains(&value) {
            return Err(ModelError::config(format!("{field} must be between 0 and 1")));
        }
    }
    if assumptions
        .capture_rates
        .iter()
        .any(|r| !(0.0..=1.0).contains(r))
    {
        return Err(ModelError::config("capture rates must be between 0 and 1"));
    }

    let tam = assumptions.population * assumptions.interested_fraction;
    let sam = tam * assumptions.pill_form_fraction;
    let rows = assumptions
        .capture_rates
        .iter()
        .map(|&capture_rate| {
            let subscribers_year5 = assumptions.population * capture_rate;
            PenetrationRow {
                capture_rate,
                subscribers_year5,
                annual_revenue_year5: subscribers_year5 * price * 12.0,
            }
        })
        .collect();

    Ok(MarketFunnel {
        population: assumptions.population,
        tam,
        sam,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn default_funnel_at_base_price() {
        let funnel = market_funnel(&MarketAssumptions::default(), 70.0).expect("valid inputs");
        assert_approx(funnel.tam, 1_200_000.0);
        assert_approx(funnel.sam, 600_000.0);
        assert_eq!(funnel.rows.len(), 2);
        assert_approx(funnel.rows[0].subscribers_year5, 20_000.0);
        assert_approx(funnel.rows[0].annual_revenue_year5, 16_800_000.0);
        assert_approx(funnel.rows[1].subscribers_year5, 40_000.0);
        assert_approx(funnel.rows[1].annual_revenue_year5, 33_600_000.0);
    }

    #[test]
    fn funnel_rejects_out_of_range_fraction() {
        let assumptions = MarketAssumptions {
            pill_form_fraction: 1.2,
            ..MarketAssumptions::default()
        };
        let err = market_funnel(&assumptions, 70.0).expect_err("must reject");
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn funnel_rejects_negative_price() {
        assert!(market_funnel(&MarketAssumptions::default(), -1.0).is_err());
    }
}
