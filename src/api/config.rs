use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::core::{MarketAssumptions, ModelConfig};
use crate::dosing::Catalog;

/// Everything the adapters need at start-up. The JSON file mirrors this shape,
/// with the model fields at the top level:
///
/// ```json
/// { "horizonMonths": 60, "discountRateAnnual": 0.1, "scenarios": [...], "market": {...} }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(flatten)]
    pub model: ModelConfig,
    pub market: MarketAssumptions,
    pub catalog: Catalog,
}

impl AppConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid configuration JSON")?;
        config.model.validate()?;
        Ok(config)
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration from {}", path.display()))?;
    let config = AppConfig::from_json(&raw)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    info!(
        path = %path.display(),
        scenarios = config.model.scenarios.len(),
        "loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scenario;

    #[test]
    fn missing_path_uses_built_in_tables() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config.model, ModelConfig::default());
        assert_eq!(config.market, MarketAssumptions::default());
        assert_eq!(config.catalog, Catalog::default());
    }

    #[test]
    fn example_config_matches_built_in_tables() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/clarity.example.json");
        let config = load_config(Some(&path)).expect("example config loads");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config = AppConfig::from_json(
            r#"{
              "horizonMonths": 36,
              "scenarios": [
                {"name": "pilot", "price": 50, "grossMargin": 0.5, "newSubsStart": 10,
                 "newSubsEnd": 100, "retentionScale": 0.8, "cac": 120}
              ],
              "market": {"population": 1000000}
            }"#,
        )
        .expect("valid config");
        assert_eq!(config.model.horizon_months, 36);
        assert_eq!(config.model.discount_rate_annual, 0.10);
        assert_eq!(config.model.scenarios.len(), 1);
        assert_eq!(config.model.scenario("PILOT").map(|s| s.cac), Some(120.0));
        assert_eq!(config.market.population, 1_000_000.0);
        assert_eq!(config.market.capture_rates, vec![0.005, 0.01]);
    }

    #[test]
    fn invalid_scenario_in_file_is_rejected() {
        let mut bad = Scenario::base();
        bad.gross_margin = 2.0;
        let json = serde_json::json!({ "scenarios": [bad] }).to_string();
        let err = AppConfig::from_json(&json).expect_err("must reject");
        assert!(format!("{err:#}").contains("grossMargin"));
    }

    #[test]
    fn unreadable_path_reports_location() {
        let err = load_config(Some(Path::new("/nonexistent/clarity.json"))).expect_err("must fail");
        assert!(format!("{err:#}").contains("/nonexistent/clarity.json"));
    }
}
