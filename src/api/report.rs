use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::info;

use super::config::{AppConfig, load_config};
use crate::core::{
    MarketFunnel, MonthlyAggregate, SensitivityGrid, SyntheticCohortOptions, SyntheticCohorts,
    UnitEconomics, market_funnel, project_scenario, scenario_sensitivity, synthetic_cohorts,
    unit_economics_summary,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = "base", help = "Scenario used for the monthly table")]
    pub scenario: String,
    #[arg(long, default_value_t = 12, help = "Number of months to print")]
    pub months: usize,
    #[arg(long, help = "JSON file with scenarios, market assumptions and catalog")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Projection horizon in months, overrides the config file")]
    pub horizon_months: Option<usize>,
    #[arg(
        long,
        help = "Annual discount rate in percent, e.g. 10, overrides the config file"
    )]
    pub discount_rate: Option<f64>,
    #[arg(long, help = "Fixed monthly overhead for break-even, overrides the config file")]
    pub fixed_overhead: Option<f64>,
    #[arg(long, default_value_t = 42, help = "Seed for the synthetic cohort noise")]
    pub seed: u64,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    scenario: String,
    months: Vec<MonthlyAggregate>,
    unit_economics: Vec<UnitEconomics>,
    sensitivity: SensitivityGrid,
    market: MarketFunnel,
    cohorts: SyntheticCohorts,
}

pub fn render_report(args: &ReportArgs) -> anyhow::Result<String> {
    let config = load_config(args.config.as_deref())?;
    let config = apply_overrides(config, args)?;
    let report = build_report(&config, args)?;
    info!(scenario = %report.scenario, months = report.months.len(), "built report");

    match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&report).context("failed to serialize report")
        }
        OutputFormat::Table => Ok(render_tables(&report)),
    }
}

fn apply_overrides(mut config: AppConfig, args: &ReportArgs) -> anyhow::Result<AppConfig> {
    if let Some(v) = args.horizon_months {
        config.model.horizon_months = v;
    }
    if let Some(v) = args.discount_rate {
        config.model.discount_rate_annual = v / 100.0;
    }
    if let Some(v) = args.fixed_overhead {
        config.model.fixed_overhead = v;
    }
    config.model.validate()?;
    Ok(config)
}

fn build_report(config: &AppConfig, args: &ReportArgs) -> anyhow::Result<Report> {
    let model = &config.model;
    let scenario = model.scenario(&args.scenario).ok_or_else(|| {
        anyhow!(
            "unknown scenario '{}'; expected one of: {}",
            args.scenario,
            model.scenario_names().join(", ")
        )
    })?;

    let projection = project_scenario(scenario, model.horizon_months)?;
    let months = projection.months.into_iter().take(args.months).collect();
    let cohorts = synthetic_cohorts(
        scenario,
        model,
        SyntheticCohortOptions {
            observed_months: SyntheticCohortOptions::default()
                .observed_months
                .min(model.horizon_months),
            seed: args.seed,
            ..SyntheticCohortOptions::default()
        },
    )?;

    Ok(Report {
        scenario: scenario.name.clone(),
        months,
        unit_economics: unit_economics_summary(model)?,
        sensitivity: scenario_sensitivity(scenario, model)?,
        market: market_funnel(&config.market, scenario.price)?,
        cohorts,
    })
}

fn render_tables(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Scenario '{}' (first {} months)",
        report.scenario,
        report.months.len()
    );
    let _ = writeln!(
        out,
        "{:>5} {:>10} {:>12} {:>14} {:>16} {:>12}",
        "month", "new", "active", "MRR", "cum revenue", "cum subs"
    );
    for row in &report.months {
        let _ = writeln!(
            out,
            "{:>5} {:>10.1} {:>12.1} {:>14.2} {:>16.2} {:>12.1}",
            row.month,
            row.new_subscribers,
            row.active_subscribers,
            row.mrr,
            row.cumulative_revenue,
            row.cumulative_subscribers
        );
    }

    let _ = writeln!(out, "\nUnit economics");
    let _ = writeln!(
        out,
        "{:<14} {:>7} {:>7} {:>7} {:>10} {:>8} {:>12} {:>12}",
        "scenario", "price", "margin", "CAC", "LTV", "LTV/CAC", "payback", "break-even"
    );
    for row in &report.unit_economics {
        let payback = row
            .payback_month
            .map_or_else(|| "not reached".to_string(), |m| format!("month {m}"));
        let _ = writeln!(
            out,
            "{:<14} {:>7.2} {:>7.2} {:>7.2} {:>10.2} {:>8.2} {:>12} {:>12.1}",
            row.scenario,
            row.price,
            row.gross_margin,
            row.cac,
            row.ltv,
            row.ltv_to_cac,
            payback,
            row.subs_to_break_even
        );
    }

    let _ = writeln!(out, "\nLTV/CAC sensitivity ('{}')", report.scenario);
    let _ = write!(out, "{:>16}", "retention \\ CAC");
    for multiplier in &report.sensitivity.cac_multipliers {
        let _ = write!(out, " {:>8}", format!("x{multiplier}"));
    }
    let _ = writeln!(out);
    for (scale, row) in report
        .sensitivity
        .retention_scales
        .iter()
        .zip(&report.sensitivity.ltv_to_cac)
    {
        let _ = write!(out, "{:>16}", format!("x{scale}"));
        for value in row {
            let _ = write!(out, " {value:>8.2}");
        }
        let _ = writeln!(out);
    }

    let market = &report.market;
    let _ = writeln!(
        out,
        "\nMarket funnel: population={:.0} TAM={:.0} SAM={:.0}",
        market.population, market.tam, market.sam
    );
    for row in &market.rows {
        let _ = writeln!(
            out,
            "  capture {:>5.2}% -> {:>10.0} subscribers, {:>14.2} annual revenue",
            row.capture_rate * 100.0,
            row.subscribers_year5,
            row.annual_revenue_year5
        );
    }

    let _ = writeln!(
        out,
        "\nSynthetic cohort LTV ({} months)",
        report.cohorts.observed_months
    );
    for row in &report.cohorts.ltv {
        let _ = writeln!(out, "  cohort {:>3}: {:>10.2}", row.cohort_month, row.ltv);
    }

    out
}
