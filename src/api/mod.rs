mod config;
mod report;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub use config::{AppConfig, load_config};
pub use report::{OutputFormat, ReportArgs, render_report};

use crate::core::{
    DEFAULT_CAC_MULTIPLIERS, DEFAULT_RETENTION_SCALES, MAX_HORIZON_MONTHS, MarketFunnel,
    ModelConfig, ModelError, MonthlyAggregate, Scenario, SensitivityGrid, SensitivityInputs,
    SyntheticCohortOptions, SyntheticCohorts, UnitEconomics, ltv_sensitivity, market_funnel,
    monthly_discount_rate, project_scenario, retention_curve, synthetic_cohorts, unit_economics,
    unit_economics_summary,
};
use crate::dosing::{
    DiaryEntry, DoseEvent, DoseLogRequest, DosingError, HistoryEntry, HistoryFilter,
    OnboardingProfile, PersonalStats, SleepDoseSettings, SleepRecommendation, StarterSelection,
    SymptomLog, history, log_dose, personal_stats, recommend_sleep_dose, select_starter_product,
};

#[derive(Parser, Debug)]
#[command(
    name = "clarity",
    about = "Subscription cohort, unit-economics and dosing model for ClarityRx"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve(ServeArgs),
    /// Print the scenario tables.
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long, help = "JSON file with scenarios, market assumptions and catalog")]
    pub config: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPayload {
    scenario: Option<String>,
    name: Option<String>,
    price: Option<f64>,
    gross_margin: Option<f64>,
    new_subs_start: Option<f64>,
    new_subs_end: Option<f64>,
    retention_scale: Option<f64>,
    cac: Option<f64>,

    horizon_months: Option<usize>,
    discount_rate_annual: Option<f64>,
    fixed_overhead: Option<f64>,

    include_cohorts: Option<bool>,
    retention_scales: Option<Vec<f64>>,
    cac_multipliers: Option<Vec<f64>>,
}

#[derive(Debug)]
struct ScenarioRequest {
    scenario: Scenario,
    model: ModelConfig,
    include_cohorts: bool,
    retention_scales: Vec<f64>,
    cac_multipliers: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    scenario: Scenario,
    horizon_months: usize,
    discount_rate_annual: f64,
    months: Vec<MonthlyAggregate>,
    unit_economics: UnitEconomics,
    cohorts: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosResponse<'a> {
    horizon_months: usize,
    discount_rate_annual: f64,
    fixed_overhead: f64,
    scenarios: &'a [Scenario],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SensitivityResponse {
    scenario: String,
    grid: SensitivityGrid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MarketQuery {
    price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CohortsQuery {
    scenario: Option<String>,
    num_cohorts: Option<u32>,
    observed_months: Option<usize>,
    noise_sd: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StarterPayload {
    #[serde(flatten)]
    profile: OnboardingProfile,
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepPayload {
    user_id: u64,
    product_type: String,
    #[serde(default)]
    events: Vec<DoseEvent>,
    #[serde(default)]
    logs: Vec<SymptomLog>,
    #[serde(default)]
    settings: SleepDoseSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoseLogPayload {
    #[serde(default)]
    dose_id: u64,
    #[serde(flatten)]
    request: DoseLogRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryPayload {
    #[serde(default)]
    entries: Vec<DiaryEntry>,
    #[serde(flatten)]
    filter: HistoryFilter,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    entries: Vec<HistoryEntry>,
    stats: PersonalStats,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, scenarios = ?config.model.scenario_names(), "clarity API listening");

    axum::serve(listener, router(config)).await?;
    Ok(())
}

fn router(config: AppConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };
    Router::new()
        .route("/api/scenarios", get(scenarios_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/unit-economics", get(unit_economics_handler))
        .route(
            "/api/sensitivity",
            get(sensitivity_get_handler).post(sensitivity_post_handler),
        )
        .route("/api/market", get(market_handler))
        .route("/api/cohorts", get(cohorts_handler))
        .route("/api/starter-product", post(starter_product_handler))
        .route("/api/recommendations/sleep", post(sleep_recommendation_handler))
        .route("/api/diary/log", post(diary_log_handler))
        .route("/api/diary/history", post(diary_history_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn scenarios_handler(State(state): State<AppState>) -> Response {
    let model = &state.config.model;
    json_response(
        StatusCode::OK,
        ScenariosResponse {
            horizon_months: model.horizon_months,
            discount_rate_annual: model.discount_rate_annual,
            fixed_overhead: model.fixed_overhead,
            scenarios: &model.scenarios,
        },
    )
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<ScenarioPayload>,
) -> Response {
    simulate_handler_impl(&state.config.model, payload)
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<ScenarioPayload>,
) -> Response {
    simulate_handler_impl(&state.config.model, payload)
}

fn simulate_handler_impl(model: &ModelConfig, payload: ScenarioPayload) -> Response {
    let request = match scenario_request_from_payload(model, payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!(scenario = %request.scenario.name, horizon = request.model.horizon_months, "simulate");

    match build_simulate_response(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => model_error_response(&err),
    }
}

fn build_simulate_response(request: &ScenarioRequest) -> Result<SimulateResponse, ModelError> {
    let projection = project_scenario(&request.scenario, request.model.horizon_months)?;
    let economics = unit_economics(&request.scenario, &request.model)?;
    Ok(SimulateResponse {
        horizon_months: request.model.horizon_months,
        discount_rate_annual: request.model.discount_rate_annual,
        cohorts: request
            .include_cohorts
            .then(|| projection.cohorts.to_rows()),
        months: projection.months,
        scenario: projection.scenario,
        unit_economics: economics,
    })
}

async fn unit_economics_handler(State(state): State<AppState>) -> Response {
    match unit_economics_summary(&state.config.model) {
        Ok(rows) => json_response(StatusCode::OK, rows),
        Err(err) => model_error_response(&err),
    }
}

async fn sensitivity_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<ScenarioPayload>,
) -> Response {
    sensitivity_handler_impl(&state.config.model, payload)
}

async fn sensitivity_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<ScenarioPayload>,
) -> Response {
    sensitivity_handler_impl(&state.config.model, payload)
}

fn sensitivity_handler_impl(model: &ModelConfig, payload: ScenarioPayload) -> Response {
    let request = match scenario_request_from_payload(model, payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match build_sensitivity(&request) {
        Ok(grid) => json_response(
            StatusCode::OK,
            SensitivityResponse {
                scenario: request.scenario.name,
                grid,
            },
        ),
        Err(err) => model_error_response(&err),
    }
}

fn build_sensitivity(request: &ScenarioRequest) -> Result<SensitivityGrid, ModelError> {
    request.scenario.validate()?;
    let retention = retention_curve(request.model.horizon_months, request.scenario.retention_scale)?;
    ltv_sensitivity(
        SensitivityInputs {
            price: request.scenario.price,
            gross_margin: request.scenario.gross_margin,
            retention: &retention,
            cac: request.scenario.cac,
            monthly_rate: monthly_discount_rate(request.model.discount_rate_annual),
        },
        &request.retention_scales,
        &request.cac_multipliers,
    )
}

async fn market_handler(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Response {
    let price = query.price.unwrap_or_else(|| {
        state
            .config
            .model
            .scenario("base")
            .map(|s| s.price)
            .unwrap_or(Scenario::base().price)
    });
    let result: Result<MarketFunnel, ModelError> = market_funnel(&state.config.market, price);
    match result {
        Ok(funnel) => json_response(StatusCode::OK, funnel),
        Err(err) => model_error_response(&err),
    }
}

async fn cohorts_handler(
    State(state): State<AppState>,
    Query(query): Query<CohortsQuery>,
) -> Response {
    let model = &state.config.model;
    let name = query.scenario.as_deref().unwrap_or("base");
    let Some(scenario) = model.scenario(name) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &unknown_scenario_message(model, name),
        );
    };
    let defaults = SyntheticCohortOptions::default();
    let options = SyntheticCohortOptions {
        num_cohorts: query.num_cohorts.unwrap_or(defaults.num_cohorts),
        observed_months: query.observed_months.unwrap_or(defaults.observed_months),
        noise_sd: query.noise_sd.unwrap_or(defaults.noise_sd),
        seed: query.seed.unwrap_or(defaults.seed),
    };
    let result: Result<SyntheticCohorts, ModelError> = synthetic_cohorts(scenario, model, options);
    match result {
        Ok(cohorts) => json_response(StatusCode::OK, cohorts),
        Err(err) => model_error_response(&err),
    }
}

async fn starter_product_handler(
    State(state): State<AppState>,
    Json(payload): Json<StarterPayload>,
) -> Response {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let result: Result<StarterSelection, DosingError> =
        select_starter_product(&state.config.catalog, &payload.profile, today);
    match result {
        Ok(selection) => {
            debug!(sku = %selection.product.sku, rule = ?selection.rule, "starter product");
            json_response(StatusCode::OK, selection)
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn sleep_recommendation_handler(Json(payload): Json<SleepPayload>) -> Response {
    let result: Result<SleepRecommendation, DosingError> = recommend_sleep_dose(
        payload.user_id,
        &payload.product_type,
        &payload.events,
        &payload.logs,
        &payload.settings,
    );
    match result {
        Ok(recommendation) => json_response(StatusCode::OK, recommendation),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn diary_log_handler(
    State(state): State<AppState>,
    Json(payload): Json<DoseLogPayload>,
) -> Response {
    match log_dose(&state.config.catalog, payload.dose_id, &payload.request) {
        Ok(entry) => {
            debug!(
                sku = %entry.product_sku,
                total_mg = entry.total_dose_mg_thc,
                "logged dose"
            );
            json_response(StatusCode::OK, entry)
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn diary_history_handler(Json(payload): Json<HistoryPayload>) -> Response {
    let entries = history(&payload.entries, &payload.filter);
    let stats = personal_stats(&entries);
    json_response(StatusCode::OK, HistoryResponse { entries, stats })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    warn!(%status, error = msg, "request failed");
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn model_error_response(err: &ModelError) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
}

fn unknown_scenario_message(model: &ModelConfig, name: &str) -> String {
    format!(
        "unknown scenario '{name}'; expected one of: {}",
        model.scenario_names().join(", ")
    )
}

#[cfg(test)]
fn scenario_request_from_json(model: &ModelConfig, json: &str) -> Result<ScenarioRequest, String> {
    let payload = serde_json::from_str::<ScenarioPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    scenario_request_from_payload(model, payload)
}

fn scenario_request_from_payload(
    model: &ModelConfig,
    payload: ScenarioPayload,
) -> Result<ScenarioRequest, String> {
    let base_name = payload.scenario.as_deref().unwrap_or("base");
    let mut scenario = model
        .scenario(base_name)
        .cloned()
        .ok_or_else(|| unknown_scenario_message(model, base_name))?;

    if let Some(v) = payload.name {
        scenario.name = v;
    }
    if let Some(v) = payload.price {
        scenario.price = v;
    }
    if let Some(v) = payload.gross_margin {
        scenario.gross_margin = v;
    }
    if let Some(v) = payload.new_subs_start {
        scenario.new_subs_start = v;
    }
    if let Some(v) = payload.new_subs_end {
        scenario.new_subs_end = v;
    }
    if let Some(v) = payload.retention_scale {
        scenario.retention_scale = v;
    }
    if let Some(v) = payload.cac {
        scenario.cac = v;
    }

    let mut model = model.clone();
    if let Some(v) = payload.horizon_months {
        model.horizon_months = v;
    }
    if let Some(v) = payload.discount_rate_annual {
        model.discount_rate_annual = v;
    }
    if let Some(v) = payload.fixed_overhead {
        model.fixed_overhead = v;
    }

    if !(2..=MAX_HORIZON_MONTHS).contains(&model.horizon_months) {
        return Err(format!("horizonMonths must be between 2 and {MAX_HORIZON_MONTHS}"));
    }
    if !model.discount_rate_annual.is_finite() || model.discount_rate_annual <= -1.0 {
        return Err("discountRateAnnual must be > -1".to_string());
    }

    Ok(ScenarioRequest {
        scenario,
        model,
        include_cohorts: payload.include_cohorts.unwrap_or(false),
        retention_scales: payload
            .retention_scales
            .unwrap_or_else(|| DEFAULT_RETENTION_SCALES.to_vec()),
        cac_multipliers: payload
            .cac_multipliers
            .unwrap_or_else(|| DEFAULT_CAC_MULTIPLIERS.to_vec()),
    })
}
