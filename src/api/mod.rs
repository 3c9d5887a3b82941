use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    BreakEvenConfig, BreakEvenResult, CashFlowEntry, CashFlowKind, ComparisonInputs,
    ComparisonResult, ProjectionError, inflate_payout, run_comparison, solve_break_even_return,
};

/// Trial counts above this need an explicit confirmation from the caller.
pub const LARGE_TRIAL_THRESHOLD: u32 = 50_000;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCashFlowKind {
    Contribution,
    Withdrawal,
}

impl From<CliCashFlowKind> for CashFlowKind {
    fn from(value: CliCashFlowKind) -> Self {
        match value {
            CliCashFlowKind::Contribution => CashFlowKind::Contribution,
            CliCashFlowKind::Withdrawal => CashFlowKind::Withdrawal,
        }
    }
}

/// A cash flow in user units: COLA in percent.
#[derive(Copy, Clone, Debug, PartialEq)]
struct CliCashFlow {
    id: Option<u64>,
    kind: CliCashFlowKind,
    amount: f64,
    start_year: i32,
    end_year: i32,
    cola: f64,
}

/// Parses `kind:amount:startYear:endYear[:colaPercent]`.
fn parse_cash_flow(raw: &str) -> Result<CliCashFlow, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    if !(4..=5).contains(&parts.len()) {
        return Err(format!(
            "expected kind:amount:startYear:endYear[:colaPercent], got '{raw}'"
        ));
    }
    let kind = CliCashFlowKind::from_str(parts[0], true)?;
    let amount = parts[1]
        .parse::<f64>()
        .map_err(|e| format!("invalid amount '{}': {e}", parts[1]))?;
    let start_year = parts[2]
        .parse::<i32>()
        .map_err(|e| format!("invalid start year '{}': {e}", parts[2]))?;
    let end_year = parts[3]
        .parse::<i32>()
        .map_err(|e| format!("invalid end year '{}': {e}", parts[3]))?;
    let cola = match parts.get(4) {
        Some(text) => text
            .parse::<f64>()
            .map_err(|e| format!("invalid COLA '{text}': {e}"))?,
        None => 0.0,
    };
    Ok(CliCashFlow {
        id: None,
        kind,
        amount,
        start_year,
        end_year,
        cola,
    })
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiCashFlowKind {
    #[serde(alias = "Contribution")]
    Contribution,
    #[serde(alias = "Withdrawal")]
    Withdrawal,
}

impl From<ApiCashFlowKind> for CliCashFlowKind {
    fn from(value: ApiCashFlowKind) -> Self {
        match value {
            ApiCashFlowKind::Contribution => CliCashFlowKind::Contribution,
            ApiCashFlowKind::Withdrawal => CliCashFlowKind::Withdrawal,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCashFlow {
    id: Option<u64>,
    #[serde(alias = "type")]
    kind: ApiCashFlowKind,
    amount: f64,
    start_year: i32,
    end_year: i32,
    #[serde(default)]
    cola: f64,
}

impl From<ApiCashFlow> for CliCashFlow {
    fn from(value: ApiCashFlow) -> Self {
        CliCashFlow {
            id: value.id,
            kind: value.kind.into(),
            amount: value.amount,
            start_year: value.start_year,
            end_year: value.end_year,
            cola: value.cola,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    current_date: Option<NaiveDate>,
    birth_year: Option<i32>,

    annual_payout_today: Option<f64>,
    inflation_rate: Option<f64>,
    payout_cola: Option<f64>,
    payout_start_date: Option<NaiveDate>,
    payout_end_date: Option<NaiveDate>,

    initial_asset_value: Option<f64>,
    asset_start_date: Option<NaiveDate>,
    asset_end_date: Option<NaiveDate>,
    asset_growth_rate: Option<f64>,
    asset_volatility: Option<f64>,
    cash_flows: Option<Vec<ApiCashFlow>>,

    trials: Option<u32>,
    seed: Option<u64>,
    confirm_large_run: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "pension_compare",
    about = "Compare a pension payout against a Monte Carlo projection of an invested asset"
)]
struct Cli {
    #[arg(long, help = "Reference date for COLA and inflation; defaults to today")]
    current_date: Option<NaiveDate>,
    #[arg(long, help = "Birth year, used to label each projected year with an age")]
    birth_year: Option<i32>,
    #[arg(
        long,
        default_value_t = 30_000.0,
        help = "Annual pension payout in today's money"
    )]
    annual_payout_today: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Inflation applied from today until the payout starts, in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Cost-of-living adjustment during the payout period, in percent"
    )]
    payout_cola: f64,
    #[arg(long, help = "Defaults to 1 January, 14 years from today")]
    payout_start_date: Option<NaiveDate>,
    #[arg(long, help = "Defaults to 1 January, 44 years from today")]
    payout_end_date: Option<NaiveDate>,
    #[arg(long, default_value_t = 100_000.0)]
    initial_asset_value: f64,
    #[arg(long, help = "Defaults to 1 January of the current year")]
    asset_start_date: Option<NaiveDate>,
    #[arg(long, help = "Defaults to 1 January, 44 years from today")]
    asset_end_date: Option<NaiveDate>,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Expected annual asset return in percent, e.g. 5"
    )]
    asset_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 12.0,
        help = "Annual asset return volatility in percent"
    )]
    asset_volatility: f64,
    #[arg(
        long = "cash-flow",
        value_parser = parse_cash_flow,
        help = "Repeatable kind:amount:startYear:endYear[:colaPercent]"
    )]
    cash_flows: Vec<CliCashFlow>,
    #[arg(long, default_value_t = 1_000)]
    trials: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, help = "Allow trial counts above the large-run threshold")]
    confirm_large_run: bool,
    #[arg(
        long,
        help = "Also solve for the asset return at which the median matches the pension"
    )]
    solve_break_even: bool,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: ComparisonInputs,
    years_until_payout: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    current_year: i32,
    years_until_payout: f64,
    first_payout_at_start: f64,
    mean_return: f64,
    volatility: f64,
    trials: u32,
    seed: u64,
    comparison: ComparisonResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    break_even: Option<BreakEvenResult>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Error, Debug)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Projection(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %self, status = status.as_u16(), "rejecting request");
        error_response(status, &self.to_string())
    }
}

fn new_year(year: i32) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| format!("year {year} is out of range"))
}

fn ensure_finite(flag: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{flag} must be a finite number"));
    }
    Ok(())
}

fn build_inputs(cli: Cli, today: NaiveDate) -> Result<ApiRequest, String> {
    let current_date = cli.current_date.unwrap_or(today);
    let current_year = current_date.year();

    let payout_start_date = match cli.payout_start_date {
        Some(date) => date,
        None => new_year(current_year + 14)?,
    };
    let payout_end_date = match cli.payout_end_date {
        Some(date) => date,
        None => new_year(current_year + 44)?,
    };
    let asset_start_date = match cli.asset_start_date {
        Some(date) => date,
        None => new_year(current_year)?,
    };
    let asset_end_date = match cli.asset_end_date {
        Some(date) => date,
        None => new_year(current_year + 44)?,
    };

    for (flag, value) in [
        ("--annual-payout-today", cli.annual_payout_today),
        ("--inflation-rate", cli.inflation_rate),
        ("--payout-cola", cli.payout_cola),
        ("--initial-asset-value", cli.initial_asset_value),
        ("--asset-growth-rate", cli.asset_growth_rate),
        ("--asset-volatility", cli.asset_volatility),
    ] {
        ensure_finite(flag, value)?;
    }

    if cli.annual_payout_today < 0.0 {
        return Err("--annual-payout-today must be >= 0".to_string());
    }
    if cli.inflation_rate <= -100.0 {
        return Err("--inflation-rate must be > -100".to_string());
    }
    if cli.payout_cola < -100.0 {
        return Err("--payout-cola must be >= -100".to_string());
    }
    if cli.asset_volatility < 0.0 {
        return Err("--asset-volatility must be >= 0".to_string());
    }
    if payout_end_date.year() < payout_start_date.year() {
        return Err("--payout-end-date must be >= --payout-start-date".to_string());
    }
    if asset_end_date.year() < asset_start_date.year() {
        return Err("--asset-end-date must be >= --asset-start-date".to_string());
    }
    if cli.trials == 0 {
        return Err("--trials must be > 0".to_string());
    }
    if cli.trials > LARGE_TRIAL_THRESHOLD && !cli.confirm_large_run {
        return Err(format!(
            "--trials above {LARGE_TRIAL_THRESHOLD} requires --confirm-large-run"
        ));
    }

    let years_until_payout =
        (payout_start_date - current_date).num_days() as f64 / DAYS_PER_YEAR;
    if years_until_payout < 0.0 {
        return Err("--current-date must be on or before --payout-start-date".to_string());
    }
    let first_payout_at_start = inflate_payout(
        cli.annual_payout_today,
        cli.inflation_rate / 100.0,
        years_until_payout,
    )
    .map_err(|e| e.to_string())?;

    let cash_flows = cli
        .cash_flows
        .iter()
        .enumerate()
        .map(|(index, flow)| CashFlowEntry {
            id: flow.id.unwrap_or(index as u64 + 1),
            kind: flow.kind.into(),
            amount: flow.amount,
            start_year: flow.start_year,
            end_year: flow.end_year,
            cola_rate: flow.cola / 100.0,
        })
        .collect();

    Ok(ApiRequest {
        inputs: ComparisonInputs {
            current_year,
            birth_year: cli.birth_year,
            payout_start_year: payout_start_date.year(),
            payout_end_year: payout_end_date.year(),
            first_payout_at_start,
            payout_cola: cli.payout_cola / 100.0,
            asset_start_year: asset_start_date.year(),
            asset_end_year: asset_end_date.year(),
            initial_asset_value: cli.initial_asset_value,
            mean_return: cli.asset_growth_rate / 100.0,
            volatility: cli.asset_volatility / 100.0,
            trial_count: cli.trials,
            seed: cli.seed,
            cash_flows,
        },
        years_until_payout,
    })
}

fn compare(request: &ApiRequest, solve_break_even: bool) -> Result<CompareResponse, ApiError> {
    let inputs = &request.inputs;
    let comparison = run_comparison(inputs)?;
    let break_even = if solve_break_even {
        let defaults = BreakEvenConfig::default();
        let config = BreakEvenConfig {
            trials_per_iteration: inputs.trial_count.min(defaults.trials_per_iteration),
            final_trials: inputs.trial_count,
            ..defaults
        };
        Some(solve_break_even_return(inputs, config)?)
    } else {
        None
    };

    Ok(CompareResponse {
        current_year: inputs.current_year,
        years_until_payout: request.years_until_payout,
        first_payout_at_start: inputs.first_payout_at_start,
        mean_return: inputs.mean_return,
        volatility: inputs.volatility,
        trials: inputs.trial_count,
        seed: inputs.seed,
        comparison,
        break_even,
    })
}

/// One-shot run: parse flags, project both scenarios, print JSON.
pub fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();
    let solve_break_even = cli.solve_break_even;
    let today = chrono::Local::now().date_naive();
    let request = build_inputs(cli, today)?;
    let response = compare(&request, solve_break_even).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&response).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route(
            "/api/break-even",
            get(break_even_get_handler).post(break_even_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "comparison HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn compare_get_handler(Query(payload): Query<ComparePayload>) -> Response {
    compare_handler_impl(payload, false).await
}

async fn compare_post_handler(Json(payload): Json<ComparePayload>) -> Response {
    compare_handler_impl(payload, false).await
}

async fn break_even_get_handler(Query(payload): Query<ComparePayload>) -> Response {
    compare_handler_impl(payload, true).await
}

async fn break_even_post_handler(Json(payload): Json<ComparePayload>) -> Response {
    compare_handler_impl(payload, true).await
}

async fn compare_handler_impl(payload: ComparePayload, solve_break_even: bool) -> Response {
    let today = chrono::Local::now().date_naive();
    let request = match api_request_from_payload(payload, today) {
        Ok(request) => request,
        Err(msg) => return ApiError::BadRequest(msg).into_response(),
    };

    let outcome = tokio::task::spawn_blocking(move || compare(&request, solve_break_even)).await;
    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(err)) => err.into_response(),
        Err(join_err) => ApiError::Internal(join_err.to_string()).into_response(),
    }
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
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str, today: NaiveDate) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ComparePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, today)
}

fn api_request_from_payload(
    payload: ComparePayload,
    today: NaiveDate,
) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_date {
        cli.current_date = Some(v);
    }
    if let Some(v) = payload.birth_year {
        cli.birth_year = Some(v);
    }

    if let Some(v) = payload.annual_payout_today {
        cli.annual_payout_today = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.payout_cola {
        cli.payout_cola = v;
    }
    if let Some(v) = payload.payout_start_date {
        cli.payout_start_date = Some(v);
    }
    if let Some(v) = payload.payout_end_date {
        cli.payout_end_date = Some(v);
    }

    if let Some(v) = payload.initial_asset_value {
        cli.initial_asset_value = v;
    }
    if let Some(v) = payload.asset_start_date {
        cli.asset_start_date = Some(v);
    }
    if let Some(v) = payload.asset_end_date {
        cli.asset_end_date = Some(v);
    }
    if let Some(v) = payload.asset_growth_rate {
        cli.asset_growth_rate = v;
    }
    if let Some(v) = payload.asset_volatility {
        cli.asset_volatility = v;
    }

    if let Some(v) = payload.trials {
        cli.trials = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.confirm_large_run {
        cli.confirm_large_run = v;
    }

    cli.cash_flows = match payload.cash_flows {
        Some(flows) => flows.into_iter().map(CliCashFlow::from).collect(),
        None => {
            let year = cli.current_date.unwrap_or(today).year();
            vec![default_contribution(year)]
        }
    };

    build_inputs(cli, today)
}

fn default_contribution(current_year: i32) -> CliCashFlow {
    CliCashFlow {
        id: Some(1),
        kind: CliCashFlowKind::Contribution,
        amount: 10_000.0,
        start_year: current_year + 1,
        end_year: current_year + 13,
        cola: 0.0,
    }
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_date: None,
        birth_year: None,
        annual_payout_today: 30_000.0,
        inflation_rate: 2.0,
        payout_cola: 2.0,
        payout_start_date: None,
        payout_end_date: None,
        initial_asset_value: 100_000.0,
        asset_start_date: None,
        asset_end_date: None,
        asset_growth_rate: 5.0,
        asset_volatility: 12.0,
        cash_flows: Vec::new(),
        trials: 1_000,
        seed: 42,
        confirm_large_run: false,
        solve_break_even: false,
    }
}
