mod render;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::core::{
    BillResult, InvariantViolation, SurchargeBasis, Tariff, ValidationError, compute_bill_with,
    verify,
};

pub use render::render_invoice;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("bill failed its consistency check: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            ApiError::Validation(_) => 1,
            ApiError::Invariant(_) => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSurchargeBasis {
    Subtotal,
    PerUnit,
}

impl From<CliSurchargeBasis> for SurchargeBasis {
    fn from(value: CliSurchargeBasis) -> Self {
        match value {
            CliSurchargeBasis::Subtotal => SurchargeBasis::Subtotal,
            CliSurchargeBasis::PerUnit => SurchargeBasis::PerUnit,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSurchargeBasis {
    Subtotal,
    #[serde(alias = "perUnit", alias = "per_unit", alias = "per-kwh")]
    PerUnit,
}

impl From<ApiSurchargeBasis> for SurchargeBasis {
    fn from(value: ApiSurchargeBasis) -> Self {
        match value {
            ApiSurchargeBasis::Subtotal => SurchargeBasis::Subtotal,
            ApiSurchargeBasis::PerUnit => SurchargeBasis::PerUnit,
        }
    }
}

// Query strings always give text; JSON bodies may send a bare number.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Text(String),
    Number(f64),
}

impl RawQuantity {
    fn into_text(self) -> String {
        match self {
            RawQuantity::Text(text) => text,
            RawQuantity::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BillPayload {
    consumption: Option<RawQuantity>,
    flag: Option<String>,
    surcharge_basis: Option<ApiSurchargeBasis>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TariffQuery {
    surcharge_basis: Option<ApiSurchargeBasis>,
}

#[derive(Parser, Debug)]
#[command(
    name = "power-bill",
    about = "Electricity bill calculator (tiered kWh pricing + tariff flag + taxes)",
    after_help = "Run `power-bill serve [port]` to start the HTTP API instead."
)]
struct Cli {
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Consumption in kWh; a comma may be used as decimal separator"
    )]
    consumption: String,
    #[arg(long, default_value = "green", help = "Tariff flag: green, yellow or red")]
    flag: String,
    #[arg(long, value_enum, default_value_t = CliSurchargeBasis::Subtotal)]
    surcharge_basis: CliSurchargeBasis,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug)]
struct BillRequest {
    consumption: String,
    flag: String,
    surcharge_basis: SurchargeBasis,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BillResponse {
    surcharge_basis: SurchargeBasis,
    bill: BillResult,
    invoice: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn tariff_for(basis: SurchargeBasis) -> Tariff {
    Tariff::standard().with_surcharge_basis(basis)
}

fn run_bill(request: &BillRequest) -> Result<BillResponse, ApiError> {
    let tariff = tariff_for(request.surcharge_basis);
    let bill = compute_bill_with(&tariff, &request.consumption, &request.flag)?;
    if let Err(violation) = verify(&bill) {
        error!(
            consumption = %request.consumption,
            flag = %request.flag,
            %violation,
            "bill failed invariant check"
        );
        return Err(violation.into());
    }

    let invoice = render_invoice(&bill);
    Ok(BillResponse {
        surcharge_basis: request.surcharge_basis,
        bill,
        invoice,
    })
}

pub fn run_cli() -> i32 {
    let cli = Cli::parse();
    let format = cli.format;
    match run_cli_with(cli) {
        Ok(response) => {
            match format {
                OutputFormat::Text => print!("{}", response.invoice),
                OutputFormat::Json => match serde_json::to_string_pretty(&response.bill) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Failed to encode bill: {e}");
                        return 2;
                    }
                },
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

fn run_cli_with(cli: Cli) -> Result<BillResponse, ApiError> {
    let request = BillRequest {
        consumption: cli.consumption,
        flag: cli.flag,
        surcharge_basis: cli.surcharge_basis.into(),
    };
    run_bill(&request)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "power-bill HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/bill?consumption=250&flag=yellow");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/api/bill", get(bill_get_handler).post(bill_post_handler))
        .route("/api/tariff", get(tariff_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn bill_get_handler(Query(payload): Query<BillPayload>) -> Response {
    bill_handler_impl(payload).await
}

async fn bill_post_handler(Json(payload): Json<BillPayload>) -> Response {
    bill_handler_impl(payload).await
}

async fn bill_handler_impl(payload: BillPayload) -> Response {
    let request = match bill_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match run_bill(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => error_response(e.status(), &e.to_string()),
    }
}

async fn tariff_handler(Query(query): Query<TariffQuery>) -> Response {
    let basis = query
        .surcharge_basis
        .map(SurchargeBasis::from)
        .unwrap_or_default();
    json_response(StatusCode::OK, tariff_for(basis))
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
fn bill_request_from_json(json: &str) -> Result<BillRequest, String> {
    let payload = serde_json::from_str::<BillPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    bill_request_from_payload(payload)
}

fn bill_request_from_payload(payload: BillPayload) -> Result<BillRequest, String> {
    let Some(consumption) = payload.consumption else {
        return Err("consumption is required".to_string());
    };

    Ok(BillRequest {
        consumption: consumption.into_text(),
        flag: payload.flag.unwrap_or_else(|| "green".to_string()),
        surcharge_basis: payload
            .surcharge_basis
            .map(SurchargeBasis::from)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn bill_request_from_json_accepts_text_and_numbers() {
        let request = bill_request_from_json(r#"{"consumption": "150,5", "flag": "Red"}"#)
            .expect("json should parse");
        assert_eq!(request.consumption, "150,5");
        assert_eq!(request.flag, "Red");
        assert_eq!(request.surcharge_basis, SurchargeBasis::Subtotal);

        let request = bill_request_from_json(
            r#"{"consumption": 80, "surchargeBasis": "per-unit"}"#,
        )
        .expect("json should parse");
        assert_eq!(request.consumption, "80");
        assert_eq!(request.flag, "green");
        assert_eq!(request.surcharge_basis, SurchargeBasis::PerUnit);
    }

    #[test]
    fn bill_request_requires_consumption() {
        let err = bill_request_from_json(r#"{"flag": "red"}"#).expect_err("must require it");
        assert!(err.contains("consumption"));
    }

    #[test]
    fn bill_request_rejects_unknown_basis() {
        let err = bill_request_from_json(r#"{"consumption": "1", "surchargeBasis": "weekly"}"#)
            .expect_err("must reject unknown basis");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn cli_parses_defaults_and_negative_values() {
        let cli = Cli::try_parse_from(["power-bill", "--consumption", "-5"])
            .expect("negative text is passed through to validation");
        assert_eq!(cli.flag, "green");
        assert_eq!(cli.surcharge_basis, CliSurchargeBasis::Subtotal);
        assert_eq!(cli.format, OutputFormat::Text);

        let err = run_cli_with(cli).expect_err("negative consumption must fail");
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::NegativeValue { .. })
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn cli_computes_yellow_bill_with_per_unit_basis() {
        let cli = Cli::try_parse_from([
            "power-bill",
            "--consumption",
            "250",
            "--flag",
            "YELLOW",
            "--surcharge-basis",
            "per-unit",
            "--format",
            "json",
        ])
        .expect("valid arguments");
        assert_eq!(cli.format, OutputFormat::Json);

        let response = run_cli_with(cli).expect("valid bill");
        assert_eq!(response.bill.condition, "yellow");
        assert_approx(response.bill.surcharge, 12.5);
        assert!(response.invoice.contains("Yellow flag surcharge:"));
    }

    #[test]
    fn api_error_maps_to_status() {
        let validation = ApiError::from(ValidationError::InvalidNumber {
            input: "abc".to_string(),
        });
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.to_string(), ValidationError::InvalidNumber {
            input: "abc".to_string(),
        }
        .to_string());

        let invariant = ApiError::from(InvariantViolation::NegativeTotal(-1.0));
        assert_eq!(invariant.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(invariant.exit_code(), 2);
    }

    #[test]
    fn bill_response_serialization_contains_expected_fields() {
        let request = BillRequest {
            consumption: "250".to_string(),
            flag: "yellow".to_string(),
            surcharge_basis: SurchargeBasis::Subtotal,
        };
        let response = run_bill(&request).expect("valid bill");
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"surchargeBasis\":\"subtotal\""));
        assert!(json.contains("\"grandTotal\""));
        assert!(json.contains("\"taxBase\""));
        assert!(json.contains("\"unitPrice\""));
        assert!(json.contains("\"invoice\""));
    }

    #[tokio::test]
    async fn bill_handler_returns_scenario_totals() {
        let payload = BillPayload {
            consumption: Some(RawQuantity::Text("250".to_string())),
            flag: Some("yellow".to_string()),
            surcharge_basis: None,
        };
        let response = bill_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );

        let body = body_json(response).await;
        assert_approx(body["bill"]["subtotal"].as_f64().expect("subtotal"), 175.0);
        assert_approx(body["bill"]["surcharge"].as_f64().expect("surcharge"), 8.75);
        let taxes = body["bill"]["taxes"].as_array().expect("taxes array");
        assert_eq!(taxes[0]["name"], "ICMS");
        assert_eq!(taxes[2]["name"], "COFINS");
    }

    #[tokio::test]
    async fn bill_handler_reports_validation_errors() {
        for (consumption, flag, needle) in [
            ("abc", "green", "invalid number"),
            ("-5", "green", ">= 0"),
            ("10", "blue", "unknown tariff flag"),
        ] {
            let payload = BillPayload {
                consumption: Some(RawQuantity::Text(consumption.to_string())),
                flag: Some(flag.to_string()),
                surcharge_basis: None,
            };
            let response = bill_handler_impl(payload).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            let message = body["error"].as_str().expect("error message");
            assert!(message.contains(needle), "{message}");
        }
    }

    #[tokio::test]
    async fn bill_handler_requires_consumption() {
        let response = bill_handler_impl(BillPayload::default()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tariff_handler_lists_tables() {
        let query = TariffQuery {
            surcharge_basis: Some(ApiSurchargeBasis::PerUnit),
        };
        let response = tariff_handler(Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["conditions"]["basis"], "per-unit");
        assert_eq!(body["tiers"].as_array().map(Vec::len), Some(4));
        assert!(body["tiers"][3]["upper"].is_null());
        assert_eq!(body["taxes"][1]["name"], "PIS");
    }

    #[tokio::test]
    async fn router_parses_query_string_with_comma_decimal() {
        let request = Request::builder()
            .uri("/api/bill?consumption=150,5&flag=RED&surchargeBasis=per-unit")
            .body(Body::empty())
            .expect("valid request");
        let response = router().oneshot(request).await.expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["surchargeBasis"], "per-unit");
        assert_eq!(body["bill"]["condition"], "red");
        assert_approx(body["bill"]["quantity"].as_f64().expect("quantity"), 150.5);
        assert_approx(body["bill"]["subtotal"].as_f64().expect("subtotal"), 87.875);
        assert_approx(body["bill"]["surcharge"].as_f64().expect("surcharge"), 15.05);
    }

    #[tokio::test]
    async fn router_accepts_json_post() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/bill")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"consumption": 80, "flag": "green"}"#))
            .expect("valid request");
        let response = router().oneshot(request).await.expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_approx(body["bill"]["subtotal"].as_f64().expect("subtotal"), 40.0);
        assert!(
            body["invoice"]
                .as_str()
                .expect("invoice text")
                .contains("Tariff flag: Green")
        );
    }

    #[tokio::test]
    async fn router_rejects_oversized_reading_as_bad_request() {
        let request = Request::builder()
            .uri("/api/bill?consumption=1.5e308")
            .body(Body::empty())
            .expect("valid request");
        let response = router().oneshot(request).await.expect("router is infallible");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn router_falls_back_to_json_404() {
        let request = Request::builder()
            .uri("/api/unknown")
            .body(Body::empty())
            .expect("valid request");
        let response = router().oneshot(request).await.expect("router is infallible");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Not found");
    }
}
