// CPUMon Console - HTTP API
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HTTP API over one monitoring session.
//!
//! Every handler runs its session work on the blocking pool while holding
//! the session mutex, so at most one cycle is in flight.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use cpumon::history::DEFAULT_SELECTED_SENSORS;
use cpumon::{
    history_csv_string, latency_csv_string, CycleOutcome, DeviceError, ExportError, HistoryEntry,
    LatencyRecord, LatencySummary, NetworkTag, Sensor, SensorSeries, Session, SessionError,
    SeverityState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, warn};

/// Application state shared across handlers.
pub struct AppState {
    session: Mutex<Session>,
    start_time: Instant,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            start_time: Instant::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session lock poisoned")]
    Poisoned,

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Session(SessionError::UnknownNetwork(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Device(_) | ApiError::Session(SessionError::Device(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Session(SessionError::Inference(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Run `f` against the session on the blocking pool.
async fn with_session<T, F>(state: &SharedState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Session) -> Result<T, ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut session = state.session.lock().map_err(|_| ApiError::Poisoned)?;
        f(&mut session)
    })
    .await
    .map_err(|e| ApiError::Worker(e.to_string()))?
}

/// Build the console router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/connect", post(connect_handler))
        .route("/disconnect", post(disconnect_handler))
        .route("/network", put(network_handler))
        .route("/cycle", post(cycle_handler))
        .route("/history", get(history_handler))
        .route("/history.csv", get(history_csv_handler))
        .route("/latency", get(latency_handler))
        .route("/latency.csv", get(latency_csv_handler))
        .with_state(state)
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>CPUMon Console</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>CPUMon Console</h1>
    <p>Reads the sensor board, classifies each sensor and asks the model for the CPU state.</p>

    <div class="endpoints">
        <h2>Session</h2>
        <div class="endpoint"><a href="/status">/status</a> - Session status (JSON)</div>
        <div class="endpoint"><code>POST /connect</code> - Open the device</div>
        <div class="endpoint"><code>POST /disconnect</code> - Close the device</div>
        <div class="endpoint"><code>PUT /network</code> - Select the network tag, e.g. <code>{"network": "5G"}</code></div>
        <div class="endpoint"><code>POST /cycle</code> - Read sensor data and predict</div>
    </div>

    <div class="endpoints">
        <h2>History</h2>
        <div class="endpoint"><a href="/history">/history</a> - Predictions, optionally <code>?start=2025-04-01&amp;end=2025-04-30&amp;sensors=temperature,cpu_usage</code></div>
        <div class="endpoint"><a href="/history.csv">/history.csv</a> - History as CSV</div>
        <div class="endpoint"><a href="/latency">/latency</a> - Latency per network (JSON)</div>
        <div class="endpoint"><a href="/latency.csv">/latency.csv</a> - Latency as CSV</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
    </div>
</body>
</html>"#,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Session status.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub connected: bool,
    pub device: String,
    pub endpoint: String,
    pub network: NetworkTag,
    pub networks: Vec<NetworkTag>,
    pub history_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_prediction: Option<SeverityState>,
}

fn status_of(session: &Session, uptime_secs: u64) -> StatusResponse {
    StatusResponse {
        version: cpumon::VERSION.to_string(),
        uptime_secs,
        connected: session.is_connected(),
        device: session.device_target(),
        endpoint: session.endpoint(),
        network: session.network().clone(),
        networks: session.config().networks.clone(),
        history_len: session.history().len(),
        last_prediction: session.history().last().map(|e| e.prediction.label),
    }
}

async fn status_handler(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let status = with_session(&state, move |s| Ok(status_of(s, uptime))).await?;
    Ok(Json(status))
}

async fn connect_handler(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let status = with_session(&state, move |s| {
        s.connect()?;
        Ok(status_of(s, uptime))
    })
    .await?;
    Ok(Json(status))
}

async fn disconnect_handler(
    State(state): State<SharedState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let status = with_session(&state, move |s| {
        s.disconnect();
        Ok(status_of(s, uptime))
    })
    .await?;
    Ok(Json(status))
}

/// Network selection body.
#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub network: String,
}

async fn network_handler(
    State(state): State<SharedState>,
    Json(request): Json<NetworkRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let status = with_session(&state, move |s| {
        s.set_network(NetworkTag::new(request.network))?;
        Ok(status_of(s, uptime))
    })
    .await?;
    Ok(Json(status))
}

/// One sensor value with its severity.
#[derive(Debug, Serialize, Deserialize)]
pub struct SensorAlert {
    pub sensor: Sensor,
    pub label: String,
    pub value: f64,
    pub state: SeverityState,
    pub color: String,
}

/// Result of `POST /cycle`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleResponse {
    Predicted {
        entry: HistoryEntry,
        sensors: Vec<SensorAlert>,
    },
    Skipped {
        parsed: Vec<(Sensor, f64)>,
        missing: Vec<Sensor>,
    },
}

async fn cycle_handler(State(state): State<SharedState>) -> Result<Json<CycleResponse>, ApiError> {
    let response = with_session(&state, |s| {
        let response = match s.run_cycle()? {
            CycleOutcome::Predicted(entry) => {
                let states = s.thresholds().classify_reading(&entry.reading);
                let sensors = Sensor::ALL
                    .iter()
                    .zip(states)
                    .map(|(&sensor, state)| SensorAlert {
                        sensor,
                        label: sensor.display_name().to_string(),
                        value: entry.reading.get(sensor),
                        state,
                        color: state.color().to_string(),
                    })
                    .collect();
                CycleResponse::Predicted { entry, sensors }
            }
            CycleOutcome::Skipped { reading, missing } => CycleResponse::Skipped {
                parsed: reading.iter().collect(),
                missing,
            },
        };
        Ok(response)
    })
    .await?;
    Ok(Json(response))
}

/// History filters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HistoryQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Comma-separated sensor names
    pub sensors: Option<String>,
}

impl HistoryQuery {
    fn date_range(&self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        let start = self.start.unwrap_or(NaiveDate::MIN);
        let end = self.end.unwrap_or(NaiveDate::MAX);
        if start > end {
            return Err(ApiError::BadRequest(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok((start, end))
    }

    fn selected_sensors(&self) -> Result<Vec<Sensor>, ApiError> {
        match self.sensors.as_deref() {
            None => Ok(DEFAULT_SELECTED_SENSORS.to_vec()),
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<Sensor>().map_err(ApiError::BadRequest))
                .collect(),
        }
    }
}

/// Result of `GET /history`.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub entries: Vec<HistoryEntry>,
    pub series: Vec<SensorSeries>,
    pub probabilities: BTreeMap<SeverityState, Vec<(DateTime<Utc>, f64)>>,
    pub distribution: BTreeMap<SeverityState, usize>,
}

async fn history_handler(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let (start, end) = query.date_range()?;
    let sensors = query.selected_sensors()?;

    let response = with_session(&state, move |s| {
        let view = s.history().between_dates(start, end);
        Ok(HistoryResponse {
            count: view.len(),
            entries: view.iter().cloned().collect(),
            series: view.selected_series(&sensors),
            probabilities: SeverityState::ALL
                .iter()
                .map(|&state| (state, view.probability_series(state)))
                .collect(),
            distribution: view.label_distribution(),
        })
    })
    .await?;
    Ok(Json(response))
}

fn csv_response(filename: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn history_csv_handler(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = query.date_range()?;
    let body = with_session(&state, move |s| {
        let view = s.history().between_dates(start, end);
        Ok(history_csv_string(view.iter())?)
    })
    .await?;
    Ok(csv_response("cpu_history.csv", body))
}

/// Latency statistics for one network.
#[derive(Debug, Serialize)]
pub struct NetworkLatency {
    pub network: NetworkTag,
    pub summary: LatencySummary,
}

/// Result of `GET /latency`.
#[derive(Debug, Serialize)]
pub struct LatencyResponse {
    pub records: Vec<LatencyRecord>,
    pub networks: Vec<NetworkLatency>,
    /// Mean latency reduction of the second configured network relative to the first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_percent: Option<f64>,
}

async fn latency_handler(State(state): State<SharedState>) -> Result<Json<LatencyResponse>, ApiError> {
    let response = with_session(&state, |s| {
        let log = s.latency_log();
        let networks = log
            .networks()
            .into_iter()
            .filter_map(|network| {
                let summary = log.summary(&network)?;
                Some(NetworkLatency { network, summary })
            })
            .collect();
        let improvement_percent = match s.config().networks.as_slice() {
            [baseline, candidate, ..] => log.improvement_percent(baseline, candidate),
            _ => None,
        };
        Ok(LatencyResponse {
            records: log.records().to_vec(),
            networks,
            improvement_percent,
        })
    })
    .await?;
    Ok(Json(response))
}

async fn latency_csv_handler(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let body = with_session(&state, |s| Ok(latency_csv_string(s.latency_log().records())?)).await?;
    Ok(csv_response("latency_history.csv", body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpumon::{Device, InferenceBackend, InferenceError, MemoryDevice, MonitorConfig};

    struct FixedBackend(&'static str);

    impl InferenceBackend for FixedBackend {
        fn invoke(&self, _content_type: &str, _body: &str) -> Result<String, InferenceError> {
            Ok(self.0.to_string())
        }
    }

    const LINE: &str =
        "Temperature: 90 C | Voltage: 3.2 V | Current: 1.0 A | CPU Usage: 50 % | Fan Speed: 2000 RPM";

    fn state(lines: &'static [&'static str], response: &'static str) -> SharedState {
        let connector = move || -> Result<Box<dyn Device>, DeviceError> {
            Ok(Box::new(MemoryDevice::new(lines.iter().copied())))
        };
        let session = Session::new(
            MonitorConfig::default(),
            Box::new(connector),
            Box::new(FixedBackend(response)),
        )
        .unwrap();
        Arc::new(AppState::new(session))
    }

    #[tokio::test]
    async fn test_cycle_requires_connect() {
        let state = state(&[LINE], "0.1,0.2,0.7");
        let err = cycle_handler(State(state)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_connect_and_cycle() {
        let state = state(&[LINE], "0.1,0.2,0.7");
        let Json(status) = connect_handler(State(state.clone())).await.unwrap();
        assert!(status.connected);
        assert_eq!(status.device, "custom");

        let Json(response) = cycle_handler(State(state.clone())).await.unwrap();
        match response {
            CycleResponse::Predicted { entry, sensors } => {
                assert_eq!(entry.prediction.label, SeverityState::Critical);
                assert_eq!(sensors.len(), 5);
                assert_eq!(sensors[0].state, SeverityState::Critical);
                assert_eq!(sensors[3].label, "Cpu Usage");
            }
            other => panic!("unexpected {:?}", other),
        }

        let Json(status) = status_handler(State(state)).await.unwrap();
        assert_eq!(status.history_len, 1);
        assert_eq!(status.last_prediction, Some(SeverityState::Critical));
    }

    #[tokio::test]
    async fn test_skipped_cycle() {
        let state = state(&["Temperature: 40 C"], "0.1,0.2,0.7");
        connect_handler(State(state.clone())).await.unwrap();
        let Json(response) = cycle_handler(State(state)).await.unwrap();
        match response {
            CycleResponse::Skipped { parsed, missing } => {
                assert_eq!(parsed, vec![(Sensor::Temperature, 40.0)]);
                assert_eq!(missing.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cycle_response_json_shape() {
        let state = state(&["Temperature: 40 C"], "0.1,0.2,0.7");
        connect_handler(State(state.clone())).await.unwrap();
        let Json(response) = cycle_handler(State(state)).await.unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["parsed"], serde_json::json!([["temperature", 40.0]]));
        assert_eq!(json["missing"][0], "voltage");
        assert_eq!(json["missing"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_inference_failure_is_bad_gateway() {
        let state = state(&[LINE], "garbage");
        connect_handler(State(state.clone())).await.unwrap();
        let err = cycle_handler(State(state)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_network_selection() {
        let state = state(&[], "0.1,0.2,0.7");
        let Json(status) = network_handler(
            State(state.clone()),
            Json(NetworkRequest {
                network: "5G".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status.network, NetworkTag::new("5G"));

        let err = network_handler(
            State(state),
            Json(NetworkRequest {
                network: "3G".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_filters() {
        let state = state(&[LINE, LINE], "0.1,0.2,0.7");
        connect_handler(State(state.clone())).await.unwrap();
        cycle_handler(State(state.clone())).await.unwrap();
        cycle_handler(State(state.clone())).await.unwrap();

        let Json(all) = history_handler(State(state.clone()), Query(HistoryQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.count, 2);
        assert_eq!(all.series.len(), 2);
        assert_eq!(all.distribution.get(&SeverityState::Critical), Some(&2));

        let query = HistoryQuery {
            sensors: Some("voltage,fan_speed,current".to_string()),
            ..Default::default()
        };
        let Json(picked) = history_handler(State(state.clone()), Query(query)).await.unwrap();
        assert_eq!(picked.series.len(), 3);
        assert_eq!(picked.series[0].sensor, Sensor::Voltage);

        let old = HistoryQuery {
            end: NaiveDate::from_ymd_opt(2000, 1, 1),
            ..Default::default()
        };
        let Json(none) = history_handler(State(state.clone()), Query(old)).await.unwrap();
        assert_eq!(none.count, 0);

        let bad = HistoryQuery {
            sensors: Some("humidity".to_string()),
            ..Default::default()
        };
        let err = history_handler(State(state), Query(bad)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_inverted_date_range() {
        let query = HistoryQuery {
            start: NaiveDate::from_ymd_opt(2025, 5, 2),
            end: NaiveDate::from_ymd_opt(2025, 5, 1),
            sensors: None,
        };
        assert!(matches!(query.date_range(), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_latency_report() {
        let state = state(&[LINE, LINE], "0.1,0.2,0.7");
        connect_handler(State(state.clone())).await.unwrap();
        cycle_handler(State(state.clone())).await.unwrap();
        network_handler(
            State(state.clone()),
            Json(NetworkRequest {
                network: "5G".to_string(),
            }),
        )
        .await
        .unwrap();
        cycle_handler(State(state.clone())).await.unwrap();

        let Json(report) = latency_handler(State(state.clone())).await.unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.networks.len(), 2);

        let csv = latency_csv_handler(State(state)).await.unwrap();
        assert_eq!(csv.status(), StatusCode::OK);
    }
}
