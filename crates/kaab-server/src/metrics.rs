//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Frames dropped on a full or closed outbound queue (counter).
pub const WS_OUTBOUND_DROPS_TOTAL: &str = "ws_outbound_drops_total";
/// Inbound frames dropped as malformed (counter).
pub const WS_MALFORMED_EVENTS_TOTAL: &str = "ws_malformed_events_total";
/// Presence transitions (counter, labels: status).
pub const PRESENCE_CHANGES_TOTAL: &str = "presence_changes_total";
/// Broker publishes (counter, labels: event).
pub const BROKER_EVENTS_PUBLISHED_TOTAL: &str = "broker_events_published_total";
/// Chatbot requests (counter, labels: outcome).
pub const CHATBOT_REQUESTS_TOTAL: &str = "chatbot_requests_total";
/// Chatbot request latency (histogram).
pub const CHATBOT_REQUEST_DURATION_SECONDS: &str = "chatbot_request_duration_seconds";
