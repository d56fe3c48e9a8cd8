//! Web dashboard with JSON API endpoints

use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::state::{StateHandle, STATE_UNAVAILABLE};
use crate::GiosError;

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub state: StateHandle,
}

/// Build the dashboard axum router
pub fn build_router(state: StateHandle) -> Router {
    let dashboard_state = DashboardState { state };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/states", get(states_handler))
        .route("/api/states/{entity_id}", get(state_handler))
        .route("/api/entities", get(entities_handler))
        .route("/api/diagnostics", get(diagnostics_handler))
        .route("/health", get(health_handler))
        .with_state(dashboard_state)
}

/// Serve the dashboard on `port` until `cancel` fires
pub async fn serve(state: StateHandle, port: u16, cancel: CancellationToken) -> crate::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        GiosError::Dashboard(format!("Failed to bind dashboard to port {}: {}", port, e))
    })?;
    tracing::info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| GiosError::Dashboard(format!("Dashboard server failed: {}", e)))?;

    tracing::debug!("Dashboard stopped");
    Ok(())
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;

    let station = state
        .station
        .as_ref()
        .map(|s| format!("{} ({})", s.station_name, s.id))
        .unwrap_or_else(|| format!("Station {} (not set up yet)", state.station_id));

    let entity_rows: String = state
        .states
        .values()
        .map(|s| {
            let (color, bg) = if s.state == STATE_UNAVAILABLE {
                ("#383d41", "#e2e3e5")
            } else {
                ("#155724", "#d4edda")
            };
            let name = s
                .attributes
                .get("friendly_name")
                .and_then(|v| v.as_str())
                .unwrap_or(&s.entity_id);
            let unit = s
                .attributes
                .get("unit_of_measurement")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;"><code>{}</code></td>
                    <td style="padding: 0.5rem;">
                        <span style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: {}; background-color: {};">{}</span> {}
                    </td>
                </tr>"#,
                name, s.entity_id, color, bg, s.state, unit
            )
        })
        .collect();

    let status = &state.coordinator;
    let last_update = match status.last_success_epoch_ms {
        Some(ms) => format!(
            r#"<script>document.write(new Date({}).toLocaleString())</script>"#,
            ms
        ),
        None => "Never".to_string(),
    };
    let last_error = status.last_error.as_deref().unwrap_or("None");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>GIOŚ Air Quality</title>
    <script>
        function refreshData() {{
            fetch('/api/states')
                .then(r => r.json())
                .then(data => {{
                    const tbody = document.getElementById('entity-body');
                    tbody.innerHTML = data.map(s => {{
                        const [color, bg] = s.state === 'unavailable' ? ['#383d41', '#e2e3e5'] : ['#155724', '#d4edda'];
                        const name = s.attributes.friendly_name || s.entity_id;
                        const unit = s.attributes.unit_of_measurement || '';
                        return `<tr style="border-bottom: 1px solid #dee2e6;">
                            <td style="padding: 0.5rem;">${{name}}</td>
                            <td style="padding: 0.5rem;"><code>${{s.entity_id}}</code></td>
                            <td style="padding: 0.5rem;">
                                <span style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: ${{color}}; background-color: ${{bg}};">${{s.state}}</span> ${{unit}}
                            </td>
                        </tr>`;
                    }}).join('');
                }});
        }}
        setInterval(refreshData, 30000);
    </script>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>GIOŚ Air Quality</h1>
    <p>{station}</p>
    <section>
        <h2>Sensors</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Name</th>
                    <th style="padding: 0.5rem; text-align: left;">Entity</th>
                    <th style="padding: 0.5rem; text-align: left;">State</th>
                </tr>
            </thead>
            <tbody id="entity-body">{entity_rows}</tbody>
        </table>
    </section>
    <section>
        <h2>Updates</h2>
        <p>Last Update: {last_update}</p>
        <p>Consecutive Failures: {failures}</p>
        <p>Last Error: {last_error}</p>
    </section>
    <p style="font-size: 0.85em; color: #6c757d;">{attribution}</p>
</body>
</html>"#,
        station = station,
        entity_rows = entity_rows,
        last_update = last_update,
        failures = status.consecutive_failures,
        last_error = last_error,
        attribution = crate::entity::ATTRIBUTION,
    );

    Html(html)
}

async fn states_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    let states: Vec<_> = state.states.values().cloned().collect();
    axum::Json(states)
}

async fn state_handler(
    State(dashboard): State<DashboardState>,
    Path(entity_id): Path<String>,
) -> Response {
    let state = dashboard.state.read().await;
    match state.get(&entity_id) {
        Some(entity) => axum::Json(entity.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Entity {} not found", entity_id),
        )
            .into_response(),
    }
}

async fn entities_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    axum::Json(state.entities.clone())
}

async fn diagnostics_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    axum::Json(crate::diagnostics::build(&state))
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
