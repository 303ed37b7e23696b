//! HTTP handlers for the relay endpoints.

use crate::error::{RelayError, Result};
use crate::relay::{LogicalState, RelayController, RelayStatus};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Body returned by every successful switch.
pub const SUCCESS_MSG: &str = r#"{msg:"success"}"#;

/// Body returned by every failed request.
pub const ERROR_MSG: &str = r#"{msg:"error"}"#;

/// Shared state handed to every handler.
#[derive(Debug)]
pub struct AppState {
    pub controller: Arc<RelayController>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::InvalidPort { .. } => {
                warn!("{}", self);
                StatusCode::NOT_FOUND
            }
            _ => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, ERROR_MSG).into_response()
    }
}

/// Run a controller call on the blocking pool. The controller bounds its own
/// hardware calls.
async fn run<T, F>(state: &AppState, operation: &str, call: F) -> Result<T>
where
    F: FnOnce(&RelayController) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let controller = state.controller.clone();
    tokio::task::spawn_blocking(move || call(&controller))
        .await
        .map_err(|e| RelayError::web_server_error(format!("{} task failed: {}", operation, e)))?
}

/// Parse the relay number from a request path. Only plain decimal digits are
/// accepted: no sign, no whitespace.
pub fn parse_relay(raw: &str, count: usize) -> Result<usize> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RelayError::invalid_port(raw, count));
    }

    raw.parse::<usize>()
        .map_err(|_| RelayError::invalid_port(raw, count))
}

/// `GET /status/{n}`: `"1"` when the relay is on, `"0"` when off.
pub async fn relay_status(
    State(state): State<Arc<AppState>>,
    Path(relay): Path<String>,
) -> Result<&'static str> {
    let relay = parse_relay(&relay, state.controller.count())?;
    let status = run(&state, "status", move |c| c.try_status(relay)).await?;
    info!("Relay {} is {}", relay, status);
    Ok(status.as_flag())
}

/// `GET /toggle/{n}`
pub async fn relay_toggle(
    State(state): State<Arc<AppState>>,
    Path(relay): Path<String>,
) -> Result<&'static str> {
    let relay = parse_relay(&relay, state.controller.count())?;
    run(&state, "toggle", move |c| c.toggle(relay)).await?;
    Ok(SUCCESS_MSG)
}

/// `GET /on/{n}`
pub async fn relay_on(
    State(state): State<Arc<AppState>>,
    Path(relay): Path<String>,
) -> Result<&'static str> {
    switch(&state, &relay, LogicalState::On).await
}

/// `GET /off/{n}`
pub async fn relay_off(
    State(state): State<Arc<AppState>>,
    Path(relay): Path<String>,
) -> Result<&'static str> {
    switch(&state, &relay, LogicalState::Off).await
}

async fn switch(state: &AppState, relay: &str, target: LogicalState) -> Result<&'static str> {
    let relay = parse_relay(relay, state.controller.count())?;
    run(state, "switch", move |c| c.set_relay(relay, target)).await?;
    Ok(SUCCESS_MSG)
}

/// `GET /all_on`
pub async fn all_on(State(state): State<Arc<AppState>>) -> Result<&'static str> {
    run(&state, "all on", |c| c.set_all(LogicalState::On)).await?;
    Ok(SUCCESS_MSG)
}

/// `GET /all_off`
pub async fn all_off(State(state): State<Arc<AppState>>) -> Result<&'static str> {
    run(&state, "all off", |c| c.set_all(LogicalState::Off)).await?;
    Ok(SUCCESS_MSG)
}

/// `GET /api/relays`: every relay with its line and state.
pub async fn list_relays(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RelayStatus>>> {
    let relays = run(&state, "snapshot", |c| Ok(c.snapshot())).await?;
    Ok(Json(relays))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "relay-board",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "relays": state.controller.count(),
        "backend": state.controller.backend_name(),
    }))
}

/// Fallback for unknown paths.
pub async fn not_found() -> (StatusCode, &'static str) {
    warn!("ERROR: 404");
    (StatusCode::NOT_FOUND, ERROR_MSG)
}

/// Control page with one row per relay.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    info!("Loading main page");
    Html(render_index(state.controller.count()))
}

fn render_index(count: usize) -> String {
    let rows: String = (1..=count)
        .map(|n| {
            format!(
                r#"        <div class="relay">
            <span class="label">Relay {n}</span>
            <span class="state" id="state-{n}">?</span>
            <button onclick="relay('on', {n})">On</button>
            <button onclick="relay('off', {n})">Off</button>
            <button onclick="relay('toggle', {n})">Toggle</button>
        </div>
"#
            )
        })
        .collect();

    format!("{}{}{}", INDEX_HEAD, rows, index_tail(count))
}

const INDEX_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Relay Board</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #f4f5f7;
            color: #333;
            padding: 20px;
        }

        .container {
            max-width: 640px;
            margin: 0 auto;
        }

        .relay {
            display: flex;
            align-items: center;
            gap: 10px;
            background: white;
            border-radius: 8px;
            padding: 10px 15px;
            margin-bottom: 8px;
        }

        .label {
            flex: 1;
            font-weight: 600;
        }

        .state {
            width: 40px;
            font-weight: bold;
        }

        .state.on {
            color: #2e9e44;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Relay Board</h1>
        <p>
            <button onclick="bulk('all_on')">All on</button>
            <button onclick="bulk('all_off')">All off</button>
        </p>
"#;

fn index_tail(count: usize) -> String {
    format!(
        r#"    </div>

    <script>
        const count = {count};

        async function refresh(n) {{
            const response = await fetch(`/status/${{n}}`);
            const on = (await response.text()) === '1';
            const el = document.getElementById(`state-${{n}}`);
            el.textContent = on ? 'ON' : 'OFF';
            el.className = on ? 'state on' : 'state';
        }}

        async function relay(action, n) {{
            await fetch(`/${{action}}/${{n}}`);
            await refresh(n);
        }}

        async function bulk(action) {{
            await fetch(`/${{action}}`);
            for (let n = 1; n <= count; n++) {{
                await refresh(n);
            }}
        }}

        for (let n = 1; n <= count; n++) {{
            refresh(n);
        }}
    </script>
</body>
</html>"#
    )
}
