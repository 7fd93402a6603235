//! Web variant - HTTP surface for the attendance session
//!
//! Serves the interactive form page plus a small JSON API over hyper. Every
//! handler receives the session explicitly; a submission holds the session
//! lock until it completes, so at most one capture is in flight.

use crate::infra::stats::Stats;
use crate::io::export::ExportError;
use crate::io::extractor::{ExtractNames, ServiceError};
use crate::services::session::Session;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

/// Reject uploads larger than this (participant panels are small)
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>rollcall</title>
<style>
body { font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }
th { background: #f4f4f4; }
button { margin-right: 0.5rem; }
#status { color: #555; margin-left: 0.5rem; }
.error { color: #b00; }
</style>
</head>
<body>
<h1>rollcall</h1>
<p>Upload a screenshot of the participant panel to tally attendance.</p>
<div>
  <input id="key" type="password" placeholder="API key" size="32">
  <button id="save-key">Save key</button>
  <span id="key-state"></span>
</div>
<div style="margin-top:1rem">
  <input id="image" type="file" accept="image/png,image/jpeg,image/webp">
  <button id="analyze">Analyze</button>
  <span id="status"></span>
</div>
<table>
  <thead><tr><th>Name</th><th>Count</th><th>First seen</th><th>Last seen</th></tr></thead>
  <tbody id="tally"></tbody>
</table>
<p id="totals"></p>
<div>
  <button id="export">Export CSV</button>
  <button id="reset">Reset</button>
</div>
<script>
const fmt = ms => new Date(ms).toISOString().replace('T', ' ').slice(0, 19);
const status = (msg, bad) => {
  const el = document.getElementById('status');
  el.textContent = msg;
  el.className = bad ? 'error' : '';
};
async function refresh() {
  const snap = await (await fetch('/api/roster')).json();
  document.getElementById('key-state').textContent =
    snap.credential_set ? 'key set' : 'key required';
  document.getElementById('tally').innerHTML = snap.attendees.map(a =>
    `<tr><td>${a.name}</td><td>${a.count}</td><td>${fmt(a.first_seen)}</td><td>${fmt(a.last_seen)}</td></tr>`
  ).join('');
  document.getElementById('totals').textContent =
    `${snap.total_attendees} attendees, ${snap.total_sightings} sightings (${snap.phase})`;
}
document.getElementById('save-key').onclick = async () => {
  const key = document.getElementById('key').value;
  const resp = await fetch('/api/credential', { method: 'POST', body: key });
  status(resp.ok ? 'Key saved' : 'Key rejected', !resp.ok);
  refresh();
};
document.getElementById('analyze').onclick = async () => {
  const file = document.getElementById('image').files[0];
  if (!file) { status('Choose an image first', true); return; }
  status('Analyzing...');
  const resp = await fetch('/api/capture', { method: 'POST', body: await file.arrayBuffer() });
  const body = await resp.json();
  if (!resp.ok) { status(body.error, true); }
  else if (body.summary.no_names_found) { status('No names found'); }
  else { status(`Detected ${body.summary.names_seen} (new: ${body.summary.new_names})`); }
  refresh();
};
document.getElementById('export').onclick = async () => {
  const resp = await fetch('/api/export', { method: 'POST' });
  const body = await resp.json();
  status(resp.ok ? `Exported to ${body.path}` : body.error, !resp.ok);
};
document.getElementById('reset').onclick = async () => {
  await fetch('/api/reset', { method: 'POST' });
  status('Cleared');
  refresh();
};
refresh();
</script>
</body>
</html>
"#;

fn response(status: StatusCode, content_type: &str, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    response(status, "application/json", body.to_string())
}

fn json_error(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    json_response(status, serde_json::json!({ "ok": false, "error": message }))
}

/// HTTP status for each service failure mode
fn service_error_status(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::MissingCredential | ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
        ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::UnsupportedImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Api { .. } | ServiceError::Network(_) | ServiceError::MalformedResponse(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Format the stats page in plain text
fn format_stats(stats: &Stats, attendees: usize) -> String {
    let summary = stats.report(attendees);
    let mut output = String::with_capacity(512);
    let _ = writeln!(output, "captures_total {}", summary.captures_total);
    let _ = writeln!(output, "captures_failed {}", summary.captures_failed);
    let _ = writeln!(output, "captures_empty {}", summary.captures_empty);
    let _ = writeln!(output, "names_recorded_total {}", summary.names_recorded_total);
    let _ = writeln!(output, "exports_total {}", summary.exports_total);
    let _ = writeln!(output, "avg_extract_latency_ms {}", summary.avg_extract_latency_ms);
    let _ = writeln!(output, "max_extract_latency_ms {}", summary.max_extract_latency_ms);
    let _ = writeln!(output, "attendees {}", summary.attendees);
    let _ = writeln!(output, "uptime_secs {}", summary.uptime_secs);
    output
}

async fn collect_body(body: hyper::body::Incoming) -> Result<Bytes, Response<Full<Bytes>>> {
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.len() > MAX_UPLOAD_BYTES {
                Err(json_error(StatusCode::PAYLOAD_TOO_LARGE, "upload too large".to_string()))
            } else {
                Ok(bytes)
            }
        }
        Err(e) => Err(json_error(StatusCode::BAD_REQUEST, format!("failed to read body: {e}"))),
    }
}

/// Handle HTTP requests
async fn handle_request<E: ExtractNames>(
    req: Request<hyper::body::Incoming>,
    session: Arc<Mutex<Session<E>>>,
    stats: Arc<Stats>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    match (&parts.method, parts.uri.path()) {
        (&Method::GET, "/") => {
            Ok(response(StatusCode::OK, "text/html; charset=utf-8", INDEX_HTML.to_string()))
        }
        (&Method::GET, "/health") => {
            Ok(response(StatusCode::OK, "text/plain", "ok".to_string()))
        }
        (&Method::GET, "/api/roster") => {
            let snapshot = session.lock().await.snapshot();
            match serde_json::to_value(&snapshot) {
                Ok(value) => Ok(json_response(StatusCode::OK, value)),
                Err(e) => Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
            }
        }
        (&Method::GET, "/stats") => {
            let attendees = session.lock().await.roster_len();
            let body = format_stats(&stats, attendees);
            Ok(response(StatusCode::OK, "text/plain; charset=utf-8", body))
        }
        (&Method::POST, "/api/credential") => {
            let bytes = match collect_body(body).await {
                Ok(bytes) => bytes,
                Err(resp) => return Ok(resp),
            };
            let key = String::from_utf8_lossy(&bytes).trim().to_string();
            if key.is_empty() {
                return Ok(json_error(StatusCode::BAD_REQUEST, "empty API key".to_string()));
            }
            session.lock().await.set_credential(key);
            Ok(json_response(StatusCode::OK, serde_json::json!({ "ok": true })))
        }
        (&Method::POST, "/api/capture") => {
            let bytes = match collect_body(body).await {
                Ok(bytes) => bytes,
                Err(resp) => return Ok(resp),
            };
            if bytes.is_empty() {
                return Ok(json_error(StatusCode::BAD_REQUEST, "empty image payload".to_string()));
            }
            // Lock held across the submission: one capture in flight at a time
            let result = session.lock().await.submit(&bytes).await;
            match result {
                Ok(summary) => Ok(json_response(
                    StatusCode::OK,
                    serde_json::json!({ "ok": true, "summary": summary }),
                )),
                Err(e) => Ok(json_error(service_error_status(&e), e.to_string())),
            }
        }
        (&Method::POST, "/api/export") => {
            let result = session.lock().await.export();
            match result {
                Ok(path) => Ok(json_response(
                    StatusCode::OK,
                    serde_json::json!({ "ok": true, "path": path.display().to_string() }),
                )),
                Err(e @ ExportError::EmptyRoster) => {
                    Ok(json_error(StatusCode::CONFLICT, e.to_string()))
                }
                Err(e) => Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
            }
        }
        (&Method::POST, "/api/reset") => {
            session.lock().await.reset();
            Ok(json_response(StatusCode::OK, serde_json::json!({ "ok": true })))
        }
        _ => Ok(response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())),
    }
}

/// Start the web UI / API server
pub async fn start_server<E: ExtractNames + 'static>(
    port: u16,
    session: Arc<Mutex<Session<E>>>,
    stats: Arc<Stats>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "web_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let session = session.clone();
                        let stats = stats.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let session = session.clone();
                                let stats = stats.clone();
                                async move { handle_request(req, session, stats).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "web_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "web_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("web_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_mapping() {
        assert_eq!(
            service_error_status(&ServiceError::MissingCredential),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(service_error_status(&ServiceError::Auth(403)), StatusCode::UNAUTHORIZED);
        assert_eq!(service_error_status(&ServiceError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(service_error_status(&ServiceError::Timeout(30_000)), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            service_error_status(&ServiceError::UnsupportedImage("nope".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            service_error_status(&ServiceError::Network("boom".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_format_stats_lists_counters() {
        let stats = Stats::new();
        stats.record_capture(120, 3);
        let output = format_stats(&stats, 3);
        assert!(output.contains("captures_total 1"));
        assert!(output.contains("names_recorded_total 3"));
        assert!(output.contains("attendees 3"));
    }

    #[test]
    fn test_index_page_has_form_controls() {
        assert!(INDEX_HTML.contains("id=\"key\""));
        assert!(INDEX_HTML.contains("id=\"image\""));
        assert!(INDEX_HTML.contains("/api/capture"));
        assert!(INDEX_HTML.contains("/api/export"));
        assert!(INDEX_HTML.contains("/api/reset"));
    }
}
