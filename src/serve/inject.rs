// src/serve/inject.rs

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Largest HTML page that gets the reload script injected.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

/// Client side of live reload: connect to the WebSocket endpoint, reload the
/// page on `reload`, reconnect when the server goes away.
pub const RELOAD_SCRIPT: &str = r#"<script>
(function () {
  var url = (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/__stylepipe/livereload";
  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (event) {
      if (event.data === "reload") { location.reload(); }
    };
    socket.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
</script>
"#;

/// Insert the reload script before the last `</body>`, or append it when the
/// page has none.
pub fn inject_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + RELOAD_SCRIPT.len());
            out.push_str(&html[..at]);
            out.push_str(RELOAD_SCRIPT);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{RELOAD_SCRIPT}"),
    }
}

/// Middleware rewriting successful `text/html` responses.
pub async fn inject_reload_script(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "could not buffer HTML response for live reload");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_goes_before_closing_body() {
        let page = "<html><body><h1>Hi</h1></BODY></html>";
        let out = inject_script(page);
        let script_at = out.find("<script>").unwrap();
        assert!(script_at < out.find("</BODY>").unwrap());
        assert!(out.starts_with("<html><body><h1>Hi</h1>"));
        assert!(out.ends_with("</BODY></html>"));
    }

    #[test]
    fn fragment_without_body_gets_script_appended() {
        let out = inject_script("<p>fragment</p>");
        assert!(out.starts_with("<p>fragment</p><script>"));
        assert!(out.contains("/__stylepipe/livereload"));
    }
}
