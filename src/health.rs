//! Health endpoint for uptime monitors.
//!
//! A single unauthenticated `GET /` returning a fixed status string. Runs
//! as an independent background task and shares no state with the bot.

use axum::{routing::get, Router};
use tracing::{error, info};

const STATUS_TEXT: &str = "Бот ГДЗ работает: статус OK";

async fn status() -> &'static str {
    STATUS_TEXT
}

/// Builds the health router.
#[must_use]
pub fn router() -> Router {
    Router::new().route("/", get(status))
}

/// Serves the health endpoint until process exit.
///
/// A bind or serve failure is logged; the bot keeps polling regardless.
pub async fn serve(port: u16) {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Health endpoint failed to bind {addr}: {e}");
            return;
        }
    };
    info!("Health endpoint listening on {addr}");
    if let Err(e) = axum::serve(listener, router()).await {
        error!("Health endpoint stopped: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_returns_status_text() {
        let app = router();
        let req = Request::get("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, STATUS_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let app = router();
        let req = Request::get("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
