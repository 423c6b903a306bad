//! MailChats Web UI
//!
//! Serves the pre-built single-page app. Unknown paths fall back to
//! `index.html` so client-side routes survive a reload.

use axum::Router;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

/// Router serving the bundle in `dir` with an `index.html` fallback
pub fn spa_router(dir: &Path) -> Router {
    let index = ServeFile::new(dir.join("index.html"));
    Router::new().fallback_service(ServeDir::new(dir).fallback(index))
}

/// Add the static bundle behind `api`, if one is configured and present.
///
/// Routes already defined on `api` take precedence.
pub fn with_static_files(api: Router, static_dir: Option<&Path>) -> Router {
    match static_dir {
        Some(dir) if dir.join("index.html").is_file() => {
            info!(dir = %dir.display(), "Serving web UI");
            api.merge(spa_router(dir))
        }
        Some(dir) => {
            warn!(
                dir = %dir.display(),
                "Static directory has no index.html, web UI disabled"
            );
            api
        }
        None => api,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum_test::TestServer;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn bundle() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<div id=\"root\"></div>").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_serves_assets_and_falls_back_to_index() {
        let dir = bundle();
        let api = Router::new().route("/api/ping", get(|| async { "pong" }));
        let server = TestServer::new(with_static_files(api, Some(dir.path()))).unwrap();

        assert_eq!(server.get("/api/ping").await.text(), "pong");
        assert_eq!(server.get("/assets/app.js").await.text(), "console.log(1)");

        let response = server.get("/campaigns/42").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "<div id=\"root\"></div>");
    }

    #[tokio::test]
    async fn test_missing_bundle_is_skipped() {
        let dir = TempDir::new().unwrap();
        let api = Router::new().route("/api/ping", get(|| async { "pong" }));
        let server = TestServer::new(with_static_files(api, Some(dir.path()))).unwrap();

        assert_eq!(server.get("/").await.status_code(), StatusCode::NOT_FOUND);
    }
}
