//! Scrape endpoint.
//!
//! Serves the metric registry at `/metrics` in the Prometheus text format.
//! The exporter core never touches this; it only fills the registry.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use http::{header, StatusCode};
use std::sync::Arc;
use tracing::error;

use crate::metrics::MetricSchema;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

const LANDING: &str = "<html><head><title>EOL Exporter</title></head>\
<body><h1>EOL Exporter</h1><p><a href=\"/metrics\">Metrics</a></p></body></html>";

pub fn router(schema: Arc<MetricSchema>) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/metrics", get(metrics))
        .with_state(schema)
}

async fn landing() -> Html<&'static str> {
    Html(LANDING)
}

async fn metrics(State(schema): State<Arc<MetricSchema>>) -> Response {
    match schema.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::sample;
    use tokio::net::TcpListener;

    async fn serve(schema: Arc<MetricSchema>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(schema)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_registry() {
        let schema = Arc::new(MetricSchema::new().unwrap());
        schema.publish(&sample());
        let base = serve(Arc::clone(&schema)).await;

        let resp = reqwest::get(format!("{base}/metrics")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain; version=0.0.4"));
        let body = resp.text().await.unwrap();
        assert!(body.contains("product_release_info{"));
        assert!(body.contains("eol_date{"));
    }

    #[tokio::test]
    async fn test_landing_links_metrics() {
        let schema = Arc::new(MetricSchema::new().unwrap());
        let base = serve(schema).await;
        let body = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(body.contains("/metrics"));
    }
}
