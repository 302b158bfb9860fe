use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::state::AppState;
use crate::{auth, courses};

pub fn build_app(state: AppState) -> Router {
    // Per-IP request budget across the whole API surface.
    let governor_conf = Box::leak(Box::new(
        GovernorConfigBuilder::default()
            .per_second(state.config.rate_limit.replenish_secs)
            .burst_size(state.config.rate_limit.burst)
            .finish()
            .expect("non-zero rate limit settings"),
    ));

    // Anything outside /api serves the front end, with index.html standing
    // in for client-side routes.
    let index = format!("{}/index.html", state.config.public_dir);
    let spa = ServeDir::new(&state.config.public_dir).not_found_service(ServeFile::new(index));

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(courses::router())
                .route("/health", get(|| async { "ok" }))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
        .fallback_service(spa)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "4000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    // ConnectInfo feeds the per-IP key extractor of the rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
