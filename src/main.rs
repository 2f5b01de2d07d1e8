mod registry;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    // Execution proxy is optional: without EXECUTOR_URL the /api/execute
    // route reports the service as unconfigured.
    let executor = services::execute::ExecutionClient::from_env();
    if !executor.is_configured() {
        tracing::warn!("EXECUTOR_URL not set — code execution disabled");
    }

    let state = state::AppState::new(executor);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "collabcode listening");
    axum::serve(listener, app).await.expect("server failed");
}
