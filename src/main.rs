mod event;
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

    // All room, lock, and presence state is in-memory by design: a restart
    // loses it, and clients are expected to rejoin. Locks are advisory UX
    // aids, not a correctness mechanism.
    let state = state::AppState::new();

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "slidecollab listening");
    axum::serve(listener, app).await.expect("server failed");
}
