use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::Behavior;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    let handle = PrometheusBuilder::new().install_recorder()?;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let delay_ms: u64 = std::env::var("MOCK_DELAY_MS")
        .ok()
        .and_then(|d| d.parse().ok())
        .unwrap_or(5);

    let behavior = Behavior {
        delay: Duration::from_millis(delay_ms),
        ..Default::default()
    };
    let app = mock_service::app(behavior)
        .route("/metrics", get(move || std::future::ready(handle.render())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server starting on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
