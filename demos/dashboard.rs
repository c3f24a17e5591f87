use std::time::Duration;

use narrative_http::{discover_local_backend, ApiClient, ApiRequest, ApiResponse, HealthMonitor};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("narrative_http=debug")),
        )
        .init();

    let api = match ApiClient::from_env() {
        Ok(api) => api,
        Err(_) => {
            let base_url = discover_local_backend(
                &[8000, 8080, 3001],
                "/health",
                Duration::from_millis(300),
            )
            .await
            .ok_or_else(|| anyhow::anyhow!("no backend found; set NARRATIVE_API_URL"))?;
            ApiClient::new(base_url)
        }
    };

    let monitor = HealthMonitor::spawn(api.clone(), Duration::from_secs(30));

    match api.get::<Value>("/stories").await {
        ApiResponse::Success { data, meta } => {
            println!("stories (correlation {}): {data}", meta.correlation_id);
        }
        ApiResponse::Failure { error } => eprintln!("listing stories failed: {error}"),
    }

    let created: ApiResponse<Value> = api
        .send(
            ApiRequest::post("/stories")
                .json(&json!({ "title": "The Lantern Keeper" }))
                .idempotency_key("demo-lantern-keeper"),
        )
        .await;
    let story = created.into_result()?;
    println!("created: {story}");

    if let Some(status) = monitor.current() {
        println!("backend healthy: {} ({} ms)", status.healthy, status.latency_ms);
    }
    monitor.stop();
    Ok(())
}
