use aw_serve::{create_router, ArtifactFetcher, ArtifactSource, ModelService, ModelSlot, SharedModel};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const ENV_SERVE_ADDR: &str = "AMLWOLF_SERVE_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let addr = std::env::var(ENV_SERVE_ADDR).unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let source = ArtifactSource::from_env(|key| std::env::var(key).ok());
    let model = SharedModel::default();

    // requests get 503 until the model is in place
    let slot = model.clone();
    tokio::spawn(async move {
        let loaded = ModelService::load(source.clone(), &ArtifactFetcher::new()).await;
        *slot.write() = match loaded {
            Ok(service) => ModelSlot::Ready(service),
            Err(e) => {
                tracing::error!(%source, error = %e, "failed to load model");
                ModelSlot::Failed(e.to_string())
            }
        };
    });

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("AmlWolf scoring service listening on {addr}");

    axum::serve(listener, create_router(model)).await?;
    Ok(())
}
