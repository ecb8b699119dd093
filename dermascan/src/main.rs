use dermascan::{config, model, server, storage, telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;

const CONFIG_ENV: &str = "DERMASCAN_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Init
    telemetry::init_tracing();
    let metrics_handle = telemetry::install_metrics()?;
    model::loader::init_ort()?;

    // 2. Load Config
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = config::AppConfig::load(&config_path)?;
    tracing::info!(path = %config_path, "configuration loaded");

    // 3. Storage backends
    let blobs = storage::open_blob_store(&config.storage.blob).await?;
    let records = storage::open_record_store(&config.storage.records).await?;

    // 4. Model, loaded once in the background; /predict answers 503 until then
    let handle = model::ModelHandle::new();
    let loader_handle = handle.clone();
    let model_conf = config.model.clone();
    tokio::spawn(async move {
        tracing::info!(source = %model_conf.source, "loading model");
        let outcome = match model::loader::load_model(&model_conf.source, model_conf.intra_threads).await {
            Ok(classifier) => {
                tracing::info!(input = classifier.input_name(), "model loaded successfully");
                Ok(Arc::new(classifier) as Arc<dyn model::Classifier>)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load model");
                Err(e.to_string())
            }
        };
        loader_handle.publish(outcome);
    });

    // 5. Create Router
    let state = server::types::AppState {
        model: handle,
        blobs,
        records,
        settings: server::types::PredictSettings::from_config(&config),
    };
    let app = server::routes::create_router(state, metrics_handle);

    // 6. Bind & Serve
    let listener =
        TcpListener::bind(format!("{}:{}", config.server.host, config.server.port)).await?;
    tracing::info!(
        "Server listening on http://{}:{}",
        config.server.host,
        config.server.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
