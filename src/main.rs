use tracing_subscriber::{fmt, EnvFilter};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let config_path =
        std::env::var("FILEVIEW_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config = fileview::config::load(std::path::Path::new(&config_path))?;

    info!(
        target: "fileview",
        "FileView starting on http://{}:{}",
        config.host, config.port
    );
    info!(target: "fileview", "Allowed paths: {:?}", config.allowed_paths);

    fileview::server::run(config).await
}
