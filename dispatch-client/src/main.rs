use anyhow::Context;
use dispatch_client::App;
use dispatch_store::app_config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the offer screen.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatch_client=debug,dispatch_offer=debug,dispatch_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting dispatch client for mechanic {} against {}",
        config.mechanic.id,
        config.server.url
    );

    let app = App::start(config).await?;
    let result = app.run_console().await;
    app.shutdown().await;
    result
}
