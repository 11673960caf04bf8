use anyhow::Context;
use clap::Parser;

use texapi_api::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    texapi_observability::init(config.log_format);

    let addr = config.listen_addr();
    let app = texapi_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
