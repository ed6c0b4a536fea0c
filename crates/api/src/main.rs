use anyhow::Context;

use spicecart_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    spicecart_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = spicecart_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        delivery_city = %config.delivery.city,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
