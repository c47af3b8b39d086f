use anyhow::Context;

use convey_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    convey_observability::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let services = convey_api::app::services::build_services(&settings).await?;
    let app = convey_api::app::build_app(settings.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
