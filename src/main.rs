use anyhow::Result;
use egress_proxy::config::Settings;
use egress_proxy::{application::logging, Application};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    logging::init(&settings.logging)?;

    info!("Starting egress proxy application");

    let app = Application::new(settings).await?;
    app.run().await?;

    Ok(())
}
