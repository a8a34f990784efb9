use std::{net::TcpListener, sync::Arc};

use anyhow::Context;
use env_logger::Env;
use partidas::{
    configuration::get_configuration,
    services::{BrowserSession, PageFetcher, ParcelResolver, SmtpMailer},
    startup::run,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;

    let browser = Arc::new(
        BrowserSession::start(&configuration.browser)
            .await
            .context("Failed to start the headless browser")?,
    );

    let fetcher = PageFetcher::new(
        browser.clone(),
        configuration.browser.navigation_timeout(),
    );
    let resolver = ParcelResolver::new(fetcher, &configuration.registry.parcel_url)
        .context("Invalid registry parcel URL")?;
    let mailer = Arc::new(SmtpMailer::new(configuration.email.clone()));

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    log::info!("Server listening on {}", address);

    let served = run(
        listener,
        resolver,
        mailer,
        configuration.application.client_timeout(),
    )?
    .await;

    log::info!("Shutting down server");
    browser.stop().await;

    Ok(served?)
}
