mod notify;
mod problem;
mod router;
mod service;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;
use url::Url;

use staffdesk_core::department::DepartmentPolicy;
use staffdesk_email::deliverability::DeliverabilityClient;
use staffdesk_email::transport::MailApiClient;
use staffdesk_storage::Database;
use staffdesk_util::{load_env_file, AppConfig};

use crate::notify::NotificationDispatcher;
use crate::service::EmployeeService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
    let verifier = DeliverabilityClient::new(
        config.deliverability_api_key.clone(),
        Url::parse(&config.deliverability_api_url)?,
        http.clone(),
    );
    let transport = MailApiClient::new(
        config.mail_api_token.clone(),
        config.mail_sender.clone(),
        Url::parse(&config.mail_api_url)?,
        http,
    );

    let notifier = NotificationDispatcher::new(Arc::new(transport), config.admin_email.clone());
    let service = EmployeeService::new(
        database,
        Arc::new(verifier),
        DepartmentPolicy::default(),
        notifier,
    );
    let state = router::AppState::new(metrics, service);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
