//! Backend-for-frontend over the upstream drama catalog.
//!
//! Most endpoints relay an upstream feed unchanged. The detail endpoint
//! reconstructs a single record from the list feeds, see [`resolver`].

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics_defs;
pub mod perimeter;
pub mod resolver;
pub mod router;
pub mod service;

use catalog::HttpCatalog;
use errors::{GatewayError, Result};
use service::GatewayService;
use shared::admin_service::{AdminService, Readiness};
use shared::http::run_http_service;

pub async fn run(config: config::Config) -> Result<()> {
    config.validate()?;

    let catalog = HttpCatalog::new(&config.catalog)?;
    let gateway_service = GatewayService::new(&config, catalog)?;

    let readiness = Readiness::new();
    let admin_service = AdminService::<GatewayError>::new(readiness.clone());

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    readiness.mark_ready();
    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}
