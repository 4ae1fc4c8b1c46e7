use std::{fs::OpenOptions, io};

use actix_web::{web, App, HttpServer};
use migration::{Migrator, MigratorTrait as _};
use sea_orm::Database;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{filter, fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::{auth::Authority, payroll::batch::BatchOrchestrator};

mod config;
mod consts;
mod utils;
mod error;

mod entity;
mod auth;
mod policy;
mod payroll;
mod export;
mod report;
mod pages;

#[cfg(test)]
mod testing;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("trace.log")?;

    let subscriber = Registry::default()
        .with(
            fmt::layer()
                .with_ansi(true)
                .with_line_number(true)
                .with_filter(EnvFilter::from_default_env())
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(log_file)
                .with_filter(filter::LevelFilter::from_level(Level::TRACE))
        );

    tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

    let config::Config {
        host_address,
        database_opt,
        jwt_key,
        batch,
        run_migrations,
    } = config::load();

    let database = Database::connect(database_opt).await.map_err(io::Error::other)?;

    if run_migrations {
        info!("Applying pending migrations");
        Migrator::up(&database, None).await.map_err(io::Error::other)?;
    }

    let database = web::Data::new(database);
    let orchestrator = web::Data::new(BatchOrchestrator::new(database.clone(), batch));
    let authority = web::Data::new(Authority::new(jwt_key.as_bytes()));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(database.clone())
            .app_data(authority.clone())
            .app_data(orchestrator.clone())
            .wrap(TracingLogger::default())
            .configure(pages::config)
    });

    info!(%host_address, "Serving payroll");

    server
        .bind(host_address)?
        .run().await
}
