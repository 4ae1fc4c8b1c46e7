use std::{env, net::{SocketAddr, ToSocketAddrs as _}, str::FromStr};

use chrono::TimeDelta;
use sea_orm::ConnectOptions;
use tracing::{info, warn};

use crate::{consts, payroll::batch::BatchSettings};

pub struct Config {
    pub host_address: SocketAddr,

    pub database_opt: ConnectOptions,

    pub jwt_key: String,

    pub batch: BatchSettings,

    pub run_migrations: bool,
}

pub fn load() -> Config {
    Config {
        host_address: load_host_address(),
        database_opt: load_database_opt().into(),
        jwt_key: load_jwt_key(),
        batch: BatchSettings {
            concurrency: load_or("BATCH_CONCURRENCY", consts::DEFAULT_BATCH_CONCURRENCY).max(1),
            failure_threshold: load_or("BATCH_FAILURE_THRESHOLD", consts::DEFAULT_BATCH_FAILURE_THRESHOLD)
                .clamp(0.0, 1.0),
            retention: TimeDelta::seconds(load_or("BATCH_RETENTION_SECS", consts::DEFAULT_BATCH_RETENTION_SECS).max(0)),
            max_finished: load_or("BATCH_MAX_FINISHED", consts::DEFAULT_BATCH_MAX_FINISHED),
        },
        run_migrations: load_or("RUN_MIGRATIONS", true),
    }
}

fn load_host_address() -> SocketAddr {
    info!("Loading environment `HOST_ADDRESS`");

    let var = env::var("HOST_ADDRESS").unwrap_or_else(|_| "127.0.0.1:0".to_string());

    var.to_socket_addrs()
        .expect("`HOST_ADDRESS` is not in a valid format").nth(0)
        .expect("unable to resolve host from `HOST_ADDRESS`")
}

fn load_database_opt() -> impl Into<ConnectOptions> {
    info!("Loading environment `DATABASE_URL`");

    env::var("DATABASE_URL").expect("Environment `DATABASE_URL` is required to be set")
}

fn load_jwt_key() -> String {
    info!("Loading environment `JWT_SECRET`");

    env::var("JWT_SECRET").expect("Environment `JWT_SECRET` is required to be set")
}

/// Optional variable, falls back to `default` when unset or unparsable
fn load_or<T: FromStr + Copy + std::fmt::Debug>(name: &str, default: T) -> T {
    info!("Loading environment `{name}`");

    match env::var(name) {
        Ok(var) => var.parse().unwrap_or_else(|_| {
            warn!("`{name}` is not in a valid format, using {default:?}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_falls_back() {
        assert_eq!(load_or("FACILITY_PAYROLL_TEST_UNSET_VARIABLE", 7usize), 7);
    }
}
