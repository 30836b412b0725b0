//! Connectivity test for the configured object store.

use std::net::{TcpStream, ToSocketAddrs};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};

use hmnist_lens::config::StoreBackend;
use hmnist_lens::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

fn tcp_check(endpoint: &str) -> Result<()> {
    let host = endpoint.trim_start_matches("http://").trim_end_matches('/');
    let addrs: Vec<_> = host
        .to_socket_addrs()
        .with_context(|| format!("Cannot resolve {host}"))?
        .collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(_) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e).with_context(|| format!("TCP connect to {host} failed")),
        None => anyhow::bail!("{host} resolved to no addresses"),
    }
}

fn run() -> Result<()> {
    let config = Config::load().context("Invalid configuration")?;

    if config.store.backend == StoreBackend::S3 {
        tcp_check(&config.store.endpoint)?;
        println!("TCP connection OK -> {}", config.store.endpoint);
    }

    let store = config.store.connect()?;
    let buckets = store.list_buckets()?;
    println!(
        "Store OK ({}): {} bucket(s) {:?}",
        config.store.describe(),
        buckets.len(),
        buckets
    );
    Ok(())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FAILED: {e:#}");
            ExitCode::FAILURE
        }
    }
}
