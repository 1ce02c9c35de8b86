// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::{error, info};

use seatwatch::config::{Config, QueryArgs};
use seatwatch::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "seatwatch", version, about = "Seat-availability watcher for one train segment.")]
struct Cli {
    #[command(flatten)]
    query: QueryArgs,

    #[command(flatten)]
    config: Config,
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    seatwatch::ensure_crypto();
    init_tracing(&cli.config);

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
    let query = match cli.query.to_query() {
        Ok(query) => query,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let orchestrator = match Orchestrator::new(&cli.config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("startup failed: {e:#}");
            std::process::exit(1);
        }
    };

    // Ctrl-C ends the session gracefully; the drain is bounded.
    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; stopping session");
            stop.stop();
        }
    });

    match orchestrator.run(query).await {
        Ok(metrics) => {
            println!("{}", metrics.summary());
        }
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}
