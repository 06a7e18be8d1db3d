use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use stampede::prelude::*;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

use cli::Cli;

const DEFAULT_LOG_FILTER: &str = "stampede=info,stampede_cli=info";

const EXIT_THRESHOLDS_FAILED: u8 = 99;
const EXIT_SETUP_FAILED: u8 = 1;
const EXIT_ABORTED: u8 = 105;

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_SETUP_FAILED)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Some(addr) = cli.prometheus_listen {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Serving metrics on {addr}");
    }

    let config = cli.resolve(std::env::var("K6_BASE_URL").ok())?;
    info!(
        "Running `{}` against {} ({} stages)",
        config.name,
        config.base_url,
        config.stages.len()
    );

    let abort = CancellationToken::new();
    tokio::spawn({
        let abort = abort.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, aborting run");
                abort.cancel();
            }
        }
    });

    let report = match LoadTest::http(config)?.abort_token(abort).await {
        Ok(report) => report,
        Err(SetupError::Aborted) => return Ok(ExitCode::from(EXIT_ABORTED)),
        Err(err) => return Err(err.into()),
    };

    ConsoleSink.emit(&report)?;
    if let Some(path) = &cli.summary_export {
        JsonFileSink::new(path).emit(&report)?;
        info!("Summary written to {}", path.display());
    }

    Ok(exit_code(&report))
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.aborted {
        ExitCode::from(EXIT_ABORTED)
    } else if !report.verdict.passed {
        ExitCode::from(EXIT_THRESHOLDS_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}
