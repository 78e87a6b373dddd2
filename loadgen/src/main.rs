use anyhow::Context;
use clap::Parser;
use loadgen::{telemetry, Args, HttpClient, LoadDriver, RunConfig};
use mimalloc::MiMalloc;
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    let args = Args::parse();
    let json = args.json;

    if let Err(err) = telemetry::init_tracing(args.verbose) {
        eprintln!("failed to set up logging: {err:#}");
        return ExitCode::FAILURE;
    }

    let config = match args.into_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration, no requests sent");
            eprintln!("🚩 exit with error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("🚩 failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    let _guard = rt.enter();
    match rt.block_on(run_load(config, json)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("🚩 exit with error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_load(config: RunConfig, json: bool) -> anyhow::Result<()> {
    let client = HttpClient::new(config.request_timeout());
    let report = LoadDriver::new(config, client)
        .run_until(shutdown_signal())
        .await?;
    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{out}");
    } else {
        println!("{report}");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for ctrl-c, running to completion");
        std::future::pending::<()>().await;
    }
}
